//! Text placement on a 16x2 display.
//!
//! Lines are numbered from 1, columns from 0. Column 16 is accepted as a position just past the
//! last visible cell, where only an empty string fits.

use crate::lcd::hd44780::driver::{HD44780Driver, LcdError, LcdResult};
use log::warn;

pub const LINE1: u8 = 1;
pub const LINE2: u8 = 2;
pub const COLUMNS: u8 = 16;

/// Maps a line and column to its DDRAM address.
///
/// # Errors
/// - [LcdError::InvalidPosition] if the line is not 1 or 2, or the column is above 16.
pub fn map_address(line: u8, column: u8) -> LcdResult<u8> {
    if !(LINE1..=LINE2).contains(&line) || column > COLUMNS {
        return Err(LcdError::InvalidPosition { line, column });
    }
    Ok(((line - 1) << 6) + column)
}

/// Positioned text output for any [HD44780Driver].
///
/// Every argument is validated before the first transfer, so a rejected call leaves the display
/// untouched.
pub trait TextExt {
    /// Writes the string at the address counter. Non-ASCII characters are written as `?`.
    fn print(&mut self, s: &str) -> LcdResult<()>;

    /// Moves the address counter to the given cell.
    fn set_cursor(&mut self, line: u8, column: u8) -> LcdResult<()>;

    /// Overwrites a single cell with a space.
    fn clear_cell(&mut self, line: u8, column: u8) -> LcdResult<()>;

    /// Clears `cells_to_clear` cells starting at `column`, then writes `text` from `column`.
    ///
    /// # Errors
    /// - [LcdError::InvalidPosition] if the position is out of range.
    /// - [LcdError::TextTooLong] if the text does not fit in the rest of the line.
    /// - [LcdError::ClearRangeTooWide] if the cleared range does not fit in the rest of the line.
    fn write_at(&mut self, text: &str, line: u8, column: u8, cells_to_clear: u8) -> LcdResult<()>;

    /// Replaces the whole line with `text`.
    fn write_line(&mut self, text: &str, line: u8) -> LcdResult<()> {
        self.write_at(text, line, 0, COLUMNS)
    }
}

impl<T: ?Sized + HD44780Driver> TextExt for T {
    fn print(&mut self, s: &str) -> LcdResult<()> {
        for c in s.chars() {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?;
            }
        }
        Ok(())
    }

    fn set_cursor(&mut self, line: u8, column: u8) -> LcdResult<()> {
        let address = map_address(line, column)?;
        self.set_ddram_address(address)
    }

    fn clear_cell(&mut self, line: u8, column: u8) -> LcdResult<()> {
        self.set_cursor(line, column)?;
        self.send_data(b' ')
    }

    fn write_at(&mut self, text: &str, line: u8, column: u8, cells_to_clear: u8) -> LcdResult<()> {
        map_address(line, column)?;

        let length = text.chars().count();
        let available = COLUMNS - column;
        if length > available as usize {
            warn!("Refusing to write {:?} at {}:{}", text, line, column);
            return Err(LcdError::TextTooLong {
                length,
                available: available as usize,
            });
        }
        if cells_to_clear > available {
            return Err(LcdError::ClearRangeTooWide {
                start: column,
                cells: cells_to_clear,
            });
        }

        for offset in 0..cells_to_clear {
            self.clear_cell(line, column + offset)?;
        }

        // The address counter advances by itself in increment mode
        self.set_cursor(line, column)?;
        self.print(text)
    }
}
