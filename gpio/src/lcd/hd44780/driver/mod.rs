//! HD44780 driver interface.
//!
//! See [HD44780Driver] for the instruction-level interface, and [GpioHD44780Driver] for the
//! implementation bit-banging an 8-bit parallel bus through port registers.

mod gpio;
mod instruction;

use crate::GpioError;
use std::fmt::Debug;
use thiserror::Error;
pub use gpio::*;
pub use instruction::*;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("the driver has no pin bindings yet")]
    NotConfigured,
    #[error("the driver is already configured")]
    AlreadyConfigured,
    #[error("invalid pin binding: {0}")]
    InvalidPinBinding(&'static str),
    #[error("position out of range: line {line}, column {column}")]
    InvalidPosition { line: u8, column: u8 },
    #[error("text of {length} characters does not fit in the remaining {available} cells")]
    TextTooLong { length: usize, available: usize },
    #[error("clearing {cells} cells from column {start} runs past the end of the line")]
    ClearRangeTooWide { start: u8, cells: u8 },
    #[error("invalid argument")]
    InvalidArgument,
    #[error(transparent)]
    Gpio(#[from] GpioError),
}

pub type LcdResult<T> = Result<T, LcdError>;

/// One of the two registers addressable through the RS line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Register {
    /// RS low. Writes are instructions, reads return the busy flag and address counter.
    Instruction,
    /// RS high. Accesses DDRAM or CGRAM at the address counter.
    Data,
}

impl Register {
    /// Level of the RS line selecting this register.
    pub fn rs_level(&self) -> bool {
        matches!(self, Register::Data)
    }
}

/// Instruction-level interface of the HD44780 controller.
///
/// The high-level methods encode an [Instruction] and send it with
/// [HD44780Driver::send_instruction]. The low-level methods are implemented by the specific
/// driver, which also decides how commands are paced.
pub trait HD44780Driver: Debug {
    /// Runs the power-on initialization sequence and leaves the display on, cleared, with the
    /// cursor hidden and at home, and the address counter incrementing.
    fn init(&mut self, lines: Lines, font: Font) -> LcdResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> LcdResult<()> {
        self.send_instruction(Instruction::ClearDisplay)
    }

    /// Sets the DDRAM address to 0 and undoes any display shift.
    fn return_home(&mut self) -> LcdResult<()> {
        self.send_instruction(Instruction::ReturnHome)
    }

    fn set_entry_mode(&mut self, direction: CursorMove, shift: bool) -> LcdResult<()> {
        self.send_instruction(Instruction::EntryModeSet { direction, shift })
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        self.send_instruction(Instruction::DisplayControl {
            display_on,
            cursor_on,
            blink_on,
        })
    }

    /// Moves the cursor and/or shifts the display without touching DDRAM.
    fn cursor_shift(&mut self, cursor: Direction, display: Direction) -> LcdResult<()> {
        self.send_instruction(Instruction::CursorShift { cursor, display })
    }

    /// Sets the interface width, line count and font.
    ///
    /// A [Font::Font5x10] request is ignored when two lines are selected.
    fn function_set(&mut self, length: DataLength, lines: Lines, font: Font) -> LcdResult<()> {
        self.send_instruction(Instruction::FunctionSet {
            length,
            lines,
            font,
        })
    }

    /// Sets the CGRAM address. Only the low 6 bits are used.
    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        self.send_instruction(Instruction::SetCgramAddress(address))
    }

    /// Sets the DDRAM address. Only the low 7 bits are used.
    ///
    /// On a two-line display, the first line spans `0x00..=0x27` and the second `0x40..=0x67`.
    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        self.send_instruction(Instruction::SetDdramAddress(address))
    }

    /// Reads the address counter, with the busy flag masked out.
    fn read_address_counter(&mut self) -> LcdResult<u8> {
        Ok(self.read_command()? & ADDRESS_MASK)
    }

    /// Reads the busy flag.
    fn is_busy(&mut self) -> LcdResult<bool> {
        Ok(self.read_command()? & BUSY_FLAG != 0)
    }

    /// Reads the busy flag and address counter.
    fn get_busy_flag_and_address(&mut self) -> LcdResult<(bool, u8)> {
        let status = self.read_command()?;
        Ok((status & BUSY_FLAG != 0, status & ADDRESS_MASK))
    }

    /// Reads the CGRAM byte at the given address.
    fn read_instruction_register(&mut self, address: u8) -> LcdResult<u8> {
        self.set_cgram_address(address)?;
        self.read_data()
    }

    /// Reads the DDRAM byte at the given address.
    fn read_data_register(&mut self, address: u8) -> LcdResult<u8> {
        self.set_ddram_address(address)?;
        self.read_data()
    }

    /// Writes the eight pattern rows of a user-defined character.
    ///
    /// `slot` is the character code `0..=7`, only the low 5 bits of each row are used. The
    /// address counter is pointed back at the DDRAM address it held before.
    fn define_glyph(&mut self, slot: u8, rows: &[u8; 8]) -> LcdResult<()> {
        if slot > 7 {
            return Err(LcdError::InvalidArgument);
        }
        let address = self.read_address_counter()?;
        self.set_cgram_address(slot << 3)?;
        for row in rows {
            self.send_data(row & 0b00011111)?;
        }
        self.set_ddram_address(address)
    }

    // Low-level commands
    // These are implemented by the driver implementation.

    /// Sends an instruction. Unlike [Self::send_command], this lets the driver track state
    /// changes caused by the instruction.
    fn send_instruction(&mut self, instruction: Instruction) -> LcdResult<()>;

    /// Sends a raw byte to the instruction register.
    /// Sets the RS pin to 0 (instruction).
    fn send_command(&mut self, command: u8) -> LcdResult<()>;

    /// Sends a byte to the data register, storing it at the address counter.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> LcdResult<()>;

    /// Reads the busy flag and address counter.
    /// Sets the RS pin to 0 (instruction).
    ///
    /// Returns both in a single u8, for easier usage use [Self::get_busy_flag_and_address].
    fn read_command(&mut self) -> LcdResult<u8>;

    /// Reads the byte at the address counter.
    /// Sets the RS pin to 1 (data).
    fn read_data(&mut self) -> LcdResult<u8>;
}
