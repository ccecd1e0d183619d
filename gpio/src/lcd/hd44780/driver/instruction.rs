//! HD44780 instruction set.
//!
//! Every instruction is a single byte written to the instruction register: a fixed opcode
//! prefix (the highest set bit) followed by parameter bits.

/// Bit 7 of a status read: set while the controller is still executing an instruction.
pub const BUSY_FLAG: u8 = 0b10000000;
/// The address counter occupies the low 7 bits of a status read.
pub const ADDRESS_MASK: u8 = 0b01111111;
/// CGRAM addresses are 6 bits wide.
pub const CGRAM_ADDRESS_MASK: u8 = 0b00111111;

/// Worst-case execution time of Clear Display and Return Home.
pub const LONG_EXECUTION_TIME_US: u64 = 1520;
/// Worst-case execution time of every other instruction.
pub const SHORT_EXECUTION_TIME_US: u64 = 37;
/// Worst-case time for a data register write or read, including the address counter update.
pub const DATA_EXECUTION_TIME_US: u64 = 43;

/// Direction the address counter moves after each data access.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorMove {
    Increment,
    Decrement,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Left,
    Right,
}

/// Width of the data bus between the host and the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataLength {
    FourBit,
    EightBit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Lines {
    One,
    Two,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Font {
    Font5x8,
    /// Only available in single line mode.
    Font5x10,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    /// `00000001`
    ClearDisplay,
    /// `0000001?`
    ReturnHome,
    /// `000001IS`
    EntryModeSet { direction: CursorMove, shift: bool },
    /// `00001DCB`
    DisplayControl {
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    },
    /// `0001DC??`, `D` for the display moving right and `C` for the cursor moving right.
    CursorShift { cursor: Direction, display: Direction },
    /// `001DNF??`
    FunctionSet {
        length: DataLength,
        lines: Lines,
        font: Font,
    },
    /// `01AAAAAA`
    SetCgramAddress(u8),
    /// `1AAAAAAA`
    SetDdramAddress(u8),
}

impl Instruction {
    /// Packs the instruction into its byte form.
    pub fn encode(&self) -> u8 {
        match *self {
            Instruction::ClearDisplay => 0b00000001,
            Instruction::ReturnHome => 0b00000010,
            Instruction::EntryModeSet { direction, shift } => {
                let mut command = 0b00000100;
                if direction == CursorMove::Increment {
                    command |= 0b00000010;
                }
                if shift {
                    command |= 0b00000001;
                }
                command
            }
            Instruction::DisplayControl {
                display_on,
                cursor_on,
                blink_on,
            } => {
                let mut command = 0b00001000;
                if display_on {
                    command |= 0b00000100;
                }
                if cursor_on {
                    command |= 0b00000010;
                }
                if blink_on {
                    command |= 0b00000001;
                }
                command
            }
            Instruction::CursorShift { cursor, display } => {
                let mut command = 0b00010000;
                if display == Direction::Right {
                    command |= 0b00001000;
                }
                if cursor == Direction::Right {
                    command |= 0b00000100;
                }
                command
            }
            Instruction::FunctionSet {
                length,
                lines,
                font,
            } => {
                let mut command = 0b00100000;
                if length == DataLength::EightBit {
                    command |= 0b00010000;
                }
                if lines == Lines::Two {
                    command |= 0b00001000;
                }
                // Two lines of the tall font do not fit the glass
                if lines == Lines::One && font == Font::Font5x10 {
                    command |= 0b00000100;
                }
                command
            }
            Instruction::SetCgramAddress(address) => 0b01000000 | (address & CGRAM_ADDRESS_MASK),
            Instruction::SetDdramAddress(address) => 0b10000000 | (address & ADDRESS_MASK),
        }
    }

    pub fn execution_time_us(&self) -> u64 {
        execution_time_us(self.encode())
    }
}

/// Worst-case execution time of an encoded instruction byte.
pub fn execution_time_us(command: u8) -> u64 {
    if command & 0b11111110 == 0b00000010 || command == 0b00000001 {
        LONG_EXECUTION_TIME_US
    } else {
        SHORT_EXECUTION_TIME_US
    }
}
