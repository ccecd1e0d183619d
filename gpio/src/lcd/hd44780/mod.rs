//! HD44780 character LCD module, for a 16x2 display on an 8-bit parallel bus.
//!
//! The [driver] module holds the register transfers and the instruction set, the [text] module
//! places strings at line/column positions on top of it.

pub mod driver;
pub mod text;
