pub mod delay;
pub mod lcd;
pub mod raw;
pub mod sim;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Identifies a single 8-bit port register, e.g. an output latch, an input register or a
/// data direction register.
///
/// The number is an index into the register file of the [PortRegisters] backend. For
/// [raw::MmapPorts] it is the byte offset from the start of the mapped block.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Port(pub usize);

/// Access to the 8-bit port registers of the host.
///
/// Implementations must never cache values: every call reaches the backing register, since
/// input registers reflect live pin levels and writes have side effects on the hardware.
pub trait PortRegisters: Debug {
    /// Reads the current value of the port register.
    fn read(&self, port: Port) -> GpioResult<u8>;

    /// Writes a value to the port register.
    fn write(&self, port: Port, value: u8) -> GpioResult<()>;

    /// Sets a single bit of the port register using read-modify-write.
    fn set_bit(&self, port: Port, bit: u8) -> GpioResult<()> {
        let mask = bit_mask(bit)?;
        let value = self.read(port)?;
        self.write(port, value | mask)
    }

    /// Clears a single bit of the port register using read-modify-write.
    fn clear_bit(&self, port: Port, bit: u8) -> GpioResult<()> {
        let mask = bit_mask(bit)?;
        let value = self.read(port)?;
        self.write(port, value & !mask)
    }

    /// Reads a single bit of the port register.
    fn read_bit(&self, port: Port, bit: u8) -> GpioResult<bool> {
        let mask = bit_mask(bit)?;
        Ok(self.read(port)? & mask != 0)
    }
}

fn bit_mask(bit: u8) -> GpioResult<u8> {
    if bit > 7 {
        return Err(GpioError::InvalidArgument);
    }
    Ok(1 << bit)
}

/// A single GPIO line: one bit of a port register.
///
/// Some platforms (e.g. AVR) read pin levels from a different register than the one that is
/// written, in which case `input` names the register to read from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinHandle {
    pub port: Port,
    pub input: Option<Port>,
    pub bit: u8,
}

impl PinHandle {
    pub fn new(port: Port, bit: u8) -> Self {
        PinHandle {
            port,
            input: None,
            bit,
        }
    }

    pub fn with_input(mut self, input: Port) -> Self {
        self.input = Some(input);
        self
    }

    /// Drives the line high.
    pub fn set(&self, registers: &dyn PortRegisters) -> GpioResult<()> {
        registers.set_bit(self.port, self.bit)
    }

    /// Drives the line low.
    pub fn clear(&self, registers: &dyn PortRegisters) -> GpioResult<()> {
        registers.clear_bit(self.port, self.bit)
    }

    pub fn write(&self, registers: &dyn PortRegisters, value: bool) -> GpioResult<()> {
        if value {
            self.set(registers)
        } else {
            self.clear(registers)
        }
    }

    /// Reads the level of the line, from the input register if there is one.
    pub fn read(&self, registers: &dyn PortRegisters) -> GpioResult<bool> {
        registers.read_bit(self.input.unwrap_or(self.port), self.bit)
    }

    /// Checks whether both handles refer to the same physical bit.
    pub fn overlaps(&self, other: &PinHandle) -> bool {
        self.port == other.port && self.bit == other.bit
    }
}

/// Direction of an 8-bit data bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusDirection {
    /// All pins are outputs; the host drives the bus.
    Drive,
    /// All pins are inputs; the bus is left to the peripheral.
    Sense,
}

impl BusDirection {
    /// Value to be written to the direction register, `1` bits being outputs.
    pub fn register_value(&self) -> u8 {
        match self {
            BusDirection::Drive => 0xFF,
            BusDirection::Sense => 0x00,
        }
    }
}

/// An 8-bit data bus spanning a whole port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusHandle {
    pub output: Port,
    pub input: Port,
    pub direction: Port,
}

impl BusHandle {
    pub fn new(output: Port, input: Port, direction: Port) -> Self {
        BusHandle {
            output,
            input,
            direction,
        }
    }

    /// Creates a bus for platforms that read and write the same port register.
    pub fn shared(port: Port, direction: Port) -> Self {
        Self::new(port, port, direction)
    }

    pub fn set_direction(
        &self,
        registers: &dyn PortRegisters,
        direction: BusDirection,
    ) -> GpioResult<()> {
        registers.write(self.direction, direction.register_value())
    }

    pub fn write_byte(&self, registers: &dyn PortRegisters, value: u8) -> GpioResult<()> {
        registers.write(self.output, value)
    }

    pub fn read_byte(&self, registers: &dyn PortRegisters) -> GpioResult<u8> {
        registers.read(self.input)
    }
}
