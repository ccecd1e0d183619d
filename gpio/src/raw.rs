use crate::{GpioError, GpioResult, Port, PortRegisters};
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::path::Path;

/// [PortRegisters] backed by a memory-mapped block of byte-wide I/O registers.
///
/// Each [Port] is the byte offset of a register inside the mapped block. All accesses are
/// volatile, so they are neither merged nor elided and always reflect the live register.
pub struct MmapPorts {
    mmap: MmapRaw,
}

impl MmapPorts {
    /// Maps `len` bytes of `path` starting at `offset`.
    ///
    /// The offset must be page-aligned, as required by `mmap`.
    pub fn open(path: impl AsRef<Path>, offset: u64, len: usize) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(len)
            .map_raw(&file)?;

        Ok(MmapPorts { mmap })
    }

    /// Number of byte registers in the mapped block.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }

    fn register_ptr(&self, port: Port) -> GpioResult<*mut u8> {
        if port.0 >= self.mmap.len() {
            return Err(GpioError::InvalidArgument);
        }

        Ok(unsafe { self.mmap.as_mut_ptr().add(port.0) })
    }
}

impl Debug for MmapPorts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MmapPorts({:?}+{})", self.mmap.as_ptr().addr(), self.mmap.len())
    }
}

impl PortRegisters for MmapPorts {
    fn read(&self, port: Port) -> GpioResult<u8> {
        let register_ptr = self.register_ptr(port)?;
        Ok(unsafe { register_ptr.read_volatile() })
    }

    fn write(&self, port: Port, value: u8) -> GpioResult<()> {
        let register_ptr = self.register_ptr(port)?;
        unsafe { register_ptr.write_volatile(value) };
        Ok(())
    }
}
