use std::collections::TryReserveError;

use super::{access_bytes, Device};
use crate::exception::Exception;

pub const DRAM_BASE: u64 = 0x8000_0000;
/// Default DRAM size: 128 MiB.
pub const DRAM_SIZE: u64 = 1024 * 1024 * 128;
/// DRAM must end inside the 56-bit physical address space.
pub const DRAM_MAX_SIZE: u64 = (1 << 56) - DRAM_BASE;

/// Little-endian byte-addressed main memory starting at `DRAM_BASE`.
pub struct Dram {
    mem: Vec<u8>,
}

impl Dram {
    /// Allocates `size` zeroed bytes, failing instead of aborting when the
    /// host cannot provide them.
    pub fn new(size: usize) -> Result<Self, TryReserveError> {
        let mut mem = Vec::new();
        mem.try_reserve_exact(size)?;
        mem.resize(size, 0);
        Ok(Self { mem })
    }

    pub fn size(&self) -> u64 {
        self.mem.len() as u64
    }

    /// One past the last valid physical address.
    pub fn end(&self) -> u64 {
        DRAM_BASE + self.size()
    }

    /// Copies `bytes` to the physical address `addr`.
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Exception> {
        let start = self
            .offset(addr, bytes.len())
            .ok_or(Exception::StoreAmoAccessFault(addr))?;
        self.mem[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_bytes(&self, addr: u64, len: usize) -> Option<&[u8]> {
        let start = self.offset(addr, len)?;
        Some(&self.mem[start..start + len])
    }

    fn offset(&self, addr: u64, len: usize) -> Option<usize> {
        let start = usize::try_from(addr.checked_sub(DRAM_BASE)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.mem.len()).then_some(start)
    }
}

impl Device for Dram {
    fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        let len = access_bytes(size).ok_or(Exception::LoadAccessFault(addr))?;
        let bytes = self
            .read_bytes(addr, len)
            .ok_or(Exception::LoadAccessFault(addr))?;
        let mut buf = [0u8; 8];
        buf[..len].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        let len = access_bytes(size).ok_or(Exception::StoreAmoAccessFault(addr))?;
        self.write_bytes(addr, &value.to_le_bytes()[..len])
    }
}
