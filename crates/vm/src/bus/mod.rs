//! Physical address space: DRAM plus the memory-mapped CLINT, PLIC and UART.

mod clint;
mod memory;
mod plic;
mod uart;

pub use clint::*;
pub use memory::*;
pub use plic::*;
pub use uart::*;

use crate::exception::Exception;

/// A memory-mapped device. `size` is the access width in bits (8, 16, 32
/// or 64) and `addr` is the absolute physical address.
pub trait Device {
    fn load(&self, addr: u64, size: u8) -> Result<u64, Exception>;
    fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception>;
}

pub struct Bus {
    pub clint: Clint,
    pub plic: Plic,
    pub uart: Uart,
    pub dram: Dram,
}

impl Bus {
    pub fn new(dram: Dram, uart: Uart) -> Self {
        Self {
            clint: Clint::new(),
            plic: Plic::new(),
            uart,
            dram,
        }
    }

    /// Routes a load to the device that owns `addr`. Unmapped addresses
    /// raise a load access fault.
    pub fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        if in_range(addr, CLINT_BASE, CLINT_SIZE) {
            return self.clint.load(addr, size);
        }
        if in_range(addr, PLIC_BASE, PLIC_SIZE) {
            return self.plic.load(addr, size);
        }
        if in_range(addr, UART_BASE, UART_SIZE) {
            return self.uart.load(addr, size);
        }
        if addr >= DRAM_BASE {
            return self.dram.load(addr, size);
        }
        Err(Exception::LoadAccessFault(addr))
    }

    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if in_range(addr, CLINT_BASE, CLINT_SIZE) {
            return self.clint.store(addr, size, value);
        }
        if in_range(addr, PLIC_BASE, PLIC_SIZE) {
            return self.plic.store(addr, size, value);
        }
        if in_range(addr, UART_BASE, UART_SIZE) {
            return self.uart.store(addr, size, value);
        }
        if addr >= DRAM_BASE {
            return self.dram.store(addr, size, value);
        }
        Err(Exception::StoreAmoAccessFault(addr))
    }
}

fn in_range(addr: u64, base: u64, size: u64) -> bool {
    addr >= base && addr - base < size
}

/// Number of bytes in an access of `size` bits, or `None` for widths the
/// bus does not support.
pub(crate) fn access_bytes(size: u8) -> Option<usize> {
    match size {
        8 | 16 | 32 | 64 => Some(size as usize / 8),
        _ => None,
    }
}
