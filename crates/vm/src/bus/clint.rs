use super::{access_bytes, Device};
use crate::exception::Exception;

/// Core-local interruptor: software interrupt and timer for hart 0.
pub const CLINT_BASE: u64 = 0x200_0000;
pub const CLINT_SIZE: u64 = 0x10000;

pub const CLINT_MSIP: u64 = CLINT_BASE;
pub const CLINT_MTIMECMP: u64 = CLINT_BASE + 0x4000;
pub const CLINT_MTIME: u64 = CLINT_BASE + 0xbff8;

pub struct Clint {
    msip: u64,
    mtimecmp: u64,
    mtime: u64,
}

impl Default for Clint {
    fn default() -> Self {
        Self::new()
    }
}

impl Clint {
    pub fn new() -> Self {
        Self {
            msip: 0,
            // no timer interrupt until software programs a deadline
            mtimecmp: u64::MAX,
            mtime: 0,
        }
    }

    /// Advances mtime by one step.
    pub fn tick(&mut self) {
        self.mtime = self.mtime.wrapping_add(1);
    }

    /// Returns `(software, timer)` interrupt lines.
    pub fn pending(&self) -> (bool, bool) {
        (self.msip & 1 != 0, self.mtime >= self.mtimecmp)
    }
}

/// Base address and width in bytes of the register containing `addr`.
fn layout(addr: u64) -> Option<(u64, u64)> {
    [(CLINT_MSIP, 4), (CLINT_MTIMECMP, 8), (CLINT_MTIME, 8)]
        .into_iter()
        .find(|(base, width)| addr >= *base && addr < base + width)
}

impl Device for Clint {
    fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        let len = access_bytes(size).ok_or(Exception::LoadAccessFault(addr))? as u64;
        let Some((base, width)) = layout(addr) else {
            return Ok(0);
        };
        let value = match base {
            CLINT_MSIP => self.msip,
            CLINT_MTIMECMP => self.mtimecmp,
            _ => self.mtime,
        };
        let shift = addr - base;
        if shift + len > width {
            return Err(Exception::LoadAccessFault(addr));
        }
        Ok((value >> (shift * 8)) & mask(len))
    }

    fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        let len = access_bytes(size).ok_or(Exception::StoreAmoAccessFault(addr))? as u64;
        let Some((base, width)) = layout(addr) else {
            return Ok(());
        };
        let shift = addr - base;
        if shift + len > width {
            return Err(Exception::StoreAmoAccessFault(addr));
        }
        let slot = match base {
            CLINT_MSIP => &mut self.msip,
            CLINT_MTIMECMP => &mut self.mtimecmp,
            _ => &mut self.mtime,
        };
        let field = mask(len) << (shift * 8);
        *slot = (*slot & !field) | ((value << (shift * 8)) & field);
        Ok(())
    }
}

fn mask(len: u64) -> u64 {
    if len >= 8 {
        u64::MAX
    } else {
        (1u64 << (len * 8)) - 1
    }
}
