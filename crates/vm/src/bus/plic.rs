use super::Device;
use crate::exception::Exception;

/// Platform-level interrupt controller. Only the supervisor context of
/// hart 0 is modelled.
pub const PLIC_BASE: u64 = 0xc00_0000;
pub const PLIC_SIZE: u64 = 0x400_0000;

pub const PLIC_PENDING: u64 = PLIC_BASE + 0x1000;
pub const PLIC_SENABLE: u64 = PLIC_BASE + 0x2080;
pub const PLIC_SPRIORITY: u64 = PLIC_BASE + 0x20_1000;
pub const PLIC_SCLAIM: u64 = PLIC_BASE + 0x20_1004;

/// Interrupt sources 1..32; source 0 means "none".
const PLIC_SOURCES: u64 = 32;

#[derive(Default)]
pub struct Plic {
    pending: u32,
    senable: u32,
    spriority: u32,
    sclaim: u32,
}

impl Plic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `irq` as pending and makes it the claimable source.
    pub fn raise(&mut self, irq: u64) {
        if irq == 0 || irq >= PLIC_SOURCES {
            log::warn!("plic: ignoring interrupt source {}", irq);
            return;
        }
        self.pending |= 1 << irq;
        self.sclaim = irq as u32;
    }
}

impl Device for Plic {
    fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != 32 {
            return Err(Exception::LoadAccessFault(addr));
        }
        let value = match addr {
            PLIC_PENDING => self.pending,
            PLIC_SENABLE => self.senable,
            PLIC_SPRIORITY => self.spriority,
            PLIC_SCLAIM => self.sclaim,
            _ => 0,
        };
        Ok(u64::from(value))
    }

    fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if size != 32 {
            return Err(Exception::StoreAmoAccessFault(addr));
        }
        let value = value as u32;
        match addr {
            PLIC_PENDING => self.pending = value,
            PLIC_SENABLE => self.senable = value,
            PLIC_SPRIORITY => self.spriority = value,
            PLIC_SCLAIM => {
                // completion: writing the claimed id back retires it
                if u64::from(value) < PLIC_SOURCES {
                    self.pending &= !(1 << value);
                }
                self.sclaim = value;
            }
            _ => {}
        }
        Ok(())
    }
}
