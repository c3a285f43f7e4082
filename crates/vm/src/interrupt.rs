use crate::bus::UART_IRQ;
use crate::cpu::{Cpu, Mode};
use crate::csr::*;

/// Asynchronous interrupts, in the order they are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    MachineExternal,
    MachineSoftware,
    MachineTimer,
    SupervisorExternal,
    SupervisorSoftware,
    SupervisorTimer,
}

impl Interrupt {
    pub const PRIORITY: [Interrupt; 6] = [
        Interrupt::MachineExternal,
        Interrupt::MachineSoftware,
        Interrupt::MachineTimer,
        Interrupt::SupervisorExternal,
        Interrupt::SupervisorSoftware,
        Interrupt::SupervisorTimer,
    ];

    /// Exception code, without the interrupt bit.
    pub fn code(&self) -> u64 {
        match self {
            Interrupt::SupervisorSoftware => 1,
            Interrupt::MachineSoftware => 3,
            Interrupt::SupervisorTimer => 5,
            Interrupt::MachineTimer => 7,
            Interrupt::SupervisorExternal => 9,
            Interrupt::MachineExternal => 11,
        }
    }

    /// The corresponding bit in mip / mie.
    pub fn mask(&self) -> u64 {
        1 << self.code()
    }
}

impl Cpu {
    /// Latches device interrupt lines into mip and returns the highest
    /// priority interrupt that is pending, enabled and may preempt the
    /// current mode. The returned interrupt's pending bit is cleared.
    pub fn check_pending_interrupt(&mut self) -> Option<Interrupt> {
        if self.bus.uart.is_interrupting() {
            self.bus.plic.raise(UART_IRQ);
            self.csr.set_bits(MIP, MASK_SEIP, true);
        }
        let (msip, mtip) = self.bus.clint.pending();
        self.csr.set_bits(MIP, MASK_MSIP, msip);
        self.csr.set_bits(MIP, MASK_MTIP, mtip);

        let pending = self.csr.load(MIE) & self.csr.load(MIP);
        if pending == 0 {
            return None;
        }

        let mstatus = self.csr.load(MSTATUS);
        let mideleg = self.csr.load(MIDELEG);
        let irq = Interrupt::PRIORITY.into_iter().find(|irq| {
            if pending & irq.mask() == 0 {
                return false;
            }
            if mideleg & irq.mask() != 0 {
                // delegated: taken in S-mode, never preempts M-mode
                match self.mode {
                    Mode::User => true,
                    Mode::Supervisor => mstatus & MASK_SIE != 0,
                    Mode::Machine => false,
                }
            } else {
                match self.mode {
                    Mode::Machine => mstatus & MASK_MIE != 0,
                    _ => true,
                }
            }
        })?;

        self.csr.set_bits(MIP, irq.mask(), false);
        Some(irq)
    }
}
