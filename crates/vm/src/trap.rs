use crate::cpu::{Cpu, Mode};
use crate::csr::*;
use crate::exception::Exception;
use crate::interrupt::Interrupt;

const INTERRUPT_BIT: u64 = 1 << 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Exception(Exception),
    Interrupt(Interrupt),
}

impl Trap {
    /// Value written to `xcause`.
    pub fn cause(&self) -> u64 {
        match self {
            Trap::Exception(e) => e.code(),
            Trap::Interrupt(i) => INTERRUPT_BIT | i.code(),
        }
    }
}

impl Cpu {
    /// Enters the trap handler for `trap`. `epc` is the pc of the faulting
    /// instruction for exceptions, or of the next instruction to run for
    /// interrupts.
    ///
    /// Traps raised in U- or S-mode go to S-mode when the matching bit is
    /// set in medeleg (exceptions) or mideleg (interrupts); everything else
    /// goes to M-mode.
    pub fn take_trap(&mut self, trap: Trap, epc: u64) {
        let previous = self.mode;
        let (code, tval, deleg, is_interrupt) = match trap {
            Trap::Exception(e) => (e.code(), e.value(), self.csr.load(MEDELEG), false),
            Trap::Interrupt(i) => (i.code(), 0, self.csr.load(MIDELEG), true),
        };
        let cause = trap.cause();

        if self.verbose {
            self.trace(format_args!(
                "TRAP {:?} at 0x{:016x} from {:?}",
                trap, epc, previous
            ));
        }

        if previous <= Mode::Supervisor && (deleg >> code) & 1 == 1 {
            self.mode = Mode::Supervisor;
            self.pc = trap_vector(self.csr.load(STVEC), code, is_interrupt);
            self.csr.store(SEPC, epc & !1);
            self.csr.store(SCAUSE, cause);
            self.csr.store(STVAL, tval);

            let mut status = self.csr.load(SSTATUS);
            status = set_field(status, MASK_SPIE, status & MASK_SIE != 0);
            status &= !MASK_SIE;
            status = set_field(status, MASK_SPP, previous != Mode::User);
            self.csr.store(SSTATUS, status);
        } else {
            self.mode = Mode::Machine;
            self.pc = trap_vector(self.csr.load(MTVEC), code, is_interrupt);
            self.csr.store(MEPC, epc & !1);
            self.csr.store(MCAUSE, cause);
            self.csr.store(MTVAL, tval);

            let mut status = self.csr.load(MSTATUS);
            status = set_field(status, MASK_MPIE, status & MASK_MIE != 0);
            status &= !MASK_MIE;
            status = (status & !MASK_MPP) | ((previous as u64) << 11);
            self.csr.store(MSTATUS, status);
        }
    }

    pub(crate) fn mret(&mut self) {
        let mut status = self.csr.load(MSTATUS);
        let mode = Mode::from_bits((status & MASK_MPP) >> 11);

        status = set_field(status, MASK_MIE, status & MASK_MPIE != 0);
        status |= MASK_MPIE;
        status &= !MASK_MPP;
        if mode != Mode::Machine {
            status &= !MASK_MPRV;
        }
        self.csr.store(MSTATUS, status);

        self.mode = mode;
        self.pc = self.csr.load(MEPC);
    }

    pub(crate) fn sret(&mut self) {
        let mut status = self.csr.load(MSTATUS);
        let mode = if status & MASK_SPP != 0 {
            Mode::Supervisor
        } else {
            Mode::User
        };

        status = set_field(status, MASK_SIE, status & MASK_SPIE != 0);
        status |= MASK_SPIE;
        status &= !MASK_SPP;
        status &= !MASK_MPRV;
        self.csr.store(MSTATUS, status);

        self.mode = mode;
        self.pc = self.csr.load(SEPC);
    }
}

/// Handler address for `xtvec`. Vectored mode (low bits `01`) offsets
/// interrupts by `4 * code`; exceptions always use the base.
fn trap_vector(tvec: u64, code: u64, is_interrupt: bool) -> u64 {
    let base = tvec & !0b11;
    if tvec & 0b11 == 1 && is_interrupt {
        base.wrapping_add(4 * code)
    } else {
        base
    }
}

fn set_field(value: u64, mask: u64, on: bool) -> u64 {
    if on {
        value | mask
    } else {
        value & !mask
    }
}
