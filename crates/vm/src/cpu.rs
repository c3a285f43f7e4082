use core::cell::RefCell;
use core::fmt::{self, Write};
use std::rc::Rc;

use crate::bus::{Bus, DRAM_BASE};
use crate::csr::{self, Csr};
use crate::decoder::decode_full;
use crate::exception::Exception;
use crate::mmu::AccessType;
use crate::registers::{abi_name, Register};

/// Privilege level. The discriminant is the two-bit encoding used in
/// `mstatus.MPP` and in CSR addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    User = 0b00,
    Supervisor = 0b01,
    Machine = 0b11,
}

impl Mode {
    /// Decodes a two-bit privilege field. The reserved value `0b10` reads
    /// as U-mode.
    pub fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0b11 => Mode::Machine,
            0b01 => Mode::Supervisor,
            _ => Mode::User,
        }
    }
}

/// A single RV64 hart attached to a [`Bus`].
pub struct Cpu {
    /// Integer registers. `regs[0]` is always zero.
    pub regs: [u64; 32],
    pub pc: u64,
    pub mode: Mode,
    pub bus: Bus,
    pub csr: Csr,
    pub verbose: bool,
    verbose_writer: Option<Rc<RefCell<dyn Write>>>,
    reservation: Option<u64>,
}

impl Cpu {
    /// Resets the hart: M-mode, pc at the start of DRAM and sp at its end.
    pub fn new(bus: Bus) -> Self {
        let mut regs = [0u64; 32];
        regs[Register::Sp.index()] = bus.dram.end();
        Self {
            regs,
            pc: DRAM_BASE,
            mode: Mode::Machine,
            bus,
            csr: Csr::new(),
            verbose: false,
            verbose_writer: None,
            reservation: None,
        }
    }

    pub fn set_verbose_writer(&mut self, writer: Rc<RefCell<dyn Write>>) {
        self.verbose_writer = Some(writer);
    }

    /// Fetches, decodes and executes one instruction.
    ///
    /// The pc is advanced past the instruction before it executes, so jumps
    /// and traps overwrite it. On error the pc of the faulting instruction
    /// is still available to the caller as the value it saved before the
    /// call.
    pub fn step(&mut self) -> Result<(), Exception> {
        let pc = self.pc;
        let word = self.fetch()?;
        self.pc = pc.wrapping_add(4);

        let instr = decode_full(word).ok_or(Exception::IllegalInstruction(word as u64))?;
        if self.verbose {
            self.trace(format_args!(
                "PC = 0x{:016x}, Bytes = [{}], Instr = {}",
                pc,
                hex::encode(word.to_le_bytes()),
                instr.pretty_print()
            ));
        }

        self.execute(instr, pc, word)?;
        self.csr.tick();
        Ok(())
    }

    fn fetch(&mut self) -> Result<u32, Exception> {
        let pc = self.pc;
        if pc % 4 != 0 {
            return Err(Exception::InstructionAddressMisaligned(pc));
        }
        let paddr = self.translate(pc, AccessType::Instruction)?;
        self.bus
            .load(paddr, 32)
            .map(|word| word as u32)
            .map_err(|_| Exception::InstructionAccessFault(pc))
    }

    pub fn read_reg(&self, r: usize) -> u64 {
        self.regs[r]
    }

    /// Writes `value` to `rd`; writes to x0 are dropped.
    pub fn write_reg(&mut self, rd: usize, value: u64) {
        if rd != 0 {
            self.regs[rd] = value;
        }
    }

    /// Loads `size` bits from virtual address `addr`, zero-extended.
    pub fn load(&mut self, addr: u64, size: u8) -> Result<u64, Exception> {
        let paddr = self.translate(addr, AccessType::Load)?;
        self.bus.load(paddr, size).map_err(|e| match e {
            Exception::LoadAccessFault(_) => Exception::LoadAccessFault(addr),
            other => other,
        })
    }

    /// Stores the low `size` bits of `value` to virtual address `addr`.
    pub fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        let paddr = self.translate(addr, AccessType::Store)?;
        if self.reservation == Some(paddr) {
            self.reservation = None;
        }
        self.bus.store(paddr, size, value).map_err(|e| match e {
            Exception::StoreAmoAccessFault(_) => Exception::StoreAmoAccessFault(addr),
            other => other,
        })
    }

    /// Atomic read-modify-write at `addr`: one store-type translation, faults
    /// reported as store/AMO. Returns the old value.
    pub(crate) fn amo_rmw(
        &mut self,
        addr: u64,
        size: u8,
        f: impl FnOnce(u64) -> u64,
    ) -> Result<u64, Exception> {
        let paddr = self.translate(addr, AccessType::Store)?;
        let old = self
            .bus
            .load(paddr, size)
            .map_err(|_| Exception::StoreAmoAccessFault(addr))?;
        if self.reservation == Some(paddr) {
            self.reservation = None;
        }
        self.bus
            .store(paddr, size, f(old))
            .map_err(|_| Exception::StoreAmoAccessFault(addr))?;
        Ok(old)
    }

    pub(crate) fn reserve(&mut self, addr: u64) -> Result<(), Exception> {
        self.reservation = Some(self.translate(addr, AccessType::Load)?);
        Ok(())
    }

    /// Consumes the reservation, returning whether it covered `addr`.
    pub(crate) fn take_reservation(&mut self, addr: u64) -> Result<bool, Exception> {
        let paddr = self.translate(addr, AccessType::Store)?;
        Ok(self.reservation.take() == Some(paddr))
    }

    pub fn load_csr(&self, addr: u16) -> u64 {
        self.csr.load(addr)
    }

    pub fn store_csr(&mut self, addr: u16, value: u64) {
        self.csr.store(addr, value)
    }

    /// Whether the current mode may access `addr`, and write it if `write`.
    pub(crate) fn csr_accessible(&self, addr: u16, write: bool) -> bool {
        if (self.mode as u64) < Csr::required_privilege(addr) {
            return false;
        }
        if write && Csr::is_read_only(addr) {
            return false;
        }
        // satp is off-limits to S-mode when mstatus.TVM is set
        !(addr == csr::SATP
            && self.mode == Mode::Supervisor
            && self.csr.load(csr::MSTATUS) & (1 << 20) != 0)
    }

    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        match &self.verbose_writer {
            Some(writer) => {
                let _ = writeln!(writer.borrow_mut(), "{}", args);
            }
            None => println!("{}", args),
        }
    }

    pub fn dump_registers(&self) -> String {
        let mut out = String::new();
        for row in 0..8 {
            let line = (0..4)
                .map(|col| {
                    let i = row * 4 + col;
                    format!("x{:<2}({:>4}) = 0x{:016x}", i, abi_name(i), self.regs[i])
                })
                .collect::<Vec<_>>()
                .join("  ");
            let _ = writeln!(out, "{}", line);
        }
        let _ = writeln!(out, "pc = 0x{:016x}  mode = {:?}", self.pc, self.mode);
        out
    }

    pub fn dump_csrs(&self) -> String {
        self.csr.dump()
    }
}
