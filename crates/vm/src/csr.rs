//! Control and status registers.

use std::fmt::Write;

pub const NUM_CSRS: usize = 4096;

// Unprivileged counters (read-only shadows).
pub const CYCLE: u16 = 0xc00;
pub const TIME: u16 = 0xc01;
pub const INSTRET: u16 = 0xc02;

// Supervisor-level CSRs.
pub const SSTATUS: u16 = 0x100;
pub const SIE: u16 = 0x104;
pub const STVEC: u16 = 0x105;
pub const SSCRATCH: u16 = 0x140;
pub const SEPC: u16 = 0x141;
pub const SCAUSE: u16 = 0x142;
pub const STVAL: u16 = 0x143;
pub const SIP: u16 = 0x144;
pub const SATP: u16 = 0x180;

// Machine-level CSRs.
pub const MSTATUS: u16 = 0x300;
pub const MISA: u16 = 0x301;
pub const MEDELEG: u16 = 0x302;
pub const MIDELEG: u16 = 0x303;
pub const MIE: u16 = 0x304;
pub const MTVEC: u16 = 0x305;
pub const MCOUNTEREN: u16 = 0x306;
pub const MSCRATCH: u16 = 0x340;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MTVAL: u16 = 0x343;
pub const MIP: u16 = 0x344;
pub const MCYCLE: u16 = 0xb00;
pub const MINSTRET: u16 = 0xb02;
pub const MVENDORID: u16 = 0xf11;
pub const MARCHID: u16 = 0xf12;
pub const MIMPID: u16 = 0xf13;
pub const MHARTID: u16 = 0xf14;

// mstatus / sstatus fields.
pub const MASK_SIE: u64 = 1 << 1;
pub const MASK_MIE: u64 = 1 << 3;
pub const MASK_SPIE: u64 = 1 << 5;
pub const MASK_UBE: u64 = 1 << 6;
pub const MASK_MPIE: u64 = 1 << 7;
pub const MASK_SPP: u64 = 1 << 8;
pub const MASK_MPP: u64 = 0b11 << 11;
pub const MASK_FS: u64 = 0b11 << 13;
pub const MASK_XS: u64 = 0b11 << 15;
pub const MASK_MPRV: u64 = 1 << 17;
pub const MASK_SUM: u64 = 1 << 18;
pub const MASK_MXR: u64 = 1 << 19;
pub const MASK_UXL: u64 = 0b11 << 32;
pub const MASK_SD: u64 = 1 << 63;

/// The view of mstatus that sstatus exposes.
pub const MASK_SSTATUS: u64 = MASK_SIE
    | MASK_SPIE
    | MASK_UBE
    | MASK_SPP
    | MASK_FS
    | MASK_XS
    | MASK_SUM
    | MASK_MXR
    | MASK_UXL
    | MASK_SD;

// mip / mie bits.
pub const MASK_SSIP: u64 = 1 << 1;
pub const MASK_MSIP: u64 = 1 << 3;
pub const MASK_STIP: u64 = 1 << 5;
pub const MASK_MTIP: u64 = 1 << 7;
pub const MASK_SEIP: u64 = 1 << 9;
pub const MASK_MEIP: u64 = 1 << 11;

/// The interrupt bits visible through sie / sip.
pub const MASK_SINTERRUPTS: u64 = MASK_SSIP | MASK_STIP | MASK_SEIP;

/// RV64 (MXL = 2) with the A, I, M, S and U extensions.
pub const MISA_RV64IMASU: u64 =
    (2 << 62) | (1 << 0) | (1 << 8) | (1 << 12) | (1 << 18) | (1 << 20);

pub const SATP_MODE_BARE: u64 = 0;
pub const SATP_MODE_SV39: u64 = 8;

pub struct Csr {
    csrs: Vec<u64>,
}

impl Default for Csr {
    fn default() -> Self {
        Self::new()
    }
}

impl Csr {
    pub fn new() -> Self {
        let mut csrs = vec![0u64; NUM_CSRS];
        csrs[MISA as usize] = MISA_RV64IMASU;
        Self { csrs }
    }

    /// Reads a CSR. Supervisor views are masked projections of the machine
    /// registers; the user counters shadow their machine counterparts.
    pub fn load(&self, addr: u16) -> u64 {
        match addr {
            SSTATUS => self.raw(MSTATUS) & MASK_SSTATUS,
            SIE => self.raw(MIE) & self.raw(MIDELEG),
            SIP => self.raw(MIP) & self.raw(MIDELEG),
            CYCLE | TIME => self.raw(MCYCLE),
            INSTRET => self.raw(MINSTRET),
            _ => self.raw(addr),
        }
    }

    pub fn store(&mut self, addr: u16, value: u64) {
        match addr {
            SSTATUS => {
                let mstatus = self.raw(MSTATUS);
                self.set_raw(MSTATUS, (mstatus & !MASK_SSTATUS) | (value & MASK_SSTATUS));
            }
            SIE => {
                let mask = self.raw(MIDELEG);
                let mie = self.raw(MIE);
                self.set_raw(MIE, (mie & !mask) | (value & mask));
            }
            SIP => {
                let mask = self.raw(MIDELEG) & MASK_SSIP;
                let mip = self.raw(MIP);
                self.set_raw(MIP, (mip & !mask) | (value & mask));
            }
            SATP => {
                // WARL: unsupported translation modes leave satp unchanged
                let mode = value >> 60;
                if mode == SATP_MODE_BARE || mode == SATP_MODE_SV39 {
                    self.set_raw(SATP, value);
                }
            }
            // machine-level interrupts cannot be delegated
            MIDELEG => self.set_raw(MIDELEG, value & MASK_SINTERRUPTS),
            MISA | MVENDORID | MARCHID | MIMPID | MHARTID => {}
            _ => self.set_raw(addr, value),
        }
    }

    /// Sets or clears `mask` in a CSR without going through the
    /// supervisor projections.
    pub fn set_bits(&mut self, addr: u16, mask: u64, on: bool) {
        let value = self.raw(addr);
        self.set_raw(addr, if on { value | mask } else { value & !mask });
    }

    /// Advances mcycle and minstret by one retired instruction.
    pub fn tick(&mut self) {
        let cycle = self.raw(MCYCLE).wrapping_add(1);
        self.set_raw(MCYCLE, cycle);
        let instret = self.raw(MINSTRET).wrapping_add(1);
        self.set_raw(MINSTRET, instret);
    }

    /// CSRs in `0xc00..` and `0xf00..` have address bits 11:10 set to `0b11`.
    pub fn is_read_only(addr: u16) -> bool {
        (addr >> 10) & 0b11 == 0b11
    }

    /// Lowest privilege level (as mode bits) allowed to access `addr`.
    pub fn required_privilege(addr: u16) -> u64 {
        ((addr >> 8) & 0b11) as u64
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        let rows: [[(&str, u16); 4]; 3] = [
            [("mstatus", MSTATUS), ("mtvec", MTVEC), ("mepc", MEPC), ("mcause", MCAUSE)],
            [("sstatus", SSTATUS), ("stvec", STVEC), ("sepc", SEPC), ("scause", SCAUSE)],
            [("mtval", MTVAL), ("stval", STVAL), ("mip", MIP), ("satp", SATP)],
        ];
        for row in rows {
            let line = row
                .iter()
                .map(|(name, addr)| format!("{:>8} = 0x{:016x}", name, self.load(*addr)))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "{}", line);
        }
        out
    }

    fn raw(&self, addr: u16) -> u64 {
        self.csrs[addr as usize % NUM_CSRS]
    }

    fn set_raw(&mut self, addr: u16, value: u64) {
        self.csrs[addr as usize % NUM_CSRS] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sstatus_is_a_window_into_mstatus() {
        let mut csr = Csr::new();
        csr.store(MSTATUS, MASK_MIE | MASK_SIE | MASK_MPP);
        assert_eq!(csr.load(SSTATUS), MASK_SIE);

        csr.store(SSTATUS, MASK_SPP);
        // machine-only fields survive a supervisor write
        assert_eq!(csr.load(MSTATUS), MASK_MIE | MASK_MPP | MASK_SPP);
    }

    #[test]
    fn sie_respects_delegation() {
        let mut csr = Csr::new();
        csr.store(MIE, MASK_MTIP | MASK_STIP);
        assert_eq!(csr.load(SIE), 0);

        csr.store(MIDELEG, MASK_STIP);
        assert_eq!(csr.load(SIE), MASK_STIP);
        csr.store(SIE, 0);
        assert_eq!(csr.load(MIE), MASK_MTIP);
    }

    #[test]
    fn mideleg_keeps_machine_interrupts_in_machine_mode() {
        let mut csr = Csr::new();
        csr.store(MIDELEG, u64::MAX);
        assert_eq!(csr.load(MIDELEG), MASK_SSIP | MASK_STIP | MASK_SEIP);
    }

    #[test]
    fn misa_reports_rv64_and_ignores_writes() {
        let mut csr = Csr::new();
        csr.store(MISA, 0);
        assert_eq!(csr.load(MISA) >> 62, 2);
        assert_ne!(csr.load(MISA) & (1 << 12), 0);
    }

    #[test]
    fn satp_ignores_unsupported_modes() {
        let mut csr = Csr::new();
        csr.store(SATP, (9 << 60) | 0x1234);
        assert_eq!(csr.load(SATP), 0);
        csr.store(SATP, (8 << 60) | 0x1234);
        assert_eq!(csr.load(SATP), (8 << 60) | 0x1234);
    }

    #[test]
    fn address_encodes_access_rules() {
        assert!(Csr::is_read_only(MHARTID));
        assert!(Csr::is_read_only(CYCLE));
        assert!(!Csr::is_read_only(MSTATUS));
        assert_eq!(Csr::required_privilege(MSTATUS), 0b11);
        assert_eq!(Csr::required_privilege(SATP), 0b01);
        assert_eq!(Csr::required_privilege(CYCLE), 0b00);
    }
}
