//! Sv39 address translation.

use crate::cpu::{Cpu, Mode};
use crate::csr::*;
use crate::exception::Exception;

pub const PAGE_SIZE: u64 = 4096;
const LEVELS: usize = 3;
const PTE_SIZE: u64 = 8;

const PTE_V: u64 = 1 << 0;
const PTE_R: u64 = 1 << 1;
const PTE_W: u64 = 1 << 2;
const PTE_X: u64 = 1 << 3;
const PTE_U: u64 = 1 << 4;
const PTE_A: u64 = 1 << 6;
const PTE_D: u64 = 1 << 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Instruction,
    Load,
    Store,
}

impl AccessType {
    fn page_fault(self, addr: u64) -> Exception {
        match self {
            AccessType::Instruction => Exception::InstructionPageFault(addr),
            AccessType::Load => Exception::LoadPageFault(addr),
            AccessType::Store => Exception::StoreAmoPageFault(addr),
        }
    }

    fn access_fault(self, addr: u64) -> Exception {
        match self {
            AccessType::Instruction => Exception::InstructionAccessFault(addr),
            AccessType::Load => Exception::LoadAccessFault(addr),
            AccessType::Store => Exception::StoreAmoAccessFault(addr),
        }
    }
}

impl Cpu {
    /// Translates a virtual address to a physical one.
    ///
    /// Translation applies when satp selects Sv39 and the effective mode is
    /// S or U. Data accesses use mstatus.MPP as the effective mode when
    /// mstatus.MPRV is set. The walker sets the A and D bits of the leaf
    /// entry it uses.
    pub fn translate(&mut self, addr: u64, access: AccessType) -> Result<u64, Exception> {
        let satp = self.csr.load(SATP);
        if satp >> 60 != SATP_MODE_SV39 {
            return Ok(addr);
        }

        let mstatus = self.csr.load(MSTATUS);
        let mode = match access {
            AccessType::Instruction => self.mode,
            _ if mstatus & MASK_MPRV != 0 => Mode::from_bits((mstatus & MASK_MPP) >> 11),
            _ => self.mode,
        };
        if mode == Mode::Machine {
            return Ok(addr);
        }

        // bits 63:39 must all equal bit 38
        let upper = (addr as i64) >> 38;
        if upper != 0 && upper != -1 {
            return Err(access.page_fault(addr));
        }

        let vpn = [
            (addr >> 12) & 0x1ff,
            (addr >> 21) & 0x1ff,
            (addr >> 30) & 0x1ff,
        ];

        let mut table = (satp & 0x0fff_ffff_ffff) * PAGE_SIZE;
        let mut level = LEVELS - 1;
        let (pte, pte_addr) = loop {
            let pte_addr = table + vpn[level] * PTE_SIZE;
            let pte = self
                .bus
                .load(pte_addr, 64)
                .map_err(|_| access.access_fault(addr))?;

            if pte & PTE_V == 0 || (pte & PTE_R == 0 && pte & PTE_W != 0) {
                return Err(access.page_fault(addr));
            }
            if pte & (PTE_R | PTE_X) != 0 {
                break (pte, pte_addr);
            }
            if level == 0 {
                return Err(access.page_fault(addr));
            }
            level -= 1;
            table = ((pte >> 10) & 0x0fff_ffff_ffff) * PAGE_SIZE;
        };

        let permitted = match access {
            AccessType::Instruction => pte & PTE_X != 0,
            AccessType::Load => {
                pte & PTE_R != 0 || (mstatus & MASK_MXR != 0 && pte & PTE_X != 0)
            }
            AccessType::Store => pte & PTE_W != 0,
        };
        let user_page = pte & PTE_U != 0;
        let privilege_ok = match mode {
            Mode::User => user_page,
            _ => {
                !user_page
                    || (access != AccessType::Instruction && mstatus & MASK_SUM != 0)
            }
        };
        if !permitted || !privilege_ok {
            return Err(access.page_fault(addr));
        }

        let ppn = [
            (pte >> 10) & 0x1ff,
            (pte >> 19) & 0x1ff,
            (pte >> 28) & 0x03ff_ffff,
        ];
        // superpages must be aligned to their size
        if ppn[..level].iter().any(|p| *p != 0) {
            return Err(access.page_fault(addr));
        }

        let mut updated = pte | PTE_A;
        if access == AccessType::Store {
            updated |= PTE_D;
        }
        if updated != pte {
            self.bus
                .store(pte_addr, 64, updated)
                .map_err(|_| access.access_fault(addr))?;
        }

        let offset = addr & 0xfff;
        let paddr = match level {
            0 => (ppn[2] << 30) | (ppn[1] << 21) | (ppn[0] << 12) | offset,
            1 => (ppn[2] << 30) | (ppn[1] << 21) | (vpn[0] << 12) | offset,
            _ => (ppn[2] << 30) | (vpn[1] << 21) | (vpn[0] << 12) | offset,
        };
        Ok(paddr)
    }
}
