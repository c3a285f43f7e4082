use crate::cpu::{Cpu, Mode};
use crate::exception::Exception;
use crate::instruction::{AluOp, AmoOp, BranchCond, CsrOp, Instruction, Width};

impl Cpu {
    /// Executes a decoded instruction. `pc` is the address it was fetched
    /// from; `self.pc` already points at the next instruction. `word` is the
    /// raw encoding, reported as `tval` for illegal instructions.
    pub(crate) fn execute(
        &mut self,
        instr: Instruction,
        pc: u64,
        word: u32,
    ) -> Result<(), Exception> {
        let illegal = Exception::IllegalInstruction(word as u64);

        match instr {
            Instruction::Lui { rd, imm } => self.write_reg(rd, imm as u64),
            Instruction::Auipc { rd, imm } => self.write_reg(rd, pc.wrapping_add(imm as u64)),

            Instruction::Jal { rd, offset } => {
                self.jump(pc.wrapping_add(offset as u64))?;
                self.write_reg(rd, pc.wrapping_add(4));
            }
            Instruction::Jalr { rd, rs1, offset } => {
                let target = self.read_reg(rs1).wrapping_add(offset as u64) & !1;
                self.jump(target)?;
                self.write_reg(rd, pc.wrapping_add(4));
            }
            Instruction::Branch { cond, rs1, rs2, offset } => {
                let (a, b) = (self.read_reg(rs1), self.read_reg(rs2));
                let taken = match cond {
                    BranchCond::Eq => a == b,
                    BranchCond::Ne => a != b,
                    BranchCond::Lt => (a as i64) < (b as i64),
                    BranchCond::Ge => (a as i64) >= (b as i64),
                    BranchCond::Ltu => a < b,
                    BranchCond::Geu => a >= b,
                };
                if taken {
                    self.jump(pc.wrapping_add(offset as u64))?;
                }
            }

            Instruction::Load { width, rd, rs1, offset } => {
                let addr = self.read_reg(rs1).wrapping_add(offset as u64);
                let raw = self.load(addr, width.bits())?;
                self.write_reg(rd, width.extend(raw));
            }
            Instruction::Store { width, rs1, rs2, offset } => {
                let addr = self.read_reg(rs1).wrapping_add(offset as u64);
                self.store(addr, width.bits(), self.read_reg(rs2))?;
            }

            Instruction::OpImm { op, rd, rs1, imm } => {
                let value = alu(op, self.read_reg(rs1), imm as u64);
                self.write_reg(rd, value);
            }
            Instruction::OpImm32 { op, rd, rs1, imm } => {
                let value = alu32(op, self.read_reg(rs1), imm as u64);
                self.write_reg(rd, value);
            }
            Instruction::Op { op, rd, rs1, rs2 } => {
                let value = alu(op, self.read_reg(rs1), self.read_reg(rs2));
                self.write_reg(rd, value);
            }
            Instruction::Op32 { op, rd, rs1, rs2 } => {
                let value = alu32(op, self.read_reg(rs1), self.read_reg(rs2));
                self.write_reg(rd, value);
            }

            // single hart, no caches: ordering and instruction fetch are coherent
            Instruction::Fence | Instruction::FenceI => {}

            Instruction::Ecall => {
                return Err(match self.mode {
                    Mode::User => Exception::EnvironmentCallFromUMode,
                    Mode::Supervisor => Exception::EnvironmentCallFromSMode,
                    Mode::Machine => Exception::EnvironmentCallFromMMode,
                });
            }
            Instruction::Ebreak => return Err(Exception::Breakpoint(pc)),

            Instruction::Lr { width, rd, rs1 } => {
                let addr = self.read_reg(rs1);
                if addr % (width.bits() as u64 / 8) != 0 {
                    return Err(Exception::LoadAddressMisaligned(addr));
                }
                let raw = self.load(addr, width.bits())?;
                self.reserve(addr)?;
                self.write_reg(rd, sign_extend(width, raw));
            }
            Instruction::Sc { width, rd, rs1, rs2 } => {
                let addr = self.read_reg(rs1);
                if addr % (width.bits() as u64 / 8) != 0 {
                    return Err(Exception::StoreAmoAddressMisaligned(addr));
                }
                if self.take_reservation(addr)? {
                    self.store(addr, width.bits(), self.read_reg(rs2))?;
                    self.write_reg(rd, 0);
                } else {
                    self.write_reg(rd, 1);
                }
            }
            Instruction::Amo { op, width, rd, rs1, rs2 } => {
                let addr = self.read_reg(rs1);
                if addr % (width.bits() as u64 / 8) != 0 {
                    return Err(Exception::StoreAmoAddressMisaligned(addr));
                }
                let src = self.read_reg(rs2);
                let raw = self.amo_rmw(addr, width.bits(), |raw| {
                    amo(op, width, sign_extend(width, raw), src)
                })?;
                self.write_reg(rd, sign_extend(width, raw));
            }

            Instruction::Csr { op, rd, rs1, csr } => {
                let src = self.read_reg(rs1);
                self.csr_op(op, rd, csr, src, rs1 != 0).ok_or(illegal)?;
            }
            Instruction::CsrImm { op, rd, uimm, csr } => {
                self.csr_op(op, rd, csr, uimm, uimm != 0).ok_or(illegal)?;
            }

            Instruction::Mret => {
                if self.mode != Mode::Machine {
                    return Err(illegal);
                }
                self.mret();
            }
            Instruction::Sret => {
                if self.mode < Mode::Supervisor {
                    return Err(illegal);
                }
                self.sret();
            }
            Instruction::Wfi => {}
            Instruction::SfenceVma { .. } => {
                if self.mode < Mode::Supervisor {
                    return Err(illegal);
                }
            }
        }
        Ok(())
    }

    /// Sets the pc to `target`, which must be 4-byte aligned.
    fn jump(&mut self, target: u64) -> Result<(), Exception> {
        if target % 4 != 0 {
            return Err(Exception::InstructionAddressMisaligned(target));
        }
        self.pc = target;
        Ok(())
    }

    /// CSRRW/CSRRS/CSRRC and their immediate forms. Set/clear with a zero
    /// source (x0 or uimm 0) only reads. Returns `None` when the access is
    /// not permitted.
    fn csr_op(
        &mut self,
        op: CsrOp,
        rd: usize,
        addr: u16,
        src: u64,
        src_nonzero: bool,
    ) -> Option<()> {
        let writes = match op {
            CsrOp::ReadWrite => true,
            CsrOp::ReadSet | CsrOp::ReadClear => src_nonzero,
        };
        if !self.csr_accessible(addr, writes) {
            return None;
        }

        let old = self.load_csr(addr);
        if writes {
            let new = match op {
                CsrOp::ReadWrite => src,
                CsrOp::ReadSet => old | src,
                CsrOp::ReadClear => old & !src,
            };
            self.store_csr(addr, new);
        }
        self.write_reg(rd, old);
        Some(())
    }
}

fn sign_extend(width: Width, raw: u64) -> u64 {
    match width {
        Width::Word => raw as i32 as i64 as u64,
        _ => raw,
    }
}

/// 64-bit ALU. Shift amounts use the low six bits of `b`.
fn alu(op: AluOp, a: u64, b: u64) -> u64 {
    let shamt = (b & 0x3f) as u32;
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Sll => a << shamt,
        AluOp::Slt => ((a as i64) < (b as i64)) as u64,
        AluOp::Sltu => (a < b) as u64,
        AluOp::Xor => a ^ b,
        AluOp::Srl => a >> shamt,
        AluOp::Sra => ((a as i64) >> shamt) as u64,
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Mulh => ((a as i64 as i128 * b as i64 as i128) >> 64) as u64,
        AluOp::Mulhsu => ((a as i64 as i128 * b as i128) >> 64) as u64,
        AluOp::Mulhu => ((a as u128 * b as u128) >> 64) as u64,
        // division by zero yields all ones; the remainder is the dividend
        AluOp::Div => match b {
            0 => u64::MAX,
            _ => (a as i64).wrapping_div(b as i64) as u64,
        },
        AluOp::Divu => a.checked_div(b).unwrap_or(u64::MAX),
        AluOp::Rem => match b {
            0 => a,
            _ => (a as i64).wrapping_rem(b as i64) as u64,
        },
        AluOp::Remu => a.checked_rem(b).unwrap_or(a),
    }
}

/// 32-bit ALU for the *W instructions; the result is sign-extended.
fn alu32(op: AluOp, a: u64, b: u64) -> u64 {
    let (x, y) = (a as i32, b as i32);
    let (ux, uy) = (a as u32, b as u32);
    let shamt = uy & 0x1f;
    let result: i32 = match op {
        AluOp::Add => x.wrapping_add(y),
        AluOp::Sub => x.wrapping_sub(y),
        AluOp::Sll => (ux << shamt) as i32,
        AluOp::Srl => (ux >> shamt) as i32,
        AluOp::Sra => x >> shamt,
        AluOp::Mul => x.wrapping_mul(y),
        AluOp::Div => match y {
            0 => -1,
            _ => x.wrapping_div(y),
        },
        AluOp::Divu => ux.checked_div(uy).unwrap_or(u32::MAX) as i32,
        AluOp::Rem => match y {
            0 => x,
            _ => x.wrapping_rem(y),
        },
        AluOp::Remu => ux.checked_rem(uy).unwrap_or(ux) as i32,
        // not encodable as word ops
        AluOp::Slt
        | AluOp::Sltu
        | AluOp::Xor
        | AluOp::Or
        | AluOp::And
        | AluOp::Mulh
        | AluOp::Mulhsu
        | AluOp::Mulhu => return alu(op, a, b),
    };
    result as i64 as u64
}

fn amo(op: AmoOp, width: Width, old: u64, src: u64) -> u64 {
    match width {
        Width::Word => {
            let (x, y) = (old as i32, src as i32);
            let result = match op {
                AmoOp::Swap => y,
                AmoOp::Add => x.wrapping_add(y),
                AmoOp::Xor => x ^ y,
                AmoOp::And => x & y,
                AmoOp::Or => x | y,
                AmoOp::Min => x.min(y),
                AmoOp::Max => x.max(y),
                AmoOp::Minu => (x as u32).min(y as u32) as i32,
                AmoOp::Maxu => (x as u32).max(y as u32) as i32,
            };
            result as i64 as u64
        }
        _ => match op {
            AmoOp::Swap => src,
            AmoOp::Add => old.wrapping_add(src),
            AmoOp::Xor => old ^ src,
            AmoOp::And => old & src,
            AmoOp::Or => old | src,
            AmoOp::Min => (old as i64).min(src as i64) as u64,
            AmoOp::Max => (old as i64).max(src as i64) as u64,
            AmoOp::Minu => old.min(src),
            AmoOp::Maxu => old.max(src),
        },
    }
}
