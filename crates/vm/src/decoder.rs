use crate::instruction::{
    AluOp, AmoOp, BranchCond, CsrOp, Instruction, LoadWidth, Width,
};
use crate::isa::Opcode;

/// Decodes a 32-bit RV64 instruction word.
///
/// Returns `None` for anything the emulator does not implement, including
/// the all-zero word and every compressed (16-bit) encoding. The caller
/// raises an illegal-instruction exception with the raw word as `tval`.
pub fn decode_full(word: u32) -> Option<Instruction> {
    if word & 0b11 != 0b11 {
        return None;
    }

    let opcode = Opcode::from_u8((word & 0x7f) as u8)?;

    let rd = ((word >> 7) & 0x1f) as usize;
    let funct3 = ((word >> 12) & 0x07) as u8;
    let rs1 = ((word >> 15) & 0x1f) as usize;
    let rs2 = ((word >> 20) & 0x1f) as usize;
    let funct7 = ((word >> 25) & 0x7f) as u8;
    let imm_i = ((word as i32) >> 20) as i64;

    match opcode {
        Opcode::Lui => Some(Instruction::Lui { rd, imm: extract_upper_imm(word) }),
        Opcode::Auipc => Some(Instruction::Auipc { rd, imm: extract_upper_imm(word) }),
        Opcode::Jal => Some(Instruction::Jal { rd, offset: extract_jal_offset(word) }),
        Opcode::Jalr => match funct3 {
            0x0 => Some(Instruction::Jalr { rd, rs1, offset: imm_i }),
            _ => None,
        },

        Opcode::Branch => {
            let cond = match funct3 {
                0x0 => BranchCond::Eq,
                0x1 => BranchCond::Ne,
                0x4 => BranchCond::Lt,
                0x5 => BranchCond::Ge,
                0x6 => BranchCond::Ltu,
                0x7 => BranchCond::Geu,
                _ => return None,
            };
            Some(Instruction::Branch { cond, rs1, rs2, offset: extract_branch_offset(word) })
        }

        Opcode::Load => {
            let width = match funct3 {
                0x0 => LoadWidth::Byte,
                0x1 => LoadWidth::Half,
                0x2 => LoadWidth::Word,
                0x3 => LoadWidth::Double,
                0x4 => LoadWidth::ByteUnsigned,
                0x5 => LoadWidth::HalfUnsigned,
                0x6 => LoadWidth::WordUnsigned,
                _ => return None,
            };
            Some(Instruction::Load { width, rd, rs1, offset: imm_i })
        }

        Opcode::Store => {
            let width = match funct3 {
                0x0 => Width::Byte,
                0x1 => Width::Half,
                0x2 => Width::Word,
                0x3 => Width::Double,
                _ => return None,
            };
            Some(Instruction::Store { width, rs1, rs2, offset: extract_store_offset(word) })
        }

        Opcode::OpImm => {
            // RV64 shifts take a 6-bit shamt; funct6 picks logical/arithmetic
            let shamt = ((word >> 20) & 0x3f) as i64;
            let funct6 = (word >> 26) & 0x3f;
            let (op, imm) = match (funct3, funct6) {
                (0x0, _) => (AluOp::Add, imm_i),
                (0x2, _) => (AluOp::Slt, imm_i),
                (0x3, _) => (AluOp::Sltu, imm_i),
                (0x4, _) => (AluOp::Xor, imm_i),
                (0x6, _) => (AluOp::Or, imm_i),
                (0x7, _) => (AluOp::And, imm_i),
                (0x1, 0x00) => (AluOp::Sll, shamt),
                (0x5, 0x00) => (AluOp::Srl, shamt),
                (0x5, 0x10) => (AluOp::Sra, shamt),
                _ => return None,
            };
            Some(Instruction::OpImm { op, rd, rs1, imm })
        }

        Opcode::OpImm32 => {
            let shamt = ((word >> 20) & 0x1f) as i64;
            let (op, imm) = match (funct3, funct7) {
                (0x0, _) => (AluOp::Add, imm_i),
                (0x1, 0x00) => (AluOp::Sll, shamt),
                (0x5, 0x00) => (AluOp::Srl, shamt),
                (0x5, 0x20) => (AluOp::Sra, shamt),
                _ => return None,
            };
            Some(Instruction::OpImm32 { op, rd, rs1, imm })
        }

        Opcode::Op => {
            let op = match (funct3, funct7) {
                (0x0, 0x00) => AluOp::Add,
                (0x0, 0x20) => AluOp::Sub,
                (0x1, 0x00) => AluOp::Sll,
                (0x2, 0x00) => AluOp::Slt,
                (0x3, 0x00) => AluOp::Sltu,
                (0x4, 0x00) => AluOp::Xor,
                (0x5, 0x00) => AluOp::Srl,
                (0x5, 0x20) => AluOp::Sra,
                (0x6, 0x00) => AluOp::Or,
                (0x7, 0x00) => AluOp::And,
                (0x0, 0x01) => AluOp::Mul,
                (0x1, 0x01) => AluOp::Mulh,
                (0x2, 0x01) => AluOp::Mulhsu,
                (0x3, 0x01) => AluOp::Mulhu,
                (0x4, 0x01) => AluOp::Div,
                (0x5, 0x01) => AluOp::Divu,
                (0x6, 0x01) => AluOp::Rem,
                (0x7, 0x01) => AluOp::Remu,
                _ => return None,
            };
            Some(Instruction::Op { op, rd, rs1, rs2 })
        }

        Opcode::Op32 => {
            let op = match (funct3, funct7) {
                (0x0, 0x00) => AluOp::Add,
                (0x0, 0x20) => AluOp::Sub,
                (0x1, 0x00) => AluOp::Sll,
                (0x5, 0x00) => AluOp::Srl,
                (0x5, 0x20) => AluOp::Sra,
                (0x0, 0x01) => AluOp::Mul,
                (0x4, 0x01) => AluOp::Div,
                (0x5, 0x01) => AluOp::Divu,
                (0x6, 0x01) => AluOp::Rem,
                (0x7, 0x01) => AluOp::Remu,
                _ => return None,
            };
            Some(Instruction::Op32 { op, rd, rs1, rs2 })
        }

        Opcode::MiscMem => match funct3 {
            0x0 => Some(Instruction::Fence),
            0x1 => Some(Instruction::FenceI),
            _ => None,
        },

        Opcode::Amo => decode_amo(word, rd, funct3, rs1, rs2),

        Opcode::System => decode_system(word, rd, funct3, rs1, rs2, funct7),
    }
}

fn decode_amo(word: u32, rd: usize, funct3: u8, rs1: usize, rs2: usize) -> Option<Instruction> {
    let width = match funct3 {
        0x2 => Width::Word,
        0x3 => Width::Double,
        _ => return None,
    };
    // bits 26:25 are aq/rl; ordering is a no-op on a single hart
    let funct5 = (word >> 27) & 0x1f;
    let op = match funct5 {
        0x02 if rs2 == 0 => return Some(Instruction::Lr { width, rd, rs1 }),
        0x03 => return Some(Instruction::Sc { width, rd, rs1, rs2 }),
        0x01 => AmoOp::Swap,
        0x00 => AmoOp::Add,
        0x04 => AmoOp::Xor,
        0x0c => AmoOp::And,
        0x08 => AmoOp::Or,
        0x10 => AmoOp::Min,
        0x14 => AmoOp::Max,
        0x18 => AmoOp::Minu,
        0x1c => AmoOp::Maxu,
        _ => return None,
    };
    Some(Instruction::Amo { op, width, rd, rs1, rs2 })
}

fn decode_system(
    word: u32,
    rd: usize,
    funct3: u8,
    rs1: usize,
    rs2: usize,
    funct7: u8,
) -> Option<Instruction> {
    let csr = (word >> 20) as u16;
    let op = match funct3 {
        0x0 => {
            return match word {
                0x0000_0073 => Some(Instruction::Ecall),
                0x0010_0073 => Some(Instruction::Ebreak),
                0x1020_0073 => Some(Instruction::Sret),
                0x3020_0073 => Some(Instruction::Mret),
                0x1050_0073 => Some(Instruction::Wfi),
                _ if funct7 == 0x09 && rd == 0 => Some(Instruction::SfenceVma { rs1, rs2 }),
                _ => None,
            }
        }
        0x1 | 0x5 => CsrOp::ReadWrite,
        0x2 | 0x6 => CsrOp::ReadSet,
        0x3 | 0x7 => CsrOp::ReadClear,
        _ => return None,
    };
    if funct3 & 0x4 == 0 {
        Some(Instruction::Csr { op, rd, rs1, csr })
    } else {
        // rs1 field holds a 5-bit zero-extended immediate
        Some(Instruction::CsrImm { op, rd, uimm: rs1 as u64, csr })
    }
}

fn extract_upper_imm(word: u32) -> i64 {
    (word & 0xffff_f000) as i32 as i64
}

fn extract_store_offset(word: u32) -> i64 {
    let imm11_5 = ((word >> 25) & 0x7f) << 5;
    let imm4_0 = (word >> 7) & 0x1f;
    let imm = (imm11_5 | imm4_0) as i32;
    ((imm << 20) >> 20) as i64
}

fn extract_branch_offset(word: u32) -> i64 {
    let imm12 = ((word >> 31) & 0x1) << 12;
    let imm10_5 = ((word >> 25) & 0x3f) << 5;
    let imm4_1 = ((word >> 8) & 0xf) << 1;
    let imm11 = ((word >> 7) & 0x1) << 11;
    let imm = (imm12 | imm11 | imm10_5 | imm4_1) as i32;
    ((imm << 19) >> 19) as i64
}

fn extract_jal_offset(word: u32) -> i64 {
    let imm20 = ((word >> 31) & 0x1) << 20;
    let imm10_1 = ((word >> 21) & 0x3ff) << 1;
    let imm11 = ((word >> 20) & 0x1) << 11;
    let imm19_12 = ((word >> 12) & 0xff) << 12;
    let imm = (imm20 | imm19_12 | imm11 | imm10_1) as i32;
    ((imm << 11) >> 11) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_immediates_with_sign() {
        // addi a0, zero, -1
        assert_eq!(
            decode_full(0xfff0_0513),
            Some(Instruction::OpImm { op: AluOp::Add, rd: 10, rs1: 0, imm: -1 })
        );
        // sd ra, -8(sp)
        assert_eq!(
            decode_full(0xfe11_3c23),
            Some(Instruction::Store { width: Width::Double, rs1: 2, rs2: 1, offset: -8 })
        );
        // beq zero, zero, -4
        assert_eq!(
            decode_full(0xfe00_0ee3),
            Some(Instruction::Branch { cond: BranchCond::Eq, rs1: 0, rs2: 0, offset: -4 })
        );
        // jal zero, -8
        assert_eq!(decode_full(0xff9f_f06f), Some(Instruction::Jal { rd: 0, offset: -8 }));
        // lui a0, 0x80000
        assert_eq!(
            decode_full(0x8000_0537),
            Some(Instruction::Lui { rd: 10, imm: -0x8000_0000 })
        );
    }

    #[test]
    fn decodes_rv64_shifts_and_word_ops() {
        // srai a0, a0, 63
        assert_eq!(
            decode_full(0x43f5_5513),
            Some(Instruction::OpImm { op: AluOp::Sra, rd: 10, rs1: 10, imm: 63 })
        );
        // addiw a0, a0, 1
        assert_eq!(
            decode_full(0x0015_051b),
            Some(Instruction::OpImm32 { op: AluOp::Add, rd: 10, rs1: 10, imm: 1 })
        );
        // divuw a0, a1, a2
        assert_eq!(
            decode_full(0x02c5_d53b),
            Some(Instruction::Op32 { op: AluOp::Divu, rd: 10, rs1: 11, rs2: 12 })
        );
    }

    #[test]
    fn decodes_system_and_csr() {
        assert_eq!(decode_full(0x0000_0073), Some(Instruction::Ecall));
        assert_eq!(decode_full(0x3020_0073), Some(Instruction::Mret));
        assert_eq!(decode_full(0x1200_0073), Some(Instruction::SfenceVma { rs1: 0, rs2: 0 }));
        // csrrw zero, mtvec, t0
        assert_eq!(
            decode_full(0x3052_9073),
            Some(Instruction::Csr { op: CsrOp::ReadWrite, rd: 0, rs1: 5, csr: 0x305 })
        );
        // csrrsi zero, mstatus, 8
        assert_eq!(
            decode_full(0x3004_6073),
            Some(Instruction::CsrImm { op: CsrOp::ReadSet, rd: 0, uimm: 8, csr: 0x300 })
        );
    }

    #[test]
    fn decodes_atomics() {
        // lr.w a0, (a1)
        assert_eq!(
            decode_full(0x1005_a52f),
            Some(Instruction::Lr { width: Width::Word, rd: 10, rs1: 11 })
        );
        // amoadd.d a0, a2, (a1)
        assert_eq!(
            decode_full(0x00c5_b52f),
            Some(Instruction::Amo { op: AmoOp::Add, width: Width::Double, rd: 10, rs1: 11, rs2: 12 })
        );
    }

    #[test]
    fn rejects_unknown_words() {
        assert_eq!(decode_full(0x0000_0000), None);
        assert_eq!(decode_full(0xffff_ffff), None);
        // c.li a0, 1 (compressed)
        assert_eq!(decode_full(0x0000_4505), None);
    }
}
