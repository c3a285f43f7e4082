use crate::registers::abi_name;

/// A decoded RV64IMA + Zicsr + privileged instruction.
///
/// Register fields are indices into the integer register file. Immediates
/// and offsets are already sign-extended; `Lui`/`Auipc` carry the shifted
/// 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Lui { rd: usize, imm: i64 },
    Auipc { rd: usize, imm: i64 },
    Jal { rd: usize, offset: i64 },
    Jalr { rd: usize, rs1: usize, offset: i64 },
    Branch { cond: BranchCond, rs1: usize, rs2: usize, offset: i64 },
    Load { width: LoadWidth, rd: usize, rs1: usize, offset: i64 },
    Store { width: Width, rs1: usize, rs2: usize, offset: i64 },

    /// Register-immediate ALU op. Shifts carry the shift amount in `imm`.
    OpImm { op: AluOp, rd: usize, rs1: usize, imm: i64 },
    /// 32-bit register-immediate op, result sign-extended (ADDIW, SLLIW...).
    OpImm32 { op: AluOp, rd: usize, rs1: usize, imm: i64 },
    Op { op: AluOp, rd: usize, rs1: usize, rs2: usize },
    /// 32-bit register-register op, result sign-extended (ADDW, MULW...).
    Op32 { op: AluOp, rd: usize, rs1: usize, rs2: usize },

    Fence,
    FenceI,
    Ecall,
    Ebreak,

    // ===== A =====
    Lr { width: Width, rd: usize, rs1: usize },
    Sc { width: Width, rd: usize, rs1: usize, rs2: usize },
    Amo { op: AmoOp, width: Width, rd: usize, rs1: usize, rs2: usize },

    // ===== Zicsr =====
    Csr { op: CsrOp, rd: usize, rs1: usize, csr: u16 },
    CsrImm { op: CsrOp, rd: usize, uimm: u64, csr: u16 },

    // ===== Privileged =====
    Mret,
    Sret,
    Wfi,
    SfenceVma { rs1: usize, rs2: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCond {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

/// Access width for stores and atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWidth {
    Byte,
    Half,
    Word,
    Double,
    ByteUnsigned,
    HalfUnsigned,
    WordUnsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmoOp {
    Swap,
    Add,
    Xor,
    And,
    Or,
    Min,
    Max,
    Minu,
    Maxu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrOp {
    ReadWrite,
    ReadSet,
    ReadClear,
}

impl AluOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Sll => "sll",
            AluOp::Slt => "slt",
            AluOp::Sltu => "sltu",
            AluOp::Xor => "xor",
            AluOp::Srl => "srl",
            AluOp::Sra => "sra",
            AluOp::Or => "or",
            AluOp::And => "and",
            AluOp::Mul => "mul",
            AluOp::Mulh => "mulh",
            AluOp::Mulhsu => "mulhsu",
            AluOp::Mulhu => "mulhu",
            AluOp::Div => "div",
            AluOp::Divu => "divu",
            AluOp::Rem => "rem",
            AluOp::Remu => "remu",
        }
    }
}

impl BranchCond {
    fn mnemonic(self) -> &'static str {
        match self {
            BranchCond::Eq => "beq",
            BranchCond::Ne => "bne",
            BranchCond::Lt => "blt",
            BranchCond::Ge => "bge",
            BranchCond::Ltu => "bltu",
            BranchCond::Geu => "bgeu",
        }
    }
}

impl Width {
    pub fn bits(self) -> u8 {
        match self {
            Width::Byte => 8,
            Width::Half => 16,
            Width::Word => 32,
            Width::Double => 64,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Width::Byte => "b",
            Width::Half => "h",
            Width::Word => "w",
            Width::Double => "d",
        }
    }
}

impl LoadWidth {
    pub fn bits(self) -> u8 {
        match self {
            LoadWidth::Byte | LoadWidth::ByteUnsigned => 8,
            LoadWidth::Half | LoadWidth::HalfUnsigned => 16,
            LoadWidth::Word | LoadWidth::WordUnsigned => 32,
            LoadWidth::Double => 64,
        }
    }

    /// Sign- or zero-extends a raw loaded value to 64 bits.
    pub fn extend(self, raw: u64) -> u64 {
        match self {
            LoadWidth::Byte => raw as i8 as i64 as u64,
            LoadWidth::Half => raw as i16 as i64 as u64,
            LoadWidth::Word => raw as i32 as i64 as u64,
            LoadWidth::Double => raw,
            LoadWidth::ByteUnsigned => raw as u8 as u64,
            LoadWidth::HalfUnsigned => raw as u16 as u64,
            LoadWidth::WordUnsigned => raw as u32 as u64,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            LoadWidth::Byte => "lb",
            LoadWidth::Half => "lh",
            LoadWidth::Word => "lw",
            LoadWidth::Double => "ld",
            LoadWidth::ByteUnsigned => "lbu",
            LoadWidth::HalfUnsigned => "lhu",
            LoadWidth::WordUnsigned => "lwu",
        }
    }
}

impl AmoOp {
    fn mnemonic(self) -> &'static str {
        match self {
            AmoOp::Swap => "amoswap",
            AmoOp::Add => "amoadd",
            AmoOp::Xor => "amoxor",
            AmoOp::And => "amoand",
            AmoOp::Or => "amoor",
            AmoOp::Min => "amomin",
            AmoOp::Max => "amomax",
            AmoOp::Minu => "amominu",
            AmoOp::Maxu => "amomaxu",
        }
    }
}

impl CsrOp {
    fn mnemonic(self) -> &'static str {
        match self {
            CsrOp::ReadWrite => "csrrw",
            CsrOp::ReadSet => "csrrs",
            CsrOp::ReadClear => "csrrc",
        }
    }
}

impl Instruction {
    pub fn pretty_print(&self) -> String {
        let reg = abi_name;

        match *self {
            Instruction::Lui { rd, imm } => format!("lui  {}, 0x{:x}", reg(rd), (imm >> 12) & 0xfffff),
            Instruction::Auipc { rd, imm } => {
                format!("auipc {}, 0x{:x}", reg(rd), (imm >> 12) & 0xfffff)
            }
            Instruction::Jal { rd, offset } => format!("jal  {}, {}", reg(rd), offset),
            Instruction::Jalr { rd, rs1, offset } => {
                format!("jalr {}, {}({})", reg(rd), offset, reg(rs1))
            }
            Instruction::Branch { cond, rs1, rs2, offset } => {
                format!("{} {}, {}, {}", cond.mnemonic(), reg(rs1), reg(rs2), offset)
            }
            Instruction::Load { width, rd, rs1, offset } => {
                format!("{} {}, {}({})", width.mnemonic(), reg(rd), offset, reg(rs1))
            }
            Instruction::Store { width, rs1, rs2, offset } => {
                format!("s{} {}, {}({})", width.suffix(), reg(rs2), offset, reg(rs1))
            }
            Instruction::OpImm { op, rd, rs1, imm } => {
                format!("{}i {}, {}, {}", op.mnemonic(), reg(rd), reg(rs1), imm)
            }
            Instruction::OpImm32 { op, rd, rs1, imm } => {
                format!("{}iw {}, {}, {}", op.mnemonic(), reg(rd), reg(rs1), imm)
            }
            Instruction::Op { op, rd, rs1, rs2 } => {
                format!("{} {}, {}, {}", op.mnemonic(), reg(rd), reg(rs1), reg(rs2))
            }
            Instruction::Op32 { op, rd, rs1, rs2 } => {
                format!("{}w {}, {}, {}", op.mnemonic(), reg(rd), reg(rs1), reg(rs2))
            }
            Instruction::Fence => "fence".to_string(),
            Instruction::FenceI => "fence.i".to_string(),
            Instruction::Ecall => "ecall".to_string(),
            Instruction::Ebreak => "ebreak".to_string(),
            Instruction::Lr { width, rd, rs1 } => {
                format!("lr.{} {}, ({})", width.suffix(), reg(rd), reg(rs1))
            }
            Instruction::Sc { width, rd, rs1, rs2 } => {
                format!("sc.{} {}, {}, ({})", width.suffix(), reg(rd), reg(rs2), reg(rs1))
            }
            Instruction::Amo { op, width, rd, rs1, rs2 } => format!(
                "{}.{} {}, {}, ({})",
                op.mnemonic(),
                width.suffix(),
                reg(rd),
                reg(rs2),
                reg(rs1)
            ),
            Instruction::Csr { op, rd, rs1, csr } => {
                format!("{} {}, 0x{:03x}, {}", op.mnemonic(), reg(rd), csr, reg(rs1))
            }
            Instruction::CsrImm { op, rd, uimm, csr } => {
                format!("{}i {}, 0x{:03x}, {}", op.mnemonic(), reg(rd), csr, uimm)
            }
            Instruction::Mret => "mret".to_string(),
            Instruction::Sret => "sret".to_string(),
            Instruction::Wfi => "wfi".to_string(),
            Instruction::SfenceVma { rs1, rs2 } => {
                format!("sfence.vma {}, {}", reg(rs1), reg(rs2))
            }
        }
    }
}
