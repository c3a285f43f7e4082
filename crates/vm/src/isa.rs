/// Major opcodes (bits 6:0) of the 32-bit RV64 encodings the emulator knows.
///
/// The opcode selects the instruction format: R-type for `Op`/`Op32`/`Amo`,
/// I-type for `OpImm`/`OpImm32`/`Load`/`Jalr`/`System`, S-type for `Store`,
/// B-type for `Branch`, U-type for `Lui`/`Auipc` and J-type for `Jal`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Load = 0x03,
    /// FENCE, FENCE.I
    MiscMem = 0x0f,
    OpImm = 0x13,
    Auipc = 0x17,
    /// ADDIW and the 32-bit immediate shifts.
    OpImm32 = 0x1b,
    Store = 0x23,
    Amo = 0x2f,
    Op = 0x33,
    Lui = 0x37,
    /// ADDW/SUBW, 32-bit shifts and the RV64M word operations.
    Op32 = 0x3b,
    Branch = 0x63,
    Jalr = 0x67,
    Jal = 0x6f,
    /// ECALL, EBREAK, xRET, WFI, SFENCE.VMA and Zicsr.
    System = 0x73,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        use Opcode::*;
        Some(match value {
            0x03 => Load,
            0x0f => MiscMem,
            0x13 => OpImm,
            0x17 => Auipc,
            0x1b => OpImm32,
            0x23 => Store,
            0x2f => Amo,
            0x33 => Op,
            0x37 => Lui,
            0x3b => Op32,
            0x63 => Branch,
            0x67 => Jalr,
            0x6f => Jal,
            0x73 => System,
            _ => return None,
        })
    }
}
