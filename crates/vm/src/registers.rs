/// Integer register names per the RISC-V psABI.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    Zero = 0, // x0: hardwired zero
    Ra = 1,   // x1: return address
    Sp = 2,   // x2: stack pointer
    Gp = 3,   // x3: global pointer
    Tp = 4,   // x4: thread pointer

    T0 = 5,
    T1 = 6,
    T2 = 7,

    S0 = 8, // x8: saved register / frame pointer
    S1 = 9,

    A0 = 10, // x10: argument 0 / return value
    A1 = 11,
    A2 = 12,
    A3 = 13,
    A4 = 14,
    A5 = 15,
    A6 = 16,
    A7 = 17,

    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    S8 = 24,
    S9 = 25,
    S10 = 26,
    S11 = 27,

    T3 = 28,
    T4 = 29,
    T5 = 30,
    T6 = 31,
}

pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// ABI name of `x{index}`; `"x?"` for out-of-range indices.
pub fn abi_name(index: usize) -> &'static str {
    ABI_NAMES.get(index).copied().unwrap_or("x?")
}

impl Register {
    pub fn index(self) -> usize {
        self as usize
    }
}
