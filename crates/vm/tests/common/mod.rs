#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use vm::bus::{Uart, DRAM_BASE};
use vm::{RunOutcome, Vm, VmConfig};

pub const ZERO: u32 = 0;
pub const RA: u32 = 1;
pub const SP: u32 = 2;
pub const T0: u32 = 5;
pub const T1: u32 = 6;
pub const T2: u32 = 7;
pub const A0: u32 = 10;
pub const A1: u32 = 11;
pub const A2: u32 = 12;
pub const A3: u32 = 13;

// ----- encoders -----

pub fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    ((imm as u32 & 0xfff) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

pub fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

pub fn s_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7f) << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | ((imm & 0x1f) << 7) | 0x23
}

pub fn b_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
        | 0x63
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x13)
}

pub fn addiw(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x1b)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0, rd, 0x33)
}

pub fn sub(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0x20, rs2, rs1, 0, rd, 0x33)
}

pub fn mul(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0x01, rs2, rs1, 0, rd, 0x33)
}

pub fn div(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0x01, rs2, rs1, 4, rd, 0x33)
}

pub fn lui(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | 0x37
}

pub fn auipc(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | 0x17
}

pub fn jal(rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
        | (rd << 7)
        | 0x6f
}

pub fn jalr(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x67)
}

pub fn beq(rs1: u32, rs2: u32, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 0)
}

pub fn lb(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x03)
}

pub fn lh(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 1, rd, 0x03)
}

pub fn ld(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 3, rd, 0x03)
}

pub fn lbu(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 4, rd, 0x03)
}

pub fn lwu(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 6, rd, 0x03)
}

pub fn sb(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 0)
}

pub fn sd(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 3)
}

pub fn csrrw(rd: u32, csr: u16, rs1: u32) -> u32 {
    i_type(csr as i32, rs1, 1, rd, 0x73)
}

pub fn csrrs(rd: u32, csr: u16, rs1: u32) -> u32 {
    i_type(csr as i32, rs1, 2, rd, 0x73)
}

pub fn csrrsi(rd: u32, csr: u16, uimm: u32) -> u32 {
    i_type(csr as i32, uimm, 6, rd, 0x73)
}

pub const ECALL: u32 = 0x0000_0073;
pub const MRET: u32 = 0x3020_0073;
pub const SRET: u32 = 0x1020_0073;
/// jal zero, 0
pub const SPIN: u32 = 0x0000_006f;
/// jalr zero, 0(zero): return to address 0, which ends a bare program.
pub const EXIT: u32 = 0x0000_0067;

pub fn program(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Physical address of instruction `index` in a loaded program.
pub fn at(index: u64) -> u64 {
    DRAM_BASE + 4 * index
}

pub fn small_config(max_steps: Option<u64>) -> VmConfig {
    VmConfig {
        memory_size: 4 * 1024 * 1024,
        max_steps,
        verbose: false,
    }
}

pub fn load(words: &[u32], max_steps: Option<u64>) -> Vm {
    Vm::with_uart(&program(words), small_config(max_steps), Uart::new(Box::new(io::sink())))
        .unwrap()
}

pub fn run(words: &[u32], max_steps: Option<u64>) -> (Vm, RunOutcome) {
    let mut vm = load(words, max_steps);
    let outcome = vm.run();
    (vm, outcome)
}

/// Writer whose bytes can be inspected after it has been moved into a UART.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
