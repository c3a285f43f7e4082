mod common;

use std::io::Cursor;
use std::time::{Duration, Instant};

use common::*;
use vm::bus::*;
use vm::csr::*;
use vm::{ExitReason, Vm};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_guest_output_reaches_writer() {
    let output = SharedOutput::default();
    let words = [
        lui(T0, 0x10000),
        addi(T1, ZERO, b'H' as i32),
        sb(T1, T0, 0),
        addi(T1, ZERO, b'i' as i32),
        sb(T1, T0, 0),
        lbu(A0, T0, 5), // LSR
        EXIT,
    ];
    let mut vm = Vm::with_uart(
        &program(&words),
        small_config(None),
        Uart::new(Box::new(output.clone())),
    )
    .unwrap();
    let outcome = vm.run();

    assert!(matches!(outcome.exit, ExitReason::Fatal(_)));
    assert_eq!(output.contents(), b"Hi");
    assert_ne!(vm.cpu.regs[A0 as usize] & UART_LSR_TX as u64, 0);
}

#[test]
fn test_input_is_delivered_byte_by_byte() {
    let uart = Uart::with_input(Box::new(std::io::sink()), Cursor::new(b"ok".to_vec()));

    for expected in [b'o', b'k'] {
        let start = Instant::now();
        while uart.load(UART_LSR, 8).unwrap() & UART_LSR_RX as u64 == 0 {
            assert!(start.elapsed() < WAIT, "no input byte arrived");
            std::thread::yield_now();
        }
        assert_eq!(uart.load(UART_RHR, 8).unwrap(), expected as u64);
    }
    assert!(uart.is_interrupting());
    assert!(!uart.is_interrupting());
}

#[test]
fn test_only_byte_accesses_are_allowed() {
    let mut uart = Uart::new(Box::new(std::io::sink()));
    assert!(uart.load(UART_LSR, 32).is_err());
    assert!(uart.store(UART_THR, 16, 0x41).is_err());
    uart.store(UART_LCR, 8, 0x3).unwrap();
    assert_eq!(uart.load(UART_LCR, 8).unwrap(), 0x3);
}

#[test]
fn test_input_raises_external_interrupt() {
    let uart = Uart::with_input(Box::new(std::io::sink()), Cursor::new(b"x".to_vec()));
    let mut vm = Vm::with_uart(&program(&[SPIN, SPIN]), small_config(None), uart).unwrap();
    vm.cpu.csr.store(MTVEC, at(1));
    vm.cpu.csr.store(MIE, MASK_SEIP);
    vm.cpu.csr.store(MSTATUS, MASK_MIE);

    let start = Instant::now();
    while vm.cpu.csr.load(MCAUSE) == 0 {
        assert!(start.elapsed() < WAIT, "external interrupt never taken");
        vm.step();
    }

    assert_eq!(vm.cpu.csr.load(MCAUSE), (1 << 63) | 9);
    assert_eq!(vm.cpu.pc, at(1));
    assert_eq!(vm.cpu.bus.load(PLIC_SCLAIM, 32).unwrap(), UART_IRQ);
    assert_eq!(vm.cpu.bus.load(UART_RHR, 8).unwrap(), b'x' as u64);
}
