
use std::io;

use vm::bus::*;
use vm::Exception;

fn bus() -> Bus {
    Bus::new(Dram::new(0x1000).unwrap(), Uart::new(Box::new(io::sink())))
}

#[test]
fn test_unmapped_addresses_fault() {
    let mut bus = bus();
    assert_eq!(bus.load(0x0, 64), Err(Exception::LoadAccessFault(0)));
    assert_eq!(
        bus.store(0x100, 8, 1),
        Err(Exception::StoreAmoAccessFault(0x100))
    );
    // just past the end of DRAM
    let end = bus.dram.end();
    assert_eq!(bus.load(end, 8), Err(Exception::LoadAccessFault(end)));
}

#[test]
fn test_routes_to_each_device() {
    let mut bus = bus();

    bus.store(DRAM_BASE + 0x10, 32, 0xdead_beef).unwrap();
    assert_eq!(bus.load(DRAM_BASE + 0x10, 32).unwrap(), 0xdead_beef);

    bus.store(CLINT_MTIMECMP, 64, 3).unwrap();
    bus.clint.tick();
    assert_eq!(bus.load(CLINT_MTIME, 64).unwrap(), 1);
    assert_eq!(bus.load(CLINT_MTIMECMP, 64).unwrap(), 3);

    bus.store(PLIC_SPRIORITY, 32, 7).unwrap();
    assert_eq!(bus.load(PLIC_SPRIORITY, 32).unwrap(), 7);

    assert_eq!(
        bus.load(UART_LSR, 8).unwrap() & UART_LSR_TX as u64,
        UART_LSR_TX as u64
    );
}

#[test]
fn test_mtimecmp_resets_to_max() {
    let bus = bus();
    assert_eq!(bus.load(CLINT_MTIMECMP, 64).unwrap(), u64::MAX);
    assert_eq!(bus.clint.pending(), (false, false));
}
