use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use super::Device;
use crate::exception::Exception;

/// 16550a-compatible UART.
pub const UART_BASE: u64 = 0x1000_0000;
pub const UART_SIZE: u64 = 0x100;
/// PLIC source number of the UART.
pub const UART_IRQ: u64 = 10;

/// Receive holding register (read).
pub const UART_RHR: u64 = UART_BASE;
/// Transmit holding register (write).
pub const UART_THR: u64 = UART_BASE;
pub const UART_LCR: u64 = UART_BASE + 3;
pub const UART_LSR: u64 = UART_BASE + 5;

/// LSR: a byte is waiting in RHR.
pub const UART_LSR_RX: u8 = 1;
/// LSR: THR is empty and ready for output.
pub const UART_LSR_TX: u8 = 1 << 5;

const RHR: usize = 0;
const LSR: usize = 5;

type Registers = [u8; UART_SIZE as usize];

pub struct Uart {
    regs: Arc<(Mutex<Registers>, Condvar)>,
    interrupting: Arc<AtomicBool>,
    output: Box<dyn Write>,
}

impl Uart {
    /// A UART whose transmitted bytes go to `output` and which never
    /// receives input.
    pub fn new(output: Box<dyn Write>) -> Self {
        let mut regs = [0u8; UART_SIZE as usize];
        regs[LSR] |= UART_LSR_TX;
        Self {
            regs: Arc::new((Mutex::new(regs), Condvar::new())),
            interrupting: Arc::new(AtomicBool::new(false)),
            output,
        }
    }

    /// Like [`Uart::new`], with a background thread feeding bytes from
    /// `input` into RHR one at a time. The thread waits until the guest has
    /// read the previous byte before delivering the next one and exits at
    /// end of input.
    pub fn with_input<R>(output: Box<dyn Write>, mut input: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let uart = Self::new(output);
        let regs = Arc::clone(&uart.regs);
        let interrupting = Arc::clone(&uart.interrupting);

        thread::spawn(move || {
            let mut byte = [0u8; 1];
            loop {
                match input.read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) => {
                        let (lock, cvar) = &*regs;
                        let mut regs = lock.lock().unwrap_or_else(PoisonError::into_inner);
                        while regs[LSR] & UART_LSR_RX != 0 {
                            regs = cvar.wait(regs).unwrap_or_else(PoisonError::into_inner);
                        }
                        regs[RHR] = byte[0];
                        regs[LSR] |= UART_LSR_RX;
                        interrupting.store(true, Ordering::Release);
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::warn!("uart input closed: {}", e);
                        break;
                    }
                }
            }
        });

        uart
    }

    /// Output to the process's stdout, input from stdin when `connect_stdin`.
    pub fn stdio(connect_stdin: bool) -> Self {
        let output: Box<dyn Write> = Box::new(io::stdout());
        if connect_stdin {
            Self::with_input(output, io::stdin())
        } else {
            Self::new(output)
        }
    }

    /// Returns whether a byte arrived since the last call, clearing the flag.
    pub fn is_interrupting(&self) -> bool {
        self.interrupting.swap(false, Ordering::AcqRel)
    }
}

impl Device for Uart {
    fn load(&self, addr: u64, size: u8) -> Result<u64, Exception> {
        if size != 8 {
            return Err(Exception::LoadAccessFault(addr));
        }
        let offset = register_offset(addr).ok_or(Exception::LoadAccessFault(addr))?;
        let (lock, cvar) = &*self.regs;
        let mut regs = lock.lock().unwrap_or_else(PoisonError::into_inner);
        match offset {
            RHR => {
                regs[LSR] &= !UART_LSR_RX;
                cvar.notify_one();
                Ok(regs[RHR] as u64)
            }
            _ => Ok(regs[offset] as u64),
        }
    }

    fn store(&mut self, addr: u64, size: u8, value: u64) -> Result<(), Exception> {
        if size != 8 {
            return Err(Exception::StoreAmoAccessFault(addr));
        }
        let offset = register_offset(addr).ok_or(Exception::StoreAmoAccessFault(addr))?;
        match offset {
            RHR => {
                let written = self
                    .output
                    .write_all(&[value as u8])
                    .and_then(|_| self.output.flush());
                if let Err(e) = written {
                    log::warn!("uart output failed: {}", e);
                }
            }
            _ => {
                let (lock, _) = &*self.regs;
                let mut regs = lock.lock().unwrap_or_else(PoisonError::into_inner);
                regs[offset] = value as u8;
            }
        }
        Ok(())
    }
}

fn register_offset(addr: u64) -> Option<usize> {
    let offset = addr.checked_sub(UART_BASE)?;
    (offset < UART_SIZE).then_some(offset as usize)
}
