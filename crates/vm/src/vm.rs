use core::cell::RefCell;
use core::fmt::{self, Write};
use std::rc::Rc;

use crate::bus::{Bus, Dram, Uart, DRAM_BASE, DRAM_MAX_SIZE, DRAM_SIZE};
use crate::cpu::Cpu;
use crate::exception::Exception;
use crate::trap::Trap;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// DRAM size in bytes.
    pub memory_size: u64,
    /// Stop after this many steps; `None` runs until a fatal exception.
    pub max_steps: Option<u64>,
    /// Trace every executed instruction and trap.
    pub verbose: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            memory_size: DRAM_SIZE,
            max_steps: None,
            verbose: false,
        }
    }
}

#[derive(Debug)]
pub enum VmError {
    /// The binary does not fit in the configured DRAM.
    ImageTooLarge { size: u64, capacity: u64 },
    /// The requested DRAM would not fit in the physical address space.
    MemoryTooLarge { size: u64, max: u64 },
    /// The host could not allocate the requested DRAM.
    OutOfMemory { size: u64 },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::ImageTooLarge { size, capacity } => write!(
                f,
                "binary is {} bytes but DRAM holds only {} bytes",
                size, capacity
            ),
            VmError::MemoryTooLarge { size, max } => write!(
                f,
                "{} bytes of DRAM requested, at most {} supported",
                size, max
            ),
            VmError::OutOfMemory { size } => {
                write!(f, "cannot allocate {} bytes of DRAM", size)
            }
        }
    }
}

impl std::error::Error for VmError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A fatal exception was raised. Its trap has been recorded in the
    /// CSRs before the run stopped.
    Fatal(Exception),
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Loop iterations, including the one that raised the fatal exception.
    pub steps: u64,
    pub exit: ExitReason,
}

/// Console writer that wraps print!
struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print!("{}", s);
        Ok(())
    }
}

pub struct Vm {
    pub cpu: Cpu,
    config: VmConfig,
    steps: u64,
}

impl Vm {
    /// Loads a flat binary at `DRAM_BASE` with the UART on stdout.
    pub fn new(binary: &[u8], config: VmConfig) -> Result<Self, VmError> {
        Self::with_uart(binary, config, Uart::stdio(false))
    }

    pub fn with_uart(binary: &[u8], config: VmConfig, uart: Uart) -> Result<Self, VmError> {
        let capacity = config.memory_size;
        let size = binary.len() as u64;
        if size > capacity {
            return Err(VmError::ImageTooLarge { size, capacity });
        }

        if capacity > DRAM_MAX_SIZE {
            return Err(VmError::MemoryTooLarge {
                size: capacity,
                max: DRAM_MAX_SIZE,
            });
        }
        let mut dram = usize::try_from(capacity)
            .ok()
            .and_then(|size| Dram::new(size).ok())
            .ok_or(VmError::OutOfMemory { size: capacity })?;
        dram.write_bytes(DRAM_BASE, binary)
            .map_err(|_| VmError::ImageTooLarge { size, capacity })?;

        let mut cpu = Cpu::new(Bus::new(dram, uart));
        cpu.verbose = config.verbose;
        cpu.set_verbose_writer(Rc::new(RefCell::new(ConsoleWriter)));

        log::debug!(
            "loaded {} bytes at 0x{:x}, {} bytes of DRAM",
            size,
            DRAM_BASE,
            capacity
        );

        Ok(Self {
            cpu,
            config,
            steps: 0,
        })
    }

    pub fn set_verbose_writer(&mut self, writer: Rc<RefCell<dyn Write>>) {
        self.cpu.set_verbose_writer(writer);
    }

    pub fn set_verbosity(&mut self, verbose: bool) {
        self.config.verbose = verbose;
        self.cpu.verbose = verbose;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs one iteration: execute an instruction (trapping on exception),
    /// advance the timer, then take any pending interrupt. Returns the
    /// exception if it was fatal.
    pub fn step(&mut self) -> Option<Exception> {
        self.steps += 1;
        let pc = self.cpu.pc;

        if let Err(exception) = self.cpu.step() {
            self.cpu.take_trap(Trap::Exception(exception), pc);
            if exception.is_fatal() {
                log::debug!("fatal {} at pc 0x{:x}", exception, pc);
                return Some(exception);
            }
        }

        self.cpu.bus.clint.tick();

        if let Some(interrupt) = self.cpu.check_pending_interrupt() {
            let epc = self.cpu.pc;
            self.cpu.take_trap(Trap::Interrupt(interrupt), epc);
        }
        None
    }

    /// Steps until a fatal exception or the configured step limit.
    pub fn run(&mut self) -> RunOutcome {
        loop {
            if let Some(limit) = self.config.max_steps {
                if self.steps >= limit {
                    return RunOutcome {
                        steps: self.steps,
                        exit: ExitReason::StepLimit,
                    };
                }
            }
            if let Some(exception) = self.step() {
                return RunOutcome {
                    steps: self.steps,
                    exit: ExitReason::Fatal(exception),
                };
            }
        }
    }

    pub fn dump_registers(&self) -> String {
        self.cpu.dump_registers()
    }

    pub fn dump_csrs(&self) -> String {
        self.cpu.dump_csrs()
    }
}
