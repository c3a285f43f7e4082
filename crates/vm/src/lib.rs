pub mod bus;
pub mod cpu;
pub mod csr;
pub mod decoder;
pub mod exception;
mod exe;
pub mod instruction;
pub mod interrupt;
pub mod isa;
pub mod mmu;
pub mod registers;
pub mod trap;
pub mod vm;

pub use cpu::{Cpu, Mode};
pub use exception::Exception;
pub use interrupt::Interrupt;
pub use trap::Trap;
pub use vm::{ExitReason, RunOutcome, Vm, VmConfig, VmError};
