use std::fmt;

/// Synchronous exceptions. The payload, where present, is the value written
/// to `xtval` when the trap is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    InstructionAddressMisaligned(u64),
    InstructionAccessFault(u64),
    IllegalInstruction(u64),
    Breakpoint(u64),
    LoadAddressMisaligned(u64),
    LoadAccessFault(u64),
    StoreAmoAddressMisaligned(u64),
    StoreAmoAccessFault(u64),
    EnvironmentCallFromUMode,
    EnvironmentCallFromSMode,
    EnvironmentCallFromMMode,
    InstructionPageFault(u64),
    LoadPageFault(u64),
    StoreAmoPageFault(u64),
}

impl Exception {
    /// Exception code as written to `xcause`.
    pub fn code(&self) -> u64 {
        match self {
            Exception::InstructionAddressMisaligned(_) => 0,
            Exception::InstructionAccessFault(_) => 1,
            Exception::IllegalInstruction(_) => 2,
            Exception::Breakpoint(_) => 3,
            Exception::LoadAddressMisaligned(_) => 4,
            Exception::LoadAccessFault(_) => 5,
            Exception::StoreAmoAddressMisaligned(_) => 6,
            Exception::StoreAmoAccessFault(_) => 7,
            Exception::EnvironmentCallFromUMode => 8,
            Exception::EnvironmentCallFromSMode => 9,
            Exception::EnvironmentCallFromMMode => 11,
            Exception::InstructionPageFault(_) => 12,
            Exception::LoadPageFault(_) => 13,
            Exception::StoreAmoPageFault(_) => 15,
        }
    }

    pub fn value(&self) -> u64 {
        match *self {
            Exception::InstructionAddressMisaligned(v)
            | Exception::InstructionAccessFault(v)
            | Exception::IllegalInstruction(v)
            | Exception::Breakpoint(v)
            | Exception::LoadAddressMisaligned(v)
            | Exception::LoadAccessFault(v)
            | Exception::StoreAmoAddressMisaligned(v)
            | Exception::StoreAmoAccessFault(v)
            | Exception::InstructionPageFault(v)
            | Exception::LoadPageFault(v)
            | Exception::StoreAmoPageFault(v) => v,
            Exception::EnvironmentCallFromUMode
            | Exception::EnvironmentCallFromSMode
            | Exception::EnvironmentCallFromMMode => 0,
        }
    }

    /// Exceptions that end the run once the trap has been recorded.
    ///
    /// A bare program that returns to address 0 ends here with an
    /// instruction access fault.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Exception::InstructionAddressMisaligned(_)
                | Exception::InstructionAccessFault(_)
                | Exception::LoadAccessFault(_)
                | Exception::StoreAmoAddressMisaligned(_)
                | Exception::StoreAmoAccessFault(_)
        )
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Exception::InstructionAddressMisaligned(_) => "instruction address misaligned",
            Exception::InstructionAccessFault(_) => "instruction access fault",
            Exception::IllegalInstruction(_) => "illegal instruction",
            Exception::Breakpoint(_) => "breakpoint",
            Exception::LoadAddressMisaligned(_) => "load address misaligned",
            Exception::LoadAccessFault(_) => "load access fault",
            Exception::StoreAmoAddressMisaligned(_) => "store/AMO address misaligned",
            Exception::StoreAmoAccessFault(_) => "store/AMO access fault",
            Exception::EnvironmentCallFromUMode => "environment call from U-mode",
            Exception::EnvironmentCallFromSMode => "environment call from S-mode",
            Exception::EnvironmentCallFromMMode => "environment call from M-mode",
            Exception::InstructionPageFault(_) => "instruction page fault",
            Exception::LoadPageFault(_) => "load page fault",
            Exception::StoreAmoPageFault(_) => "store/AMO page fault",
        };
        write!(f, "{} (cause {}, tval 0x{:x})", name, self.code(), self.value())
    }
}

impl std::error::Error for Exception {}
