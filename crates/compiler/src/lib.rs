pub mod elf;
pub use elf::{extract_flat_binary, parse_elf_from_bytes};

pub mod error;
pub use error::BuildError;

pub mod manifest;
pub use manifest::{BuildPlan, Program, SourceKind};

pub mod pipeline;
pub use pipeline::{ArtifactReport, Builder, Stage};

pub mod toolchain;
pub use toolchain::{GccToolchain, Toolchain, ToolchainConfig};
