use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

use crate::elf;
use crate::error::BuildError;

/// Env var consulted for the cross toolchain prefix.
pub const PREFIX_ENV: &str = "RISCV_PREFIX";
pub const DEFAULT_PREFIX: &str = "riscv64-unknown-elf-";
pub const DEFAULT_MARCH: &str = "rv64g";
pub const DEFAULT_MABI: &str = "lp64";

/// The three stages a source goes through on its way to a flat binary.
///
/// Implementations must leave no output behind when a stage fails.
pub trait Toolchain: std::fmt::Debug {
    /// Translates a high-level source into assembly.
    fn compile_to_assembly(&self, source: &Path, output: &Path) -> Result<(), BuildError>;

    /// Links assembly at `link_address` with no standard library and no
    /// startup files.
    fn link(&self, assembly: &Path, output: &Path, link_address: u64) -> Result<(), BuildError>;

    /// Copies the loadable bytes of a linked image into a headerless file.
    /// Returns the size of the written file.
    fn extract_binary(&self, image: &Path, output: &Path) -> Result<u64, BuildError> {
        elf::extract_flat_binary(image, output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Prepended to `gcc` and `objcopy`, e.g. `riscv64-unknown-elf-`.
    pub prefix: String,
    pub march: String,
    pub mabi: String,
    /// Use `<prefix>objcopy -O binary` instead of the built-in extractor.
    pub use_objcopy: bool,
    pub extra_cflags: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            march: DEFAULT_MARCH.to_string(),
            mabi: DEFAULT_MABI.to_string(),
            use_objcopy: false,
            extra_cflags: Vec::new(),
        }
    }
}

impl ToolchainConfig {
    /// Defaults, with the prefix taken from `RISCV_PREFIX` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(prefix) = env::var(PREFIX_ENV) {
            config.prefix = prefix;
        }
        config
    }

    pub fn gcc(&self) -> String {
        format!("{}gcc", self.prefix)
    }

    pub fn objcopy(&self) -> String {
        format!("{}objcopy", self.prefix)
    }
}

/// GNU cross toolchain driven as external processes.
#[derive(Debug, Clone)]
pub struct GccToolchain {
    pub config: ToolchainConfig,
}

impl GccToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// True when `<prefix>gcc --version` can be spawned.
    pub fn is_available(&self) -> bool {
        Command::new(self.config.gcc())
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn target_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            format!("-march={}", self.config.march).into(),
            format!("-mabi={}", self.config.mabi).into(),
        ];
        args.extend(self.config.extra_cflags.iter().map(OsString::from));
        args
    }

    fn run(&self, tool: &str, args: &[OsString]) -> Result<Output, BuildError> {
        log::debug!(
            "{} {}",
            tool,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        Command::new(tool).args(args).output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                BuildError::ToolNotFound {
                    tool: tool.to_string(),
                }
            } else {
                BuildError::io(tool, e)
            }
        })
    }
}

/// Removes whatever a failed tool may have left at `output`.
fn discard(output: &Path) {
    match fs::remove_file(output) {
        Ok(()) => log::debug!("removed partial output {}", output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove {}: {}", output.display(), e),
    }
}

fn diagnostics(out: &Output) -> String {
    let mut text = String::from_utf8_lossy(&out.stderr).into_owned();
    if text.trim().is_empty() {
        text = String::from_utf8_lossy(&out.stdout).into_owned();
    }
    text
}

impl Toolchain for GccToolchain {
    fn compile_to_assembly(&self, source: &Path, output: &Path) -> Result<(), BuildError> {
        let mut args: Vec<OsString> = vec!["-S".into()];
        args.extend(self.target_args());
        args.extend([OsString::from("-o"), output.into(), source.into()]);

        let out = self.run(&self.config.gcc(), &args)?;
        if !out.status.success() {
            discard(output);
            return Err(BuildError::Compile {
                source: source.to_path_buf(),
                status: out.status.code(),
                diagnostics: diagnostics(&out),
            });
        }
        Ok(())
    }

    fn link(&self, assembly: &Path, output: &Path, link_address: u64) -> Result<(), BuildError> {
        let mut args: Vec<OsString> = vec![
            "-nostdlib".into(),
            "-static".into(),
            format!("-Wl,-Ttext=0x{:x}", link_address).into(),
        ];
        args.extend(self.target_args());
        args.extend([OsString::from("-o"), output.into(), assembly.into()]);

        let out = self.run(&self.config.gcc(), &args)?;
        if !out.status.success() {
            discard(output);
            return Err(BuildError::Link {
                input: assembly.to_path_buf(),
                status: out.status.code(),
                diagnostics: diagnostics(&out),
            });
        }
        Ok(())
    }

    fn extract_binary(&self, image: &Path, output: &Path) -> Result<u64, BuildError> {
        if !self.config.use_objcopy {
            return elf::extract_flat_binary(image, output);
        }

        let args: Vec<OsString> = vec!["-O".into(), "binary".into(), image.into(), output.into()];
        let out = self.run(&self.config.objcopy(), &args)?;
        if !out.status.success() {
            discard(output);
            return Err(BuildError::Extract {
                image: image.to_path_buf(),
                reason: diagnostics(&out).trim().to_string(),
            });
        }

        let size = fs::metadata(output)
            .map_err(|e| BuildError::io(output, e))?
            .len();
        if size == 0 {
            discard(output);
            return Err(BuildError::Extract {
                image: image.to_path_buf(),
                reason: "no loadable content".to_string(),
            });
        }
        Ok(size)
    }
}
