use std::fmt;
use std::io;
use std::path::PathBuf;

/// Everything that can stop a program from reaching its flat binary.
///
/// Compile, link and extraction failures are fatal for the program they
/// belong to; nothing downstream of the failing stage is produced.
#[derive(Debug)]
pub enum BuildError {
    /// The compiler rejected a source file. `diagnostics` is the tool's stderr.
    Compile {
        source: PathBuf,
        status: Option<i32>,
        diagnostics: String,
    },
    /// Unresolved symbols, bad target options, ...
    Link {
        input: PathBuf,
        status: Option<i32>,
        diagnostics: String,
    },
    /// The linked image had nothing loadable, or the extractor failed.
    Extract { image: PathBuf, reason: String },
    /// An external tool could not be spawned at all.
    ToolNotFound { tool: String },
    Io { path: PathBuf, source: io::Error },
    Elf { image: PathBuf, source: goblin::error::Error },
    Manifest { path: PathBuf, reason: String },
    UnknownTarget(String),
    /// Several programs failed while building with `keep_going`.
    Multiple(Vec<(String, BuildError)>),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Verbatim output of the failing tool, when there is one.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            BuildError::Compile { diagnostics, .. } | BuildError::Link { diagnostics, .. } => {
                Some(diagnostics.as_str())
            }
            _ => None,
        }
    }
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Compile { source, status, .. } => write!(
                f,
                "compilation of {} failed ({})",
                source.display(),
                status_text(status)
            ),
            BuildError::Link { input, status, .. } => write!(
                f,
                "linking {} failed ({})",
                input.display(),
                status_text(status)
            ),
            BuildError::Extract { image, reason } => {
                write!(f, "cannot extract flat binary from {}: {}", image.display(), reason)
            }
            BuildError::ToolNotFound { tool } => write!(f, "tool `{}` not found in PATH", tool),
            BuildError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            BuildError::Elf { image, source } => {
                write!(f, "{} is not a valid ELF image: {}", image.display(), source)
            }
            BuildError::Manifest { path, reason } => {
                write!(f, "invalid build manifest {}: {}", path.display(), reason)
            }
            BuildError::UnknownTarget(name) => write!(f, "no rule to make target `{}`", name),
            BuildError::Multiple(failures) => {
                let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
                write!(f, "{} target(s) failed: {}", failures.len(), names.join(", "))
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Io { source, .. } => Some(source),
            BuildError::Elf { source, .. } => Some(source),
            _ => None,
        }
    }
}
