//! Which programs a build directory declares, and where each artifact lives.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// File name of the optional manifest inside a build directory.
pub const MANIFEST_FILE: &str = "rvbuild.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    C,
    Assembly,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") => Some(SourceKind::C),
            Some("s") | Some("S") => Some(SourceKind::Assembly),
            _ => None,
        }
    }
}

/// One declared program: `hello` built from `hello.c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    /// Relative to the build directory.
    pub source: PathBuf,
}

impl Program {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> Option<SourceKind> {
        SourceKind::from_path(&self.source)
    }

    pub fn source_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.source)
    }

    /// Input of the link stage. For assembly sources this is the source itself.
    pub fn assembly_path(&self, dir: &Path) -> PathBuf {
        match self.kind() {
            Some(SourceKind::Assembly) => self.source_path(dir),
            _ => dir.join(format!("{}.s", self.name)),
        }
    }

    pub fn image_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }

    pub fn binary_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.bin", self.name))
    }

    /// Every file the build creates for this program, in creation order.
    /// Never includes the source.
    pub fn generated_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(3);
        if self.kind() == Some(SourceKind::C) {
            paths.push(self.assembly_path(dir));
        }
        paths.push(self.image_path(dir));
        paths.push(self.binary_path(dir));
        paths
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub programs: Vec<Program>,
    /// Overrides the toolchain's default text address when present.
    #[serde(default)]
    pub link_address: Option<u64>,
}

impl BuildPlan {
    /// Reads `rvbuild.json` from `dir`, or discovers sources when it is absent.
    pub fn load(dir: &Path) -> Result<Self, BuildError> {
        let manifest = dir.join(MANIFEST_FILE);
        if manifest.is_file() {
            Self::from_manifest(&manifest)
        } else {
            Self::discover(dir)
        }
    }

    pub fn from_manifest(path: &Path) -> Result<Self, BuildError> {
        let text = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let plan: BuildPlan = serde_json::from_str(&text).map_err(|e| BuildError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        plan.validate(path)?;
        Ok(plan)
    }

    /// Every `*.c`, `*.s` and `*.S` file becomes a program named after its
    /// stem. A `.s` sharing its stem with a `.c` is that program's
    /// intermediate, not a program of its own.
    pub fn discover(dir: &Path) -> Result<Self, BuildError> {
        let entries = fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BuildError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(kind) = SourceKind::from_path(&path) {
                files.push((path, kind));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let c_stems: BTreeSet<String> = files
            .iter()
            .filter(|(_, kind)| *kind == SourceKind::C)
            .filter_map(|(path, _)| file_stem(path))
            .collect();

        let mut programs = Vec::new();
        for (path, kind) in files {
            let (Some(stem), Some(name)) = (file_stem(&path), path.file_name()) else {
                continue;
            };
            if kind == SourceKind::Assembly && c_stems.contains(&stem) {
                continue;
            }
            programs.push(Program::new(stem, PathBuf::from(name)));
        }

        Ok(Self {
            programs,
            link_address: None,
        })
    }

    pub fn find(&self, name: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.name == name)
    }

    fn validate(&self, path: &Path) -> Result<(), BuildError> {
        let invalid = |reason: String| BuildError::Manifest {
            path: path.to_path_buf(),
            reason,
        };

        let mut seen = BTreeSet::new();
        for program in &self.programs {
            if program.name.is_empty() || program.name.contains(['/', '\\']) {
                return Err(invalid(format!("bad program name `{}`", program.name)));
            }
            if !seen.insert(program.name.as_str()) {
                return Err(invalid(format!("program `{}` declared twice", program.name)));
            }
            if program.kind().is_none() {
                return Err(invalid(format!(
                    "{}: unsupported source type (expected .c, .s or .S)",
                    program.source.display()
                )));
            }
            // `foo` from `foo` would clobber the source with the linked image.
            if Path::new(&program.name) == program.source {
                return Err(invalid(format!("program `{}` would overwrite its source", program.name)));
            }
        }

        let here = Path::new("");
        let sources: BTreeSet<PathBuf> = self
            .programs
            .iter()
            .map(|p| normalize(&p.source_path(here)))
            .collect();
        let mut outputs: BTreeSet<PathBuf> = BTreeSet::new();
        for program in &self.programs {
            for output in program.generated_paths(here).iter().map(|p| normalize(p)) {
                if sources.contains(&output) {
                    return Err(invalid(format!(
                        "program `{}` would overwrite source {}",
                        program.name,
                        output.display()
                    )));
                }
                if !outputs.insert(output.clone()) {
                    return Err(invalid(format!(
                        "program `{}` generates {}, which another program also generates",
                        program.name,
                        output.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every declared source, joined onto `dir`.
    pub fn source_paths(&self, dir: &Path) -> BTreeSet<PathBuf> {
        self.programs.iter().map(|p| p.source_path(dir)).collect()
    }
}

/// Drops `.` components so `./hello.s` and `hello.s` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_program_paths() {
        let p = Program::new("hello", "hello.c");
        let dir = Path::new("/tmp/variant");
        assert_eq!(p.assembly_path(dir), dir.join("hello.s"));
        assert_eq!(p.image_path(dir), dir.join("hello"));
        assert_eq!(p.binary_path(dir), dir.join("hello.bin"));
        assert_eq!(p.generated_paths(dir).len(), 3);
    }

    #[test]
    fn assembly_source_is_never_generated() {
        let p = Program::new("csr", "csr.s");
        let dir = Path::new("/tmp/variant");
        assert_eq!(p.assembly_path(dir), dir.join("csr.s"));
        assert!(!p.generated_paths(dir).contains(&dir.join("csr.s")));
    }

    #[test]
    fn manifest_json_shape() {
        let plan: BuildPlan = serde_json::from_str(
            r#"{"programs":[{"name":"fib","source":"fib.c"}],"link_address":4096}"#,
        )
        .unwrap();
        assert_eq!(plan.programs, vec![Program::new("fib", "fib.c")]);
        assert_eq!(plan.link_address, Some(0x1000));
    }
}
