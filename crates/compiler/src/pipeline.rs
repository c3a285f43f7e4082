//! Per-program build: compile → link → extract, each stage skipped when its
//! output is newer than its input.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::BuildError;
use crate::manifest::{BuildPlan, Program, SourceKind};
use crate::toolchain::Toolchain;

/// Default text address, matching `-Wl,-Ttext=0x0`.
pub const DEFAULT_LINK_ADDRESS: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Link,
    Extract,
}

/// What happened to one program during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub program: String,
    pub binary: PathBuf,
    pub size: u64,
    /// Stages that actually ran; empty when everything was up to date.
    pub stages_run: Vec<Stage>,
}

impl ArtifactReport {
    pub fn is_up_to_date(&self) -> bool {
        self.stages_run.is_empty()
    }
}

#[derive(Debug)]
pub struct Builder<T: Toolchain> {
    dir: PathBuf,
    plan: BuildPlan,
    toolchain: T,
    link_address: u64,
    keep_going: bool,
}

impl<T: Toolchain> Builder<T> {
    pub fn new(dir: impl Into<PathBuf>, plan: BuildPlan, toolchain: T) -> Self {
        let link_address = plan.link_address.unwrap_or(DEFAULT_LINK_ADDRESS);
        Self {
            dir: dir.into(),
            plan,
            toolchain,
            link_address,
            keep_going: false,
        }
    }

    pub fn with_link_address(mut self, address: u64) -> Self {
        self.link_address = address;
        self
    }

    /// Continue with the remaining programs after a failure (`make -k`).
    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    pub fn link_address(&self) -> u64 {
        self.link_address
    }

    /// The default target: every declared program, in plan order.
    pub fn build_all(&self) -> Result<Vec<ArtifactReport>, BuildError> {
        let programs: Vec<&Program> = self.plan.programs.iter().collect();
        self.build_programs(&programs)
    }

    /// Builds the named programs. All names are resolved before anything runs.
    pub fn build_targets<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ArtifactReport>, BuildError> {
        if names.is_empty() {
            return self.build_all();
        }
        let mut programs = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let program = self
                .plan
                .find(name)
                .ok_or_else(|| BuildError::UnknownTarget(name.to_string()))?;
            programs.push(program);
        }
        self.build_programs(&programs)
    }

    fn build_programs(&self, programs: &[&Program]) -> Result<Vec<ArtifactReport>, BuildError> {
        let mut reports = Vec::with_capacity(programs.len());
        let mut failures = Vec::new();

        for program in programs {
            match self.build_program(program) {
                Ok(report) => reports.push(report),
                Err(e) if self.keep_going => {
                    log::error!("{}: {}", program.name, e);
                    failures.push((program.name.clone(), e));
                }
                Err(e) => return Err(e),
            }
        }

        if failures.is_empty() {
            Ok(reports)
        } else {
            Err(BuildError::Multiple(failures))
        }
    }

    /// Runs the out-of-date stages for one program.
    pub fn build_program(&self, program: &Program) -> Result<ArtifactReport, BuildError> {
        let source = program.source_path(&self.dir);
        let assembly = program.assembly_path(&self.dir);
        let image = program.image_path(&self.dir);
        let binary = program.binary_path(&self.dir);

        if !source.is_file() {
            return Err(BuildError::io(
                &source,
                io::Error::new(io::ErrorKind::NotFound, "source file missing"),
            ));
        }

        let mut stages_run = Vec::new();

        if program.kind() == Some(SourceKind::C) && is_stale(&assembly, &source)? {
            log::debug!("{}: compiling {}", program.name, source.display());
            self.toolchain.compile_to_assembly(&source, &assembly)?;
            stages_run.push(Stage::Compile);
        }

        if is_stale(&image, &assembly)? {
            log::debug!("{}: linking at 0x{:x}", program.name, self.link_address);
            self.toolchain.link(&assembly, &image, self.link_address)?;
            stages_run.push(Stage::Link);
        }

        let size = if is_stale(&binary, &image)? {
            log::debug!("{}: extracting {}", program.name, binary.display());
            let size = self.toolchain.extract_binary(&image, &binary)?;
            stages_run.push(Stage::Extract);
            size
        } else {
            fs::metadata(&binary)
                .map_err(|e| BuildError::io(&binary, e))?
                .len()
        };

        if stages_run.is_empty() {
            log::info!("{} is up to date", binary.display());
        } else {
            log::info!("built {} ({} bytes)", binary.display(), size);
        }

        Ok(ArtifactReport {
            program: program.name.clone(),
            binary,
            size,
            stages_run,
        })
    }

    /// Removes every generated file of every declared program. Missing files
    /// are fine; sources are never touched. Returns the files removed.
    pub fn clean(&self) -> Result<Vec<PathBuf>, BuildError> {
        let sources = self.plan.source_paths(&self.dir);
        let mut removed = Vec::new();
        for program in &self.plan.programs {
            for path in program.generated_paths(&self.dir) {
                if sources.contains(&path) {
                    log::warn!("{}: not removing source {}", program.name, path.display());
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => {
                        log::debug!("removed {}", path.display());
                        removed.push(path);
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(BuildError::io(&path, e)),
                }
            }
        }
        Ok(removed)
    }

    /// Whether `program.bin` exists and nothing upstream of it is newer.
    pub fn is_up_to_date(&self, program: &Program) -> Result<bool, BuildError> {
        let source = program.source_path(&self.dir);
        let assembly = program.assembly_path(&self.dir);
        let image = program.image_path(&self.dir);
        let binary = program.binary_path(&self.dir);

        let compile_stale =
            program.kind() == Some(SourceKind::C) && is_stale(&assembly, &source)?;
        Ok(!compile_stale && !is_stale(&image, &assembly)? && !is_stale(&binary, &image)?)
    }
}

/// Make's rule: rebuild when the output is missing or older than its input.
fn is_stale(output: &Path, input: &Path) -> Result<bool, BuildError> {
    let Some(out_time) = modified(output)? else {
        return Ok(true);
    };
    match modified(input)? {
        Some(in_time) => Ok(in_time > out_time),
        // The input is produced by an earlier stage that has not run.
        None => Ok(true),
    }
}

fn modified(path: &Path) -> Result<Option<SystemTime>, BuildError> {
    match fs::metadata(path) {
        Ok(meta) => meta
            .modified()
            .map(Some)
            .map_err(|e| BuildError::io(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BuildError::io(path, e)),
    }
}
