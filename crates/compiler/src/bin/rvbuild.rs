use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

use compiler::toolchain::{DEFAULT_MABI, DEFAULT_MARCH};
use compiler::{BuildError, BuildPlan, Builder, GccToolchain, ToolchainConfig};

/// Builds bare-metal RISC-V programs into flat binaries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the sources (and optional rvbuild.json)
    #[arg(short = 'C', long = "dir", default_value = ".")]
    dir: PathBuf,

    /// More output (-v: stage details, -vv: tool command lines)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Build the named programs, or all of them
    Build {
        targets: Vec<String>,

        /// Cross toolchain prefix [env: RISCV_PREFIX, default: riscv64-unknown-elf-]
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long, default_value = DEFAULT_MARCH)]
        march: String,

        #[arg(long, default_value = DEFAULT_MABI)]
        mabi: String,

        /// Text address passed to the linker (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_address)]
        link_address: Option<u64>,

        /// Extract with <prefix>objcopy instead of the built-in extractor
        #[arg(long)]
        objcopy: bool,

        /// Keep building other programs after a failure
        #[arg(short, long)]
        keep_going: bool,
    },
    /// Remove every generated file, leaving only sources
    Clean,
    /// Show the declared programs and whether they are up to date
    List,
}

fn parse_address(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{}`: {}", text, e))
}

struct ConsoleLogger {
    level: LevelFilter,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error".red().bold(),
            Level::Warn => "warn".yellow().bold(),
            Level::Info => "info".green(),
            Level::Debug => "debug".blue(),
            Level::Trace => "trace".dimmed(),
        };
        eprintln!("{}: {}", tag, record.args());
    }

    fn flush(&self) {}
}

fn init_logger(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, _) => LevelFilter::Debug,
    };
    if log::set_boxed_logger(Box::new(ConsoleLogger { level })).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    if let Err(e) = run() {
        report(&e);
        std::process::exit(1);
    }
}

/// Prints the error chain, and any tool diagnostics verbatim.
fn report(e: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), e);
    let Some(build_error) = e.downcast_ref::<BuildError>() else {
        return;
    };
    let failures: Vec<&BuildError> = match build_error {
        BuildError::Multiple(failures) => failures.iter().map(|(_, err)| err).collect(),
        single => vec![single],
    };
    for failure in failures {
        if let BuildError::Multiple(_) = build_error {
            eprintln!("  {} {}", "✗".red(), failure);
        }
        if let Some(diagnostics) = failure.diagnostics() {
            eprint!("{}", diagnostics);
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose, args.quiet);

    let plan = BuildPlan::load(&args.dir)
        .with_context(|| format!("failed to load build plan from {}", args.dir.display()))?;

    match args.command {
        Cmd::Build {
            targets,
            prefix,
            march,
            mabi,
            link_address,
            objcopy,
            keep_going,
        } => {
            let mut config = ToolchainConfig::from_env();
            if let Some(prefix) = prefix {
                config.prefix = prefix;
            }
            config.march = march;
            config.mabi = mabi;
            config.use_objcopy = objcopy;

            let mut builder =
                Builder::new(&args.dir, plan, GccToolchain::new(config)).with_keep_going(keep_going);
            if let Some(address) = link_address {
                builder = builder.with_link_address(address);
            }

            let reports = builder.build_targets(targets.as_slice())?;
            if !args.quiet {
                for report in &reports {
                    let status = if report.is_up_to_date() {
                        "up to date".dimmed()
                    } else {
                        "built".green()
                    };
                    println!(
                        "{} {} -> {} ({} bytes, {})",
                        "✓".green(),
                        report.program.bold(),
                        report.binary.display(),
                        report.size,
                        status
                    );
                }
            }
        }
        Cmd::Clean => {
            let builder = Builder::new(&args.dir, plan, GccToolchain::new(ToolchainConfig::from_env()));
            let removed = builder.clean()?;
            if !args.quiet {
                for path in &removed {
                    println!("removed {}", path.display());
                }
            }
        }
        Cmd::List => {
            let builder = Builder::new(&args.dir, plan, GccToolchain::new(ToolchainConfig::from_env()));
            println!(
                "{} (link address 0x{:x})",
                builder.dir().display().to_string().bold(),
                builder.link_address()
            );
            for program in &builder.plan().programs {
                let status = if builder.is_up_to_date(program)? {
                    "up to date".green()
                } else {
                    "needs build".yellow()
                };
                println!(
                    "  {:<12} {:<12} {}",
                    program.name,
                    program.source.display().to_string(),
                    status
                );
            }
        }
    }

    Ok(())
}
