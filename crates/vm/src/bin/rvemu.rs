use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

use vm::bus::Uart;
use vm::{ExitReason, Vm, VmConfig};

/// Runs a flat RV64 binary loaded at 0x8000_0000.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Headerless binary produced by `rvbuild`
    binary: PathBuf,

    /// DRAM size in MiB
    #[arg(long, default_value_t = 128)]
    memory_mib: u64,

    /// Stop after this many steps
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print every executed instruction and trap
    #[arg(long)]
    trace: bool,

    /// Feed stdin to the UART receiver
    #[arg(long)]
    input: bool,

    /// Skip the register and CSR dump at exit
    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    if log::set_boxed_logger(Box::new(ConsoleLogger { level })).is_ok() {
        log::set_max_level(level);
    }
}

fn memory_bytes(mib: u64) -> Result<u64> {
    let bytes = mib
        .checked_mul(1024 * 1024)
        .with_context(|| format!("--memory-mib {} overflows", mib))?;
    if bytes == 0 {
        bail!("--memory-mib must be at least 1");
    }
    Ok(bytes)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let binary = fs::read(&args.binary)
        .with_context(|| format!("failed to read {}", args.binary.display()))?;

    let config = VmConfig {
        memory_size: memory_bytes(args.memory_mib)?,
        max_steps: args.max_steps,
        verbose: args.trace,
    };
    let mut vm = Vm::with_uart(&binary, config, Uart::stdio(args.input))
        .with_context(|| format!("failed to load {}", args.binary.display()))?;

    log::info!("running {} ({} bytes)", args.binary.display(), binary.len());
    let outcome = vm.run();

    match outcome.exit {
        ExitReason::Fatal(exception) => eprintln!(
            "{} {} after {} steps",
            "stopped:".yellow().bold(),
            exception,
            outcome.steps
        ),
        ExitReason::StepLimit => eprintln!(
            "{} step limit reached after {} steps",
            "stopped:".yellow().bold(),
            outcome.steps
        ),
    }

    if !args.quiet {
        println!("{}", "--- Registers ---".bold());
        print!("{}", vm.dump_registers());
        println!("{}", "--- CSRs ---".bold());
        print!("{}", vm.dump_csrs());
    }

    Ok(())
}
