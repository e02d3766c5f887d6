//! joosopt CLI
//!
//! Optimizes or lists the bodies of a JOOS program stored as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use joosopt::{Optimizer, OptimizerConfig, Program};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "joosopt")]
#[command(author, version, about = "A peephole optimizer for JOOS bytecode", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize every body of a program
    Optimize {
        /// Program JSON file
        file: PathBuf,
        /// Write the optimized program here instead of stdout
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
        /// Optimizer configuration as JSON
        #[arg(long, value_name = "CFG")]
        config: Option<PathBuf>,
        /// Print rewrite statistics as JSON on stderr
        #[arg(long)]
        stats: bool,
    },

    /// Print the assembler listing of every body
    Disasm {
        /// Program JSON file
        file: PathBuf,
        /// Optimize before listing
        #[arg(long)]
        optimize: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Optimize {
            file,
            output,
            config,
            stats,
        } => run_optimize(&file, output.as_deref(), config.as_deref(), stats),
        Commands::Disasm { file, optimize } => run_disasm(&file, optimize),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<OptimizerConfig> {
    let Some(path) = path else {
        return Ok(OptimizerConfig::default());
    };
    let source = fs::read_to_string(path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("parsing config '{}'", path.display()))
}

fn load_program(path: &Path) -> Result<Program> {
    Program::load(path).with_context(|| format!("loading program '{}'", path.display()))
}

fn run_optimize(file: &Path, output: Option<&Path>, config: Option<&Path>, stats: bool) -> Result<()> {
    let optimizer = Optimizer::with_config(load_config(config)?);
    let mut program = load_program(file)?;

    let reports = program
        .optimize(&optimizer)
        .with_context(|| format!("optimizing '{}'", file.display()))?;
    let total = Program::total(&reports);
    info!(
        bodies = reports.len(),
        before = total.instructions_before,
        after = total.instructions_after,
        "program optimized"
    );

    match output {
        Some(out) => program
            .save(out)
            .with_context(|| format!("writing '{}'", out.display()))?,
        None => println!("{}", program.to_json()?),
    }

    if stats {
        eprintln!("{}", serde_json::to_string_pretty(&total)?);
    }
    Ok(())
}

fn run_disasm(file: &Path, optimize: bool) -> Result<()> {
    let mut program = load_program(file)?;
    if optimize {
        program
            .optimize(&Optimizer::new())
            .with_context(|| format!("optimizing '{}'", file.display()))?;
    }
    print!("{}", program.disassemble()?);
    Ok(())
}
