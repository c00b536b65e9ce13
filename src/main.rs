//! loopdep Command Line Interface
//!
//! Usage:
//!   loopdep [OPTIONS] <input-file>
//!   loopdep --help
//!
//! Examples:
//!   loopdep block.json                       # Print every dependence
//!   loopdep --format=json block.json         # Machine-readable report
//!   loopdep --check=interchange --depth=1 nest.json
//!   loopdep --check=cut --factor=8 loop.json

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info};
use loopdep::analysis::{AnalysisOptions, DependenceAnalysis, DependenceReport, DependenceSet};
use loopdep::ir::ast::{Stmt, StmtKind};
use loopdep::transform::{
    CheckStatus, DistributionCheck, FusionCheck, InterchangeCheck, LoopCheck, LoopCutCheck, ParallelizeCheck,
    TileCheck,
};
use loopdep::AnalysisConfig;
use std::fs;
use std::path::PathBuf;

/// loopdep - data-dependence analysis for counted loop nests
#[derive(Parser, Debug)]
#[command(name = "loopdep")]
#[command(version)]
#[command(about = "Data-dependence analysis and loop transformation legality checks", long_about = None)]
struct Cli {
    /// JSON file holding a statement or a list of statements
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Legality check to run on the first statement
    #[arg(long)]
    check: Option<CheckKind>,

    /// Interchange depth
    #[arg(long, default_value = "1")]
    depth: usize,

    /// Loop-cut factor
    #[arg(long, default_value = "2")]
    factor: i64,

    /// Tile sizes (WIDTH or WIDTH,HEIGHT)
    #[arg(long, value_delimiter = ',', num_args = 1..=2)]
    tile: Option<Vec<i64>>,

    /// Decide feasibility over the reals instead of the integers
    #[arg(long)]
    real: bool,

    /// Eliminator row cap
    #[arg(long)]
    max_rows: Option<usize>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One dependence per line
    Text,
    /// JSON report
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CheckKind {
    Parallel,
    Interchange,
    Fusion,
    Tile,
    Cut,
    Distribute,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("loopdep v{}", loopdep::VERSION);
    debug!("Input file: {:?}", cli.input);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;
    let stmts = parse_block(&source).with_context(|| format!("Failed to decode statements in {:?}", cli.input))?;

    let config = build_config(&cli);
    debug!("Analysis config: {:?}", config);
    let options = AnalysisOptions::new(config);

    match cli.check {
        Some(kind) => run_check(&cli, kind, &stmts, &options),
        None => print_dependences(&cli, &stmts, &options),
    }
}

/// Accept either a single statement or a list of statements.
fn parse_block(source: &str) -> Result<Vec<Stmt>> {
    let value: serde_json::Value = serde_json::from_str(source)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

fn build_config(cli: &Cli) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    if cli.real {
        config.integer_solutions = false;
    }
    if let Some(rows) = cli.max_rows {
        config.max_constraint_rows = rows;
    }
    config
}

fn print_dependences(cli: &Cli, stmts: &[Stmt], options: &AnalysisOptions<'_>) -> Result<()> {
    let analysis = match DependenceAnalysis::new(stmts, options) {
        Ok(analysis) => analysis,
        Err(e) => {
            error!("{}", e.to_diagnostic());
            return Err(e).context("Dependence analysis failed");
        }
    };
    info!("{} accesses, {} dependences", analysis.variable_accesses().len(), analysis.dependences().len());

    match cli.format {
        OutputFormat::Text => {
            for dep in analysis.dependences() {
                println!("{}", dep);
            }
        }
        OutputFormat::Json => {
            let report = DependenceReport::from(&analysis);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn run_check(cli: &Cli, kind: CheckKind, stmts: &[Stmt], options: &AnalysisOptions<'_>) -> Result<()> {
    // A single compound statement stands for its contents.
    let stmts = match stmts {
        [only] if matches!(only.kind, StmtKind::Compound(_)) => only.statements(),
        _ => stmts,
    };
    let Some(first) = stmts.first() else {
        bail!("--check needs at least one statement");
    };

    let status: CheckStatus = match kind {
        CheckKind::Parallel => ParallelizeCheck::new().run(first, options),
        CheckKind::Interchange => InterchangeCheck::new(cli.depth).run(first, options),
        CheckKind::Tile => {
            let check = match cli.tile.as_deref() {
                Some([width, height]) => TileCheck::new(*width, *height),
                Some([width]) => TileCheck::strided(*width),
                _ => TileCheck::new(32, 32),
            };
            check.run(first, options)
        }
        CheckKind::Cut => LoopCutCheck::new(cli.factor).run(first, options),
        CheckKind::Distribute => DistributionCheck::new().run(first, options),
        CheckKind::Fusion => {
            let Some(second) = stmts.get(1) else {
                bail!("--check=fusion needs two consecutive statements");
            };
            FusionCheck::new().run(first, second, options)
        }
    };

    for diagnostic in status.diagnostics() {
        match cli.format {
            OutputFormat::Text => println!("{}", diagnostic),
            OutputFormat::Json => println!("{}", serde_json::json!({ "diagnostic": diagnostic.to_string() })),
        }
    }
    if status.is_ok() {
        println!("{:?}: legal", kind);
        Ok(())
    } else {
        bail!("{:?} is not legal for the loop at {}", kind, first.span)
    }
}
