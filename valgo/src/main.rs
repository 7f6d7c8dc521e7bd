//! valgo CLI

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use valgo::error::report_error;
use valgo::metadata::prelude;
use valgo::{CompileError, LowerConfig, Metadata, Result, ast::Program};

#[derive(Parser)]
#[command(name = "valgo", version, about = "Semantic lowering for the valgo Go backend")]
struct Cli {
    /// Lowering configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging; repeat for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lower a parsed program and print the target tree
    Lower {
        /// Parsed program (JSON)
        input: PathBuf,
        /// Metadata files of imported packages (JSON)
        #[arg(short, long)]
        metadata: Vec<PathBuf>,
        /// Print readable target code instead of JSON
        #[arg(long)]
        render: bool,
        /// Original source text, used to point at errors
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Lower a parsed program and only report errors
    Check {
        input: PathBuf,
        #[arg(short, long)]
        metadata: Vec<PathBuf>,
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Print the runtime prelude metadata (JSON)
    Prelude,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => LowerConfig::load_from_file(path),
        None => Ok(LowerConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let ok = match cli.command {
        Command::Lower {
            input,
            metadata,
            render,
            source,
        } => run(&input, &metadata, source.as_deref(), &config, |file| {
            if render {
                print!("{file}");
                Ok(())
            } else {
                let json = serde_json::to_string_pretty(file)
                    .map_err(|e| CompileError::io_error(format!("failed to serialize output: {e}")))?;
                println!("{json}");
                Ok(())
            }
        }),
        Command::Check {
            input,
            metadata,
            source,
        } => run(&input, &metadata, source.as_deref(), &config, |_| {
            println!("ok");
            Ok(())
        }),
        Command::Prelude => match serde_json::to_string_pretty(&prelude(&config.runtime_package)) {
            Ok(json) => {
                println!("{json}");
                true
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        },
    };
    if !ok {
        std::process::exit(1);
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };
    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(true);
    tracing_subscriber::registry().with(formatter).with(filter).init();
}

/// Lower `input` and hand the result to `emit`; errors are reported
/// against `source` when it is given
fn run(
    input: &Path,
    metadata: &[PathBuf],
    source: Option<&Path>,
    config: &LowerConfig,
    emit: impl FnOnce(&valgo::target::File) -> Result<()>,
) -> bool {
    let result = load_program(input)
        .and_then(|program| {
            let tables = load_metadata(metadata, config)?;
            valgo::lower_program(&program, &tables, config)
        })
        .and_then(|file| emit(&file));
    let Err(err) = result else {
        return true;
    };

    let filename = source.unwrap_or(input).display().to_string();
    let text = source
        .and_then(|path| std::fs::read_to_string(path).ok())
        .unwrap_or_default();
    if report_error(&filename, &text, &err).is_err() {
        eprintln!("Error: {err}");
    }
    false
}

fn load_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CompileError::io_error(format!("failed to read {}: {e}", path.display())))?;
    let program: Program = serde_json::from_str(&text)
        .map_err(|e| CompileError::io_error(format!("invalid program {}: {e}", path.display())))?;
    debug!(package = %program.package, decls = program.decls.len(), "loaded program");
    Ok(program)
}

fn load_metadata(paths: &[PathBuf], config: &LowerConfig) -> Result<Metadata> {
    let mut tables = Metadata::with_prelude(&config.runtime_package);
    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompileError::metadata_error(format!("failed to read {}: {e}", path.display()))
        })?;
        tables.merge(Metadata::from_json(&text)?);
        info!(path = %path.display(), "loaded metadata");
    }
    Ok(tables)
}
