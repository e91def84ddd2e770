//! pymove CLI binary entry point.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use pymove::cli::{run_config, run_diff, run_graph, run_move};
use pymove::error::PymoveError;
use pymove::output::{emit_response, ErrorResponse};

/// Move top-level Python functions and classes between modules.
#[derive(Parser)]
#[command(name = "pymove")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory inside the project (default: current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the project's modules and dependency edges.
    Graph,

    /// Print the resolved project configuration.
    Config,

    /// Move a top-level function or class to another module.
    Move {
        /// Location of the definition: path:line:col
        #[arg(long)]
        from: String,

        /// Destination: path:line (inserted before that line)
        #[arg(long)]
        to: String,

        /// Write the changes (default: dry-run)
        #[arg(long)]
        apply: bool,

        /// Run the external formatter on changed modules
        #[arg(long)]
        format: bool,
    },

    /// Print the text edits turning one file into another.
    Diff {
        original: PathBuf,
        updated: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_format);

    match execute(cli) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Errors go to stdout as JSON, like every other response
            let response = ErrorResponse::from_error(&err);
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber on stderr.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn execute(cli: Cli) -> Result<String, PymoveError> {
    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Graph => run_graph(&workspace),
        Commands::Config => run_config(&workspace),
        Commands::Move {
            from,
            to,
            apply,
            format,
        } => run_move(&workspace, &from, &to, apply, format),
        Commands::Diff { original, updated } => run_diff(&original, &updated),
    }
}
