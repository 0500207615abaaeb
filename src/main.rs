use clap::{Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tablescope::catalog::DbInfo;
use tablescope::config::{load_or_default, Config};
use tablescope::core::{DalError, Result};
use tablescope::results_grid::ResultsGrid;
use tablescope::tui::{run_tui, App};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Browse the tables of a database and how many rows each holds
#[derive(Parser)]
#[command(name = "tablescope", version)]
struct Cli {
    /// Connection string (overrides the configuration file)
    #[arg(short, long, value_name = "CONNECTION_STRING")]
    database: Option<String>,

    /// Configuration file to use instead of the default one
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Append log output to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive table browser (default)
    Browse,
    /// Print the table report and exit
    Report {
        #[arg(short, long, value_enum, default_value = "table")]
        format: ReportFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Table,
    Csv,
    Json,
    Markdown,
}

impl ReportFormat {
    fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Table => "table",
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "markdown",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let interactive = !matches!(cli.command, Some(Commands::Report { .. }));
    if let Err(e) = init_logging(&config, cli.log_file.as_deref(), interactive) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting tablescope...");
    let connection_string = cli
        .database
        .or_else(|| config.database.connection_string.clone());

    let outcome = match cli.command.unwrap_or(Commands::Browse) {
        Commands::Browse => browse(connection_string, &config),
        Commands::Report { format } => report(connection_string, &config, format),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tablescope failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to the configured file; without one the browser stays quiet
/// and the report logs to stderr.
fn init_logging(config: &Config, log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|e| {
            DalError::Config(format!("Invalid log level '{}': {}", config.logging.level, e))
        })?;

    match log_file.map(Path::to_path_buf).or_else(|| config.logging.file.clone()) {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None if interactive => {}
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn browse(connection_string: Option<String>, config: &Config) -> Result<()> {
    let mut app = App::new(
        connection_string,
        config.database.command_timeout,
        config.ui.show_status_tips,
    );
    run_tui(&mut app)?;
    info!("Table browser closed");
    Ok(())
}

fn report(connection_string: Option<String>, config: &Config, format: ReportFormat) -> Result<()> {
    let connection_string = connection_string.ok_or_else(|| {
        DalError::Config(
            "No connection string; pass --database or set database.connection_string".to_string(),
        )
    })?;

    let infos = DbInfo::new(connection_string)
        .with_timeout(config.database.command_timeout)
        .table_infos()?;
    let output = ResultsGrid::from_table_infos(&infos).export(format.as_str())?;
    println!("{}", output.trim_end());
    Ok(())
}
