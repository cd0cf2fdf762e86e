use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use billscan::config::{self, load_config, Config};
use billscan::db::{record_repo, stats_repo, Database};
use billscan::error::ConfigError;
use billscan::parse::{parse_transaction_time, TIME_FORMAT};
use billscan::pipeline::{ImageSubmission, PipelineBuilder};
use billscan::registry::Stage;
use billscan::sanitize::redact_path;
use billscan::{logging, BillscanError};

#[derive(Parser, Debug)]
#[command(name = "billscan", version)]
#[command(about = "Turn receipt photos and payment screenshots into bookkeeping records")]
struct Cli {
    /// JSON config file; built-in defaults are used when omitted
    #[arg(short, long, env = "BILLSCAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an image through the pipeline and print the finished job
    Analyze {
        image: PathBuf,
    },
    /// Show one stored record
    Record {
        record_id: String,
    },
    /// List records whose transaction time falls in a range
    Records {
        /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        from: String,
        /// A bare date includes the whole day
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = record_repo::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// List records paid with one payment method
    ByMethod {
        payment_method: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = record_repo::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Change a record's status, optionally replacing its description
    SetStatus {
        record_id: String,
        status: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Spending statistics over a time range
    Stats {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Check every pipeline component
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(|path| load_config(path)).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &Config) -> Result<ExitCode, BillscanError> {
    match command {
        Commands::Analyze { image } => analyze(&image, config).await,
        Commands::Record { record_id } => {
            let db = config::open_database(config)?;
            match record_repo::find_by_record_id(&db, &record_id)? {
                Some(record) => {
                    print_json(&record)?;
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("No record with id {}", record_id);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Records {
            from,
            to,
            page,
            page_size,
        } => {
            let (from, to) = time_range(&from, &to)?;
            let db = config::open_database(config)?;
            print_json(&record_repo::query_by_time_range(
                &db, &from, &to, page, page_size,
            )?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ByMethod {
            payment_method,
            page,
            page_size,
        } => {
            let db = config::open_database(config)?;
            print_json(&record_repo::query_by_payment_method(
                &db,
                &payment_method,
                page,
                page_size,
            )?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::SetStatus {
            record_id,
            status,
            description,
        } => {
            let db = config::open_database(config)?;
            if record_repo::update_status(&db, &record_id, &status, description.as_deref())? {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("No record with id {}", record_id);
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Stats { from, to } => {
            let (from, to) = time_range(&from, &to)?;
            let db: Database = config::open_database(config)?;
            print_json(&stats_repo::spending_stats(&db, &from, &to)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => {
            let pipeline = PipelineBuilder::from_config(config)?.build()?;
            let report = pipeline.health().await;
            print_json(&report)?;
            Ok(if report.healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn analyze(image: &Path, config: &Config) -> Result<ExitCode, BillscanError> {
    let bytes = tokio::fs::read(image).await?;
    let filename = image.file_name().and_then(|name| name.to_str());
    let content_type = mime_guess::from_path(image)
        .first()
        .map(|mime| mime.essence_str().to_string());
    let submission = ImageSubmission::from_upload(bytes, filename, content_type.as_deref())?;

    let pipeline = PipelineBuilder::from_config(config)?.build()?;
    let mut events = pipeline.subscribe();
    let id = pipeline.submit(submission)?;
    tracing::info!(image = %redact_path(image), job_id = %id, "Analyzing image");

    loop {
        match events.recv().await {
            Ok(event) if event.job_id == id => {
                eprintln!("[{}] {}", event.stage, event.message);
                if event.stage.is_terminal() {
                    break;
                }
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }

    let job = pipeline.wait_for(&id).await?;
    print_json(&job)?;
    Ok(if job.stage == Stage::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Normalizes CLI range bounds to stored timestamps; a bare `to` date covers the whole day.
fn time_range(from: &str, to: &str) -> Result<(String, String), ConfigError> {
    let start = parse_transaction_time(from).ok_or_else(|| bad_time(from))?;
    let end = match NaiveDate::parse_from_str(to.trim(), "%Y-%m-%d") {
        Ok(day) => day.and_hms_opt(23, 59, 59),
        Err(_) => parse_transaction_time(to),
    }
    .ok_or_else(|| bad_time(to))?;

    if end < start {
        return Err(ConfigError::Validation {
            message: format!("Range end {} is before its start {}", to, from),
        });
    }
    Ok((format_time(start), format_time(end)))
}

fn format_time(value: NaiveDateTime) -> String {
    value.format(TIME_FORMAT).to_string()
}

fn bad_time(input: &str) -> ConfigError {
    ConfigError::Validation {
        message: format!("Unrecognized date/time '{}'", input),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), BillscanError> {
    let json = serde_json::to_string_pretty(value).map_err(ConfigError::from)?;
    println!("{}", json);
    Ok(())
}
