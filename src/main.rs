use emergency_alert::{AlertRequest, Config, Orchestrator, PgCallRecordStore};

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "emergency-alert", about = "Place automated emergency alert calls")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize, publish and phone an alert for one emergency
    Trigger {
        emergency_id: String,
        patient_id: String,
        patient_name: String,
        /// Defaults to DEFAULT_LOCATION
        #[arg(long)]
        location: Option<String>,
        /// Defaults to CALL_TO_NUMBER
        #[arg(long)]
        to: Option<String>,
    },
    /// Show the latest recorded alert call for an emergency
    Status { emergency_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("sqlx", tracing_subscriber::filter::LevelFilter::WARN),
            ("emergency_alert", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error=%e, "emergency-alert failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    info!(config=?config, "loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    PgCallRecordStore::new(db_pool.clone()).migrate().await?;
    let orchestrator = Orchestrator::from_config(&config, db_pool)?;

    match cli.command {
        Command::Trigger {
            emergency_id,
            patient_id,
            patient_name,
            location,
            to,
        } => {
            let request = AlertRequest {
                emergency_id,
                patient_id,
                patient_name,
                location,
                target_number: to,
            };
            match orchestrator.trigger(&request).await {
                Ok(success) => {
                    println!("{}", serde_json::to_string_pretty(&success)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "success": false,
                            "stage": e.stage(),
                            "error": e.to_string(),
                        })
                    );
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Status { emergency_id } => match orchestrator.get_status(&emergency_id).await? {
            Some(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": false,
                        "error": "No automation call found for this emergency",
                    })
                );
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
