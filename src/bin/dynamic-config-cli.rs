use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde_json::json;

#[derive(Parser)]
#[command(name = "dynamic-config-cli")]
#[command(about = "Push configuration to a dynamic-config endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080/update-config")]
    url: String,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a configuration file for validation and reload
    Push {
        /// Configuration file to submit
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Push { file } => {
            let body = tokio::fs::read(&file).await?;
            let bytes = body.len();
            let res = client
                .post(&cli.url)
                .header(CONTENT_TYPE, "text/plain")
                .body(body)
                .send()
                .await?;

            let status = res.status();
            if cli.json {
                let report = json!({
                    "file": file.display().to_string(),
                    "bytes": bytes,
                    "status": status.as_u16(),
                    "applied": status.is_success(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if status.is_success() {
                println!("Applied {} ({} bytes)", file.display(), bytes);
            } else {
                eprintln!("Error: endpoint returned status {}", status);
                eprintln!("{}", explain(status.as_u16()));
            }

            Ok(if status.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn explain(status: u16) -> &'static str {
    match status {
        400 => "The configuration was rejected by the validator.",
        403 => "This address is not in the endpoint's allow-list.",
        405 => "The endpoint only accepts POST.",
        413 => "The configuration exceeds the endpoint's size limit.",
        500 => "The server failed to stage, validate or apply; check its logs.",
        _ => "Unexpected response.",
    }
}
