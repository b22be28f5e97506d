//! `normcalc` -- survey scope and cost estimation.
//!
//! Reads JSON input, prints the resulting document as pretty JSON on stdout.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default          | Description                         |
//! |----------------------------|----------|------------------|-------------------------------------|
//! | `NORMCALC_DATA_DIR`        | no       | builtin catalog  | Catalog directory                   |
//! | `NORMCALC_VERSION`         | no       | by date          | Normative version override          |
//! | `NORMCALC_DEFAULT_VERSION` | no       | `2025`           | Fallback when no manifest is usable |
//! | `NORMCALC_LOG`             | no       | `normcalc=info`  | Tracing filter                      |

use clap::Parser;
use normcalc_cli::cli::Cli;
use normcalc_cli::commands;
use normcalc_cli::config::CliConfig;
use normcalc_cli::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.apply_to(CliConfig::from_env());
    logging::init(&config.log_filter, cli.json_logs);

    let pipeline = commands::build_pipeline(&config);
    let output = match commands::run(&cli.command, &pipeline).await {
        Ok(output) => output,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("error: failed to serialize output: {err}");
            std::process::exit(1);
        }
    }
}
