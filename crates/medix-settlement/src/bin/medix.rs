//! # Medix Settlement CLI
//!
//! Runs one settlement operation against the configured database and
//! prints the result as JSON.
//!
//! ## Usage
//! ```bash
//! # Settle a cart
//! medix checkout cart.json
//!
//! # Refund (request read from stdin)
//! echo '{"invoice_number":"INV-250101-7F3A9C21","staff_id":"staff-7"}' | medix refund -
//!
//! # Look a sale up
//! medix show INV-250101-7F3A9C21
//!
//! # Receive a batch, correct a count
//! medix receive batch.json
//! medix adjust 6f1c0c1e-... -2 "broken strip"
//!
//! # Catalog and stock position
//! medix medicines
//! medix stock 3b9d2f4a-...
//!
//! # Use another database / config file
//! medix --db ./medix_dev.db --config ./medix.toml show INV-250101-7F3A9C21
//! ```
//!
//! ## Exit Status
//! - 0: success
//! - 1: anything else
//! - 2: the request was rejected (validation, stock, unknown sale)
//! - 3: bad configuration or usage
//! - 75: the store was busy or failed; the same request may be resubmitted

use std::env;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use medix_core::NewBatch;
use medix_settlement::{
    CheckoutRequest, RefundRequest, SettlementConfig, SettlementEngine, SettlementError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Medix Settlement CLI

Usage: medix [OPTIONS] <COMMAND>

Commands:
  checkout <FILE|->                Settle a CheckoutRequest
  refund <FILE|->                  Apply a RefundRequest
  show <INVOICE>                   Print a sale with lines and refunds
  receive <FILE|->                 Receive a NewBatch into stock
  adjust <BATCH_ID> <DELTA> [NOTE] Correct a batch quantity
  medicines                        List sellable medicines
  stock <MEDICINE_ID>              Show batches and quantities of a medicine

Options:
  -c, --config <PATH>   Config file (default: platform config dir/medix.toml)
  -d, --db <PATH>       Database file, overrides the config
  -h, --help            Show this help message";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut command: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            other => command.push(other.to_string()),
        }
        i += 1;
    }

    if command.is_empty() {
        eprintln!("{USAGE}");
        return ExitCode::from(3);
    }

    match run(config_path, db_path, &command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_client_error() {
                ExitCode::from(2)
            } else if e.is_config_error() {
                ExitCode::from(3)
            } else if e.is_retryable() {
                ExitCode::from(75)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    command: &[String],
) -> Result<(), SettlementError> {
    let mut config = SettlementConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    let engine = SettlementEngine::from_config(&config).await?;

    let result = match command {
        [cmd, source] if cmd == "checkout" => {
            let request: CheckoutRequest = read_json(source)?;
            print_json(&engine.checkout(&request).await?)
        }
        [cmd, source] if cmd == "refund" => {
            let request: RefundRequest = read_json(source)?;
            print_json(&engine.refund(&request).await?)
        }
        [cmd, invoice] if cmd == "show" => print_json(&engine.sale(invoice).await?),
        [cmd, source] if cmd == "receive" => {
            let receipt: NewBatch = read_json(source)?;
            print_json(&engine.receive_batch(&receipt, Some("cli")).await?)
        }
        [cmd, batch_id, delta, rest @ ..] if cmd == "adjust" && rest.len() <= 1 => {
            let delta: i64 = delta.parse().map_err(|_| {
                SettlementError::Config(format!("delta must be an integer, got: {delta}"))
            })?;
            let note = rest.first().map(String::as_str);
            print_json(&engine.adjust_stock(batch_id, delta, note).await?)
        }
        [cmd] if cmd == "medicines" => print_json(&engine.active_medicines().await?),
        [cmd, medicine_id] if cmd == "stock" => {
            print_json(&engine.stock_level(medicine_id).await?)
        }
        _ => Err(SettlementError::Config(format!(
            "unrecognised command: {}\n\n{USAGE}",
            command.join(" ")
        ))),
    };

    engine.database().close().await;
    result
}

/// Reads a JSON document from a file, or from stdin when `source` is `-`.
fn read_json<T: serde::de::DeserializeOwned>(source: &str) -> Result<T, SettlementError> {
    let contents = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };

    serde_json::from_str(&contents)
        .map_err(|e| SettlementError::Config(format!("invalid request in {source}: {e}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SettlementError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SettlementError::Config(format!("failed to encode result: {e}")))?;
    println!("{json}");
    Ok(())
}
