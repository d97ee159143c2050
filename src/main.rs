//! uzh-wallet command line
//!
//! ```text
//! config ──▶ detect_provider ──▶ WalletConnector ──▶ connect / session
//!                                       │
//!                                       └──▶ TransferExecutor ──▶ eth_sendTransaction
//! ```

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use uzh_wallet::config::load_or_default;
use uzh_wallet::observability::{logging, metrics};
use uzh_wallet::{
    detect_provider, ConnectionState, TransferExecutor, TransferRequest, TransferResult,
    TransferSettings, WalletConfig, WalletConnector,
};

#[derive(Parser)]
#[command(name = "uzh-wallet")]
#[command(about = "Connect a wallet to the UZH network and send tokens", long_about = None)]
struct Cli {
    /// Path to a TOML config file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the target network and whether a wallet is available
    Status,
    /// Connect the wallet and print the connection state
    Connect,
    /// Connect, then transfer tokens to an address or username
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Follow wallet account and network changes until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        chain_id = %config.network.chain_id,
        contract = %config.token.contract_address,
        "uzh-wallet v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let connector = WalletConnector::new(detect_provider(&config), config.network.clone());

    match cli.command {
        Commands::Status => {
            print_json(&json!({
                "network": {
                    "chain_id": config.network.chain_id,
                    "chain_name": config.network.chain_name,
                    "rpc_urls": config.network.rpc_urls,
                },
                "token": {
                    "contract": config.token.contract_address,
                    "authorized_sender": config.token.authorized_sender,
                    "recipients": config.token.recipients.keys().collect::<Vec<_>>(),
                },
                "wallet_detected": connector.has_provider(),
                "state": connector.state(),
            }))?;
        }
        Commands::Connect => {
            let state = connect(&connector).await;
            print_json(&serde_json::to_value(&state)?)?;
        }
        Commands::Send { to, amount, message } => {
            let state = connect(&connector).await;
            let executor = TransferExecutor::new(connector.clone(), TransferSettings::from(&config.token));

            let mut request = TransferRequest::new(to, amount);
            if let Some(message) = message {
                request = request.with_message(message);
            }

            let result = executor.submit(request, &state).await;
            print_json(&describe(&result, &config))?;
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Watch => watch(&connector).await?,
    }

    Ok(())
}

async fn connect(connector: &WalletConnector) -> ConnectionState {
    match connector.connect().await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {}", e);
            connector.state()
        }
    }
}

async fn watch(connector: &WalletConnector) -> Result<(), Box<dyn std::error::Error>> {
    let session = connector.open_session()?;
    let mut states = connector.subscribe();
    print_json(&serde_json::to_value(session.state())?)?;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_json(&serde_json::to_value(&state)?)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    session.close();
    Ok(())
}

fn describe(result: &TransferResult, config: &WalletConfig) -> Value {
    match result {
        TransferResult::Submitted { request_id, receipt } => {
            let status = if receipt.confirmed { "confirmed" } else { "unconfirmed" };
            json!({
                "request_id": request_id,
                "status": status,
                "message": result.success_message(&config.network.native_currency.symbol),
                "receipt": receipt,
            })
        }
        TransferResult::Failed { request_id, error } => json!({
            "request_id": request_id,
            "status": "failed",
            "error": error.kind(),
            "reason": error.to_string(),
        }),
    }
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
