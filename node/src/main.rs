//! # Notary Ledger Node
//!
//! Entry point for the `notary-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the ledger, and serves the HTTP
//! API.
//!
//! Subcommands:
//!
//! - `run`          - serve the API, the metrics endpoint and the admission sweeper
//! - `verify-chain` - validate a data directory offline
//! - `sign`         - sign a challenge with a WIF key, offline
//! - `keygen`       - generate a wallet key
//! - `version`      - print build version information

mod api;
mod cli;
mod error;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use notary_protocol::admission::{AdmissionConfig, AdmissionController};
use notary_protocol::config::{unix_now, ADMISSION_SWEEP_INTERVAL, PROTOCOL_VERSION};
use notary_protocol::crypto::keys::{Network, WalletKey};
use notary_protocol::crypto::message::sign_message;
use notary_protocol::storage::{ChainEngine, ChainStore};

use cli::{Commands, NotaryNodeCli};
use logging::{LogFormat, DEFAULT_DIRECTIVES};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NotaryNodeCli::parse();
    logging::init_logging(DEFAULT_DIRECTIVES, LogFormat::from_str_lossy(&cli.log_format))
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::VerifyChain(args) => verify_chain(args),
        Commands::Sign(args) => sign(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the sled database under `data_dir`, creating the directory first.
fn open_store(data_dir: &Path) -> Result<ChainStore> {
    let db_path = data_dir.join("chain");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let store = ChainStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), records = store.count(), "database opened");
    Ok(store)
}

/// Starts the node: API server, metrics endpoint, and admission sweeper.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    tracing::info!(
        http_port = args.http_port,
        metrics_port = args.metrics_port,
        validation_window = args.validation_window,
        data_dir = %args.data_dir.display(),
        "starting notary-node"
    );

    // --- Ledger ---
    let engine = Arc::new(
        ChainEngine::open(open_store(&args.data_dir)?).context("failed to initialize genesis")?,
    );

    // --- Admission ---
    let admission = Arc::new(AdmissionController::new(AdmissionConfig {
        window_secs: args.validation_window,
        ..AdmissionConfig::default()
    }));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.chain_height.set(engine.height() as i64);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        engine,
        admission,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state.clone());
    let api_addr = format!("0.0.0.0:{}", args.http_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", api_addr))?;
    tracing::info!("HTTP API listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Admission sweeper ---
    let sweep_state = app_state.clone();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(ADMISSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = api::sweep_expired_admissions(&sweep_state, unix_now());
            if removed > 0 {
                tracing::debug!(removed, "expired admissions swept");
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweeper.abort();
    app_state
        .engine
        .store()
        .flush()
        .context("failed to flush database on shutdown")?;
    tracing::info!("notary-node stopped");
    Ok(())
}

/// Validates every record in the data directory and prints the report.
///
/// Exits non-zero when the chain is invalid so it can gate scripts.
fn verify_chain(args: cli::VerifyChainArgs) -> Result<()> {
    let engine = ChainEngine::new(open_store(&args.data_dir)?);
    let report = engine.validate_chain().context("failed to read chain")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.valid {
        Ok(())
    } else {
        anyhow::bail!(
            "chain invalid at height {}",
            report
                .first_bad_height
                .map(|h| h.to_string())
                .unwrap_or_else(|| "?".into())
        )
    }
}

/// Signs a message with a WIF key and prints the base64 signature.
fn sign(args: cli::SignArgs) -> Result<()> {
    let key = WalletKey::from_wif(&args.wif).context("invalid WIF private key")?;
    tracing::debug!(address = %key.address(), "signing message");
    println!("{}", sign_message(&key, &args.message));
    Ok(())
}

/// Generates a wallet key and prints its address and WIF.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let network = if args.testnet {
        Network::Testnet
    } else {
        Network::Mainnet
    };
    let key = WalletKey::generate(network);

    println!("address : {}", key.address());
    println!("wif     : {}", key.to_wif());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("notary-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
