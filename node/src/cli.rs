//! # CLI Interface
//!
//! Defines the command-line argument structure for `notary-node` using
//! `clap` derive. Subcommands: `run`, `verify-chain`, `sign`, `keygen`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notary_protocol::config::{DEFAULT_HTTP_PORT, DEFAULT_METRICS_PORT, VALIDATION_WINDOW_SECS};

/// Notary ledger node.
///
/// Serves a hash-chained star registry over HTTP. Appends are gated by a
/// Bitcoin signed-message challenge that must be answered within a fixed
/// window.
#[derive(Parser, Debug)]
#[command(
    name = "notary-node",
    about = "Hash-chained notary ledger node",
    version,
    propagate_version = true
)]
pub struct NotaryNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "NOTARY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API and metrics servers.
    Run(RunArgs),
    /// Validate every record in a data directory and print the report.
    VerifyChain(VerifyChainArgs),
    /// Sign a challenge message with a WIF private key, offline.
    Sign(SignArgs),
    /// Generate a fresh wallet key and print its address and WIF.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the ledger database. Created on first run.
    #[arg(long, short = 'd', env = "NOTARY_DATA_DIR", default_value = "./notary-data")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[arg(long, env = "NOTARY_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "NOTARY_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Seconds an identity has to sign its challenge and then append.
    #[arg(long, env = "NOTARY_VALIDATION_WINDOW", default_value_t = VALIDATION_WINDOW_SECS)]
    pub validation_window: u64,
}

/// Arguments for the `verify-chain` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyChainArgs {
    /// Directory holding the ledger database.
    #[arg(long, short = 'd', env = "NOTARY_DATA_DIR", default_value = "./notary-data")]
    pub data_dir: PathBuf,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Private key in Wallet Import Format.
    ///
    /// Prefer the environment variable over the flag so the key stays out
    /// of shell history.
    #[arg(long, env = "NOTARY_WIF", hide_env_values = true)]
    pub wif: String,

    /// Message to sign, usually the challenge returned by `/requestValidation`.
    pub message: String,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Generate a testnet key instead of a mainnet one.
    #[arg(long)]
    pub testnet: bool,
}
