//! Command-line interface definition.

use alloy_primitives::Address;
use clap::Parser;
use mcpay_node::config::NodeConfig;
use std::path::PathBuf;

/// Admission-control and settlement node for signed pay-per-call vouchers.
#[derive(Parser, Debug)]
#[command(name = "mcpay-node")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory for node data.
    #[arg(long, env = "MCPAY_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    /// Chain id of the ledger of record.
    #[arg(long, env = "MCPAY_CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Address of the settlement instance.
    #[arg(long, env = "MCPAY_SETTLEMENT_ADDRESS")]
    pub settlement_address: Option<Address>,

    /// Allowed settlement tokens (repeatable).
    #[arg(long = "allow-token", env = "MCPAY_ALLOWED_TOKENS", value_delimiter = ',')]
    pub allowed_tokens: Vec<Address>,

    /// Per-voucher amount limit, in the token's smallest unit.
    #[arg(long, env = "MCPAY_PER_CALL_LIMIT")]
    pub per_call_limit: Option<u64>,

    /// Exit cooling period in seconds.
    #[arg(long, env = "MCPAY_COOLING_PERIOD")]
    pub cooling_period: Option<u64>,

    /// Voucher deadline horizon in seconds.
    #[arg(long, env = "MCPAY_VOUCHER_TTL")]
    pub voucher_ttl: Option<u64>,

    /// Maximum vouchers per settlement batch.
    #[arg(long, env = "MCPAY_MAX_BATCH")]
    pub max_batch: Option<usize>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Convert CLI arguments into a NodeConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<NodeConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            NodeConfig::from_file(path)?
        } else {
            NodeConfig::default()
        };

        // Override with CLI arguments
        if let Some(root_dir) = self.root_dir {
            config.root_dir = root_dir;
        }
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(address) = self.settlement_address {
            config.settlement_address = address;
        }
        if !self.allowed_tokens.is_empty() {
            config.allowed_tokens = self.allowed_tokens;
        }
        if let Some(limit) = self.per_call_limit {
            config.per_call_limit = limit;
        }
        if let Some(secs) = self.cooling_period {
            config.escrow.cooling_period_secs = secs;
        }
        if let Some(secs) = self.voucher_ttl {
            config.admission.voucher_ttl_secs = secs;
        }
        if let Some(max) = self.max_batch {
            config.relayer.max_batch = max;
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}
