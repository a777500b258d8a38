//! Configuration for mcpay-node.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Root directory for node data.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Chain id of the ledger of record.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Address of the settlement instance. Part of the signing domain, so
    /// vouchers for one instance are inert on every other.
    #[serde(default)]
    pub settlement_address: Address,

    /// Tokens vouchers may be denominated in.
    #[serde(default)]
    pub allowed_tokens: Vec<Address>,

    /// Maximum amount for any single voucher, in the token's smallest unit.
    #[serde(default = "default_per_call_limit")]
    pub per_call_limit: u64,

    /// Escrow configuration.
    #[serde(default)]
    pub escrow: EscrowConfig,

    /// Admission configuration.
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Relayer configuration.
    #[serde(default)]
    pub relayer: RelayerConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Escrow policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Seconds between an exit request and the exit deadline.
    #[serde(default = "default_cooling_period")]
    pub cooling_period_secs: u64,

    /// Allow withdrawal without a prior exit request.
    #[serde(default)]
    pub allow_instant_withdraw: bool,
}

/// Admission policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Deadline horizon for newly assigned vouchers, in seconds.
    #[serde(default = "default_voucher_ttl")]
    pub voucher_ttl_secs: u64,

    /// Interval between expiry sweeps of the pending-liability store.
    #[serde(default = "default_expiry_sweep")]
    pub expiry_sweep_secs: u64,
}

/// Relayer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// Maximum vouchers per settlement batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            chain_id: default_chain_id(),
            settlement_address: Address::ZERO,
            allowed_tokens: Vec::new(),
            per_call_limit: default_per_call_limit(),
            escrow: EscrowConfig::default(),
            admission: AdmissionConfig::default(),
            relayer: RelayerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            cooling_period_secs: default_cooling_period(),
            allow_instant_withdraw: false,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            voucher_ttl_secs: default_voucher_ttl(),
            expiry_sweep_secs: default_expiry_sweep(),
        }
    }
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "mcpay")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mcpay"))
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_chain_id() -> u64 {
    31_337 // local devnet
}

const fn default_per_call_limit() -> u64 {
    50_000000 // 50 units at 6 decimals
}

const fn default_cooling_period() -> u64 {
    7 * 24 * 60 * 60
}

const fn default_voucher_ttl() -> u64 {
    30 * 60
}

const fn default_expiry_sweep() -> u64 {
    60
}

const fn default_max_batch() -> usize {
    50
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
