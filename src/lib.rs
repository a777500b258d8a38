//! # mcpay-node
//!
//! Pay-per-use authorization and settlement for metered services.
//!
//! Payers lock collateral in an escrowed settlement instance, then authorize
//! individual service calls by signing EIP-712 debit vouchers off-ledger.
//! The node admits each voucher against the payer's live budget (collateral
//! minus already-pending vouchers), records it as a pending IOU, and a
//! relayer later claims pending vouchers in atomic settlement batches.
//!
//! ## Architecture
//!
//! - [`voucher`] — the EIP-712 `Debit` struct, signing, and recovery
//! - [`ledger`] — the settlement instance: escrow, sequencer, atomic batches
//! - [`admission`] — off-ledger gate tracking pending liabilities
//! - [`registry`] / [`pricing`] — service descriptors and deterministic quotes
//! - [`relayer`] — collects pending IOUs and submits settlement batches
//! - [`node`] — wires the above behind a config and an event stream
//!
//! ## Example
//!
//! ```rust,no_run
//! use mcpay_node::{NodeBuilder, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let mut node = NodeBuilder::new(config).build()?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admission;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod node;
pub mod pricing;
pub mod registry;
pub mod relayer;
pub mod transport;
pub mod voucher;

pub use admission::{AdmissionControl, Iou, IouStatus, IouStore, VoucherTerms};
pub use client::PayerClient;
pub use config::{AdmissionConfig, EscrowConfig, NodeConfig, RelayerConfig};
pub use error::{Error, Result};
pub use event::{NodeEvent, NodeEventsChannel};
pub use ledger::{AccountState, Chain, ChainHandle, EscrowParams, LedgerView, Sequencer};
pub use node::{NodeBuilder, RunningNode};
pub use pricing::{PerUnitPricing, PricingOracle, PricingUnit};
pub use registry::{service_id, Provider, Registry, Service};
pub use relayer::{Relayer, SubmissionReceipt, DEFAULT_MAX_BATCH};
pub use transport::{CallRequest, CallResponse, EchoTransport, ProviderTransport};
pub use voucher::{
    recover_payer, settlement_domain, sign_debit, signing_hash, verify_debit, Debit,
    RecoveredCache, PROTOCOL_NAME, PROTOCOL_VERSION,
};
