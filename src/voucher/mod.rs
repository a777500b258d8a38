//! Debit voucher encoding and signature binding.
//!
//! A voucher is a single-use, payer-signed authorization to move a specific
//! amount of collateral to a provider. This module implements:
//! 1. The canonical EIP-712 typed-data encoding of a voucher
//! 2. Domain-separated sign/recover bound to one settlement instance
//! 3. An LRU cache of recovered signers (recovery is the admission hot path)
//!
//! # Flow
//!
//! ```text
//! voucher + instance domain
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ EIP-712 signing hash│
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!  sign         recover
//!    │             │
//!    ▼             ▼
//! signature    signer address ──ne payer──▶ BadSignature
//! ```
//!
//! The domain carries the settlement instance's chain id and address, so a
//! signature produced for one deployed instance is meaningless for another
//! even when the voucher fields are byte-identical.

mod cache;
mod codec;

pub use cache::{RecoveredCache, RecoveredCacheStats};
pub use codec::{
    recover_payer, settlement_domain, sign_debit, signing_hash, verify_debit, Debit,
    PROTOCOL_NAME, PROTOCOL_VERSION,
};
