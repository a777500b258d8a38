//! Error types for mcpay-node.

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mcpay-node.
///
/// The first ten variants are the protocol error kinds. Ledger-level kinds
/// (`BadSignature`, `BadNonce`, `EpochMismatch`, `Expired`, `TokenNotAllowed`,
/// `LimitExceeded`, `InsufficientBalance`, `PastExitDeadline`) abort a
/// settlement batch atomically. Admission-level kinds (`BudgetExceeded`,
/// `PricingMismatch`, and stale nonce/epoch reported as `BadNonce`/
/// `EpochMismatch`) are recoverable by re-quoting and re-signing.
#[derive(Error, Debug)]
pub enum Error {
    /// Signature recovery failed or the recovered signer is not the payer.
    #[error("bad signature")]
    BadSignature,

    /// Voucher nonce does not match the next expected nonce for the pair.
    #[error("bad nonce: expected {expected}, got {got}")]
    BadNonce {
        /// Next expected nonce for the (payer, provider) pair.
        expected: U256,
        /// Nonce carried by the voucher.
        got: U256,
    },

    /// Voucher epoch does not match the payer's current epoch.
    #[error("epoch mismatch: expected {expected}, got {got}")]
    EpochMismatch {
        /// Payer's current epoch.
        expected: u64,
        /// Epoch carried by the voucher.
        got: u64,
    },

    /// Voucher deadline has passed.
    #[error("voucher expired: deadline {deadline}, now {now}")]
    Expired {
        /// Deadline carried by the voucher.
        deadline: u64,
        /// Ledger timestamp at evaluation.
        now: u64,
    },

    /// Voucher token is not on the allow-list.
    #[error("token not allowed: {0}")]
    TokenNotAllowed(Address),

    /// Voucher amount exceeds the per-call limit.
    #[error("per-call limit exceeded: amount {amount}, limit {limit}")]
    LimitExceeded {
        /// Amount carried by the voucher.
        amount: U256,
        /// Configured per-call limit.
        limit: U256,
    },

    /// Payer's collateral balance cannot cover the operation.
    #[error("insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance {
        /// Amount the operation requires.
        needed: U256,
        /// Payer's current balance.
        available: U256,
    },

    /// Payer's exit window has elapsed; settlement is blocked.
    #[error("past exit deadline: deadline {deadline}, now {now}")]
    PastExitDeadline {
        /// Exit deadline for the account.
        deadline: u64,
        /// Ledger timestamp at evaluation.
        now: u64,
    },

    /// Admitting this voucher would overcommit the payer's collateral.
    #[error("budget exceeded: pending {pending} + amount {amount} > balance {balance}")]
    BudgetExceeded {
        /// Sum of the payer's pending voucher amounts.
        pending: U256,
        /// Amount of the voucher being admitted.
        amount: U256,
        /// Payer's collateral balance.
        balance: U256,
    },

    /// Voucher amount does not equal the quoted price.
    #[error("pricing mismatch: expected {expected}, got {got}")]
    PricingMismatch {
        /// Amount the pricing oracle quoted.
        expected: U256,
        /// Amount carried by the voucher.
        got: U256,
    },

    /// Account is paused by the administrative circuit breaker.
    #[error("account paused: {0}")]
    Paused(Address),

    /// Withdrawal attempted before the exit window elapsed (or without an
    /// exit request when policy requires one).
    #[error("withdrawal locked: exit deadline {deadline:?}, now {now}")]
    WithdrawalLocked {
        /// Exit deadline, if an exit was requested.
        deadline: Option<u64>,
        /// Ledger timestamp at evaluation.
        now: u64,
    },

    /// Batch input is structurally invalid (e.g. voucher/signature count mismatch).
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    /// No service registered under this identifier.
    #[error("unknown service: {0}")]
    UnknownService(B256),

    /// Caller failed provider authentication.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
