//! Node event system.

use alloy_primitives::{Address, B256, U256};
use tokio::sync::broadcast;

/// Events emitted by the node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node has started successfully.
    Started,

    /// Node is shutting down.
    ShuttingDown,

    /// A voucher passed admission and was recorded as pending.
    VoucherAdmitted {
        /// IOU id (the voucher's signing hash).
        id: B256,
        /// Payer address.
        payer: Address,
        /// Provider address.
        provider: Address,
        /// Voucher amount.
        amount: U256,
    },

    /// A settlement batch landed on the ledger.
    BatchSettled {
        /// Provider the batch was claimed for.
        provider: Address,
        /// Transaction id.
        tx_id: B256,
        /// Number of vouchers in the batch.
        count: usize,
    },

    /// Pending vouchers passed their deadline and were released.
    VoucherExpired {
        /// Number of records expired.
        count: usize,
    },

    /// A payer's epoch was bumped, revoking all outstanding vouchers signed
    /// under the prior epoch.
    EpochBumped {
        /// Payer whose epoch was bumped.
        payer: Address,
        /// The new epoch.
        epoch: u64,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving node events.
pub type NodeEventsChannel = broadcast::Receiver<NodeEvent>;

/// Sender for node events.
pub type NodeEventsSender = broadcast::Sender<NodeEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (NodeEventsSender, NodeEventsChannel) {
    broadcast::channel(256)
}
