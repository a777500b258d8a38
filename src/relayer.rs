//! Relayer: collects pending IOUs per provider and submits settlement batches.
//!
//! A claim is all-or-nothing because the batch transition is: on success
//! every included record flips to settled; on failure every record stays
//! pending and the error is reported, never silently retried with the same
//! set. Retries after success are naturally idempotent — settled records are
//! no longer pending, so a repeated claim finds nothing to submit.

use crate::admission::IouStore;
use crate::error::Result;
use crate::ledger::ChainHandle;
use crate::voucher::Debit;
use alloy_primitives::{Address, Signature, B256};
use std::sync::Arc;
use tracing::{info, warn};

/// Default cap on vouchers per submitted batch.
pub const DEFAULT_MAX_BATCH: usize = 50;

/// Outcome of a successful claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Transaction id of the settlement batch.
    pub tx_id: B256,
    /// Number of vouchers settled.
    pub count: usize,
}

/// Submits pending vouchers to the settlement instance on behalf of providers.
pub struct Relayer {
    chain: ChainHandle,
    store: Arc<IouStore>,
    max_batch: usize,
}

impl Relayer {
    /// Create a relayer over a settlement instance and an IOU store.
    #[must_use]
    pub fn new(chain: ChainHandle, store: Arc<IouStore>, max_batch: usize) -> Self {
        Self {
            chain,
            store,
            max_batch,
        }
    }

    /// Settle all pending vouchers addressed to `provider`, up to the batch
    /// cap, as one atomic batch. Returns `None` when nothing is pending.
    ///
    /// Due expiries are swept first so a voucher whose deadline has passed
    /// is never resubmitted.
    ///
    /// # Errors
    ///
    /// The sequencer's batch error. All included records stay pending; the
    /// caller must not resubmit the same set without resolving the cause.
    pub fn claim_for_provider(&self, provider: Address) -> Result<Option<SubmissionReceipt>> {
        let now = self.chain.with(|c| c.sync_to_wall_clock());
        let expired = self.store.expire_due(now);
        if !expired.is_empty() {
            info!(count = expired.len(), "expired vouchers dropped before claim");
        }

        let pending = self.store.pending_for_provider(provider);
        if pending.is_empty() {
            return Ok(None);
        }

        let batch: Vec<_> = pending.into_iter().take(self.max_batch).collect();
        let ids: Vec<B256> = batch.iter().map(|(id, _)| *id).collect();
        let debits: Vec<Debit> = batch.iter().map(|(_, iou)| iou.debit.clone()).collect();
        let signatures: Vec<Signature> = batch.iter().map(|(_, iou)| iou.signature).collect();

        match self.chain.submit_batch(&debits, &signatures) {
            Ok(tx_id) => {
                self.store.mark_settled(&ids);
                info!(%provider, %tx_id, count = ids.len(), "claim settled");
                Ok(Some(SubmissionReceipt {
                    tx_id,
                    count: ids.len(),
                }))
            }
            Err(e) => {
                warn!(%provider, count = ids.len(), error = %e, "claim rejected");
                Err(e)
            }
        }
    }
}
