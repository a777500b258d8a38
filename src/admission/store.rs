//! The pending-liability ledger: IOU records keyed by signing hash.

use crate::voucher::Debit;
use alloy_primitives::{Address, Signature, B256, U256};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Status of an issued-but-not-necessarily-settled voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IouStatus {
    /// Issued, counted against the payer's budget.
    Pending,
    /// Landed on the ledger; liability released.
    Settled,
    /// Deadline passed unsettled; liability released, never resubmitted.
    Expired,
    /// Refused by an operator decision; liability released.
    Rejected,
}

/// One recorded voucher with its signature and lifecycle status.
#[derive(Debug, Clone)]
pub struct Iou {
    /// The signed voucher.
    pub debit: Debit,
    /// The payer's signature over the voucher.
    pub signature: Signature,
    /// Lifecycle status.
    pub status: IouStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// In-memory IOU store.
///
/// Keyed by the voucher's EIP-712 signing hash, which is unique per voucher
/// content and settlement instance — the same key the relayer dedups on.
/// All mutation goes through one lock; the budget check in the admission
/// gate and the pending insert happen under a single acquisition.
#[derive(Default)]
pub struct IouStore {
    inner: Mutex<HashMap<B256, Iou>>,
}

impl IouStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: &B256) -> Option<Iou> {
        self.inner.lock().get(id).cloned()
    }

    /// Sum of pending voucher amounts for a payer.
    #[must_use]
    pub fn pending_sum(&self, payer: Address) -> U256 {
        self.inner
            .lock()
            .values()
            .filter(|iou| iou.status == IouStatus::Pending && iou.debit.payer == payer)
            .fold(U256::ZERO, |acc, iou| acc + iou.debit.amount)
    }

    /// Pending records addressed to a provider, ordered by (payer, nonce) so
    /// a batch submits each pair's nonces in sequence.
    #[must_use]
    pub fn pending_for_provider(&self, provider: Address) -> Vec<(B256, Iou)> {
        let mut pending: Vec<(B256, Iou)> = self
            .inner
            .lock()
            .iter()
            .filter(|(_, iou)| {
                iou.status == IouStatus::Pending && iou.debit.provider == provider
            })
            .map(|(id, iou)| (*id, iou.clone()))
            .collect();
        pending.sort_by(|(_, a), (_, b)| {
            (a.debit.payer, a.debit.nonce).cmp(&(b.debit.payer, b.debit.nonce))
        });
        pending
    }

    /// Number of pending records for a (payer, provider) pair. Added to the
    /// ledger's next nonce, this is the next issuable nonce for the pair.
    #[must_use]
    pub fn pending_count_for_pair(&self, payer: Address, provider: Address) -> u64 {
        self.inner
            .lock()
            .values()
            .filter(|iou| {
                iou.status == IouStatus::Pending
                    && iou.debit.payer == payer
                    && iou.debit.provider == provider
            })
            .count() as u64
    }

    /// Flip records to `Settled` after a batch lands.
    pub fn mark_settled(&self, ids: &[B256]) {
        let mut inner = self.inner.lock();
        for id in ids {
            if let Some(iou) = inner.get_mut(id) {
                iou.status = IouStatus::Settled;
            }
        }
        debug!(count = ids.len(), "ious settled");
    }

    /// Flip a record to `Rejected`, releasing its liability.
    pub fn mark_rejected(&self, id: &B256) {
        if let Some(iou) = self.inner.lock().get_mut(id) {
            iou.status = IouStatus::Rejected;
        }
    }

    /// Flip every pending record whose deadline has passed to `Expired`.
    /// Returns the expired ids. A record never stays pending forever.
    pub fn expire_due(&self, now: u64) -> Vec<B256> {
        let mut expired = Vec::new();
        let mut inner = self.inner.lock();
        for (id, iou) in inner.iter_mut() {
            if iou.status == IouStatus::Pending && now > iou.debit.deadline {
                iou.status = IouStatus::Expired;
                expired.push(*id);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "ious expired");
        }
        expired
    }

    /// Number of records in any status.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Run `f` with the store locked. The admission gate uses this to make
    /// the budget check and the pending insert one atomic step.
    pub(crate) fn with_locked<R>(&self, f: impl FnOnce(&mut HashMap<B256, Iou>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
