//! The settlement instance: escrow + sequencer behind one lock.
//!
//! `Chain` owns the authoritative state and the instance identity (chain id
//! and on-ledger address) the EIP-712 domain binds to. `settle_batch` is the
//! single atomic transition: it validates and applies every voucher against
//! staged copies of the escrow and sequencer state, and commits only if the
//! whole batch passes.

use crate::error::{Error, Result};
use crate::ledger::escrow::{AccountState, Escrow, EscrowParams};
use crate::ledger::settlement::Sequencer;
use crate::voucher::{settlement_domain, signing_hash, verify_debit, Debit};
use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// One deployed settlement instance.
#[derive(Debug)]
pub struct Chain {
    escrow: Escrow,
    sequencer: Sequencer,
    chain_id: u64,
    address: Address,
    now: u64,
    height: u64,
}

impl Chain {
    /// Create a new instance at the current wall-clock time.
    #[must_use]
    pub fn new(
        chain_id: u64,
        address: Address,
        escrow_params: EscrowParams,
        per_call_limit: U256,
    ) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            escrow: Escrow::new(escrow_params),
            sequencer: Sequencer::new(per_call_limit),
            chain_id,
            address,
            now,
            height: 0,
        }
    }

    /// The EIP-712 domain of this instance.
    #[must_use]
    pub fn domain(&self) -> alloy_sol_types::Eip712Domain {
        settlement_domain(self.chain_id, self.address)
    }

    /// Current ledger timestamp (seconds).
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.now
    }

    /// Set the ledger timestamp. Time never moves backwards.
    pub fn set_timestamp(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    /// Advance the ledger timestamp by `secs`.
    pub fn advance_time(&mut self, secs: u64) {
        self.now += secs;
    }

    /// Advance the ledger timestamp to the host's wall clock and return it.
    /// A timestamp already set ahead (tests) is preserved.
    pub fn sync_to_wall_clock(&mut self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.now = self.now.max(wall);
        self.now
    }

    /// Escrow: deposit collateral.
    ///
    /// # Errors
    ///
    /// See [`Escrow::deposit`].
    pub fn deposit(&mut self, payer: Address, amount: U256) -> Result<()> {
        self.escrow.deposit(payer, amount)
    }

    /// Escrow: start (or restart) the payer's exit window.
    pub fn request_exit(&mut self, payer: Address) -> u64 {
        self.escrow.request_exit(payer, self.now)
    }

    /// Escrow: withdraw after the exit window.
    ///
    /// # Errors
    ///
    /// See [`Escrow::withdraw`].
    pub fn withdraw(&mut self, payer: Address, amount: U256) -> Result<()> {
        self.escrow.withdraw(payer, amount, self.now)
    }

    /// Escrow: pause a payer (blocks deposit and debit).
    pub fn pause(&mut self, payer: Address) {
        self.escrow.pause(payer);
    }

    /// Escrow: unpause a payer.
    pub fn unpause(&mut self, payer: Address) {
        self.escrow.unpause(payer);
    }

    /// Sequencer admin: allow or disallow a settlement token.
    pub fn set_token_allowed(&mut self, token: Address, allowed: bool) {
        self.sequencer.set_token_allowed(token, allowed);
    }

    /// Read: whether a token is on the allowlist.
    #[must_use]
    pub fn token_allowed(&self, token: Address) -> bool {
        self.sequencer.token_allowed(token)
    }

    /// Sequencer admin: set the global per-voucher amount limit.
    pub fn set_per_call_limit(&mut self, limit: U256) {
        self.sequencer.set_per_call_limit(limit);
    }

    /// Sequencer admin: bump a payer's epoch, revoking all outstanding
    /// vouchers signed under the prior epoch. Returns the new epoch.
    pub fn bump_epoch(&mut self, payer: Address) -> u64 {
        self.sequencer.bump_epoch(payer)
    }

    /// Read: next expected nonce for a pair.
    #[must_use]
    pub fn next_nonce(&self, payer: Address, provider: Address) -> U256 {
        self.sequencer.next_nonce(payer, provider)
    }

    /// Read: payer's current epoch.
    #[must_use]
    pub fn epoch(&self, payer: Address) -> u64 {
        self.sequencer.epoch(payer)
    }

    /// Read: payer's collateral balance.
    #[must_use]
    pub fn balance(&self, payer: Address) -> U256 {
        self.escrow.balance(payer)
    }

    /// Read: total credited to a provider.
    #[must_use]
    pub fn provider_balance(&self, provider: Address) -> U256 {
        self.sequencer.provider_balance(provider)
    }

    /// Read: payer's exit deadline, if any.
    #[must_use]
    pub fn exit_deadline(&self, payer: Address) -> Option<u64> {
        self.escrow.exit_deadline(payer)
    }

    /// Read: whether the payer is paused.
    #[must_use]
    pub fn paused(&self, payer: Address) -> bool {
        self.escrow.paused(payer)
    }

    /// Read: payer's account state at the ledger's current time.
    #[must_use]
    pub fn account_state(&self, payer: Address) -> AccountState {
        self.escrow.state(payer, self.now)
    }

    /// Settle a batch of vouchers as one atomic transition.
    ///
    /// Per-voucher validation order (short-circuit on first failure):
    /// token allow-list, per-call limit, deadline, signature, nonce, epoch,
    /// collateral debit. If any voucher fails, no state changes — not the
    /// escrow, not the nonce counters, not provider credits.
    ///
    /// Returns a synthetic transaction id derived from the new height and
    /// the batch's signing hashes.
    ///
    /// # Errors
    ///
    /// The first failing voucher's error, or [`Error::MalformedBatch`] if
    /// `debits` and `signatures` differ in length.
    pub fn settle_batch(&mut self, debits: &[Debit], signatures: &[Signature]) -> Result<B256> {
        if debits.len() != signatures.len() {
            return Err(Error::MalformedBatch(format!(
                "{} vouchers, {} signatures",
                debits.len(),
                signatures.len()
            )));
        }

        let domain = self.domain();
        let now = self.now;

        // Stage the whole transition; commit only if every voucher passes.
        let mut escrow = self.escrow.clone();
        let mut sequencer = self.sequencer.clone();
        let mut hashes = Vec::with_capacity(debits.len());

        for (debit, signature) in debits.iter().zip(signatures) {
            if let Err(e) = Self::settle_one(&mut escrow, &mut sequencer, &domain, now, debit, signature) {
                warn!(
                    payer = %debit.payer,
                    provider = %debit.provider,
                    nonce = %debit.nonce,
                    error = %e,
                    "batch rejected"
                );
                return Err(e);
            }
            hashes.push(signing_hash(debit, &domain));
        }

        self.escrow = escrow;
        self.sequencer = sequencer;
        self.height += 1;

        let mut preimage = self.height.to_be_bytes().to_vec();
        for hash in &hashes {
            preimage.extend_from_slice(hash.as_slice());
        }
        let tx_id = keccak256(&preimage);
        info!(count = debits.len(), %tx_id, "batch settled");
        Ok(tx_id)
    }

    fn settle_one(
        escrow: &mut Escrow,
        sequencer: &mut Sequencer,
        domain: &alloy_sol_types::Eip712Domain,
        now: u64,
        debit: &Debit,
        signature: &Signature,
    ) -> Result<()> {
        sequencer.check_policy(debit, now)?;
        verify_debit(debit, domain, signature)?;
        sequencer.apply(debit)?;
        escrow.debit(debit.payer, debit.amount, now)
    }
}

/// Shared handle to a settlement instance.
///
/// All access goes through one lock, so batch transitions never interleave.
#[derive(Clone)]
pub struct ChainHandle {
    inner: Arc<Mutex<Chain>>,
}

impl ChainHandle {
    /// Wrap a chain in a shared handle.
    #[must_use]
    pub fn new(chain: Chain) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    /// Run a closure with exclusive access to the chain.
    pub fn with<R>(&self, f: impl FnOnce(&mut Chain) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Submit a settlement batch.
    ///
    /// # Errors
    ///
    /// See [`Chain::settle_batch`].
    pub fn submit_batch(&self, debits: &[Debit], signatures: &[Signature]) -> Result<B256> {
        self.inner.lock().settle_batch(debits, signatures)
    }

    /// The instance's EIP-712 domain.
    #[must_use]
    pub fn domain(&self) -> alloy_sol_types::Eip712Domain {
        self.inner.lock().domain()
    }
}

/// Fresh, read-only view of ledger state, as seen by the admission layer.
///
/// Reads are current at the time of the call but may be stale by the time a
/// batch is submitted; the sequencer re-validates everything.
pub trait LedgerView: Send + Sync {
    /// Next expected nonce for a (payer, provider) pair.
    fn next_nonce(&self, payer: Address, provider: Address) -> U256;
    /// Payer's current epoch.
    fn epoch(&self, payer: Address) -> u64;
    /// Payer's collateral balance.
    fn balance(&self, payer: Address) -> U256;
    /// Payer's exit deadline, if an exit was requested.
    fn exit_deadline(&self, payer: Address) -> Option<u64>;
    /// Whether the payer is paused.
    fn paused(&self, payer: Address) -> bool;
    /// Current ledger timestamp (seconds).
    fn timestamp(&self) -> u64;
}

impl LedgerView for ChainHandle {
    fn next_nonce(&self, payer: Address, provider: Address) -> U256 {
        self.inner.lock().next_nonce(payer, provider)
    }

    fn epoch(&self, payer: Address) -> u64 {
        self.inner.lock().epoch(payer)
    }

    fn balance(&self, payer: Address) -> U256 {
        self.inner.lock().balance(payer)
    }

    fn exit_deadline(&self, payer: Address) -> Option<u64> {
        self.inner.lock().exit_deadline(payer)
    }

    fn paused(&self, payer: Address) -> bool {
        self.inner.lock().paused(payer)
    }

    // Reads through the handle come from live services, so the clock is
    // first advanced to wall time; explicit test offsets stay ahead of it.
    fn timestamp(&self) -> u64 {
        self.inner.lock().sync_to_wall_clock()
    }
}
