//! Settlement sequencer state: nonces, epochs, and per-voucher policy.
//!
//! Nonces are per (payer, provider) pair and strictly sequential — no gaps,
//! no reordering within a pair. Epochs are per payer; bumping one
//! permanently invalidates every unredeemed voucher signed under the prior
//! epoch, without enumerating them.

use crate::error::{Error, Result};
use crate::voucher::Debit;
use alloy_primitives::{Address, U256};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Sequencer state for one settlement instance.
#[derive(Debug, Clone)]
pub struct Sequencer {
    next_nonce: HashMap<(Address, Address), U256>,
    epoch: HashMap<Address, u64>,
    per_call_limit: U256,
    token_allowed: HashSet<Address>,
    provider_balances: HashMap<Address, U256>,
}

impl Sequencer {
    /// Create a sequencer with the given global per-voucher amount limit.
    #[must_use]
    pub fn new(per_call_limit: U256) -> Self {
        Self {
            next_nonce: HashMap::new(),
            epoch: HashMap::new(),
            per_call_limit,
            token_allowed: HashSet::new(),
            provider_balances: HashMap::new(),
        }
    }

    /// Next expected nonce for a (payer, provider) pair. Starts at 0.
    #[must_use]
    pub fn next_nonce(&self, payer: Address, provider: Address) -> U256 {
        self.next_nonce
            .get(&(payer, provider))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Current epoch for a payer. Starts at 0.
    #[must_use]
    pub fn epoch(&self, payer: Address) -> u64 {
        self.epoch.get(&payer).copied().unwrap_or(0)
    }

    /// Total amount credited to a provider by settled vouchers.
    #[must_use]
    pub fn provider_balance(&self, provider: Address) -> U256 {
        self.provider_balances
            .get(&provider)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Global per-voucher amount limit.
    #[must_use]
    pub fn per_call_limit(&self) -> U256 {
        self.per_call_limit
    }

    /// Administrative: set the per-voucher amount limit.
    pub fn set_per_call_limit(&mut self, limit: U256) {
        info!(%limit, "per-call limit set");
        self.per_call_limit = limit;
    }

    /// Administrative: add or remove a token from the allow-list.
    pub fn set_token_allowed(&mut self, token: Address, allowed: bool) {
        if allowed {
            self.token_allowed.insert(token);
        } else {
            self.token_allowed.remove(&token);
        }
        info!(%token, allowed, "token allow-list updated");
    }

    /// Whether the token is on the allow-list.
    #[must_use]
    pub fn token_allowed(&self, token: Address) -> bool {
        self.token_allowed.contains(&token)
    }

    /// Administrative: increment the payer's epoch, revoking every
    /// outstanding voucher signed under the prior epoch at once.
    pub fn bump_epoch(&mut self, payer: Address) -> u64 {
        let epoch = self.epoch.entry(payer).or_insert(0);
        *epoch += 1;
        info!(%payer, epoch = *epoch, "epoch bumped");
        *epoch
    }

    /// Stateless per-voucher policy checks, in protocol order (token, limit,
    /// deadline). Signature, nonce, epoch and collateral checks follow in
    /// the batch transition.
    pub(crate) fn check_policy(&self, debit: &Debit, now: u64) -> Result<()> {
        if !self.token_allowed(debit.token) {
            return Err(Error::TokenNotAllowed(debit.token));
        }
        if debit.amount > self.per_call_limit {
            return Err(Error::LimitExceeded {
                amount: debit.amount,
                limit: self.per_call_limit,
            });
        }
        if now > debit.deadline {
            return Err(Error::Expired {
                deadline: debit.deadline,
                now,
            });
        }
        Ok(())
    }

    /// Consume the voucher's nonce and epoch, then credit the provider.
    /// Called only inside an already-validated batch transition.
    pub(crate) fn apply(&mut self, debit: &Debit) -> Result<()> {
        let expected = self.next_nonce(debit.payer, debit.provider);
        if debit.nonce != expected {
            return Err(Error::BadNonce {
                expected,
                got: debit.nonce,
            });
        }
        let epoch = self.epoch(debit.payer);
        if debit.epoch != epoch {
            return Err(Error::EpochMismatch {
                expected: epoch,
                got: debit.epoch,
            });
        }
        self.next_nonce
            .insert((debit.payer, debit.provider), expected + U256::from(1));
        *self.provider_balances.entry(debit.provider).or_default() += debit.amount;
        Ok(())
    }
}
