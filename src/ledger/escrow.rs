//! Per-payer collateral accounts with a time-gated exit window.
//!
//! Lifecycle: `Active` (no exit requested) → `Cooling` (exit requested,
//! settlement still honored, withdrawal blocked) → `Exited` (settlement
//! blocked, withdrawal permitted). An account is created on first deposit.

use crate::error::{Error, Result};
use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use tracing::{debug, info};

/// Escrow policy parameters.
#[derive(Debug, Clone)]
pub struct EscrowParams {
    /// Seconds between an exit request and the exit deadline.
    pub cooling_period: u64,
    /// Allow withdrawal without an exit request (up to the full balance).
    /// Off by default: only a completed exit window releases funds.
    pub allow_instant_withdraw: bool,
}

impl Default for EscrowParams {
    fn default() -> Self {
        Self {
            // 7 days
            cooling_period: 7 * 24 * 60 * 60,
            allow_instant_withdraw: false,
        }
    }
}

/// One payer's collateral account.
#[derive(Debug, Clone, Default)]
pub struct EscrowAccount {
    /// Deposited balance, in the token's smallest unit.
    pub balance: U256,
    /// When the payer requested exit, if ever.
    pub exit_requested_at: Option<u64>,
    /// `exit_requested_at + cooling_period`.
    pub exit_deadline: Option<u64>,
    /// Administrative circuit breaker: blocks deposit and debit.
    pub paused: bool,
}

/// Lifecycle state of a collateral account at a given timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// No exit requested; settlement and deposits permitted.
    Active,
    /// Exit requested, deadline not yet reached; settlement still permitted.
    Cooling,
    /// Exit deadline passed; settlement blocked, withdrawal permitted.
    Exited,
}

impl EscrowAccount {
    /// Lifecycle state at `now`.
    #[must_use]
    pub fn state(&self, now: u64) -> AccountState {
        match self.exit_deadline {
            None => AccountState::Active,
            Some(deadline) if now < deadline => AccountState::Cooling,
            Some(_) => AccountState::Exited,
        }
    }
}

/// Collateral ledger: all payer accounts plus policy.
#[derive(Debug, Clone)]
pub struct Escrow {
    accounts: HashMap<Address, EscrowAccount>,
    params: EscrowParams,
}

impl Escrow {
    /// Create an empty escrow ledger.
    #[must_use]
    pub fn new(params: EscrowParams) -> Self {
        Self {
            accounts: HashMap::new(),
            params,
        }
    }

    /// Increase a payer's balance. Permitted in any lifecycle state.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Paused`] while the account is paused.
    pub fn deposit(&mut self, payer: Address, amount: U256) -> Result<()> {
        let account = self.accounts.entry(payer).or_default();
        if account.paused {
            return Err(Error::Paused(payer));
        }
        account.balance += amount;
        info!(%payer, %amount, balance = %account.balance, "deposit");
        Ok(())
    }

    /// Start (or restart) the payer's exit window; returns the new deadline.
    ///
    /// Re-issuing while already Cooling restarts the timer: both
    /// `exit_requested_at` and `exit_deadline` are recomputed from `now`.
    pub fn request_exit(&mut self, payer: Address, now: u64) -> u64 {
        let account = self.accounts.entry(payer).or_default();
        let deadline = now + self.params.cooling_period;
        account.exit_requested_at = Some(now);
        account.exit_deadline = Some(deadline);
        info!(%payer, deadline, "exit requested");
        deadline
    }

    /// Withdraw up to `balance` once the exit window has elapsed (or, under
    /// the instant-withdraw policy, with no exit ever requested).
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientBalance`] if `amount > balance`;
    /// [`Error::WithdrawalLocked`] before the deadline, or with no exit
    /// requested when the policy forbids instant withdrawal.
    pub fn withdraw(&mut self, payer: Address, amount: U256, now: u64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(&payer)
            .ok_or(Error::InsufficientBalance {
                needed: amount,
                available: U256::ZERO,
            })?;

        match account.exit_deadline {
            Some(deadline) if now >= deadline => {}
            None if self.params.allow_instant_withdraw => {}
            deadline => return Err(Error::WithdrawalLocked { deadline, now }),
        }

        if amount > account.balance {
            return Err(Error::InsufficientBalance {
                needed: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        // A drained, fully exited account goes back to a clean slate.
        if account.balance.is_zero() {
            account.exit_requested_at = None;
            account.exit_deadline = None;
        }
        info!(%payer, %amount, balance = %account.balance, "withdraw");
        Ok(())
    }

    /// Debit a payer's balance on settlement. Sequencer-only.
    ///
    /// Settlement is honored through the Cooling state so already-issued
    /// vouchers can still land; the gate is on the settlement attempt's
    /// timestamp, not on voucher issuance.
    ///
    /// # Errors
    ///
    /// [`Error::Paused`], [`Error::PastExitDeadline`], or
    /// [`Error::InsufficientBalance`].
    pub(crate) fn debit(&mut self, payer: Address, amount: U256, now: u64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(&payer)
            .ok_or(Error::InsufficientBalance {
                needed: amount,
                available: U256::ZERO,
            })?;

        if account.paused {
            return Err(Error::Paused(payer));
        }
        if let Some(deadline) = account.exit_deadline {
            if now >= deadline {
                return Err(Error::PastExitDeadline { deadline, now });
            }
        }
        if amount > account.balance {
            return Err(Error::InsufficientBalance {
                needed: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        debug!(%payer, %amount, balance = %account.balance, "debit");
        Ok(())
    }

    /// Engage the circuit breaker for a payer.
    pub fn pause(&mut self, payer: Address) {
        self.accounts.entry(payer).or_default().paused = true;
        info!(%payer, "account paused");
    }

    /// Release the circuit breaker for a payer.
    pub fn unpause(&mut self, payer: Address) {
        self.accounts.entry(payer).or_default().paused = false;
        info!(%payer, "account unpaused");
    }

    /// Current balance (zero for unknown payers).
    #[must_use]
    pub fn balance(&self, payer: Address) -> U256 {
        self.accounts.get(&payer).map_or(U256::ZERO, |a| a.balance)
    }

    /// Exit deadline, if an exit was requested.
    #[must_use]
    pub fn exit_deadline(&self, payer: Address) -> Option<u64> {
        self.accounts.get(&payer).and_then(|a| a.exit_deadline)
    }

    /// Whether the account is paused.
    #[must_use]
    pub fn paused(&self, payer: Address) -> bool {
        self.accounts.get(&payer).is_some_and(|a| a.paused)
    }

    /// Lifecycle state at `now` (unknown payers are Active).
    #[must_use]
    pub fn state(&self, payer: Address, now: u64) -> AccountState {
        self.accounts
            .get(&payer)
            .map_or(AccountState::Active, |a| a.state(now))
    }
}
