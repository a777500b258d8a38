//! The admission gate: assigned voucher terms and preflight verification.

use crate::admission::store::{Iou, IouStatus, IouStore};
use crate::error::{Error, Result};
use crate::ledger::LedgerView;
use crate::pricing::PricingOracle;
use crate::registry::Service;
use crate::voucher::{recover_payer, signing_hash, Debit, RecoveredCache};
use alloy_primitives::{Address, Signature, B256, U256};
use alloy_sol_types::Eip712Domain;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Terms a voucher must carry, assigned by admission control.
///
/// The caller never chooses these: nonce and epoch come from fresh ledger
/// reads, the amount from the pricing oracle, the deadline from the
/// configured TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherTerms {
    /// Exact amount the voucher must carry.
    pub amount: U256,
    /// Next expected nonce for the (payer, provider) pair.
    pub nonce: U256,
    /// Payer's current epoch.
    pub epoch: u64,
    /// Voucher deadline (ledger seconds).
    pub deadline: u64,
}

/// Admission control over one settlement instance.
pub struct AdmissionControl {
    ledger: Arc<dyn LedgerView>,
    pricing: Arc<dyn PricingOracle>,
    store: Arc<IouStore>,
    cache: RecoveredCache,
    domain: Eip712Domain,
    voucher_ttl: u64,
}

impl AdmissionControl {
    /// Create an admission gate.
    ///
    /// `domain` must be the settlement instance's EIP-712 domain;
    /// `voucher_ttl` is the deadline horizon in seconds.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerView>,
        pricing: Arc<dyn PricingOracle>,
        store: Arc<IouStore>,
        domain: Eip712Domain,
        voucher_ttl: u64,
    ) -> Self {
        Self {
            ledger,
            pricing,
            store,
            cache: RecoveredCache::new(),
            domain,
            voucher_ttl,
        }
    }

    /// The pending-liability store backing this gate.
    #[must_use]
    pub fn store(&self) -> Arc<IouStore> {
        Arc::clone(&self.store)
    }

    /// Assign the terms a new voucher for this request must carry.
    ///
    /// All ledger reads are fresh — never cached across requests.
    ///
    /// # Errors
    ///
    /// [`Error::Paused`] or [`Error::PastExitDeadline`] if the payer's
    /// account cannot take on new liabilities.
    pub fn prepare(
        &self,
        service: &Service,
        payer: Address,
        payload: &serde_json::Value,
    ) -> Result<VoucherTerms> {
        let now = self.ledger.timestamp();
        self.check_account(payer, now)?;

        // The next issuable nonce is the ledger's counter plus whatever is
        // already issued but unsettled for this pair, so a payer can hold
        // several strictly sequential vouchers pending at once.
        let ledger_next = self.ledger.next_nonce(payer, service.provider);
        let in_flight = self.store.pending_count_for_pair(payer, service.provider);
        let terms = VoucherTerms {
            amount: self.pricing.quote(service, payload),
            nonce: ledger_next + U256::from(in_flight),
            epoch: self.ledger.epoch(payer),
            deadline: now + self.voucher_ttl,
        };
        debug!(%payer, provider = %service.provider, nonce = %terms.nonce, amount = %terms.amount, "terms assigned");
        Ok(terms)
    }

    /// Preflight-verify a signed voucher and record it pending.
    ///
    /// Checks, in order: service binding, token, quoted amount, deadline,
    /// signature, nonce, epoch, account state, then the budget gate. The
    /// budget check and the pending insert happen under a single lock, so
    /// two racing admissions cannot jointly overcommit a payer.
    ///
    /// Returns the IOU id (the voucher's signing hash).
    ///
    /// # Errors
    ///
    /// Any protocol error kind from the checks above. All are recoverable
    /// locally: the caller may re-quote, re-derive terms and re-sign.
    pub fn admit(
        &self,
        debit: Debit,
        signature: Signature,
        service: &Service,
        payload: &serde_json::Value,
    ) -> Result<B256> {
        if debit.serviceId != service.service_id {
            return Err(Error::UnknownService(debit.serviceId));
        }
        if debit.provider != service.provider {
            return Err(Error::Unauthorized(
                "voucher provider does not match service".to_string(),
            ));
        }
        if debit.token != service.token {
            return Err(Error::TokenNotAllowed(debit.token));
        }

        let expected = self.pricing.quote(service, payload);
        if debit.amount != expected {
            return Err(Error::PricingMismatch {
                expected,
                got: debit.amount,
            });
        }

        let now = self.ledger.timestamp();
        if now > debit.deadline {
            return Err(Error::Expired {
                deadline: debit.deadline,
                now,
            });
        }

        let id = signing_hash(&debit, &self.domain);
        self.verify_cached(&debit, &signature, id)?;

        // Fresh ledger reads; stale values here mean the voucher would bounce
        // at settlement anyway, so reject early.
        let epoch = self.ledger.epoch(debit.payer);
        if debit.epoch != epoch {
            return Err(Error::EpochMismatch {
                expected: epoch,
                got: debit.epoch,
            });
        }
        self.check_account(debit.payer, now)?;

        let ledger_next = self.ledger.next_nonce(debit.payer, debit.provider);
        let balance = self.ledger.balance(debit.payer);

        // Nonce expectation, budget check and the pending insert share one
        // lock acquisition: two racing admissions for the same payer cannot
        // both pass and jointly overcommit (or claim the same nonce).
        self.store.with_locked(|records| {
            let mut pending = U256::ZERO;
            let mut in_flight = 0u64;
            for iou in records.values() {
                if iou.status != IouStatus::Pending || iou.debit.payer != debit.payer {
                    continue;
                }
                pending += iou.debit.amount;
                if iou.debit.provider == debit.provider {
                    in_flight += 1;
                }
            }

            let expected_nonce = ledger_next + U256::from(in_flight);
            if debit.nonce != expected_nonce {
                return Err(Error::BadNonce {
                    expected: expected_nonce,
                    got: debit.nonce,
                });
            }
            if pending + debit.amount > balance {
                return Err(Error::BudgetExceeded {
                    pending,
                    amount: debit.amount,
                    balance,
                });
            }
            records.insert(
                id,
                Iou {
                    debit: debit.clone(),
                    signature,
                    status: IouStatus::Pending,
                    created_at: Utc::now(),
                },
            );
            Ok(())
        })?;

        info!(%id, payer = %debit.payer, amount = %debit.amount, "voucher admitted");
        Ok(id)
    }

    /// Flip records to settled once their batch lands.
    pub fn on_settled(&self, ids: &[B256]) {
        self.store.mark_settled(ids);
    }

    /// Expire every pending record whose deadline has passed, releasing its
    /// liability. Returns the expired ids.
    pub fn expire_due(&self) -> Vec<B256> {
        self.store.expire_due(self.ledger.timestamp())
    }

    fn verify_cached(&self, debit: &Debit, signature: &Signature, hash: B256) -> Result<()> {
        let recovered = match self.cache.get(&hash) {
            Some(addr) => addr,
            None => {
                let addr = recover_payer(debit, &self.domain, signature)?;
                self.cache.insert(hash, addr);
                addr
            }
        };
        if recovered == debit.payer {
            Ok(())
        } else {
            Err(Error::BadSignature)
        }
    }

    fn check_account(&self, payer: Address, now: u64) -> Result<()> {
        if self.ledger.paused(payer) {
            return Err(Error::Paused(payer));
        }
        // Cooling accounts may still issue (settlement is honored there);
        // only an elapsed exit window blocks new liabilities.
        if let Some(deadline) = self.ledger.exit_deadline(payer) {
            if now >= deadline {
                return Err(Error::PastExitDeadline { deadline, now });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ledger::{Chain, ChainHandle, EscrowParams};
    use crate::pricing::{PerUnitPricing, PricingUnit};
    use crate::registry::Registry;
    use crate::voucher::sign_debit;
    use alloy_primitives::{address, b256};
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::json;

    const PROVIDER: Address = address!("0x00000000000000000000000000000000000000aa");
    const TOKEN: Address = address!("0x00000000000000000000000000000000000000bb");
    const INSTANCE: Address = address!("0x00000000000000000000000000000000000000cc");

    struct Fixture {
        chain: ChainHandle,
        gate: AdmissionControl,
        service: Service,
        signer: PrivateKeySigner,
    }

    fn fixture() -> Fixture {
        let mut chain = Chain::new(
            31_337,
            INSTANCE,
            EscrowParams::default(),
            U256::from(50_000000u64),
        );
        chain.set_token_allowed(TOKEN, true);
        let chain = ChainHandle::new(chain);

        let registry = Registry::new();
        let service = registry.register_service(
            PROVIDER,
            "web.fetch",
            "Web Fetch",
            None,
            PricingUnit::Call,
            U256::from(10_000000u64),
            TOKEN,
        );

        let gate = AdmissionControl::new(
            Arc::new(chain.clone()),
            Arc::new(PerUnitPricing),
            Arc::new(IouStore::new()),
            chain.domain(),
            1_800,
        );

        let signer = PrivateKeySigner::from_bytes(&b256!(
            "0x0000000000000000000000000000000000000000000000000000000000000004"
        ))
        .expect("valid key");

        Fixture {
            chain,
            gate,
            service,
            signer,
        }
    }

    fn signed_voucher(f: &Fixture, terms: &VoucherTerms) -> (Debit, Signature) {
        let debit = Debit {
            payer: f.signer.address(),
            provider: PROVIDER,
            serviceId: f.service.service_id,
            amount: terms.amount,
            token: TOKEN,
            nonce: terms.nonce,
            epoch: terms.epoch,
            deadline: terms.deadline,
        };
        let sig = sign_debit(&debit, &f.chain.domain(), &f.signer).expect("sign");
        (debit, sig)
    }

    #[test]
    fn test_admit_records_pending() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();

        let payload = json!({});
        let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
        assert_eq!(terms.amount, U256::from(10_000000u64));
        assert_eq!(terms.nonce, U256::ZERO);

        let (debit, sig) = signed_voucher(&f, &terms);
        let id = f.gate.admit(debit, sig, &f.service, &payload).unwrap();
        assert_eq!(f.gate.store().pending_sum(payer), U256::from(10_000000u64));
        assert_eq!(
            f.gate.store().get(&id).unwrap().status,
            IouStatus::Pending
        );
    }

    #[test]
    fn test_assigned_nonces_are_sequential_while_pending() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();

        let payload = json!({});
        for expected in 0u64..3 {
            let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
            assert_eq!(terms.nonce, U256::from(expected));
            let (debit, sig) = signed_voucher(&f, &terms);
            f.gate.admit(debit, sig, &f.service, &payload).unwrap();
        }
        assert_eq!(f.gate.store().pending_sum(payer), U256::from(30_000000u64));
    }

    #[test]
    fn test_budget_gate() {
        let f = fixture();
        let payer = f.signer.address();
        // Covers exactly two calls at 10 each.
        f.chain
            .with(|c| c.deposit(payer, U256::from(25_000000u64)))
            .unwrap();

        let payload = json!({});
        for _ in 0..2 {
            let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
            let (debit, sig) = signed_voucher(&f, &terms);
            f.gate.admit(debit, sig, &f.service, &payload).unwrap();
        }

        // Third voucher: 20 pending + 10 > 25.
        let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
        let (debit, sig) = signed_voucher(&f, &terms);
        let err = f.gate.admit(debit, sig, &f.service, &payload).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded { .. }));
        assert_eq!(f.gate.store().pending_sum(payer), U256::from(20_000000u64));
    }

    #[test]
    fn test_pricing_mismatch_rejected() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();

        let payload = json!({});
        let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
        let bad = VoucherTerms {
            amount: terms.amount + U256::from(1),
            ..terms
        };
        let (debit, sig) = signed_voucher(&f, &bad);
        let err = f.gate.admit(debit, sig, &f.service, &payload).unwrap_err();
        assert!(matches!(err, Error::PricingMismatch { .. }));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();

        let payload = json!({});
        let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
        let (debit, _sig) = signed_voucher(&f, &terms);

        // Signature from a different key.
        let other = PrivateKeySigner::from_bytes(&b256!(
            "0x0000000000000000000000000000000000000000000000000000000000000005"
        ))
        .unwrap();
        let forged = sign_debit(&debit, &f.chain.domain(), &other).unwrap();
        let err = f.gate.admit(debit, forged, &f.service, &payload).unwrap_err();
        assert!(matches!(err, Error::BadSignature));
    }

    #[test]
    fn test_stale_nonce_rejected() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();

        let payload = json!({});
        let terms = f.gate.prepare(&f.service, payer, &payload).unwrap();
        let stale = VoucherTerms {
            nonce: terms.nonce + U256::from(1),
            ..terms
        };
        let (debit, sig) = signed_voucher(&f, &stale);
        let err = f.gate.admit(debit, sig, &f.service, &payload).unwrap_err();
        assert!(matches!(err, Error::BadNonce { .. }));
    }

    #[test]
    fn test_exited_account_cannot_issue() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();

        let deadline = f.chain.with(|c| c.request_exit(payer));
        f.chain.with(|c| c.set_timestamp(deadline));

        let payload = json!({});
        let err = f.gate.prepare(&f.service, payer, &payload).unwrap_err();
        assert!(matches!(err, Error::PastExitDeadline { .. }));
    }

    #[test]
    fn test_paused_account_cannot_issue() {
        let f = fixture();
        let payer = f.signer.address();
        f.chain
            .with(|c| c.deposit(payer, U256::from(100_000000u64)))
            .unwrap();
        f.chain.with(|c| c.pause(payer));

        let payload = json!({});
        assert!(matches!(
            f.gate.prepare(&f.service, payer, &payload),
            Err(Error::Paused(_))
        ));
    }
}
