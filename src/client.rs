//! Payer-side helper: signs vouchers over admission-assigned terms.

use crate::admission::VoucherTerms;
use crate::error::Result;
use crate::registry::Service;
use crate::voucher::{sign_debit, Debit};
use alloy_primitives::{Address, Signature};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::Eip712Domain;

/// A payer identity that can sign vouchers.
///
/// Terms are filled in verbatim — the payer chooses nothing but whether to
/// sign. Altering any assigned value produces a voucher admission rejects.
pub struct PayerClient {
    signer: PrivateKeySigner,
}

impl PayerClient {
    /// Wrap an existing key.
    #[must_use]
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Generate a fresh payer identity.
    #[must_use]
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// The payer's settlement address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Build and sign a voucher for a service under the given instance
    /// domain, carrying the assigned terms.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign_voucher(
        &self,
        service: &Service,
        terms: &VoucherTerms,
        domain: &Eip712Domain,
    ) -> Result<(Debit, Signature)> {
        let debit = Debit {
            payer: self.address(),
            provider: service.provider,
            serviceId: service.service_id,
            amount: terms.amount,
            token: service.token,
            nonce: terms.nonce,
            epoch: terms.epoch,
            deadline: terms.deadline,
        };
        let signature = sign_debit(&debit, domain, &self.signer)?;
        Ok((debit, signature))
    }
}
