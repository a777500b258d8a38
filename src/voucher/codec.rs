//! Canonical EIP-712 encoding of debit vouchers.
//!
//! The struct layout (field order and solidity types) is part of the
//! signature: changing any of it changes every signing hash.

use crate::error::{Error, Result};
use alloy_primitives::{Address, Signature, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use std::borrow::Cow;

/// EIP-712 domain name shared by every settlement instance.
pub const PROTOCOL_NAME: &str = "MCPSettlement";

/// EIP-712 domain version.
pub const PROTOCOL_VERSION: &str = "1";

sol! {
    /// A single-use debit authorization signed by the payer.
    ///
    /// `nonce` is strictly sequential per (payer, provider) pair; `epoch` is
    /// the payer's revocation generation. Any single-bit change to any field
    /// invalidates the signature.
    #[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Debit {
        address payer;
        address provider;
        bytes32 serviceId;
        uint256 amount;
        address token;
        uint256 nonce;
        uint64 epoch;
        uint64 deadline;
    }
}

/// Build the EIP-712 domain for one settlement instance.
///
/// Binding the domain to `(chain_id, verifying_contract)` makes signatures
/// cryptographically meaningless for any other instance or chain.
#[must_use]
pub fn settlement_domain(chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(PROTOCOL_NAME)),
        Some(Cow::Borrowed(PROTOCOL_VERSION)),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

/// The voucher's EIP-712 signing hash under the given domain.
///
/// This hash is the voucher's identity: it keys IOU records and is what the
/// payer actually signs.
#[must_use]
pub fn signing_hash(debit: &Debit, domain: &Eip712Domain) -> B256 {
    debit.eip712_signing_hash(domain)
}

/// Sign a voucher with the payer's key.
///
/// # Errors
///
/// Returns an error if the underlying signer fails.
pub fn sign_debit(
    debit: &Debit,
    domain: &Eip712Domain,
    signer: &PrivateKeySigner,
) -> Result<Signature> {
    signer
        .sign_hash_sync(&signing_hash(debit, domain))
        .map_err(|e| Error::Serialization(format!("signing failed: {e}")))
}

/// Recover the signer address of a voucher signature.
///
/// # Errors
///
/// Any recovery failure is reported as [`Error::BadSignature`]; a malformed
/// signature is not distinguished from a wrong signer.
pub fn recover_payer(debit: &Debit, domain: &Eip712Domain, signature: &Signature) -> Result<Address> {
    signature
        .recover_address_from_prehash(&signing_hash(debit, domain))
        .map_err(|_| Error::BadSignature)
}

/// Verify that a voucher was signed by its declared payer.
///
/// # Errors
///
/// Returns [`Error::BadSignature`] if recovery fails or the recovered address
/// is not `debit.payer`.
pub fn verify_debit(debit: &Debit, domain: &Eip712Domain, signature: &Signature) -> Result<()> {
    let recovered = recover_payer(debit, domain, signature)?;
    if recovered == debit.payer {
        Ok(())
    } else {
        Err(Error::BadSignature)
    }
}
