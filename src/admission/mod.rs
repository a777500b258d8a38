//! Admission control and the pending-liability ledger.
//!
//! The off-chain gate that keeps a live estimate of "money already promised
//! but not yet settled" so a payer can never issue more vouchers than their
//! collateral covers. This layer owns no funds: every record must converge
//! to `Settled` or `Expired` once a batch lands or a deadline passes, and
//! the sequencer's own validation remains the final authority.
//!
//! # Flow
//!
//! ```text
//! request for service
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ prepare: fresh      │  assigned (nonce, epoch), quoted amount,
//! │ ledger reads + quote│  deadline = now + ttl
//! └─────────┬───────────┘
//!           │  payer signs
//!           ▼
//! ┌─────────────────────┐
//! │ admit: preflight +  │  one critical section:
//! │ budget gate         │  pending(P) + amount ≤ balance(P)
//! └─────────┬───────────┘
//!           │
//!           ▼
//!   IOU recorded Pending ──settle──▶ Settled
//!           └──────────────deadline──▶ Expired
//! ```

mod gate;
mod store;

pub use gate::{AdmissionControl, VoucherTerms};
pub use store::{Iou, IouStatus, IouStore};
