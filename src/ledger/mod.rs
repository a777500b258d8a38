//! The ledger of record: collateral escrow and the settlement sequencer.
//!
//! Everything in this module executes serially behind a single lock
//! ([`ChainHandle`]), mirroring a single sequential chain: no two batch
//! settlements interleave their effects, and every batch is atomic.
//!
//! The admission layer only ever sees this state through the read-only
//! [`LedgerView`] trait; its reads are fresh at the time of the call but may
//! be stale by the time a batch lands. The sequencer's own validation is the
//! final authority.

mod chain;
mod escrow;
mod settlement;

pub use chain::{Chain, ChainHandle, LedgerView};
pub use escrow::{AccountState, Escrow, EscrowAccount, EscrowParams};
pub use settlement::Sequencer;
