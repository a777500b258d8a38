//! End-to-end tests for mcpay-node.
//!
//! These run the full path a real deployment exercises: service
//! registration, term assignment, voucher signing, admission, and batch
//! settlement against an in-process settlement instance.

mod flows;
mod harness;
