//! Full-stack payment flows: assigned terms, signed vouchers, admission,
//! and atomic batch settlement.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{TestHarness, PROVIDER};
use alloy_primitives::{address, U256};
use mcpay_node::{Error, IouStatus, NodeEvent};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A payer funds escrow, makes three differently priced calls, and the
/// provider claims them as one batch.
#[test]
fn test_full_payment_flow() {
    let h = TestHarness::setup();
    let fetch = h.flat_service("web.fetch", 10_000000);
    let summarize = h.chars_service("text.summarize", 1_500000);
    let translate = h.flat_service("text.translate", 5_250000);

    let payer = h.new_funded_payer(100_000000);
    let addr = payer.address();

    let ids = [
        h.paid_call(&payer, &fetch, &json!({})).unwrap(),
        // 5000 chars at 1.5 per started 1000-char block: 7.5
        h.paid_call(&payer, &summarize, &json!({ "text": "x".repeat(5000) }))
            .unwrap(),
        h.paid_call(&payer, &translate, &json!({})).unwrap(),
    ];
    let store = h.node().admission().store();
    assert_eq!(store.pending_sum(addr), U256::from(22_750000u64));

    // The admitted voucher rides along with the request to the provider.
    let payload = json!({ "url": "https://example.com" });
    let response = h.call_provider(ids[0], &payload).unwrap();
    assert!(response.ok);
    assert_eq!(response.result, Some(payload));

    let receipt = h.claim().unwrap().unwrap();
    assert_eq!(receipt.count, 3);
    for id in ids {
        assert_eq!(store.get(&id).unwrap().status, IouStatus::Settled);
    }
    assert_eq!(h.balance(addr), U256::from(77_250000u64));
    assert_eq!(h.provider_balance(), U256::from(22_750000u64));
    assert_eq!(
        h.node().chain().with(|c| c.next_nonce(addr, PROVIDER)),
        U256::from(3u64)
    );

    // A repeated claim finds nothing pending.
    assert!(h.claim().unwrap().is_none());

    // An unknown API key cannot claim at all.
    assert!(matches!(
        h.node().claim_with_key("wrong-key"),
        Err(Error::Unauthorized(_))
    ));
}

/// Pending liabilities gate new vouchers against the live balance, and
/// settlement re-opens headroom only to the extent collateral remains.
#[test]
fn test_budget_gate_end_to_end() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    let payer = h.new_funded_payer(25_000000);

    h.paid_call(&payer, &service, &json!({})).unwrap();
    h.paid_call(&payer, &service, &json!({})).unwrap();
    let err = h.paid_call(&payer, &service, &json!({})).unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded { .. }));

    // After settlement 5 remains in escrow: still not enough for a 10 call.
    h.claim().unwrap().unwrap();
    assert_eq!(h.balance(payer.address()), U256::from(5_000000u64));
    let err = h.paid_call(&payer, &service, &json!({})).unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded { .. }));
}

/// An epoch bump revokes everything signed under the old epoch; the payer
/// re-signs under the new epoch and settles cleanly.
#[test]
fn test_epoch_bump_revokes_outstanding_vouchers() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    let payer = h.new_funded_payer(100_000000);
    let addr = payer.address();

    let stale = h.paid_call(&payer, &service, &json!({})).unwrap();
    assert_eq!(h.node().bump_epoch(addr), 1);

    // The stale voucher bounces the whole batch.
    let err = h.claim().unwrap_err();
    assert!(matches!(err, Error::EpochMismatch { .. }));
    let store = h.node().admission().store();
    assert_eq!(store.get(&stale).unwrap().status, IouStatus::Pending);

    // Operator rejects the revoked record; a fresh voucher under epoch 1
    // starts at nonce 0 again and settles.
    store.mark_rejected(&stale);
    let fresh = h.paid_call(&payer, &service, &json!({})).unwrap();
    let iou = store.get(&fresh).unwrap();
    assert_eq!(iou.debit.epoch, 1);
    assert_eq!(iou.debit.nonce, U256::ZERO);

    h.claim().unwrap().unwrap();
    assert_eq!(h.balance(addr), U256::from(90_000000u64));
}

/// A cooling account still pays for service; an elapsed exit window blocks
/// new vouchers and settlement, and frees the remaining collateral.
#[test]
fn test_exit_window_flow() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    let payer = h.new_funded_payer(100_000000);
    let addr = payer.address();

    h.paid_call(&payer, &service, &json!({})).unwrap();
    let deadline = h.node().chain().with(|c| c.request_exit(addr));

    // Cooling: the pending voucher still settles, and new ones are admitted.
    h.claim().unwrap().unwrap();
    h.paid_call(&payer, &service, &json!({})).unwrap();
    h.claim().unwrap().unwrap();
    assert_eq!(h.balance(addr), U256::from(80_000000u64));

    // Exited: no new liabilities, collateral withdrawable.
    h.node().chain().with(|c| c.set_timestamp(deadline));
    let err = h.paid_call(&payer, &service, &json!({})).unwrap_err();
    assert!(matches!(err, Error::PastExitDeadline { .. }));
    h.node()
        .chain()
        .with(|c| c.withdraw(addr, U256::from(80_000000u64)))
        .unwrap();
    assert_eq!(h.balance(addr), U256::ZERO);
}

/// An abandoned voucher releases its budget hold once its deadline passes,
/// and its nonce is reissued to the next voucher.
#[test]
fn test_expired_voucher_releases_budget() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    let payer = h.new_funded_payer(10_000000);

    let abandoned = h.paid_call(&payer, &service, &json!({})).unwrap();
    let err = h.paid_call(&payer, &service, &json!({})).unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded { .. }));

    // Past the deadline the hold is released and nonce 0 is reissued.
    h.node().chain().with(|c| c.advance_time(3_600));
    let expired = h.node().admission().expire_due();
    assert_eq!(expired, vec![abandoned]);

    let fresh = h.paid_call(&payer, &service, &json!({})).unwrap();
    let store = h.node().admission().store();
    assert_eq!(store.get(&fresh).unwrap().debit.nonce, U256::ZERO);

    let receipt = h.claim().unwrap().unwrap();
    assert_eq!(receipt.count, 1);
    assert_eq!(h.balance(payer.address()), U256::ZERO);
}

/// A voucher signed under a different settlement instance's domain is inert
/// here.
#[test]
fn test_cross_instance_voucher_rejected() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    let payer = h.new_funded_payer(100_000000);

    let payload = json!({});
    let terms = h
        .node()
        .admission()
        .prepare(&service, payer.address(), &payload)
        .unwrap();

    let foreign = mcpay_node::settlement_domain(
        31_337,
        address!("0x00000000000000000000000000000000000000dd"),
    );
    let (debit, signature) = payer.sign_voucher(&service, &terms, &foreign).unwrap();
    let err = h
        .node()
        .admission()
        .admit(debit, signature, &service, &payload)
        .unwrap_err();
    assert!(matches!(err, Error::BadSignature));
}

/// Admissions, settlements, and epoch bumps show up on the event stream.
#[test]
fn test_event_stream() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    let payer = h.new_funded_payer(100_000000);
    let mut events = h.node().subscribe_events();

    let id = h.paid_call(&payer, &service, &json!({})).unwrap();
    let receipt = h.claim().unwrap().unwrap();
    h.node().bump_epoch(payer.address());

    match events.try_recv().unwrap() {
        NodeEvent::VoucherAdmitted {
            id: event_id,
            payer: event_payer,
            amount,
            ..
        } => {
            assert_eq!(event_id, id);
            assert_eq!(event_payer, payer.address());
            assert_eq!(amount, U256::from(10_000000u64));
        }
        other => panic!("expected VoucherAdmitted, got {other:?}"),
    }
    match events.try_recv().unwrap() {
        NodeEvent::BatchSettled { tx_id, count, .. } => {
            assert_eq!(tx_id, receipt.tx_id);
            assert_eq!(count, 1);
        }
        other => panic!("expected BatchSettled, got {other:?}"),
    }
    match events.try_recv().unwrap() {
        NodeEvent::EpochBumped { epoch, .. } => assert_eq!(epoch, 1),
        other => panic!("expected EpochBumped, got {other:?}"),
    }
}

/// Racing admissions for one payer never jointly overcommit the collateral
/// and never claim the same nonce.
#[test]
fn test_concurrent_admissions_never_overcommit() {
    let h = TestHarness::setup();
    let service = h.flat_service("web.fetch", 10_000000);
    // Budget for exactly three calls.
    let payer = Arc::new(h.new_funded_payer(30_000000));
    let admission = Arc::clone(h.node().admission());
    let domain = h.node().chain().domain();

    let successes = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                // Each worker tries to land one voucher, re-deriving terms
                // when a racing admission takes the nonce first.
                for _ in 0..32 {
                    let terms = match admission.prepare(&service, payer.address(), &json!({})) {
                        Ok(terms) => terms,
                        Err(_) => return,
                    };
                    let (debit, sig) = payer.sign_voucher(&service, &terms, &domain).unwrap();
                    match admission.admit(debit, sig, &service, &json!({})) {
                        Ok(_) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                            return;
                        }
                        Err(Error::BadNonce { .. }) => continue,
                        Err(Error::BudgetExceeded { .. }) => return,
                        Err(e) => panic!("unexpected admission error: {e}"),
                    }
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 3);
    let store = h.node().admission().store();
    assert_eq!(store.pending_sum(payer.address()), U256::from(30_000000u64));

    // All three settle in one batch with strictly sequential nonces.
    let receipt = h.claim().unwrap().unwrap();
    assert_eq!(receipt.count, 3);
    assert_eq!(h.balance(payer.address()), U256::ZERO);
}
