mod common;

use common::{harness, harness_with_config, seed_session};
use rust_decimal_macros::dec;
use tutorpay::config::SettlementConfig;
use tutorpay::domain::ledger::{LedgerStatus, PaymentPurpose};
use tutorpay::domain::ports::{BalanceStore, LedgerStore, Page, VerifierVerdict};
use tutorpay::domain::session::SessionPaymentStatus;
use tutorpay::error::LedgerError;
use uuid::Uuid;

/// A declined card payment leaves the session payable, so the student can
/// fall back to a direct transfer for the same session.
#[tokio::test]
async fn test_declined_gateway_payment_then_direct_transfer() {
    let h = harness();
    let session = seed_session(&h, dec!(1000)).await;

    let (entry, _) = h
        .settlement
        .initiate(
            session.student,
            dec!(1000),
            PaymentPurpose::SessionFee,
            Some(session.id),
            None,
            "gateway",
            None,
            Default::default(),
        )
        .await
        .unwrap();
    h.verifier
        .script(
            entry.tx_id.clone(),
            VerifierVerdict::Declined {
                reason: "insufficient funds".into(),
            },
        )
        .await;
    let failed = h
        .settlement
        .handle_gateway_callback(&entry.tx_id, dec!(1000), "gw-declined")
        .await
        .unwrap();
    assert_eq!(failed.status, LedgerStatus::Failed);

    h.settlement
        .submit_proof(session.id, session.student, "bank-slip-4")
        .await
        .unwrap();
    let manual = h
        .settlement
        .confirm_via_manual_handshake(session.id, session.teacher)
        .await
        .unwrap();
    assert_ne!(manual.tx_id, entry.tx_id);

    let account = h.balances.get(session.teacher).await.unwrap().unwrap();
    assert_eq!(account.available, dec!(800));
}

/// A refund marks the ledger entry and the session but does not claw the
/// credited earnings back out of the balance account.
#[tokio::test]
async fn test_refund_leaves_balances_untouched() {
    let h = harness();
    let session = seed_session(&h, dec!(1000)).await;
    h.settlement
        .submit_proof(session.id, session.student, "slip-r")
        .await
        .unwrap();
    let entry = h
        .settlement
        .confirm_via_manual_handshake(session.id, session.teacher)
        .await
        .unwrap();

    let refunded = h.settlement.refund(&entry.tx_id).await.unwrap();
    assert_eq!(refunded.status, LedgerStatus::Refunded);

    let second_refund = h.settlement.refund(&entry.tx_id).await;
    assert!(matches!(
        second_refund,
        Err(LedgerError::IllegalTransition(_))
    ));

    let account = h.balances.get(session.teacher).await.unwrap().unwrap();
    assert_eq!(account.total_earnings, dec!(800));
    assert_eq!(account.available, dec!(800));

    use tutorpay::domain::ports::SessionStore;
    let session = h.sessions.get(session.id).await.unwrap().unwrap();
    assert_eq!(session.payment_status, SessionPaymentStatus::Refunded);
}

#[tokio::test]
async fn test_refund_of_pending_entry_rejected() {
    let h = harness();
    let (entry, _) = h
        .settlement
        .initiate(
            Uuid::new_v4(),
            dec!(100),
            PaymentPurpose::Donation,
            None,
            None,
            "gateway",
            None,
            Default::default(),
        )
        .await
        .unwrap();
    let result = h.settlement.refund(&entry.tx_id).await;
    assert!(matches!(result, Err(LedgerError::IllegalTransition(_))));
}

#[tokio::test]
async fn test_balance_of_unknown_teacher_is_zeroed() {
    let h = harness();
    let account = h.settlement.balance_of(Uuid::new_v4()).await.unwrap();
    assert_eq!(account.total_earnings, dec!(0));
    assert_eq!(account.available, dec!(0));
    assert!(account.credited_entries.is_empty());
}

#[tokio::test]
async fn test_earnings_history_paginated_newest_first() {
    let h = harness();
    let teacher = Uuid::new_v4();
    for i in 0..5 {
        let (entry, _) = h
            .settlement
            .initiate(
                Uuid::new_v4(),
                dec!(100),
                PaymentPurpose::Consultation,
                None,
                Some(teacher),
                "gateway",
                Some(format!("tx-{i}")),
                Default::default(),
            )
            .await
            .unwrap();
        h.verifier
            .script(
                entry.tx_id.clone(),
                VerifierVerdict::Confirmed {
                    external_ref: format!("gw-{i}"),
                    amount: dec!(100),
                },
            )
            .await;
        h.settlement.confirm_via_verifier(&entry.tx_id).await.unwrap();
    }

    let first_page = h
        .settlement
        .earnings_history(teacher, Page { offset: 0, limit: 3 })
        .await
        .unwrap();
    assert_eq!(first_page.len(), 3);
    let second_page = h
        .settlement
        .earnings_history(teacher, Page { offset: 3, limit: 3 })
        .await
        .unwrap();
    assert_eq!(second_page.len(), 2);

    let account = h.balances.get(teacher).await.unwrap().unwrap();
    assert_eq!(account.total_earnings, dec!(400));
    assert_eq!(account.credited_entries.len(), 5);
}

/// The configured rate applies to accounts created by settlement, and the
/// rate actually used is frozen onto the entry's breakdown.
#[tokio::test]
async fn test_configured_commission_rate_applies() {
    let config = SettlementConfig {
        default_commission_rate: dec!(10),
        ..SettlementConfig::default()
    };
    let h = harness_with_config(config);
    let session = seed_session(&h, dec!(1000)).await;

    h.settlement
        .submit_proof(session.id, session.student, "slip-c")
        .await
        .unwrap();
    let entry = h
        .settlement
        .confirm_via_manual_handshake(session.id, session.teacher)
        .await
        .unwrap();

    let breakdown = entry.breakdown.unwrap();
    assert_eq!(breakdown.rate_used, dec!(10));
    assert_eq!(breakdown.teacher_share, dec!(900));

    let stored = h.ledger.get(&entry.tx_id).await.unwrap().unwrap();
    assert_eq!(stored.breakdown, Some(breakdown));
}

/// With the gateway down entirely, confirmation errs and the entry stays
/// pending; nothing is credited.
#[tokio::test]
async fn test_gateway_outage_leaves_entry_pending() {
    use tutorpay::application::locks::KeyedLocks;
    use tutorpay::application::settlement::SettlementOrchestrator;
    use tutorpay::infrastructure::gateway::OfflineVerifier;
    use tutorpay::infrastructure::in_memory::{
        InMemoryBalanceStore, InMemoryLedgerStore, InMemorySessionStore,
    };

    let ledger = InMemoryLedgerStore::new();
    let balances = InMemoryBalanceStore::new();
    let settlement = SettlementOrchestrator::new(
        Box::new(ledger.clone()),
        Box::new(balances.clone()),
        Box::new(InMemorySessionStore::new()),
        Box::new(OfflineVerifier),
        SettlementConfig::default(),
        std::sync::Arc::new(KeyedLocks::new()),
    );

    let (entry, _) = settlement
        .initiate(
            Uuid::new_v4(),
            dec!(250),
            PaymentPurpose::CoursePurchase,
            None,
            Some(Uuid::new_v4()),
            "gateway",
            None,
            Default::default(),
        )
        .await
        .unwrap();
    let result = settlement.confirm_via_verifier(&entry.tx_id).await;
    assert!(matches!(result, Err(LedgerError::VerifierUnavailable(_))));

    let stored = ledger.get(&entry.tx_id).await.unwrap().unwrap();
    assert_eq!(stored.status, LedgerStatus::Pending);
    assert!(balances.get_all().await.unwrap().is_empty());
}

/// Paying a session twice through the gateway is blocked at initiation
/// once the first payment settled.
#[tokio::test]
async fn test_settled_session_is_no_longer_payable() {
    let h = harness();
    let session = seed_session(&h, dec!(500)).await;
    h.settlement
        .submit_proof(session.id, session.student, "slip-x")
        .await
        .unwrap();
    h.settlement
        .confirm_via_manual_handshake(session.id, session.teacher)
        .await
        .unwrap();

    let result = h
        .settlement
        .initiate(
            session.student,
            dec!(500),
            PaymentPurpose::SessionFee,
            Some(session.id),
            None,
            "gateway",
            None,
            Default::default(),
        )
        .await;
    assert!(matches!(result, Err(LedgerError::IllegalTransition(_))));
}
