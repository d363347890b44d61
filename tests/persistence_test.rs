#![cfg(feature = "storage-rocksdb")]

use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::tempdir;
use tutorpay::application::locks::KeyedLocks;
use tutorpay::application::payouts::PayoutService;
use tutorpay::application::settlement::SettlementOrchestrator;
use tutorpay::config::SettlementConfig;
use tutorpay::domain::account::{PayoutDestination, PayoutMethod};
use tutorpay::domain::ledger::LedgerStatus;
use tutorpay::domain::ports::{BalanceStore, LedgerStore, SessionStore};
use tutorpay::domain::session::Session;
use tutorpay::infrastructure::gateway::ScriptedVerifier;
use tutorpay::infrastructure::rocksdb::RocksDbStore;
use uuid::Uuid;

fn engine(store: RocksDbStore) -> (SettlementOrchestrator, PayoutService) {
    let locks = Arc::new(KeyedLocks::new());
    let settlement = SettlementOrchestrator::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(ScriptedVerifier::new()),
        SettlementConfig::default(),
        Arc::clone(&locks),
    );
    let payouts = PayoutService::new(
        Box::new(store.clone()),
        Box::new(store),
        SettlementConfig::default(),
        locks,
    );
    (settlement, payouts)
}

/// Settles a payment, drops the database handle, reopens the same path
/// and checks the ledger, balances and session survived.
#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let session = Session::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), dec!(1000));
    let tx_id;

    {
        let store = RocksDbStore::open(dir.path()).unwrap();
        SessionStore::store(&store, session.clone()).await.unwrap();
        let (settlement, _) = engine(store);
        settlement
            .submit_proof(session.id, session.student, "slip-1")
            .await
            .unwrap();
        let entry = settlement
            .confirm_via_manual_handshake(session.id, session.teacher)
            .await
            .unwrap();
        tx_id = entry.tx_id;
    }

    let store = RocksDbStore::open(dir.path()).unwrap();
    let entry = LedgerStore::get(&store, &tx_id).await.unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Success);
    assert_eq!(entry.external_ref.as_deref(), Some("manual:slip-1"));

    let account = BalanceStore::get(&store, session.teacher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.available, dec!(800));
    assert!(account.credited_entries.contains(&tx_id));

    let stored = SessionStore::get(&store, session.id).await.unwrap().unwrap();
    assert!(stored.is_paid);
    assert_eq!(stored.payment_id.as_deref(), Some(tx_id.as_str()));
}

/// A settlement interrupted between the ledger write and the balance
/// credit converges when the confirmation is re-driven after a restart.
#[tokio::test]
async fn test_interrupted_settlement_resumes_after_reopen() {
    let dir = tempdir().unwrap();
    let session = Session::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), dec!(1000));

    // Simulate the crash point: the entry was resolved successful but the
    // account credit never ran.
    let tx_id = {
        let store = RocksDbStore::open(dir.path()).unwrap();
        SessionStore::store(&store, session.clone()).await.unwrap();
        let mut entry = tutorpay::domain::ledger::LedgerEntry::new(
            tutorpay::domain::ledger::LedgerEntry::generate_tx_id(),
            session.student,
            dec!(1000),
            tutorpay::domain::ledger::PaymentPurpose::SessionFee,
            Some(session.id),
            "gateway",
            BTreeMap::new(),
        )
        .unwrap();
        entry.payee = Some(session.teacher);
        entry
            .resolve(tutorpay::domain::ledger::PaymentOutcome::Success, None)
            .unwrap();
        LedgerStore::create(&store, entry.clone()).await.unwrap();
        entry.tx_id
    };

    let store = RocksDbStore::open(dir.path()).unwrap();
    let (settlement, _) = engine(store.clone());
    let entry = settlement.confirm_via_verifier(&tx_id).await.unwrap();
    assert_eq!(entry.status, LedgerStatus::Success);

    let account = BalanceStore::get(&store, session.teacher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.available, dec!(800));
    let stored = SessionStore::get(&store, session.id).await.unwrap().unwrap();
    assert!(stored.is_paid);
}

#[tokio::test]
async fn test_payout_lifecycle_persists() {
    let dir = tempdir().unwrap();
    let teacher = Uuid::new_v4();
    let payout_id;

    {
        let store = RocksDbStore::open(dir.path()).unwrap();
        let (_, payouts) = engine(store.clone());
        payouts
            .update_payout_settings(
                teacher,
                PayoutMethod::Paypal,
                Some(PayoutDestination::Paypal {
                    email: "teacher@example.com".into(),
                }),
            )
            .await
            .unwrap();
        let mut account = BalanceStore::get(&store, teacher).await.unwrap().unwrap();
        account.credit("seed", dec!(1000)).unwrap();
        BalanceStore::store(&store, account).await.unwrap();

        let payout = payouts.request(teacher, dec!(500), None).await.unwrap();
        payout_id = payout.id;
    }

    let store = RocksDbStore::open(dir.path()).unwrap();
    let (_, payouts) = engine(store.clone());
    let admin = Uuid::new_v4();
    payouts.approve(payout_id, admin, None).await.unwrap();
    payouts
        .complete(payout_id, admin, Some("wire-3".into()), None)
        .await
        .unwrap();

    let account = BalanceStore::get(&store, teacher).await.unwrap().unwrap();
    assert_eq!(account.withdrawn, dec!(500));
    assert_eq!(account.available, dec!(300));
    assert_eq!(account.pending, dec!(0));
}
