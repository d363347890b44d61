#![allow(dead_code)]

use rust_decimal::Decimal;
use std::sync::Arc;
use tutorpay::application::locks::KeyedLocks;
use tutorpay::application::payouts::PayoutService;
use tutorpay::application::settlement::SettlementOrchestrator;
use tutorpay::config::SettlementConfig;
use tutorpay::domain::account::{PayoutDestination, PayoutMethod};
use tutorpay::domain::ports::SessionStore;
use tutorpay::domain::session::Session;
use tutorpay::infrastructure::gateway::ScriptedVerifier;
use tutorpay::infrastructure::in_memory::{
    InMemoryBalanceStore, InMemoryLedgerStore, InMemoryPayoutStore, InMemorySessionStore,
};
use uuid::Uuid;

/// Fully wired engine over shared in-memory stores.
pub struct Harness {
    pub settlement: SettlementOrchestrator,
    pub payouts: PayoutService,
    pub ledger: InMemoryLedgerStore,
    pub balances: InMemoryBalanceStore,
    pub sessions: InMemorySessionStore,
    pub verifier: ScriptedVerifier,
}

pub fn harness() -> Harness {
    harness_with_config(SettlementConfig::default())
}

pub fn harness_with_config(config: SettlementConfig) -> Harness {
    let ledger = InMemoryLedgerStore::new();
    let balances = InMemoryBalanceStore::new();
    let payout_store = InMemoryPayoutStore::new();
    let sessions = InMemorySessionStore::new();
    let verifier = ScriptedVerifier::new();
    let account_locks = Arc::new(KeyedLocks::new());

    let settlement = SettlementOrchestrator::new(
        Box::new(ledger.clone()),
        Box::new(balances.clone()),
        Box::new(sessions.clone()),
        Box::new(verifier.clone()),
        config.clone(),
        Arc::clone(&account_locks),
    );
    let payouts = PayoutService::new(
        Box::new(payout_store),
        Box::new(balances.clone()),
        config,
        account_locks,
    );

    Harness {
        settlement,
        payouts,
        ledger,
        balances,
        sessions,
        verifier,
    }
}

pub async fn seed_session(harness: &Harness, price: Decimal) -> Session {
    let session = Session::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), price);
    harness.sessions.store(session.clone()).await.unwrap();
    session
}

pub async fn paypal_settings(harness: &Harness, teacher: Uuid) {
    harness
        .payouts
        .update_payout_settings(
            teacher,
            PayoutMethod::Paypal,
            Some(PayoutDestination::Paypal {
                email: "teacher@example.com".into(),
            }),
        )
        .await
        .unwrap();
}
