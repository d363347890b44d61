use crate::domain::account::BalanceAccount;
use crate::domain::ledger::LedgerEntry;
use crate::domain::payout::PayoutRequest;
use crate::domain::ports::{
    BalanceStore, LedgerStore, Page, PayoutStore, SessionStore,
};
use crate::domain::session::Session;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn paginate<T: Clone>(items: Vec<&T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .cloned()
        .collect()
}

/// Thread-safe in-memory ledger.
///
/// Keeps a secondary index from external reference to transaction id so
/// `find_or_create_by_external_ref` stays a single check-and-insert under
/// one write lock. `Clone` shares the underlying maps.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<RwLock<LedgerMaps>>,
}

#[derive(Default)]
struct LedgerMaps {
    entries: HashMap<String, LedgerEntry>,
    by_external_ref: HashMap<String, String>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create(&self, entry: LedgerEntry) -> Result<()> {
        let mut maps = self.inner.write().await;
        if maps.entries.contains_key(&entry.tx_id) {
            return Err(LedgerError::DuplicateTransaction(entry.tx_id));
        }
        if let Some(reference) = &entry.external_ref {
            maps.by_external_ref
                .insert(reference.clone(), entry.tx_id.clone());
        }
        maps.entries.insert(entry.tx_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, tx_id: &str) -> Result<Option<LedgerEntry>> {
        let maps = self.inner.read().await;
        Ok(maps.entries.get(tx_id).cloned())
    }

    async fn update(&self, entry: LedgerEntry) -> Result<()> {
        let mut maps = self.inner.write().await;
        if !maps.entries.contains_key(&entry.tx_id) {
            return Err(LedgerError::NotFound(format!("ledger entry {}", entry.tx_id)));
        }
        if let Some(reference) = &entry.external_ref {
            maps.by_external_ref
                .insert(reference.clone(), entry.tx_id.clone());
        }
        maps.entries.insert(entry.tx_id.clone(), entry);
        Ok(())
    }

    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        let maps = self.inner.read().await;
        Ok(maps
            .by_external_ref
            .get(external_ref)
            .and_then(|tx_id| maps.entries.get(tx_id))
            .cloned())
    }

    async fn find_or_create_by_external_ref(
        &self,
        external_ref: &str,
        candidate: LedgerEntry,
    ) -> Result<LedgerEntry> {
        let mut maps = self.inner.write().await;
        if let Some(existing) = maps
            .by_external_ref
            .get(external_ref)
            .and_then(|tx_id| maps.entries.get(tx_id))
        {
            return Ok(existing.clone());
        }
        maps.by_external_ref
            .insert(external_ref.to_string(), candidate.tx_id.clone());
        maps.entries
            .insert(candidate.tx_id.clone(), candidate.clone());
        Ok(candidate)
    }

    async fn list_for_payee(&self, teacher: Uuid, page: Page) -> Result<Vec<LedgerEntry>> {
        let maps = self.inner.read().await;
        let mut entries: Vec<&LedgerEntry> = maps
            .entries
            .values()
            .filter(|entry| entry.payee == Some(teacher))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(entries, page))
    }
}

/// Thread-safe in-memory balance accounts, one per teacher.
#[derive(Default, Clone)]
pub struct InMemoryBalanceStore {
    accounts: Arc<RwLock<HashMap<Uuid, BalanceAccount>>>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn get(&self, teacher: Uuid) -> Result<Option<BalanceAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&teacher).cloned())
    }

    async fn store(&self, account: BalanceAccount) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.teacher, account);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<BalanceAccount>> {
        let accounts = self.accounts.read().await;
        let mut all: Vec<BalanceAccount> = accounts.values().cloned().collect();
        all.sort_by_key(|account| account.teacher);
        Ok(all)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    payouts: Arc<RwLock<HashMap<Uuid, PayoutRequest>>>,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn create(&self, payout: PayoutRequest) -> Result<()> {
        let mut payouts = self.payouts.write().await;
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PayoutRequest>> {
        let payouts = self.payouts.read().await;
        Ok(payouts.get(&id).cloned())
    }

    async fn update(&self, payout: PayoutRequest) -> Result<()> {
        let mut payouts = self.payouts.write().await;
        if !payouts.contains_key(&payout.id) {
            return Err(LedgerError::NotFound(format!("payout request {}", payout.id)));
        }
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn list_for_teacher(&self, teacher: Uuid, page: Page) -> Result<Vec<PayoutRequest>> {
        let payouts = self.payouts.read().await;
        let mut rows: Vec<&PayoutRequest> = payouts
            .values()
            .filter(|payout| payout.teacher == teacher)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn list_all(&self, page: Page) -> Result<Vec<PayoutRequest>> {
        let payouts = self.payouts.read().await;
        let mut rows: Vec<&PayoutRequest> = payouts.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }
}
