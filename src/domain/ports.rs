use crate::domain::account::BalanceAccount;
use crate::domain::ledger::LedgerEntry;
use crate::domain::payout::PayoutRequest;
use crate::domain::session::Session;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Cursor for paginated history reads.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new entry; fails with `DuplicateTransaction` if the
    /// transaction id is already taken.
    async fn create(&self, entry: LedgerEntry) -> Result<()>;
    async fn get(&self, tx_id: &str) -> Result<Option<LedgerEntry>>;
    /// Persists a mutated entry; fails with `NotFound` if it was never
    /// created.
    async fn update(&self, entry: LedgerEntry) -> Result<()>;
    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>>;
    /// Returns the entry indexed by `external_ref`, inserting `candidate`
    /// if none exists. Must be atomic: concurrent duplicate calls with the
    /// same reference create at most one entry.
    async fn find_or_create_by_external_ref(
        &self,
        external_ref: &str,
        candidate: LedgerEntry,
    ) -> Result<LedgerEntry>;
    /// Entries crediting the given teacher, newest first.
    async fn list_for_payee(&self, teacher: Uuid, page: Page) -> Result<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn get(&self, teacher: Uuid) -> Result<Option<BalanceAccount>>;
    async fn store(&self, account: BalanceAccount) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<BalanceAccount>>;
}

#[async_trait]
pub trait PayoutStore: Send + Sync {
    async fn create(&self, payout: PayoutRequest) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<PayoutRequest>>;
    async fn update(&self, payout: PayoutRequest) -> Result<()>;
    async fn list_for_teacher(&self, teacher: Uuid, page: Page) -> Result<Vec<PayoutRequest>>;
    async fn list_all(&self, page: Page) -> Result<Vec<PayoutRequest>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: Session) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Session>>;
}

/// Verdict returned by the external payment gateway for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifierVerdict {
    Confirmed {
        external_ref: String,
        amount: Decimal,
    },
    Declined {
        reason: String,
    },
}

/// Port to the third-party payment gateway.
///
/// Transport failures surface as `VerifierUnavailable` and must leave the
/// ledger entry pending; only an explicit `Declined` verdict fails it.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, tx_id: &str) -> Result<VerifierVerdict>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type BalanceStoreBox = Box<dyn BalanceStore>;
pub type PayoutStoreBox = Box<dyn PayoutStore>;
pub type SessionStoreBox = Box<dyn SessionStore>;
pub type VerifierBox = Box<dyn PaymentVerifier>;
