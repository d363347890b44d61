use crate::domain::account::BalanceAccount;
use crate::domain::ledger::LedgerEntry;
use crate::domain::payout::PayoutRequest;
use crate::domain::ports::{BalanceStore, LedgerStore, Page, PayoutStore, SessionStore};
use crate::domain::session::Session;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for ledger entries, keyed by transaction id.
pub const CF_LEDGER: &str = "ledger";
/// Column Family mapping external references to transaction ids.
pub const CF_LEDGER_REFS: &str = "ledger_refs";
/// Column Family for balance accounts, keyed by teacher id.
pub const CF_BALANCES: &str = "balances";
/// Column Family for payout requests.
pub const CF_PAYOUTS: &str = "payouts";
/// Column Family for sessions.
pub const CF_SESSIONS: &str = "sessions";

/// A persistent store implementation using RocksDB.
///
/// One database backs all four store ports, each entity type in its own
/// column family. `Clone` shares the underlying `Arc<DB>`. Check-and-insert
/// operations (`create`, `find_or_create_by_external_ref`) serialize on a
/// store-level mutex since RocksDB point writes alone cannot express them
/// atomically.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [
            CF_LEDGER,
            CF_LEDGER_REFS,
            CF_BALANCES,
            CF_PAYOUTS,
            CF_SESSIONS,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;
        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::Internal(Box::new(std::io::Error::other(format!(
                "column family {name} not found"
            ))))
        })
    }

    fn put<V: Serialize>(&self, cf_name: &str, key: &[u8], value: &V) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(&cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn read<V: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<V>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<V: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<V>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

fn paginate<T>(mut rows: Vec<T>, page: Page) -> Vec<T> {
    if page.offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..page.offset);
    rows.truncate(page.limit);
    rows
}

#[async_trait]
impl LedgerStore for RocksDbStore {
    async fn create(&self, entry: LedgerEntry) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        if self
            .read::<LedgerEntry>(CF_LEDGER, entry.tx_id.as_bytes())?
            .is_some()
        {
            return Err(LedgerError::DuplicateTransaction(entry.tx_id));
        }
        if let Some(reference) = &entry.external_ref {
            self.put(CF_LEDGER_REFS, reference.as_bytes(), &entry.tx_id)?;
        }
        self.put(CF_LEDGER, entry.tx_id.as_bytes(), &entry)
    }

    async fn get(&self, tx_id: &str) -> Result<Option<LedgerEntry>> {
        self.read(CF_LEDGER, tx_id.as_bytes())
    }

    async fn update(&self, entry: LedgerEntry) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        if self
            .read::<LedgerEntry>(CF_LEDGER, entry.tx_id.as_bytes())?
            .is_none()
        {
            return Err(LedgerError::NotFound(format!("ledger entry {}", entry.tx_id)));
        }
        if let Some(reference) = &entry.external_ref {
            self.put(CF_LEDGER_REFS, reference.as_bytes(), &entry.tx_id)?;
        }
        self.put(CF_LEDGER, entry.tx_id.as_bytes(), &entry)
    }

    async fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        match self.read::<String>(CF_LEDGER_REFS, external_ref.as_bytes())? {
            Some(tx_id) => self.read(CF_LEDGER, tx_id.as_bytes()),
            None => Ok(None),
        }
    }

    async fn find_or_create_by_external_ref(
        &self,
        external_ref: &str,
        candidate: LedgerEntry,
    ) -> Result<LedgerEntry> {
        let _gate = self.write_gate.lock().await;
        if let Some(tx_id) = self.read::<String>(CF_LEDGER_REFS, external_ref.as_bytes())?
            && let Some(existing) = self.read::<LedgerEntry>(CF_LEDGER, tx_id.as_bytes())?
        {
            return Ok(existing);
        }
        self.put(CF_LEDGER_REFS, external_ref.as_bytes(), &candidate.tx_id)?;
        self.put(CF_LEDGER, candidate.tx_id.as_bytes(), &candidate)?;
        Ok(candidate)
    }

    async fn list_for_payee(&self, teacher: Uuid, page: Page) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .scan::<LedgerEntry>(CF_LEDGER)?
            .into_iter()
            .filter(|entry| entry.payee == Some(teacher))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(entries, page))
    }
}

#[async_trait]
impl BalanceStore for RocksDbStore {
    async fn get(&self, teacher: Uuid) -> Result<Option<BalanceAccount>> {
        self.read(CF_BALANCES, teacher.as_bytes())
    }

    async fn store(&self, account: BalanceAccount) -> Result<()> {
        self.put(CF_BALANCES, account.teacher.as_bytes().as_slice(), &account)
    }

    async fn get_all(&self) -> Result<Vec<BalanceAccount>> {
        let mut accounts = self.scan::<BalanceAccount>(CF_BALANCES)?;
        accounts.sort_by_key(|account| account.teacher);
        Ok(accounts)
    }
}

#[async_trait]
impl PayoutStore for RocksDbStore {
    async fn create(&self, payout: PayoutRequest) -> Result<()> {
        self.put(CF_PAYOUTS, payout.id.as_bytes().as_slice(), &payout)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PayoutRequest>> {
        self.read(CF_PAYOUTS, id.as_bytes())
    }

    async fn update(&self, payout: PayoutRequest) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        if self
            .read::<PayoutRequest>(CF_PAYOUTS, payout.id.as_bytes())?
            .is_none()
        {
            return Err(LedgerError::NotFound(format!("payout request {}", payout.id)));
        }
        self.put(CF_PAYOUTS, payout.id.as_bytes().as_slice(), &payout)
    }

    async fn list_for_teacher(&self, teacher: Uuid, page: Page) -> Result<Vec<PayoutRequest>> {
        let mut rows: Vec<PayoutRequest> = self
            .scan::<PayoutRequest>(CF_PAYOUTS)?
            .into_iter()
            .filter(|payout| payout.teacher == teacher)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn list_all(&self, page: Page) -> Result<Vec<PayoutRequest>> {
        let mut rows = self.scan::<PayoutRequest>(CF_PAYOUTS)?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl SessionStore for RocksDbStore {
    async fn store(&self, session: Session) -> Result<()> {
        self.put(CF_SESSIONS, session.id.as_bytes().as_slice(), &session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        self.read(CF_SESSIONS, id.as_bytes())
    }
}
