use crate::application::locks::KeyedLocks;
use crate::config::SettlementConfig;
use crate::domain::account::{BalanceAccount, PayoutDestination, PayoutMethod};
use crate::domain::money::{Amount, CommissionRate};
use crate::domain::payout::PayoutRequest;
use crate::domain::ports::{BalanceStore, BalanceStoreBox, Page, PayoutStore, PayoutStoreBox};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Teacher withdrawals against the balance account.
///
/// Requesting reserves funds (available -> pending); cancel and reject
/// release them; complete finalizes them into withdrawn. Every balance
/// move runs under the per-teacher lock shared with the settlement
/// orchestrator, so a payout cannot race a concurrent credit.
pub struct PayoutService {
    payouts: PayoutStoreBox,
    balances: BalanceStoreBox,
    config: SettlementConfig,
    account_locks: Arc<KeyedLocks<Uuid>>,
}

impl PayoutService {
    pub fn new(
        payouts: PayoutStoreBox,
        balances: BalanceStoreBox,
        config: SettlementConfig,
        account_locks: Arc<KeyedLocks<Uuid>>,
    ) -> Self {
        Self {
            payouts,
            balances,
            config,
            account_locks,
        }
    }

    pub async fn request(
        &self,
        teacher: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<PayoutRequest> {
        let amount = Amount::new(amount)?.value();
        let _guard = self.account_locks.acquire(teacher).await;

        let mut account = self
            .balances
            .get(teacher)
            .await?
            .ok_or(LedgerError::PayoutMethodNotSet)?;
        if account.payout_method == PayoutMethod::Unset {
            return Err(LedgerError::PayoutMethodNotSet);
        }
        let destination = account
            .destination
            .clone()
            .ok_or(LedgerError::PayoutMethodNotSet)?;
        if amount < self.config.minimum_payout {
            return Err(LedgerError::BelowMinimum {
                requested: amount,
                minimum: self.config.minimum_payout,
            });
        }
        account.reserve(amount)?;

        let payout = PayoutRequest::new(teacher, amount, account.payout_method, destination, note);
        self.balances.store(account).await?;
        self.payouts.create(payout.clone()).await?;
        tracing::info!(payout = %payout.id, %teacher, %amount, "payout requested");
        Ok(payout)
    }

    pub async fn cancel(&self, payout_id: Uuid, requester: Uuid) -> Result<PayoutRequest> {
        let mut payout = self.load(payout_id).await?;
        let _guard = self.account_locks.acquire(payout.teacher).await;
        payout.cancel(requester)?;
        self.release_reservation(&payout).await?;
        self.payouts.update(payout.clone()).await?;
        tracing::info!(payout = %payout.id, "payout cancelled by teacher");
        Ok(payout)
    }

    pub async fn approve(
        &self,
        payout_id: Uuid,
        processor: Uuid,
        note: Option<String>,
    ) -> Result<PayoutRequest> {
        let mut payout = self.load(payout_id).await?;
        let _guard = self.account_locks.acquire(payout.teacher).await;
        payout.approve(processor, note)?;
        self.payouts.update(payout.clone()).await?;
        tracing::info!(payout = %payout.id, %processor, "payout approved");
        Ok(payout)
    }

    pub async fn begin_processing(&self, payout_id: Uuid, processor: Uuid) -> Result<PayoutRequest> {
        let mut payout = self.load(payout_id).await?;
        let _guard = self.account_locks.acquire(payout.teacher).await;
        payout.begin_processing(processor)?;
        self.payouts.update(payout.clone()).await?;
        Ok(payout)
    }

    pub async fn reject(
        &self,
        payout_id: Uuid,
        processor: Uuid,
        note: Option<String>,
    ) -> Result<PayoutRequest> {
        let mut payout = self.load(payout_id).await?;
        let _guard = self.account_locks.acquire(payout.teacher).await;
        payout.reject(processor, note)?;
        self.release_reservation(&payout).await?;
        self.payouts.update(payout.clone()).await?;
        tracing::info!(payout = %payout.id, %processor, "payout rejected");
        Ok(payout)
    }

    pub async fn complete(
        &self,
        payout_id: Uuid,
        processor: Uuid,
        settlement_ref: Option<String>,
        note: Option<String>,
    ) -> Result<PayoutRequest> {
        let mut payout = self.load(payout_id).await?;
        let _guard = self.account_locks.acquire(payout.teacher).await;
        payout.complete(processor, settlement_ref, note)?;

        let mut account = self.account_of(payout.teacher).await?;
        account.finalize(payout.amount)?;
        self.balances.store(account).await?;
        self.payouts.update(payout.clone()).await?;
        tracing::info!(payout = %payout.id, amount = %payout.amount, "payout completed");
        Ok(payout)
    }

    /// Lazily creates the balance account on first settings update.
    pub async fn update_payout_settings(
        &self,
        teacher: Uuid,
        method: PayoutMethod,
        destination: Option<PayoutDestination>,
    ) -> Result<BalanceAccount> {
        let _guard = self.account_locks.acquire(teacher).await;
        let mut account = match self.balances.get(teacher).await? {
            Some(account) => account,
            None => BalanceAccount::new(
                teacher,
                CommissionRate::new(self.config.default_commission_rate)?,
            ),
        };
        account.update_settings(method, destination)?;
        self.balances.store(account.clone()).await?;
        Ok(account)
    }

    pub async fn list_for_teacher(&self, teacher: Uuid, page: Page) -> Result<Vec<PayoutRequest>> {
        self.payouts.list_for_teacher(teacher, page).await
    }

    pub async fn list_all(&self, page: Page) -> Result<Vec<PayoutRequest>> {
        self.payouts.list_all(page).await
    }

    async fn load(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.payouts
            .get(payout_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("payout request {payout_id}")))
    }

    async fn account_of(&self, teacher: Uuid) -> Result<BalanceAccount> {
        self.balances.get(teacher).await?.ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "payout exists for teacher {teacher} but no balance account does"
            ))
        })
    }

    async fn release_reservation(&self, payout: &PayoutRequest) -> Result<()> {
        let mut account = self.account_of(payout.teacher).await?;
        account.release(payout.amount)?;
        self.balances.store(account).await
    }
}
