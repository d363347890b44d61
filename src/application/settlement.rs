use crate::application::locks::KeyedLocks;
use crate::config::SettlementConfig;
use crate::domain::account::{BalanceAccount, CreditOutcome};
use crate::domain::ledger::{LedgerEntry, LedgerStatus, PaymentOutcome, PaymentPurpose};
use crate::domain::money::CommissionRate;
use crate::domain::ports::{
    BalanceStore, BalanceStoreBox, LedgerStore, LedgerStoreBox, Page, PaymentVerifier,
    SessionStore, SessionStoreBox, VerifierBox, VerifierVerdict,
};
use crate::domain::session::{Session, SessionPaymentStatus};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Routing data handed back to the payer after initiating a payment.
/// Opaque to this engine; whatever the gateway front end needs.
#[derive(Debug, Clone)]
pub struct PaymentInstructions {
    pub tx_id: String,
    pub amount: Decimal,
    pub payment_method: String,
}

/// Drives a ledger entry from pending to a terminal status and, on
/// success, runs the single credit path: balance account credit plus
/// consuming-entity update.
///
/// There is no cross-store transaction here. Every step checks current
/// state before mutating and is safe to re-apply, so a settlement
/// interrupted between the ledger write, the account credit and the
/// session update converges when retried. Lock order is always ledger
/// entry first, then balance account.
pub struct SettlementOrchestrator {
    ledger: LedgerStoreBox,
    balances: BalanceStoreBox,
    sessions: SessionStoreBox,
    verifier: VerifierBox,
    config: SettlementConfig,
    account_locks: Arc<KeyedLocks<Uuid>>,
    entry_locks: KeyedLocks<String>,
}

impl SettlementOrchestrator {
    pub fn new(
        ledger: LedgerStoreBox,
        balances: BalanceStoreBox,
        sessions: SessionStoreBox,
        verifier: VerifierBox,
        config: SettlementConfig,
        account_locks: Arc<KeyedLocks<Uuid>>,
    ) -> Self {
        Self {
            ledger,
            balances,
            sessions,
            verifier,
            config,
            account_locks,
            entry_locks: KeyedLocks::new(),
        }
    }

    /// Records a pending payment and returns gateway routing data.
    ///
    /// `tx_id` may be caller-supplied (gateway SDKs often assign it) or
    /// left to the store; a duplicate id is rejected, never overwritten.
    /// For non-session purposes the payee must be passed explicitly; a
    /// session fee derives it from the target session.
    #[allow(clippy::too_many_arguments)]
    pub async fn initiate(
        &self,
        payer: Uuid,
        amount: Decimal,
        purpose: PaymentPurpose,
        purpose_target: Option<Uuid>,
        payee: Option<Uuid>,
        payment_method: &str,
        tx_id: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(LedgerEntry, PaymentInstructions)> {
        let payee = if purpose == PaymentPurpose::SessionFee {
            let session_id = purpose_target.ok_or_else(|| {
                LedgerError::ValidationError("a session fee needs a target session".to_string())
            })?;
            let session = self.load_session(session_id).await?;
            if session.student != payer {
                return Err(LedgerError::Forbidden(format!(
                    "session {session_id} is not booked by this payer"
                )));
            }
            if session.payment_status != SessionPaymentStatus::Pending {
                return Err(LedgerError::IllegalTransition(format!(
                    "session {session_id} payment is {:?}, not payable",
                    session.payment_status
                )));
            }
            if session.price != amount {
                return Err(LedgerError::ValidationError(format!(
                    "session {session_id} costs {}, got {amount}",
                    session.price
                )));
            }
            Some(session.teacher)
        } else {
            payee
        };

        let tx_id = tx_id.unwrap_or_else(LedgerEntry::generate_tx_id);
        let mut entry = LedgerEntry::new(
            tx_id,
            payer,
            amount,
            purpose,
            purpose_target,
            payment_method,
            metadata,
        )?;
        entry.payee = payee;
        self.ledger.create(entry.clone()).await?;
        tracing::info!(tx_id = %entry.tx_id, %amount, ?purpose, "payment initiated");

        let instructions = PaymentInstructions {
            tx_id: entry.tx_id.clone(),
            amount,
            payment_method: payment_method.to_string(),
        };
        Ok((entry, instructions))
    }

    /// Asks the external verifier for a verdict and settles accordingly.
    ///
    /// A transport failure or timeout leaves the entry pending and
    /// surfaces `VerifierUnavailable`; the caller retries later. Calling
    /// this on an already-successful entry re-drives the credit path
    /// idempotently and returns the entry.
    pub async fn confirm_via_verifier(&self, tx_id: &str) -> Result<LedgerEntry> {
        let _guard = self.entry_locks.acquire(tx_id.to_string()).await;
        let mut entry = self
            .ledger
            .get(tx_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("ledger entry {tx_id}")))?;

        match entry.status {
            LedgerStatus::Success => {
                // A crash may have left the credit or session update
                // behind; finish the job.
                let payer = entry.payer;
                self.settle_success(&mut entry, payer).await?;
                return Ok(entry);
            }
            LedgerStatus::Failed | LedgerStatus::Refunded => return Ok(entry),
            LedgerStatus::Pending => {}
        }

        let timeout = Duration::from_secs(self.config.verifier_timeout_secs);
        let verdict = tokio::time::timeout(timeout, self.verifier.verify(tx_id))
            .await
            .map_err(|_| {
                LedgerError::VerifierUnavailable(format!(
                    "verifier did not answer for {tx_id} within {}s",
                    self.config.verifier_timeout_secs
                ))
            })??;

        match verdict {
            VerifierVerdict::Declined { reason } => {
                entry.resolve(PaymentOutcome::Failed, None)?;
                self.ledger.update(entry.clone()).await?;
                tracing::info!(%tx_id, %reason, "payment declined by verifier");
                Ok(entry)
            }
            VerifierVerdict::Confirmed {
                external_ref,
                amount,
            } => {
                if amount != entry.amount {
                    tracing::warn!(
                        %tx_id,
                        expected = %entry.amount,
                        reported = %amount,
                        "verifier amount mismatch, entry left pending"
                    );
                    return Err(LedgerError::ValidationError(format!(
                        "verifier reported {amount} for {tx_id}, expected {}",
                        entry.amount
                    )));
                }
                entry.resolve(PaymentOutcome::Success, Some(external_ref))?;
                self.ledger.update(entry.clone()).await?;
                let payer = entry.payer;
                self.settle_success(&mut entry, payer).await?;
                Ok(entry)
            }
        }
    }

    /// Gateway-originated callback edge. Unauthenticated, so the claimed
    /// amount is checked against the stored entry before anything is
    /// trusted, and the verdict still comes from the verifier itself.
    pub async fn handle_gateway_callback(
        &self,
        tx_id: &str,
        claimed_amount: Decimal,
        claimed_ref: &str,
    ) -> Result<LedgerEntry> {
        let entry = self
            .ledger
            .get(tx_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("ledger entry {tx_id}")))?;
        if entry.amount != claimed_amount {
            tracing::warn!(
                %tx_id,
                %claimed_ref,
                claimed = %claimed_amount,
                recorded = %entry.amount,
                "callback amount disagrees with ledger entry"
            );
            return Err(LedgerError::ValidationError(format!(
                "callback for {tx_id} claims {claimed_amount}, ledger has {}",
                entry.amount
            )));
        }
        self.confirm_via_verifier(tx_id).await
    }

    /// Student submits an out-of-band proof of payment for a session.
    pub async fn submit_proof(
        &self,
        session_id: Uuid,
        payer: Uuid,
        proof: &str,
    ) -> Result<()> {
        let mut session = self.load_session(session_id).await?;
        session.submit_proof(payer, proof)?;
        self.sessions.store(session).await?;
        tracing::info!(%session_id, "payment proof submitted");
        Ok(())
    }

    /// Direct-transfer confirmation: the teacher vouches for the payment
    /// proof, and the same credit path runs as for a verified gateway
    /// payment.
    ///
    /// The ledger entry is located or created by the proof reference, in
    /// its own `manual:` namespace so a pasted gateway reference can never
    /// collide with a real gateway transaction.
    pub async fn confirm_via_manual_handshake(
        &self,
        session_id: Uuid,
        confirmer: Uuid,
    ) -> Result<LedgerEntry> {
        let session = self.load_session(session_id).await?;
        if confirmer != session.teacher {
            return Err(LedgerError::Forbidden(format!(
                "only the session teacher may confirm payment for {session_id}"
            )));
        }
        if !session.awaiting_confirmation() {
            return Err(LedgerError::IllegalTransition(format!(
                "session {session_id} payment is {:?}, expected paid_awaiting_confirmation",
                session.payment_status
            )));
        }
        let proof = session.payment_proof.clone().ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "session {session_id} awaits confirmation but has no payment proof"
            ))
        })?;
        let external_ref = format!("manual:{proof}");

        let mut candidate = LedgerEntry::new(
            LedgerEntry::generate_tx_id(),
            session.student,
            session.price,
            PaymentPurpose::SessionFee,
            Some(session.id),
            "direct_transfer",
            BTreeMap::from([("proof".to_string(), proof)]),
        )?;
        candidate.payee = Some(session.teacher);
        candidate.external_ref = Some(external_ref.clone());

        let entry = self
            .ledger
            .find_or_create_by_external_ref(&external_ref, candidate)
            .await?;

        let _guard = self.entry_locks.acquire(entry.tx_id.clone()).await;
        // Re-read under the lock: a concurrent confirmation may have
        // resolved the entry between lookup and lock acquisition.
        let mut entry = self
            .ledger
            .get(&entry.tx_id)
            .await?
            .unwrap_or(entry);

        if entry.status == LedgerStatus::Pending {
            entry.resolve(PaymentOutcome::Success, None)?;
            self.ledger.update(entry.clone()).await?;
        } else if entry.status != LedgerStatus::Success {
            return Err(LedgerError::IllegalTransition(format!(
                "ledger entry {} for proof is {:?}",
                entry.tx_id, entry.status
            )));
        }
        self.settle_success(&mut entry, confirmer).await?;
        tracing::info!(%session_id, tx_id = %entry.tx_id, "direct transfer confirmed");
        Ok(entry)
    }

    /// Administrative refund. The ledger entry and the session are marked
    /// refunded; credited earnings are not clawed back, compensation is an
    /// out-of-band concern.
    pub async fn refund(&self, tx_id: &str) -> Result<LedgerEntry> {
        let _guard = self.entry_locks.acquire(tx_id.to_string()).await;
        let mut entry = self
            .ledger
            .get(tx_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("ledger entry {tx_id}")))?;
        entry.refund()?;
        self.ledger.update(entry.clone()).await?;

        if entry.purpose == PaymentPurpose::SessionFee
            && let Some(session_id) = entry.purpose_target
            && let Some(mut session) = self.sessions.get(session_id).await?
            && session.payment_status == SessionPaymentStatus::Completed
        {
            session.mark_refunded()?;
            self.sessions.store(session).await?;
        }
        tracing::warn!(%tx_id, "payment refunded");
        Ok(entry)
    }

    pub async fn balance_of(&self, teacher: Uuid) -> Result<BalanceAccount> {
        match self.balances.get(teacher).await? {
            Some(account) => Ok(account),
            None => Ok(BalanceAccount::new(teacher, self.default_rate()?)),
        }
    }

    pub async fn earnings_history(&self, teacher: Uuid, page: Page) -> Result<Vec<LedgerEntry>> {
        self.ledger.list_for_payee(teacher, page).await
    }

    /// The single credit path shared by gateway and manual settlement.
    ///
    /// Assumes the entry is `Success` and the per-entry lock is held.
    /// Credits the payee account (at most once per entry) and marks the
    /// target session paid; both halves are no-ops when already done.
    async fn settle_success(&self, entry: &mut LedgerEntry, confirmer: Uuid) -> Result<()> {
        if let Some(teacher) = entry.payee {
            let _account_guard = self.account_locks.acquire(teacher).await;
            let mut account = match self.balances.get(teacher).await? {
                Some(account) => account,
                None => BalanceAccount::new(teacher, self.default_rate()?),
            };
            match account.credit(&entry.tx_id, entry.amount)? {
                CreditOutcome::Applied(breakdown) => {
                    self.balances.store(account).await?;
                    entry.breakdown = Some(breakdown);
                    self.ledger.update(entry.clone()).await?;
                    tracing::info!(
                        tx_id = %entry.tx_id,
                        %teacher,
                        share = %breakdown.teacher_share,
                        commission = %breakdown.commission,
                        "balance credited"
                    );
                }
                CreditOutcome::AlreadyApplied => {}
            }
        } else {
            tracing::debug!(tx_id = %entry.tx_id, "payment has no payee, platform keeps gross");
        }

        if entry.purpose == PaymentPurpose::SessionFee
            && let Some(session_id) = entry.purpose_target
        {
            let mut session = self.load_session(session_id).await?;
            if !session.is_paid || session.payment_id.as_deref() != Some(&entry.tx_id) {
                session.mark_paid(confirmer, &entry.tx_id)?;
                self.sessions.store(session).await?;
            }
        }
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> Result<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("session {session_id}")))
    }

    fn default_rate(&self) -> Result<CommissionRate> {
        CommissionRate::new(self.config.default_commission_rate)
    }
}
