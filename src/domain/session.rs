use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direct-transfer handshake state on a scheduled session.
///
/// `Pending -> PaidAwaitingConfirmation -> Completed`, with `Refunded`
/// reachable from `Completed` by administrative action only. Sessions with
/// no fee start (and stay) at `NotRequired`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    NotRequired,
    Pending,
    PaidAwaitingConfirmation,
    Completed,
    Refunded,
}

/// A scheduled paid session between one student and one teacher.
///
/// Only the payment fields live here; scheduling, rooms and summaries are
/// someone else's problem. Payment fields are mutated exclusively through
/// the settlement orchestrator.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Session {
    pub id: Uuid,
    pub student: Uuid,
    pub teacher: Uuid,
    pub price: Decimal,
    pub is_paid: bool,
    pub payment_status: SessionPaymentStatus,
    pub payment_proof: Option<String>,
    pub payment_confirmed_by: Option<Uuid>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    /// Ledger entry that settled this session, once one exists.
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: Uuid, student: Uuid, teacher: Uuid, price: Decimal) -> Self {
        let payment_status = if price > Decimal::ZERO {
            SessionPaymentStatus::Pending
        } else {
            SessionPaymentStatus::NotRequired
        };
        Self {
            id,
            student,
            teacher,
            price,
            is_paid: false,
            payment_status,
            payment_proof: None,
            payment_confirmed_by: None,
            payment_confirmed_at: None,
            payment_id: None,
            created_at: Utc::now(),
        }
    }

    /// Student submits an out-of-band proof of payment.
    pub fn submit_proof(&mut self, payer: Uuid, proof: impl Into<String>) -> Result<()> {
        if payer != self.student {
            return Err(LedgerError::Forbidden(format!(
                "only the booked student may submit payment proof for session {}",
                self.id
            )));
        }
        if self.payment_status != SessionPaymentStatus::Pending {
            return Err(LedgerError::IllegalTransition(format!(
                "session {} payment is {:?}, proof can only be submitted while pending",
                self.id, self.payment_status
            )));
        }
        self.payment_status = SessionPaymentStatus::PaidAwaitingConfirmation;
        self.payment_proof = Some(proof.into());
        Ok(())
    }

    /// Marks the session settled against `tx_id`.
    ///
    /// Idempotent when the session is already completed with the same
    /// ledger entry, so a resumed settlement converges.
    pub fn mark_paid(&mut self, confirmed_by: Uuid, tx_id: &str) -> Result<()> {
        if self.payment_status == SessionPaymentStatus::Completed {
            if self.payment_id.as_deref() == Some(tx_id) {
                return Ok(());
            }
            return Err(LedgerError::IllegalTransition(format!(
                "session {} is already settled by another payment",
                self.id
            )));
        }
        if matches!(
            self.payment_status,
            SessionPaymentStatus::NotRequired | SessionPaymentStatus::Refunded
        ) {
            return Err(LedgerError::IllegalTransition(format!(
                "session {} payment is {:?} and cannot be settled",
                self.id, self.payment_status
            )));
        }
        self.payment_status = SessionPaymentStatus::Completed;
        self.is_paid = true;
        self.payment_confirmed_by = Some(confirmed_by);
        self.payment_confirmed_at = Some(Utc::now());
        self.payment_id = Some(tx_id.to_string());
        Ok(())
    }

    /// Administrative companion to a ledger refund.
    pub fn mark_refunded(&mut self) -> Result<()> {
        if self.payment_status != SessionPaymentStatus::Completed {
            return Err(LedgerError::IllegalTransition(format!(
                "session {} payment is {:?}, only completed payments can be refunded",
                self.id, self.payment_status
            )));
        }
        self.payment_status = SessionPaymentStatus::Refunded;
        self.is_paid = false;
        Ok(())
    }

    pub fn awaiting_confirmation(&self) -> bool {
        self.payment_status == SessionPaymentStatus::PaidAwaitingConfirmation
    }
}
