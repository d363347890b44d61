use crate::domain::account::{PayoutDestination, PayoutMethod};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Approved,
    Processing,
    Completed,
    Rejected,
    Cancelled,
}

impl PayoutStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }
}

/// One teacher withdrawal attempt.
///
/// The payout method and destination are snapshotted at request time so a
/// later settings change cannot redirect an in-flight payout. The reserved
/// amount moves through the balance account alongside the status: request
/// reserves it, cancel/reject release it, complete finalizes it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub teacher: Uuid,
    pub amount: Decimal,
    pub method: PayoutMethod,
    pub destination: PayoutDestination,
    pub status: PayoutStatus,
    pub note: Option<String>,
    pub processor_note: Option<String>,
    pub processor: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub settlement_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn new(
        teacher: Uuid,
        amount: Decimal,
        method: PayoutMethod,
        destination: PayoutDestination,
        note: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher,
            amount,
            method,
            destination,
            status: PayoutStatus::Pending,
            note,
            processor_note: None,
            processor: None,
            processed_at: None,
            settlement_ref: None,
            created_at: Utc::now(),
        }
    }

    /// Teacher-initiated; only while still pending.
    pub fn cancel(&mut self, requester: Uuid) -> Result<()> {
        if requester != self.teacher {
            return Err(LedgerError::Forbidden(format!(
                "payout {} belongs to another teacher",
                self.id
            )));
        }
        self.transition(PayoutStatus::Pending, PayoutStatus::Cancelled)
    }

    pub fn approve(&mut self, processor: Uuid, note: Option<String>) -> Result<()> {
        self.transition(PayoutStatus::Pending, PayoutStatus::Approved)?;
        self.record_processor(processor, note);
        Ok(())
    }

    pub fn begin_processing(&mut self, processor: Uuid) -> Result<()> {
        self.transition(PayoutStatus::Approved, PayoutStatus::Processing)?;
        self.record_processor(processor, None);
        Ok(())
    }

    pub fn reject(&mut self, processor: Uuid, note: Option<String>) -> Result<()> {
        self.transition(PayoutStatus::Pending, PayoutStatus::Rejected)?;
        self.record_processor(processor, note);
        Ok(())
    }

    pub fn complete(
        &mut self,
        processor: Uuid,
        settlement_ref: Option<String>,
        note: Option<String>,
    ) -> Result<()> {
        if !matches!(
            self.status,
            PayoutStatus::Approved | PayoutStatus::Processing
        ) {
            return Err(self.illegal(PayoutStatus::Completed));
        }
        self.status = PayoutStatus::Completed;
        self.settlement_ref = settlement_ref;
        self.record_processor(processor, note);
        Ok(())
    }

    fn transition(&mut self, expected: PayoutStatus, next: PayoutStatus) -> Result<()> {
        if self.status != expected {
            return Err(self.illegal(next));
        }
        self.status = next;
        Ok(())
    }

    fn illegal(&self, next: PayoutStatus) -> LedgerError {
        LedgerError::IllegalTransition(format!(
            "payout {} is {:?}, cannot move to {:?}",
            self.id, self.status, next
        ))
    }

    fn record_processor(&mut self, processor: Uuid, note: Option<String>) {
        self.processor = Some(processor);
        self.processed_at = Some(Utc::now());
        if note.is_some() {
            self.processor_note = note;
        }
    }
}
