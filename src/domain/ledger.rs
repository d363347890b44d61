use crate::domain::money::{Amount, CommissionBreakdown};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of things a payment can be for.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    CoursePurchase,
    SessionFee,
    Consultation,
    Subscription,
    Donation,
    Other,
}

impl FromStr for PaymentPurpose {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "course_purchase" => Ok(Self::CoursePurchase),
            "session_fee" => Ok(Self::SessionFee),
            "consultation" => Ok(Self::Consultation),
            "subscription" => Ok(Self::Subscription),
            "donation" => Ok(Self::Donation),
            "other" => Ok(Self::Other),
            other => Err(LedgerError::InvalidPurpose(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

/// Terminal verdict for a pending payment.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PaymentOutcome {
    Success,
    Failed,
}

impl PaymentOutcome {
    fn status(self) -> LedgerStatus {
        match self {
            Self::Success => LedgerStatus::Success,
            Self::Failed => LedgerStatus::Failed,
        }
    }
}

/// One recorded payment attempt.
///
/// The transaction id is unique across the store and immutable. Status only
/// moves `pending -> success | failed` and `success -> refunded`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub tx_id: String,
    pub payer: Uuid,
    /// The teacher whose balance this payment credits, when known at
    /// initiation time.
    pub payee: Option<Uuid>,
    pub amount: Decimal,
    pub purpose: PaymentPurpose,
    pub purpose_target: Option<Uuid>,
    pub status: LedgerStatus,
    pub payment_method: String,
    pub external_ref: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Set by the settlement orchestrator when the balance credit is
    /// applied; retries return this instead of recomputing.
    pub breakdown: Option<CommissionBreakdown>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn new(
        tx_id: impl Into<String>,
        payer: Uuid,
        amount: Decimal,
        purpose: PaymentPurpose,
        purpose_target: Option<Uuid>,
        payment_method: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self> {
        let amount = Amount::new(amount)?.value();
        Ok(Self {
            tx_id: tx_id.into(),
            payer,
            payee: None,
            amount,
            purpose,
            purpose_target,
            status: LedgerStatus::Pending,
            payment_method: payment_method.into(),
            external_ref: None,
            metadata,
            breakdown: None,
            created_at: Utc::now(),
            resolved_at: None,
        })
    }

    pub fn generate_tx_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Moves the entry to a terminal outcome.
    ///
    /// Returns `true` if the state changed. Resolving an already-resolved
    /// entry with the same outcome is a no-op (`false`), so duplicate
    /// gateway callbacks are tolerated; a conflicting outcome is an
    /// `IllegalTransition`.
    pub fn resolve(&mut self, outcome: PaymentOutcome, external_ref: Option<String>) -> Result<bool> {
        let target = outcome.status();
        if self.status == target {
            return Ok(false);
        }
        if self.status != LedgerStatus::Pending {
            return Err(LedgerError::IllegalTransition(format!(
                "ledger entry {} is {:?}, cannot move to {:?}",
                self.tx_id, self.status, target
            )));
        }
        self.status = target;
        self.resolved_at = Some(Utc::now());
        if let Some(reference) = external_ref {
            self.external_ref = Some(reference);
        }
        Ok(true)
    }

    /// Administrative refund; only a successful payment can be refunded.
    pub fn refund(&mut self) -> Result<()> {
        if self.status != LedgerStatus::Success {
            return Err(LedgerError::IllegalTransition(format!(
                "ledger entry {} is {:?}, only successful payments can be refunded",
                self.tx_id, self.status
            )));
        }
        self.status = LedgerStatus::Refunded;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry() -> LedgerEntry {
        LedgerEntry::new(
            "tx-1",
            Uuid::new_v4(),
            dec!(100),
            PaymentPurpose::SessionFee,
            None,
            "gateway",
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_entry_is_pending() {
        let entry = entry();
        assert_eq!(entry.status, LedgerStatus::Pending);
        assert!(entry.resolved_at.is_none());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let result = LedgerEntry::new(
            "tx-1",
            Uuid::new_v4(),
            dec!(0),
            PaymentPurpose::Donation,
            None,
            "gateway",
            BTreeMap::new(),
        );
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn test_resolve_success_sets_external_ref() {
        let mut entry = entry();
        let changed = entry
            .resolve(PaymentOutcome::Success, Some("gw-99".into()))
            .unwrap();
        assert!(changed);
        assert_eq!(entry.status, LedgerStatus::Success);
        assert_eq!(entry.external_ref.as_deref(), Some("gw-99"));
        assert!(entry.resolved_at.is_some());
    }

    #[test]
    fn test_resolve_same_outcome_is_noop() {
        let mut entry = entry();
        entry.resolve(PaymentOutcome::Success, None).unwrap();
        let changed = entry.resolve(PaymentOutcome::Success, None).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_resolve_conflicting_outcome_rejected() {
        let mut entry = entry();
        entry.resolve(PaymentOutcome::Success, None).unwrap();
        assert!(matches!(
            entry.resolve(PaymentOutcome::Failed, None),
            Err(LedgerError::IllegalTransition(_))
        ));
    }

    #[test]
    fn test_refund_only_from_success() {
        let mut entry = entry();
        assert!(matches!(
            entry.refund(),
            Err(LedgerError::IllegalTransition(_))
        ));

        entry.resolve(PaymentOutcome::Success, None).unwrap();
        entry.refund().unwrap();
        assert_eq!(entry.status, LedgerStatus::Refunded);

        // Refunded is terminal.
        assert!(matches!(
            entry.resolve(PaymentOutcome::Success, None),
            Err(LedgerError::IllegalTransition(_))
        ));
    }

    #[test]
    fn test_purpose_parsing() {
        assert_eq!(
            "session_fee".parse::<PaymentPurpose>().unwrap(),
            PaymentPurpose::SessionFee
        );
        assert!(matches!(
            "tip_jar".parse::<PaymentPurpose>(),
            Err(LedgerError::InvalidPurpose(_))
        ));
    }
}
