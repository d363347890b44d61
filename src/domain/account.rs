use crate::domain::money::{Amount, CommissionBreakdown, CommissionRate};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    Unset,
    BankTransfer,
    Paypal,
}

/// Where completed payouts are sent; shape must match the chosen method.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PayoutDestination {
    Bank {
        account_name: String,
        account_number: String,
        bank_name: String,
    },
    Paypal {
        email: String,
    },
}

/// Outcome of applying a credit to a balance account.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CreditOutcome {
    Applied(CommissionBreakdown),
    /// The ledger entry was credited before; balances were not touched.
    AlreadyApplied,
}

/// Per-teacher aggregate of earnings and withdrawable funds.
///
/// Conservation law: `total_earnings == available + pending + withdrawn`
/// after every operation, and no bucket ever goes negative. All mutations
/// must run under the per-teacher lock held by the application layer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BalanceAccount {
    pub teacher: Uuid,
    pub total_earnings: Decimal,
    pub available: Decimal,
    pub pending: Decimal,
    pub withdrawn: Decimal,
    pub commission_rate: CommissionRate,
    pub payout_method: PayoutMethod,
    pub destination: Option<PayoutDestination>,
    /// Ledger entry ids already credited; the idempotency fence against
    /// duplicate callbacks and resumed settlements.
    pub credited_entries: BTreeSet<String>,
}

impl BalanceAccount {
    pub fn new(teacher: Uuid, commission_rate: CommissionRate) -> Self {
        Self {
            teacher,
            total_earnings: Decimal::ZERO,
            available: Decimal::ZERO,
            pending: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
            commission_rate,
            payout_method: PayoutMethod::Unset,
            destination: None,
            credited_entries: BTreeSet::new(),
        }
    }

    /// Credits the teacher share of `gross` to the account, at most once
    /// per ledger entry id.
    pub fn credit(&mut self, entry_id: &str, gross: Decimal) -> Result<CreditOutcome> {
        if self.credited_entries.contains(entry_id) {
            return Ok(CreditOutcome::AlreadyApplied);
        }

        let breakdown = CommissionBreakdown::split(gross, self.commission_rate.percent())?;
        self.total_earnings += breakdown.teacher_share;
        self.available += breakdown.teacher_share;
        self.credited_entries.insert(entry_id.to_string());
        self.check_conservation()?;
        Ok(CreditOutcome::Applied(breakdown))
    }

    /// Moves `amount` from available into pending for an in-flight payout.
    pub fn reserve(&mut self, amount: Decimal) -> Result<()> {
        let amount = Amount::new(amount)?.value();
        if amount > self.available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        self.pending += amount;
        self.check_conservation()
    }

    /// Returns reserved funds to available (payout cancelled or rejected).
    pub fn release(&mut self, amount: Decimal) -> Result<()> {
        let amount = Amount::new(amount)?.value();
        if amount > self.pending {
            return Err(LedgerError::InvariantViolation(format!(
                "release of {} exceeds pending balance {} for teacher {}",
                amount, self.pending, self.teacher
            )));
        }
        self.pending -= amount;
        self.available += amount;
        self.check_conservation()
    }

    /// Moves reserved funds into withdrawn (payout completed).
    pub fn finalize(&mut self, amount: Decimal) -> Result<()> {
        let amount = Amount::new(amount)?.value();
        if amount > self.pending {
            return Err(LedgerError::InvariantViolation(format!(
                "finalize of {} exceeds pending balance {} for teacher {}",
                amount, self.pending, self.teacher
            )));
        }
        self.pending -= amount;
        self.withdrawn += amount;
        self.check_conservation()
    }

    pub fn update_settings(
        &mut self,
        method: PayoutMethod,
        destination: Option<PayoutDestination>,
    ) -> Result<()> {
        match (&method, &destination) {
            (PayoutMethod::Unset, _) => {
                self.payout_method = PayoutMethod::Unset;
                self.destination = None;
                return Ok(());
            }
            (PayoutMethod::BankTransfer, Some(PayoutDestination::Bank { account_number, .. })) => {
                if account_number.trim().is_empty() {
                    return Err(LedgerError::ValidationError(
                        "bank account number is required".to_string(),
                    ));
                }
            }
            (PayoutMethod::Paypal, Some(PayoutDestination::Paypal { email })) => {
                if !email.contains('@') {
                    return Err(LedgerError::ValidationError(
                        "a valid paypal email is required".to_string(),
                    ));
                }
            }
            _ => {
                return Err(LedgerError::ValidationError(
                    "payout destination does not match the chosen method".to_string(),
                ));
            }
        }
        self.payout_method = method;
        self.destination = destination;
        Ok(())
    }

    fn check_conservation(&self) -> Result<()> {
        if self.total_earnings != self.available + self.pending + self.withdrawn
            || self.available < Decimal::ZERO
            || self.pending < Decimal::ZERO
            || self.withdrawn < Decimal::ZERO
        {
            return Err(LedgerError::InvariantViolation(format!(
                "balance account {} out of balance: total={} available={} pending={} withdrawn={}",
                self.teacher, self.total_earnings, self.available, self.pending, self.withdrawn
            )));
        }
        Ok(())
    }
}
