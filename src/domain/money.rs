use crate::error::{LedgerError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A positive monetary amount.
///
/// Wrapper around `rust_decimal::Decimal` so transaction amounts can never
/// be zero or negative once constructed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidAmount(value))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Platform commission rate as a percentage, 0 through 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub fn new(percent: Decimal) -> Result<Self> {
        if percent >= Decimal::ZERO && percent <= Decimal::ONE_HUNDRED {
            Ok(Self(percent))
        } else {
            Err(LedgerError::InvalidRate(percent))
        }
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }
}

/// Result of splitting a gross payment into the platform cut and the
/// teacher share.
///
/// The rate in effect at credit time is kept on the breakdown so historical
/// payments are unaffected by later rate changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub gross: Decimal,
    pub commission: Decimal,
    pub teacher_share: Decimal,
    pub rate_used: Decimal,
}

impl CommissionBreakdown {
    /// Splits `gross` according to `rate`. Pure; no storage involved.
    ///
    /// The commission is rounded to two decimal places, midpoint away from
    /// zero; the teacher share is the exact remainder, so
    /// `commission + teacher_share == gross` always holds.
    pub fn split(gross: Decimal, rate: Decimal) -> Result<Self> {
        let gross = Amount::new(gross)?.value();
        let rate = CommissionRate::new(rate)?.percent();

        let commission = (gross * rate / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let teacher_share = gross - commission;

        Ok(Self {
            gross,
            commission,
            teacher_share,
            rate_used: rate,
        })
    }
}
