use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Platform-wide settlement parameters.
///
/// Per-account commission-rate overrides live on the balance account; these
/// are the defaults applied when an account is first created.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Commission rate (percent) for newly created balance accounts.
    pub default_commission_rate: Decimal,
    /// Floor for a single payout request.
    pub minimum_payout: Decimal,
    /// Upper bound on a single external-verifier call before the entry is
    /// left pending for retry.
    pub verifier_timeout_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            default_commission_rate: dec!(20),
            minimum_payout: dec!(100),
            verifier_timeout_secs: 10,
        }
    }
}

impl SettlementConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
