use crate::domain::ports::{PaymentVerifier, VerifierVerdict};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Verifier fed with pre-recorded verdicts, keyed by transaction id.
///
/// Backs the event-replay front end (each gateway callback event carries
/// its verdict) and the test suites. Unknown transactions behave like a
/// gateway outage.
#[derive(Default, Clone)]
pub struct ScriptedVerifier {
    verdicts: Arc<RwLock<HashMap<String, VerifierVerdict>>>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, tx_id: impl Into<String>, verdict: VerifierVerdict) {
        let mut verdicts = self.verdicts.write().await;
        verdicts.insert(tx_id.into(), verdict);
    }
}

#[async_trait]
impl PaymentVerifier for ScriptedVerifier {
    async fn verify(&self, tx_id: &str) -> Result<VerifierVerdict> {
        let verdicts = self.verdicts.read().await;
        verdicts.get(tx_id).cloned().ok_or_else(|| {
            LedgerError::VerifierUnavailable(format!("no gateway record for {tx_id}"))
        })
    }
}

/// A gateway that is always down. Useful for exercising the
/// left-pending-for-retry behaviour.
#[derive(Default, Clone, Copy)]
pub struct OfflineVerifier;

#[async_trait]
impl PaymentVerifier for OfflineVerifier {
    async fn verify(&self, tx_id: &str) -> Result<VerifierVerdict> {
        Err(LedgerError::VerifierUnavailable(format!(
            "gateway unreachable while verifying {tx_id}"
        )))
    }
}
