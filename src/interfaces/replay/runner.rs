use crate::application::payouts::PayoutService;
use crate::application::settlement::SettlementOrchestrator;
use crate::domain::ports::{SessionStore, SessionStoreBox, VerifierVerdict};
use crate::domain::session::Session;
use crate::error::{LedgerError, Result};
use crate::infrastructure::gateway::ScriptedVerifier;
use crate::interfaces::replay::event_reader::{EventReader, ReplayEvent};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use uuid::Uuid;

/// Applies a replay script against the live services.
///
/// Business-rule failures are logged and counted, never fatal: a replay is
/// expected to contain rejected payouts and declined payments.
pub struct ReplayRunner {
    settlement: SettlementOrchestrator,
    payouts: PayoutService,
    sessions: SessionStoreBox,
    verifier: ScriptedVerifier,
    tx_labels: HashMap<String, String>,
    payout_labels: HashMap<String, Uuid>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub failed: usize,
}

impl ReplayRunner {
    pub fn new(
        settlement: SettlementOrchestrator,
        payouts: PayoutService,
        sessions: SessionStoreBox,
        verifier: ScriptedVerifier,
    ) -> Self {
        Self {
            settlement,
            payouts,
            sessions,
            verifier,
            tx_labels: HashMap::new(),
            payout_labels: HashMap::new(),
        }
    }

    pub async fn run<R: BufRead>(&mut self, reader: EventReader<R>) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for (line_no, event) in reader.events().enumerate() {
            let event = event?;
            match self.apply(event).await {
                Ok(()) => summary.applied += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(line = line_no + 1, %err, "replay event rejected");
                }
            }
        }
        Ok(summary)
    }

    pub async fn apply(&mut self, event: ReplayEvent) -> Result<()> {
        match event {
            ReplayEvent::CreateSession {
                session,
                student,
                teacher,
                price,
            } => {
                self.sessions
                    .store(Session::new(session, student, teacher, price))
                    .await
            }
            ReplayEvent::PayoutSettings {
                teacher,
                method,
                destination,
            } => {
                self.payouts
                    .update_payout_settings(teacher, method, destination)
                    .await?;
                Ok(())
            }
            ReplayEvent::Initiate {
                label,
                payer,
                amount,
                purpose,
                target,
                payee,
                method,
                tx,
            } => {
                let (entry, _instructions) = self
                    .settlement
                    .initiate(payer, amount, purpose, target, payee, &method, tx, BTreeMap::new())
                    .await?;
                if let Some(label) = label {
                    self.tx_labels.insert(label, entry.tx_id);
                }
                Ok(())
            }
            ReplayEvent::GatewayCallback {
                tx,
                label,
                amount,
                external_ref,
                declined,
            } => {
                let tx_id = self.resolve_tx(tx, label)?;
                let verdict = if declined {
                    VerifierVerdict::Declined {
                        reason: "declined by gateway".to_string(),
                    }
                } else {
                    VerifierVerdict::Confirmed {
                        external_ref: external_ref.clone(),
                        amount,
                    }
                };
                self.verifier.script(tx_id.clone(), verdict).await;
                self.settlement
                    .handle_gateway_callback(&tx_id, amount, &external_ref)
                    .await?;
                Ok(())
            }
            ReplayEvent::SubmitProof {
                session,
                payer,
                proof,
            } => self.settlement.submit_proof(session, payer, &proof).await,
            ReplayEvent::ConfirmTransfer { session, confirmer } => {
                self.settlement
                    .confirm_via_manual_handshake(session, confirmer)
                    .await?;
                Ok(())
            }
            ReplayEvent::RequestPayout {
                label,
                teacher,
                amount,
                note,
            } => {
                let payout = self.payouts.request(teacher, amount, note).await?;
                if let Some(label) = label {
                    self.payout_labels.insert(label, payout.id);
                }
                Ok(())
            }
            ReplayEvent::CancelPayout { label, requester } => {
                let id = self.resolve_payout(&label)?;
                self.payouts.cancel(id, requester).await?;
                Ok(())
            }
            ReplayEvent::ApprovePayout {
                label,
                processor,
                note,
            } => {
                let id = self.resolve_payout(&label)?;
                self.payouts.approve(id, processor, note).await?;
                Ok(())
            }
            ReplayEvent::BeginProcessing { label, processor } => {
                let id = self.resolve_payout(&label)?;
                self.payouts.begin_processing(id, processor).await?;
                Ok(())
            }
            ReplayEvent::RejectPayout {
                label,
                processor,
                note,
            } => {
                let id = self.resolve_payout(&label)?;
                self.payouts.reject(id, processor, note).await?;
                Ok(())
            }
            ReplayEvent::CompletePayout {
                label,
                processor,
                settlement_ref,
                note,
            } => {
                let id = self.resolve_payout(&label)?;
                self.payouts
                    .complete(id, processor, settlement_ref, note)
                    .await?;
                Ok(())
            }
            ReplayEvent::Refund { tx, label } => {
                let tx_id = self.resolve_tx(tx, label)?;
                self.settlement.refund(&tx_id).await?;
                Ok(())
            }
        }
    }

    fn resolve_tx(&self, tx: Option<String>, label: Option<String>) -> Result<String> {
        if let Some(tx) = tx {
            return Ok(tx);
        }
        let label = label.ok_or_else(|| {
            LedgerError::ValidationError("event needs either a tx id or a label".to_string())
        })?;
        self.tx_labels.get(&label).cloned().ok_or_else(|| {
            LedgerError::ValidationError(format!("unknown transaction label {label}"))
        })
    }

    fn resolve_payout(&self, label: &str) -> Result<Uuid> {
        self.payout_labels
            .get(label)
            .copied()
            .ok_or_else(|| LedgerError::ValidationError(format!("unknown payout label {label}")))
    }
}
