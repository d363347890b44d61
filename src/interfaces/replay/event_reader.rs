use crate::domain::account::{PayoutDestination, PayoutMethod};
use crate::domain::ledger::PaymentPurpose;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::BufRead;
use uuid::Uuid;

fn default_method() -> String {
    "gateway".to_string()
}

/// One line of a replay script.
///
/// Events that act on runtime-assigned identifiers (transactions, payout
/// requests) carry a `label`; the runner resolves labels to the ids the
/// services hand back.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    CreateSession {
        session: Uuid,
        student: Uuid,
        teacher: Uuid,
        price: Decimal,
    },
    PayoutSettings {
        teacher: Uuid,
        method: PayoutMethod,
        destination: Option<PayoutDestination>,
    },
    Initiate {
        label: Option<String>,
        payer: Uuid,
        amount: Decimal,
        purpose: PaymentPurpose,
        target: Option<Uuid>,
        payee: Option<Uuid>,
        #[serde(default = "default_method")]
        method: String,
        tx: Option<String>,
    },
    GatewayCallback {
        tx: Option<String>,
        label: Option<String>,
        amount: Decimal,
        external_ref: String,
        #[serde(default)]
        declined: bool,
    },
    SubmitProof {
        session: Uuid,
        payer: Uuid,
        proof: String,
    },
    ConfirmTransfer {
        session: Uuid,
        confirmer: Uuid,
    },
    RequestPayout {
        label: Option<String>,
        teacher: Uuid,
        amount: Decimal,
        note: Option<String>,
    },
    CancelPayout {
        label: String,
        requester: Uuid,
    },
    ApprovePayout {
        label: String,
        processor: Uuid,
        note: Option<String>,
    },
    BeginProcessing {
        label: String,
        processor: Uuid,
    },
    RejectPayout {
        label: String,
        processor: Uuid,
        note: Option<String>,
    },
    CompletePayout {
        label: String,
        processor: Uuid,
        settlement_ref: Option<String>,
        note: Option<String>,
    },
    Refund {
        tx: Option<String>,
        label: Option<String>,
    },
}

/// Streams `ReplayEvent`s from a JSON-lines source, skipping blank lines.
pub struct EventReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    pub fn events(self) -> impl Iterator<Item = Result<ReplayEvent>> {
        self.source
            .lines()
            .map(|line| line.map_err(LedgerError::from))
            .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(|line| {
                let line = line?;
                Ok(serde_json::from_str(&line)?)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_event_stream() {
        let data = concat!(
            r#"{"event":"create_session","session":"11111111-1111-1111-1111-111111111111","student":"22222222-2222-2222-2222-222222222222","teacher":"33333333-3333-3333-3333-333333333333","price":"1000"}"#,
            "\n\n",
            r#"{"event":"submit_proof","session":"11111111-1111-1111-1111-111111111111","payer":"22222222-2222-2222-2222-222222222222","proof":"slip-1"}"#,
            "\n",
        );
        let events: Vec<_> = EventReader::new(data.as_bytes()).events().collect();
        assert_eq!(events.len(), 2);
        match events[0].as_ref().unwrap() {
            ReplayEvent::CreateSession { price, .. } => assert_eq!(*price, dec!(1000)),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            events[1].as_ref().unwrap(),
            ReplayEvent::SubmitProof { .. }
        ));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let data = "{\"event\":\"no_such_event\"}\n";
        let events: Vec<_> = EventReader::new(data.as_bytes()).events().collect();
        assert!(events[0].is_err());
    }
}
