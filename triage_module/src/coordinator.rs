use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const COORDINATOR_MANAGER: &str = "coordinator";

/// Proposed action kinds the assistant can hand to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "gmail.createDraft")]
    GmailCreateDraft,
    #[serde(rename = "google-calendar.createEvent")]
    GoogleCalendarCreateEvent,
    #[serde(rename = "billing.queueRefund")]
    BillingQueueRefund,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::GmailCreateDraft,
        ActionKind::GoogleCalendarCreateEvent,
        ActionKind::BillingQueueRefund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::GmailCreateDraft => "gmail.createDraft",
            ActionKind::GoogleCalendarCreateEvent => "google-calendar.createEvent",
            ActionKind::BillingQueueRefund => "billing.queueRefund",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported action kind: {0}")]
pub struct ActionKindParseError(pub String);

impl FromStr for ActionKind {
    type Err = ActionKindParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ActionKindParseError(value.to_string()))
    }
}

/// Canned assignment of a proposed action to a downstream worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub manager: String,
    pub worker: String,
    pub confidence: f64,
    pub objective: String,
}

impl DelegationRecord {
    fn new(worker: &str, confidence: f64, objective: &str) -> Self {
        Self {
            manager: COORDINATOR_MANAGER.to_string(),
            worker: worker.to_string(),
            confidence,
            objective: objective.to_string(),
        }
    }
}

/// Pick the worker for an action kind.
///
/// The message is accepted for parity with real coordinators but does not
/// influence the decision.
pub fn delegate(kind: ActionKind, _message: &str) -> DelegationRecord {
    match kind {
        ActionKind::GoogleCalendarCreateEvent => DelegationRecord::new(
            "calendar-worker",
            0.88,
            "Prepare scheduling proposal with attendee resolution.",
        ),
        ActionKind::BillingQueueRefund => DelegationRecord::new(
            "billing-worker",
            0.92,
            "Prepare refund proposal with safe confirmation policy.",
        ),
        ActionKind::GmailCreateDraft => DelegationRecord::new(
            "gmail-worker",
            0.9,
            "Prepare concise email draft proposal.",
        ),
    }
}
