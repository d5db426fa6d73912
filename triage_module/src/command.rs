//! Turn a free-text command into a proposed action.
//!
//! Classification is keyword based; payload builders fill in defaults so a
//! proposal is always well-formed even for terse commands.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::coordinator::ActionKind;

const MAX_MESSAGE_CHARS: usize = 5000;
const MAX_TITLE_CHARS: usize = 300;
const MAX_DRAFT_RECIPIENTS: usize = 20;
const MAX_EVENT_ATTENDEES: usize = 50;
const DEFAULT_DRAFT_RECIPIENT: &str = "team@nyte.ai";
const DEFAULT_REFUND_CUSTOMER: &str = "customer@nyte.ai";
const REFUND_CURRENCY: &str = "USD";

// Word boundaries and letter classes are ASCII-only.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("email pattern")
});

static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\s*([0-9]+(?:\.[0-9]{1,2})?)").expect("amount pattern")
});

static CALENDAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\b(schedule|meeting|event|invite|calendar)\b").expect("calendar pattern")
});

static REFUND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)\b(refund|credit|reimburse|chargeback)\b").expect("refund pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ToolCallPayload {
    #[serde(rename = "gmail.createDraft")]
    GmailCreateDraft {
        to: Vec<String>,
        subject: String,
        body: String,
    },
    #[serde(rename = "google-calendar.createEvent", rename_all = "camelCase")]
    GoogleCalendarCreateEvent {
        title: String,
        starts_at: String,
        ends_at: String,
        attendees: Vec<String>,
        description: String,
    },
    #[serde(rename = "billing.queueRefund", rename_all = "camelCase")]
    BillingQueueRefund {
        customer_name: String,
        amount: f64,
        currency: String,
        reason: String,
    },
}

impl ToolCallPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ToolCallPayload::GmailCreateDraft { .. } => ActionKind::GmailCreateDraft,
            ToolCallPayload::GoogleCalendarCreateEvent { .. } => ActionKind::GoogleCalendarCreateEvent,
            ToolCallPayload::BillingQueueRefund { .. } => ActionKind::BillingQueueRefund,
        }
    }
}

/// Calendar words win over refund words; everything else becomes a draft.
pub fn classify_command(message: &str) -> ActionKind {
    let lower = message.to_lowercase();
    if CALENDAR_PATTERN.is_match(&lower) {
        return ActionKind::GoogleCalendarCreateEvent;
    }
    if REFUND_PATTERN.is_match(&lower) {
        return ActionKind::BillingQueueRefund;
    }
    ActionKind::GmailCreateDraft
}

pub fn normalize_message(message: &str) -> String {
    let compact = message.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&compact, MAX_MESSAGE_CHARS)
}

/// Lowercased addresses in order of appearance, deduplicated, at most `limit`.
pub fn extract_emails(message: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut emails = Vec::new();
    for found in EMAIL_PATTERN.find_iter(message) {
        if emails.len() >= limit {
            break;
        }
        let email = found.as_str().to_lowercase();
        if seen.insert(email.clone()) {
            emails.push(email);
        }
    }
    emails
}

pub fn parse_amount(message: &str) -> f64 {
    AMOUNT_PATTERN
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|value| value.as_str().parse::<f64>().ok())
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
        .unwrap_or(0.0)
}

pub fn build_default_payload(kind: ActionKind, message: &str, now: DateTime<Utc>) -> ToolCallPayload {
    match kind {
        ActionKind::GoogleCalendarCreateEvent => build_calendar_payload(message, now),
        ActionKind::BillingQueueRefund => build_refund_payload(message),
        ActionKind::GmailCreateDraft => build_draft_payload(message),
    }
}

fn build_draft_payload(message: &str) -> ToolCallPayload {
    let normalized = normalize_message(message);
    let recipients = extract_emails(&normalized, MAX_DRAFT_RECIPIENTS);

    ToolCallPayload::GmailCreateDraft {
        to: if recipients.is_empty() {
            vec![DEFAULT_DRAFT_RECIPIENT.to_string()]
        } else {
            recipients
        },
        subject: or_default(truncate_chars(&normalized, MAX_TITLE_CHARS), "Quick follow-up"),
        body: or_default(normalized, "Please draft a concise response."),
    }
}

fn build_calendar_payload(message: &str, now: DateTime<Utc>) -> ToolCallPayload {
    let normalized = normalize_message(message);
    let starts_at = now + Duration::hours(1);
    let ends_at = starts_at + Duration::hours(1);

    ToolCallPayload::GoogleCalendarCreateEvent {
        title: or_default(truncate_chars(&normalized, MAX_TITLE_CHARS), "Follow-up meeting"),
        starts_at: starts_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        ends_at: ends_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        attendees: extract_emails(&normalized, MAX_EVENT_ATTENDEES),
        description: or_default(normalized, "Schedule from command input."),
    }
}

fn build_refund_payload(message: &str) -> ToolCallPayload {
    let normalized = normalize_message(message);
    let customer = extract_emails(&normalized, 1)
        .into_iter()
        .next()
        .unwrap_or_else(|| DEFAULT_REFUND_CUSTOMER.to_string());

    ToolCallPayload::BillingQueueRefund {
        customer_name: truncate_chars(&customer, MAX_TITLE_CHARS),
        amount: parse_amount(&normalized),
        currency: REFUND_CURRENCY.to_string(),
        reason: or_default(normalized, "Customer requested a refund."),
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn or_default(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
