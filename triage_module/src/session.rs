//! Session lookup for authenticated requests.
//!
//! Sessions come from an external auth provider and are never trusted to
//! have a particular shape, so they stay as untyped JSON until the user id
//! is pulled out of them.

use std::collections::HashMap;
use std::path::Path;

use axum::http::{header, HeaderMap};
use serde_json::Value;

use crate::value_guards::as_record;

/// Pull `user.id` out of a session-like value; any other shape yields `None`.
pub fn resolve_session_user_id(value: &Value) -> Option<String> {
    let session = as_record(value)?;
    let user = as_record(session.get("user")?)?;
    match user.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
        _ => None,
    }
}

/// Source of session values keyed by bearer token.
pub trait SessionStore: Send + Sync {
    fn get_session(&self, token: &str) -> Option<Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("session file must be a JSON object of token -> session")]
    NotAnObject,
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: HashMap<String, Value>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load sessions from a JSON object mapping bearer tokens to session values.
    pub fn from_file(path: &Path) -> Result<Self, SessionStoreError> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        let Value::Object(entries) = value else {
            return Err(SessionStoreError::NotAnObject);
        };
        Ok(Self {
            sessions: entries.into_iter().collect(),
        })
    }

    pub fn insert(&mut self, token: impl Into<String>, session: Value) {
        self.sessions.insert(token.into(), session);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_session(&self, token: &str) -> Option<Value> {
        self.sessions.get(token).cloned()
    }
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub fn resolve_request_user_id(store: &dyn SessionStore, headers: &HeaderMap) -> Option<String> {
    let token = extract_bearer_token(headers)?;
    let session = store.get_session(&token)?;
    resolve_session_user_id(&session)
}
