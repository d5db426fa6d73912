use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::command::{build_default_payload, classify_command};
use crate::coordinator::{delegate, ActionKind};
use crate::json_body::read_json_body;
use crate::rate_limit::{create_rate_limit_response, rate_limit_request};
use crate::session::resolve_request_user_id;
use crate::value_guards::{as_record, parse_required_string_field};
use crate::watch_keywords::{parse_queue_sync_query, parse_watch_keyword_command};

use super::state::AppState;

pub(super) const WATCH_KEYWORDS_ROUTE: &str = "/api/watch-keywords";
pub(super) const WATCH_KEYWORDS_PARSE_ROUTE: &str = "/api/watch-keywords/parse";
pub(super) const DELEGATE_ROUTE: &str = "/api/coordinator/delegate";
pub(super) const COMMANDS_ROUTE: &str = "/api/commands";

const AUTH_REQUIRED_MESSAGE: &str = "Authentication required.";
const INVALID_WATCH_KEYWORDS_MESSAGE: &str = "Invalid watch keyword payload.";
const INVALID_DELEGATION_MESSAGE: &str = "Invalid delegation payload.";
const INVALID_COMMAND_MESSAGE: &str = "Invalid command payload.";

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /api/watch-keywords?cursor=...&watch=...
/// Normalizes the queue sync query the client would send upstream.
pub(super) async fn watch_keywords(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    if let Err(response) = enforce_rate_limit(&state, &headers, "watch-keywords", WATCH_KEYWORDS_ROUTE) {
        return response;
    }

    let query = parse_queue_sync_query(query.as_deref().unwrap_or(""));
    let watch_keywords = query.watch_keywords.unwrap_or_default();
    info!(
        "route={} has_cursor={} watch_keyword_count={}",
        WATCH_KEYWORDS_ROUTE,
        query.cursor.is_some(),
        watch_keywords.len()
    );

    (
        StatusCode::OK,
        Json(json!({
            "cursor": query.cursor,
            "watchKeywords": watch_keywords,
        })),
    )
        .into_response()
}

/// POST /api/watch-keywords/parse
/// Body: {"command": "alpha, beta"}
pub(super) async fn parse_watch_keywords(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = enforce_rate_limit(&state, &headers, "watch-keywords", WATCH_KEYWORDS_PARSE_ROUTE) {
        return response;
    }
    let user_id = match require_user(&state, &headers, WATCH_KEYWORDS_PARSE_ROUTE) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let payload = match read_record(&headers, &body) {
        Ok(Some(payload)) => payload,
        Ok(None) => return invalid_payload(WATCH_KEYWORDS_PARSE_ROUTE, &user_id, INVALID_WATCH_KEYWORDS_MESSAGE),
        Err(response) => return response,
    };
    let Some(command) = payload.get("command").and_then(Value::as_str) else {
        return invalid_payload(WATCH_KEYWORDS_PARSE_ROUTE, &user_id, INVALID_WATCH_KEYWORDS_MESSAGE);
    };

    let watch_keywords = parse_watch_keyword_command(command);
    info!(
        "route={} user_id={} watch_keyword_count={}",
        WATCH_KEYWORDS_PARSE_ROUTE,
        user_id,
        watch_keywords.len()
    );
    (StatusCode::OK, Json(json!({ "watchKeywords": watch_keywords }))).into_response()
}

/// POST /api/coordinator/delegate
/// Body: {"kind": "gmail.createDraft", "message": "..."}
pub(super) async fn delegate_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = enforce_rate_limit(&state, &headers, "coordinator", DELEGATE_ROUTE) {
        return response;
    }
    let user_id = match require_user(&state, &headers, DELEGATE_ROUTE) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let payload = match read_record(&headers, &body) {
        Ok(Some(payload)) => payload,
        Ok(None) => return invalid_payload(DELEGATE_ROUTE, &user_id, INVALID_DELEGATION_MESSAGE),
        Err(response) => return response,
    };

    let kind = payload
        .get("kind")
        .and_then(Value::as_str)
        .and_then(|value| value.parse::<ActionKind>().ok());
    let message = payload.get("message").and_then(Value::as_str);
    let (Some(kind), Some(message)) = (kind, message) else {
        return invalid_payload(DELEGATE_ROUTE, &user_id, INVALID_DELEGATION_MESSAGE);
    };

    let record = delegate(kind, message);
    info!(
        "route={} user_id={} kind={} worker={}",
        DELEGATE_ROUTE, user_id, kind, record.worker
    );
    (StatusCode::OK, Json(record)).into_response()
}

/// POST /api/commands
/// Body: {"message": "schedule a sync with sam@example.com"}
pub(super) async fn run_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = enforce_rate_limit(&state, &headers, "commands", COMMANDS_ROUTE) {
        return response;
    }
    let user_id = match require_user(&state, &headers, COMMANDS_ROUTE) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let payload = match read_record(&headers, &body) {
        Ok(Some(payload)) => payload,
        Ok(None) => return invalid_payload(COMMANDS_ROUTE, &user_id, INVALID_COMMAND_MESSAGE),
        Err(response) => return response,
    };
    let Some(message) = parse_required_string_field(&payload, "message") else {
        return invalid_payload(COMMANDS_ROUTE, &user_id, INVALID_COMMAND_MESSAGE);
    };

    let kind = classify_command(&message);
    let delegation = delegate(kind, &message);
    let proposal = build_default_payload(kind, &message, Utc::now());
    info!(
        "route={} user_id={} kind={} worker={}",
        COMMANDS_ROUTE, user_id, kind, delegation.worker
    );

    (
        StatusCode::OK,
        Json(json!({
            "kind": kind,
            "delegation": delegation,
            "payload": proposal,
        })),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn enforce_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    scope: &str,
    route: &str,
) -> Result<(), Response> {
    rate_limit_request(&state.limiter, headers, scope).map_err(|err| {
        warn!(
            "route={} rate limited status={} retry_after={:?}",
            route,
            err.status.as_u16(),
            err.retry_after_seconds
        );
        create_rate_limit_response(&err)
    })
}

fn require_user(state: &AppState, headers: &HeaderMap, route: &str) -> Result<String, Response> {
    match resolve_request_user_id(state.sessions.as_ref(), headers) {
        Some(user_id) => Ok(user_id),
        None => {
            warn!("route={} unauthorized status=401", route);
            Err(error_response(StatusCode::UNAUTHORIZED, AUTH_REQUIRED_MESSAGE))
        }
    }
}

/// `Ok(None)` when the body is valid JSON but not an object.
fn read_record(headers: &HeaderMap, body: &[u8]) -> Result<Option<Map<String, Value>>, Response> {
    let value: Value = read_json_body(headers, body).map_err(IntoResponse::into_response)?;
    Ok(as_record(&value).cloned())
}

fn invalid_payload(route: &str, user_id: &str, message: &str) -> Response {
    warn!("route={} user_id={} invalid payload status=400", route, user_id);
    error_response(StatusCode::BAD_REQUEST, message)
}
