use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonBodyError {
    #[error("Invalid JSON body.")]
    InvalidJson,
    #[error("Content-Type must be application/json.")]
    UnsupportedMediaType,
}

impl JsonBodyError {
    pub fn status(&self) -> StatusCode {
        match self {
            JsonBodyError::InvalidJson => StatusCode::BAD_REQUEST,
            JsonBodyError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

impl IntoResponse for JsonBodyError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `application/json` or any `+json` suffix, ignoring parameters and case.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let mime_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if mime_type.is_empty() {
        return false;
    }
    mime_type == "application/json" || mime_type.ends_with("+json")
}

fn strip_utf8_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(UTF8_BOM).unwrap_or(body)
}

pub fn read_json_body<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, JsonBodyError> {
    if !is_json_content_type(headers) {
        return Err(JsonBodyError::UnsupportedMediaType);
    }
    serde_json::from_slice(strip_utf8_bom(body)).map_err(|_| JsonBodyError::InvalidJson)
}

/// Like [`read_json_body`], but a blank body yields `fallback` without a
/// content-type check.
pub fn read_optional_json_body<T: DeserializeOwned>(
    headers: &HeaderMap,
    body: &[u8],
    fallback: T,
) -> Result<T, JsonBodyError> {
    let raw = strip_utf8_bom(body);
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(fallback);
    }
    if !is_json_content_type(headers) {
        return Err(JsonBodyError::UnsupportedMediaType);
    }
    serde_json::from_slice(raw).map_err(|_| JsonBodyError::InvalidJson)
}
