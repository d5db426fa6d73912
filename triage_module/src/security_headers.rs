use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
style-src 'self' 'unsafe-inline'; \
img-src 'self' data: blob:; \
font-src 'self' data:; \
connect-src 'self' https://accounts.google.com https://www.googleapis.com; \
object-src 'none'; \
base-uri 'self'; \
frame-ancestors 'none'; \
form-action 'self'";

const PERMISSIONS_POLICY: &str =
    "accelerometer=(), autoplay=(), camera=(), geolocation=(), microphone=()";

const BASE_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("permissions-policy", PERMISSIONS_POLICY),
    ("cross-origin-opener-policy", "same-origin"),
];

const API_HEADERS: [(&str, &str); 2] = [("cache-control", "no-store"), ("pragma", "no-cache")];

pub fn apply_security_headers(headers: &mut HeaderMap, is_api_route: bool) {
    let api_headers: &[(&str, &str)] = if is_api_route { &API_HEADERS } else { &[] };
    for &(name, value) in BASE_HEADERS.iter().chain(api_headers) {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

pub fn is_api_route(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Middleware applying [`apply_security_headers`] to every response.
pub async fn security_headers_layer(request: Request, next: Next) -> Response {
    let api_route = is_api_route(request.uri().path());
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), api_route);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_base_headers_everywhere() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, false);
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("cross-origin-opener-policy").unwrap(), "same-origin");
        assert!(headers
            .get("content-security-policy")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("frame-ancestors 'none'")));
        assert!(headers.get("cache-control").is_none());
        assert!(headers.get("pragma").is_none());
    }

    #[test]
    fn api_routes_disable_caching() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, true);
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
        assert_eq!(headers.get("pragma").unwrap(), "no-cache");
    }

    #[test]
    fn api_route_detection() {
        assert!(is_api_route("/api/commands"));
        assert!(is_api_route("/api"));
        assert!(!is_api_route("/apiary"));
        assert!(!is_api_route("/health"));
    }
}
