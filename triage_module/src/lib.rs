pub mod command;
pub mod coordinator;
pub mod json_body;
pub mod rate_limit;
pub mod security_headers;
pub mod service;
pub mod session;
pub mod value_guards;
pub mod watch_keywords;

pub use coordinator::{delegate, ActionKind, DelegationRecord};
pub use rate_limit::{create_rate_limit_response, MemoryRateLimiter, RateLimitError};
pub use session::{resolve_session_user_id, InMemorySessionStore, SessionStore};
pub use value_guards::{as_record, parse_required_string_value};
pub use watch_keywords::{normalize_watch_keywords, parse_watch_keyword_command};
