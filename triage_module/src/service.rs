mod config;
mod handlers;
mod server;
mod state;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::{ServiceConfig, DEFAULT_MAX_BODY_BYTES};
pub use server::{build_router, ctrl_c_shutdown, run_server, shutdown_on};
pub use state::AppState;
