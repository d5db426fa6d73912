use std::sync::Arc;

use crate::rate_limit::MemoryRateLimiter;
use crate::session::SessionStore;

use super::config::ServiceConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub limiter: Arc<MemoryRateLimiter>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(config: ServiceConfig, sessions: Arc<dyn SessionStore>) -> Self {
        let limiter = MemoryRateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window);
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            sessions,
        }
    }
}
