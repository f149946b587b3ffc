use std::sync::Arc;

use strand_llm::ChatClient;
use strand_persist::PersistClient;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;

/// Shared application state passed to all handlers
///
/// All resources are wrapped in Arc for efficient sharing across async tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persist: Arc<PersistClient>,
    pub llm_client: Arc<dyn ChatClient>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, persist: PersistClient, llm_client: Arc<dyn ChatClient>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config: Arc::new(config),
            persist: Arc::new(persist),
            llm_client,
            limiter,
        }
    }
}
