//! Shared application state for Axum handlers.
//!
//! `AppState` is the service context: it owns the item store, the rate
//! limiter's per-client windows, and the API key gate. Handlers receive it
//! through `State`, nothing lives in globals.
//!
//! # Thread Safety
//!
//! Requests run concurrently on the multi-threaded runtime, so mutable state
//! is synchronized explicitly:
//!
//! - The item store sits behind a `tokio::sync::RwLock`. Creation holds the
//!   write guard across id assignment and insertion, so two concurrent
//!   creates can never receive the same id.
//! - Rate windows live in a `DashMap` inside [`SlidingWindowLimiter`]; each
//!   admission locks only its client's shard.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::middleware::{ApiKeyGate, RateLimitError, SlidingWindowLimiter};
use crate::store::ItemStore;

/// Shared application state for Axum handlers.
///
/// Cloned for each request; all internal data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// All item records
    pub store: Arc<RwLock<ItemStore>>,
    /// Per-client sliding windows (`None` when rate limiting is disabled)
    pub rate_limiter: Option<Arc<SlidingWindowLimiter>>,
    /// Shared-secret check used by protected handlers
    pub api_key_gate: ApiKeyGate,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state with an empty store.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError` if rate limiting is enabled with a zero-length window.
    pub fn new(config: Config) -> Result<Self, RateLimitError> {
        let rate_limiter = if config.rate_limiting_enabled() {
            Some(Arc::new(SlidingWindowLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window,
            )?))
        } else {
            None
        };

        Ok(Self {
            store: Arc::new(RwLock::new(ItemStore::new())),
            rate_limiter,
            api_key_gate: ApiKeyGate::new(config.api_key.clone()),
            config: Arc::new(config),
        })
    }
}
