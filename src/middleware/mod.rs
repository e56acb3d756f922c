//! HTTP middleware for rate limiting and authentication.
//!
//! - **Rate Limiting**: Per-client sliding window, applied to the whole router
//! - **API Key Authentication**: Constant-time check, invoked by protected handlers
//! - **Client Identity**: Peer address, with forwarding headers from trusted proxies only
//!
//! # Architecture
//!
//! ```text
//! Request → Rate Limiter → Router → RequireApiKey → Handler → Response
//!              ↓                          ↓
//!          429 Too Many              401 Unauthorized
//! ```
//!
//! See [`crate::pipeline`] for the ordering contract.

pub mod auth;
pub mod ip;
pub mod rate_limit;

pub use auth::{API_KEY_HEADER, ApiKeyGate, RequireApiKey};
pub use ip::{UNKNOWN_IP, client_identity};
pub use rate_limit::{
    Admission, RateLimitError, RateLimitGate, RateLimitLayer, SlidingWindowLimiter,
    TrustedProxyConfig,
};
