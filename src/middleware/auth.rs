//! API key authentication.
//!
//! # Security Features
//!
//! - **Constant-time comparison**: Prevents timing attacks on API key validation
//! - **Single shared secret**: One configured key protects every protected route
//! - **Header only**: The key is read from `X-API-Key`; query parameters are ignored
//!
//! # Placement in the Pipeline
//!
//! Authentication is not a router-wide layer. Protected handlers take a
//! [`RequireApiKey`] extractor as their **first** argument, so the check runs
//! after routing has matched path and method, after rate limiting, and before
//! any path/body extraction or store access. `/health` simply does not ask
//! for it.
//!
//! ```bash
//! curl -H "X-API-Key: dev-api-key" http://localhost:3000/api/v1/items
//! ```

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::ip::peer_ip;
use crate::error::AppError;
use crate::metrics;
use crate::pipeline::{Interceptor, Verdict};
use crate::state::AppState;

/// Header name for API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Validates the shared-secret header against the configured key.
#[derive(Clone)]
pub struct ApiKeyGate {
    expected_key: Arc<String>,
}

impl ApiKeyGate {
    /// Create a gate expecting `api_key`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            expected_key: Arc::new(api_key.into()),
        }
    }

    /// Check the request head for a matching `X-API-Key` header.
    ///
    /// Missing, non-UTF-8, and mismatched values are all rejected the same way.
    pub fn check(&self, parts: &Parts) -> Result<(), AppError> {
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match provided {
            Some(key) if constant_time_eq(key, &self.expected_key) => {
                debug!("API key authentication successful");
                Ok(())
            }
            Some(_) => {
                warn!(
                    path = %parts.uri.path(),
                    peer = ?peer_ip(parts),
                    "Invalid API key provided"
                );
                metrics::record_auth_failure("invalid");
                Err(AppError::Unauthorized)
            }
            None => {
                warn!(
                    path = %parts.uri.path(),
                    peer = ?peer_ip(parts),
                    "Missing API key"
                );
                metrics::record_auth_failure("missing");
                Err(AppError::Unauthorized)
            }
        }
    }
}

// Keep the secret out of Debug output
impl std::fmt::Debug for ApiKeyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGate")
            .field("expected_key", &"<redacted>")
            .finish()
    }
}

impl Interceptor for ApiKeyGate {
    fn intercept(&self, parts: &Parts) -> Verdict {
        match self.check(parts) {
            Ok(()) => Verdict::Continue,
            Err(err) => Verdict::Reject(err),
        }
    }
}

/// Extractor marking a handler as protected.
///
/// Must be the first extractor of the handler so that authentication precedes
/// path parsing, body parsing, and store access.
///
/// ```rust,ignore
/// async fn get_item(
///     _auth: RequireApiKey,
///     State(state): State<AppState>,
///     Path(id): Path<u64>,
/// ) -> AppResult<Json<Item>> { ... }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.api_key_gate.intercept(parts).into_result()?;
        Ok(RequireApiKey)
    }
}

/// Perform constant-time comparison of two strings.
///
/// Length differences are still observable; content differences are not.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
