//! Request pipeline stages and their ordering contract.
//!
//! Every request passes through the stages below, in this order. A stage
//! either lets the request continue or ends it with a terminal error
//! response; later stages never run for a rejected request.
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← every request, /health and unknown routes included (429)
//! └────────┬─────────┘
//!          │  (routing matches path + method)
//!          ▼
//! ┌──────────────────┐
//! │  API Key Check   │ ← protected handlers only, before any store access (401)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Handler      │ ← path/body extraction, then the item store (404)
//! └──────────────────┘
//! ```
//!
//! Consequences that clients can observe:
//!
//! - A rate-limited client gets 429 even when it presents a valid API key.
//! - An unauthenticated request for a nonexistent item gets 401, not 404.
//! - `/health` runs only the first stage.

use axum::http::request::Parts;

use crate::error::AppError;

/// Outcome of a single pipeline stage.
#[derive(Debug)]
pub enum Verdict {
    /// Hand the request to the next stage.
    Continue,
    /// Stop here and answer with this error.
    Reject(AppError),
}

impl Verdict {
    /// Convert into a `Result` so stages can be chained with `?`.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Verdict::Continue => Ok(()),
            Verdict::Reject(err) => Err(err),
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Verdict::Continue)
    }
}

/// A stage that inspects request metadata and decides whether the request
/// may proceed.
///
/// Interceptors see only the request head, never the body, so they can run
/// before any extraction happens. Their position in the diagram above is
/// fixed by where they are mounted: the rate limit gate as the outermost
/// router layer, the API key gate as the first handler extractor.
pub trait Interceptor {
    /// Inspect the request head and return a verdict.
    fn intercept(&self, parts: &Parts) -> Verdict;
}
