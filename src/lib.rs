//! # Item Service
//!
//! A small JSON CRUD service for named items, held in memory, with:
//!
//! - **Security**: Shared-secret `X-API-Key` authentication (constant-time compare)
//! - **Fairness**: Per-client sliding-window rate limiting (100 requests / 60s)
//! - **Observability**: Request IDs, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → Rate Limit → CORS)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, items) ─ RequireApiKey extractor first   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ItemStore (BTreeMap behind a tokio RwLock)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use item_service::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr = config.server_addr();
//!     let app = build_router(AppState::new(config)?);
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Configuration
//!
//! ```bash
//! API_KEY=your-secret-key cargo run
//! RATE_LIMIT_MAX_REQUESTS=100 RATE_LIMIT_WINDOW_SECS=60 cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
pub use store::{ItemStore, ListParams};
