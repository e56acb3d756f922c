//! Rate limiting middleware using a per-client sliding window.
//!
//! # Algorithm
//!
//! Each client identity owns a queue of the instants at which its admitted
//! requests arrived, oldest first. For every new request at time `now`:
//!
//! 1. Pop from the front every instant `t` with `now - t > window`.
//! 2. If the queue still holds `capacity` or more instants, reject. The
//!    rejected request is **not** recorded.
//! 3. Otherwise push `now` and admit.
//!
//! This is a rolling window: at most `capacity` requests are admitted in any
//! trailing `window`, with no burst smoothing. An instant exactly `window` old
//! still counts; it drops out strictly after.
//!
//! Pruning happens inline on each admission, there is no background sweeper.
//! A window is created lazily on a client's first request and kept for the
//! life of the process.
//!
//! # Configuration
//!
//! - `rate_limit_max_requests`: Capacity per client per window (default: 100)
//! - `rate_limit_window`: Window length (default: 60s)
//! - `trusted_proxies`: CIDR ranges allowed to supply forwarding headers
//!
//! # Response Headers
//!
//! On rate limit exceeded (429):
//! - `X-RateLimit-Limit`: Configured capacity
//! - `X-RateLimit-Remaining`: Always `0`
//!
//! No `Retry-After` is computed.

use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::client_identity;
use crate::error::AppError;
use crate::metrics;
use crate::pipeline::{Interceptor, Verdict};

/// Error type for rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Capacity cannot be zero.
    ZeroCapacity,
    /// Window length cannot be zero.
    ZeroWindow,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroCapacity => write!(
                f,
                "capacity must be greater than 0; leave the limiter out for no limiting"
            ),
            RateLimitError::ZeroWindow => write!(f, "window must be longer than 0 seconds"),
        }
    }
}

impl std::error::Error for RateLimitError {}

// =============================================================================
// Trusted Proxy CIDR Matching
// =============================================================================

/// Parsed CIDR network range for trusted proxy validation.
#[derive(Debug, Clone)]
pub struct CidrRange {
    /// Network address
    network: IpAddr,
    /// Prefix length (e.g., 24 for /24)
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// A bare address is treated as a single-host range.
    /// Returns `None` if the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let cidr = cidr.trim();

        let Some((addr, prefix)) = cidr.split_once('/') else {
            let network: IpAddr = cidr.parse().ok()?;
            let prefix_len = max_prefix(&network);
            return Some(Self {
                network,
                prefix_len,
            });
        };

        let network: IpAddr = addr.parse().ok()?;
        let prefix_len: u8 = prefix.parse().ok()?;
        if prefix_len > max_prefix(&network) {
            return None;
        }

        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            // IPv4 and IPv6 don't match
            _ => false,
        }
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Configuration for trusted proxy validation.
///
/// Only peers within these ranges may supply the client address through
/// forwarding headers. The default (empty) configuration trusts nobody.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxyConfig {
    /// Parsed CIDR ranges for trusted proxies
    ranges: Vec<CidrRange>,
}

impl TrustedProxyConfig {
    /// Create a new trusted proxy configuration from CIDR strings.
    ///
    /// Invalid CIDR strings are logged as warnings and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges: Vec<CidrRange> = cidrs
            .iter()
            .filter_map(|cidr| {
                let parsed = CidrRange::parse(cidr);
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        if !ranges.is_empty() {
            debug!(count = ranges.len(), "Trusted proxy ranges configured");
        }

        Self { ranges }
    }

    /// Check if any trusted ranges are configured.
    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Check if a peer address belongs to a trusted proxy.
    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.ranges.iter().any(|range| range.contains(ip))
    }
}

// =============================================================================
// Sliding Window Limiter
// =============================================================================

/// Decision for a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

/// Per-client sliding-window request counter.
///
/// Windows are stored in a `DashMap`, so each admission holds the shard lock
/// for its client across prune, check, and append. Concurrent requests from
/// one client are serialized; different clients rarely contend.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    capacity: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    /// Create a limiter admitting `capacity` requests per `window` per client.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroCapacity` or `RateLimitError::ZeroWindow`
    /// for degenerate settings.
    pub fn new(capacity: usize, window: Duration) -> Result<Self, RateLimitError> {
        if capacity == 0 {
            return Err(RateLimitError::ZeroCapacity);
        }
        if window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }

        Ok(Self {
            windows: DashMap::new(),
            capacity,
            window,
        })
    }

    /// Evaluate one request from `identity` arriving at `now`.
    pub fn admit(&self, identity: &str, now: Instant) -> Admission {
        let mut created = false;
        let admission = {
            let mut timestamps = match self.windows.entry(identity.to_owned()) {
                Entry::Occupied(entry) => entry.into_ref(),
                Entry::Vacant(entry) => {
                    created = true;
                    entry.insert(VecDeque::with_capacity(self.capacity.min(128)))
                }
            };

            while let Some(&oldest) = timestamps.front() {
                if now.saturating_duration_since(oldest) > self.window {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }

            if timestamps.len() >= self.capacity {
                Admission::Rejected
            } else {
                timestamps.push_back(now);
                Admission::Allowed
            }
        };

        // The entry guard is released above; len() needs every shard.
        if created {
            metrics::set_tracked_clients(self.windows.len());
        }

        admission
    }

    /// Number of requests currently recorded for `identity`, without pruning.
    pub fn recorded(&self, identity: &str) -> usize {
        self.windows
            .get(identity)
            .map_or(0, |timestamps| timestamps.len())
    }

    /// Number of distinct client identities seen so far.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Configured capacity per window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

// =============================================================================
// Pipeline Stage
// =============================================================================

/// First pipeline stage: resolves client identity and consults the limiter.
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    limiter: Arc<SlidingWindowLimiter>,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl RateLimitGate {
    pub fn new(limiter: Arc<SlidingWindowLimiter>, trusted_proxies: TrustedProxyConfig) -> Self {
        Self {
            limiter,
            trusted_proxies: Arc::new(trusted_proxies),
        }
    }
}

impl Interceptor for RateLimitGate {
    fn intercept(&self, parts: &Parts) -> Verdict {
        let client_ip = client_identity(parts, &self.trusted_proxies);

        match self.limiter.admit(&client_ip, Instant::now()) {
            Admission::Allowed => Verdict::Continue,
            Admission::Rejected => {
                warn!(
                    client_ip = %client_ip,
                    path = %parts.uri.path(),
                    limit = self.limiter.capacity(),
                    "Rate limit exceeded for client"
                );
                metrics::record_rate_limit_rejection();
                Verdict::Reject(AppError::RateLimited {
                    limit: self.limiter.capacity(),
                })
            }
        }
    }
}

// =============================================================================
// Tower Layer
// =============================================================================

/// Rate limiting layer for Tower middleware stack.
///
/// Wraps the whole router so that every request, matched or not, is counted
/// before any handler logic runs.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Arc::new(SlidingWindowLimiter::new(100, Duration::from_secs(60))?);
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(RateLimitLayer::new(RateLimitGate::new(limiter, TrustedProxyConfig::default())));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    gate: RateLimitGate,
}

impl RateLimitLayer {
    pub fn new(gate: RateLimitGate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    gate: RateLimitGate,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let (parts, body) = req.into_parts();
        let verdict = self.gate.intercept(&parts);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match verdict {
                Verdict::Continue => inner.call(Request::from_parts(parts, body)).await,
                Verdict::Reject(err) => Ok(err.into_response()),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter(capacity: usize) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(capacity, WINDOW).unwrap()
    }

    #[test]
    fn test_zero_capacity_returns_error() {
        let result = SlidingWindowLimiter::new(0, WINDOW);
        assert!(matches!(result, Err(RateLimitError::ZeroCapacity)));
    }

    #[test]
    fn test_zero_window_returns_error() {
        let result = SlidingWindowLimiter::new(100, Duration::ZERO);
        assert!(matches!(result, Err(RateLimitError::ZeroWindow)));
    }

    #[test]
    fn test_hundred_requests_admitted_hundred_first_rejected() {
        let limiter = limiter(100);
        let start = Instant::now();

        for i in 0..100 {
            let now = start + Duration::from_millis(i * 10);
            assert_eq!(limiter.admit("client", now), Admission::Allowed, "request {i}");
        }

        let now = start + Duration::from_secs(59);
        assert_eq!(limiter.admit("client", now), Admission::Rejected);
        // Rejections are not recorded
        assert_eq!(limiter.recorded("client"), 100);
    }

    #[test]
    fn test_timestamp_exactly_window_old_still_counts() {
        let limiter = limiter(100);
        let start = Instant::now();

        for _ in 0..100 {
            assert_eq!(limiter.admit("client", start), Admission::Allowed);
        }

        assert_eq!(limiter.admit("client", start + WINDOW), Admission::Rejected);
        assert_eq!(
            limiter.admit("client", start + WINDOW + Duration::from_nanos(1)),
            Admission::Allowed
        );
        // The whole first burst was pruned, only the new request remains
        assert_eq!(limiter.recorded("client"), 1);
    }

    #[test]
    fn test_window_slides_one_request_at_a_time() {
        let limiter = limiter(3);
        let start = Instant::now();

        assert_eq!(limiter.admit("c", start), Admission::Allowed);
        assert_eq!(limiter.admit("c", start + Duration::from_secs(20)), Admission::Allowed);
        assert_eq!(limiter.admit("c", start + Duration::from_secs(40)), Admission::Allowed);
        assert_eq!(limiter.admit("c", start + Duration::from_secs(50)), Admission::Rejected);

        // Only the request at t=0 has aged out at t=61
        assert_eq!(limiter.admit("c", start + Duration::from_secs(61)), Admission::Allowed);
        assert_eq!(limiter.admit("c", start + Duration::from_secs(62)), Admission::Rejected);
    }

    #[test]
    fn test_rejections_do_not_extend_the_window() {
        let limiter = limiter(2);
        let start = Instant::now();

        limiter.admit("c", start);
        limiter.admit("c", start);
        for secs in 1..=60 {
            assert_eq!(
                limiter.admit("c", start + Duration::from_secs(secs)),
                Admission::Rejected
            );
        }

        assert_eq!(limiter.admit("c", start + Duration::from_secs(61)), Admission::Allowed);
    }

    #[test]
    fn test_clients_have_independent_windows() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert_eq!(limiter.admit("10.0.0.1", now), Admission::Allowed);
        assert_eq!(limiter.admit("10.0.0.1", now), Admission::Rejected);
        assert_eq!(limiter.admit("10.0.0.2", now), Admission::Allowed);
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_clock_going_backwards_does_not_prune() {
        let limiter = limiter(1);
        let start = Instant::now() + Duration::from_secs(120);

        assert_eq!(limiter.admit("c", start), Admission::Allowed);
        assert_eq!(
            limiter.admit("c", start - Duration::from_secs(90)),
            Admission::Rejected
        );
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_capacity() {
        let limiter = Arc::new(limiter(50));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.admit("shared", now) == Admission::Allowed)
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(limiter.recorded("shared"), 50);
    }

    // ==========================================================================
    // CIDR Range Tests
    // ==========================================================================
    // Note: identity extraction tests are in middleware/ip.rs

    #[test]
    fn test_cidr_parse() {
        assert_eq!(CidrRange::parse("10.0.0.0/8").unwrap().prefix_len, 8);
        assert_eq!(CidrRange::parse("::1/128").unwrap().prefix_len, 128);
        assert_eq!(CidrRange::parse(" 192.168.1.1 ").unwrap().prefix_len, 32);
        assert_eq!(CidrRange::parse("2001:db8::1").unwrap().prefix_len, 128);
    }

    #[test]
    fn test_cidr_parse_invalid() {
        assert!(CidrRange::parse("not-an-ip").is_none());
        assert!(CidrRange::parse("10.0.0.0/33").is_none());
        assert!(CidrRange::parse("10.0.0.0/abc").is_none());
        assert!(CidrRange::parse("10.0.0.0/8/1").is_none());
    }

    #[test]
    fn test_cidr_contains_ipv4() {
        let cidr = CidrRange::parse("192.168.1.0/24").unwrap();

        assert!(cidr.contains(&"192.168.1.1".parse().unwrap()));
        assert!(cidr.contains(&"192.168.1.254".parse().unwrap()));
        assert!(!cidr.contains(&"192.168.2.1".parse().unwrap()));
        assert!(!cidr.contains(&"::1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_zero_prefix_matches_everything() {
        let cidr = CidrRange::parse("0.0.0.0/0").unwrap();
        assert!(cidr.contains(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_trusted_proxy_config_empty_trusts_nobody() {
        let config = TrustedProxyConfig::new(&[]);
        assert!(!config.is_enabled());
        assert!(!config.is_trusted(&"127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_trusted_proxy_config_with_ranges() {
        let config = TrustedProxyConfig::new(&[
            "10.0.0.0/8".to_string(),
            "172.16.0.0/12".to_string(),
            "bogus".to_string(),
        ]);
        assert!(config.is_enabled());

        assert!(config.is_trusted(&"10.0.0.1".parse().unwrap()));
        assert!(config.is_trusted(&"172.31.255.255".parse().unwrap()));
        assert!(!config.is_trusted(&"192.168.1.1".parse().unwrap()));
    }
}
