//! Client identity extraction for rate limiting.
//!
//! The identity that partitions rate-limit state is the IP address of the
//! TCP peer, taken from Axum's `ConnectInfo<SocketAddr>` request extension.
//! The port is dropped, so several connections from one host share a window.
//! The API key and request body never contribute to identity.
//!
//! # Forwarding Headers
//!
//! `X-Forwarded-For` and `X-Real-IP` are attacker-controlled unless a reverse
//! proxy overwrites them. They are therefore consulted **only** when the peer
//! address falls inside a configured trusted proxy range
//! (see [`TrustedProxyConfig`]). With no trusted proxies configured, the
//! headers are ignored entirely.
//!
//! ```text
//!   ConnectInfo present? ──no──▶ "unknown"
//!          │ yes
//!          ▼
//!   peer in TRUSTED_PROXIES? ──no──▶ peer IP
//!          │ yes
//!          ▼
//!   X-Forwarded-For (first hop) → X-Real-IP → peer IP
//! ```
//!
//! Header values count only if they parse as an IP address; anything else is
//! skipped, so junk headers cannot mint fresh windows.
//!
//! # Server Setup
//!
//! `ConnectInfo` is only populated when the router is served with
//! `into_make_service_with_connect_info::<SocketAddr>()`. Without it every
//! request falls back to [`UNKNOWN_IP`] and all clients share one window.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use tracing::debug;

use super::rate_limit::TrustedProxyConfig;

/// Fallback identity when no peer address is available.
///
/// All such requests share this key. Monitor for high "unknown" traffic in
/// production; it usually means the server was started without connect info.
pub const UNKNOWN_IP: &str = "unknown";

/// Peer address recorded by the server for this connection, if any.
#[inline]
pub fn peer_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// First valid address from the forwarding headers.
///
/// Checks `X-Forwarded-For` (first entry of the comma-separated chain) and
/// then `X-Real-IP`. Values that do not parse as an IP address are skipped.
#[inline]
fn forwarded_ip(parts: &Parts) -> Option<IpAddr> {
    if let Some(forwarded) = parts.headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
        && let Ok(ip) = first_ip.trim().parse()
    {
        return Some(ip);
    }

    if let Some(real_ip) = parts.headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && let Ok(ip) = value.trim().parse()
    {
        return Some(ip);
    }

    None
}

/// Derive the rate-limit identity for a request.
///
/// # Returns
///
/// `Cow<'static, str>` - Borrowed for "unknown" (no allocation), owned otherwise.
pub fn client_identity(parts: &Parts, trusted_proxies: &TrustedProxyConfig) -> Cow<'static, str> {
    let Some(peer) = peer_ip(parts) else {
        return Cow::Borrowed(UNKNOWN_IP);
    };

    if trusted_proxies.is_trusted(&peer) {
        if let Some(forwarded) = forwarded_ip(parts) {
            debug!(
                peer = %peer,
                client_ip = %forwarded,
                "Using forwarded client address from trusted proxy"
            );
            return Cow::Owned(forwarded.to_string());
        }
        debug!(peer = %peer, "Trusted proxy sent no usable forwarding headers");
    }

    Cow::Owned(peer.to_string())
}
