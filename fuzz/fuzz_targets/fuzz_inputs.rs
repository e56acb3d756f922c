//! Fuzz testing for client-controlled inputs.
//!
//! None of these may panic, whatever the bytes:
//!
//! - `ItemPayload` JSON parsing (any string is a valid name or description)
//! - Path id mapping onto store keys
//! - Trusted proxy CIDR parsing and matching
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_inputs -- -max_total_time=60
//! ```

#![no_main]

use std::net::{IpAddr, Ipv4Addr};

use item_service::ItemStore;
use item_service::middleware::TrustedProxyConfig;
use item_service::models::ItemPayload;
use item_service::store::item_key;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = serde_json::from_slice::<ItemPayload>(data) {
        let mut store = ItemStore::new();
        let item = store.create(payload.name.clone(), payload.description.clone());
        assert_eq!(item.name, payload.name);
        assert_eq!(item.description, payload.description);
    }

    if let Ok(bytes) = <[u8; 8]>::try_from(data.get(..8).unwrap_or_default()) {
        let raw = i64::from_le_bytes(bytes);
        assert_eq!(item_key(raw).is_ok(), raw > 0);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        // Bad entries are skipped, never fatal
        let trusted = TrustedProxyConfig::new(&[s.to_string()]);
        let _ = trusted.is_trusted(&IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
});
