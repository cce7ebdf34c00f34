//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use crate::config::ClientConfig;

/// URL template used by test clients. Never resolved.
pub const TEST_URL: &str = "ws://test.invalid/ws/{client_id}";

/// Production defaults pointed at [`TEST_URL`].
pub fn client() -> ClientConfig {
    ClientConfig::new(TEST_URL)
}

/// Defaults without jitter, so every delay is exact.
pub fn deterministic() -> ClientConfig {
    ClientConfig {
        jitter_ms: 0,
        ..client()
    }
}

/// Short, jitter-free delays and a small attempt budget.
pub fn fast(max_reconnect_attempts: u32) -> ClientConfig {
    ClientConfig {
        base_delay_ms: 100,
        max_delay_ms: 400,
        jitter_ms: 0,
        max_reconnect_attempts,
        min_attempt_interval_ms: 0,
        force_reconnect_delay_ms: 50,
        ..client()
    }
}
