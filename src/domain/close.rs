//! WebSocket close codes (RFC 6455 §7.4.1).

/// Normal closure; the purpose of the connection has been fulfilled.
pub const NORMAL: u16 = 1000;

/// Endpoint is going away (server shutdown, page navigation).
pub const GOING_AWAY: u16 = 1001;

/// Reserved: close frame carried no status code.
pub const NO_STATUS: u16 = 1005;

/// Reserved: connection dropped without a close frame.
pub const ABNORMAL: u16 = 1006;

/// A close with this code was intentional and must not trigger a reconnect.
#[must_use]
pub const fn is_intentional(code: u16) -> bool {
    matches!(code, NORMAL | GOING_AWAY)
}
