//! Connection lifecycle phases.

use std::fmt;

use serde::Serialize;

/// Phase of the single logical connection owned by a client.
///
/// Legal transitions:
///
/// ```text
/// Closed -> Connecting -> Open -> Closing -> Closed
///              |           |
///              +-> Closed  +-> Closed   (failure / transport close)
/// ```
///
/// `Closing` is only entered by an explicit disconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Closed,
    Connecting,
    Open,
    Closing,
}

impl ConnectionPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Closed, Self::Connecting)
                | (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Closed)
                | (Self::Connecting, Self::Closing)
                | (Self::Open, Self::Closing)
                | (Self::Open, Self::Closed)
                | (Self::Closing, Self::Closed)
                | (Self::Closed, Self::Closing)
        )
    }

    /// True while a transport exists or is being established.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        use ConnectionPhase::*;
        assert!(Closed.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Open));
        assert!(Open.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn failure_transitions_are_legal() {
        use ConnectionPhase::*;
        assert!(Connecting.can_transition_to(Closed));
        assert!(Open.can_transition_to(Closed));
    }

    #[test]
    fn skipping_phases_is_rejected() {
        use ConnectionPhase::*;
        assert!(!Closed.can_transition_to(Open));
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Closing.can_transition_to(Open));
    }

    #[test]
    fn only_connecting_and_open_are_active() {
        assert!(ConnectionPhase::Connecting.is_active());
        assert!(ConnectionPhase::Open.is_active());
        assert!(!ConnectionPhase::Closed.is_active());
        assert!(!ConnectionPhase::Closing.is_active());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionPhase::Connecting).unwrap();
        assert_eq!(json, r#""connecting""#);
    }
}
