//! Per-connection client identifiers.
//!
//! The configured URL may contain [`PLACEHOLDER`]; every connection attempt
//! substitutes a fresh identifier so the server can tell attempts apart.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

/// Token replaced in the connection URL.
pub const PLACEHOLDER: &str = "{client_id}";

const PREFIX: &str = "client_";
const SUFFIX_LEN: usize = 9;

/// Randomly generated identifier of the form `client_xxxxxxxxx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new identifier with a random lowercase alphanumeric suffix.
    #[must_use]
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("{PREFIX}{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Substitute `id` for every placeholder in `template`.
///
/// Templates without a placeholder are returned unchanged.
#[must_use]
pub fn render_url(template: &str, id: &ClientId) -> String {
    template.replace(PLACEHOLDER, id.as_str())
}
