//! Room keys: broadcast labels used verbatim, private keys derived from the
//! two participants' display names so both ends agree without a handshake.

use serde::{Deserialize, Serialize};

/// Reserved prefix marking a private two-party room. Broadcast labels must
/// not start with this at the application boundary.
pub const PRIVATE_PREFIX: &str = "Private-";

/// Canonical identifier of one conversation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomKey(String);

impl RoomKey {
    /// Broadcast room key: the chosen label, verbatim.
    pub fn broadcast(label: impl Into<String>) -> Self {
        RoomKey(label.into())
    }

    /// Private room key for a two-party conversation. Commutative: the names
    /// are sorted lexicographically, so both endpoints derive the same key
    /// independently. Total over any two strings.
    pub fn private(local_name: &str, remote_name: &str) -> Self {
        let (a, b) = if local_name <= remote_name {
            (local_name, remote_name)
        } else {
            (remote_name, local_name)
        };
        RoomKey(format!("{PRIVATE_PREFIX}{a}-{b}"))
    }

    /// Whether this key names a private room (reserved-prefix test).
    pub fn is_private(&self) -> bool {
        self.0.starts_with(PRIVATE_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(s: &str) -> Self {
        RoomKey(s.to_string())
    }
}

impl From<String> for RoomKey {
    fn from(s: String) -> Self {
        RoomKey(s)
    }
}
