// Core ID type for the presence protocol.
//
// `SessionId` is a hub-scoped identifier, not a durable account id — the hub
// assigns compact integer ids to connections for efficient wire
// representation. Ids come from a monotonic counter and are never reused
// within a hub's lifetime, so a late event for a departed session can never
// be confused with a new one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hub-assigned session ID (compact u64, one per live connection).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
