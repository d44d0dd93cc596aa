// Session registry for the hub.
//
// Tracks one entry per live connection: the hub-assigned `SessionId` and the
// session's display name. Pure data structure — no sockets, no locking. It is
// owned by the `Hub` and mutated only from the server's single-threaded event
// loop, so mutual exclusion is structural.
//
// Lookups never fail: an unknown id reads as the default username. Late
// events referencing a departed session therefore degrade to harmless
// defaults instead of panics.

use std::collections::BTreeMap;

use beacon_protocol::types::SessionId;

/// Display name for sessions that never set one (or set an empty one).
pub const DEFAULT_USERNAME: &str = "Guest";

/// Maximum username length in characters; longer names are truncated.
pub const MAX_USERNAME_CHARS: usize = 32;

/// Registry of live sessions. Ids come from a monotonic counter and are
/// never reused within the hub's lifetime.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, String>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a session for a new connection, with the default username.
    pub fn connect(&mut self) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, DEFAULT_USERNAME.to_string());
        id
    }

    /// Normalize `raw` and store it as the session's username. Any input
    /// coerces to a valid name — there is no rejection path. Returns the
    /// normalized value for echo/broadcast; storing is skipped (but the
    /// normalized value still returned) when the session is unknown.
    pub fn set_username(&mut self, id: SessionId, raw: &str) -> String {
        let name = normalize_username(raw);
        if let Some(entry) = self.sessions.get_mut(&id) {
            entry.clone_from(&name);
        }
        name
    }

    /// Current username for a session, or the default if unknown.
    pub fn username(&self, id: SessionId) -> &str {
        self.sessions
            .get(&id)
            .map_or(DEFAULT_USERNAME, String::as_str)
    }

    /// Remove a session. Returns whether it was present, so callers can turn
    /// a repeat disconnect into a silent no-op.
    pub fn disconnect(&mut self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Trim surrounding whitespace, truncate to `MAX_USERNAME_CHARS` characters,
/// and substitute the default when nothing is left.
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_USERNAME.to_string();
    }
    trimmed.chars().take(MAX_USERNAME_CHARS).collect()
}
