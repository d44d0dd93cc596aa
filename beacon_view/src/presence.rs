// Client-side presence store.
//
// Maintains the local belief about where every known session currently is,
// keyed by `SessionId`, driven entirely by broadcast events. There is no
// separate slot for the local session — it shows up like everyone else, via
// its own self-echoed location updates.

use std::collections::BTreeMap;

use beacon_protocol::message::LocationUpdate;
use beacon_protocol::types::SessionId;

/// Last-known state for one session. A session first seen via `UserInfo`
/// has a username but no coordinates yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresenceEntry {
    pub username: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<f64>,
}

/// Presence state: session id → last-known entry.
#[derive(Debug, Default)]
pub struct PresenceStore {
    entries: BTreeMap<SessionId, PresenceEntry>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert from a location broadcast. Full replace — fields from an older
    /// event never survive into the new entry.
    pub fn apply_location(&mut self, update: &LocationUpdate) {
        self.entries.insert(
            update.id,
            PresenceEntry {
                username: Some(update.username.clone()),
                latitude: Some(update.latitude),
                longitude: Some(update.longitude),
                timestamp: Some(update.timestamp),
            },
        );
    }

    /// Update just the username, creating a placeholder entry when the
    /// session is not yet known. Coordinates are untouched.
    pub fn apply_user_info(&mut self, id: SessionId, username: &str) {
        let entry = self.entries.entry(id).or_default();
        entry.username = Some(username.to_string());
    }

    /// Forget a session entirely. Idempotent.
    pub fn apply_disconnect(&mut self, id: SessionId) {
        self.entries.remove(&id);
    }

    pub fn get(&self, id: SessionId) -> Option<&PresenceEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (SessionId, &PresenceEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }
}
