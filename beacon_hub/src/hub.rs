// Presence hub state.
//
// `Hub` is the central data structure that `server.rs` drives. It owns the
// session registry and one buffered writer per live connection, and all
// mutation happens through methods called from the server's single-threaded
// event loop — no internal locking.
//
// Key responsibilities:
// - Connection bookkeeping: register a session on connect (and tell the
//   client its id via `Welcome`), drop it on disconnect.
// - Fix handling: validate the inbound fix; rejected fixes are acked to the
//   sender only and broadcast nothing; accepted fixes are enriched with the
//   sender's current username and a receipt timestamp, broadcast to every
//   connection (the sender included — clients render their own marker from
//   the echo), then acked `ok`.
// - Username changes: normalize + store, broadcast `UserInfo` so presence
//   lists update without waiting for the next fix.
//
// Writing to client streams: `Hub` holds cloned `TcpStream` write halves
// wrapped in `BufWriter`. The `send_to` / `broadcast` helpers serialize a
// `ServerMessage` to JSON, frame it, and write it out. Write errors on a
// single peer are logged but never abort the fan-out or the hub — the reader
// thread for that peer will detect the broken pipe and deliver a
// `Disconnected` event.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::net::TcpStream;
use std::time::{SystemTime, UNIX_EPOCH};

use beacon_protocol::framing::write_message;
use beacon_protocol::message::{LocationUpdate, RawFix, ServerMessage};
use beacon_protocol::types::SessionId;

use crate::registry::SessionRegistry;
use crate::validate::validate;

/// Presence hub: the session registry plus the open connections it fans out
/// to. The registry is passed in at construction so its lifecycle is tied to
/// the hub's, not to ambient state.
pub struct Hub {
    registry: SessionRegistry,
    peers: BTreeMap<SessionId, BufWriter<TcpStream>>,
}

impl Hub {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry,
            peers: BTreeMap::new(),
        }
    }

    /// Register a new connection: allocate a session, keep the write half,
    /// and send `Welcome` so the client learns its own id (it needs that to
    /// recognize self-echoed broadcasts).
    pub fn add_peer(&mut self, stream: TcpStream) -> SessionId {
        let id = self.registry.connect();
        self.peers.insert(id, BufWriter::new(stream));
        tracing::debug!(session = id.0, "session connected");
        self.send_to(id, &ServerMessage::Welcome { session_id: id });
        id
    }

    /// Handle a location report from `id`.
    pub fn handle_location(&mut self, id: SessionId, fix: &RawFix) {
        // Late message from a session already torn down — safe no-op.
        if !self.peers.contains_key(&id) {
            return;
        }
        match validate(fix) {
            Ok(valid) => {
                let update = LocationUpdate {
                    id,
                    username: self.registry.username(id).to_string(),
                    latitude: valid.latitude,
                    longitude: valid.longitude,
                    accuracy: valid.accuracy,
                    speed: valid.speed,
                    heading: valid.heading,
                    timestamp: valid.timestamp.unwrap_or_else(now_millis),
                };
                self.broadcast(&ServerMessage::ReceiveLocation { update });
                self.send_to(
                    id,
                    &ServerMessage::LocationAck {
                        ok: true,
                        error: None,
                    },
                );
            }
            Err(reason) => {
                self.send_to(
                    id,
                    &ServerMessage::LocationAck {
                        ok: false,
                        error: Some(reason.to_string()),
                    },
                );
            }
        }
    }

    /// Handle a username change: store the normalized name and tell every
    /// session (the sender included).
    pub fn handle_set_username(&mut self, id: SessionId, raw: &str) {
        if !self.peers.contains_key(&id) {
            return;
        }
        let username = self.registry.set_username(id, raw);
        self.broadcast(&ServerMessage::UserInfo { id, username });
    }

    /// Remove a session and notify the remaining peers. Safe to call twice
    /// for the same id; the second call changes nothing and sends nothing.
    pub fn remove_peer(&mut self, id: SessionId) {
        let was_present = self.registry.disconnect(id);
        self.peers.remove(&id);
        if was_present {
            tracing::debug!(session = id.0, "session disconnected");
            self.broadcast(&ServerMessage::UserDisconnected { id });
        }
    }

    /// Number of live connections.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Send a message to one session. A write failure is logged and isolated;
    /// the peer's reader thread will surface the broken pipe as a disconnect.
    fn send_to(&mut self, id: SessionId, msg: &ServerMessage) {
        if let Some(writer) = self.peers.get_mut(&id) {
            if let Err(e) = send_message(writer, msg) {
                tracing::warn!(session = id.0, error = %e, "dropping undeliverable message");
            }
        }
    }

    /// Broadcast a message to every connected session. Fan-out is a
    /// synchronous loop; a failing recipient never blocks the rest.
    fn broadcast(&mut self, msg: &ServerMessage) {
        let ids: Vec<SessionId> = self.peers.keys().copied().collect();
        for id in ids {
            self.send_to(id, msg);
        }
    }
}

/// Serialize a `ServerMessage` to JSON and write it with length-delimited
/// framing. Returns any error to the caller (which logs and isolates it).
fn send_message(
    writer: &mut BufWriter<TcpStream>,
    msg: &ServerMessage,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_vec(msg)?;
    write_message(writer, &json)?;
    Ok(())
}

/// Receipt time in Unix milliseconds — the timestamp domain geolocation
/// sources report in.
fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}
