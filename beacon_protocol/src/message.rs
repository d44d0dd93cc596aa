// Protocol messages for client-hub communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by clients to the presence hub.
// - `ServerMessage`: sent by the hub to clients.
//
// Supporting structs (`RawFix`, `LocationUpdate`) carry the payloads. All
// types derive `Serialize`/`Deserialize` for JSON framing (see `framing.rs`).
//
// Every field of `RawFix` is optional on purpose: clients forward whatever
// their geolocation source reported, and JSON has no non-finite float
// literals (serde_json writes them as `null`), so absent keys and nulls both
// decode to `None`. The hub's validator owns the accept/reject policy — the
// protocol layer never drops a fix on its own.
//
// Optional fields of `LocationUpdate` are skipped when absent so the
// broadcast wire form carries telemetry only when the sender actually
// reported it — never `null`, never a zero placeholder.

use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// Messages sent by a client to the hub.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Change the display name shown next to this session's marker.
    SetUsername { name: String },
    /// Report one geolocation fix, exactly as the source produced it.
    SendLocation { fix: RawFix },
    /// Client is leaving gracefully.
    Goodbye,
}

/// Messages sent by the hub to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// First message on every connection: the id assigned to this session.
    /// Clients need it to recognize their own echoed broadcasts.
    Welcome { session_id: SessionId },
    /// Per-fix acknowledgment, sent to the reporting client only.
    LocationAck {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A validated fix from some session, fanned out to every session
    /// (the sender included).
    ReceiveLocation { update: LocationUpdate },
    /// A session changed its display name.
    UserInfo { id: SessionId, username: String },
    /// A session went away; clients drop all state for it.
    UserDisconnected { id: SessionId },
}

/// One inbound geolocation fix, unvalidated. All fields optional — see the
/// module comment for why even the coordinates are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// A validated fix enriched with the sender's identity, built fresh for each
/// broadcast. The username is resolved from the registry at broadcast time,
/// and the timestamp is always present (the hub substitutes its receipt time
/// when the fix carried none).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub id: SessionId,
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Unix milliseconds.
    pub timestamp: f64,
}
