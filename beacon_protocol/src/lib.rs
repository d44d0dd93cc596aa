// beacon_protocol — wire protocol for the Beacon location-sharing hub.
//
// This crate defines the message types, framing, and serialization used by
// the presence hub (`beacon_hub`) and its clients to communicate over TCP.
// It is shared between both sides and has no dependency on the hub or view
// crates.
//
// Module overview:
// - `types.rs`:    Core ID type — `SessionId`.
// - `message.rs`:  Client-to-hub and hub-to-client message enums, plus
//                  supporting structs (`RawFix`, `LocationUpdate`).
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then JSON payload.
//
// Design decisions:
// - **JSON serialization.** The payloads interoperate with a browser map
//   frontend, so JSON is the natural interchange. Binary framing can be
//   swapped in later if bandwidth matters.
// - **Absent means absent.** Optional telemetry uses `skip_serializing_if`,
//   so a fix without a heading has no `heading` key at all — never `null`,
//   never a zero placeholder.
// - **No async runtime.** Uses `std::io::Read`/`Write` for framing,
//   compatible with both blocking TCP streams and buffered wrappers.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_MESSAGE_SIZE, read_message, write_message};
pub use message::{ClientMessage, LocationUpdate, RawFix, ServerMessage};
pub use types::SessionId;
