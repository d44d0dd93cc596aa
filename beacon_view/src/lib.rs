// beacon_view — client-side presence reconciliation for Beacon.
//
// This crate turns the hub's broadcast stream into a consistent local view:
// one marker and optional accuracy circle per live session, a trail of the
// local session's confirmed positions, and a user list. It knows nothing
// about sockets (the transport endpoint lives in `beacon_hub::client`) and
// nothing about any concrete map widget (rendering goes through the
// `MapCanvas` trait).
//
// Module overview:
// - `presence.rs`:  Presence store — last-known state per session id.
// - `trail.rs`:     Self trail, capped FIFO of confirmed positions.
// - `watch.rs`:     Cancellable geolocation subscription (`GeoWatch` /
//                   `GeoFeed`).
// - `reconcile.rs`: The reconciler — applies server messages to the store
//                   and emits map primitive operations.
//
// The intended wiring is one single-threaded loop per client that drains
// `GeoWatch::poll` (forwarding samples as fixes) and `NetClient::poll`
// (applying each message via `MapReconciler::apply`). The two sources stay
// independent and cancellable; serializing them in one loop keeps presence
// state free of concurrent mutation.

pub mod presence;
pub mod reconcile;
pub mod trail;
pub mod watch;

pub use presence::{PresenceEntry, PresenceStore};
pub use reconcile::{CircleKind, MapCanvas, MapReconciler, UserRow};
pub use trail::{TRAIL_CAP, Trail};
pub use watch::{GeoFeed, GeoSample, GeoWatch, watch};
