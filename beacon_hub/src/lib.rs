// beacon_hub — presence broadcast hub for Beacon.
//
// The hub is a thin message broker for live locations: it accepts TCP
// connections from clients, validates each reported fix, enriches accepted
// fixes with the sender's session identity, and broadcasts the result to
// every connected client (the sender included). It renders nothing and
// stores nothing durable — all map state lives on the clients.
//
// Module overview:
// - `registry.rs`: Session registry — id allocation, username normalization,
//                  defensive lookups, idempotent removal. Pure state.
// - `validate.rs`: Fix validation — pure accept/reject with normalized
//                  output; the rejection reason is echoed to the sender.
// - `hub.rs`:      The coordinator `server.rs` drives — owns the registry
//                  and the per-connection writers, handles fixes, renames,
//                  and teardown, and does the fan-out.
// - `server.rs`:   TCP listener, reader threads (one per client), and the
//                  main event loop. Uses `std::net` with a thread-per-reader
//                  architecture and an `mpsc` channel to funnel events into
//                  the single-threaded `Hub`.
// - `client.rs`:   `NetClient` — the client-side transport endpoint, used by
//                  frontends and the integration tests.
//
// Dependencies: `beacon_protocol` (shared message types and framing).
// No dependency on the view crate.
//
// The hub can run as a standalone binary (`main.rs`) or be embedded in a
// host process via the library API (`start_hub`).

pub mod client;
pub mod hub;
pub mod registry;
pub mod server;
pub mod validate;

pub use server::start_hub;
