// Test-only viewer for presence integration tests.
//
// Wraps the real `NetClient` (from `beacon_hub::client`) and a real
// `MapReconciler` (from `beacon_view`) around a recording canvas, providing
// a synchronous, test-friendly API for exercising the full pipeline:
// fix → hub → validate → enrich → broadcast → reconcile → canvas ops.
//
// The only test-specific code here is the recording canvas and the blocking
// poll wrappers; all networking and reconciliation logic uses the same code
// paths as a live client.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use beacon_hub::client::NetClient;
use beacon_protocol::message::{RawFix, ServerMessage};
use beacon_protocol::types::SessionId;
use beacon_view::{CircleKind, MapCanvas, MapReconciler, UserRow};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A fix with just coordinates — the common case in tests.
pub fn coords(lat: f64, lon: f64) -> RawFix {
    RawFix {
        latitude: Some(lat),
        longitude: Some(lon),
        ..RawFix::default()
    }
}

/// One recorded canvas call.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    AddMarker(SessionId, f64, f64, String),
    MoveMarker(SessionId, f64, f64),
    SetMarkerLabel(SessionId, String),
    RemoveMarker(SessionId),
    AddCircle(SessionId, f64, f64, f64, CircleKind),
    MoveCircle(SessionId, f64, f64, f64),
    RemoveCircle(SessionId),
    SetTrail(Vec<(f64, f64)>),
    Recenter(f64, f64),
    SetUserList(Vec<UserRow>),
}

/// Canvas double that records every call for assertion.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub ops: Vec<CanvasOp>,
}

impl MapCanvas for RecordingCanvas {
    fn add_marker(&mut self, id: SessionId, lat: f64, lon: f64, label: &str) {
        self.ops.push(CanvasOp::AddMarker(id, lat, lon, label.into()));
    }
    fn move_marker(&mut self, id: SessionId, lat: f64, lon: f64) {
        self.ops.push(CanvasOp::MoveMarker(id, lat, lon));
    }
    fn set_marker_label(&mut self, id: SessionId, label: &str) {
        self.ops.push(CanvasOp::SetMarkerLabel(id, label.into()));
    }
    fn remove_marker(&mut self, id: SessionId) {
        self.ops.push(CanvasOp::RemoveMarker(id));
    }
    fn add_circle(&mut self, id: SessionId, lat: f64, lon: f64, radius: f64, kind: CircleKind) {
        self.ops.push(CanvasOp::AddCircle(id, lat, lon, radius, kind));
    }
    fn move_circle(&mut self, id: SessionId, lat: f64, lon: f64, radius: f64) {
        self.ops.push(CanvasOp::MoveCircle(id, lat, lon, radius));
    }
    fn remove_circle(&mut self, id: SessionId) {
        self.ops.push(CanvasOp::RemoveCircle(id));
    }
    fn set_trail(&mut self, points: &[(f64, f64)]) {
        self.ops.push(CanvasOp::SetTrail(points.to_vec()));
    }
    fn recenter(&mut self, lat: f64, lon: f64) {
        self.ops.push(CanvasOp::Recenter(lat, lon));
    }
    fn set_user_list(&mut self, rows: &[UserRow]) {
        self.ops.push(CanvasOp::SetUserList(rows.to_vec()));
    }
}

/// A test viewer wrapping a real NetClient and MapReconciler.
pub struct TestViewer {
    client: NetClient,
    pub reconciler: MapReconciler,
    pub canvas: RecordingCanvas,
    /// Every server message received so far, in arrival order.
    pub history: Vec<ServerMessage>,
}

impl TestViewer {
    /// Connect to a hub and complete the `Welcome` handshake.
    pub fn connect(addr: SocketAddr) -> Self {
        let client =
            NetClient::connect(&addr.to_string()).expect("TestViewer::connect failed");
        let reconciler = MapReconciler::new(client.session_id());
        Self {
            client,
            reconciler,
            canvas: RecordingCanvas::default(),
            history: Vec::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.client.session_id()
    }

    pub fn set_follow(&mut self, follow: bool) {
        self.reconciler.set_follow(follow);
    }

    pub fn set_username(&mut self, name: &str) {
        self.client.set_username(name).expect("set_username failed");
    }

    pub fn send_fix(&mut self, fix: RawFix) {
        self.client.send_location(fix).expect("send_location failed");
    }

    /// Drain pending server messages, applying each to the reconciler and
    /// appending it to `history`. Returns how many arrived.
    pub fn pump(&mut self) -> usize {
        let messages = self.client.poll();
        let count = messages.len();
        for msg in messages {
            self.reconciler.apply(&msg, &mut self.canvas);
            self.history.push(msg);
        }
        count
    }

    /// Blocking pump until some received message satisfies `pred` (messages
    /// that arrived earlier count too). Returns a clone of the first match.
    pub fn pump_until<F>(&mut self, what: &str, pred: F) -> ServerMessage
    where
        F: Fn(&ServerMessage) -> bool,
    {
        let start = Instant::now();
        loop {
            let _ = self.pump();
            if let Some(msg) = self.history.iter().find(|msg| pred(msg)) {
                return msg.clone();
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {what}"
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocking pump until `pred` matches at least `count` received messages.
    pub fn pump_until_count<F>(&mut self, what: &str, count: usize, pred: F)
    where
        F: Fn(&ServerMessage) -> bool,
    {
        let start = Instant::now();
        loop {
            let _ = self.pump();
            if self.history.iter().filter(|msg| pred(msg)).count() >= count {
                return;
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {count}x {what}"
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Pump for a fixed settle window, for asserting that something did NOT
    /// arrive.
    pub fn pump_for(&mut self, window: Duration) {
        let start = Instant::now();
        while start.elapsed() < window {
            let _ = self.pump();
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Send Goodbye and close the connection.
    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }
}
