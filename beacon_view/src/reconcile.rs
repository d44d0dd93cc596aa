// Map reconciler: turns broadcast events into map primitive operations.
//
// The reconciler owns the presence store, the self trail, and the
// bookkeeping of which ids currently have a marker or accuracy circle on
// screen. It is deliberately decoupled from any concrete map widget: every
// visual effect goes through the `MapCanvas` trait, so the same
// reconciliation logic drives a real map in the app and a recording canvas
// in the tests.
//
// Rendering rules:
// - one marker per known session, created on first sighting and repositioned
//   (never recreated) afterwards;
// - an accuracy circle only when an update carries a finite accuracy,
//   styled differently for the local session;
// - trail and view recentering react only to the local session's
//   self-echoed updates, and only while follow mode is on;
// - the user list is recomputed from the store on every applicable event —
//   an idempotent re-render, not an incremental patch.
//
// The local session has no special slot anywhere: its marker and trail are
// driven purely by the hub's echo of its own fixes, so what you see is what
// everyone else sees.

use std::collections::BTreeSet;

use beacon_protocol::message::{LocationUpdate, ServerMessage};
use beacon_protocol::types::SessionId;

use crate::presence::PresenceStore;
use crate::trail::Trail;

/// Accuracy circle styling: the local session's circle is visually distinct
/// from everyone else's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircleKind {
    Local,
    Remote,
}

/// One row of the rendered user list.
#[derive(Clone, Debug, PartialEq)]
pub struct UserRow {
    pub id: SessionId,
    pub label: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<f64>,
}

/// The seam to the concrete map widget. Positions are (lat, lon).
pub trait MapCanvas {
    fn add_marker(&mut self, id: SessionId, lat: f64, lon: f64, label: &str);
    fn move_marker(&mut self, id: SessionId, lat: f64, lon: f64);
    fn set_marker_label(&mut self, id: SessionId, label: &str);
    fn remove_marker(&mut self, id: SessionId);
    fn add_circle(&mut self, id: SessionId, lat: f64, lon: f64, radius: f64, kind: CircleKind);
    fn move_circle(&mut self, id: SessionId, lat: f64, lon: f64, radius: f64);
    fn remove_circle(&mut self, id: SessionId);
    fn set_trail(&mut self, points: &[(f64, f64)]);
    fn recenter(&mut self, lat: f64, lon: f64);
    fn set_user_list(&mut self, rows: &[UserRow]);
}

/// Client-side reconciliation state machine: one per connection, seeded with
/// the session id the hub assigned so self-echoes are recognized.
pub struct MapReconciler {
    self_id: SessionId,
    presence: PresenceStore,
    markers: BTreeSet<SessionId>,
    circles: BTreeSet<SessionId>,
    trail: Trail,
    follow: bool,
}

impl MapReconciler {
    pub fn new(self_id: SessionId) -> Self {
        Self {
            self_id,
            presence: PresenceStore::new(),
            markers: BTreeSet::new(),
            circles: BTreeSet::new(),
            trail: Trail::new(),
            follow: false,
        }
    }

    /// Toggle follow mode (recenter + trail on self updates).
    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    /// Apply one server message to the store and the canvas. Reapplying the
    /// same message is harmless — every path is a pure overwrite.
    pub fn apply(&mut self, msg: &ServerMessage, canvas: &mut dyn MapCanvas) {
        match msg {
            // Consumed by the transport during connect.
            ServerMessage::Welcome { .. } => {}
            ServerMessage::LocationAck { ok, error } => {
                if !ok {
                    // Intentional fire-and-forget: warn and move on.
                    tracing::warn!(
                        error = error.as_deref().unwrap_or("unknown"),
                        "location update rejected"
                    );
                }
            }
            ServerMessage::ReceiveLocation { update } => self.apply_location(update, canvas),
            ServerMessage::UserInfo { id, username } => {
                self.apply_user_info(*id, username, canvas);
            }
            ServerMessage::UserDisconnected { id } => self.apply_disconnect(*id, canvas),
        }
    }

    fn apply_location(&mut self, update: &LocationUpdate, canvas: &mut dyn MapCanvas) {
        self.presence.apply_location(update);

        let (lat, lon) = (update.latitude, update.longitude);
        if self.markers.insert(update.id) {
            let label = self.label_for(update.id, Some(&update.username));
            canvas.add_marker(update.id, lat, lon, &label);
        } else {
            canvas.move_marker(update.id, lat, lon);
        }

        if let Some(radius) = update.accuracy {
            if self.circles.insert(update.id) {
                let kind = if update.id == self.self_id {
                    CircleKind::Local
                } else {
                    CircleKind::Remote
                };
                canvas.add_circle(update.id, lat, lon, radius, kind);
            } else {
                canvas.move_circle(update.id, lat, lon, radius);
            }
        }

        // The trail records broadcast-confirmed positions only — never raw
        // geolocation samples — so it can't drift from what peers see.
        if update.id == self.self_id && self.follow {
            canvas.recenter(lat, lon);
            self.trail.push(lat, lon);
            canvas.set_trail(&self.trail.points());
        }

        canvas.set_user_list(&self.user_rows());
    }

    fn apply_user_info(&mut self, id: SessionId, username: &str, canvas: &mut dyn MapCanvas) {
        self.presence.apply_user_info(id, username);
        if self.markers.contains(&id) {
            canvas.set_marker_label(id, &self.label_for(id, Some(username)));
        }
        canvas.set_user_list(&self.user_rows());
    }

    fn apply_disconnect(&mut self, id: SessionId, canvas: &mut dyn MapCanvas) {
        // Marker, circle, store entry, and list all go in one pass so the
        // caller never observes a half-dismantled session.
        if self.markers.remove(&id) {
            canvas.remove_marker(id);
        }
        if self.circles.remove(&id) {
            canvas.remove_circle(id);
        }
        self.presence.apply_disconnect(id);
        canvas.set_user_list(&self.user_rows());
    }

    /// Display label for a session: `You` / `You (name)` for the local id,
    /// otherwise the username, or a fallback derived from the id.
    fn label_for(&self, id: SessionId, username: Option<&str>) -> String {
        let name = username.filter(|n| !n.is_empty());
        if id == self.self_id {
            match name {
                Some(n) => format!("You ({n})"),
                None => "You".to_string(),
            }
        } else {
            match name {
                Some(n) => n.to_string(),
                None => format!("User {id}"),
            }
        }
    }

    /// The user list as rendered: every known session, in id order.
    fn user_rows(&self) -> Vec<UserRow> {
        self.presence
            .iter()
            .map(|(id, entry)| UserRow {
                id,
                label: self.label_for(id, entry.username.as_deref()),
                latitude: entry.latitude,
                longitude: entry.longitude,
                timestamp: entry.timestamp,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_ID: SessionId = SessionId(1);
    const REMOTE_ID: SessionId = SessionId(2);

    /// Canvas double that records every call for assertion.
    #[derive(Debug, Clone, PartialEq)]
    enum CanvasOp {
        AddMarker(SessionId, f64, f64, String),
        MoveMarker(SessionId, f64, f64),
        SetMarkerLabel(SessionId, String),
        RemoveMarker(SessionId),
        AddCircle(SessionId, f64, f64, f64, CircleKind),
        MoveCircle(SessionId, f64, f64, f64),
        RemoveCircle(SessionId),
        SetTrail(Vec<(f64, f64)>),
        Recenter(f64, f64),
        SetUserList(Vec<String>),
    }

    #[derive(Default)]
    struct RecordingCanvas {
        ops: Vec<CanvasOp>,
    }

    impl RecordingCanvas {
        fn take(&mut self) -> Vec<CanvasOp> {
            std::mem::take(&mut self.ops)
        }
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
            self.ops
                .push(CanvasOp::SetUserList(rows.iter().map(|r| r.label.clone()).collect()));
        }
    }

    fn location(id: SessionId, username: &str, lat: f64, lon: f64) -> ServerMessage {
        ServerMessage::ReceiveLocation {
            update: LocationUpdate {
                id,
                username: username.into(),
                latitude: lat,
                longitude: lon,
                accuracy: None,
                speed: None,
                heading: None,
                timestamp: 1_700_000_000_000.0,
            },
        }
    }

    fn location_with_accuracy(
        id: SessionId,
        username: &str,
        lat: f64,
        lon: f64,
        accuracy: f64,
    ) -> ServerMessage {
        match location(id, username, lat, lon) {
            ServerMessage::ReceiveLocation { mut update } => {
                update.accuracy = Some(accuracy);
                ServerMessage::ReceiveLocation { update }
            }
            other => other,
        }
    }

    #[test]
    fn first_sighting_adds_marker_then_repositions() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(REMOTE_ID, "Bob", 1.0, 2.0), &mut canvas);
        let ops = canvas.take();
        assert_eq!(ops[0], CanvasOp::AddMarker(REMOTE_ID, 1.0, 2.0, "Bob".into()));

        reconciler.apply(&location(REMOTE_ID, "Bob", 3.0, 4.0), &mut canvas);
        let ops = canvas.take();
        assert_eq!(ops[0], CanvasOp::MoveMarker(REMOTE_ID, 3.0, 4.0));
        assert!(!ops.iter().any(|op| matches!(op, CanvasOp::AddMarker(..))));
    }

    #[test]
    fn self_marker_labeled_you() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(SELF_ID, "Ada", 1.0, 2.0), &mut canvas);
        assert_eq!(
            canvas.ops[0],
            CanvasOp::AddMarker(SELF_ID, 1.0, 2.0, "You (Ada)".into())
        );
    }

    #[test]
    fn unnamed_remote_falls_back_to_id_label() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        let msg = ServerMessage::ReceiveLocation {
            update: LocationUpdate {
                id: REMOTE_ID,
                username: String::new(),
                latitude: 1.0,
                longitude: 2.0,
                accuracy: None,
                speed: None,
                heading: None,
                timestamp: 0.0,
            },
        };
        reconciler.apply(&msg, &mut canvas);
        assert_eq!(
            canvas.ops[0],
            CanvasOp::AddMarker(REMOTE_ID, 1.0, 2.0, "User 2".into())
        );
    }

    #[test]
    fn circle_only_when_accuracy_present() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(REMOTE_ID, "Bob", 1.0, 2.0), &mut canvas);
        assert!(
            !canvas
                .take()
                .iter()
                .any(|op| matches!(op, CanvasOp::AddCircle(..) | CanvasOp::MoveCircle(..)))
        );

        reconciler.apply(
            &location_with_accuracy(REMOTE_ID, "Bob", 1.0, 2.0, 15.0),
            &mut canvas,
        );
        assert!(canvas.take().contains(&CanvasOp::AddCircle(
            REMOTE_ID,
            1.0,
            2.0,
            15.0,
            CircleKind::Remote
        )));

        reconciler.apply(
            &location_with_accuracy(REMOTE_ID, "Bob", 3.0, 4.0, 20.0),
            &mut canvas,
        );
        assert!(
            canvas
                .take()
                .contains(&CanvasOp::MoveCircle(REMOTE_ID, 3.0, 4.0, 20.0))
        );
    }

    #[test]
    fn self_circle_is_local_kind() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(
            &location_with_accuracy(SELF_ID, "Ada", 1.0, 2.0, 5.0),
            &mut canvas,
        );
        assert!(canvas.ops.contains(&CanvasOp::AddCircle(
            SELF_ID,
            1.0,
            2.0,
            5.0,
            CircleKind::Local
        )));
    }

    #[test]
    fn follow_mode_recenter_and_trail_for_self_only() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();
        reconciler.set_follow(true);

        reconciler.apply(&location(SELF_ID, "Ada", 1.0, 2.0), &mut canvas);
        let ops = canvas.take();
        assert!(ops.contains(&CanvasOp::Recenter(1.0, 2.0)));
        assert!(ops.contains(&CanvasOp::SetTrail(vec![(1.0, 2.0)])));
        assert_eq!(reconciler.trail().len(), 1);

        // Remote updates never touch the trail or the viewport.
        reconciler.apply(&location(REMOTE_ID, "Bob", 3.0, 4.0), &mut canvas);
        let ops = canvas.take();
        assert!(!ops.iter().any(|op| matches!(op, CanvasOp::Recenter(..))));
        assert!(!ops.iter().any(|op| matches!(op, CanvasOp::SetTrail(..))));
        assert_eq!(reconciler.trail().len(), 1);
    }

    #[test]
    fn follow_off_means_no_trail() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(SELF_ID, "Ada", 1.0, 2.0), &mut canvas);
        assert!(reconciler.trail().is_empty());
        assert!(
            !canvas
                .ops
                .iter()
                .any(|op| matches!(op, CanvasOp::Recenter(..)))
        );
    }

    #[test]
    fn user_info_updates_label_and_list() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(REMOTE_ID, "Guest", 1.0, 2.0), &mut canvas);
        canvas.take();

        reconciler.apply(
            &ServerMessage::UserInfo {
                id: REMOTE_ID,
                username: "Bob".into(),
            },
            &mut canvas,
        );
        let ops = canvas.take();
        assert_eq!(ops[0], CanvasOp::SetMarkerLabel(REMOTE_ID, "Bob".into()));
        assert_eq!(ops[1], CanvasOp::SetUserList(vec!["Bob".into()]));
        // Coordinates survived the rename.
        let entry = reconciler.presence().get(REMOTE_ID).unwrap();
        assert_eq!(entry.latitude, Some(1.0));
    }

    #[test]
    fn user_info_before_any_location_renders_placeholder_row() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(
            &ServerMessage::UserInfo {
                id: REMOTE_ID,
                username: "Bob".into(),
            },
            &mut canvas,
        );
        // No marker yet (no coordinates), but the list shows the user.
        assert_eq!(canvas.ops, vec![CanvasOp::SetUserList(vec!["Bob".into()])]);
    }

    #[test]
    fn disconnect_tears_down_marker_circle_entry_and_list() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(
            &location_with_accuracy(REMOTE_ID, "Bob", 1.0, 2.0, 15.0),
            &mut canvas,
        );
        canvas.take();

        reconciler.apply(&ServerMessage::UserDisconnected { id: REMOTE_ID }, &mut canvas);
        let ops = canvas.take();
        assert_eq!(
            ops,
            vec![
                CanvasOp::RemoveMarker(REMOTE_ID),
                CanvasOp::RemoveCircle(REMOTE_ID),
                CanvasOp::SetUserList(vec![]),
            ]
        );
        assert!(!reconciler.presence().contains(REMOTE_ID));
    }

    #[test]
    fn second_disconnect_notice_is_a_noop() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(REMOTE_ID, "Bob", 1.0, 2.0), &mut canvas);
        reconciler.apply(&ServerMessage::UserDisconnected { id: REMOTE_ID }, &mut canvas);
        canvas.take();

        reconciler.apply(&ServerMessage::UserDisconnected { id: REMOTE_ID }, &mut canvas);
        // No removals left to do — just the idempotent list re-render.
        assert_eq!(canvas.ops, vec![CanvasOp::SetUserList(vec![])]);
    }

    #[test]
    fn rejected_ack_changes_nothing() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(
            &ServerMessage::LocationAck {
                ok: false,
                error: Some("Invalid coordinates".into()),
            },
            &mut canvas,
        );
        assert!(canvas.ops.is_empty());
        assert!(reconciler.presence().is_empty());
    }

    #[test]
    fn user_list_sorted_by_id() {
        let mut reconciler = MapReconciler::new(SELF_ID);
        let mut canvas = RecordingCanvas::default();

        reconciler.apply(&location(SessionId(9), "Iris", 1.0, 1.0), &mut canvas);
        reconciler.apply(&location(SessionId(3), "Cleo", 2.0, 2.0), &mut canvas);
        let ops = canvas.take();
        assert_eq!(
            ops.last(),
            Some(&CanvasOp::SetUserList(vec!["Cleo".into(), "Iris".into()]))
        );
    }
}
