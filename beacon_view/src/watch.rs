// Cancellable geolocation subscription.
//
// The geolocation provider (a browser watch, a GPS daemon, a test fixture)
// gets the `GeoFeed` half and pushes samples; the view loop holds `GeoWatch`
// and drains it non-blocking, alongside the network inbox. The two sources
// stay independent — one single-threaded loop consumes both, so presence
// state is never mutated concurrently.
//
// `stop()` tears the subscription down completely: queued samples are
// discarded, `GeoFeed::push` reports the subscription dead, and nothing is
// produced afterwards. Toggling sharing back on is a fresh `watch()` pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use beacon_protocol::message::RawFix;

/// One geolocation sample, in the shape providers report: required
/// coordinates plus whatever telemetry the source had for this fix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: Option<f64>,
}

/// A sample forwards to the hub as-is; validation is the hub's job.
impl From<GeoSample> for RawFix {
    fn from(sample: GeoSample) -> Self {
        RawFix {
            latitude: Some(sample.latitude),
            longitude: Some(sample.longitude),
            accuracy: sample.accuracy,
            speed: sample.speed,
            heading: sample.heading,
            timestamp: sample.timestamp,
        }
    }
}

/// Consumer half, owned by the view loop.
pub struct GeoWatch {
    inbox: Receiver<GeoSample>,
    cancelled: Arc<AtomicBool>,
}

/// Provider half — hand this to whatever produces position fixes.
#[derive(Clone)]
pub struct GeoFeed {
    tx: Sender<GeoSample>,
    cancelled: Arc<AtomicBool>,
}

/// Open a new subscription.
pub fn watch() -> (GeoWatch, GeoFeed) {
    let (tx, rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    (
        GeoWatch {
            inbox: rx,
            cancelled: cancelled.clone(),
        },
        GeoFeed { tx, cancelled },
    )
}

impl GeoWatch {
    /// Drain all pending samples (non-blocking). Always empty once stopped.
    pub fn poll(&self) -> Vec<GeoSample> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Vec::new();
        }
        let mut samples = Vec::new();
        while let Ok(sample) = self.inbox.try_recv() {
            samples.push(sample);
        }
        samples
    }

    /// Cancel the subscription. Samples already queued and anything pushed
    /// later are dropped; `GeoFeed::push` starts returning `false` so the
    /// provider can release its underlying source.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once `stop()` has been called.
    pub fn is_stopped(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl GeoFeed {
    /// Push a sample. Returns `false` once the watch is stopped or dropped —
    /// the provider's signal to unsubscribe.
    pub fn push(&self, sample: GeoSample) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(sample).is_ok()
    }
}
