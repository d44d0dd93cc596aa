// Location fix validation.
//
// A `RawFix` arrives off the wire with every field optional (absent keys and
// JSON nulls both decode to `None`). `validate` either produces a `ValidFix`
// with the coordinate invariants established, or a `ValidationError` whose
// display text is the reason echoed back to the sender in the ack.
//
// Validation is a pure function: no clock, no registry, no side effects.
// Timestamp substitution for fixes that carried none is the hub's job.

use beacon_protocol::message::RawFix;
use thiserror::Error;

/// Why an inbound fix was rejected. The display text is sent to the client
/// verbatim in the `LocationAck`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Latitude or longitude missing, non-finite, or out of range.
    #[error("Invalid coordinates")]
    InvalidCoordinates,
}

/// A fix that passed validation. Coordinates are finite and in range;
/// telemetry fields are `Some` only when finite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub timestamp: Option<f64>,
}

/// Validate an inbound fix. Accepts iff latitude and longitude are both
/// present, finite, and within [-90, 90] / [-180, 180]. Optional telemetry
/// survives only when finite — absent and non-finite both come out as
/// `None`, never coerced to zero.
pub fn validate(fix: &RawFix) -> Result<ValidFix, ValidationError> {
    let latitude = in_range(fix.latitude, 90.0).ok_or(ValidationError::InvalidCoordinates)?;
    let longitude = in_range(fix.longitude, 180.0).ok_or(ValidationError::InvalidCoordinates)?;
    Ok(ValidFix {
        latitude,
        longitude,
        accuracy: finite(fix.accuracy),
        speed: finite(fix.speed),
        heading: finite(fix.heading),
        timestamp: finite(fix.timestamp),
    })
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn in_range(value: Option<f64>, bound: f64) -> Option<f64> {
    finite(value).filter(|v| v.abs() <= bound)
}
