//! Typed precondition errors for tourist state.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Latitude {0} is outside the valid range [-90, 90]")]
    InvalidLatitude(f64),

    #[error("Longitude {0} is outside the valid range [-180, 180]")]
    InvalidLongitude(f64),

    #[error("Itinerary window start {start} must be before its end {end}")]
    InvalidTimeWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Tourist id must not be empty")]
    EmptyTouristId,
}
