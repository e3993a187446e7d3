use chrono::{DateTime, Utc};
use geo::{GeodesicDistance, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;

/// A WGS-84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ModelError> {
        let coord = Self { latitude, longitude };
        coord.validate()?;
        Ok(coord)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ModelError::InvalidLatitude(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ModelError::InvalidLongitude(self.longitude));
        }
        Ok(())
    }

    /// Surface distance in meters along the WGS-84 ellipsoid (Karney geodesic).
    pub fn distance_meters(&self, other: &Coordinate) -> f64 {
        self.to_point().geodesic_distance(&other.to_point())
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

// `{:?}` keeps the trailing `.0` on whole degrees, e.g. `(27.0, 78.5)`.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.latitude, self.longitude)
    }
}

/// Planned stop for the tourist.
///
/// The time window is carried for display and future gating; detection does
/// not read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub expected_location: Coordinate,
    pub location_type: String,
    pub time_window_start: DateTime<Utc>,
    pub time_window_end: DateTime<Utc>,
}

impl Itinerary {
    pub fn new(
        expected_location: Coordinate,
        location_type: impl Into<String>,
        time_window_start: DateTime<Utc>,
        time_window_end: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        let itinerary = Self {
            expected_location,
            location_type: location_type.into(),
            time_window_start,
            time_window_end,
        };
        itinerary.validate()?;
        Ok(itinerary)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.expected_location.validate()?;
        if self.time_window_start >= self.time_window_end {
            return Err(ModelError::InvalidTimeWindow {
                start: self.time_window_start,
                end: self.time_window_end,
            });
        }
        Ok(())
    }
}

/// Snapshot of one tourist's tracked state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tourist {
    pub id: String,
    pub current_location: Coordinate,
    /// Last recorded location. Not read by any detection rule.
    pub last_known_location: Coordinate,
    pub last_active_time: DateTime<Utc>,
    pub itinerary: Itinerary,
    pub panic_button_pressed: bool,
    pub gps_signal: bool,
    pub last_gps_signal_location: Option<Coordinate>,
}

impl Tourist {
    /// A tourist with GPS signal present, no panic, and the last known
    /// location equal to the current one.
    pub fn new(
        id: impl Into<String>,
        current_location: Coordinate,
        last_active_time: DateTime<Utc>,
        itinerary: Itinerary,
    ) -> Self {
        Self {
            id: id.into(),
            current_location,
            last_known_location: current_location,
            last_active_time,
            itinerary,
            panic_button_pressed: false,
            gps_signal: true,
            last_gps_signal_location: None,
        }
    }

    /// Check every coordinate and the itinerary window.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.trim().is_empty() {
            return Err(ModelError::EmptyTouristId);
        }
        self.current_location.validate()?;
        self.last_known_location.validate()?;
        if let Some(loc) = &self.last_gps_signal_location {
            loc.validate()?;
        }
        self.itinerary.validate()
    }
}

/// The `current` object returned by the weather source.
///
/// Every field may be missing. Keys we do not model (`time`, `interval`, ...)
/// are kept in `extra` so the raw mapping can be shown as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_2m: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed_10m: Option<f64>,

    /// 1 during daylight, 0 at night.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_day: Option<u8>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CurrentConditions {
    pub fn is_daytime(&self) -> Option<bool> {
        self.is_day.map(|flag| flag != 0)
    }
}

/// Result of one weather lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "current", rename_all = "snake_case")]
pub enum WeatherObservation {
    Available(CurrentConditions),
    /// The source could not be reached or answered with something unusable.
    Unavailable,
}

impl WeatherObservation {
    pub fn current(&self) -> Option<&CurrentConditions> {
        match self {
            WeatherObservation::Available(current) => Some(current),
            WeatherObservation::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, WeatherObservation::Available(_))
    }

    /// Precipitation in mm, zero when missing.
    pub fn precipitation_mm(&self) -> f64 {
        self.current().and_then(|c| c.precipitation).unwrap_or(0.0)
    }

    /// Wind speed at 10 m in km/h, zero when missing.
    pub fn wind_speed_kmh(&self) -> f64 {
        self.current().and_then(|c| c.wind_speed_10m).unwrap_or(0.0)
    }
}

impl From<CurrentConditions> for WeatherObservation {
    fn from(current: CurrentConditions) -> Self {
        WeatherObservation::Available(current)
    }
}
