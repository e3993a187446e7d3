//! Rule-based anomaly detection for a single tourist.
//!
//! [`evaluate`] runs five independent rules in a fixed order and returns one
//! [`Anomaly`] per rule that fired:
//!
//! 1. prolonged inactivity
//! 2. route deviation from the itinerary
//! 3. GPS signal loss
//! 4. panic button
//! 5. risky weather
//!
//! The order is for stable display only; it carries no notion of severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, ser::SerializeStruct};
use std::fmt;

use crate::model::{Coordinate, Tourist, WeatherObservation};

/// Limits above which a rule fires. All comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub inactivity_minutes: f64,
    pub route_deviation_meters: f64,
    pub precipitation_mm: f64,
    pub wind_speed_kmh: f64,
}

impl Thresholds {
    pub const DEFAULT_INACTIVITY_MINUTES: f64 = 30.0;
    pub const DEFAULT_ROUTE_DEVIATION_METERS: f64 = 300.0;
    pub const DEFAULT_PRECIPITATION_MM: f64 = 5.0;
    pub const DEFAULT_WIND_SPEED_KMH: f64 = 15.0;
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            inactivity_minutes: Self::DEFAULT_INACTIVITY_MINUTES,
            route_deviation_meters: Self::DEFAULT_ROUTE_DEVIATION_METERS,
            precipitation_mm: Self::DEFAULT_PRECIPITATION_MM,
            wind_speed_kmh: Self::DEFAULT_WIND_SPEED_KMH,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// Whole minutes since the last confirmed activity.
    ProlongedInactivity { minutes: i64 },
    /// Whole meters between the current and the expected location.
    RouteDeviation { meters: u64 },
    GpsSignalLost { last_known: Option<Coordinate> },
    PanicButton,
    /// Raw observed values, both cited even if only one crossed its limit.
    RiskyWeather { precipitation_mm: f64, wind_speed_kmh: f64 },
}

impl Anomaly {
    /// Stable machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            Anomaly::ProlongedInactivity { .. } => "inactivity",
            Anomaly::RouteDeviation { .. } => "route_deviation",
            Anomaly::GpsSignalLost { .. } => "gps_lost",
            Anomaly::PanicButton => "panic",
            Anomaly::RiskyWeather { .. } => "weather_risk",
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ProlongedInactivity { minutes } => {
                write!(f, "Prolonged inactivity: {minutes} minutes")
            }
            Anomaly::RouteDeviation { meters } => {
                write!(f, "Route Deviation: {meters} meters away")
            }
            Anomaly::GpsSignalLost { last_known: Some(loc) } => {
                write!(f, "GPS Signal Lost near {loc} (tracking last known location)")
            }
            Anomaly::GpsSignalLost { last_known: None } => {
                f.write_str("GPS Signal Lost (no last known location available)")
            }
            Anomaly::PanicButton => f.write_str("Panic button activated!"),
            Anomaly::RiskyWeather { precipitation_mm, wind_speed_kmh } => write!(
                f,
                "Risky weather detected: {precipitation_mm} mm rain, {wind_speed_kmh} km/h wind"
            ),
        }
    }
}

// Reports carry anomalies as `{ "kind": ..., "message": ... }`.
impl Serialize for Anomaly {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Anomaly", 2)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Run every rule against `tourist` and `weather` as of `now`.
///
/// Pure: identical inputs always give identical output. Assumes `tourist`
/// has already been validated.
pub fn evaluate(
    tourist: &Tourist,
    weather: &WeatherObservation,
    now: DateTime<Utc>,
    thresholds: &Thresholds,
) -> Vec<Anomaly> {
    [
        check_inactivity(tourist, now, thresholds),
        check_route_deviation(tourist, thresholds),
        check_gps_signal(tourist),
        check_panic_button(tourist),
        check_weather(weather, thresholds),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn check_inactivity(
    tourist: &Tourist,
    now: DateTime<Utc>,
    thresholds: &Thresholds,
) -> Option<Anomaly> {
    let inactive_minutes = (now - tourist.last_active_time).num_milliseconds() as f64 / 60_000.0;

    (inactive_minutes > thresholds.inactivity_minutes).then(|| Anomaly::ProlongedInactivity {
        minutes: inactive_minutes.floor() as i64,
    })
}

fn check_route_deviation(tourist: &Tourist, thresholds: &Thresholds) -> Option<Anomaly> {
    let distance = tourist
        .current_location
        .distance_meters(&tourist.itinerary.expected_location);

    (distance > thresholds.route_deviation_meters).then(|| Anomaly::RouteDeviation {
        meters: distance.floor() as u64,
    })
}

fn check_gps_signal(tourist: &Tourist) -> Option<Anomaly> {
    (!tourist.gps_signal).then_some(Anomaly::GpsSignalLost {
        last_known: tourist.last_gps_signal_location,
    })
}

fn check_panic_button(tourist: &Tourist) -> Option<Anomaly> {
    tourist.panic_button_pressed.then_some(Anomaly::PanicButton)
}

fn check_weather(weather: &WeatherObservation, thresholds: &Thresholds) -> Option<Anomaly> {
    let precipitation_mm = weather.precipitation_mm();
    let wind_speed_kmh = weather.wind_speed_kmh();

    let risky = precipitation_mm > thresholds.precipitation_mm
        || wind_speed_kmh > thresholds.wind_speed_kmh;
    risky.then_some(Anomaly::RiskyWeather { precipitation_mm, wind_speed_kmh })
}
