//! Core library for the `tourwatch` tourist safety monitor.
//!
//! This crate defines:
//! - The tourist and weather data model
//! - Rule-based anomaly detection
//! - Abstraction over the weather source, with an Open-Meteo implementation
//! - The cancellable monitoring loop and its presentation sink seam
//! - Configuration handling
//!
//! It is used by `tourwatch-cli`, but can also be reused by other binaries or services.

pub mod anomaly;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod provider;

pub use anomaly::{Anomaly, Thresholds, evaluate};
pub use config::{Config, MonitorConfig, WeatherConfig};
pub use error::ModelError;
pub use model::{Coordinate, CurrentConditions, Itinerary, Tourist, WeatherObservation};
pub use monitor::{
    Clock, CycleReport, CycleStatus, Monitor, MonitorSettings, MonitorState, ReportSink, RunSummary,
    SystemClock,
};
pub use provider::{WeatherProvider, open_meteo::OpenMeteoProvider, provider_from_config};
