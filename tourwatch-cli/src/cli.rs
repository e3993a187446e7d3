use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inquire::{CustomType, Text};
use tokio_util::sync::CancellationToken;
use tourwatch_core::{
    Config, Coordinate, Itinerary, Monitor, MonitorState, ReportSink, Tourist, provider_from_config,
};

use crate::output::{JsonSink, TextSink};

/// Offset between the current location and the demo itinerary stop, in degrees.
const EXPECTED_OFFSET_DEG: f64 = 0.002;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "tourwatch", version, about = "Tourist safety monitor")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG or TOURWATCH_LOG_LEVEL say otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitoring loop for a simulated tourist.
    Run {
        #[command(flatten)]
        tourist: TouristArgs,

        /// Number of cycles; defaults to the configured value.
        #[arg(long)]
        cycles: Option<u32>,

        /// Seconds between cycles; defaults to the configured value.
        #[arg(long)]
        delay_secs: Option<u64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Evaluate the simulated tourist once.
    Check {
        #[command(flatten)]
        tourist: TouristArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Interactively edit thresholds and monitor settings.
    Configure,

    /// Print the path of the config file.
    ConfigPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Inputs for the simulated tourist.
#[derive(Debug, Args)]
pub struct TouristArgs {
    #[arg(long, default_value = "T1001")]
    pub id: String,

    /// Current latitude.
    #[arg(long, default_value_t = 27.172, allow_negative_numbers = true)]
    pub lat: f64,

    /// Current longitude.
    #[arg(long, default_value_t = 78.042, allow_negative_numbers = true)]
    pub lon: f64,

    /// Itinerary latitude; defaults to slightly north-east of the current one.
    #[arg(long, allow_negative_numbers = true)]
    pub expected_lat: Option<f64>,

    /// Itinerary longitude; defaults to slightly north-east of the current one.
    #[arg(long, allow_negative_numbers = true)]
    pub expected_lon: Option<f64>,

    #[arg(long, default_value = "monument")]
    pub location_type: String,

    /// Minutes since the tourist was last active.
    #[arg(long, default_value_t = 15)]
    pub inactive_minutes: i64,

    /// Simulate a pressed panic button.
    #[arg(long)]
    pub panic: bool,

    /// Simulate GPS signal loss.
    #[arg(long)]
    pub no_gps: bool,

    /// Latitude where GPS was last seen.
    #[arg(long, requires = "last_gps_lon", allow_negative_numbers = true)]
    pub last_gps_lat: Option<f64>,

    /// Longitude where GPS was last seen.
    #[arg(long, requires = "last_gps_lat", allow_negative_numbers = true)]
    pub last_gps_lon: Option<f64>,
}

impl TouristArgs {
    pub fn build(&self, now: DateTime<Utc>) -> anyhow::Result<Tourist> {
        let current = Coordinate::new(self.lat, self.lon).context("Invalid current location")?;

        let expected = Coordinate::new(
            self.expected_lat.unwrap_or((self.lat + EXPECTED_OFFSET_DEG).min(90.0)),
            self.expected_lon.unwrap_or((self.lon + EXPECTED_OFFSET_DEG).min(180.0)),
        )
        .context("Invalid expected location")?;

        let itinerary = Itinerary::new(
            expected,
            self.location_type.clone(),
            now - ChronoDuration::hours(1),
            now + ChronoDuration::hours(1),
        )?;

        let last_active_time = ChronoDuration::try_minutes(self.inactive_minutes)
            .and_then(|idle| now.checked_sub_signed(idle))
            .context("Inactive minutes out of range")?;

        let mut tourist = Tourist::new(self.id.clone(), current, last_active_time, itinerary);
        tourist.panic_button_pressed = self.panic;
        tourist.gps_signal = !self.no_gps;
        tourist.last_gps_signal_location = match (self.last_gps_lat, self.last_gps_lon) {
            (Some(lat), Some(lon)) => {
                Some(Coordinate::new(lat, lon).context("Invalid last GPS location")?)
            }
            _ => None,
        };

        tourist.validate()?;
        Ok(tourist)
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = self.config;

        match self.command {
            Command::Run { tourist, cycles, delay_secs, format } => {
                let config = load_config(config_path.as_deref())?;
                config.log_config();

                let mut settings = config.monitor_settings();
                if let Some(cycles) = cycles {
                    settings.cycles = cycles;
                }
                if let Some(secs) = delay_secs {
                    settings.delay = Duration::from_secs(secs);
                }

                let tourist = tourist.build(Utc::now())?;
                let mut monitor = Monitor::new(provider_from_config(&config.weather)?)
                    .with_thresholds(config.thresholds)
                    .with_settings(settings);

                let cancel = CancellationToken::new();
                tokio::spawn({
                    let cancel = cancel.clone();
                    async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            tracing::info!("interrupt received, stopping after the current cycle");
                            cancel.cancel();
                        }
                    }
                });

                let mut sink = sink_for(format);
                let summary = monitor.run(&tourist, sink.as_mut(), &cancel).await?;

                if summary.final_state == MonitorState::Cancelled {
                    tracing::warn!(cycles_run = summary.cycles_run, "monitoring cancelled");
                }
            }
            Command::Check { tourist, format } => {
                let config = load_config(config_path.as_deref())?;
                config.log_config();

                let tourist = tourist.build(Utc::now())?;
                let monitor = Monitor::new(provider_from_config(&config.weather)?)
                    .with_thresholds(config.thresholds);

                let report = monitor.check(&tourist).await?;
                sink_for(format).cycle_completed(&report)?;
            }
            Command::Configure => {
                let mut config = load_config(config_path.as_deref())?;
                configure_interactively(&mut config)?;
                let saved_to = match config_path {
                    Some(path) => {
                        config.save_to(&path)?;
                        path
                    }
                    None => config.save()?,
                };
                println!("Saved configuration to {}", saved_to.display());
            }
            Command::ConfigPath => {
                let path = match config_path {
                    Some(path) => path,
                    None => Config::config_file_path()?,
                };
                println!("{}", path.display());
            }
        }

        Ok(())
    }
}

/// `--config` when given, otherwise the platform config file.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn sink_for(format: OutputFormat) -> Box<dyn ReportSink> {
    match format {
        OutputFormat::Text => Box::new(TextSink::new(io::stdout())),
        OutputFormat::Json => Box::new(JsonSink::new(io::stdout())),
    }
}

fn configure_interactively(config: &mut Config) -> anyhow::Result<()> {
    config.weather.base_url = Text::new("Weather API base URL:")
        .with_default(&config.weather.base_url)
        .prompt()?;

    let thresholds = &mut config.thresholds;
    thresholds.inactivity_minutes = CustomType::<f64>::new("Inactivity threshold (minutes):")
        .with_default(thresholds.inactivity_minutes)
        .prompt()?;
    thresholds.route_deviation_meters =
        CustomType::<f64>::new("Route deviation threshold (meters):")
            .with_default(thresholds.route_deviation_meters)
            .prompt()?;
    thresholds.precipitation_mm = CustomType::<f64>::new("Precipitation threshold (mm):")
        .with_default(thresholds.precipitation_mm)
        .prompt()?;
    thresholds.wind_speed_kmh = CustomType::<f64>::new("Wind speed threshold (km/h):")
        .with_default(thresholds.wind_speed_kmh)
        .prompt()?;

    config.monitor.cycles = CustomType::<u32>::new("Number of cycles:")
        .with_default(config.monitor.cycles)
        .prompt()?;
    config.monitor.delay_secs = CustomType::<u64>::new("Seconds between cycles:")
        .with_default(config.monitor.delay_secs)
        .prompt()?;

    Ok(())
}
