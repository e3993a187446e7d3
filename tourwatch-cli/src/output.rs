//! Presentation sinks for monitoring output.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use tourwatch_core::{
    CycleReport, MonitorSettings, MonitorState, ReportSink, RunSummary, Tourist,
    WeatherObservation,
};

/// Plain-text rendering, one block per cycle.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn run_started(
        &mut self,
        tourist: &Tourist,
        settings: &MonitorSettings,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        writeln!(
            self.out,
            "Monitoring started at {} ({} cycles, {}s apart)",
            at.with_timezone(&Local).format("%H:%M:%S"),
            settings.cycles,
            settings.delay.as_secs(),
        )?;
        writeln!(
            self.out,
            "Itinerary: {} at {}",
            tourist.itinerary.location_type, tourist.itinerary.expected_location
        )?;
        Ok(())
    }

    fn cycle_completed(&mut self, report: &CycleReport) -> anyhow::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Cycle {}", report.cycle)?;
        writeln!(self.out, "Tourist {} | Location: {}", report.tourist_id, report.location)?;
        writeln!(self.out, "Weather: {}", describe_weather(&report.weather))?;

        if report.is_safe() {
            writeln!(self.out, "No anomalies detected. Tourist is safe.")?;
        } else {
            writeln!(self.out, "Anomalies Detected:")?;
            for anomaly in &report.anomalies {
                writeln!(self.out, " - {anomaly}")?;
            }
        }

        self.out.flush()?;
        Ok(())
    }

    fn run_finished(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
        let verb = match summary.final_state {
            MonitorState::Cancelled => "cancelled",
            _ => "completed",
        };
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Monitoring {verb} after {} cycle(s), {} with anomalies.",
            summary.cycles_run, summary.cycles_with_anomalies
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON object per cycle, newline-delimited.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn cycle_completed(&mut self, report: &CycleReport) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, report)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn describe_weather(weather: &WeatherObservation) -> String {
    let Some(current) = weather.current() else {
        return "unavailable".to_string();
    };

    let temperature = current
        .temperature_2m
        .map(|t| format!("{t} °C"))
        .unwrap_or_else(|| "? °C".to_string());
    let daylight = match current.is_daytime() {
        Some(true) => ", day",
        Some(false) => ", night",
        None => "",
    };

    format!(
        "{temperature}, {} mm rain, {} km/h wind{daylight}",
        weather.precipitation_mm(),
        weather.wind_speed_kmh()
    )
}
