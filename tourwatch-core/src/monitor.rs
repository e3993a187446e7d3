//! Fixed-count, cancellable monitoring loop.
//!
//! Each cycle fetches weather for the tourist's current location, evaluates
//! the anomaly rules against a fresh "now", hands a [`CycleReport`] to the
//! [`ReportSink`], then waits before the next cycle. The wait races a
//! [`CancellationToken`] so a caller can stop the run early.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    anomaly::{self, Anomaly, Thresholds},
    error::ModelError,
    model::{Coordinate, Tourist, WeatherObservation},
    provider::WeatherProvider,
};

pub const DEFAULT_CYCLES: u32 = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Source of "now" for each cycle.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub cycles: u32,
    /// Pause between cycles. Not applied after the last one.
    pub delay: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { cycles: DEFAULT_CYCLES, delay: DEFAULT_DELAY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "cycle", rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running(u32),
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Safe,
    AnomaliesDetected,
}

/// Everything the presentation side needs about one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 1-based.
    pub cycle: u32,
    pub total_cycles: u32,
    pub tourist_id: String,
    pub location: Coordinate,
    pub evaluated_at: DateTime<Utc>,
    pub weather: WeatherObservation,
    pub anomalies: Vec<Anomaly>,
    pub status: CycleStatus,
}

impl CycleReport {
    pub fn is_safe(&self) -> bool {
        self.status == CycleStatus::Safe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles_run: u32,
    pub cycles_with_anomalies: u32,
    pub final_state: MonitorState,
}

/// Receives monitoring output. Rendering lives entirely on this side.
///
/// Errors are logged by the monitor and never stop the run.
pub trait ReportSink {
    fn run_started(
        &mut self,
        _tourist: &Tourist,
        _settings: &MonitorSettings,
        _at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn cycle_completed(&mut self, report: &CycleReport) -> anyhow::Result<()>;

    fn run_finished(&mut self, _summary: &RunSummary) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Collects reports in memory.
impl ReportSink for Vec<CycleReport> {
    fn cycle_completed(&mut self, report: &CycleReport) -> anyhow::Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

pub struct Monitor {
    provider: Box<dyn WeatherProvider>,
    clock: Box<dyn Clock>,
    thresholds: Thresholds,
    settings: MonitorSettings,
    state: MonitorState,
}

impl Monitor {
    pub fn new(provider: Box<dyn WeatherProvider>) -> Self {
        Self {
            provider,
            clock: Box::new(SystemClock),
            thresholds: Thresholds::default(),
            settings: MonitorSettings::default(),
            state: MonitorState::Idle,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run a single cycle with no delay and no sink.
    pub async fn check(&self, tourist: &Tourist) -> Result<CycleReport, ModelError> {
        tourist.validate()?;
        Ok(self.run_cycle(1, 1, tourist).await)
    }

    /// Run up to `settings.cycles` cycles, stopping early once `cancel` fires.
    ///
    /// The tourist is validated before the first cycle; that is the only error.
    pub async fn run(
        &mut self,
        tourist: &Tourist,
        sink: &mut dyn ReportSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ModelError> {
        self.state = MonitorState::Idle;
        tourist.validate()?;

        let total = self.settings.cycles;
        let mut cycles_run = 0;
        let mut cycles_with_anomalies = 0;

        info!(
            tourist_id = %tourist.id,
            cycles = total,
            delay = ?self.settings.delay,
            "monitoring started"
        );
        if let Err(err) = sink.run_started(tourist, &self.settings, self.clock.now()) {
            warn!(error = %err, "report sink failed on run start");
        }

        for cycle in 1..=total {
            if cancel.is_cancelled() {
                self.state = MonitorState::Cancelled;
                break;
            }

            self.state = MonitorState::Running(cycle);
            let report = self.run_cycle(cycle, total, tourist).await;

            cycles_run += 1;
            if !report.is_safe() {
                cycles_with_anomalies += 1;
            }

            if let Err(err) = sink.cycle_completed(&report) {
                warn!(cycle, error = %err, "report sink rejected cycle report");
            }

            if cycle == total {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.delay) => {}
                _ = cancel.cancelled() => {
                    self.state = MonitorState::Cancelled;
                    break;
                }
            }
        }

        if self.state != MonitorState::Cancelled {
            self.state = MonitorState::Completed;
        }

        let summary = RunSummary { cycles_run, cycles_with_anomalies, final_state: self.state };
        info!(?summary, "monitoring finished");

        if let Err(err) = sink.run_finished(&summary) {
            warn!(error = %err, "report sink failed on run finish");
        }

        Ok(summary)
    }

    async fn run_cycle(&self, cycle: u32, total_cycles: u32, tourist: &Tourist) -> CycleReport {
        let location = tourist.current_location;
        let weather = self.provider.current_weather(location).await;

        let now = self.clock.now();
        let anomalies = anomaly::evaluate(tourist, &weather, now, &self.thresholds);

        let status =
            if anomalies.is_empty() { CycleStatus::Safe } else { CycleStatus::AnomaliesDetected };

        debug!(cycle, weather_available = weather.is_available(), "cycle evaluated");
        info!(cycle, total_cycles, anomalies = anomalies.len(), ?status, "cycle complete");

        CycleReport {
            cycle,
            total_cycles,
            tourist_id: tourist.id.clone(),
            location,
            evaluated_at: now,
            weather,
            anomalies,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurrentConditions, Itinerary};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    };

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    /// Hands out scripted observations, then repeats the last one.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        script: Mutex<Vec<WeatherObservation>>,
        calls: Arc<AtomicUsize>,
        locations: Arc<Mutex<Vec<Coordinate>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<WeatherObservation>) -> Self {
            Self { script: Mutex::new(script), ..Default::default() }
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn current_weather(&self, location: Coordinate) -> WeatherObservation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.locations.lock().unwrap().push(location);

            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().cloned().unwrap_or(WeatherObservation::Unavailable)
            }
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Advances one minute on every read.
    struct SteppingClock {
        start: DateTime<Utc>,
        reads: AtomicI64,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            self.start + ChronoDuration::minutes(n)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        started: Option<DateTime<Utc>>,
        reports: Vec<CycleReport>,
        summary: Option<RunSummary>,
    }

    impl ReportSink for RecordingSink {
        fn run_started(
            &mut self,
            _tourist: &Tourist,
            _settings: &MonitorSettings,
            at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.started = Some(at);
            Ok(())
        }

        fn cycle_completed(&mut self, report: &CycleReport) -> anyhow::Result<()> {
            self.reports.push(report.clone());
            Ok(())
        }

        fn run_finished(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
            self.summary = Some(*summary);
            Ok(())
        }
    }

    struct FailingSink {
        attempts: u32,
    }

    impl ReportSink for FailingSink {
        fn cycle_completed(&mut self, _report: &CycleReport) -> anyhow::Result<()> {
            self.attempts += 1;
            anyhow::bail!("display went away")
        }
    }

    fn tourist(last_active_minutes_ago: i64) -> Tourist {
        let here = Coordinate::new(27.172, 78.042).unwrap();
        let itinerary = Itinerary::new(
            here,
            "monument",
            base_time() - ChronoDuration::hours(1),
            base_time() + ChronoDuration::hours(1),
        )
        .unwrap();
        let last_active = base_time() - ChronoDuration::minutes(last_active_minutes_ago);
        Tourist::new("T1001", here, last_active, itinerary)
    }

    fn rain(mm: f64) -> WeatherObservation {
        WeatherObservation::Available(CurrentConditions {
            precipitation: Some(mm),
            wind_speed_10m: Some(4.0),
            ..Default::default()
        })
    }

    fn settings(cycles: u32, delay_secs: u64) -> MonitorSettings {
        MonitorSettings { cycles, delay: Duration::from_secs(delay_secs) }
    }

    #[tokio::test]
    async fn runs_all_cycles_and_reports_each() {
        let provider = ScriptedProvider::new(vec![rain(0.0), rain(9.0), rain(0.0)]);
        let calls = provider.calls.clone();
        let locations = provider.locations.clone();

        let mut monitor = Monitor::new(Box::new(provider))
            .with_clock(FixedClock(base_time()))
            .with_settings(settings(3, 0));
        let mut sink = RecordingSink::default();

        let summary = monitor
            .run(&tourist(10), &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(locations.lock().unwrap().iter().all(|loc| loc.latitude == 27.172));
        assert_eq!(
            summary,
            RunSummary {
                cycles_run: 3,
                cycles_with_anomalies: 1,
                final_state: MonitorState::Completed,
            }
        );
        assert_eq!(monitor.state(), MonitorState::Completed);

        let cycles: Vec<_> = sink.reports.iter().map(|r| r.cycle).collect();
        assert_eq!(cycles, vec![1, 2, 3]);
        assert!(sink.reports[0].is_safe());
        assert_eq!(sink.reports[1].status, CycleStatus::AnomaliesDetected);
        assert_eq!(sink.reports[1].anomalies[0].kind(), "weather_risk");
        assert_eq!(sink.reports[2].total_cycles, 3);
        assert_eq!(sink.started, Some(base_time()));
        assert_eq!(sink.summary, Some(summary));
    }

    #[tokio::test]
    async fn now_is_read_fresh_each_cycle() {
        let provider = ScriptedProvider::new(vec![rain(0.0)]);
        // Read 0 is the run-start banner; cycles read at +1, +2, +3 minutes.
        let clock = SteppingClock { start: base_time(), reads: AtomicI64::new(0) };

        let mut monitor =
            Monitor::new(Box::new(provider)).with_clock(clock).with_settings(settings(3, 0));
        let mut reports: Vec<CycleReport> = Vec::new();

        monitor.run(&tourist(29), &mut reports, &CancellationToken::new()).await.unwrap();

        let messages: Vec<Vec<String>> = reports
            .iter()
            .map(|r| r.anomalies.iter().map(ToString::to_string).collect())
            .collect();
        assert_eq!(
            messages,
            vec![
                vec![],
                vec!["Prolonged inactivity: 31 minutes".to_string()],
                vec!["Prolonged inactivity: 32 minutes".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn unavailable_weather_still_evaluates_other_rules() {
        let provider = ScriptedProvider::new(vec![WeatherObservation::Unavailable]);
        let mut monitor = Monitor::new(Box::new(provider))
            .with_clock(FixedClock(base_time()))
            .with_settings(settings(1, 0));

        let mut t = tourist(5);
        t.panic_button_pressed = true;
        let mut reports: Vec<CycleReport> = Vec::new();

        monitor.run(&t, &mut reports, &CancellationToken::new()).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].weather, WeatherObservation::Unavailable);
        assert_eq!(reports[0].anomalies, vec![Anomaly::PanicButton]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_cycles_but_not_after_the_last() {
        let mut monitor = Monitor::new(Box::new(ScriptedProvider::new(vec![rain(0.0)])))
            .with_clock(FixedClock(base_time()))
            .with_settings(settings(3, 5));
        let mut reports: Vec<CycleReport> = Vec::new();

        let started = tokio::time::Instant::now();
        monitor.run(&tourist(0), &mut reports, &CancellationToken::new()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(reports.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_delay() {
        let mut monitor = Monitor::new(Box::new(ScriptedProvider::new(vec![rain(0.0)])))
            .with_clock(FixedClock(base_time()))
            .with_settings(settings(10, 5));
        let mut sink = RecordingSink::default();
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let t = tourist(0);
        let (summary, _) = tokio::join!(monitor.run(&t, &mut sink, &cancel), async {
            tokio::time::sleep(Duration::from_secs(7)).await;
            cancel.cancel();
        });

        let summary = summary.unwrap();
        assert_eq!(summary.cycles_run, 2);
        assert_eq!(summary.final_state, MonitorState::Cancelled);
        assert_eq!(started.elapsed(), Duration::from_secs(7));
        assert_eq!(sink.summary.map(|s| s.final_state), Some(MonitorState::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_no_cycles() {
        let provider = ScriptedProvider::new(vec![rain(0.0)]);
        let calls = provider.calls.clone();
        let mut monitor = Monitor::new(Box::new(provider)).with_settings(settings(4, 0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut reports: Vec<CycleReport> = Vec::new();
        let summary = monitor.run(&tourist(0), &mut reports, &cancel).await.unwrap();

        assert_eq!(summary.cycles_run, 0);
        assert_eq!(summary.final_state, MonitorState::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sink_errors_do_not_stop_the_loop() {
        let mut monitor = Monitor::new(Box::new(ScriptedProvider::new(vec![rain(0.0)])))
            .with_settings(settings(3, 0));
        let mut sink = FailingSink { attempts: 0 };

        let summary = monitor.run(&tourist(0), &mut sink, &CancellationToken::new()).await.unwrap();

        assert_eq!(sink.attempts, 3);
        assert_eq!(summary.final_state, MonitorState::Completed);
    }

    #[tokio::test]
    async fn invalid_tourist_fails_before_running() {
        let provider = ScriptedProvider::new(vec![rain(0.0)]);
        let calls = provider.calls.clone();
        let mut monitor = Monitor::new(Box::new(provider)).with_settings(settings(2, 0));

        let mut t = tourist(0);
        t.current_location = Coordinate { latitude: 0.0, longitude: 200.0 };
        let mut reports: Vec<CycleReport> = Vec::new();

        let err = monitor.run(&t, &mut reports, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, ModelError::InvalidLongitude(200.0));
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn check_runs_a_single_cycle() {
        let monitor = Monitor::new(Box::new(ScriptedProvider::new(vec![rain(6.0)])))
            .with_clock(FixedClock(base_time()));

        let report = monitor.check(&tourist(45)).await.unwrap();

        assert_eq!((report.cycle, report.total_cycles), (1, 1));
        assert_eq!(report.evaluated_at, base_time());
        let messages: Vec<String> = report.anomalies.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "Prolonged inactivity: 45 minutes",
                "Risky weather detected: 6 mm rain, 4 km/h wind",
            ]
        );
    }

    #[test]
    fn report_serializes_for_presentation() {
        let report = CycleReport {
            cycle: 2,
            total_cycles: 10,
            tourist_id: "T1001".into(),
            location: Coordinate::new(1.5, 2.5).unwrap(),
            evaluated_at: base_time(),
            weather: WeatherObservation::Unavailable,
            anomalies: vec![Anomaly::PanicButton],
            status: CycleStatus::AnomaliesDetected,
        };

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["cycle"], 2);
        assert_eq!(json["location"]["latitude"], 1.5);
        assert_eq!(json["weather"]["status"], "unavailable");
        assert_eq!(json["anomalies"][0]["kind"], "panic");
        assert_eq!(json["status"], "anomalies_detected");
    }
}
