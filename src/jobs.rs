//! One entry point per long-running process or batch job.
//!
//! Every job takes its collaborators (store, bus, shutdown flag) as
//! arguments, and batch jobs take the current time explicitly, so the same
//! code runs against the hosted backends in production and the in-memory
//! ones in tests.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{Duration, Local, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::analytics::{EfficiencyProof, EnergyTotals};
use crate::config::{ConfigError, MicrogridConfig};
use crate::error::{JobError, Result};
use crate::forecast::{Forecast, Forecaster};
use crate::io::export::export_csv;
use crate::report::PerformanceReport;
use crate::rules::batch::WindowSummary;
use crate::rules::stream::{PollOutcome, StreamingDetector};
use crate::rules::{Alert, RuleSet};
use crate::shutdown::Shutdown;
use crate::sim::clock::{MonotonicStamp, TickClock};
use crate::sim::{Generator, SimulatorState};
use crate::store::{self, Store};
use crate::telemetry::{DecodedReadings, Reading, decode_readings};
use crate::transport::{InMemoryBus, Message, PubSub, TransportError};
use crate::weather::{Weather, fallback_weather};

/// How long the ingest bridge blocks on the bus before rechecking shutdown.
const INGEST_WAIT: StdDuration = StdDuration::from_secs(1);

/// Current local wall-clock time, the clock every job stamps records with.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Options for [`run_simulator`].
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    /// Stop after this many ticks; run until interrupted when `None`.
    pub ticks: Option<u64>,
    /// Stamp ticks `start + n * tick` instead of wall-clock time.
    pub start: Option<NaiveDateTime>,
    /// Sleep one tick between readings.
    pub wait: bool,
}

impl SimulateOptions {
    /// Live run: wall-clock stamps, one reading per tick, until interrupted.
    pub fn live() -> Self {
        Self {
            ticks: None,
            start: None,
            wait: true,
        }
    }
}

/// What a simulator run did.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub published: u64,
    pub final_state: SimulatorState,
}

fn out_of_range(field: &'static str) -> JobError {
    JobError::Config(ConfigError::new(
        field,
        "spans beyond the representable date range",
    ))
}

fn tick_length(cfg: &MicrogridConfig) -> Result<Duration> {
    i64::try_from(cfg.simulation.tick_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| out_of_range("simulation.tick_secs"))
}

/// `now` minus `span`, or a config error naming `field` when the result is
/// not a representable timestamp.
fn window_start(
    now: NaiveDateTime,
    span: Option<Duration>,
    field: &'static str,
) -> Result<NaiveDateTime> {
    span.and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| out_of_range(field))
}

/// Start time such that `ticks` readings end at `end`.
///
/// # Errors
///
/// Returns a `JobError::Config` if the span does not fit the date range.
pub fn backfill_start(
    cfg: &MicrogridConfig,
    ticks: u64,
    end: NaiveDateTime,
) -> Result<NaiveDateTime> {
    let span = ticks
        .checked_mul(cfg.simulation.tick_secs)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds);
    window_start(end, span, "simulation.tick_secs")
}

fn publish_reading(bus: &dyn PubSub, topic: &str, reading: &Reading) -> Result<()> {
    let payload = reading.to_json()?;
    bus.publish(topic, payload.as_bytes())?;
    Ok(())
}

/// Runs the telemetry generator and publishes every reading.
///
/// Weather is held constant for the whole run. A failed publish is logged
/// and the loop moves on; the bus is disconnected on every exit path.
///
/// # Errors
///
/// Returns a `JobError` if a reading cannot be encoded or the tick length
/// is out of range.
pub fn run_simulator(
    cfg: &MicrogridConfig,
    bus: &mut dyn PubSub,
    weather: Weather,
    opts: &SimulateOptions,
    shutdown: &Shutdown,
) -> Result<SimulationSummary> {
    let mut generator = Generator::from_config(cfg);
    let mut state = SimulatorState::new(cfg.simulation.initial_soc_percent);
    let tick = tick_length(cfg)?;
    let tick_std = StdDuration::from_secs(cfg.simulation.tick_secs);

    let mut nominal = opts.start.map(|start| match opts.ticks {
        Some(total) => TickClock::bounded(start, tick, total),
        None => TickClock::unbounded(start, tick),
    });
    let mut wall = MonotonicStamp::new();

    info!(
        topic = %cfg.broker.topic,
        wind_speed_ms = weather.wind_speed_ms,
        cloud_cover_percent = weather.cloud_cover_percent,
        "simulator started"
    );

    let mut ticks = 0_u64;
    let mut published = 0_u64;
    let result = loop {
        if shutdown.is_triggered() || opts.ticks.is_some_and(|total| ticks >= total) {
            break Ok(());
        }
        let at = match nominal.as_mut() {
            Some(clock) => match clock.tick() {
                Some((_, at)) => at,
                None => break Ok(()),
            },
            None => wall.next(now()),
        };

        let (next, reading) = generator.tick(state, &weather, at);
        state = next;
        ticks += 1;

        match publish_reading(bus, &cfg.broker.topic, &reading) {
            Ok(()) => {
                published += 1;
                info!("{reading}");
            }
            Err(JobError::Transport(err)) => warn!(%err, "publish failed, reading dropped"),
            Err(err) => break Err(err),
        }

        if opts.wait && !shutdown.sleep(tick_std) {
            break Ok(());
        }
    };

    if let Err(err) = bus.disconnect() {
        warn!(%err, "disconnect failed");
    }
    info!(ticks, published, "simulator stopped");

    result.map(|()| SimulationSummary {
        ticks,
        published,
        final_state: state,
    })
}

/// Result of handling one bus message.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Nothing arrived before the timeout.
    Idle,
    /// A reading was appended to `live_data`.
    Stored(Reading),
    /// The payload was not a valid reading and was dropped.
    Dropped,
}

fn store_message(store: &dyn Store, message: &Message) -> Result<IngestOutcome> {
    let reading = match Reading::from_json(&message.payload) {
        Ok(reading) => reading,
        Err(err) => {
            warn!(%err, topic = %message.topic, "dropping malformed payload");
            return Ok(IngestOutcome::Dropped);
        }
    };
    store::append_record(store, store::LIVE_DATA, &reading)?;
    debug!(timestamp = %reading.timestamp, "stored reading");
    Ok(IngestOutcome::Stored(reading))
}

/// Waits up to `timeout` for one message and stores it.
///
/// # Errors
///
/// Returns a `JobError` if the bus is closed or the store write fails.
pub fn ingest_pending(
    bus: &mut dyn PubSub,
    store: &dyn Store,
    timeout: StdDuration,
) -> Result<IngestOutcome> {
    match bus.next_message(timeout)? {
        Some(message) => store_message(store, &message),
        None => Ok(IngestOutcome::Idle),
    }
}

/// Bridges the telemetry topic into `live_data` until interrupted.
///
/// Malformed payloads and failed store writes are logged and skipped. The
/// bus is disconnected on exit.
///
/// # Returns
///
/// The number of readings stored.
///
/// # Errors
///
/// Returns a `JobError` if the subscription fails or the bus closes.
pub fn run_ingest(
    cfg: &MicrogridConfig,
    bus: &mut dyn PubSub,
    store: &dyn Store,
    shutdown: &Shutdown,
) -> Result<u64> {
    bus.subscribe(&cfg.broker.topic)?;
    info!(topic = %cfg.broker.topic, "ingest bridge listening");

    let mut stored = 0_u64;
    let result = loop {
        if shutdown.is_triggered() {
            break Ok(());
        }
        match ingest_pending(bus, store, INGEST_WAIT) {
            Ok(IngestOutcome::Stored(_)) => stored += 1,
            Ok(IngestOutcome::Idle | IngestOutcome::Dropped) => {}
            Err(JobError::Transport(TransportError::Closed)) => {
                break Err(JobError::Transport(TransportError::Closed));
            }
            Err(err) => warn!(%err, "ingest failed, reading lost"),
        }
    };

    if let Err(err) = bus.disconnect() {
        warn!(%err, "disconnect failed");
    }
    info!(stored, "ingest bridge stopped");
    result.map(|()| stored)
}

/// Streaming rules engine: polls the newest reading until interrupted.
///
/// Any error during a poll is logged and the next poll happens after the
/// usual delay.
pub fn run_rules_engine(cfg: &MicrogridConfig, store: &dyn Store, shutdown: &Shutdown) {
    let mut detector = StreamingDetector::new(RuleSet::new(&cfg.rules));
    let interval = StdDuration::from_secs(cfg.rules.poll_interval_secs);
    info!(poll_interval_secs = cfg.rules.poll_interval_secs, "rules engine running");

    loop {
        match detector.poll_once(store, now()) {
            Ok(PollOutcome::NoData) => info!("waiting for data"),
            Ok(PollOutcome::Duplicate(ts)) => debug!(timestamp = %ts, "no new reading"),
            Ok(PollOutcome::Processed { alerts, .. }) => {
                debug!(alerts = alerts.len(), "reading evaluated");
            }
            Err(err) => error!(%err, "rules engine poll failed"),
        }
        if !shutdown.sleep(interval) {
            break;
        }
    }
    info!("rules engine stopped");
}

/// Reads every stored reading.
///
/// # Errors
///
/// Returns a `JobError` if the store read fails.
pub fn load_readings(store: &dyn Store) -> Result<DecodedReadings> {
    let all = store.get(store::LIVE_DATA)?;
    let decoded = match &all {
        Some(Value::Object(children)) => decode_readings(children.values()),
        _ => DecodedReadings::default(),
    };
    if decoded.skipped > 0 {
        warn!(skipped = decoded.skipped, "skipped malformed readings");
    }
    Ok(decoded)
}

/// Energy totals over every stored record.
///
/// Aggregation reads only the energy fields, so records too incomplete to
/// decode as full readings still count here.
fn load_totals(cfg: &MicrogridConfig, store: &dyn Store) -> Result<EnergyTotals> {
    let all = store.get(store::LIVE_DATA)?;
    let records: Vec<&Value> = match &all {
        Some(Value::Object(children)) => children.values().collect(),
        _ => Vec::new(),
    };
    let totals = EnergyTotals::from_records(
        records,
        cfg.simulation.interval_hours(),
        &RuleSet::new(&cfg.rules),
    );
    if totals.skipped > 0 {
        warn!(skipped = totals.skipped, "skipped records without energy fields");
    }
    Ok(totals)
}

fn readings_since(store: &dyn Store, start: NaiveDateTime) -> Result<DecodedReadings> {
    let start = serde_json::to_value(start)?;
    let hits = store.query_range(store::LIVE_DATA, store::TIMESTAMP_FIELD, &start)?;
    let decoded = decode_readings(hits.values());
    if decoded.skipped > 0 {
        warn!(skipped = decoded.skipped, "skipped malformed readings");
    }
    Ok(decoded)
}

/// Outcome of one batch analytics run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: WindowSummary,
    pub alerts: Vec<Alert>,
}

/// Batch analytics over the trailing window ending at `now`.
///
/// Counts events, appends rate alerts, and returns the window summary.
///
/// # Errors
///
/// Returns `JobError::NotEnoughData` for an empty window, or a store error.
pub fn run_batch_analytics(
    cfg: &MicrogridConfig,
    store: &dyn Store,
    now: NaiveDateTime,
) -> Result<BatchOutcome> {
    let window = cfg.rules.batch_window_minutes;
    let since = window_start(now, Duration::try_minutes(window), "rules.batch_window_minutes")?;
    let decoded = readings_since(store, since)?;
    if decoded.readings.is_empty() {
        return Err(JobError::NotEnoughData {
            job: "analytics",
            found: 0,
            required: 1,
        });
    }
    info!(readings = decoded.readings.len(), window_minutes = window, "analysing window");

    let summary = WindowSummary::from_readings(&RuleSet::new(&cfg.rules), &decoded.readings);
    let alerts = summary.rate_alerts(cfg.rules.rate_alert_threshold, window, now);
    for alert in &alerts {
        store::append_record(store, store::ALERTS, alert)?;
        warn!(severity = %alert.severity, "{}", alert.message);
    }
    Ok(BatchOutcome { summary, alerts })
}

/// Recomputes the efficiency proof from the full history and overwrites it.
///
/// # Errors
///
/// Returns `JobError::NotEnoughData` below the configured minimum, or a
/// store error.
pub fn run_efficiency(
    cfg: &MicrogridConfig,
    store: &dyn Store,
    now: NaiveDateTime,
) -> Result<EfficiencyProof> {
    let totals = load_totals(cfg, store)?;
    let required = cfg.efficiency.min_readings;
    if totals.readings < required {
        return Err(JobError::NotEnoughData {
            job: "efficiency",
            found: totals.readings,
            required,
        });
    }

    info!(
        generated_kwh = totals.generated_kwh,
        consumed_kwh = totals.consumed_kwh,
        wasted_kwh = totals.wasted_kwh,
        "energy totals"
    );

    let proof = EfficiencyProof::from_totals(&totals, cfg.efficiency.recovery_factor, now);
    store::overwrite_record(store, store::EFFICIENCY_PROOF, &proof)?;
    info!(improvement_percent = proof.improvement_percent, "efficiency proof saved");
    Ok(proof)
}

/// Fits the forecaster on the training window and overwrites the forecast.
///
/// # Errors
///
/// Returns a `JobError` wrapping `ForecastError::NotEnoughData` when the
/// window is too sparse, or a store error.
pub fn run_forecast(
    cfg: &MicrogridConfig,
    store: &dyn Store,
    now: NaiveDateTime,
) -> Result<Forecast> {
    let since = window_start(
        now,
        Duration::try_days(cfg.forecast.training_days),
        "forecast.training_days",
    )?;
    let decoded = readings_since(store, since)?;
    info!(readings = decoded.readings.len(), "training forecaster");

    let forecast = Forecaster::new(&cfg.forecast).forecast(&decoded.readings, now)?;
    store::overwrite_record(store, store::PREDICTIONS, &forecast)?;
    info!(
        predicted_total_kwh = forecast.predicted_total_kwh,
        mae_kw = forecast.model_evaluation.mean_absolute_error_kw,
        "forecast saved"
    );
    Ok(forecast)
}

/// Builds the performance report from the full history and overwrites it.
///
/// # Errors
///
/// Returns `JobError::NotEnoughData` below the configured minimum, or a
/// store error.
pub fn run_report(
    cfg: &MicrogridConfig,
    store: &dyn Store,
    now: NaiveDateTime,
) -> Result<PerformanceReport> {
    let totals = load_totals(cfg, store)?;
    let required = cfg.report.min_readings;
    if totals.readings < required {
        return Err(JobError::NotEnoughData {
            job: "report",
            found: totals.readings,
            required,
        });
    }

    let report = PerformanceReport::from_totals(
        &totals,
        &cfg.report,
        cfg.simulation.tick_secs,
        cfg.efficiency.recovery_factor,
        now,
    );
    store::overwrite_record(store, store::LATEST_REPORT, &report)?;
    info!("report saved to {}", store::LATEST_REPORT);
    Ok(report)
}

/// Writes every stored reading to a CSV file, oldest first.
///
/// # Errors
///
/// Returns a `JobError` if the store read or the file write fails.
pub fn export_readings(store: &dyn Store, path: &Path) -> Result<usize> {
    let decoded = load_readings(store)?;
    export_csv(&decoded.readings, path)?;
    info!(rows = decoded.readings.len(), path = %path.display(), "readings exported");
    Ok(decoded.readings.len())
}

/// Everything one demo pipeline run produced.
#[derive(Debug, Clone)]
pub struct DemoSummary {
    pub readings: u64,
    pub live_alerts: usize,
    pub batch: Option<BatchOutcome>,
    pub efficiency: Option<EfficiencyProof>,
    pub forecast: Option<Forecast>,
    pub report: Option<PerformanceReport>,
}

/// Keeps the result of a batch job, treating "not enough data" as `None`.
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_enough_data() => {
            info!("{err}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Runs the whole pipeline in-process against `store`.
///
/// Readings are generated with nominal timestamps from `start`, published on
/// an in-memory bus, bridged into the store, and evaluated by the streaming
/// detector tick by tick. The batch jobs then run as of the last reading.
/// Weather is the seeded fallback, so a given configuration always yields
/// the same history.
///
/// # Errors
///
/// Returns a `JobError` if the bus or the store fails.
pub fn demo(
    cfg: &MicrogridConfig,
    store: &dyn Store,
    ticks: u64,
    start: NaiveDateTime,
) -> Result<DemoSummary> {
    let topic = &cfg.broker.topic;
    let publisher = InMemoryBus::new();
    let mut subscriber = publisher.connect();
    subscriber.subscribe(topic)?;

    let weather = fallback_weather(&mut StdRng::seed_from_u64(cfg.simulation.seed));
    let mut generator = Generator::from_config(cfg);
    let mut state = SimulatorState::new(cfg.simulation.initial_soc_percent);
    let mut detector = StreamingDetector::new(RuleSet::new(&cfg.rules));
    let mut clock = TickClock::bounded(start, tick_length(cfg)?, ticks);

    let mut readings = 0_u64;
    let mut live_alerts = 0_usize;
    let mut last = start;
    while let Some((_, at)) = clock.tick() {
        let (next, reading) = generator.tick(state, &weather, at);
        state = next;
        publish_reading(&publisher, topic, &reading)?;

        loop {
            match ingest_pending(&mut subscriber, store, StdDuration::ZERO)? {
                IngestOutcome::Stored(_) => readings += 1,
                IngestOutcome::Dropped => {}
                IngestOutcome::Idle => break,
            }
        }
        if let PollOutcome::Processed { alerts, .. } = detector.poll_once(store, at)? {
            live_alerts += alerts.len();
        }
        last = at;
    }
    subscriber.disconnect()?;
    info!(readings, live_alerts, "demo telemetry complete");

    Ok(DemoSummary {
        readings,
        live_alerts,
        batch: optional(run_batch_analytics(cfg, store, last))?,
        efficiency: optional(run_efficiency(cfg, store, last))?,
        forecast: optional(run_forecast(cfg, store, last))?,
        report: optional(run_report(cfg, store, last))?,
    })
}
