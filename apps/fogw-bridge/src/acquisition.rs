//! The polling state machine.
//!
//! One worker owns the gateway source and all session state. Each cycle fetches, decodes
//! and normalizes one payload; transport and decode errors skip the cycle without a record.
//! A run of failures reaching the configured ceiling is reported once as a [`HardFailure`]
//! and polling continues so the loop recovers on its own when the gateway returns.

mod state;
mod stats;


pub use state::{AcquisitionState, Phase};
pub use stats::{AcquisitionStats, StatsSnapshot};

use crate::decode::decode;
use crate::error::{CycleError, HardFailure};
use crate::normalize::Normalizer;
use crate::record::{CanonicalReading, MeasurementRecord, Quantity};
use crate::transport::GatewaySource;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the host receives from a running loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AcquisitionEvent {
    Record(MeasurementRecord),
    HardFailure(HardFailure),
}

#[derive(Debug)]
pub enum CycleOutcome {
    Record(MeasurementRecord),
    Failed {
        error: CycleError,
        /// Set only on the cycle that crosses the failure ceiling.
        hard_failure: Option<HardFailure>,
    },
}

impl CycleOutcome {
    pub fn record(&self) -> Option<&MeasurementRecord> {
        match self {
            CycleOutcome::Record(record) => Some(record),
            CycleOutcome::Failed { .. } => None,
        }
    }

    fn into_event(self) -> Option<AcquisitionEvent> {
        match self {
            CycleOutcome::Record(record) => Some(AcquisitionEvent::Record(record)),
            CycleOutcome::Failed { hard_failure, .. } => {
                hard_failure.map(AcquisitionEvent::HardFailure)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    /// 0 disables escalation.
    pub max_consecutive_failures: u32,
}

/// Wall clock in whole Unix seconds, rounded to the nearest second.
pub fn epoch_seconds() -> i64 {
    (Utc::now().timestamp_millis() + 500).div_euclid(1000)
}

pub struct AcquisitionLoop<S> {
    source: S,
    normalizer: Normalizer,
    settings: LoopSettings,
    state: AcquisitionState,
    stats: Arc<AcquisitionStats>,
    clock: fn() -> i64,
}

impl<S: GatewaySource> AcquisitionLoop<S> {
    pub fn new(source: S, normalizer: Normalizer, settings: LoopSettings) -> Self {
        Self {
            source,
            normalizer,
            settings,
            state: AcquisitionState::new(),
            stats: Arc::new(AcquisitionStats::new()),
            clock: epoch_seconds,
        }
    }

    /// Replaces the wall clock used for record timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> Arc<AcquisitionStats> {
        self.stats.clone()
    }

    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    /// Runs exactly one cycle: fetch, decode, normalize, account.
    pub async fn poll_once(&mut self) -> CycleOutcome {
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.set_phase(Phase::Polling);

        match self.collect().await {
            Ok(record) => {
                let recovered_after = self.state.record_success(record.timestamp);
                self.stats.record_success(record.timestamp, record.is_empty());
                if recovered_after > 0 {
                    tracing::info!(
                        gateway = %self.source.describe(),
                        failed_cycles = recovered_after,
                        "gateway reachable again"
                    );
                }
                tracing::debug!(
                    timestamp = record.timestamp,
                    readings = record.len(),
                    "poll cycle produced a record"
                );
                self.stats.set_phase(self.state.phase());
                CycleOutcome::Record(record)
            }
            Err(error) => {
                let ceiling = self.settings.max_consecutive_failures;
                let hard_failure = self.state.record_failure(&error, ceiling);
                let consecutive = self.state.consecutive_failures();
                self.stats
                    .record_failure(error.kind(), consecutive, error.to_string());

                match &hard_failure {
                    Some(hard) => {
                        self.stats.hard_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            gateway = %self.source.describe(),
                            consecutive_failures = hard.consecutive_failures,
                            ceiling,
                            last_success = ?hard.last_success,
                            error = %error,
                            "gateway unavailable; hard failure"
                        );
                    }
                    None => tracing::warn!(
                        gateway = %self.source.describe(),
                        kind = error.kind().as_str(),
                        consecutive_failures = consecutive,
                        error = %error,
                        "poll cycle failed; skipping"
                    ),
                }
                self.stats.set_phase(self.state.phase());
                CycleOutcome::Failed {
                    error,
                    hard_failure,
                }
            }
        }
    }

    async fn collect(&mut self) -> Result<MeasurementRecord, CycleError> {
        let response = self.source.fetch().await?;
        let decoded = decode(&response.body)?;
        if !decoded.malformed.is_empty() {
            tracing::debug!(fields = ?decoded.malformed, "dropped malformed gateway fields");
        }

        let normalized = self.normalizer.normalize(&decoded.fields);
        self.stats
            .record_fields(decoded.malformed.len(), decoded.placeholders.len(), &normalized);

        if let Some(drift) = self.state.track_fields(decoded.field_ids()) {
            tracing::info!(
                added = ?drift.added,
                removed = ?drift.removed,
                "gateway field set changed"
            );
        }

        let system = self.normalizer.unit_system();
        let timestamp = self.state.stamp((self.clock)());
        let mut record = MeasurementRecord::new(timestamp, system);
        for reading in &normalized.readings {
            record.insert(*reading);
        }
        if let Some(rain) = self.state.rain_increment(&normalized.readings) {
            record.insert(CanonicalReading {
                quantity: Quantity::Rain,
                value: rain,
                unit: Quantity::Rain.canonical_unit(system),
            });
        }
        Ok(record)
    }

    /// Polls on a fixed schedule until cancelled or the receiver goes away.
    ///
    /// Each cycle is due one interval after the previous cycle started; a cycle that
    /// overruns makes the next one start immediately. Slow consumers block delivery but
    /// never cause a record to be dropped or reordered.
    pub async fn run(mut self, tx: mpsc::Sender<AcquisitionEvent>, cancel: CancellationToken) {
        let interval = self.settings.poll_interval;
        let mut next_poll = Instant::now();
        tracing::info!(
            gateway = %self.source.describe(),
            poll_interval_s = interval.as_secs_f64(),
            max_consecutive_failures = self.settings.max_consecutive_failures,
            unit_system = %self.normalizer.unit_system(),
            "acquisition loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_poll) => {}
            }

            let cycle_start = Instant::now();
            next_poll = cycle_start + interval;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.poll_once() => outcome,
            };

            if let Some(event) = outcome.into_event() {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = tx.send(event) => sent,
                };
                if sent.is_err() {
                    tracing::info!("record receiver dropped; stopping acquisition");
                    break;
                }
            }

            if Instant::now() > next_poll {
                tracing::debug!(
                    elapsed_ms = cycle_start.elapsed().as_millis() as u64,
                    "poll cycle overran the interval; polling again immediately"
                );
            }
            self.set_phase(Phase::Idle);
        }

        self.set_phase(Phase::Stopped);
        tracing::info!(
            cycles = self.stats.cycles.load(Ordering::Relaxed),
            records = self.stats.records.load(Ordering::Relaxed),
            "acquisition loop stopped"
        );
    }

    fn set_phase(&mut self, phase: Phase) {
        self.state.set_phase(phase);
        self.stats.set_phase(phase);
    }
}
