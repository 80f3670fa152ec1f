use super::state::Phase;
use crate::error::FailureKind;
use crate::normalize::Normalized;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

/// Counters shared between the acquisition task and whoever holds the record stream.
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    pub cycles: AtomicU64,
    pub records: AtomicU64,
    pub empty_records: AtomicU64,
    pub timeouts: AtomicU64,
    pub connection_errors: AtomicU64,
    pub gateway_errors: AtomicU64,
    pub decode_errors: AtomicU64,
    pub hard_failures: AtomicU64,
    pub malformed_fields: AtomicU64,
    pub placeholder_fields: AtomicU64,
    pub sentinel_fields: AtomicU64,
    pub anomalous_fields: AtomicU64,
    pub unknown_fields: AtomicU64,
    pub duplicate_fields: AtomicU64,
    pub consecutive_failures: AtomicU32,
    pub last_success: AtomicU64,
    phase: AtomicU8,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub phase: Phase,
    pub cycles: u64,
    pub records: u64,
    pub empty_records: u64,
    pub timeouts: u64,
    pub connection_errors: u64,
    pub gateway_errors: u64,
    pub decode_errors: u64,
    pub hard_failures: u64,
    pub malformed_fields: u64,
    pub placeholder_fields: u64,
    pub sentinel_fields: u64,
    pub anomalous_fields: u64,
    pub unknown_fields: u64,
    pub duplicate_fields: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<i64>,
    pub last_error: Option<String>,
}

impl AcquisitionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub(in crate::acquisition) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase.as_u8(), Ordering::Relaxed);
    }

    pub(in crate::acquisition) fn record_fields(
        &self,
        malformed: usize,
        placeholders: usize,
        normalized: &Normalized,
    ) {
        self.malformed_fields
            .fetch_add(malformed as u64, Ordering::Relaxed);
        self.placeholder_fields
            .fetch_add(placeholders as u64, Ordering::Relaxed);
        self.sentinel_fields
            .fetch_add(normalized.sentinels as u64, Ordering::Relaxed);
        self.anomalous_fields
            .fetch_add(normalized.anomalies as u64, Ordering::Relaxed);
        self.unknown_fields
            .fetch_add(normalized.unknown as u64, Ordering::Relaxed);
        self.duplicate_fields
            .fetch_add(normalized.duplicates as u64, Ordering::Relaxed);
    }

    pub(in crate::acquisition) fn record_success(&self, timestamp: i64, empty: bool) {
        self.records.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.empty_records.fetch_add(1, Ordering::Relaxed);
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_success
            .store(u64::try_from(timestamp).unwrap_or(0), Ordering::Relaxed);
        self.clear_error();
    }

    pub(in crate::acquisition) fn record_failure(
        &self,
        kind: FailureKind,
        consecutive_failures: u32,
        err: impl Into<String>,
    ) {
        let counter = match kind {
            FailureKind::Timeout => &self.timeouts,
            FailureKind::Connection => &self.connection_errors,
            FailureKind::Gateway => &self.gateway_errors,
            FailureKind::Decode => &self.decode_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures
            .store(consecutive_failures, Ordering::Relaxed);
        self.record_error(err);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn record_error(&self, err: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }

    pub fn clear_error(&self) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = None;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let last_success = self.last_success.load(Ordering::Relaxed);
        StatsSnapshot {
            phase: self.phase(),
            cycles: self.cycles.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            empty_records: self.empty_records.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            gateway_errors: self.gateway_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            hard_failures: self.hard_failures.load(Ordering::Relaxed),
            malformed_fields: self.malformed_fields.load(Ordering::Relaxed),
            placeholder_fields: self.placeholder_fields.load(Ordering::Relaxed),
            sentinel_fields: self.sentinel_fields.load(Ordering::Relaxed),
            anomalous_fields: self.anomalous_fields.load(Ordering::Relaxed),
            unknown_fields: self.unknown_fields.load(Ordering::Relaxed),
            duplicate_fields: self.duplicate_fields.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_success: (last_success > 0).then(|| last_success as i64),
            last_error: self.last_error(),
        }
    }
}
