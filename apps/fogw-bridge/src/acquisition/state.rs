use crate::error::{CycleError, HardFailure};
use crate::record::{CanonicalReading, Quantity};
use serde::Serialize;
use std::collections::BTreeSet;

/// Where the loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Polling,
    Success,
    SoftFailure,
    HardFailure,
    Stopped,
}

impl Phase {
    pub(in crate::acquisition) fn as_u8(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Polling => 1,
            Phase::Success => 2,
            Phase::SoftFailure => 3,
            Phase::HardFailure => 4,
            Phase::Stopped => 5,
        }
    }

    pub(in crate::acquisition) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Phase::Polling,
            2 => Phase::Success,
            3 => Phase::SoftFailure,
            4 => Phase::HardFailure,
            5 => Phase::Stopped,
            _ => Phase::Idle,
        }
    }
}

// Counters that accumulate rain, most to least preferred. Daily rain resets at midnight,
// which the wraparound rule below absorbs.
const RAIN_COUNTERS: [Quantity; 3] = [Quantity::RainTotal, Quantity::RainYearly, Quantity::RainDaily];

#[derive(Debug, Clone, Copy, PartialEq)]
struct RainCounter {
    source: Quantity,
    value: f64,
}

/// Session state owned by the acquisition loop. In memory only.
#[derive(Debug, Default)]
pub struct AcquisitionState {
    phase: Phase,
    consecutive_failures: u32,
    last_success: Option<i64>,
    last_timestamp: Option<i64>,
    known_fields: Option<BTreeSet<String>>,
    hard_failure_reported: bool,
    rain_counter: Option<RainCounter>,
    last_error: Option<String>,
}

/// Field ids that appeared or disappeared between two successful cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(in crate::acquisition) struct FieldDrift {
    pub(in crate::acquisition) added: Vec<String>,
    pub(in crate::acquisition) removed: Vec<String>,
}

impl AcquisitionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<i64> {
        self.last_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_hard_failure(&self) -> bool {
        self.hard_failure_reported
    }

    pub fn known_fields(&self) -> Option<&BTreeSet<String>> {
        self.known_fields.as_ref()
    }

    pub(in crate::acquisition) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Never hands out a timestamp older than the previous one, even if the wall clock steps back.
    pub(in crate::acquisition) fn stamp(&mut self, now: i64) -> i64 {
        let timestamp = self.last_timestamp.map_or(now, |last| now.max(last));
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    /// Counts a failed cycle. Returns the hard failure the first time the ceiling is reached
    /// during an outage, and nothing on later failures of the same outage.
    pub(in crate::acquisition) fn record_failure(
        &mut self,
        err: &CycleError,
        ceiling: u32,
    ) -> Option<HardFailure> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(err.to_string());

        if self.hard_failure_reported {
            self.phase = Phase::HardFailure;
            return None;
        }
        if ceiling == 0 || self.consecutive_failures < ceiling {
            self.phase = Phase::SoftFailure;
            return None;
        }

        self.hard_failure_reported = true;
        self.phase = Phase::HardFailure;
        Some(HardFailure {
            consecutive_failures: self.consecutive_failures,
            ceiling,
            last_error: err.to_string(),
            last_success: self.last_success,
        })
    }

    /// Clears the outage bookkeeping. Returns how many cycles had failed in a row before.
    pub(in crate::acquisition) fn record_success(&mut self, timestamp: i64) -> u32 {
        let previous = self.consecutive_failures;
        self.consecutive_failures = 0;
        self.hard_failure_reported = false;
        self.last_error = None;
        self.last_success = Some(timestamp);
        self.phase = Phase::Success;
        previous
    }

    pub(in crate::acquisition) fn track_fields<'a, I>(&mut self, ids: I) -> Option<FieldDrift>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current: BTreeSet<String> = ids.into_iter().map(str::to_string).collect();
        let drift = self.known_fields.as_ref().and_then(|previous| {
            if *previous == current {
                return None;
            }
            Some(FieldDrift {
                added: current.difference(previous).cloned().collect(),
                removed: previous.difference(&current).cloned().collect(),
            })
        });
        self.known_fields = Some(current);
        drift
    }

    /// Rain since the previous successful cycle, from the best cumulative counter available.
    pub(in crate::acquisition) fn rain_increment(
        &mut self,
        readings: &[CanonicalReading],
    ) -> Option<f64> {
        let counter = RAIN_COUNTERS.iter().find_map(|quantity| {
            readings
                .iter()
                .find(|reading| reading.quantity == *quantity)
                .map(|reading| RainCounter {
                    source: *quantity,
                    value: reading.value,
                })
        })?;

        let previous = self.rain_counter.replace(counter);
        match previous {
            Some(previous) if previous.source == counter.source => {
                if counter.value < previous.value {
                    tracing::info!(
                        counter = %counter.source,
                        new = counter.value,
                        last = previous.value,
                        "rain counter wraparound detected"
                    );
                    Some(counter.value)
                } else {
                    Some(((counter.value - previous.value) * 1e6).round() / 1e6)
                }
            }
            _ => {
                tracing::debug!(
                    counter = %counter.source,
                    value = counter.value,
                    "no previous rain counter; skipping rain for this record"
                );
                None
            }
        }
    }
}
