use crate::acquisition::{AcquisitionLoop, LoopSettings};
use crate::error::FetchError;
use crate::fields::FieldTable;
use crate::normalize::Normalizer;
use crate::transport::{GatewayResponse, GatewaySource};
use crate::units::UnitSystem;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const LIVEDATA_GW2000: &str = include_str!("../tests/fixtures/livedata_gw2000.json");

/// One scripted gateway answer.
#[derive(Debug, Clone)]
pub enum Step {
    Payload(String),
    /// Answers after the given delay.
    Slow(Duration, String),
    /// Hangs for the given duration, then reports a timeout.
    TimedOut(Duration),
    Refused,
    Status(u16),
}

pub fn payload(body: &str) -> Step {
    Step::Payload(body.to_string())
}

/// Replays [`Step`]s in order, then repeats the fallback forever. Records when each
/// fetch started.
pub struct ScriptedGateway {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedGateway {
    pub fn new(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.calls.clone()
    }
}

impl GatewaySource for ScriptedGateway {
    fn fetch(&self) -> impl Future<Output = Result<GatewayResponse, FetchError>> + Send {
        self.calls.lock().unwrap().push(Instant::now());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        async move {
            match step {
                Step::Payload(body) => Ok(ok(body)),
                Step::Slow(delay, body) => {
                    tokio::time::sleep(delay).await;
                    Ok(ok(body))
                }
                Step::TimedOut(after) => {
                    tokio::time::sleep(after).await;
                    Err(FetchError::Timeout(after))
                }
                Step::Refused => Err(FetchError::Connection("connection refused".to_string())),
                Step::Status(code) => Err(FetchError::Gateway(
                    StatusCode::from_u16(code).expect("valid status"),
                )),
            }
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn ok(body: String) -> GatewayResponse {
    GatewayResponse {
        status: StatusCode::OK,
        body: Bytes::from(body),
    }
}

pub fn scripted_loop(
    gateway: ScriptedGateway,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    unit_system: UnitSystem,
) -> AcquisitionLoop<ScriptedGateway> {
    AcquisitionLoop::new(
        gateway,
        Normalizer::new(Arc::new(FieldTable::builtin()), unit_system),
        LoopSettings {
            poll_interval,
            max_consecutive_failures,
        },
    )
}
