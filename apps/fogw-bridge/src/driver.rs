//! Host-facing entry points: build a driver from configuration, then either poll once or
//! hand the loop to a background task and consume its events as a stream.

use crate::acquisition::{
    AcquisitionEvent, AcquisitionLoop, AcquisitionStats, CycleOutcome, LoopSettings,
};
use crate::config::{Config, GatewayEndpoint};
use crate::error::CycleError;
use crate::normalize::Normalizer;
use crate::record::MeasurementRecord;
use crate::transport::{GatewaySource, HttpGateway};
use crate::units::UnitSystem;
use anyhow::{bail, Context, Result};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

pub const HARDWARE_NAME: &str = "FoGW";

/// Factory the host calls with its configuration section.
pub fn loader(config: &Config) -> Result<FoGwDriver> {
    FoGwDriver::new(config)
}

#[derive(Debug, Clone)]
pub struct FoGwDriver {
    gateway: HttpGateway,
    normalizer: Normalizer,
    settings: LoopSettings,
    channel_capacity: usize,
}

impl FoGwDriver {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.endpoint()?;
        if config.channel_capacity == 0 {
            bail!("channel_capacity must be at least 1");
        }
        let table = config.load_field_table()?;
        let gateway =
            HttpGateway::new(endpoint.clone()).context("failed to build gateway HTTP client")?;

        tracing::info!(
            hardware = HARDWARE_NAME,
            url = %endpoint.url(),
            poll_interval_s = endpoint.poll_interval.as_secs_f64(),
            timeout_s = endpoint.timeout.as_secs_f64(),
            unit_system = %config.unit_system,
            fields = table.len(),
            "gateway driver loaded"
        );

        Ok(Self {
            gateway,
            normalizer: Normalizer::new(Arc::new(table), config.unit_system),
            settings: LoopSettings {
                poll_interval: endpoint.poll_interval,
                max_consecutive_failures: config.max_consecutive_failures,
            },
            channel_capacity: config.channel_capacity,
        })
    }

    pub fn hardware_name(&self) -> &'static str {
        HARDWARE_NAME
    }

    pub fn endpoint(&self) -> &GatewayEndpoint {
        self.gateway.endpoint()
    }

    pub fn unit_system(&self) -> UnitSystem {
        self.normalizer.unit_system()
    }

    pub fn acquisition(&self) -> AcquisitionLoop<HttpGateway> {
        AcquisitionLoop::new(self.gateway.clone(), self.normalizer.clone(), self.settings)
    }

    /// One fetch-decode-normalize cycle outside any schedule.
    pub async fn poll_once(&self) -> Result<MeasurementRecord, CycleError> {
        match self.acquisition().poll_once().await {
            CycleOutcome::Record(record) => Ok(record),
            CycleOutcome::Failed { error, .. } => Err(error),
        }
    }

    /// Starts polling on the current tokio runtime.
    pub fn records(self) -> RecordStream {
        RecordStream::spawn(self.acquisition(), self.channel_capacity)
    }
}

/// Events from a background acquisition loop, in production order.
///
/// Dropping the stream stops the loop.
pub struct RecordStream {
    inner: ReceiverStream<AcquisitionEvent>,
    cancel: CancellationToken,
    stats: Arc<AcquisitionStats>,
    task: Option<JoinHandle<()>>,
}

impl RecordStream {
    pub fn spawn<S>(acquisition: AcquisitionLoop<S>, capacity: usize) -> Self
    where
        S: GatewaySource + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let stats = acquisition.stats();
        let task = tokio::spawn(acquisition.run(tx, cancel.clone()));
        Self {
            inner: ReceiverStream::new(rx),
            cancel,
            stats,
            task: Some(task),
        }
    }

    pub fn stats(&self) -> Arc<AcquisitionStats> {
        self.stats.clone()
    }

    /// Cancelling the token stops the loop at its next suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the loop and waits for it to finish. Buffered events are discarded.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "acquisition task ended abnormally");
            }
        }
    }
}

impl Stream for RecordStream {
    type Item = AcquisitionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
