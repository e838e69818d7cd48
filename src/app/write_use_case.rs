//! Metric writer
//!
//! `write` validates a point and queues it without blocking. A dispatcher task
//! drains the queue in order and runs each backend write as an independent
//! task, at most `capacity` at a time, so a stalled backend fills the queue
//! and further points are dropped. Outcomes come back to `report_outcome`, the only place a write
//! failure is observed; nothing is retried and nothing reaches the caller.

use crate::app::ports::MetricsBackendPort;
use crate::domain::{MetricPoint, WriteAttempt};
use crate::error::{RelayError, WriteError};
use crate::observability::metrics::writer as writer_metrics;
use crate::schema::SchemaRegistry;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, warn};

/// Use case for fire-and-forget metric writes
#[derive(Clone)]
pub struct WriteUseCase {
    registry: &'static SchemaRegistry,
    database: String,
    queue: mpsc::Sender<WriteAttempt>,
}

/// Handle on the dispatcher task
pub struct WriterTask {
    handle: JoinHandle<()>,
}

impl WriterTask {
    /// Stop dispatching. In-flight writes are cancelled, not awaited.
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    /// Wait until every writer handle is dropped and in-flight writes settle.
    pub async fn finished(self) {
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                error!(target: "influxdb", "Writer dispatcher panicked: {}", e);
            }
        }
    }
}

impl WriteUseCase {
    /// Start a dispatcher against `backend` and return a writer feeding it.
    pub fn spawn(
        backend: Arc<dyn MetricsBackendPort>,
        database: impl Into<String>,
        capacity: usize,
    ) -> (Self, WriterTask) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let limit = Arc::new(Semaphore::new(capacity.max(1)));
        let handle = tokio::spawn(run_dispatcher(backend, rx, limit));
        (
            Self::with_queue(SchemaRegistry::bot(), database, tx),
            WriterTask { handle },
        )
    }

    pub fn with_queue(
        registry: &'static SchemaRegistry,
        database: impl Into<String>,
        queue: mpsc::Sender<WriteAttempt>,
    ) -> Self {
        Self {
            registry,
            database: database.into(),
            queue,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Queue a point for delivery.
    ///
    /// Never blocks. Points that fail schema validation are dropped and logged.
    /// When the queue is full the new point is dropped (drop-newest).
    pub fn write(&self, point: MetricPoint) {
        if let Err(e) = self.registry.validate(&point) {
            writer_metrics::record_point_rejected(&point.measurement);
            match &e {
                RelayError::UnknownMeasurement(_) => {
                    error!(target: "influxdb", "Refusing to write point: {} (translation defect)", e)
                }
                _ => error!(target: "influxdb", "Refusing to write point: {}", e),
            }
            return;
        }

        debug!(
            target: "influxdb",
            "Writing metric {} {:?} {:?}",
            point.measurement, point.fields, point.tags
        );

        let attempt = WriteAttempt {
            point,
            database: self.database.clone(),
        };
        match self.queue.try_send(attempt) {
            Ok(()) => {}
            Err(TrySendError::Full(attempt)) => {
                writer_metrics::record_point_dropped(&attempt.point.measurement);
                warn!(
                    target: "influxdb",
                    measurement = %attempt.point.measurement,
                    "Write queue full, dropping point"
                );
            }
            Err(TrySendError::Closed(attempt)) => {
                writer_metrics::record_point_dropped(&attempt.point.measurement);
                warn!(
                    target: "influxdb",
                    measurement = %attempt.point.measurement,
                    "Writer is shut down, dropping point"
                );
            }
        }
    }
}

async fn run_dispatcher(
    backend: Arc<dyn MetricsBackendPort>,
    mut queue: mpsc::Receiver<WriteAttempt>,
    limit: Arc<Semaphore>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            next = next_attempt(&limit, &mut queue) => match next {
                Some((permit, attempt)) => {
                    let backend = Arc::clone(&backend);
                    in_flight.spawn(async move {
                        let outcome = dispatch(backend.as_ref(), &attempt).await;
                        drop(permit);
                        (attempt, outcome)
                    });
                }
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => reap(joined),
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        reap(joined);
    }
}

// The permit is taken before receiving, so nothing leaves the queue while
// every write slot is busy.
async fn next_attempt(
    limit: &Arc<Semaphore>,
    queue: &mut mpsc::Receiver<WriteAttempt>,
) -> Option<(OwnedSemaphorePermit, WriteAttempt)> {
    let permit = Arc::clone(limit).acquire_owned().await.ok()?;
    let attempt = queue.recv().await?;
    Some((permit, attempt))
}

async fn dispatch(
    backend: &dyn MetricsBackendPort,
    attempt: &WriteAttempt,
) -> Result<(), WriteError> {
    backend
        .write_points(std::slice::from_ref(&attempt.point), &attempt.database)
        .await
}

fn reap(joined: Result<(WriteAttempt, Result<(), WriteError>), JoinError>) {
    match joined {
        Ok((attempt, outcome)) => report_outcome(&attempt, outcome),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(target: "influxdb", "Write task panicked: {}", e),
    }
}

/// Terminal stage for every write: record and log, never propagate.
pub fn report_outcome(attempt: &WriteAttempt, outcome: Result<(), WriteError>) {
    match outcome {
        Ok(()) => writer_metrics::record_point_written(&attempt.point.measurement),
        Err(e) => {
            writer_metrics::record_write_failure(&attempt.point.measurement);
            error!(
                target: "influxdb",
                measurement = %attempt.point.measurement,
                database = %attempt.database,
                "Failed to write point: {}",
                e
            );
        }
    }
}
