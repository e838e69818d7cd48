use crate::domain::MetricPoint;
use crate::error::Result;
use crate::events::RawEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Time-series backend as seen by provisioning and the metric writer
#[async_trait]
pub trait MetricsBackendPort: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>>;
    async fn create_database(&self, name: &str) -> Result<()>;
    async fn write_points(&self, points: &[MetricPoint], database: &str) -> Result<()>;
}

/// A gateway integration delivering events one at a time, in arrival order.
///
/// Runs until the connection fails fatally or `events` is closed.
#[async_trait]
pub trait EventSourcePort: Send {
    async fn run(self: Box<Self>, events: mpsc::Sender<RawEvent>) -> Result<()>;
}
