use crate::app::ports::MetricsBackendPort;
use crate::error::{RelayError, Result};
use crate::observability::metrics::provisioning as provisioning_metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    AlreadyPresent,
    Created,
}

/// Use case for making sure the target database exists
pub struct ProvisionUseCase {
    backend: Arc<dyn MetricsBackendPort>,
    initial_backoff: Duration,
}

impl ProvisionUseCase {
    pub fn new(backend: Arc<dyn MetricsBackendPort>) -> Self {
        Self {
            backend,
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Create `name` unless the backend already lists it. Safe to call on every start.
    pub async fn ensure_database(&self, name: &str) -> Result<Provisioned> {
        if name.is_empty() {
            return Err(RelayError::Config("database name must not be empty".to_string()));
        }
        provisioning_metrics::attempt();

        let names = self.backend.list_databases().await?;
        if names.iter().any(|n| n == name) {
            info!(database = %name, "Database already present");
            return Ok(Provisioned::AlreadyPresent);
        }

        self.backend.create_database(name).await?;
        provisioning_metrics::database_created();
        info!(database = %name, "Created database");
        Ok(Provisioned::Created)
    }

    /// Retry `ensure_database` with exponential backoff.
    ///
    /// Gives up after `max_attempts` and returns the last failure; callers
    /// decide whether that is fatal.
    pub async fn ensure_database_with_retry(
        &self,
        name: &str,
        max_attempts: u32,
    ) -> Result<Provisioned> {
        let max_attempts = max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.ensure_database(name).await {
                Ok(outcome) => return Ok(outcome),
                Err(e @ RelayError::Config(_)) => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    error!(
                        database = %name,
                        attempts = attempt,
                        "Giving up on database provisioning: {}",
                        e
                    );
                    return Err(RelayError::Provisioning(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        database = %name,
                        attempt,
                        retry_in_ms = backoff.as_millis() as u64,
                        "Database provisioning failed: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
            }
        }
    }
}
