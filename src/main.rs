use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use guild_metrics::app::ports::{EventSourcePort, MetricsBackendPort};
use guild_metrics::app::provision_use_case::ProvisionUseCase;
use guild_metrics::app::relay_use_case::RelayUseCase;
use guild_metrics::app::write_use_case::WriteUseCase;
use guild_metrics::config::{Config, GatewayMode};
use guild_metrics::infra::gateway::{GatewaySession, PacketSource, TypedSource};
use guild_metrics::infra::InfluxHttpClient;
use guild_metrics::observability::{self, init_logging};

const EVENT_BUFFER: usize = 1024;

#[derive(Parser)]
#[command(name = "guild-metrics")]
#[command(about = "Relays chat gateway events into InfluxDB metrics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the database, then relay gateway events until interrupted
    Run {
        /// Optional TOML config file; environment variables take precedence
        #[arg(long)]
        config: Option<PathBuf>,
        /// Gateway integration to use (overrides GATEWAY_MODE)
        #[arg(long, value_enum)]
        mode: Option<GatewayMode>,
    },
    /// Make sure the target database exists, then exit
    Provision {
        /// Optional TOML config file; environment variables take precedence
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    match cli.command {
        Commands::Run { config, mode } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(mode) = mode {
                config.gateway.mode = mode;
            }
            config.require_gateway_token()?;
            let _guard = init_logging(&config.logging);
            run(config).await
        }
        Commands::Provision { config } => {
            let config = Config::load(config.as_deref())?;
            let _guard = init_logging(&config.logging);
            let backend: Arc<dyn MetricsBackendPort> =
                Arc::new(InfluxHttpClient::new(&config.influxdb)?);
            let outcome = ProvisionUseCase::new(backend)
                .ensure_database_with_retry(
                    &config.influxdb.database,
                    config.relay.provision_max_attempts,
                )
                .await?;
            info!(database = %config.influxdb.database, ?outcome, "Provisioning complete");
            Ok(())
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        database = %config.influxdb.database,
        mode = ?config.gateway.mode,
        "Starting guild-metrics relay"
    );
    observability::metrics::init(config.relay.metrics_addr);

    let backend: Arc<dyn MetricsBackendPort> = Arc::new(InfluxHttpClient::new(&config.influxdb)?);

    // Hold the event pipeline until the database is confirmed or we give up
    match ProvisionUseCase::new(backend.clone())
        .ensure_database_with_retry(&config.influxdb.database, config.relay.provision_max_attempts)
        .await
    {
        Ok(outcome) => info!(?outcome, "Database ready"),
        Err(e) => error!(
            "Starting without a confirmed database, writes may fail: {}",
            e
        ),
    }

    let (writer, writer_task) = WriteUseCase::spawn(
        backend,
        config.influxdb.database.clone(),
        config.relay.write_queue_capacity,
    );
    let relay = RelayUseCase::new(writer);

    let session = GatewaySession::new(&config.gateway);
    let source: Box<dyn EventSourcePort> = match config.gateway.mode {
        GatewayMode::Typed => Box::new(TypedSource::new(session)),
        GatewayMode::Packet => Box::new(PacketSource::new(session)),
    };

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let mut source_task = tokio::spawn(source.run(events_tx));
    let relay_task = tokio::spawn(async move { relay.run(events_rx).await });

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            source_task.abort();
            Ok(())
        }
        joined = &mut source_task => match joined {
            Ok(Ok(())) => {
                warn!("Gateway source finished");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Gateway source failed: {}", e);
                Err(e.into())
            }
            Err(e) => Err(anyhow::anyhow!("gateway source task failed: {}", e)),
        },
    };

    // In-flight writes are abandoned, not drained
    relay_task.abort();
    writer_task.shutdown();
    outcome
}
