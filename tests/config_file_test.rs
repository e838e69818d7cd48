use anyhow::Result;
use guild_metrics::config::{Config, GatewayMode};
use guild_metrics::error::RelayError;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_reads_toml_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[influxdb]
database = "switchblade_metrics"

[gateway]
token = "file-token"
mode = "packet"

[relay]
write_queue_capacity = 16
metrics_addr = "127.0.0.1:9898"
"#
    )?;

    let config = Config::load(Some(file.path()))?;

    // Environment may override, but never blanks out the file's values
    assert!(!config.influxdb.database.is_empty());
    assert!(!config.gateway.token.is_empty());
    if std::env::var("GATEWAY_MODE").is_err() {
        assert_eq!(config.gateway.mode, GatewayMode::Packet);
    }
    if std::env::var("WRITE_QUEUE_CAPACITY").is_err() {
        assert_eq!(config.relay.write_queue_capacity, 16);
    }
    Ok(())
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    assert!(matches!(
        Config::load(Some(missing.as_path())),
        Err(RelayError::Config(_))
    ));
}

#[test]
fn test_malformed_file_is_a_toml_error() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[influxdb\nport = ")?;

    assert!(matches!(
        Config::load(Some(file.path())),
        Err(RelayError::Toml(_))
    ));
    Ok(())
}
