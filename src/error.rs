use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Unknown measurement: {0}")]
    UnknownMeasurement(String),

    #[error("Point for '{measurement}' violates schema: {reason}")]
    SchemaViolation { measurement: String, reason: String },

    #[error("Malformed {event_type} payload: missing {missing}")]
    MalformedPayload {
        event_type: String,
        missing: &'static str,
    },

    #[error("Database provisioning failed: {0}")]
    Provisioning(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Failure of a single point write. Never propagated past the writer.
pub type WriteError = RelayError;

pub type Result<T> = std::result::Result<T, RelayError>;
