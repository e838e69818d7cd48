use crate::app::ports::MetricsBackendPort;
use crate::config::InfluxConfig;
use crate::domain::MetricPoint;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// InfluxDB 1.x HTTP API client
pub struct InfluxHttpClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxHttpClient {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        Self::with_base_url(config.base_url(), &config.username, &config.password)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn credentials(&self) -> [(&'static str, &str); 2] {
        [("u", self.username.as_str()), ("p", self.password.as_str())]
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RelayError::Backend {
            status: status.as_u16(),
            body,
        })
    }

    async fn parse_query(resp: reqwest::Response) -> Result<QueryResponse> {
        let resp = Self::check(resp).await?;
        let parsed: QueryResponse = serde_json::from_slice(&resp.bytes().await?)?;
        let statement_error = parsed.results.iter().find_map(|r| r.error.clone());
        if let Some(error) = parsed.error.clone().or(statement_error) {
            return Err(RelayError::Backend { status: 200, body: error });
        }
        Ok(parsed)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl MetricsBackendPort for InfluxHttpClient {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&self.credentials())
            .query(&[("q", "SHOW DATABASES")])
            .send()
            .await?;
        let parsed = Self::parse_query(resp).await?;

        Ok(parsed
            .results
            .into_iter()
            .flat_map(|r| r.series)
            .flat_map(|s| s.values)
            .filter_map(|row| row.into_iter().next())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let statement = format!("CREATE DATABASE {}", quote_identifier(name));
        let resp = self
            .client
            .post(format!("{}/query", self.base_url))
            .query(&self.credentials())
            .form(&[("q", statement.as_str())])
            .send()
            .await?;
        Self::parse_query(resp).await?;
        Ok(())
    }

    async fn write_points(&self, points: &[MetricPoint], database: &str) -> Result<()> {
        let body = points
            .iter()
            .map(MetricPoint::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");
        debug!(target: "influxdb", database = %database, "POST /write {}", body);

        let resp = self
            .client
            .post(format!("{}/write", self.base_url))
            .query(&self.credentials())
            .query(&[("db", database), ("precision", "ms")])
            .body(body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
