use std::time::{Duration, Instant};

use serde::Serialize;

use crate::errors::AppError;

/// Result of one connection test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Issues health-check requests against third-party integrations.
#[derive(Clone)]
pub struct IntegrationProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl IntegrationProbe {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mewayz-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    /// `GET base_url + health_path`. Transport failures become a failed outcome, not an error.
    pub async fn check(&self, base_url: &str, health_path: &str) -> ProbeOutcome {
        let url = format!("{}{}", base_url.trim_end_matches('/'), health_path);
        tracing::info!("Probing integration at {}", url);

        let started = Instant::now();
        let result = self.client.get(&url).send().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let status = response.status();
                let ok = status.is_success();
                if !ok {
                    tracing::warn!("Integration probe {} returned {}", url, status);
                }
                ProbeOutcome {
                    ok,
                    status_code: Some(status.as_u16()),
                    latency_ms,
                    error: (!ok).then(|| format!("Unexpected status {}", status)),
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("Timed out after {}s", self.timeout.as_secs())
                } else if e.is_connect() {
                    "Connection failed".to_string()
                } else {
                    format!("Request failed: {}", e)
                };
                tracing::warn!("Integration probe {} failed: {}", url, e);
                ProbeOutcome {
                    ok: false,
                    status_code: None,
                    latency_ms,
                    error: Some(error),
                }
            }
        }
    }
}
