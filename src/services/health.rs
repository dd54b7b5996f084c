use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::{HealthState, HealthTracker, ProbePolicy};

/// Why a health probe failed
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unhealthy status: {0}")]
    Status(u16),
}

/// HTTP liveness probe used by the container health check
pub struct HealthProbe {
    client: Client,
    url: String,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One probe; only a 2xx response counts as healthy
    pub async fn check(&self) -> Result<(), ProbeError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }

    /// Check on the policy schedule until the service turns unhealthy
    ///
    /// Each outcome is recorded at its scheduled offset `probe_at(n)`, so a
    /// slow or refused request near the end of the start period is still
    /// judged as part of the grace window.
    pub async fn watch(&self, policy: ProbePolicy) -> HealthTracker {
        let started = Instant::now();
        let mut tracker = HealthTracker::new(policy);
        let mut n = 0;

        loop {
            let due = policy.probe_at(n);
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                tokio::time::sleep(wait).await;
            }

            let result = self.check().await;
            if let Err(e) = &result {
                tracing::warn!("Health check {} against {} failed: {}", n, self.url, e);
            }

            let previous = tracker.state();
            let state = tracker.record(due, result.is_ok());
            if state != previous {
                tracing::info!("Health state changed: {:?} -> {:?}", previous, state);
            }

            if state == HealthState::Unhealthy {
                return tracker;
            }

            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_ok_on_200() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"healthy"}"#)
            .create_async()
            .await;

        let probe = HealthProbe::new(format!("{}/health", server.url()), Duration::from_secs(5)).unwrap();

        assert!(probe.check().await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_fails_on_503() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let probe = HealthProbe::new(format!("{}/health", server.url()), Duration::from_secs(5)).unwrap();

        assert!(matches!(probe.check().await, Err(ProbeError::Status(503))));
    }

    #[tokio::test]
    async fn test_probe_fails_when_refused() {
        // Bind then drop a listener to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = HealthProbe::new(format!("http://127.0.0.1:{}/health", port), Duration::from_secs(2)).unwrap();

        assert!(matches!(probe.check().await, Err(ProbeError::Request(_))));
    }

    #[tokio::test]
    async fn test_watch_not_unhealthy_before_grace_budget() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let policy = ProbePolicy {
            start_period: Duration::from_millis(100),
            interval: Duration::from_millis(100),
            timeout: Duration::from_millis(500),
            retries: 3,
        };
        let checker = HealthProbe::new(format!("http://127.0.0.1:{}/health", port), policy.timeout).unwrap();

        let started = Instant::now();
        let tracker = checker.watch(policy).await;

        assert_eq!(tracker.state(), HealthState::Unhealthy);
        assert_eq!(tracker.consecutive_failures(), 3);
        assert!(started.elapsed() >= policy.earliest_unhealthy());
    }
}
