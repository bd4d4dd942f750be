//! API client for a running NetPulse dashboard

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use telemetry_lib::DashboardAnomaly;
use url::Url;

/// Error body returned by the dashboard
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// API client for the dashboard HTTP routes
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        // Relative joins replace the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("Dashboard returned {}: {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Recent anomalies as served by the dashboard, newest first
    pub async fn anomalies(&self) -> Result<Vec<DashboardAnomaly>> {
        self.get("anomalies").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anomalies_parses_dashboard_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/anomalies")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{
                    "timestamp": "2024-05-01T11:55:00Z",
                    "location_id": "Loc_3",
                    "network_type": "5G_FWA",
                    "signal_strength_dbm": -95.0,
                    "latency_ms": 250.0,
                    "throughput_mbps": 5.0,
                    "packet_loss_percent": 12.0,
                    "anomaly_reason": "Low Signal, High Latency, Low Throughput, High Packet Loss"
                }]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let anomalies = client.anomalies().await.unwrap();

        mock.assert_async().await;
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].location_id, "Loc_3");
        assert_eq!(anomalies[0].throughput_mbps, Some(5.0));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/anomalies")
            .with_status(503)
            .with_body(r#"{"error":"Telemetry data is unavailable","status":503}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.anomalies().await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("503"), "{}", message);
        assert!(message.contains("Telemetry data is unavailable"), "{}", message);
    }

    #[tokio::test]
    async fn test_base_url_path_prefix_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/netpulse/anomalies")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/netpulse", server.url())).unwrap();
        let anomalies = client.anomalies().await.unwrap();

        mock.assert_async().await;
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
