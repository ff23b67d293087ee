use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionStats {
    pub connection_count: usize,
    pub user_ids: Vec<String>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach health endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!("Health check failed: {}", response.status());
        }
        Ok(())
    }

    /// Broadcast an operator notice; returns the `data` part of the response.
    pub async fn announce(&self, kind: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/announcements", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "kind": kind, "payload": payload }))
            .send()
            .await
            .context("Failed to send announcement")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to announce {}: {} - Response: {}", kind, status, body);
        }

        let api_response: Value = response.json().await.context("Failed to parse response")?;
        Ok(api_response["data"].clone())
    }

    pub async fn connection_stats(&self) -> Result<ConnectionStats> {
        let url = format!("{}/status/connections", self.base_url);
        let api_response = self.get_json(&url).await?;

        // Extract the data object from ApiResponse wrapper
        serde_json::from_value(api_response["data"].clone())
            .context("No connection stats in response")
    }

    pub async fn connections_for_user(&self, user_id: &str) -> Result<Vec<Value>> {
        let url = format!("{}/status/connections/{}", self.base_url, user_id);
        let api_response = self.get_json(&url).await?;

        api_response["data"]
            .as_array()
            .cloned()
            .context("No data array in response")
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("GET {} failed: {}", url, response.status());
        }

        response.json().await.context("Failed to parse response")
    }
}
