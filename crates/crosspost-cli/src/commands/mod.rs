//! CLI command implementations.

pub mod jobs;

use anyhow::{Result, bail};
use serde_json::Value;

/// Minimal API client carrying the acting account.
pub struct Client {
    http: reqwest::Client,
    api_url: String,
    account: String,
}

impl Client {
    pub fn new(api_url: &str, account: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            account: account.to_string(),
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", self.api_url, path))
            .header("X-Account-Id", &self.account)
            .query(query)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        let mut request = self
            .http
            .post(format!("{}{}", self.api_url, path))
            .header("X-Account-Id", &self.account);
        if let Some(body) = body {
            request = request.json(&body);
        }
        Self::parse(request.send().await?).await
    }

    async fn parse(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            bail!("{status}: {message}");
        }
        Ok(body)
    }
}
