//! Blocking HTTP client for a running decision-support server.

use anyhow::{bail, Context, Result};
use atc_core::{StripOptions, TrafficScenario};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct SubmitMessageRequest<'a> {
    message: &'a str,
    #[serde(flatten)]
    options: &'a StripOptions,
}

#[derive(Debug, Serialize)]
struct ValidateMessageRequest<'a> {
    message: &'a str,
}

pub struct ServerClient {
    client: Client,
    base_url: String,
}

impl ServerClient {
    /// `base_url` e.g. "http://localhost:3000"
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(u16, Value)> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .with_context(|| format!("Failed to reach {}", self.url(path)))?;

        let status = response.status();
        let body: Value = response.json().context("Response was not JSON")?;
        if status.is_client_error() || status.is_server_error() {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no error detail");
            bail!("Server returned {}: {}", status, reason);
        }
        Ok((status.as_u16(), body))
    }

    pub fn health(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        Ok(response.status().is_success())
    }

    /// Submit an ATS message. Returns the HTTP status and ingest result.
    pub fn submit_message(&self, message: &str, options: &StripOptions) -> Result<(u16, Value)> {
        self.post_json("/v1/messages", &SubmitMessageRequest { message, options })
    }

    pub fn validate_message(&self, message: &str) -> Result<Value> {
        self.post_json("/v1/messages/validate", &ValidateMessageRequest { message })
            .map(|(_, body)| body)
    }

    pub fn load_scenario(&self, scenario: &TrafficScenario) -> Result<Value> {
        self.post_json("/v1/scenario", scenario).map(|(_, body)| body)
    }

    pub fn sequences(&self) -> Result<Value> {
        self.client
            .get(self.url("/v1/sequences"))
            .send()
            .with_context(|| format!("Failed to reach {}", self.base_url))?
            .json()
            .context("Response was not JSON")
    }
}
