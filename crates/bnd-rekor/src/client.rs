//! HTTP client for the v1 log API

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use crate::entry::{DsseEntry, LogEntry, LogEntryResponse};
use crate::error::{Error, Result};

/// Client for a single transparency log instance
#[derive(Debug, Clone)]
pub struct RekorClient {
    base_url: String,
    client: reqwest::Client,
}

impl RekorClient {
    /// Create a client with a per-request timeout and user agent.
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a DSSE entry and return the created log entry.
    pub async fn create_dsse_entry(&self, entry: &DsseEntry) -> Result<LogEntry> {
        let url = format!("{}/api/v1/log/entries", self.base_url);
        debug!(%url, "submitting dsse entry");

        let response = self.client.post(&url).json(entry).send().await?;
        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let entries: LogEntryResponse = response.json().await?;
        let entry = LogEntry::from_response(entries)?;
        debug!(uuid = %entry.uuid, log_index = entry.log_index, "log entry created");
        Ok(entry)
    }
}
