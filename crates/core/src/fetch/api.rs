//! JSON score API client (fast mode).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use crate::config::SourceConfig;
use crate::partition::CandidateKey;

use super::decode::decode_api_response;
use super::{FetchClient, FetchError, Outcome};

/// Queries the score API one registration number at a time.
pub struct ApiFetchClient {
    client: Client,
    url: String,
    year: u16,
}

impl ApiFetchClient {
    /// Create a client. `request_timeout` bounds each HTTP request.
    pub fn new(source: &SourceConfig, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(source.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: source.api_url.clone(),
            year: source.year,
        })
    }

    async fn request(&self, key: &CandidateKey) -> Result<String, FetchError> {
        let sbd = key.to_string();
        let year = self.year.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("sbd", sbd.as_str()), ("year", year.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl FetchClient for ApiFetchClient {
    fn name(&self) -> &str {
        "api"
    }

    async fn fetch(&self, key: &CandidateKey) -> Outcome {
        let body = match self.request(key).await {
            Ok(body) => body,
            Err(e) => return Outcome::Transient(e),
        };

        match decode_api_response(&body, key, Utc::now()) {
            Ok(Some(record)) => Outcome::Found(record),
            Ok(None) => Outcome::NotFound,
            Err(e) => {
                debug!(key = %key, error = %e, "Undecodable API response");
                Outcome::Transient(e.into())
            }
        }
    }
}
