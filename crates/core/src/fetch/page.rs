//! HTML result page client (fallback mode).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use crate::config::SourceConfig;
use crate::partition::CandidateKey;

use super::decode::decode_result_page;
use super::{FetchClient, FetchError, Outcome};

/// Loads the public result page for a key and scrapes the score table.
pub struct PageFetchClient {
    client: Client,
    url: String,
}

impl PageFetchClient {
    pub fn new(source: &SourceConfig, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(source.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: source.page_url.clone(),
        })
    }
}

#[async_trait]
impl FetchClient for PageFetchClient {
    fn name(&self) -> &str {
        "page"
    }

    async fn fetch(&self, key: &CandidateKey) -> Outcome {
        let sbd = key.to_string();
        let response = match self
            .client
            .get(&self.url)
            .query(&[("sbd", sbd.as_str())])
            .header("Accept", "text/html")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Outcome::Transient(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            return Outcome::Transient(FetchError::Status(status.as_u16()));
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => return Outcome::Transient(e.into()),
        };

        match decode_result_page(&html, key, Utc::now()) {
            Ok(Some(record)) => Outcome::Found(record),
            Ok(None) => Outcome::NotFound,
            Err(e) => {
                debug!(key = %key, error = %e, "Undecodable result page");
                Outcome::Transient(e.into())
            }
        }
    }
}
