//! HTTP client for the sync API.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{EntityKind, RemoteRecords};
use crate::error::{Error, Result};
use crate::models::{Category, Expense};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of a paginated modified-records response.
///
/// `total` counts every matching record as of the query, independent of
/// pagination; the caller keeps requesting pages while `has_more` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedBatch<T> {
    pub data: Vec<T>,
    pub has_more: bool,
    pub total: u64,
}

/// Authenticated client for the sync endpoints of the penny API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("auth_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        let auth_token = auth_token.into().trim().to_string();
        if auth_token.is_empty() {
            return Err(Error::InvalidInput(
                "API auth token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            auth_token,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
        })
    }

    async fn fetch_modified<T: DeserializeOwned>(
        &self,
        entity: EntityKind,
        page: u32,
        since: DateTime<Utc>,
    ) -> Result<ModifiedBatch<T>> {
        let url = format!("{}/v1/sync/{}/modified", self.base_url, entity.as_str());
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.auth_token)
            .query(&[
                ("page", page.to_string()),
                (
                    "since",
                    since.to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json::<ModifiedBatch<T>>().await?)
    }

    async fn upload<T: Serialize>(&self, entity: EntityKind, records: &[T]) -> Result<()> {
        let url = format!("{}/v1/sync/{}/batch", self.base_url, entity.as_str());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(records)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn count(&self, entity: EntityKind) -> Result<u64> {
        let url = format!("{}/v1/sync/{}/count", self.base_url, entity.as_str());
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.auth_token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let payload = response.json::<CountResponse>().await?;
        Ok(payload.count)
    }
}

impl RemoteRecords<Category> for ApiClient {
    async fn fetch_modified_batch(
        &self,
        page: u32,
        since: DateTime<Utc>,
    ) -> Result<ModifiedBatch<Category>> {
        self.fetch_modified(EntityKind::Categories, page, since).await
    }

    async fn upload_batch(&self, records: &[Category]) -> Result<()> {
        self.upload(EntityKind::Categories, records).await
    }

    async fn total_count(&self) -> Result<u64> {
        self.count(EntityKind::Categories).await
    }
}

impl RemoteRecords<Expense> for ApiClient {
    async fn fetch_modified_batch(
        &self,
        page: u32,
        since: DateTime<Utc>,
    ) -> Result<ModifiedBatch<Expense>> {
        self.fetch_modified(EntityKind::Expenses, page, since).await
    }

    async fn upload_batch(&self, records: &[Expense]) -> Result<()> {
        self.upload(EntityKind::Expenses, records).await
    }

    async fn total_count(&self) -> Result<u64> {
        self.count(EntityKind::Expenses).await
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api(parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = raw.trim();
    if endpoint.is_empty() {
        return Err(Error::InvalidInput(
            "API base URL must not be empty".to_string(),
        ));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
