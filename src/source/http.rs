//! REST client for the remote plans API.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{header, Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::CollectionSource;
use crate::cache::{CacheKey, Entity};
use crate::config::Config;
use crate::error::{Result, SyncError};

/// The API answers with either a bare array or a `{ "data": [...] }` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlansPayload {
    List(Vec<Entity>),
    Wrapped { data: Vec<Entity> },
}

impl PlansPayload {
    fn into_entities(self) -> Vec<Entity> {
        match self {
            PlansPayload::List(entities) | PlansPayload::Wrapped { data: entities } => entities,
        }
    }
}

/// Fetches plan collections over HTTP.
/// Clone is cheap - reqwest::Client shares its connection pool.
#[derive(Clone)]
pub struct HttpPlanSource {
    client: Client,
    plans_url: Url,
    token: Option<String>,
}

impl HttpPlanSource {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let plans_url = Url::parse(&format!("{}/plans", base))
            .map_err(|e| SyncError::Config(format!("invalid plans API url '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            plans_url,
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.source_url,
            config.source_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `date:<d>` becomes `/plans?date=<d>`, `all` the bare listing.
    pub fn url_for(&self, key: &CacheKey) -> Url {
        let mut url = self.plans_url.clone();
        if let CacheKey::Date(date) = key {
            url.query_pairs_mut()
                .append_pair("date", &date.format("%Y-%m-%d").to_string());
        }
        url
    }
}

impl CollectionSource for HttpPlanSource {
    fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<Vec<Entity>>> {
        let url = self.url_for(key);
        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        async move {
            debug!("GET {}", url);
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SyncError::from_status(status, &body));
            }
            let payload: PlansPayload = response.json().await?;
            Ok(payload.into_entities())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn source() -> HttpPlanSource {
        HttpPlanSource::new("http://plans.local/api/", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for_all() {
        assert_eq!(source().url_for(&CacheKey::All).as_str(), "http://plans.local/api/plans");
    }

    #[test]
    fn test_url_for_date() {
        let key = CacheKey::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(
            source().url_for(&key).as_str(),
            "http://plans.local/api/plans?date=2024-05-01"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = HttpPlanSource::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_payload_shapes() {
        let bare: PlansPayload = serde_json::from_str(r#"[{"id":1,"status":"planned"}]"#).unwrap();
        assert_eq!(bare.into_entities().len(), 1);

        let wrapped: PlansPayload =
            serde_json::from_str(r#"{"data":[{"id":1},{"id":2}]}"#).unwrap();
        assert_eq!(wrapped.into_entities().len(), 2);
    }
}
