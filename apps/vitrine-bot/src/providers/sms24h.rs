use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::StoreError;
use crate::providers::{CancelOutcome, RentalNumber, RentalProvider, RentalState};

const DEFAULT_BASE_URL: &str = "https://api.sms24h.org/v1";

/// HTTP client for the SMS24H number rental API.
///
/// The provider's schema is third-party and versioned; only the fields
/// the engine needs are deserialized.
#[derive(Clone)]
pub struct Sms24hClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl Sms24hClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn key(&self) -> Result<&str, StoreError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(StoreError::NotConfigured("sms24h.api_key"))
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
}

#[async_trait]
impl RentalProvider for Sms24hClient {
    fn is_configured(&self) -> bool {
        self.key().is_ok()
    }

    async fn acquire_number(
        &self,
        service_id: i64,
        country: u16,
        operator: &str,
    ) -> Result<RentalNumber, StoreError> {
        let key = self.key()?;
        let url = format!("{}/numbers", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Api-Key", key)
            .json(&json!({
                "service": service_id,
                "country": country,
                "operator": operator,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Provider(format!(
                "acquire number failed: {}",
                resp.status()
            )));
        }

        let number: RentalNumber = resp.json().await?;
        if number.id.trim().is_empty() {
            return Err(StoreError::Provider(
                "provider returned a number without an id".into(),
            ));
        }
        debug!(rental_id = %number.id, "number acquired");
        Ok(number)
    }

    async fn get_status(&self, rental_id: &str) -> Result<RentalState, StoreError> {
        let key = self.key()?;
        let url = format!("{}/numbers/{}/status", self.base_url, rental_id);
        let resp = self.client.get(&url).header("Api-Key", key).send().await?;

        if !resp.status().is_success() {
            return Err(StoreError::Provider(format!(
                "status check failed: {}",
                resp.status()
            )));
        }

        let status: StatusResponse = resp.json().await?;
        match status.status.as_str() {
            "waiting" => Ok(RentalState::Waiting),
            "received" => match status.code {
                Some(code) => Ok(RentalState::Received { code }),
                None => Err(StoreError::Provider(
                    "received status without a code".into(),
                )),
            },
            "expired" => Ok(RentalState::Expired),
            other => Err(StoreError::Provider(format!(
                "unknown rental status {other:?}"
            ))),
        }
    }

    async fn cancel(&self, rental_id: &str) -> Result<CancelOutcome, StoreError> {
        let key = self.key()?;
        let url = format!("{}/numbers/{}/cancel", self.base_url, rental_id);
        let resp = self.client.post(&url).header("Api-Key", key).send().await?;

        if !resp.status().is_success() {
            return Err(StoreError::Provider(format!(
                "cancel failed: {}",
                resp.status()
            )));
        }

        Ok(resp.json().await?)
    }
}
