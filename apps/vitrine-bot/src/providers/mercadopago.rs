use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;
use vitrine_shared::Amount;

use crate::error::StoreError;
use crate::providers::{Charge, PaymentState, PixProvider};

const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago PIX client: create a charge, check its status, refund.
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(access_token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token,
        }
    }

    fn token(&self) -> Result<&str, StoreError> {
        self.access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(StoreError::NotConfigured("mercadopago.access_token"))
    }
}

#[derive(Deserialize)]
struct TransactionData {
    #[serde(default)]
    qr_code: Option<String>,
}

#[derive(Deserialize)]
struct PointOfInteraction {
    #[serde(default)]
    transaction_data: Option<TransactionData>,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: i64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    point_of_interaction: Option<PointOfInteraction>,
}

fn parse_state(status: &str) -> PaymentState {
    match status {
        "approved" => PaymentState::Approved,
        "rejected" => PaymentState::Rejected,
        "cancelled" => PaymentState::Cancelled,
        // pending, in_process, authorized: still worth another poll
        _ => PaymentState::Pending,
    }
}

#[async_trait]
impl PixProvider for MercadoPagoClient {
    fn is_configured(&self) -> bool {
        self.token().is_ok()
    }

    async fn create_charge(
        &self,
        amount: Amount,
        description: &str,
    ) -> Result<Charge, StoreError> {
        let token = self.token()?;
        let url = format!("{}/v1/payments", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("X-Idempotency-Key", Uuid::new_v4().to_string())
            .json(&json!({
                "transaction_amount": amount.as_reais(),
                "description": description,
                "payment_method_id": "pix",
                "payer": { "email": "cliente@email.com" },
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Provider(format!(
                "create charge failed: {}",
                resp.status()
            )));
        }

        let payment: PaymentResponse = resp.json().await?;
        let copy_paste_code = payment
            .point_of_interaction
            .and_then(|p| p.transaction_data)
            .and_then(|t| t.qr_code)
            .ok_or_else(|| StoreError::Provider("charge without a PIX code".into()))?;

        debug!(charge_id = payment.id, "PIX charge created");
        Ok(Charge {
            id: payment.id.to_string(),
            copy_paste_code,
        })
    }

    async fn check_payment(&self, charge_id: &str) -> Result<PaymentState, StoreError> {
        let token = self.token()?;
        let url = format!("{}/v1/payments/{}", self.base_url, charge_id);
        let resp = self.client.get(&url).bearer_auth(token).send().await?;

        if !resp.status().is_success() {
            return Err(StoreError::Provider(format!(
                "payment check failed: {}",
                resp.status()
            )));
        }

        let payment: PaymentResponse = resp.json().await?;
        Ok(parse_state(&payment.status))
    }

    async fn refund(&self, charge_id: &str) -> Result<(), StoreError> {
        let token = self.token()?;
        let url = format!("{}/v1/payments/{}/refunds", self.base_url, charge_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("X-Idempotency-Key", Uuid::new_v4().to_string())
            .json(&json!({}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::Provider(format!(
                "refund failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
