//! Adapters for the two remote collaborators: the SMS number rental API
//! and the PIX payment gateway. Both are slow, rate-limited and allowed
//! to fail; the engine owns every retry/poll decision.

use async_trait::async_trait;
use serde::Deserialize;
use vitrine_shared::Amount;

use crate::error::StoreError;

pub mod mercadopago;
pub mod sms24h;

pub use mercadopago::MercadoPagoClient;
pub use sms24h::Sms24hClient;

/// A number leased from the rental provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RentalNumber {
    pub id: String,
    #[serde(rename = "number")]
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentalState {
    Waiting,
    Received { code: String },
    Expired,
}

/// Provider's answer to a cancellation request. The caller refunds the
/// user whatever `success` says; the flag only drives messaging.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[async_trait]
pub trait RentalProvider: Send + Sync {
    /// Credentials present? Checked before any guard is armed so an
    /// unconfigured feature never consumes a purchase attempt.
    fn is_configured(&self) -> bool;

    /// Lease a number for the given catalog service. Must fail (never
    /// fabricate an id) so the caller knows not to debit.
    async fn acquire_number(
        &self,
        service_id: i64,
        country: u16,
        operator: &str,
    ) -> Result<RentalNumber, StoreError>;

    async fn get_status(&self, rental_id: &str) -> Result<RentalState, StoreError>;

    async fn cancel(&self, rental_id: &str) -> Result<CancelOutcome, StoreError>;
}

/// A PIX charge created at the gateway.
#[derive(Debug, Clone)]
pub struct Charge {
    pub id: String,
    /// "Copia e cola" string the payer redeems in their banking app.
    pub copy_paste_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Approved,
    Rejected,
    Cancelled,
    Pending,
}

#[async_trait]
pub trait PixProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn create_charge(
        &self,
        amount: Amount,
        description: &str,
    ) -> Result<Charge, StoreError>;

    async fn check_payment(&self, charge_id: &str) -> Result<PaymentState, StoreError>;

    /// Best-effort gateway-side refund. Callers log failures and move
    /// on; the visible reimbursement is a ledger credit.
    async fn refund(&self, charge_id: &str) -> Result<(), StoreError>;
}
