use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vitrine_shared::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Purchase,
}

/// Lifecycle of a transaction as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    AwaitingSms,
    Completed,
    Refunded,
    Pending,
}

impl TransactionStatus {
    /// User-facing label, matching the storefront's language.
    pub fn label(self) -> &'static str {
        match self {
            TransactionStatus::AwaitingSms => "Aguardando SMS",
            TransactionStatus::Completed => "Concluído",
            TransactionStatus::Refunded => "Cancelado/Reembolsado",
            TransactionStatus::Pending => "Pendente",
        }
    }
}

/// One entry of the per-user purchase history.
///
/// Records are append-only; only `status` and `sms_code` may change
/// after creation, when the matching terminal event arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    /// Platform name for purchases (`WhatsApp`, `Telegram`, ...).
    pub service_name: Option<String>,
    /// Rental id at the provider, used to find the record later.
    pub rental_id: Option<String>,
    pub phone_number: Option<String>,
    pub sms_code: Option<String>,
}

impl TransactionRecord {
    pub fn deposit(amount: Amount, status: TransactionStatus) -> Self {
        TransactionRecord {
            id: Uuid::new_v4(),
            kind: TransactionKind::Deposit,
            amount,
            timestamp: Utc::now(),
            status,
            service_name: None,
            rental_id: None,
            phone_number: None,
            sms_code: None,
        }
    }

    pub fn purchase(
        amount: Amount,
        service_name: String,
        rental_id: String,
        phone_number: String,
    ) -> Self {
        TransactionRecord {
            id: Uuid::new_v4(),
            kind: TransactionKind::Purchase,
            amount,
            timestamp: Utc::now(),
            status: TransactionStatus::AwaitingSms,
            service_name: Some(service_name),
            rental_id: Some(rental_id),
            phone_number: Some(phone_number),
            sms_code: None,
        }
    }
}
