use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;
use vitrine_shared::UserId;

use crate::models::history::{TransactionRecord, TransactionStatus};

/// Append-only per-user transaction log.
///
/// History is advisory: it feeds the user-facing listing and audit
/// trail, but money movement is decided by the ledger. A status update
/// that finds no matching record is therefore logged, not raised.
#[derive(Clone, Default)]
pub struct HistoryService {
    records: Arc<Mutex<HashMap<UserId, Vec<TransactionRecord>>>>,
}

impl HistoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, user_id: UserId, record: TransactionRecord) -> TransactionRecord {
        let mut records = self.records.lock().expect("history lock poisoned");
        records.entry(user_id).or_default().push(record.clone());
        record
    }

    /// Update the most recent record matching `rental_id` in place.
    pub fn update_rental_status(
        &self,
        user_id: UserId,
        rental_id: &str,
        status: TransactionStatus,
        sms_code: Option<String>,
    ) {
        let mut records = self.records.lock().expect("history lock poisoned");
        let found = records
            .get_mut(&user_id)
            .and_then(|list| {
                list.iter_mut()
                    .rev()
                    .find(|r| r.rental_id.as_deref() == Some(rental_id))
            });
        match found {
            Some(record) => {
                record.status = status;
                if sms_code.is_some() {
                    record.sms_code = sms_code;
                }
            }
            None => warn!(user_id, rental_id, "no history record to update"),
        }
    }

    /// Records in creation order.
    pub fn list(&self, user_id: UserId) -> Vec<TransactionRecord> {
        self.records
            .lock()
            .expect("history lock poisoned")
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}
