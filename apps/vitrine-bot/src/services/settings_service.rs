use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory view of the JSON configuration store.
///
/// Keys are dotted paths (`mercadopago.access_token`, `sms24h.api_key`,
/// `tickets.categoria`). The engine only ever reads; writes come from
/// the composition root, which mirrors whatever backs the store (env
/// vars here, the admin panel in production).
#[derive(Clone, Default)]
pub struct SettingsService {
    values: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl SettingsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().expect("settings lock poisoned").get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.values
            .write()
            .expect("settings lock poisoned")
            .insert(key.into(), value);
    }
}
