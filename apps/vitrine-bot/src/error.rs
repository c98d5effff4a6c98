use thiserror::Error;
use vitrine_shared::Amount;

/// Errors surfaced by the storefront engine and its provider clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required credential or id is missing from the settings store.
    /// Surfaced to the user as "not configured", never retried.
    #[error("feature not configured: {0}")]
    NotConfigured(&'static str),

    /// The remote rental/payment API failed or answered something we
    /// cannot use.
    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    /// The action does not fit the session's current state (confirming
    /// with no selected service, cancelling with no rental). Treated as
    /// a logged no-op by the engine, never a crash.
    #[error("state mismatch: {0}")]
    StateMismatch(&'static str),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Provider(err.to_string())
    }
}
