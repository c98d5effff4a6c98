use uuid::Uuid;
use vitrine_shared::{Amount, Service};

/// Where the user currently is inside the ticket.
///
/// Each variant carries only the data valid for that stage, so states
/// like "confirming with no selected service" cannot be represented.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Stage {
    #[default]
    AwaitingTerms,
    Menu,
    Browsing {
        page: usize,
    },
    Confirming {
        service: Service,
    },
}

/// A number leased from the rental provider, attached to the session
/// until the ticket closes.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRental {
    pub id: String,
    pub phone_number: String,
    pub service_name: String,
    pub price: Amount,
    /// Set once the SMS code arrived; delivered rentals are no longer
    /// refundable.
    pub code_received: bool,
}

/// A PIX charge awaiting approval.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDeposit {
    pub id: String,
    pub amount: Amount,
    pub copy_paste_code: String,
}

/// Ephemeral per-user state, live while a ticket is open.
///
/// The in-flight markers are the concurrency guards: each monetary
/// transition wins its guard inside a single locked session update
/// before any provider call is issued.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub stage: Stage,
    pub active_rental: Option<ActiveRental>,
    /// Token of the purchase currently being processed. The token lets
    /// the 30 s safety timer clear only the attempt that armed it.
    pub purchase_in_flight: Option<Uuid>,
    pub cancel_in_flight: bool,
    pub active_deposit: Option<ActiveDeposit>,
    pub deposit_in_flight: bool,
}
