use serde::{Deserialize, Serialize};
use vitrine_shared::{ChannelId, Reply, UserId};

/// One user interaction forwarded by the messaging gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub action: Action,
}

/// The interactions the gateway can translate button presses, select
/// choices and modal submits into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Action {
    /// "Adquirir" pressed outside any ticket; `channel_id` is the
    /// freshly provisioned ticket channel.
    Acquire,
    AcceptTerms,
    RejectTerms,
    OpenCatalog,
    PagePrev,
    PageNext,
    SelectService { service_id: i64 },
    ConfirmPurchase,
    /// Back out of the confirmation screen, nothing charged yet.
    CancelPurchase,
    /// Cancel the active rental and refund its price.
    CancelRefund,
    RequestDeposit,
    SubmitDepositAmount { amount: String },
    CopyPixCode,
    ViewHistory,
    BackToMenu,
    CloseTicket,
}

/// Message pushed by the engine outside the request/response cycle
/// (SMS arrival, deposit approval, expiries, forced closes).
#[derive(Debug, Clone)]
pub struct Outbound {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub reply: Reply,
    /// The gateway should delete the ticket channel after rendering.
    pub close_channel: bool,
}
