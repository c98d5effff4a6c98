//! The ticket/purchase state machine.
//!
//! Every inbound interaction enters through [`TicketEngine::handle`],
//! which reads and writes the session store synchronously and only then
//! awaits provider calls. The in-flight guards are won inside a single
//! locked session update, so a duplicated click can never re-enter a
//! monetary transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use vitrine_shared::{ChannelId, Reply, UserId};

use crate::error::StoreError;
use crate::models::event::{Action, Event, Outbound};
use crate::models::session::Stage;
use crate::state::AppState;

mod deposit;
mod purchase;
mod ticket;
pub mod views;

pub use ticket::CloseReason;

/// Wall-clock knobs of the state machine. Production values match the
/// storefront's; tests shrink them to milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub sms_poll_interval: Duration,
    pub sms_poll_attempts: u32,
    pub deposit_poll_interval: Duration,
    pub deposit_poll_attempts: u32,
    pub deposit_expiry: Duration,
    /// Safety timer that frees a purchase guard stuck by a lost task.
    pub purchase_guard_timeout: Duration,
    pub inactivity_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            sms_poll_interval: Duration::from_secs(10),
            sms_poll_attempts: 60,
            deposit_poll_interval: Duration::from_secs(10),
            deposit_poll_attempts: 30,
            deposit_expiry: Duration::from_secs(5 * 60),
            purchase_guard_timeout: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Clone)]
pub struct TicketEngine {
    state: AppState,
    timings: Timings,
    outbound: mpsc::UnboundedSender<Outbound>,
    inactivity: Arc<Mutex<HashMap<UserId, JoinHandle<()>>>>,
}

impl TicketEngine {
    pub fn new(state: AppState, timings: Timings) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = TicketEngine {
            state,
            timings,
            outbound: tx,
            inactivity: Arc::new(Mutex::new(HashMap::new())),
        };
        (engine, rx)
    }

    /// Process one user interaction and produce the reply to render.
    ///
    /// Never panics and never bubbles an error to the caller: one
    /// user's failure must not take the process down with it.
    pub async fn handle(&self, event: Event) -> Reply {
        match self.dispatch(&event).await {
            Ok(reply) => reply,
            Err(err @ StoreError::StateMismatch(_)) => {
                info!(user_id = event.user_id, %err, "action ignored");
                views::notice("⚠️ Essa ação não está disponível agora.")
            }
            Err(StoreError::NotConfigured(key)) => {
                info!(user_id = event.user_id, key, "feature not configured");
                views::not_configured()
            }
            Err(err) => {
                error!(user_id = event.user_id, %err, "interaction failed");
                views::generic_error()
            }
        }
    }

    async fn dispatch(&self, event: &Event) -> Result<Reply, StoreError> {
        let Event {
            user_id,
            channel_id,
            ref action,
        } = *event;

        if let Action::Acquire = action {
            return self.open_ticket(user_id, channel_id);
        }

        // Every other action only makes sense inside an open ticket.
        let Some(ticket_channel) = self.state.tickets.channel(user_id) else {
            return Ok(views::ticket_inactive());
        };
        self.reset_inactivity(user_id, ticket_channel);

        match action {
            Action::Acquire => self.open_ticket(user_id, channel_id),
            Action::AcceptTerms => self.accept_terms(user_id),
            Action::RejectTerms => {
                self.close_ticket(user_id, ticket_channel, CloseReason::TermsRejected)
                    .await
            }
            Action::OpenCatalog => Ok(self.show_catalog(user_id, 0)),
            Action::PagePrev => Ok(self.change_page(user_id, -1)),
            Action::PageNext => Ok(self.change_page(user_id, 1)),
            Action::SelectService { service_id } => self.select_service(user_id, *service_id),
            Action::ConfirmPurchase => self.confirm_purchase(user_id, ticket_channel).await,
            Action::CancelPurchase | Action::BackToMenu => Ok(self.show_menu(user_id)),
            Action::CancelRefund => self.cancel_refund(user_id).await,
            Action::RequestDeposit => self.request_deposit(user_id),
            Action::SubmitDepositAmount { amount } => {
                self.submit_deposit_amount(user_id, ticket_channel, amount).await
            }
            Action::CopyPixCode => Ok(self.copy_pix_code(user_id)),
            Action::ViewHistory => Ok(views::history(&self.state.history.list(user_id))),
            Action::CloseTicket => {
                self.close_ticket(user_id, ticket_channel, CloseReason::UserClosed)
                    .await
            }
        }
    }

    fn show_menu(&self, user_id: UserId) -> Reply {
        self.state.sessions.update(user_id, |s| s.stage = Stage::Menu);
        views::menu(user_id, self.state.ledger.balance(user_id))
    }

    fn show_catalog(&self, user_id: UserId, page: usize) -> Reply {
        let page = self.state.catalog.page(page);
        self.state
            .sessions
            .update(user_id, |s| s.stage = Stage::Browsing { page: page.page });
        views::catalog(&page)
    }

    fn change_page(&self, user_id: UserId, direction: i64) -> Reply {
        let current = self
            .state
            .sessions
            .update(user_id, |s| match s.stage {
                Stage::Browsing { page } => page,
                _ => 0,
            });
        let target = (current as i64 + direction).max(0) as usize;
        self.show_catalog(user_id, target)
    }

    pub(crate) fn push_outbound(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        reply: Reply,
        close_channel: bool,
    ) {
        // The receiver only disappears during shutdown.
        let _ = self.outbound.send(Outbound {
            user_id,
            channel_id,
            reply,
            close_channel,
        });
    }

    pub(crate) fn reset_inactivity(&self, user_id: UserId, channel_id: ChannelId) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(engine.timings.inactivity_timeout).await;
            engine.expire_ticket(user_id, channel_id).await;
        });
        let mut timers = self.inactivity.lock().expect("timer lock poisoned");
        if let Some(previous) = timers.insert(user_id, handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_inactivity(&self, user_id: UserId) {
        let mut timers = self.inactivity.lock().expect("timer lock poisoned");
        if let Some(handle) = timers.remove(&user_id) {
            handle.abort();
        }
    }

    async fn expire_ticket(&self, user_id: UserId, channel_id: ChannelId) {
        // The ticket may have been closed and even reopened elsewhere
        // while this timer was pending.
        if self.state.tickets.channel(user_id) != Some(channel_id) {
            return;
        }
        info!(user_id, channel_id, "closing ticket after inactivity");
        let _ = self
            .close_ticket(user_id, channel_id, CloseReason::Inactivity)
            .await;
    }
}
