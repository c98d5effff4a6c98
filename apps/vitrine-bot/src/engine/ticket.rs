//! Ticket lifecycle: opening, terms, and the close paths (explicit,
//! terms rejection, inactivity), including the inline auto-refund of an
//! undelivered rental.

use tracing::{info, warn};
use vitrine_shared::{Amount, ChannelId, Reply, UserId};

use crate::engine::{views, TicketEngine};
use crate::error::StoreError;
use crate::models::history::TransactionStatus;
use crate::models::session::{Session, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    UserClosed,
    TermsRejected,
    Inactivity,
}

impl TicketEngine {
    /// "Adquirir" pressed: register the ticket and greet with the terms.
    /// A second acquire while one is open points back at the existing
    /// channel and changes nothing.
    pub(super) fn open_ticket(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<Reply, StoreError> {
        if let Err(existing) = self.state.tickets.open(user_id, channel_id) {
            return Ok(views::ticket_exists(existing));
        }
        self.state
            .sessions
            .update(user_id, |session| *session = Session::default());
        self.reset_inactivity(user_id, channel_id);
        info!(user_id, channel_id, "ticket opened");
        Ok(views::terms(user_id))
    }

    pub(super) fn accept_terms(&self, user_id: UserId) -> Result<Reply, StoreError> {
        Ok(self.show_menu(user_id))
    }

    /// Tear the ticket down. An active, undelivered rental is cancelled
    /// and refunded first, exactly like an explicit cancel.
    pub(super) async fn close_ticket(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        reason: CloseReason,
    ) -> Result<Reply, StoreError> {
        let refund = self.refund_active_rental(user_id).await?;

        self.state.tickets.close(user_id);
        self.state.sessions.remove(user_id);
        self.cancel_inactivity(user_id);
        info!(user_id, channel_id, ?reason, "ticket closed");

        let reply = match reason {
            CloseReason::UserClosed => views::closing(refund),
            CloseReason::TermsRejected => views::closed_by_user(),
            CloseReason::Inactivity => match refund {
                Some(_) => views::closing(refund),
                None => views::closed_by_inactivity(),
            },
        };
        self.push_outbound(user_id, channel_id, reply.clone(), true);
        Ok(reply)
    }

    /// Win the cancel gate and refund, or do nothing if there is no
    /// refundable rental (none, already delivered, or a cancel already
    /// in flight — that one will finish its own refund).
    async fn refund_active_rental(
        &self,
        user_id: UserId,
    ) -> Result<Option<(Amount, Amount)>, StoreError> {
        let gate = self.state.sessions.with(user_id, |session| {
            match &session.active_rental {
                Some(rental) if !rental.code_received && !session.cancel_in_flight => {
                    session.cancel_in_flight = true;
                    Some(rental.clone())
                }
                _ => None,
            }
        });
        let Some(Some(rental)) = gate else {
            return Ok(None);
        };

        match self.state.rental.cancel(&rental.id).await {
            Ok(outcome) if !outcome.success => {
                warn!(rental_id = %rental.id, message = %outcome.message, "provider refused cancel, refunding anyway")
            }
            Ok(_) => {}
            Err(err) => {
                warn!(rental_id = %rental.id, %err, "provider cancel failed, refunding anyway")
            }
        }

        let new_balance = match self.state.ledger.credit(user_id, rental.price) {
            Ok(balance) => balance,
            Err(err) => {
                self.state
                    .sessions
                    .with(user_id, |session| session.cancel_in_flight = false);
                return Err(err);
            }
        };
        self.state.history.update_rental_status(
            user_id,
            &rental.id,
            TransactionStatus::Refunded,
            None,
        );
        self.state.sessions.with(user_id, |session| {
            session.active_rental = None;
            session.cancel_in_flight = false;
            session.stage = Stage::Menu;
        });
        info!(user_id, rental_id = %rental.id, price = %rental.price, "rental refunded on close");
        Ok(Some((rental.price, new_balance)))
    }
}
