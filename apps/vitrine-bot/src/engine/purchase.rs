//! The purchase path: confirmation gate, number acquisition, the SMS
//! polling task and cancel/refund.
//!
//! Money rules: the balance is only debited after the provider hands
//! out a number, and a refund is credited exactly once no matter how
//! many cancel clicks or provider failures happen on the way.

use tracing::{debug, info, warn};
use uuid::Uuid;
use vitrine_shared::{ChannelId, Reply, Service, UserId};

use crate::engine::{views, TicketEngine};
use crate::error::StoreError;
use crate::models::history::{TransactionRecord, TransactionStatus};
use crate::models::session::{ActiveRental, Stage};
use crate::providers::RentalState;

/// Defaults the storefront rents with: Brazil, any carrier.
const RENTAL_COUNTRY: u16 = 73;
const RENTAL_OPERATOR: &str = "any";

enum PurchaseGate {
    Proceed { service: Service, token: Uuid },
    Busy,
    RentalActive,
    NoServiceSelected,
    Insufficient,
}

enum CancelGate {
    Proceed(ActiveRental),
    Busy,
    NoRental,
    Delivered,
}

impl TicketEngine {
    pub(super) fn select_service(
        &self,
        user_id: UserId,
        service_id: i64,
    ) -> Result<Reply, StoreError> {
        let Some(service) = self.state.catalog.find(service_id) else {
            return Ok(views::notice("❌ Serviço não encontrado."));
        };
        let balance = self.state.ledger.balance(user_id);
        self.state.sessions.update(user_id, |session| {
            session.stage = Stage::Confirming {
                service: service.clone(),
            }
        });
        Ok(views::confirm(&service, balance))
    }

    /// The only transition that spends money. The guard (no purchase in
    /// flight, no active rental, affordable) is checked and armed in
    /// one locked update, before the first await.
    pub(super) async fn confirm_purchase(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<Reply, StoreError> {
        if !self.state.rental.is_configured() {
            return Err(StoreError::NotConfigured("sms24h.api_key"));
        }

        let balance = self.state.ledger.balance(user_id);
        let gate = self.state.sessions.update(user_id, |session| {
            if session.purchase_in_flight.is_some() {
                return PurchaseGate::Busy;
            }
            if session.active_rental.is_some() {
                return PurchaseGate::RentalActive;
            }
            let Stage::Confirming { service } = &session.stage else {
                return PurchaseGate::NoServiceSelected;
            };
            if balance < service.price {
                return PurchaseGate::Insufficient;
            }
            let token = Uuid::new_v4();
            session.purchase_in_flight = Some(token);
            PurchaseGate::Proceed {
                service: service.clone(),
                token,
            }
        });

        let (service, token) = match gate {
            PurchaseGate::Proceed { service, token } => (service, token),
            PurchaseGate::Busy => {
                return Ok(views::notice("⚠️ Processando compra anterior, aguarde..."));
            }
            PurchaseGate::RentalActive => {
                return Ok(views::notice(
                    "⚠️ Você já tem um número ativo neste ticket. Cancele ou aguarde o SMS.",
                ));
            }
            PurchaseGate::NoServiceSelected => {
                return Err(StoreError::StateMismatch("confirm without a selected service"));
            }
            PurchaseGate::Insufficient => {
                return Ok(views::notice("❌ Saldo insuficiente para esta compra."));
            }
        };

        self.spawn_purchase_guard_timer(user_id, token);

        let number = match self
            .state
            .rental
            .acquire_number(service.id, RENTAL_COUNTRY, RENTAL_OPERATOR)
            .await
        {
            Ok(number) => number,
            Err(err) => {
                self.clear_purchase_guard(user_id, token);
                warn!(user_id, %err, "number acquisition failed");
                return Ok(views::purchase_failed(&err.to_string()));
            }
        };

        if let Err(err) = self.state.ledger.debit(user_id, service.price) {
            // Defensive: the guard made this unreachable, but a failed
            // debit must release the number instead of stranding it.
            warn!(user_id, %err, rental_id = %number.id, "debit failed after acquisition");
            if let Err(cancel_err) = self.state.rental.cancel(&number.id).await {
                warn!(rental_id = %number.id, %cancel_err, "failed to release orphaned number");
            }
            self.clear_purchase_guard(user_id, token);
            return Ok(views::purchase_failed(&err.to_string()));
        }

        self.state.history.append(
            user_id,
            TransactionRecord::purchase(
                service.price,
                service.name.clone(),
                number.id.clone(),
                number.phone_number.clone(),
            ),
        );

        let rental = ActiveRental {
            id: number.id.clone(),
            phone_number: number.phone_number,
            service_name: service.name.clone(),
            price: service.price,
            code_received: false,
        };
        self.state.sessions.update(user_id, |session| {
            session.active_rental = Some(rental.clone());
            session.purchase_in_flight = None;
            session.stage = Stage::Menu;
        });
        info!(user_id, rental_id = %rental.id, price = %rental.price, "number sold");

        self.spawn_sms_poll(user_id, channel_id, number.id);
        Ok(views::purchase_success(&rental))
    }

    /// Explicit cancel of the active rental. Wins the gate once; every
    /// further click lands on `Busy` and refunds nothing.
    pub(super) async fn cancel_refund(&self, user_id: UserId) -> Result<Reply, StoreError> {
        let gate = self
            .state
            .sessions
            .update(user_id, |session| match &session.active_rental {
                None => CancelGate::NoRental,
                Some(rental) if rental.code_received => CancelGate::Delivered,
                Some(_) if session.cancel_in_flight => CancelGate::Busy,
                Some(rental) => {
                    session.cancel_in_flight = true;
                    CancelGate::Proceed(rental.clone())
                }
            });

        let rental = match gate {
            CancelGate::Proceed(rental) => rental,
            CancelGate::Busy => {
                return Ok(views::notice("⚠️ Já há um processo de cancelamento em andamento."));
            }
            CancelGate::NoRental => {
                return Ok(views::notice("❌ Nenhum número ativo encontrado."));
            }
            CancelGate::Delivered => {
                return Ok(views::notice(
                    "❌ O código já foi recebido; este número não é reembolsável.",
                ));
            }
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
                // Leave the rental in place so the cancel can be retried,
                // but never with the guard stuck.
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
        info!(user_id, rental_id = %rental.id, price = %rental.price, "rental refunded");
        Ok(views::refund_done(rental.price, new_balance))
    }

    /// Frees the guard if the purchase task died without clearing it.
    /// The token makes sure a later purchase is never unlocked by an
    /// earlier attempt's timer.
    fn spawn_purchase_guard_timer(&self, user_id: UserId, token: Uuid) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.timings.purchase_guard_timeout).await;
            let cleared = engine
                .state
                .sessions
                .with(user_id, |session| {
                    if session.purchase_in_flight == Some(token) {
                        session.purchase_in_flight = None;
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
            if cleared {
                warn!(user_id, "purchase guard cleared by safety timer");
            }
        });
    }

    fn clear_purchase_guard(&self, user_id: UserId, token: Uuid) {
        self.state.sessions.with(user_id, |session| {
            if session.purchase_in_flight == Some(token) {
                session.purchase_in_flight = None;
            }
        });
    }

    fn spawn_sms_poll(&self, user_id: UserId, channel_id: ChannelId, rental_id: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_sms_poll(user_id, channel_id, rental_id).await;
        });
    }

    /// Waits for the SMS code. Stops within one tick of the rental
    /// being cancelled or the ticket closing, and is hard-bounded by
    /// the attempt limit either way.
    async fn run_sms_poll(&self, user_id: UserId, channel_id: ChannelId, rental_id: String) {
        for attempt in 1..=self.timings.sms_poll_attempts {
            tokio::time::sleep(self.timings.sms_poll_interval).await;

            let current = self.state.sessions.get(user_id).and_then(|session| {
                if session.cancel_in_flight {
                    // A cancel is running; it always ends the rental.
                    None
                } else {
                    session.active_rental
                }
            });
            match current {
                Some(rental) if rental.id == rental_id => {}
                _ => {
                    debug!(user_id, rental_id, "rental released, stopping sms poll");
                    return;
                }
            }

            match self.state.rental.get_status(&rental_id).await {
                Ok(RentalState::Waiting) => {}
                Ok(RentalState::Received { code }) => {
                    self.state.history.update_rental_status(
                        user_id,
                        &rental_id,
                        TransactionStatus::Completed,
                        Some(code.clone()),
                    );
                    let rental = self.state.sessions.with(user_id, |session| {
                        match &mut session.active_rental {
                            Some(rental) if rental.id == rental_id => {
                                rental.code_received = true;
                                Some(rental.clone())
                            }
                            _ => None,
                        }
                    });
                    if let Some(Some(rental)) = rental {
                        info!(user_id, rental_id, "sms code received");
                        self.push_outbound(
                            user_id,
                            channel_id,
                            views::code_received(&rental, &code),
                            false,
                        );
                    }
                    return;
                }
                Ok(RentalState::Expired) => {
                    info!(user_id, rental_id, "rental expired at the provider");
                    return;
                }
                Err(err) => {
                    // Transient provider trouble; keep polling.
                    warn!(user_id, rental_id, attempt, %err, "sms status check failed");
                }
            }
        }
        debug!(user_id, rental_id, "sms poll abandoned after max attempts");
    }
}
