//! The PIX deposit sub-flow: one active charge per user, a bounded
//! approval poll and a hard 5-minute expiry. The poll and the expiry
//! timer race for the same charge; whichever atomically takes it out of
//! the session wins, so a deposit is credited at most once and never
//! after it expired.

use tracing::{debug, info, warn};
use vitrine_shared::{Amount, ChannelId, Reply, UserId};

use crate::engine::{views, TicketEngine};
use crate::error::StoreError;
use crate::models::history::{TransactionRecord, TransactionStatus};
use crate::models::session::ActiveDeposit;
use crate::providers::PaymentState;

const MIN_DEPOSIT: Amount = Amount::from_centavos(100);

impl TicketEngine {
    pub(super) fn request_deposit(&self, user_id: UserId) -> Result<Reply, StoreError> {
        if !self.state.pix.is_configured() {
            return Err(StoreError::NotConfigured("mercadopago.access_token"));
        }
        let already_active = self
            .state
            .sessions
            .get(user_id)
            .map(|s| s.active_deposit.is_some() || s.deposit_in_flight)
            .unwrap_or(false);
        if already_active {
            return Ok(views::notice(
                "❌ Você já tem um PIX ativo. Por favor, pague ou aguarde o cancelamento automático (5 min).",
            ));
        }
        Ok(views::deposit_prompt())
    }

    pub(super) async fn submit_deposit_amount(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        raw_amount: &str,
    ) -> Result<Reply, StoreError> {
        if !self.state.pix.is_configured() {
            return Err(StoreError::NotConfigured("mercadopago.access_token"));
        }
        let amount = match Amount::parse_brl(raw_amount) {
            Some(amount) if amount >= MIN_DEPOSIT => amount,
            _ => return Ok(views::invalid_deposit_amount()),
        };

        let proceed = self.state.sessions.update(user_id, |session| {
            if session.active_deposit.is_some() || session.deposit_in_flight {
                false
            } else {
                session.deposit_in_flight = true;
                true
            }
        });
        if !proceed {
            return Ok(views::notice(
                "❌ Você já tem um PIX ativo. Por favor, pague ou aguarde o cancelamento automático (5 min).",
            ));
        }

        let description = format!("Depósito de Saldo - {user_id}");
        let charge = match self.state.pix.create_charge(amount, &description).await {
            Ok(charge) => charge,
            Err(err) => {
                self.state
                    .sessions
                    .with(user_id, |session| session.deposit_in_flight = false);
                warn!(user_id, %err, "charge creation failed");
                return Ok(views::deposit_failed(&err.to_string()));
            }
        };

        let deposit = ActiveDeposit {
            id: charge.id.clone(),
            amount,
            copy_paste_code: charge.copy_paste_code,
        };
        self.state.sessions.update(user_id, |session| {
            session.active_deposit = Some(deposit.clone());
            session.deposit_in_flight = false;
        });
        info!(user_id, charge_id = %charge.id, %amount, "PIX charge created");

        self.spawn_deposit_expiry(user_id, channel_id, charge.id.clone());
        self.spawn_deposit_poll(user_id, channel_id, charge.id);
        Ok(views::pix_created(&deposit))
    }

    pub(super) fn copy_pix_code(&self, user_id: UserId) -> Reply {
        match self
            .state
            .sessions
            .get(user_id)
            .and_then(|session| session.active_deposit)
        {
            Some(deposit) => views::pix_code(&deposit.copy_paste_code),
            None => views::pix_not_found(),
        }
    }

    fn spawn_deposit_poll(&self, user_id: UserId, channel_id: ChannelId, charge_id: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_deposit_poll(user_id, channel_id, charge_id).await;
        });
    }

    fn spawn_deposit_expiry(&self, user_id: UserId, channel_id: ChannelId, charge_id: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.timings.deposit_expiry).await;
            let expired = engine
                .state
                .sessions
                .with(user_id, |session| match &session.active_deposit {
                    Some(deposit) if deposit.id == charge_id => {
                        session.active_deposit = None;
                        true
                    }
                    _ => false,
                })
                .unwrap_or(false);
            if expired {
                info!(user_id, charge_id, "PIX charge expired unpaid");
                engine.push_outbound(user_id, channel_id, views::pix_expired(), false);
            }
        });
    }

    async fn run_deposit_poll(&self, user_id: UserId, channel_id: ChannelId, charge_id: String) {
        for attempt in 1..=self.timings.deposit_poll_attempts {
            tokio::time::sleep(self.timings.deposit_poll_interval).await;

            let still_active = self
                .state
                .sessions
                .get(user_id)
                .and_then(|session| session.active_deposit)
                .is_some_and(|deposit| deposit.id == charge_id);
            if !still_active {
                debug!(user_id, charge_id, "deposit released, stopping poll");
                return;
            }

            match self.state.pix.check_payment(&charge_id).await {
                Ok(PaymentState::Approved) => {
                    // Atomically take the deposit so the expiry timer
                    // (or a racing poll) can never credit it again.
                    let taken = self
                        .state
                        .sessions
                        .with(user_id, |session| match &session.active_deposit {
                            Some(deposit) if deposit.id == charge_id => {
                                session.active_deposit.take()
                            }
                            _ => None,
                        })
                        .flatten();
                    let Some(deposit) = taken else { return };

                    let new_balance = match self.state.ledger.credit(user_id, deposit.amount) {
                        Ok(balance) => balance,
                        Err(err) => {
                            warn!(user_id, charge_id, %err, "failed to credit approved deposit");
                            return;
                        }
                    };
                    self.state.history.append(
                        user_id,
                        TransactionRecord::deposit(deposit.amount, TransactionStatus::Completed),
                    );
                    info!(user_id, charge_id, amount = %deposit.amount, "deposit approved");
                    self.push_outbound(
                        user_id,
                        channel_id,
                        views::deposit_approved(deposit.amount, new_balance),
                        false,
                    );
                    return;
                }
                Ok(PaymentState::Rejected) | Ok(PaymentState::Cancelled) => {
                    let cleared = self
                        .state
                        .sessions
                        .with(user_id, |session| match &session.active_deposit {
                            Some(deposit) if deposit.id == charge_id => {
                                session.active_deposit = None;
                                true
                            }
                            _ => false,
                        })
                        .unwrap_or(false);
                    if cleared {
                        info!(user_id, charge_id, "deposit rejected by the gateway");
                        self.push_outbound(user_id, channel_id, views::deposit_rejected(), false);
                    }
                    return;
                }
                Ok(PaymentState::Pending) => {}
                Err(err) => {
                    warn!(user_id, charge_id, attempt, %err, "payment check failed");
                }
            }
        }
        // The expiry timer owns the "unpaid" notification.
        debug!(user_id, charge_id, "deposit poll ended without approval");
    }
}
