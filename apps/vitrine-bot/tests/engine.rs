//! End-to-end exercises of the ticket engine with scripted providers:
//! the money-safety properties (single debit, single refund,
//! conservation), the polling loops and the deposit lifecycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use vitrine_bot::engine::{TicketEngine, Timings};
use vitrine_bot::error::StoreError;
use vitrine_bot::models::event::{Action, Event, Outbound};
use vitrine_bot::providers::{
    CancelOutcome, Charge, PaymentState, PixProvider, RentalNumber, RentalProvider, RentalState,
};
use vitrine_bot::services::settings_service::SettingsService;
use vitrine_bot::state::AppState;
use vitrine_shared::{Amount, Reply, Service};

const USER: u64 = 7;
const CHANNEL: u64 = 100;

#[derive(Default)]
struct MockRental {
    acquire_calls: AtomicUsize,
    status_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    fail_acquire: AtomicBool,
    refuse_cancel: AtomicBool,
    acquire_delay: Mutex<Duration>,
    cancel_delay: Mutex<Duration>,
    statuses: Mutex<VecDeque<RentalState>>,
}

impl MockRental {
    fn script_statuses(&self, states: impl IntoIterator<Item = RentalState>) {
        self.statuses.lock().unwrap().extend(states);
    }
}

#[async_trait]
impl RentalProvider for MockRental {
    fn is_configured(&self) -> bool {
        true
    }

    async fn acquire_number(
        &self,
        _service_id: i64,
        _country: u16,
        _operator: &str,
    ) -> Result<RentalNumber, StoreError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.acquire_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(StoreError::Provider("no numbers available".into()));
        }
        Ok(RentalNumber {
            id: "R1".into(),
            phone_number: "+5511999990000".into(),
        })
    }

    async fn get_status(&self, _rental_id: &str) -> Result<RentalState, StoreError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RentalState::Waiting))
    }

    async fn cancel(&self, _rental_id: &str) -> Result<CancelOutcome, StoreError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.cancel_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(CancelOutcome {
            success: !self.refuse_cancel.load(Ordering::SeqCst),
            message: String::new(),
        })
    }
}

#[derive(Default)]
struct MockPix {
    create_calls: AtomicUsize,
    states: Mutex<VecDeque<PaymentState>>,
}

impl MockPix {
    fn script_states(&self, states: impl IntoIterator<Item = PaymentState>) {
        self.states.lock().unwrap().extend(states);
    }
}

#[async_trait]
impl PixProvider for MockPix {
    fn is_configured(&self) -> bool {
        true
    }

    async fn create_charge(
        &self,
        _amount: Amount,
        _description: &str,
    ) -> Result<Charge, StoreError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Charge {
            id: format!("D{n}"),
            copy_paste_code: format!("00020126pix-copy-paste-{n}"),
        })
    }

    async fn check_payment(&self, _charge_id: &str) -> Result<PaymentState, StoreError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PaymentState::Pending))
    }

    async fn refund(&self, _charge_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

struct Harness {
    engine: TicketEngine,
    outbound: UnboundedReceiver<Outbound>,
    rental: Arc<MockRental>,
    pix: Arc<MockPix>,
    state: AppState,
}

fn fast_timings() -> Timings {
    Timings {
        sms_poll_interval: Duration::from_millis(10),
        sms_poll_attempts: 100,
        deposit_poll_interval: Duration::from_millis(10),
        deposit_poll_attempts: 100,
        deposit_expiry: Duration::from_millis(80),
        purchase_guard_timeout: Duration::from_secs(30),
        inactivity_timeout: Duration::from_secs(60),
    }
}

fn harness(timings: Timings) -> Harness {
    let settings = SettingsService::new();
    let services = vec![
        Service {
            id: 1,
            name: "WhatsApp".into(),
            price: Amount::from_centavos(1000),
            stock: 50,
        },
        Service {
            id: 2,
            name: "Telegram".into(),
            price: Amount::from_centavos(750),
            stock: 12,
        },
    ];
    settings.set("services", serde_json::to_value(services).unwrap());

    let rental = Arc::new(MockRental::default());
    let pix = Arc::new(MockPix::default());
    let state = AppState::new(settings, rental.clone(), pix.clone());
    let (engine, outbound) = TicketEngine::new(state.clone(), timings);
    Harness {
        engine,
        outbound,
        rental,
        pix,
        state,
    }
}

fn event(action: Action) -> Event {
    Event {
        user_id: USER,
        channel_id: CHANNEL,
        action,
    }
}

async fn open_ticket(h: &Harness) {
    h.engine.handle(event(Action::Acquire)).await;
    h.engine.handle(event(Action::AcceptTerms)).await;
}

async fn confirm_purchase(h: &Harness) -> Reply {
    h.engine.handle(event(Action::OpenCatalog)).await;
    h.engine
        .handle(event(Action::SelectService { service_id: 1 }))
        .await;
    h.engine.handle(event(Action::ConfirmPurchase)).await
}

fn drain(outbound: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut messages = Vec::new();
    while let Ok(message) = outbound.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn happy_path_purchase_and_sms_delivery() {
    let mut h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();
    h.rental.script_statuses([
        RentalState::Waiting,
        RentalState::Waiting,
        RentalState::Received {
            code: "482913".into(),
        },
    ]);

    open_ticket(&h).await;
    let reply = confirm_purchase(&h).await;

    assert!(reply.text.contains("+5511999990000"));
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));
    let session = h.state.sessions.get(USER).unwrap();
    assert_eq!(session.active_rental.as_ref().unwrap().id, "R1");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let history = h.state.history.list(USER);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status.label(), "Concluído");
    assert_eq!(history[0].sms_code.as_deref(), Some("482913"));

    // terminal: the rental stays attached until the ticket closes
    let session = h.state.sessions.get(USER).unwrap();
    let rental = session.active_rental.unwrap();
    assert_eq!(rental.id, "R1");
    assert!(rental.code_received);

    let messages = drain(&mut h.outbound);
    assert!(messages.iter().any(|m| m.reply.text.contains("482913")));
}

#[tokio::test]
async fn insufficient_funds_rejects_without_calling_provider() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(500)).unwrap();

    open_ticket(&h).await;
    let reply = confirm_purchase(&h).await;

    assert!(reply.text.contains("Saldo insuficiente"));
    assert_eq!(h.rental.acquire_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(500));
}

#[tokio::test]
async fn rapid_confirm_clicks_debit_once() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();
    *h.rental.acquire_delay.lock().unwrap() = Duration::from_millis(50);

    open_ticket(&h).await;
    h.engine.handle(event(Action::OpenCatalog)).await;
    h.engine
        .handle(event(Action::SelectService { service_id: 1 }))
        .await;

    let (a, b, c) = tokio::join!(
        h.engine.handle(event(Action::ConfirmPurchase)),
        h.engine.handle(event(Action::ConfirmPurchase)),
        h.engine.handle(event(Action::ConfirmPurchase)),
    );

    assert_eq!(h.rental.acquire_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));
    let successes = [&a, &b, &c]
        .iter()
        .filter(|r| r.text.contains("+5511999990000"))
        .count();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn confirm_with_active_rental_is_rejected() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    let reply = confirm_purchase(&h).await;

    assert!(reply.text.contains("número ativo"));
    assert_eq!(h.rental.acquire_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));
}

#[tokio::test]
async fn cancel_refunds_exactly_once() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));

    let reply = h.engine.handle(event(Action::CancelRefund)).await;
    assert!(reply.text.contains("estornados"));
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));
    assert!(h.state.sessions.get(USER).unwrap().active_rental.is_none());

    // second click is a no-op
    let reply = h.engine.handle(event(Action::CancelRefund)).await;
    assert!(reply.text.contains("Nenhum número ativo"));
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));
}

#[tokio::test]
async fn concurrent_cancel_clicks_credit_once() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();
    *h.rental.cancel_delay.lock().unwrap() = Duration::from_millis(50);

    open_ticket(&h).await;
    confirm_purchase(&h).await;

    let (a, b) = tokio::join!(
        h.engine.handle(event(Action::CancelRefund)),
        h.engine.handle(event(Action::CancelRefund)),
    );

    assert_eq!(h.rental.cancel_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));
    let refunds = [&a, &b]
        .iter()
        .filter(|r| r.text.contains("estornados"))
        .count();
    assert_eq!(refunds, 1);
}

#[tokio::test]
async fn refund_happens_even_if_provider_refuses_cancel() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(2000)).unwrap();
    h.rental.refuse_cancel.store(true, Ordering::SeqCst);

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    h.engine.handle(event(Action::CancelRefund)).await;

    // money is conserved regardless of the provider's bookkeeping
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(2000));
    let history = h.state.history.list(USER);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status.label(), "Cancelado/Reembolsado");
}

#[tokio::test]
async fn failed_acquisition_charges_nothing_and_frees_the_guard() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();
    h.rental.fail_acquire.store(true, Ordering::SeqCst);

    open_ticket(&h).await;
    let reply = confirm_purchase(&h).await;
    assert!(reply.text.contains("Nada foi cobrado"));
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));

    // the guard was released: a retry reaches the provider again
    h.rental.fail_acquire.store(false, Ordering::SeqCst);
    let reply = confirm_purchase(&h).await;
    assert!(reply.text.contains("+5511999990000"));
    assert_eq!(h.rental.acquire_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));
}

#[tokio::test]
async fn sms_poll_stops_within_one_tick_of_cancellation() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    tokio::time::sleep(Duration::from_millis(35)).await;
    assert!(h.rental.status_calls.load(Ordering::SeqCst) >= 1);

    h.engine.handle(event(Action::CancelRefund)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_cancel = h.rental.status_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.rental.status_calls.load(Ordering::SeqCst), after_cancel);
}

#[tokio::test]
async fn sms_poll_terminates_at_the_attempt_limit() {
    let mut timings = fast_timings();
    timings.sms_poll_attempts = 3;
    let h = harness(timings);
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    // provider never delivered; the loop gave up after 3 ticks
    assert_eq!(h.rental.status_calls.load(Ordering::SeqCst), 3);
    let history = h.state.history.list(USER);
    assert_eq!(history[0].status.label(), "Aguardando SMS");
}

#[tokio::test]
async fn delivered_rental_is_not_refundable() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();
    h.rental.script_statuses([RentalState::Received {
        code: "111222".into(),
    }]);

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    tokio::time::sleep(Duration::from_millis(40)).await;

    let reply = h.engine.handle(event(Action::CancelRefund)).await;
    assert!(reply.text.contains("não é reembolsável"));
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));

    // closing the ticket must not refund it either
    h.engine.handle(event(Action::CloseTicket)).await;
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));
}

#[tokio::test]
async fn single_open_ticket_per_user() {
    let h = harness(fast_timings());

    h.engine.handle(event(Action::Acquire)).await;
    let reply = h
        .engine
        .handle(Event {
            user_id: USER,
            channel_id: 222,
            action: Action::Acquire,
        })
        .await;

    assert!(reply.text.contains(&format!("<#{CHANNEL}>")));
    assert_eq!(h.state.tickets.channel(USER), Some(CHANNEL));
}

#[tokio::test]
async fn closing_with_active_rental_refunds_inline() {
    let mut h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    let reply = h.engine.handle(event(Action::CloseTicket)).await;

    assert!(reply.text.contains("Reembolso automático"));
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));
    assert_eq!(h.state.tickets.channel(USER), None);
    assert!(h.state.sessions.get(USER).is_none());

    let messages = drain(&mut h.outbound);
    assert!(messages.iter().any(|m| m.close_channel));

    // the ticket is gone; further clicks are stale
    let reply = h.engine.handle(event(Action::ConfirmPurchase)).await;
    assert!(reply.text.contains("não está mais ativo"));
}

#[tokio::test]
async fn purchase_then_cancel_conserves_money() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(3000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    h.engine.handle(event(Action::CancelRefund)).await;

    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(3000));
    let history = h.state.history.list(USER);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status.label(), "Cancelado/Reembolsado");
}

#[tokio::test]
async fn deposit_approval_credits_once_and_survives_expiry_timer() {
    let mut h = harness(fast_timings());
    h.pix
        .script_states([PaymentState::Pending, PaymentState::Approved]);

    open_ticket(&h).await;
    h.engine.handle(event(Action::RequestDeposit)).await;
    let reply = h
        .engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "20,00".into(),
        }))
        .await;
    assert!(reply.text.contains("00020126pix-copy-paste-1"));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(2000));
    let history = h.state.history.list(USER);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status.label(), "Concluído");

    let messages = drain(&mut h.outbound);
    let approvals = messages
        .iter()
        .filter(|m| m.reply.text.contains("Pagamento Confirmado"))
        .count();
    assert_eq!(approvals, 1);
    // the expiry timer found nothing to cancel
    assert!(!messages.iter().any(|m| m.reply.text.contains("expirou")));
}

#[tokio::test]
async fn unpaid_deposit_expires_and_a_new_one_is_accepted() {
    let mut h = harness(fast_timings());

    open_ticket(&h).await;
    h.engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "20".into(),
        }))
        .await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(h.state.ledger.balance(USER), Amount::ZERO);
    assert!(h.state.sessions.get(USER).unwrap().active_deposit.is_none());
    let messages = drain(&mut h.outbound);
    assert!(messages.iter().any(|m| m.reply.text.contains("expirou")));

    let reply = h
        .engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "10".into(),
        }))
        .await;
    assert!(reply.text.contains("Depósito PIX"));
    assert_eq!(h.pix.create_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn duplicate_deposit_request_creates_no_second_charge() {
    let h = harness(fast_timings());

    open_ticket(&h).await;
    h.engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "20".into(),
        }))
        .await;

    let reply = h.engine.handle(event(Action::RequestDeposit)).await;
    assert!(reply.text.contains("já tem um PIX ativo"));
    let reply = h
        .engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "30".into(),
        }))
        .await;
    assert!(reply.text.contains("já tem um PIX ativo"));
    assert_eq!(h.pix.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_deposit_amounts_are_rejected() {
    let h = harness(fast_timings());
    open_ticket(&h).await;

    for raw in ["abc", "0,50", "-10", ""] {
        let reply = h
            .engine
            .handle(event(Action::SubmitDepositAmount { amount: raw.into() }))
            .await;
        assert!(reply.text.contains("Valor inválido"), "accepted {raw:?}");
    }
    assert_eq!(h.pix.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn copy_pix_code_returns_the_active_code_only() {
    let h = harness(fast_timings());
    open_ticket(&h).await;

    let reply = h.engine.handle(event(Action::CopyPixCode)).await;
    assert!(reply.text.contains("não encontrado"));

    h.engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "15".into(),
        }))
        .await;
    let reply = h.engine.handle(event(Action::CopyPixCode)).await;
    assert_eq!(reply.text, "00020126pix-copy-paste-1");
}

#[tokio::test]
async fn catalog_pagination_clamps_at_bounds() {
    let h = harness(fast_timings());
    open_ticket(&h).await;

    let reply = h.engine.handle(event(Action::OpenCatalog)).await;
    assert!(reply.text.contains("Pág 1/1"));
    let reply = h.engine.handle(event(Action::PagePrev)).await;
    assert!(reply.text.contains("Pág 1/1"));
    let reply = h.engine.handle(event(Action::PageNext)).await;
    assert!(reply.text.contains("Pág 1/1"));
}

#[tokio::test]
async fn confirm_without_selected_service_is_a_no_op() {
    let h = harness(fast_timings());
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    let reply = h.engine.handle(event(Action::ConfirmPurchase)).await;

    assert!(reply.text.contains("não está disponível"));
    assert_eq!(h.rental.acquire_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));
}

#[tokio::test]
async fn inactivity_closes_the_ticket_and_refunds() {
    let mut timings = fast_timings();
    timings.inactivity_timeout = Duration::from_millis(60);
    let mut h = harness(timings);
    h.state.ledger.credit(USER, Amount::from_centavos(5000)).unwrap();

    open_ticket(&h).await;
    confirm_purchase(&h).await;
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(4000));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(h.state.tickets.channel(USER), None);
    assert_eq!(h.state.ledger.balance(USER), Amount::from_centavos(5000));
    let messages = drain(&mut h.outbound);
    assert!(messages.iter().any(|m| m.close_channel));
}

#[tokio::test]
async fn interactions_reset_the_inactivity_timer() {
    let mut timings = fast_timings();
    timings.inactivity_timeout = Duration::from_millis(80);
    let h = harness(timings);

    open_ticket(&h).await;
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.engine.handle(event(Action::BackToMenu)).await;
    }
    // 200 ms elapsed, but no 80 ms window ever passed untouched
    assert_eq!(h.state.tickets.channel(USER), Some(CHANNEL));
}

#[tokio::test]
async fn history_view_lists_deposits_and_purchases() {
    let mut h = harness(fast_timings());
    h.pix.script_states([PaymentState::Approved]);
    h.rental.script_statuses([RentalState::Received {
        code: "654321".into(),
    }]);

    open_ticket(&h).await;
    h.engine
        .handle(event(Action::SubmitDepositAmount {
            amount: "50".into(),
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    confirm_purchase(&h).await;
    tokio::time::sleep(Duration::from_millis(40)).await;

    let reply = h.engine.handle(event(Action::ViewHistory)).await;
    assert!(reply.text.contains("Depósito PIX"));
    assert!(reply.text.contains("WhatsApp"));
    assert!(reply.text.contains("654321"));
    drain(&mut h.outbound);
}

#[tokio::test]
async fn terms_rejection_closes_the_ticket() {
    let mut h = harness(fast_timings());

    h.engine.handle(event(Action::Acquire)).await;
    let reply = h.engine.handle(event(Action::RejectTerms)).await;

    assert!(reply.text.contains("fechado"));
    assert_eq!(h.state.tickets.channel(USER), None);
    let messages = drain(&mut h.outbound);
    assert!(messages.iter().any(|m| m.close_channel));

    // the user can start over
    let reply = h.engine.handle(event(Action::Acquire)).await;
    assert!(reply.text.contains("Termos de Uso"));
}
