use std::sync::Arc;

use crate::providers::{PixProvider, RentalProvider};
use crate::services::balance_service::BalanceService;
use crate::services::catalog_service::CatalogService;
use crate::services::history_service::HistoryService;
use crate::services::session_service::SessionService;
use crate::services::settings_service::SettingsService;
use crate::services::ticket_service::TicketService;

/// Dependency bundle handed to the engine. Everything is cheap to clone;
/// the stores are in-memory here and replaceable behind the same types.
#[derive(Clone)]
pub struct AppState {
    pub settings: SettingsService,
    pub catalog: CatalogService,
    pub ledger: BalanceService,
    pub history: HistoryService,
    pub sessions: SessionService,
    pub tickets: TicketService,
    pub rental: Arc<dyn RentalProvider>,
    pub pix: Arc<dyn PixProvider>,
}

impl AppState {
    pub fn new(
        settings: SettingsService,
        rental: Arc<dyn RentalProvider>,
        pix: Arc<dyn PixProvider>,
    ) -> Self {
        let catalog = CatalogService::new(settings.clone());
        AppState {
            settings,
            catalog,
            ledger: BalanceService::new(),
            history: HistoryService::new(),
            sessions: SessionService::new(),
            tickets: TicketService::new(),
            rental,
            pix,
        }
    }
}
