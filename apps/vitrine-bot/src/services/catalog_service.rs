use vitrine_shared::Service;

use crate::services::settings_service::SettingsService;

/// Select menus cap out at 25 options per page.
pub const SERVICES_PER_PAGE: usize = 25;

/// Read-only view over the service catalog kept in the settings store
/// (key `services`), where the admin panel edits it.
#[derive(Clone)]
pub struct CatalogService {
    settings: SettingsService,
}

#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub services: Vec<Service>,
    pub page: usize,
    pub total_pages: usize,
}

impl CatalogService {
    pub fn new(settings: SettingsService) -> Self {
        Self { settings }
    }

    pub fn services(&self) -> Vec<Service> {
        self.settings
            .get("services")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn find(&self, service_id: i64) -> Option<Service> {
        self.services().into_iter().find(|s| s.id == service_id)
    }

    pub fn total_pages(&self) -> usize {
        self.services().len().div_ceil(SERVICES_PER_PAGE).max(1)
    }

    /// Page is clamped into range, so stale navigation clicks stay valid.
    pub fn page(&self, page: usize) -> CatalogPage {
        let services = self.services();
        let total_pages = services.len().div_ceil(SERVICES_PER_PAGE).max(1);
        let page = page.min(total_pages - 1);
        let start = page * SERVICES_PER_PAGE;
        let services = services
            .into_iter()
            .skip(start)
            .take(SERVICES_PER_PAGE)
            .collect();
        CatalogPage {
            services,
            page,
            total_pages,
        }
    }
}
