use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vitrine_bot::engine::{TicketEngine, Timings};
use vitrine_bot::providers::{MercadoPagoClient, Sms24hClient};
use vitrine_bot::services::settings_service::SettingsService;
use vitrine_bot::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Vitrine storefront engine...");

    let settings = load_settings()?;
    let rental = Arc::new(Sms24hClient::new(settings.get_str("sms24h.api_key")));
    let pix = Arc::new(MercadoPagoClient::new(
        settings.get_str("mercadopago.access_token"),
    ));

    let state = AppState::new(settings, rental, pix);
    let (engine, mut outbound) = TicketEngine::new(state, Timings::default());

    // The messaging gateway attaches here: it feeds interactions into
    // `engine.handle` and renders what comes out of this queue. Until
    // one is connected, outbound payloads are only logged.
    let _engine = engine;
    let consumer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            info!(
                user_id = message.user_id,
                channel_id = message.channel_id,
                close_channel = message.close_channel,
                text = %message.reply.text,
                "outbound payload"
            );
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping...");
    consumer.abort();
    Ok(())
}

/// Mirror the environment into the settings store the engine reads.
fn load_settings() -> Result<SettingsService> {
    let settings = SettingsService::new();

    for (env_key, setting_key) in [
        ("MERCADOPAGO_ACCESS_TOKEN", "mercadopago.access_token"),
        ("SMS24H_API_KEY", "sms24h.api_key"),
        ("TICKET_CATEGORY_ID", "tickets.categoria"),
    ] {
        if let Ok(value) = env::var(env_key) {
            settings.set(setting_key, serde_json::Value::String(value));
        } else {
            warn!(env_key, "not set; the matching feature stays disabled");
        }
    }

    let services_path =
        env::var("VITRINE_SERVICES_FILE").unwrap_or_else(|_| "services.json".to_string());
    match std::fs::read_to_string(&services_path) {
        Ok(raw) => {
            let services: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("invalid service catalog in {services_path}"))?;
            settings.set("services", services);
        }
        Err(err) => warn!(%err, services_path, "service catalog not loaded; catalog is empty"),
    }

    Ok(settings)
}
