use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stock_diagnosis::api::{run_server, AppState};
use stock_diagnosis::catalog::{load_catalog, CatalogState};
use stock_diagnosis::chain::ChainCoordinator;
use stock_diagnosis::conversion::HttpRedirectClient;
use stock_diagnosis::diagnosis::{DiagnosisOrchestrator, HttpDiagnosisClient};
use stock_diagnosis::error::AppError;
use stock_diagnosis::quote::HttpQuoteClient;
use stock_diagnosis::session::AppSession;
use stock_diagnosis::tracking::{HttpTracker, LogTracker, Tracker, TrackingService};
use stock_diagnosis::{AppConfig, EventBus};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Setup Logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    if dotenvy::dotenv().is_err() {
        info!("ℹ️ No .env file found, using process environment");
    }

    info!("Starting stock diagnosis controller...");

    let config = AppConfig::load()?;
    info!("Loaded Configuration: {:?}", config);

    let client = reqwest::Client::builder().build()?;
    let bus = EventBus::new(config.event_bus_capacity);

    // Tracking
    let tracker: Arc<dyn Tracker> = match (config.tracking.enabled, config.tracking.endpoint.as_deref()) {
        (true, Some(endpoint)) => {
            info!("📊 Tracking to {}", endpoint);
            Arc::new(HttpTracker::new(client.clone(), url::Url::parse(endpoint)?))
        }
        (true, None) => Arc::new(LogTracker),
        (false, _) => {
            info!("ℹ️ Tracking disabled");
            Arc::new(LogTracker)
        }
    };
    if config.tracking.enabled {
        TrackingService::new(tracker).start(&bus);
    }

    // Remote collaborators
    let quotes = Arc::new(HttpQuoteClient::new(client.clone(), &config.api_base)?);
    let diagnosis_api = Arc::new(HttpDiagnosisClient::new(client.clone(), config.diagnosis_base())?);
    let redirects = Arc::new(HttpRedirectClient::new(client.clone(), &config.api_base)?);
    info!("🤖 Diagnosis endpoint base: {}", config.diagnosis_base());

    let orchestrator = Arc::new(DiagnosisOrchestrator::new(
        diagnosis_api,
        bus.clone(),
        config.diagnosis.clone(),
    ));
    let chain = Arc::new(ChainCoordinator::new(
        AppSession::new(config.search.page_size),
        quotes,
        redirects,
        orchestrator,
        bus.clone(),
    ));

    // Stock list loads in the background; search input is ignored until then
    let source = config.catalog_source()?;
    {
        let chain = chain.clone();
        let client = client.clone();
        tokio::spawn(async move {
            let state = CatalogState::from_result(load_catalog(&client, &source).await);
            if let Some(e) = state.error() {
                warn!("⚠️ [CATALOG] Search disabled: {}", e);
            }
            chain.set_catalog(state);
        });
    }

    // Start API Server
    info!("Initializing API Server...");
    let state = Arc::new(AppState { chain });
    run_server(state, &config.server.bind).await
}
