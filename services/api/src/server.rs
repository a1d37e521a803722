use crate::cli::ServeArgs;
use crate::infra::{seed_demo_portfolio, AppState};
use crate::routes::with_agency_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use inmo_crm::agency::{AgencyService, InMemoryAgencyStore};
use inmo_crm::config::AppConfig;
use inmo_crm::error::AppError;
use inmo_crm::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.seed_demo {
        config.agency.seed_demo = true;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryAgencyStore::new());
    let agency_service = Arc::new(AgencyService::new(store));
    if config.agency.seed_demo {
        seed_demo_portfolio(&*agency_service)?;
    }

    let app = with_agency_routes(agency_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, seeded = config.agency.seed_demo, "agency service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
