use crate::cli::ServeArgs;
use crate::infra::{AppState, ServeFixtures};
use crate::routes::with_smile_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use smile_tracker::config::AppConfig;
use smile_tracker::error::AppError;
use smile_tracker::telemetry;
use smile_tracker::workflows::smiles::{InMemorySmileStore, RankLadder, SmileService};
use std::sync::atomic::{AtomicBool, Ordering};
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

    telemetry::init(&config.telemetry)?;

    let fixtures = match args.fixtures.take() {
        Some(path) => ServeFixtures::load(&path)?,
        None => ServeFixtures::default(),
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = InMemorySmileStore::new(RankLadder::standard());
    let vision = fixtures.seed(&store)?;
    info!(
        users = fixtures.users.len(),
        detections = vision.len(),
        "seeded in-memory smile store"
    );

    let smile_service = Arc::new(SmileService::new(
        Arc::new(store),
        Arc::new(vision),
        config.scoring.clone(),
    ));

    let app = with_smile_routes(smile_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "smile tracker ready");

    axum::serve(listener, app).await?;
    Ok(())
}
