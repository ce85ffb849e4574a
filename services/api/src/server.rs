use crate::cli::ServeArgs;
use crate::infra::{load_store, AppState, ConfiguredNotifier};
use crate::routes::with_registry_routes;
use apprenticeship::config::AppConfig;
use apprenticeship::error::AppError;
use apprenticeship::notify::{ConfirmationTemplate, DeliveryWorker, InMemoryOutbox};
use apprenticeship::registry::{RecordService, RegistryState, StatusTransitionService};
use apprenticeship::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(load_store(&config)?);
    let outbox = Arc::new(InMemoryOutbox::default());
    let template = ConfirmationTemplate::new(config.registry.report_portal_url.clone());
    let registry = RegistryState {
        records: Arc::new(RecordService::new(store.clone())),
        transitions: Arc::new(StatusTransitionService::new(
            store,
            outbox.clone(),
            template,
        )),
    };

    let notifier = Arc::new(ConfiguredNotifier::from_config(&config.telegram)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = DeliveryWorker::new(outbox, notifier, config.delivery.retry_policy())
        .with_batch_size(config.delivery.batch_size)
        .with_poll_interval(config.delivery.poll_interval())
        .spawn(shutdown_rx);

    let app = with_registry_routes(registry)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "apprenticeship registry ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    readiness_flag.store(false, Ordering::Release);
    let _ = shutdown_tx.send(true);
    if let Err(err) = worker.await {
        error!(error = %err, "delivery worker aborted");
    }
    info!("apprenticeship registry stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
