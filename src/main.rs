use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use storefront_checkout::{
    api_v1_routes,
    config::{init_tracing, load_config},
    db,
    events,
    openapi::swagger_ui,
    services::HttpPaymentGateway,
    AppServices, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "starting storefront-checkout v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?,
    );

    if config.auto_migrate {
        db::ensure_schema(&db)
            .await
            .context("failed to ensure database schema")?;
        info!("database schema is up to date");
    }

    let (event_sender, event_receiver) = events::channel(256);
    tokio::spawn(events::process_events(event_receiver));

    let gateway = Arc::new(
        HttpPaymentGateway::new(
            config.payment.api_base.clone(),
            config.payment.key_id.clone(),
            config.payment.key_secret.clone(),
            Duration::from_secs(config.payment.request_timeout_secs),
        )
        .context("failed to build payment gateway client")?,
    );

    let services = AppServices::new(db.clone(), gateway, event_sender.clone(), &config);
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    });

    let app = api_v1_routes()
        .merge(swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
