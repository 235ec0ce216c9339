use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;

use checkout_api::config::{init_tracing, load_config};
use checkout_api::db;
use checkout_api::events::{self, EventSender};
use checkout_api::handlers::AppServices;
use checkout_api::services::payments::paypal::PayPalHttpClient;
use checkout_api::services::payments::stripe::StripeHttpClient;
use checkout_api::services::{CheckoutService, OrderService, PaymentVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config().context("failed to load configuration")?;
    init_tracing(&cfg.log_level, cfg.log_json);

    let db = Arc::new(
        db::establish_connection_from_app_config(&cfg)
            .await
            .context("database connection failed")?,
    );

    if cfg.auto_migrate {
        db::run_migrations(&db).await.context("migrations failed")?;
    }

    let (tx, rx) = mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(tx));
    tokio::spawn(events::process_events(rx));

    let verifier = Arc::new(PaymentVerifier::new(
        Arc::new(StripeHttpClient::new(&cfg.stripe)),
        Arc::new(PayPalHttpClient::new(&cfg.paypal)),
    ));

    let services = AppServices {
        db: db.clone(),
        checkouts: CheckoutService::new(
            db.clone(),
            verifier,
            Some(event_sender),
            cfg.checkout_ttl_minutes,
        ),
        orders: OrderService::new(db.clone()),
    };

    let app = checkout_api::app_router(services, cfg.cors_allowed_origins.as_deref());

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
