//! Storefront service binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::distributions::{Alphanumeric, DistString};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::auth::TokenIssuer;
use storefront::config::Config;
use storefront::events::{EventPublisher, LogPublisher, NatsPublisher};
use storefront::http::{router, AppState};
use storefront::payments::{OfflineGateway, PaymentGateway, RazorpayGateway};
use storefront::services::sweeper::spawn_payment_sweeper;
use storefront::services::{Services, Settings};
use storefront::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data is kept in memory only");
            Arc::new(MemoryStore::default())
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events are logged only");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.razorpay {
        Some(rzp) => Arc::new(RazorpayGateway::new(rzp)),
        None => {
            tracing::warn!("Razorpay not configured, online payments use the offline gateway");
            Arc::new(OfflineGateway::new(Alphanumeric.sample_string(&mut rand::thread_rng(), 32)))
        }
    };

    let services = Arc::new(Services::new(
        store,
        gateway,
        events,
        TokenIssuer::new(&config.jwt),
        Settings::from_config(&config),
    ));

    if let Some(admin) = &config.admin {
        services.seed_admin(&admin.email, &admin.password).await?;
    }
    let sweeper = spawn_payment_sweeper(services.clone(), Duration::from_secs(config.sweep_interval_secs.max(1)));

    let app = router(AppState::new(services));
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
    tracing::info!("storefront listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("storefront stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
