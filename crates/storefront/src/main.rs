//! Coffeehouse storefront binary.
//!
//! Reads configuration from the environment (and `.env`), sets up Sentry and
//! tracing, then serves [`coffeehouse_storefront::app`] until Ctrl+C or
//! SIGTERM.

#![cfg_attr(not(test), forbid(unsafe_code))]

use coffeehouse_storefront::{app, config::StorefrontConfig, state::AppState};
use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "coffeehouse_storefront=info,tower_http=debug";

#[tokio::main]
async fn main() {
    let config = StorefrontConfig::from_env().expect("Invalid storefront configuration");

    // Sentry goes first so the tracing layer below has a client to report to.
    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config.sentry_environment.clone().map(Into::into),
                traces_sample_rate: config.sentry_traces_sample_rate,
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    });

    init_tracing();

    if config.sentry_dsn.is_some() {
        tracing::info!("Sentry error tracking enabled");
    }

    let addr = config.socket_addr();
    tracing::info!(backend = %config.backend_url, %addr, "Starting storefront");

    let router = app(AppState::new(config))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind storefront address");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Storefront server error");
}

/// Install the fmt and Sentry layers behind `RUST_LOG`.
///
/// Warnings and errors become Sentry events; info and debug lines become
/// breadcrumbs on the next event.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let sentry_layer = sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        Level::TRACE => EventFilter::Ignore,
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down");
}
