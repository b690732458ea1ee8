//! Order desk server.
//!
//! Serves the staff back office on port 3002: order snapshots and mutations,
//! the live event stream, push destination registration, and the storefront
//! checkout endpoint.
//!
//! # Architecture
//!
//! - Axum web framework
//! - `PostgreSQL` for orders, history, push destinations and sessions
//!   (in-memory store when `DATABASE_URL` is unset)
//! - FCM HTTP v1 and Web Push for offline operators
//! - Sessions shared with the shop's account service

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orderdesk_server::config::{LogFormat, OrderdeskConfig};
use orderdesk_server::db::{self, Catalog, DestinationStore, MemoryStore, OrderStore, PgStore};
use orderdesk_server::events::EventBus;
use orderdesk_server::middleware::{create_session_layer, create_session_store};
use orderdesk_server::routes;
use orderdesk_server::services::push::{FcmClient, WebPushClient};
use orderdesk_server::services::{
    OrderLifecycle, PushDispatcher, StreamRegistry, spawn_push_worker,
};
use orderdesk_server::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &OrderdeskConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Record stores behind the lifecycle and the push dispatcher.
struct Stores {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    destinations: Arc<dyn DestinationStore>,
    pool: Option<PgPool>,
}

async fn open_stores(config: &OrderdeskConfig) -> Stores {
    if let Some(database_url) = &config.database_url {
        let pool = db::create_pool(database_url)
            .await
            .expect("Failed to create database pool");
        tracing::info!("Database pool created");

        // NOTE: Migrations are NOT run automatically on startup.
        // Run them explicitly via: cargo run -p orderdesk-cli -- migrate

        let store = Arc::new(PgStore::new(pool.clone()));
        Stores {
            orders: store.clone(),
            catalog: store.clone(),
            destinations: store,
            pool: Some(pool),
        }
    } else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store (data is not persisted)");
        let store = Arc::new(MemoryStore::new());
        Stores {
            orders: store.clone(),
            catalog: store.clone(),
            destinations: store,
            pool: None,
        }
    }
}

fn build_dispatcher(
    config: &OrderdeskConfig,
    destinations: Arc<dyn DestinationStore>,
) -> PushDispatcher {
    let push = &config.push;
    let mut dispatcher =
        PushDispatcher::new(destinations, push.default_locale.clone(), push.currency.clone());

    if let Some(fcm) = &push.fcm {
        let client = FcmClient::new(fcm, push.timeout).expect("Failed to create FCM client");
        dispatcher = dispatcher.with_token_channel(Arc::new(client));
        tracing::info!(project_id = %fcm.project_id, "FCM push channel enabled");
    } else {
        tracing::info!("FCM not configured, token push channel disabled");
    }

    if let Some(web_push) = &push.web_push {
        let client =
            WebPushClient::new(web_push, push.timeout).expect("Failed to create Web Push client");
        dispatcher = dispatcher.with_subscription_channel(Arc::new(client));
        tracing::info!("Web Push channel enabled");
    } else {
        tracing::info!("VAPID keys not configured, subscription push channel disabled");
    }

    dispatcher
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load configuration from environment (needed for Sentry init)
    let config = OrderdeskConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orderdesk_server=info,tower_http=debug".into());

    let is_json = config.log_format == LogFormat::Json;
    let json_layer = is_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let stores = open_stores(&config).await;

    // One bus per process, shared by the lifecycle, live streams and push
    let bus = EventBus::new();
    let lifecycle = OrderLifecycle::new(stores.orders, stores.catalog, bus.clone());
    let streams = StreamRegistry::new(bus.clone(), config.stream.keepalive, config.stream.buffer);

    let dispatcher = build_dispatcher(&config, stores.destinations.clone());
    let _push_worker = spawn_push_worker(&bus, Arc::new(dispatcher));

    let state = AppState::new(
        config.clone(),
        lifecycle,
        streams,
        stores.destinations,
        stores.pool.clone(),
    );

    // PostgreSQL-backed sessions when a database is configured
    let app = if let Some(pool) = &stores.pool {
        let store = create_session_store(pool).expect("Failed to create session store");
        routes::build_router(state, create_session_layer(store, &config))
    } else {
        let store = tower_sessions::MemoryStore::default();
        routes::build_router(state, create_session_layer(store, &config))
    };

    serve(app, &config).await;
}

async fn serve(app: Router, config: &OrderdeskConfig) {
    let addr = config.socket_addr();

    if let Some(tls_config) = &config.tls {
        let rustls_config = RustlsConfig::from_pem(
            tls_config.cert_pem.as_bytes().to_vec(),
            tls_config.key_pem.expose_secret().as_bytes().to_vec(),
        )
        .await
        .expect("Failed to load TLS certificates");

        tracing::info!("orderdesk listening on https://{}", addr);

        let handle = Handle::new();
        let shutdown_handle = handle.clone();

        // Spawn task to handle graceful shutdown
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(30)));
        });

        axum_server::bind_rustls(addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .expect("Server error");
    } else {
        tracing::info!("orderdesk listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind to address");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .expect("Server error");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
