use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use photosheet_core::admission::AdmissionController;
use photosheet_core::counter_store::{CounterStore, InMemoryCounterStore};
use photosheet_pipeline::Pipeline;
use photosheet_remote::background_removal::RemoveBgApi;
use photosheet_remote::enhancement::EnhanceApi;
use photosheet_remote::image_host::CloudinaryApi;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photosheet_api::config::{RemoteConfig, ServerConfig};
use photosheet_api::routes;
use photosheet_api::state::AppState;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photosheet_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Counter store ---
    let store = build_counter_store().await;
    let admission = AdmissionController::new(store, config.rate_limit.windows.clone())
        .with_fallback_retry_after(config.rate_limit.fallback_retry_after);
    tracing::info!(
        backend = admission.backend_name(),
        windows = admission.windows().len(),
        "Admission controller ready"
    );

    // --- Pipeline ---
    let pipeline = build_pipeline(&config.remote);
    tracing::info!(stages = ?pipeline.enabled_stages(), "Pipeline ready");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline: Arc::new(pipeline),
        admission: Arc::new(admission),
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes(config.max_upload_bytes))
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Peer addresses key the rate limit unless trusted proxies are configured.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Postgres counters when `DATABASE_URL` is set, in-process counters
/// otherwise.
async fn build_counter_store() -> Arc<dyn CounterStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::info!("DATABASE_URL not set, using in-memory rate limit counters");
        return Arc::new(InMemoryCounterStore::new());
    };

    let pool = photosheet_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    photosheet_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    photosheet_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(photosheet_db::PgCounterStore::new(pool));
    tokio::spawn(purge_expired_counters(Arc::clone(&store)));
    store
}

/// Drop counters whose window has ended, once per [`PURGE_INTERVAL`].
async fn purge_expired_counters(store: Arc<photosheet_db::PgCounterStore>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        match store.purge_expired(chrono::Utc::now()).await {
            Ok(removed) => tracing::debug!(removed, "Purged expired rate limit counters"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge rate limit counters"),
        }
    }
}

/// Enable each remote stage whose credentials are configured. One HTTP
/// client is shared so connections are pooled across stages.
fn build_pipeline(remote: &RemoteConfig) -> Pipeline {
    let client = reqwest::Client::new();
    let mut pipeline = Pipeline::new();

    if let Some(settings) = &remote.remove_bg {
        pipeline = pipeline.with_background_remover(Arc::new(RemoveBgApi::with_client(
            client.clone(),
            settings.api_url.clone(),
            settings.api_key.clone(),
        )));
    }

    if let Some(settings) = &remote.cloudinary {
        pipeline = pipeline.with_image_store(Arc::new(CloudinaryApi::with_client(
            client.clone(),
            settings.cloud_name.clone(),
            settings.api_key.clone(),
            settings.api_secret.clone(),
        )));
    }

    if let Some(settings) = &remote.enhance {
        pipeline = pipeline.with_enhancer(Arc::new(EnhanceApi::with_client(
            client.clone(),
            settings.api_url.clone(),
            settings.params.clone(),
        )));
    }

    pipeline
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-placed-copies")])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
