use crm_portal::{
    AppState, AuthGateway, FileSessionStore, HttpBackend,
    backend::BackendState,
    config::{AppConfig, Env},
    create_router,
    storage::SessionStoreState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, the session context and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup. RUST_LOG wins when set.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crm_portal=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Portal starting in {:?} mode", config.env);
    tracing::info!(api_url = %config.api_url, session_file = %config.session_file.display(), "backend and session store");

    // 4. Backend client and session store
    let backend = HttpBackend::new(&config.api_url, config.request_timeout)
        .expect("FATAL: Failed to build the backend HTTP client.");
    let backend = Arc::new(backend) as BackendState;
    let store = Arc::new(FileSessionStore::new(config.session_file.clone())) as SessionStoreState;

    // 5. Session context. Bootstrap runs in the background; the gate answers "loading"
    // until it settles.
    let gateway = Arc::new(AuthGateway::new(store, backend));
    {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            match gateway.bootstrap().await {
                Ok(session) => tracing::info!(status = session.status(), "session bootstrap complete"),
                Err(e) => tracing::warn!(error = %e, "session bootstrap skipped"),
            }
        });
    }

    // 6. Router and Server Startup
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(gateway.clone(), config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {bind_addr}: {e}"));

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    // Results still in flight are discarded; the stored credential survives for the next run.
    gateway.teardown();
}
