use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{InMemoryAppointmentStore, SupabaseAppointmentStore};
use availability_cell::services::{InMemoryAvailabilityStore, SupabaseAvailabilityStore};
use shared_config::{AppConfig, StorageBackend};
use shared_database::{InMemoryDirectory, SupabaseClient, SupabaseDirectory};
use shared_utils::clock::SystemClock;

use router::Backends;

fn build_backends(config: &AppConfig) -> Backends {
    match config.storage_backend {
        StorageBackend::Supabase => {
            let supabase = Arc::new(SupabaseClient::new(config));
            Backends {
                directory: Arc::new(SupabaseDirectory::new(supabase.clone())),
                availability: Arc::new(SupabaseAvailabilityStore::new(supabase.clone())),
                appointments: Arc::new(SupabaseAppointmentStore::new(supabase)),
                clock: Arc::new(SystemClock),
            }
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; reference data is empty and nothing is persisted");
            Backends {
                directory: InMemoryDirectory::new().into_shared(),
                availability: Arc::new(InMemoryAvailabilityStore::new()),
                appointments: Arc::new(InMemoryAppointmentStore::new()),
                clock: Arc::new(SystemClock),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Clinic Scheduling API server");

    // Load configuration
    let config = AppConfig::from_env();
    if !config.is_configured() {
        anyhow::bail!("missing configuration: SUPABASE_JWT_SECRET is always required, SUPABASE_URL and SUPABASE_ANON_PUBLIC_KEY for the supabase backend");
    }

    let backends = build_backends(&config);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(config);

    // Build the application router
    let app = router::create_router(state, backends)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}
