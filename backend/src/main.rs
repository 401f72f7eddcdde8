//! Agricultural monitoring server
//!
//! Builds the analysis snapshot from the configured CSV sources, logs a
//! short report, then serves the results over HTTP.

use std::sync::Arc;

use agri_monitor::{create_app, AppState, Config, Snapshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agrimon_server=debug,agri_monitor=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Agricultural Monitoring Server");
    tracing::info!("Environment: {}", config.environment);

    // Run the pipeline once; the snapshot is read-only from here on
    let snapshot = Snapshot::build(&config)?;
    snapshot.log_report(&config.report_parcel);

    // Create application state
    let state = AppState {
        snapshot: Arc::new(snapshot),
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr = config.bind_address();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
