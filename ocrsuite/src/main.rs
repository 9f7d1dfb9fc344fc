use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocrsuite::api::{create_router, AppState};
use ocrsuite::config::Config;
use ocrsuite::extraction::SamplerProvider;
use ocrsuite::ocr::EngineFactory;
use ocrsuite::store::{DocumentTypeStore, InMemoryDocumentTypeStore};

#[derive(Parser)]
#[command(name = "ocrsuite")]
#[command(about = "Document OCR service with template field extraction")]
struct Args {
    /// Skip building the OCR engines at startup; they are built on first use
    #[arg(long)]
    no_warmup: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocrsuite=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let document_types: Arc<dyn DocumentTypeStore> = match &config.catalog.document_types_path {
        Some(path) => {
            tracing::info!("Loading document types from {}...", path.display());
            Arc::new(InMemoryDocumentTypeStore::from_path(path)?)
        }
        None => {
            tracing::info!("OCR_DOCUMENT_TYPES_PATH not set - using built-in document types");
            Arc::new(InMemoryDocumentTypeStore::seeded())
        }
    };

    tracing::info!(
        "Loading samplers from {}...",
        config.catalog.samplers_path.display()
    );
    let samplers = Arc::new(SamplerProvider::new());
    if let Err(e) = samplers.load_from_path(&config.catalog.samplers_path) {
        tracing::warn!("Samplers unavailable - fields will not be filtered: {}", e);
    }

    let factory = Arc::new(EngineFactory::from_config(&config.ocr));
    let cancel_token = CancellationToken::new();

    let state = AppState::new(
        config.clone(),
        factory.clone(),
        samplers,
        document_types,
        cancel_token.clone(),
    );

    if config.ocr.warmup && !args.no_warmup {
        tracing::info!("Warming up OCR engines...");
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Engine warm-up cancelled");
                }
                _ = factory.warm_up() => {
                    tracing::info!("Engine warm-up finished");
                }
            }
        });
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("OCR Suite starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  Recognize:    POST http://{}/api/v1/ocr", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling in-flight requests...");
    cancel_token.cancel();
}
