pub mod api; // Intake backend: submission + AI summary endpoints
pub mod client; // Wizard-side HTTP backend
pub mod config;
pub mod db;
pub mod llm; // Summary model seam (Ollama)
pub mod models;
pub mod wizard; // Navigator, pain points, autosave, summary, restore

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Failures that stop the backend before it serves.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Database(#[from] db::DatabaseError),
    #[error(transparent)]
    Model(#[from] llm::LlmError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Run the intake backend until Ctrl-C.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = config::Settings::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(settings))
}

async fn serve(settings: config::Settings) -> Result<(), StartupError> {
    let db_path = settings.database_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(path = %db_path.display(), "Database ready");

    let model: Option<Arc<dyn llm::SummaryModel>> = match &settings.summary_model {
        Some(name) => {
            let client = llm::OllamaClient::new(&settings.ollama_url, name)?;
            tracing::info!(model = %name, url = %settings.ollama_url, "AI summaries enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("PEXP_SUMMARY_MODEL not set; AI summary endpoints will answer 503");
            None
        }
    };

    let ctx = api::ApiContext::new(conn, model);
    let mut server = api::start_server(ctx, settings.bind_addr).await?;
    tracing::info!(addr = %server.local_addr(), "Intake backend listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.stopped().await;
    Ok(())
}
