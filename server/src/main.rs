use anyhow::Result;
use server::{
    clock::SystemClock,
    http::{self, AppState},
    settings::ServerSettings,
    storage::{ObjectStoreBackend, StorageConfig},
};
use std::sync::Arc;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    info!("Starting remote config server");

    let settings = ServerSettings::from_env()?;

    match &settings.storage {
        StorageConfig::Local { path } => {
            info!("Using storage path: {}", path.display());
            std::fs::create_dir_all(path)?;
        }
        StorageConfig::Memory => warn!("Using in-memory storage, data is lost on restart"),
        StorageConfig::S3 { bucket, .. } => info!("Using S3 bucket: {}", bucket),
    }

    if settings.jwt.is_none() && settings.api_token.is_none() {
        warn!("Neither AUTH_JWT_SECRET nor API_TOKEN is set, all writes will be rejected");
    }

    let store = ObjectStoreBackend::from_config(settings.storage.clone())?;
    let state = AppState::new(
        Arc::new(store),
        Arc::new(SystemClock),
        settings.cache_ttl,
        settings.authenticator(),
    );

    http::start_server(state, settings.bind_address).await?;

    Ok(())
}
