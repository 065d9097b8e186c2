use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use oxapi::error::Result;
use oxapi::server;
use oxapi::settings::Settings;
use oxapi::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let settings = Settings::load()?;
    let store = Store::open(&settings.database)?;
    let app = server::router(Arc::new(store));
    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    info!(addr = %settings.listen, db = %settings.database, "oxapi listening");
    axum::serve(listener, app).await?;
    Ok(())
}
