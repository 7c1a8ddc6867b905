use std::sync::Arc;

use rentdesk::config::Config;
use rentdesk::db::SqliteStore;
use rentdesk::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();
    log::debug!("{:?}", config);

    let store = SqliteStore::open(&config.database_location())?;
    let listen = config.listen;
    let app = web::router(AppState::new(Arc::new(store), config));

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on http://{}", listen);
    axum::serve(listener, app).await?;
    Ok(())
}
