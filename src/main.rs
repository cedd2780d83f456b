use std::sync::Arc;

use dotenvy::dotenv;
use farmconnect::application::transport_service::TransportService;
use farmconnect::auth::TokenSigner;
use farmconnect::config::Config;
use farmconnect::infrastructure::diesel_store::DieselStore;
use farmconnect::{build_server, create_pool, run_migrations, AppState, SharedStore};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url)?;
    run_migrations(&pool).map_err(|e| e.to_string())?;

    let store: SharedStore = Arc::new(DieselStore::new(pool));
    spawn_location_purge(TransportService::new(Arc::clone(&store)), &config);

    let state = AppState::new(store, config.payment_webhook_secret.clone());
    let signer = TokenSigner::new(&config.auth_token_secret);

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, signer, &config.host, config.port)?.await?;
    Ok(())
}

/// Drops location updates older than the retention window on a fixed interval.
fn spawn_location_purge(transport: TransportService<SharedStore>, config: &Config) {
    let retention_hours = config.location_retention_hours;
    let mut interval = tokio::time::interval(config.location_purge_interval);

    tokio::spawn(async move {
        loop {
            interval.tick().await;
            let transport = transport.clone();
            match tokio::task::spawn_blocking(move || transport.purge_expired(retention_hours)).await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("location purge failed: {e}"),
                Err(e) => log::error!("location purge task panicked: {e}"),
            }
        }
    });
}
