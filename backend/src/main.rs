use poll_server::{build_app, config::AppConfig};
use shuttle_runtime::{CustomError, SecretStore};
use tracing::info;

#[shuttle_runtime::main]
async fn rocket(
    #[shuttle_runtime::Secrets] secret_store: SecretStore,
) -> shuttle_rocket::ShuttleRocket {
    info!("🚀 Starting poll server");

    let config = AppConfig::from_lookup(|key| {
        secret_store.get(key).or_else(|| std::env::var(key).ok())
    })
    .map_err(CustomError::new)?;

    if config.allow_header_token {
        info!("Persistent connections may authenticate with the token header");
    }

    let rocket = build_app(&config).map_err(CustomError::new)?;
    info!("📋 Serving polls, store at {}:{}", config.redis_host, config.redis_port);

    Ok(rocket.into())
}
