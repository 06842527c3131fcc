pub mod auth;
pub mod catchers;
pub mod config;
pub mod cors;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod repository;
pub mod routes;
pub mod service;
pub mod socket;
pub mod store;
pub mod token;
pub use shared::{models::*, error::*};

use rocket::fairing::AdHoc;
use rocket::{catchers, routes, Build, Rocket};
use std::sync::Arc;

use crate::catchers::{bad_request, forbidden, internal_error, not_found, service_unavailable, unprocessable};
use crate::config::{AppConfig, ConfigurationError};
use crate::cors::{Cors, OriginPolicy};
use crate::routes::{all_options, create_poll, join_poll, rejoin_poll, AppState};
use crate::store::{RedisBackend, StoreOptions};

/// Builds the server against Redis. Every setting is checked here, before
/// anything listens.
pub fn build_app(config: &AppConfig) -> Result<Rocket<Build>, ConfigurationError> {
    let options = StoreOptions::from_config(config)?;
    let backend = Arc::new(RedisBackend::new(&options)?);
    let state = AppState::new(config, backend, &options)?;
    let policy = OriginPolicy::new(config.client_port)?;
    Ok(mount(state, policy))
}

pub fn mount(state: AppState, policy: OriginPolicy) -> Rocket<Build> {
    rocket::build()
        .attach(Cors)
        .attach(AdHoc::on_shutdown("Close store connection", |rocket| Box::pin(async move {
            if let Some(state) = rocket.state::<AppState>() {
                state.shutdown().await;
            }
        })))
        .manage(state)
        .manage(policy)
        .mount(
            "/",
            routes![
                create_poll,
                join_poll,
                rejoin_poll,
                all_options,
                socket::connect
            ],
        )
        .register(
            "/",
            catchers![
                forbidden,
                bad_request,
                unprocessable,
                not_found,
                internal_error,
                service_unavailable
            ],
        )
}
