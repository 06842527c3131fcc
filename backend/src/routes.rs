use rocket::{State, post, serde::json::Json};
use serde::de::IgnoredAny;
use shared::models::{CreatePollRequest, JoinPollRequest, PollRecord, PollSession};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::auth::request::Authorized;
use crate::auth::stream::StreamGuard;
use crate::config::{AppConfig, ConfigurationError};
use crate::error::ApiError;
use crate::gateway::BroadcastGateway;
use crate::repository::PollRepository;
use crate::service::PollService;
use crate::store::{StoreBackend, StoreConnection, StoreObserver, StoreOptions, StoreState};
use crate::token::CredentialIssuer;

/// Everything the handlers share, built once at startup.
pub struct AppState {
    pub issuer: Arc<CredentialIssuer>,
    pub store: StoreConnection,
    pub repository: Arc<PollRepository>,
    pub gateway: Arc<BroadcastGateway>,
    pub stream_guard: Arc<StreamGuard>,
    pub service: Arc<PollService>,
}

fn log_store_transitions() -> StoreObserver {
    Arc::new(|state: &StoreState| match state {
        StoreState::Ready => info!("Store client ready"),
        StoreState::Error(reason) => error!("Store client error: {}", reason),
        StoreState::Closed => info!("Store client closed"),
        StoreState::NotReady => {}
    })
}

impl AppState {
    /// Wires every component over `backend`. The credential lifetime and the
    /// poll TTL both come from `config.poll_duration`.
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn StoreBackend>,
        options: &StoreOptions,
    ) -> Result<Self, ConfigurationError> {
        let issuer = Arc::new(CredentialIssuer::from_config(config)?);
        let store = StoreConnection::with_backend(backend, options, [log_store_transitions()]);
        let repository = Arc::new(PollRepository::new(store.clone(), issuer.ttl_secs()));
        let gateway = Arc::new(BroadcastGateway::new());
        let stream_guard = Arc::new(StreamGuard::new(Arc::clone(&issuer), config.allow_header_token));
        let service = Arc::new(PollService::new(
            Arc::clone(&repository),
            Arc::clone(&issuer),
            Arc::clone(&gateway),
        ));

        Ok(Self {
            issuer,
            store,
            repository,
            gateway,
            stream_guard,
            service,
        })
    }

    pub async fn shutdown(&self) {
        self.gateway.clear();
        self.store.close().await;
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> rocket::http::Status {
    rocket::http::Status::Ok
}

#[instrument(skip(state, request))]
#[post("/polls", format = "json", data = "<request>")]
pub async fn create_poll(
    state: &State<AppState>,
    request: Json<CreatePollRequest>,
) -> Result<Json<PollSession>, ApiError> {
    let session = state.service.create_poll(&request).await?;
    debug!("Created poll {}", session.poll.id);
    Ok(Json(session))
}

#[instrument(skip(state, request), fields(poll_id = %request.poll_id))]
#[post("/polls/join", format = "json", data = "<request>")]
pub async fn join_poll(
    state: &State<AppState>,
    request: Json<JoinPollRequest>,
) -> Result<Json<PollSession>, ApiError> {
    let session = state.service.join_poll(&request).await?;
    Ok(Json(session))
}

#[instrument(skip(state, auth), fields(poll_id = %auth.identity.poll_id))]
#[post("/polls/rejoin", format = "json", data = "<auth>")]
pub async fn rejoin_poll(
    state: &State<AppState>,
    auth: Authorized<IgnoredAny>,
) -> Result<Json<PollRecord>, ApiError> {
    let poll = state.service.rejoin_poll(&auth.identity).await?;
    Ok(Json(poll))
}
