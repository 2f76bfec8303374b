use crate::api::server::AppState;
use crate::deployment::DeploymentOrchestrator;
use crate::poller::StatusPoller;
use crate::utils::loop_heartbeats::LoopHeartbeats;
use actix_web::web::Data;
use shared::provider::ProviderClient;
use std::sync::Arc;
use std::time::Duration;

/// App state wired to a provider at `provider_url`, typically a mockito server.
pub(crate) fn create_test_app_state(provider_url: &str) -> Data<AppState> {
    let client = Arc::new(ProviderClient::new(provider_url, "test-key", None).unwrap());
    let heartbeats = Arc::new(LoopHeartbeats::new());

    Data::new(AppState {
        orchestrator: Arc::new(DeploymentOrchestrator::new(
            client.clone(),
            "https://market.example",
        )),
        poller: Arc::new(StatusPoller::new(
            client,
            Duration::from_secs(30),
            Some(heartbeats.clone()),
        )),
        heartbeats,
    })
}
