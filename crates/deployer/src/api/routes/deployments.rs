use crate::analyzer::{analyze, ModelArtifact};
use crate::api::server::AppState;
use crate::deployment::observer::DeploymentEvent;
use crate::deployment::ResourceConfig;
use actix_web::{
    web::{self, post, Data},
    HttpResponse, Scope,
};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use shared::models::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeploymentRequest {
    pub file_name: String,
    pub file_size: u64,
    #[serde(default)]
    pub resources: ResourceConfig,
}

fn bad_request(error: impl ToString) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": error.to_string()
    }))
}

async fn analyze_model(request: web::Json<AnalyzeRequest>) -> HttpResponse {
    let artifact = ModelArtifact::new(request.file_name.clone(), request.file_size);
    match analyze(&artifact) {
        Ok(descriptor) => ApiResponse::new(true, descriptor).into(),
        Err(e) => bad_request(e),
    }
}

async fn create_deployment(
    request: web::Json<DeploymentRequest>,
    app_state: Data<AppState>,
) -> HttpResponse {
    let request = request.into_inner();
    let artifact = ModelArtifact::new(request.file_name, request.file_size);
    let descriptor = match analyze(&artifact) {
        Ok(descriptor) => descriptor,
        Err(e) => return bad_request(e),
    };

    let observer = |event: &DeploymentEvent| {
        debug!(
            "[{}] {} is now {}",
            event.run_id, event.transition.step, event.transition.to
        );
    };
    let outcome = app_state
        .orchestrator
        .deploy(&artifact, &descriptor, &request.resources, &observer)
        .await;

    if outcome.success {
        ApiResponse::new(true, outcome).into()
    } else {
        HttpResponse::BadGateway().json(ApiResponse::new(false, outcome))
    }
}

pub fn analyze_routes() -> Scope {
    web::scope("/analyze").route("", post().to(analyze_model))
}

pub fn deployment_routes() -> Scope {
    web::scope("/deployments").route("", post().to(create_deployment))
}
