use crate::api::routes::deployments::{analyze_routes, deployment_routes};
use crate::api::routes::models::models_routes;
use crate::deployment::DeploymentOrchestrator;
use crate::poller::StatusPoller;
use crate::utils::loop_heartbeats::LoopHeartbeats;
use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::{middleware, web::Data, App, HttpServer};
use actix_web::{web, HttpResponse};
use anyhow::Error;
use log::info;
use serde_json::json;
use shared::security::ApiKeyMiddleware;
use std::sync::Arc;

pub struct AppState {
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub poller: Arc<StatusPoller>,
    pub heartbeats: Arc<LoopHeartbeats>,
}

pub async fn health(data: Data<AppState>) -> HttpResponse {
    let health_status = data.heartbeats.health_status();
    if health_status.healthy {
        HttpResponse::Ok().json(health_status)
    } else {
        HttpResponse::InternalServerError().json(health_status)
    }
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": "Resource not found"
    }))
}

pub async fn start_server(
    host: &str,
    port: u16,
    orchestrator: Arc<DeploymentOrchestrator>,
    poller: Arc<StatusPoller>,
    heartbeats: Arc<LoopHeartbeats>,
    admin_api_key: String,
) -> Result<(), Error> {
    info!("Starting server at http://{host}:{port}");
    let app_state = Data::new(AppState {
        orchestrator,
        poller,
        heartbeats,
    });
    let api_key_middleware = Arc::new(ApiKeyMiddleware::new(admin_api_key));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .service(web::resource("/health").route(web::get().to(health)))
            .service(models_routes().wrap(api_key_middleware.clone()))
            .service(analyze_routes().wrap(api_key_middleware.clone()))
            .service(deployment_routes().wrap(api_key_middleware.clone()))
            .default_service(web::route().to(not_found))
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
