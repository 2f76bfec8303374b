use crate::api::server::AppState;
use actix_web::{
    web::{self, get, post, Data},
    HttpResponse, Scope,
};
use shared::models::ApiResponse;

async fn get_models(app_state: Data<AppState>) -> HttpResponse {
    let snapshot = app_state.poller.snapshot().await;
    ApiResponse::new(true, snapshot).into()
}

async fn refresh_models(app_state: Data<AppState>) -> HttpResponse {
    app_state.poller.refresh().await;
    let snapshot = app_state.poller.snapshot().await;
    ApiResponse::new(snapshot.error.is_none(), snapshot).into()
}

pub fn models_routes() -> Scope {
    web::scope("/models")
        .route("", get().to(get_models))
        .route("/refresh", post().to(refresh_models))
}
