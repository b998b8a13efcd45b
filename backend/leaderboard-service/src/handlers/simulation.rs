/// Simulation control handlers
use actix_web::{web, HttpResponse};

use super::AppState;

pub async fn start(state: web::Data<AppState>) -> HttpResponse {
    let started = state.simulation.start().await;
    HttpResponse::Ok().json(serde_json::json!({
        "status": state.simulation.status(),
        "changed": started,
    }))
}

pub async fn stop(state: web::Data<AppState>) -> HttpResponse {
    let stopped = state.simulation.stop().await;
    HttpResponse::Ok().json(serde_json::json!({
        "status": state.simulation.status(),
        "changed": stopped,
    }))
}

pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": state.simulation.status() }))
}
