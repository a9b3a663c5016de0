use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::configuration::ApplicationSettings;

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
    env: &'a str,
}

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}

/// GET /api/health
pub async fn api_health(application: web::Data<ApplicationSettings>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        env: &application.environment,
    })
}
