//! Prometheus export endpoint

use crate::state::AppState;
use actix_web::{web, HttpResponse};

/// `GET /metrics`
pub async fn metrics_export(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.metrics.encode())
}
