//! Send endpoint
//!
//! `POST /send`: validate, persist, arrange the publish, answer `202`
//! with the generated message id. Downstream status is observable through
//! the message log and history, not through this endpoint.

use crate::middleware::error_handler::{ApiError, ApiResult};
use crate::middleware::site_key::AuthenticatedSite;
use crate::services::SendRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub message_id: String,
}

/// Accept a send request for the authenticated site
pub async fn send_message(
    request: web::Json<SendRequest>,
    site: AuthenticatedSite,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let message_id = state
        .ingress
        .accept(request.into_inner(), site.0.site())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Accepted().json(SendResponse { message_id }))
}
