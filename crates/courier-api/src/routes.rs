//! Route configuration

use crate::handlers;
use crate::middleware::SiteKeyAuth;
use actix_web::web;

/// Wire all HTTP routes. Only `/send` requires a site key; health and
/// metrics stay open for probes and scrapers.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health::health_check)))
        .service(web::resource("/metrics").route(web::get().to(handlers::metrics::metrics_export)))
        .service(
            web::resource("/send")
                .wrap(SiteKeyAuth)
                .route(web::post().to(handlers::send::send_message)),
        );
}
