//! Shared application state for HTTP handlers and middleware

use crate::config::AppConfig;
use crate::services::IngressService;
use courier_core::metrics::DispatchMetrics;
use courier_core::store::TenantDirectory;
use std::sync::Arc;

/// Handler-facing state; workers are wired separately at startup
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub metrics: Arc<DispatchMetrics>,
    pub directory: Arc<dyn TenantDirectory>,
    pub ingress: Arc<IngressService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        metrics: Arc<DispatchMetrics>,
        directory: Arc<dyn TenantDirectory>,
        ingress: Arc<IngressService>,
    ) -> Self {
        Self {
            config,
            metrics,
            directory,
            ingress,
        }
    }
}
