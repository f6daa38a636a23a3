//! Site-key authentication middleware
//!
//! The `X-Api-Key` header carries the tenant's site key. The key is
//! SHA-256 hashed, looked up by indexed hash equality, and re-verified
//! with a constant-time comparison; the plaintext key is never stored or
//! logged. A configured dashboard key hash authenticates the site-less
//! global email path.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use courier_core::model::Site;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use sha2::{Digest, Sha256};
use std::rc::Rc;
use tracing::warn;

use crate::middleware::error_handler::ApiError;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// Who a request is acting for
#[derive(Debug, Clone)]
pub enum SiteContext {
    /// An authenticated tenant
    Tenant(Site),
    /// The dashboard key: site-less EMAIL sends against the global
    /// provider configuration
    Global,
}

impl SiteContext {
    pub fn site(&self) -> Option<&Site> {
        match self {
            SiteContext::Tenant(site) => Some(site),
            SiteContext::Global => None,
        }
    }
}

/// SHA-256 hex digest of a site key
pub fn hash_site_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Constant-time string equality; both inputs are hex digests of equal
/// length in the non-failing case.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Authentication middleware validating the site key header
pub struct SiteKeyAuth;

impl<S, B> Transform<S, ServiceRequest> for SiteKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SiteKeyAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SiteKeyAuthService {
            service: Rc::new(service),
        }))
    }
}

pub struct SiteKeyAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SiteKeyAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let Some(key) = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|h| h.to_str().ok())
                .filter(|k| !k.is_empty())
            else {
                return Err(ApiError::Unauthorized.into());
            };

            let app_state = req
                .app_data::<actix_web::web::Data<AppState>>()
                .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?;

            let presented_hash = hash_site_key(key);

            // Dashboard key: the documented site-less email path.
            if let Some(dashboard_hash) = &app_state.config.auth.dashboard_api_key_hash {
                if constant_time_eq(&presented_hash, dashboard_hash) {
                    req.extensions_mut().insert(SiteContext::Global);
                    return service.call(req).await;
                }
            }

            let site = match app_state
                .directory
                .find_active_site_by_api_key_hash(&presented_hash)
                .await
            {
                Ok(Some(site)) => site,
                Ok(None) => return Err(ApiError::Unauthorized.into()),
                Err(err) => {
                    warn!("Site lookup failed during authentication: {err}");
                    return Err(ApiError::Unauthorized.into());
                }
            };

            if !constant_time_eq(&presented_hash, &site.api_key_hash) {
                return Err(ApiError::Unauthorized.into());
            }

            req.extensions_mut().insert(SiteContext::Tenant(site));
            service.call(req).await
        })
    }
}

/// Extract the authenticated site context from request extensions
pub struct AuthenticatedSite(pub SiteContext);

impl actix_web::FromRequest for AuthenticatedSite {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let context = req
            .extensions()
            .get::<SiteContext>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized.into());

        ready(context.map(AuthenticatedSite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_site_key("site-key-123");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic
        assert_eq!(hash, hash_site_key("site-key-123"));
        assert_ne!(hash, hash_site_key("site-key-124"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
