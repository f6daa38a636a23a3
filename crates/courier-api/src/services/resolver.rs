//! Credential resolution
//!
//! Pure lookup from message context to provider credentials, consulting
//! the tenant and global configuration tables. Credentials are never read
//! from the bus payload; the payload type has no such fields to begin
//! with.

use courier_core::errors::{CoreError, CoreResult};
use courier_core::model::ProviderCredentials;
use courier_core::payload::DispatchPayload;
use courier_core::store::TenantDirectory;
use courier_core::Channel;
use std::sync::Arc;

/// Environment-level fallbacks and sender defaults
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Last-resort SendGrid key when neither the site nor the global
    /// configuration carries one
    pub env_sendgrid_api_key: Option<String>,
    pub default_from_email: String,
    pub default_from_name: String,
}

/// Resolves (siteId, sessionName) context into provider credentials
pub struct CredentialResolver {
    directory: Arc<dyn TenantDirectory>,
    settings: ResolverSettings,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CredentialResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, settings: ResolverSettings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    /// Resolve credentials for one dispatch
    pub async fn resolve(&self, payload: &DispatchPayload) -> CoreResult<ProviderCredentials> {
        match payload.channel {
            Channel::Email => self.resolve_email(payload).await,
            Channel::Whatsapp => self.resolve_whatsapp(payload).await,
        }
    }

    /// EMAIL order: site key, then global configuration, then the
    /// environment fallback. Sender identity: payload, site, global,
    /// configured default.
    async fn resolve_email(&self, payload: &DispatchPayload) -> CoreResult<ProviderCredentials> {
        let site = match payload.site_id {
            Some(site_id) => self.directory.find_active_site(site_id).await?,
            None => None,
        };
        let global = self.directory.active_global_config().await?;

        let api_key = site
            .as_ref()
            .and_then(|s| non_empty(s.sendgrid_api_key.clone()))
            .or_else(|| global.as_ref().and_then(|g| non_empty(g.sendgrid_api_key.clone())))
            .or_else(|| self.settings.env_sendgrid_api_key.clone())
            .ok_or_else(|| {
                CoreError::configuration("no SendGrid API key configured for this send")
            })?;

        let from_email = non_empty(payload.from_email.clone())
            .or_else(|| site.as_ref().and_then(|s| non_empty(s.email_from_address.clone())))
            .or_else(|| {
                global
                    .as_ref()
                    .and_then(|g| non_empty(g.email_from_address.clone()))
            })
            .unwrap_or_else(|| self.settings.default_from_email.clone());

        let from_name = non_empty(payload.from_name.clone())
            .or_else(|| site.as_ref().and_then(|s| non_empty(s.email_from_name.clone())))
            .or_else(|| {
                global
                    .as_ref()
                    .and_then(|g| non_empty(g.email_from_name.clone()))
            })
            .unwrap_or_else(|| self.settings.default_from_name.clone());

        Ok(ProviderCredentials::Sendgrid {
            api_key,
            from_email,
            from_name,
        })
    }

    /// WHATSAPP: the tenant is mandatory, and a payload-provided session
    /// name must agree with the site's bound session.
    async fn resolve_whatsapp(&self, payload: &DispatchPayload) -> CoreResult<ProviderCredentials> {
        let site_id = payload
            .site_id
            .ok_or_else(|| CoreError::configuration("WHATSAPP send without a tenant"))?;

        let site = self
            .directory
            .find_active_site(site_id)
            .await?
            .ok_or_else(|| CoreError::configuration("site not found or inactive"))?;

        let payload_session = non_empty(payload.whatsapp_session_name.clone());
        let bound_session = non_empty(site.whatsapp_session_name.clone());

        let session_name = match (payload_session, bound_session) {
            (Some(requested), Some(bound)) if requested != bound => {
                return Err(CoreError::tenant_mismatch(
                    "payload session name does not match the site's bound session",
                ));
            }
            (Some(requested), _) => requested,
            (None, Some(bound)) => bound,
            (None, None) => {
                return Err(CoreError::configuration(
                    "no WhatsApp session bound to this site",
                ));
            }
        };

        let session = self
            .directory
            .find_active_session(&session_name)
            .await?
            .ok_or_else(|| {
                CoreError::configuration(format!("no active WhatsApp session '{session_name}'"))
            })?;

        if session.site_user_id != site.id {
            return Err(CoreError::tenant_mismatch(
                "session belongs to another tenant",
            ));
        }

        let api_key = non_empty(session.session_api_key).ok_or_else(|| {
            CoreError::configuration(format!("session '{session_name}' has no API key"))
        })?;

        Ok(ProviderCredentials::WhatsappSession {
            session_name,
            api_key,
        })
    }
}
