//! HTTP middleware: request ids, site-key authentication, and error
//! response shaping.

pub mod error_handler;
pub mod request_id;
pub mod site_key;

pub use error_handler::{ApiError, ApiResult, ErrorResponse};
pub use request_id::RequestId;
pub use site_key::{AuthenticatedSite, SiteContext, SiteKeyAuth};
