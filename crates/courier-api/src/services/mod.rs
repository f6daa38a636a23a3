//! Pipeline services: ingress acceptance, credential resolution, and the
//! per-record dispatch flow shared by the channel workers.

pub mod dispatch;
pub mod ingress;
pub mod resolver;

pub use dispatch::DispatchService;
pub use ingress::{IngressService, SendRequest};
pub use resolver::{CredentialResolver, ResolverSettings};
