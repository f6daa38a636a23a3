//! # courier-api
//!
//! HTTP ingress and dispatch workers for Courier: configuration, logging
//! bootstrap, site-key authentication, the send endpoint, and the
//! background loops (channel workers, retry controller, scheduler).

pub mod config;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod workers;
