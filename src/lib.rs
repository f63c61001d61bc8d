//! netcup SCP exporter
//!
//! Keeps an OIDC credential for the netcup Server Control Panel alive without
//! supervision and publishes per-server Prometheus gauges.
//!
//! - [`auth`]: device-authorization and refresh-token flows behind the
//!   [`auth::Authenticator`] trait.
//! - [`refresher`]: the fixed-interval loop deciding whether a failed tick is
//!   fatal (authentication) or transient (metrics).
//! - [`collector`], [`metrics`], [`server`]: SCP API client, gauges and the
//!   `/metrics` endpoint.

pub mod app;
pub mod auth;
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod refresher;
pub mod server;
