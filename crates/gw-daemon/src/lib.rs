//! # gw-daemon
//!
//! HTTP API over the gw workspace engine.
//!
//! Each `/{user}/{repo}` path addresses one workspace; the router maps
//! requests onto [`gw_workspace::Registry`] and [`gw_workspace::Workspace`]
//! calls and engine errors onto status codes (see [`error::status_for`]).

pub mod config;
pub mod error;
pub mod routes;

pub use config::DaemonConfig;
pub use error::ApiError;
pub use routes::{app, AppState};
