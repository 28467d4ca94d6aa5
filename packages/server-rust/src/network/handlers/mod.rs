//! HTTP handler definitions for the console server.
//!
//! Defines `AppState`, the shared state carried through axum extractors, and
//! re-exports the handlers used when building the router.

pub mod console;
pub mod health;

pub use console::{console_handler, into_http_response};
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::service::ConsoleService;

/// Shared application state passed to all handlers via `State` extraction.
///
/// Cloning is cheap: every field is reference counted or `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// Console pipeline; also owns the object registry.
    pub console: ConsoleService,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server start time, used for uptime.
    pub start_time: Instant,
}
