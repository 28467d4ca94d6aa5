//! `objscope` server: request classification, invocation routing, execution
//! delegates, and the axum HTTP front end.

pub mod demo;
pub mod network;
pub mod service;

pub use network::{NetworkConfig, NetworkModule};
pub use service::{ConsoleConfig, ConsoleService, InvocationRouter};
