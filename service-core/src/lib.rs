//! service-core: Shared infrastructure for the campus services.
pub mod config;
pub mod error;
pub mod grpc;
pub mod middleware;
pub mod observability;

pub use anyhow;
pub use axum;
pub use tonic;
pub use tracing;
