//! Axum middleware for the HTTP side of the services (health, readiness, metrics).

pub mod metrics;
pub mod request_id;

pub use metrics::metrics_middleware;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
