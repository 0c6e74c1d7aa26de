//! gRPC utilities shared by the campus services.
//!
//! - Error conversion between `AppError` and `tonic::Status`
//! - Interceptor for W3C trace context propagation

pub mod error;
pub mod interceptors;

pub use error::IntoStatus;
pub use interceptors::{REQUEST_ID_KEY, TRACEPARENT_KEY, extract_request_id, trace_context_interceptor};

pub use tonic::{Code, Request, Response, Status};
