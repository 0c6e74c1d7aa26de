//! gRPC module for campus-service.

mod convert;
mod service;

pub use convert::format_decimal;
pub use service::CampusServiceImpl;
pub use service_core::grpc::trace_context_interceptor;

/// Generated protobuf code.
pub mod proto {
    tonic::include_proto!("campus.v1");

    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("campus_descriptor");
}
