//! Services module for campus-service.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use memory::InMemoryStore;
pub use metrics::{
    get_metrics, init_metrics, record_code_issued, record_error, record_grpc_request,
    record_grpc_request_duration, record_invoice, record_payment,
};
pub use store::{DataStore, StoreError, StoreResult};
