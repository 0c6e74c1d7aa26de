//! Domain models for campus-service.

mod academic;
mod fee_payment;
mod fee_structure;
mod invoice;
mod pagination;
mod procurement;
mod staff;
mod summary;

pub use academic::{CreateStudent, Student, StudentFilter, StudentRecord, StudentStatus};
pub use fee_payment::{
    CreateFeePayment, FeePayment, PaymentFilter, PaymentMethod, PaymentStatus, PaymentWithContext,
};
pub use fee_structure::{CreateFeeStructure, FeeStructure, UpdateFeeStructure};
pub use invoice::{
    BulkInvoiceRequest, BulkInvoiceResult, Invoice, InvoiceFailure, InvoiceLineItem,
    InvoiceStudent, Term,
};
pub use pagination::{PageRequest, Pagination};
pub use procurement::{CreateProcurementRequest, ProcurementRequest, ProcurementStatus};
pub use staff::{CreateTutor, Tutor};
pub use summary::{PaymentSummary, SummaryBucket};
