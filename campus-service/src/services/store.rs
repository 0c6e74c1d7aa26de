//! Persistence seam shared by the code generator, the ledger engine and the
//! gRPC service.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::codes::CodeKind;
use crate::models::{
    CreateFeePayment, CreateFeeStructure, CreateProcurementRequest, CreateStudent, CreateTutor,
    FeePayment, FeeStructure, PageRequest, PaymentFilter, PaymentStatus, PaymentWithContext,
    ProcurementRequest, Student, StudentFilter, StudentRecord, Tutor, UpdateFeeStructure,
};

/// Failure reported by a [`DataStore`].
///
/// Constraint names are stable identifiers (`students_admission_number_key`)
/// that callers match on to produce friendly messages.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint {constraint} violated")]
    ForeignKeyViolation { constraint: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation { constraint };
            }
        }
        StoreError::Backend(anyhow::Error::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Relational operations the service depends on. Every method is scoped to a
/// tenant.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Highest code of `kind` starting with `prefix`, by descending text order.
    async fn highest_code(
        &self,
        tenant_id: Uuid,
        kind: CodeKind,
        prefix: &str,
    ) -> StoreResult<Option<String>>;

    /// Every code of `kind` starting with `prefix`, in no particular order.
    async fn codes_with_prefix(
        &self,
        tenant_id: Uuid,
        kind: CodeKind,
        prefix: &str,
    ) -> StoreResult<Vec<String>>;

    /// Atomically bumps the counter row for `series_key` and returns the new
    /// value, which is at least `floor + 1`.
    async fn advance_counter(
        &self,
        tenant_id: Uuid,
        series_key: &str,
        floor: i64,
    ) -> StoreResult<i64>;

    async fn get_student(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> StoreResult<Option<StudentRecord>>;

    /// ACTIVE students matching the filter, ordered by admission number.
    async fn list_active_students(
        &self,
        tenant_id: Uuid,
        filter: &StudentFilter,
    ) -> StoreResult<Vec<StudentRecord>>;

    /// Active structures for a programme in one (academic year, session),
    /// newest first. More than one row means the data is inconsistent.
    async fn find_active_fee_structures(
        &self,
        tenant_id: Uuid,
        programme_id: Uuid,
        academic_year: &str,
        session: &str,
    ) -> StoreResult<Vec<FeeStructure>>;

    async fn list_completed_payments(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        academic_year: &str,
        session: &str,
    ) -> StoreResult<Vec<FeePayment>>;

    /// One page of payments, newest payment date first.
    async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
        page: &PageRequest,
    ) -> StoreResult<Vec<FeePayment>>;

    async fn count_payments(&self, tenant_id: Uuid, filter: &PaymentFilter) -> StoreResult<i64>;

    /// All matching payments joined with programme and department names.
    async fn list_payments_with_context(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
    ) -> StoreResult<Vec<PaymentWithContext>>;

    async fn insert_student(&self, input: &CreateStudent) -> StoreResult<Student>;

    async fn insert_tutor(&self, input: &CreateTutor) -> StoreResult<Tutor>;

    async fn insert_procurement_request(
        &self,
        input: &CreateProcurementRequest,
    ) -> StoreResult<ProcurementRequest>;

    async fn insert_fee_structure(&self, input: &CreateFeeStructure) -> StoreResult<FeeStructure>;

    /// Applies only the supplied fields. `None` when the row does not exist.
    async fn update_fee_structure(
        &self,
        tenant_id: Uuid,
        fee_structure_id: Uuid,
        patch: &UpdateFeeStructure,
    ) -> StoreResult<Option<FeeStructure>>;

    async fn insert_fee_payment(&self, input: &CreateFeePayment) -> StoreResult<FeePayment>;

    async fn update_payment_status(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> StoreResult<Option<FeePayment>>;

    async fn health_check(&self) -> StoreResult<()>;
}
