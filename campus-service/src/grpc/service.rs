//! gRPC service implementation for CampusService.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::grpc::IntoStatus;
use tonic::{Request, Response, Status};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::codes::{with_code_retry, CodeError, CodeSeries, SequentialCodeGenerator};
use crate::config::CodeConfig;
use crate::grpc::proto::{self, campus_service_server::CampusService};
use crate::ledger::{FeeLedgerEngine, LedgerError};
use crate::models::{
    BulkInvoiceRequest, CreateFeePayment, CreateFeeStructure, CreateProcurementRequest,
    CreateStudent, CreateTutor, PageRequest, Pagination, PaymentFilter, PaymentMethod,
    PaymentStatus, StudentFilter, Term, UpdateFeeStructure,
};
use crate::services::{
    record_error, record_grpc_request, record_grpc_request_duration, record_payment, DataStore,
    StoreError,
};

/// Friendly messages for constraint violations, keyed by constraint name.
const CONSTRAINT_MESSAGES: &[(&str, &str)] = &[
    ("students_admission_number_key", "Admission number already exists"),
    ("students_email_key", "Email already registered"),
    ("tutors_employee_code_key", "Employee code already exists"),
    ("tutors_email_key", "Email already registered"),
    ("procurement_requests_request_number_key", "Request number already exists"),
    ("fee_payments_transaction_ref_key", "Transaction reference already exists"),
    ("students_programme_id_fkey", "Programme not found"),
    ("students_department_id_fkey", "Department not found"),
    ("students_class_id_fkey", "Class not found"),
    ("tutors_department_id_fkey", "Department not found"),
    ("procurement_requests_department_id_fkey", "Department not found"),
    ("fee_structures_programme_id_fkey", "Programme not found"),
    ("fee_payments_student_id_fkey", "Student not found"),
];

fn constraint_message(constraint: &str) -> Option<&'static str> {
    CONSTRAINT_MESSAGES
        .iter()
        .find(|(name, _)| *name == constraint)
        .map(|(_, message)| *message)
}

/// Maps a store failure to a client-facing error. Known constraint violations
/// get their friendly message; anything else keeps `action` on top of the
/// original error.
fn store_failure(err: StoreError, action: &'static str) -> AppError {
    let friendly = match &err {
        StoreError::UniqueViolation { constraint }
        | StoreError::ForeignKeyViolation { constraint } => constraint_message(constraint),
        StoreError::Backend(_) => None,
    };

    match (err, friendly) {
        (StoreError::UniqueViolation { .. }, Some(message)) => {
            AppError::Conflict(anyhow::anyhow!(message))
        }
        (StoreError::ForeignKeyViolation { .. }, Some(message)) => {
            AppError::NotFound(anyhow::anyhow!(message))
        }
        (err @ StoreError::UniqueViolation { .. }, None) => {
            AppError::Conflict(anyhow::Error::new(err).context(action))
        }
        (err @ StoreError::ForeignKeyViolation { .. }, None) => {
            AppError::BadRequest(anyhow::Error::new(err).context(action))
        }
        (err, _) => AppError::DatabaseError(anyhow::Error::new(err).context(action)),
    }
}

impl From<CodeError> for AppError {
    fn from(err: CodeError) -> Self {
        if matches!(err.store_error(), StoreError::Backend(_)) {
            return AppError::DatabaseError(anyhow::Error::new(err));
        }
        match err {
            CodeError::Generate { source, .. } => store_failure(source, "Failed to generate code"),
            CodeError::Insert { source, .. } => store_failure(source, "Failed to save record"),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::StudentNotFound | LedgerError::NoActiveFeeStructure => {
                AppError::NotFound(anyhow::anyhow!(err.to_string()))
            }
            LedgerError::Store { .. } => AppError::DatabaseError(anyhow::Error::new(err)),
        }
    }
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::from_str(value.trim())
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {}", field)))
}

fn parse_optional_uuid(field: &str, value: &str) -> Result<Option<Uuid>, AppError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_uuid(field, value).map(Some)
    }
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, AppError> {
    let amount = Decimal::from_str(value.trim())
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {}", field)))?;
    if amount.is_sign_negative() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must not be negative",
            field
        )));
    }
    Ok(amount)
}

fn parse_optional_amount(field: &str, value: &str) -> Result<Option<Decimal>, AppError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_amount(field, value).map(Some)
    }
}

fn parse_optional_date(field: &str, value: &str) -> Result<Option<NaiveDate>, AppError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid {}, expected YYYY-MM-DD", field)))
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    optional_text(value.to_string())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("{} is required", field)))
}

fn parse_term(value: i32) -> Result<Term, AppError> {
    proto::Term::try_from(value)
        .ok()
        .and_then(|t| Term::try_from(t).ok())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("term must be TERM_1, TERM_2 or TERM_3")))
}

fn parse_payment_method(value: i32) -> Result<Option<PaymentMethod>, AppError> {
    match proto::PaymentMethod::try_from(value) {
        Ok(proto::PaymentMethod::Unspecified) => Ok(None),
        Ok(method) => Ok(PaymentMethod::try_from(method).ok()),
        Err(_) => Err(AppError::BadRequest(anyhow::anyhow!("Invalid payment_method"))),
    }
}

fn parse_payment_status(value: i32) -> Result<Option<PaymentStatus>, AppError> {
    match proto::PaymentStatus::try_from(value) {
        Ok(proto::PaymentStatus::Unspecified) => Ok(None),
        Ok(status) => Ok(PaymentStatus::try_from(status).ok()),
        Err(_) => Err(AppError::BadRequest(anyhow::anyhow!("Invalid status"))),
    }
}

fn payment_filter(filter: Option<proto::PaymentFilter>) -> Result<PaymentFilter, AppError> {
    let Some(f) = filter else {
        return Ok(PaymentFilter::default());
    };
    Ok(PaymentFilter {
        academic_year: optional_text(f.academic_year),
        session: optional_text(f.session),
        student_id: parse_optional_uuid("student_id", &f.student_id)?,
        programme_id: parse_optional_uuid("programme_id", &f.programme_id)?,
        department_id: parse_optional_uuid("department_id", &f.department_id)?,
        status: parse_payment_status(f.status)?,
        payment_method: parse_payment_method(f.payment_method)?,
        start_date: parse_optional_date("start_date", &f.start_date)?,
        end_date: parse_optional_date("end_date", &f.end_date)?,
    })
}

/// Records request metrics and turns the handler's `AppError` into a status.
async fn observe<T, F>(method: &'static str, handler: F) -> Result<Response<T>, Status>
where
    F: Future<Output = Result<T, AppError>>,
{
    let started = Instant::now();
    let result = handler.await;
    record_grpc_request_duration(method, started.elapsed().as_secs_f64());

    match result {
        Ok(body) => {
            record_grpc_request(method, "ok");
            Ok(Response::new(body))
        }
        Err(err) => {
            record_grpc_request(method, "error");
            record_error(err.kind());
            Err(err.into_status())
        }
    }
}

/// CampusService gRPC implementation.
pub struct CampusServiceImpl {
    store: Arc<dyn DataStore>,
    codes: SequentialCodeGenerator,
    ledger: FeeLedgerEngine,
    config: CodeConfig,
}

impl CampusServiceImpl {
    pub fn new(store: Arc<dyn DataStore>, config: CodeConfig) -> Self {
        Self {
            codes: SequentialCodeGenerator::new(store.clone(), config.allocation_mode),
            ledger: FeeLedgerEngine::new(store.clone()),
            store,
            config,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn admission_series(&self) -> CodeSeries {
        CodeSeries::admission(
            &self.config.admission_prefix,
            Self::today(),
            self.config.admission_ordering,
        )
    }

    fn employee_series(&self) -> CodeSeries {
        CodeSeries::employee(&self.config.employee_prefix)
    }

    fn request_series(&self, year: i32) -> Result<CodeSeries, AppError> {
        let year = match year {
            0 => Self::today().year(),
            1..=9999 => year,
            _ => return Err(AppError::BadRequest(anyhow::anyhow!("Invalid year"))),
        };
        Ok(CodeSeries::request(&self.config.request_prefix, year))
    }

    // =========================================================================
    // Sequential codes
    // =========================================================================

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn generate_admission_number_inner(
        &self,
        req: proto::GenerateAdmissionNumberRequest,
    ) -> Result<proto::GenerateCodeResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let code = self.codes.next(tenant_id, &self.admission_series()).await?;
        Ok(proto::GenerateCodeResponse { code })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn generate_employee_code_inner(
        &self,
        req: proto::GenerateEmployeeCodeRequest,
    ) -> Result<proto::GenerateCodeResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let code = self.codes.next(tenant_id, &self.employee_series()).await?;
        Ok(proto::GenerateCodeResponse { code })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, year = req.year))]
    async fn generate_request_number_inner(
        &self,
        req: proto::GenerateRequestNumberRequest,
    ) -> Result<proto::GenerateCodeResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let series = self.request_series(req.year)?;
        let code = self.codes.next(tenant_id, &series).await?;
        Ok(proto::GenerateCodeResponse { code })
    }

    // =========================================================================
    // Records that own a sequential code
    // =========================================================================

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn admit_student_inner(
        &self,
        req: proto::AdmitStudentRequest,
    ) -> Result<proto::AdmitStudentResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let first_name = required_text("first_name", &req.first_name)?;
        let last_name = required_text("last_name", &req.last_name)?;
        let programme_id = parse_uuid("programme_id", &req.programme_id)?;
        let department_id = parse_uuid("department_id", &req.department_id)?;
        let class_id = parse_optional_uuid("class_id", &req.class_id)?;
        let email = optional_text(req.email);

        let store = self.store.clone();
        let student = with_code_retry(
            &self.codes,
            tenant_id,
            &self.admission_series(),
            self.config.insert_max_attempts,
            |admission_number| {
                let store = store.clone();
                let input = CreateStudent {
                    tenant_id,
                    admission_number,
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    email: email.clone(),
                    programme_id,
                    department_id,
                    class_id,
                };
                async move { store.insert_student(&input).await }
            },
        )
        .await?;

        info!(
            student_id = %student.student_id,
            admission_number = %student.admission_number,
            "Student admitted"
        );

        Ok(proto::AdmitStudentResponse {
            student: Some(student.into()),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn register_tutor_inner(
        &self,
        req: proto::RegisterTutorRequest,
    ) -> Result<proto::RegisterTutorResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let first_name = required_text("first_name", &req.first_name)?;
        let last_name = required_text("last_name", &req.last_name)?;
        let department_id = parse_optional_uuid("department_id", &req.department_id)?;
        let email = optional_text(req.email);

        let store = self.store.clone();
        let tutor = with_code_retry(
            &self.codes,
            tenant_id,
            &self.employee_series(),
            self.config.insert_max_attempts,
            |employee_code| {
                let store = store.clone();
                let input = CreateTutor {
                    tenant_id,
                    employee_code,
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    email: email.clone(),
                    department_id,
                };
                async move { store.insert_tutor(&input).await }
            },
        )
        .await?;

        info!(
            tutor_id = %tutor.tutor_id,
            employee_code = %tutor.employee_code,
            "Tutor registered"
        );

        Ok(proto::RegisterTutorResponse {
            tutor: Some(tutor.into()),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn create_procurement_request_inner(
        &self,
        req: proto::CreateProcurementRequestRequest,
    ) -> Result<proto::CreateProcurementRequestResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let title = required_text("title", &req.title)?;
        let requested_by = required_text("requested_by", &req.requested_by)?;
        let department_id = parse_optional_uuid("department_id", &req.department_id)?;
        let estimated_amount =
            parse_optional_amount("estimated_amount", &req.estimated_amount)?.unwrap_or_default();
        let description = optional_text(req.description);

        let store = self.store.clone();
        let request = with_code_retry(
            &self.codes,
            tenant_id,
            &self.request_series(0)?,
            self.config.insert_max_attempts,
            |request_number| {
                let store = store.clone();
                let input = CreateProcurementRequest {
                    tenant_id,
                    request_number,
                    department_id,
                    title: title.clone(),
                    description: description.clone(),
                    estimated_amount,
                    requested_by: requested_by.clone(),
                };
                async move { store.insert_procurement_request(&input).await }
            },
        )
        .await?;

        info!(
            request_id = %request.request_id,
            request_number = %request.request_number,
            "Procurement request created"
        );

        Ok(proto::CreateProcurementRequestResponse {
            request: Some(request.into()),
        })
    }

    // =========================================================================
    // Fee structures
    // =========================================================================

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, programme_id = %req.programme_id))]
    async fn create_fee_structure_inner(
        &self,
        req: proto::CreateFeeStructureRequest,
    ) -> Result<proto::CreateFeeStructureResponse, AppError> {
        let input = CreateFeeStructure {
            tenant_id: parse_uuid("tenant_id", &req.tenant_id)?,
            programme_id: parse_uuid("programme_id", &req.programme_id)?,
            academic_year: required_text("academic_year", &req.academic_year)?,
            session: required_text("session", &req.session)?,
            tuition_fee: parse_amount("tuition_fee", &req.tuition_fee)?,
            exam_fee: parse_optional_amount("exam_fee", &req.exam_fee)?,
            library_fee: parse_optional_amount("library_fee", &req.library_fee)?,
            activity_fee: parse_optional_amount("activity_fee", &req.activity_fee)?,
            total_fee: parse_optional_amount("total_fee", &req.total_fee)?,
        };

        let structure = self
            .store
            .insert_fee_structure(&input)
            .await
            .map_err(|e| store_failure(e, "Failed to create fee structure"))?;

        structure.check_total();

        Ok(proto::CreateFeeStructureResponse {
            fee_structure: Some(structure.into()),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, fee_structure_id = %req.fee_structure_id))]
    async fn update_fee_structure_inner(
        &self,
        req: proto::UpdateFeeStructureRequest,
    ) -> Result<proto::UpdateFeeStructureResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let fee_structure_id = parse_uuid("fee_structure_id", &req.fee_structure_id)?;

        let amount = |field: &str, value: Option<String>| -> Result<Option<Decimal>, AppError> {
            value.map(|v| parse_amount(field, &v)).transpose()
        };
        let patch = UpdateFeeStructure {
            tuition_fee: amount("tuition_fee", req.tuition_fee)?,
            exam_fee: amount("exam_fee", req.exam_fee)?,
            library_fee: amount("library_fee", req.library_fee)?,
            activity_fee: amount("activity_fee", req.activity_fee)?,
            total_fee: amount("total_fee", req.total_fee)?,
            is_active: req.is_active,
        };
        if patch.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("No fields to update")));
        }

        let structure = self
            .store
            .update_fee_structure(tenant_id, fee_structure_id, &patch)
            .await
            .map_err(|e| store_failure(e, "Failed to update fee structure"))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Fee structure not found")))?;
        structure.check_total();

        Ok(proto::UpdateFeeStructureResponse {
            fee_structure: Some(structure.into()),
        })
    }

    // =========================================================================
    // Fee payments
    // =========================================================================

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, student_id = %req.student_id))]
    async fn record_fee_payment_inner(
        &self,
        req: proto::RecordFeePaymentRequest,
    ) -> Result<proto::RecordFeePaymentResponse, AppError> {
        let amount_paid = parse_amount("amount_paid", &req.amount_paid)?;
        if amount_paid.is_zero() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "amount_paid must be greater than zero"
            )));
        }
        let payment_method = parse_payment_method(req.payment_method)?
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("payment_method is required")))?;

        let input = CreateFeePayment {
            tenant_id: parse_uuid("tenant_id", &req.tenant_id)?,
            student_id: parse_uuid("student_id", &req.student_id)?,
            academic_year: required_text("academic_year", &req.academic_year)?,
            session: required_text("session", &req.session)?,
            amount_paid,
            payment_method,
            transaction_ref: required_text("transaction_ref", &req.transaction_ref)?,
            status: parse_payment_status(req.status)?.unwrap_or(PaymentStatus::Completed),
            payment_date: parse_optional_date("payment_date", &req.payment_date)?
                .unwrap_or_else(Self::today),
        };

        let payment = self
            .store
            .insert_fee_payment(&input)
            .await
            .map_err(|e| store_failure(e, "Failed to record payment"))?;

        record_payment(
            &payment.payment_method,
            &payment.status,
            payment.amount_paid.to_f64().unwrap_or_default(),
        );
        info!(
            payment_id = %payment.payment_id,
            transaction_ref = %payment.transaction_ref,
            "Fee payment recorded"
        );

        Ok(proto::RecordFeePaymentResponse {
            payment: Some(payment.into()),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, payment_id = %req.payment_id))]
    async fn update_payment_status_inner(
        &self,
        req: proto::UpdatePaymentStatusRequest,
    ) -> Result<proto::UpdatePaymentStatusResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let payment_id = parse_uuid("payment_id", &req.payment_id)?;
        let status = parse_payment_status(req.status)?
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("status is required")))?;

        let payment = self
            .store
            .update_payment_status(tenant_id, payment_id, status)
            .await
            .map_err(|e| store_failure(e, "Failed to update payment status"))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

        info!(status = status.as_str(), "Payment status updated");

        Ok(proto::UpdatePaymentStatusResponse {
            payment: Some(payment.into()),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, page = req.page))]
    async fn list_fee_payments_inner(
        &self,
        req: proto::ListFeePaymentsRequest,
    ) -> Result<proto::ListFeePaymentsResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let filter = payment_filter(req.filter)?;
        let page = PageRequest::new(i64::from(req.page), i64::from(req.page_size));

        let payments = self
            .store
            .list_payments(tenant_id, &filter, &page)
            .await
            .map_err(|e| store_failure(e, "Failed to fetch fee payments"))?;
        let total = self
            .store
            .count_payments(tenant_id, &filter)
            .await
            .map_err(|e| store_failure(e, "Failed to fetch fee payments"))?;

        Ok(proto::ListFeePaymentsResponse {
            payments: payments.into_iter().map(Into::into).collect(),
            pagination: Some(Pagination::new(total, &page).into()),
        })
    }

    // =========================================================================
    // Derived fee documents
    // =========================================================================

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, student_id = %req.student_id))]
    async fn generate_student_invoice_inner(
        &self,
        req: proto::GenerateStudentInvoiceRequest,
    ) -> Result<proto::GenerateStudentInvoiceResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let student_id = parse_uuid("student_id", &req.student_id)?;
        let academic_year = required_text("academic_year", &req.academic_year)?;
        let session = required_text("session", &req.session)?;
        let term = parse_term(req.term)?;

        let invoice = self
            .ledger
            .build_invoice(
                tenant_id,
                student_id,
                &academic_year,
                &session,
                term,
                Self::today(),
            )
            .await?;

        Ok(proto::GenerateStudentInvoiceResponse {
            invoice: Some(invoice.into()),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn generate_bulk_invoices_inner(
        &self,
        req: proto::GenerateBulkInvoicesRequest,
    ) -> Result<proto::GenerateBulkInvoicesResponse, AppError> {
        let request = BulkInvoiceRequest {
            tenant_id: parse_uuid("tenant_id", &req.tenant_id)?,
            academic_year: required_text("academic_year", &req.academic_year)?,
            session: required_text("session", &req.session)?,
            term: parse_term(req.term)?,
            filter: StudentFilter {
                class_id: parse_optional_uuid("class_id", &req.class_id)?,
                programme_id: parse_optional_uuid("programme_id", &req.programme_id)?,
                department_id: parse_optional_uuid("department_id", &req.department_id)?,
            },
            invoice_date: Self::today(),
        };

        let result = self.ledger.build_bulk_invoices(&request).await?;

        Ok(proto::GenerateBulkInvoicesResponse {
            total: result.total,
            successful: result.successful,
            failed: result.failed,
            invoices: result.invoices.into_iter().map(Into::into).collect(),
            failures: result.failures.into_iter().map(Into::into).collect(),
        })
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    async fn get_payment_statistics_inner(
        &self,
        req: proto::GetPaymentStatisticsRequest,
    ) -> Result<proto::GetPaymentStatisticsResponse, AppError> {
        let tenant_id = parse_uuid("tenant_id", &req.tenant_id)?;
        let filter = payment_filter(req.filter)?;

        let summary = self.ledger.payment_statistics(tenant_id, &filter).await?;

        Ok(proto::GetPaymentStatisticsResponse {
            summary: Some(summary.into()),
        })
    }
}

#[tonic::async_trait]
impl CampusService for CampusServiceImpl {
    async fn generate_admission_number(
        &self,
        request: Request<proto::GenerateAdmissionNumberRequest>,
    ) -> Result<Response<proto::GenerateCodeResponse>, Status> {
        observe(
            "GenerateAdmissionNumber",
            self.generate_admission_number_inner(request.into_inner()),
        )
        .await
    }

    async fn generate_employee_code(
        &self,
        request: Request<proto::GenerateEmployeeCodeRequest>,
    ) -> Result<Response<proto::GenerateCodeResponse>, Status> {
        observe(
            "GenerateEmployeeCode",
            self.generate_employee_code_inner(request.into_inner()),
        )
        .await
    }

    async fn generate_request_number(
        &self,
        request: Request<proto::GenerateRequestNumberRequest>,
    ) -> Result<Response<proto::GenerateCodeResponse>, Status> {
        observe(
            "GenerateRequestNumber",
            self.generate_request_number_inner(request.into_inner()),
        )
        .await
    }

    async fn admit_student(
        &self,
        request: Request<proto::AdmitStudentRequest>,
    ) -> Result<Response<proto::AdmitStudentResponse>, Status> {
        observe("AdmitStudent", self.admit_student_inner(request.into_inner())).await
    }

    async fn register_tutor(
        &self,
        request: Request<proto::RegisterTutorRequest>,
    ) -> Result<Response<proto::RegisterTutorResponse>, Status> {
        observe("RegisterTutor", self.register_tutor_inner(request.into_inner())).await
    }

    async fn create_procurement_request(
        &self,
        request: Request<proto::CreateProcurementRequestRequest>,
    ) -> Result<Response<proto::CreateProcurementRequestResponse>, Status> {
        observe(
            "CreateProcurementRequest",
            self.create_procurement_request_inner(request.into_inner()),
        )
        .await
    }

    async fn create_fee_structure(
        &self,
        request: Request<proto::CreateFeeStructureRequest>,
    ) -> Result<Response<proto::CreateFeeStructureResponse>, Status> {
        observe(
            "CreateFeeStructure",
            self.create_fee_structure_inner(request.into_inner()),
        )
        .await
    }

    async fn update_fee_structure(
        &self,
        request: Request<proto::UpdateFeeStructureRequest>,
    ) -> Result<Response<proto::UpdateFeeStructureResponse>, Status> {
        observe(
            "UpdateFeeStructure",
            self.update_fee_structure_inner(request.into_inner()),
        )
        .await
    }

    async fn record_fee_payment(
        &self,
        request: Request<proto::RecordFeePaymentRequest>,
    ) -> Result<Response<proto::RecordFeePaymentResponse>, Status> {
        observe(
            "RecordFeePayment",
            self.record_fee_payment_inner(request.into_inner()),
        )
        .await
    }

    async fn update_payment_status(
        &self,
        request: Request<proto::UpdatePaymentStatusRequest>,
    ) -> Result<Response<proto::UpdatePaymentStatusResponse>, Status> {
        observe(
            "UpdatePaymentStatus",
            self.update_payment_status_inner(request.into_inner()),
        )
        .await
    }

    async fn list_fee_payments(
        &self,
        request: Request<proto::ListFeePaymentsRequest>,
    ) -> Result<Response<proto::ListFeePaymentsResponse>, Status> {
        observe(
            "ListFeePayments",
            self.list_fee_payments_inner(request.into_inner()),
        )
        .await
    }

    async fn generate_student_invoice(
        &self,
        request: Request<proto::GenerateStudentInvoiceRequest>,
    ) -> Result<Response<proto::GenerateStudentInvoiceResponse>, Status> {
        observe(
            "GenerateStudentInvoice",
            self.generate_student_invoice_inner(request.into_inner()),
        )
        .await
    }

    async fn generate_bulk_invoices(
        &self,
        request: Request<proto::GenerateBulkInvoicesRequest>,
    ) -> Result<Response<proto::GenerateBulkInvoicesResponse>, Status> {
        observe(
            "GenerateBulkInvoices",
            self.generate_bulk_invoices_inner(request.into_inner()),
        )
        .await
    }

    async fn get_payment_statistics(
        &self,
        request: Request<proto::GetPaymentStatisticsRequest>,
    ) -> Result<Response<proto::GetPaymentStatisticsResponse>, Status> {
        observe(
            "GetPaymentStatistics",
            self.get_payment_statistics_inner(request.into_inner()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeKind;
    use tonic::Code;

    #[test]
    fn duplicate_admission_number_is_conflict() {
        let err = CodeError::Insert {
            kind: CodeKind::AdmissionNumber,
            source: StoreError::UniqueViolation {
                constraint: "students_admission_number_key".into(),
            },
        };
        let status = AppError::from(err).into_status();
        assert_eq!(status.code(), Code::AlreadyExists);
        assert_eq!(status.message(), "Admission number already exists");
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let err = CodeError::Insert {
            kind: CodeKind::AdmissionNumber,
            source: StoreError::UniqueViolation {
                constraint: "students_email_key".into(),
            },
        };
        let status = AppError::from(err).into_status();
        assert_eq!(status.message(), "Email already registered");
    }

    #[test]
    fn backend_failure_shows_only_friendly_message() {
        let err = CodeError::Generate {
            kind: CodeKind::EmployeeCode,
            source: StoreError::Backend(anyhow::anyhow!("connection refused")),
        };
        let status = AppError::from(err).into_status();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Failed to generate employee code");
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        let status = AppError::from(LedgerError::NoActiveFeeStructure).into_status();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(
            status.message(),
            "No active fee structure found for this programme"
        );

        let err = LedgerError::Store {
            action: "generate invoice",
            source: StoreError::Backend(anyhow::anyhow!("timeout")),
        };
        let status = AppError::from(err).into_status();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Failed to generate invoice");
    }

    #[test]
    fn unknown_foreign_key_is_bad_request() {
        let err = store_failure(
            StoreError::ForeignKeyViolation {
                constraint: "something_else_fkey".into(),
            },
            "Failed to record payment",
        );
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = store_failure(
            StoreError::ForeignKeyViolation {
                constraint: "fee_payments_student_id_fkey".into(),
            },
            "Failed to record payment",
        );
        assert_eq!(err.into_status().message(), "Student not found");
    }

    #[test]
    fn term_is_required() {
        assert!(parse_term(proto::Term::Unspecified as i32).is_err());
        assert!(parse_term(42).is_err());
        assert_eq!(parse_term(proto::Term::Term3 as i32).unwrap(), Term::Term3);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(parse_amount("amount_paid", "-1").is_err());
        assert!(parse_amount("amount_paid", "abc").is_err());
        assert_eq!(parse_amount("amount_paid", " 1500.50 ").unwrap(), Decimal::new(150050, 2));
    }
}
