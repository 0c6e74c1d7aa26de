//! Fee ledger: per-term invoices, bulk invoicing and payment summaries.
//!
//! The academic year is split into three equal terms. An invoice charges one
//! third of the programme's total fee and nets off every completed payment of
//! the session.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    BulkInvoiceRequest, BulkInvoiceResult, FeeStructure, Invoice, InvoiceFailure,
    InvoiceLineItem, InvoiceStudent, PaymentFilter, PaymentSummary, PaymentWithContext,
    StudentRecord, Term,
};
use crate::services::metrics::record_invoice;
use crate::services::store::{DataStore, StoreError};

pub const TERMS_PER_YEAR: u32 = 3;
pub const DUE_DAYS: u64 = 30;

pub const TUITION_VOTEHEAD: &str = "Tuition Fees";
pub const EXAMINATION_VOTEHEAD: &str = "Examination Fees";
pub const LIBRARY_VOTEHEAD: &str = "Library Fees";
pub const ACTIVITY_VOTEHEAD: &str = "Activity Fees";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Student not found")]
    StudentNotFound,

    #[error("No active fee structure found for this programme")]
    NoActiveFeeStructure,

    #[error("Failed to {action}")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    fn store(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| LedgerError::Store { action, source }
    }

    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            LedgerError::StudentNotFound => "student_not_found",
            LedgerError::NoActiveFeeStructure => "no_fee_structure",
            LedgerError::Store { .. } => "error",
        }
    }
}

/// One third of `amount`, rounded to cents.
pub fn term_share(amount: Decimal) -> Decimal {
    (amount / Decimal::from(TERMS_PER_YEAR))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Votehead lines for one term. Tuition is always present; the optional
/// components only when set and non-zero.
pub fn term_line_items(structure: &FeeStructure) -> Vec<InvoiceLineItem> {
    let mut items = vec![InvoiceLineItem::new(
        TUITION_VOTEHEAD,
        term_share(structure.tuition_fee),
    )];

    let optional = [
        (EXAMINATION_VOTEHEAD, structure.exam_fee),
        (LIBRARY_VOTEHEAD, structure.library_fee),
        (ACTIVITY_VOTEHEAD, structure.activity_fee),
    ];
    for (votehead, fee) in optional {
        if let Some(fee) = fee.filter(|f| !f.is_zero()) {
            items.push(InvoiceLineItem::new(votehead, term_share(fee)));
        }
    }

    items
}

pub fn invoice_number(academic_year: &str, admission_number: &str, term: Term) -> String {
    format!("INV/{}/{}/{}", academic_year, admission_number, term)
}

pub fn due_date(invoice_date: NaiveDate) -> NaiveDate {
    invoice_date
        .checked_add_days(Days::new(DUE_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

/// Counts and sums payments by method, programme name and department name.
pub fn build_payment_summary(payments: &[PaymentWithContext]) -> PaymentSummary {
    payments
        .iter()
        .fold(PaymentSummary::default(), |mut summary, entry| {
            let amount = entry.payment.amount_paid;
            summary.total_payments += 1;
            summary.total_amount += amount;
            summary
                .by_method
                .entry(entry.payment.payment_method.clone())
                .or_default()
                .add(amount);
            summary
                .by_programme
                .entry(entry.programme_name.clone())
                .or_default()
                .add(amount);
            summary
                .by_department
                .entry(entry.department_name.clone())
                .or_default()
                .add(amount);
            summary
        })
}

/// Builds fee documents from the data store. Holds no state between calls.
#[derive(Clone)]
pub struct FeeLedgerEngine {
    store: Arc<dyn DataStore>,
}

impl FeeLedgerEngine {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, student_id = %student_id, term = %term))]
    pub async fn build_invoice(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        academic_year: &str,
        session: &str,
        term: Term,
        invoice_date: NaiveDate,
    ) -> Result<Invoice, LedgerError> {
        let result = async {
            let student = self
                .store
                .get_student(tenant_id, student_id)
                .await
                .map_err(LedgerError::store("generate invoice"))?
                .ok_or(LedgerError::StudentNotFound)?;

            self.invoice_for(tenant_id, &student, academic_year, session, term, invoice_date)
                .await
        }
        .await;

        record_invoice(match &result {
            Ok(_) => "success",
            Err(err) => err.outcome(),
        });
        result
    }

    /// Invoices every active student in the selection. A failing student is
    /// reported in `failures` and never stops the batch.
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id, term = %request.term))]
    pub async fn build_bulk_invoices(
        &self,
        request: &BulkInvoiceRequest,
    ) -> Result<BulkInvoiceResult, LedgerError> {
        let students = self
            .store
            .list_active_students(request.tenant_id, &request.filter)
            .await
            .map_err(LedgerError::store("generate bulk invoices"))?;

        let mut result = BulkInvoiceResult {
            total: students.len() as i64,
            ..Default::default()
        };

        for student in &students {
            let outcome = self
                .invoice_for(
                    request.tenant_id,
                    student,
                    &request.academic_year,
                    &request.session,
                    request.term,
                    request.invoice_date,
                )
                .await;

            match outcome {
                Ok(invoice) => {
                    record_invoice("success");
                    result.invoices.push(invoice);
                }
                Err(err) => {
                    record_invoice(err.outcome());
                    let message = err.to_string();
                    warn!(
                        student_id = %student.student.student_id,
                        admission_number = %student.student.admission_number,
                        error = %format!("{:#}", anyhow::Error::new(err)),
                        "Invoice failed in bulk run"
                    );
                    result.failures.push(InvoiceFailure {
                        student_id: student.student.student_id,
                        admission_number: student.student.admission_number.clone(),
                        error: message,
                    });
                }
            }
        }

        result.successful = result.invoices.len() as i64;
        result.failed = result.failures.len() as i64;

        info!(
            total = result.total,
            successful = result.successful,
            failed = result.failed,
            "Bulk invoicing completed"
        );

        Ok(result)
    }

    /// Summary of the payments matching `filter`.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn payment_statistics(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
    ) -> Result<PaymentSummary, LedgerError> {
        let payments = self
            .store
            .list_payments_with_context(tenant_id, filter)
            .await
            .map_err(LedgerError::store("fetch payment statistics"))?;

        Ok(build_payment_summary(&payments))
    }

    async fn invoice_for(
        &self,
        tenant_id: Uuid,
        record: &StudentRecord,
        academic_year: &str,
        session: &str,
        term: Term,
        invoice_date: NaiveDate,
    ) -> Result<Invoice, LedgerError> {
        let student = &record.student;

        let structures = self
            .store
            .find_active_fee_structures(tenant_id, student.programme_id, academic_year, session)
            .await
            .map_err(LedgerError::store("generate invoice"))?;

        if structures.len() > 1 {
            warn!(
                programme_id = %student.programme_id,
                academic_year = %academic_year,
                session = %session,
                count = structures.len(),
                "Multiple active fee structures, using the first"
            );
        }
        let structure = structures
            .into_iter()
            .next()
            .ok_or(LedgerError::NoActiveFeeStructure)?;

        structure.check_total();

        let subtotal = term_share(structure.total_fee);
        let line_items = term_line_items(&structure);

        let total_paid: Decimal = self
            .store
            .list_completed_payments(tenant_id, student.student_id, academic_year, session)
            .await
            .map_err(LedgerError::store("generate invoice"))?
            .iter()
            .map(|p| p.amount_paid)
            .sum();

        Ok(Invoice {
            invoice_number: invoice_number(academic_year, &student.admission_number, term),
            invoice_date,
            due_date: due_date(invoice_date),
            student: InvoiceStudent {
                student_id: student.student_id,
                admission_number: student.admission_number.clone(),
                full_name: student.full_name(),
                programme: record.programme_name.clone(),
                department: record.department_name.clone(),
                class_name: record.class_name.clone(),
            },
            academic_year: academic_year.to_string(),
            session: session.to_string(),
            term,
            line_items,
            subtotal,
            total_paid,
            balance: subtotal - total_paid,
        })
    }
}
