//! Conversions between domain models and protobuf messages.

use chrono::{DateTime, Utc};
use prost_types::Timestamp;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::proto;
use crate::models::{
    FeePayment, FeeStructure, Invoice, InvoiceFailure, InvoiceLineItem, InvoiceStudent,
    Pagination, PaymentMethod, PaymentStatus, PaymentSummary, ProcurementRequest,
    ProcurementStatus, Student, StudentStatus, SummaryBucket, Term, Tutor,
};

/// Plain decimal text without trailing zeros: `30000`, `33333.33`.
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn datetime_to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

fn optional_decimal(value: Option<Decimal>) -> String {
    value.map(format_decimal).unwrap_or_default()
}

impl From<Term> for proto::Term {
    fn from(t: Term) -> Self {
        match t {
            Term::Term1 => Self::Term1,
            Term::Term2 => Self::Term2,
            Term::Term3 => Self::Term3,
        }
    }
}

impl TryFrom<proto::Term> for Term {
    type Error = ();

    fn try_from(t: proto::Term) -> Result<Self, Self::Error> {
        match t {
            proto::Term::Term1 => Ok(Term::Term1),
            proto::Term::Term2 => Ok(Term::Term2),
            proto::Term::Term3 => Ok(Term::Term3),
            proto::Term::Unspecified => Err(()),
        }
    }
}

impl From<StudentStatus> for proto::StudentStatus {
    fn from(s: StudentStatus) -> Self {
        match s {
            StudentStatus::Active => Self::Active,
            StudentStatus::Suspended => Self::Suspended,
            StudentStatus::Graduated => Self::Graduated,
            StudentStatus::Withdrawn => Self::Withdrawn,
        }
    }
}

impl From<PaymentMethod> for proto::PaymentMethod {
    fn from(m: PaymentMethod) -> Self {
        match m {
            PaymentMethod::Cash => Self::Cash,
            PaymentMethod::MobileMoney => Self::MobileMoney,
            PaymentMethod::BankTransfer => Self::BankTransfer,
            PaymentMethod::Cheque => Self::Cheque,
            PaymentMethod::Card => Self::Card,
        }
    }
}

impl TryFrom<proto::PaymentMethod> for PaymentMethod {
    type Error = ();

    fn try_from(m: proto::PaymentMethod) -> Result<Self, Self::Error> {
        match m {
            proto::PaymentMethod::Cash => Ok(Self::Cash),
            proto::PaymentMethod::MobileMoney => Ok(Self::MobileMoney),
            proto::PaymentMethod::BankTransfer => Ok(Self::BankTransfer),
            proto::PaymentMethod::Cheque => Ok(Self::Cheque),
            proto::PaymentMethod::Card => Ok(Self::Card),
            proto::PaymentMethod::Unspecified => Err(()),
        }
    }
}

impl From<PaymentStatus> for proto::PaymentStatus {
    fn from(s: PaymentStatus) -> Self {
        match s {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Completed => Self::Completed,
            PaymentStatus::Failed => Self::Failed,
            PaymentStatus::Refunded => Self::Refunded,
        }
    }
}

impl TryFrom<proto::PaymentStatus> for PaymentStatus {
    type Error = ();

    fn try_from(s: proto::PaymentStatus) -> Result<Self, Self::Error> {
        match s {
            proto::PaymentStatus::Pending => Ok(Self::Pending),
            proto::PaymentStatus::Completed => Ok(Self::Completed),
            proto::PaymentStatus::Failed => Ok(Self::Failed),
            proto::PaymentStatus::Refunded => Ok(Self::Refunded),
            proto::PaymentStatus::Unspecified => Err(()),
        }
    }
}

impl From<ProcurementStatus> for proto::ProcurementStatus {
    fn from(s: ProcurementStatus) -> Self {
        match s {
            ProcurementStatus::Pending => Self::Pending,
            ProcurementStatus::Approved => Self::Approved,
            ProcurementStatus::Rejected => Self::Rejected,
            ProcurementStatus::Ordered => Self::Ordered,
        }
    }
}

impl From<Student> for proto::Student {
    fn from(s: Student) -> Self {
        Self {
            student_id: s.student_id.to_string(),
            tenant_id: s.tenant_id.to_string(),
            admission_number: s.admission_number,
            first_name: s.first_name,
            last_name: s.last_name,
            email: s.email.unwrap_or_default(),
            programme_id: s.programme_id.to_string(),
            department_id: s.department_id.to_string(),
            class_id: s.class_id.map(|id| id.to_string()).unwrap_or_default(),
            status: proto::StudentStatus::from(StudentStatus::from_string(&s.status)).into(),
            created_at: Some(datetime_to_timestamp(s.created_utc)),
        }
    }
}

impl From<Tutor> for proto::Tutor {
    fn from(t: Tutor) -> Self {
        Self {
            tutor_id: t.tutor_id.to_string(),
            tenant_id: t.tenant_id.to_string(),
            employee_code: t.employee_code,
            first_name: t.first_name,
            last_name: t.last_name,
            email: t.email.unwrap_or_default(),
            department_id: t.department_id.map(|id| id.to_string()).unwrap_or_default(),
            created_at: Some(datetime_to_timestamp(t.created_utc)),
        }
    }
}

impl From<ProcurementRequest> for proto::ProcurementRequest {
    fn from(r: ProcurementRequest) -> Self {
        Self {
            request_id: r.request_id.to_string(),
            tenant_id: r.tenant_id.to_string(),
            request_number: r.request_number,
            department_id: r.department_id.map(|id| id.to_string()).unwrap_or_default(),
            title: r.title,
            description: r.description.unwrap_or_default(),
            estimated_amount: format_decimal(r.estimated_amount),
            status: proto::ProcurementStatus::from(ProcurementStatus::from_string(&r.status))
                .into(),
            requested_by: r.requested_by,
            created_at: Some(datetime_to_timestamp(r.created_utc)),
        }
    }
}

impl From<FeeStructure> for proto::FeeStructure {
    fn from(f: FeeStructure) -> Self {
        Self {
            fee_structure_id: f.fee_structure_id.to_string(),
            tenant_id: f.tenant_id.to_string(),
            programme_id: f.programme_id.to_string(),
            academic_year: f.academic_year,
            session: f.session,
            tuition_fee: format_decimal(f.tuition_fee),
            exam_fee: optional_decimal(f.exam_fee),
            library_fee: optional_decimal(f.library_fee),
            activity_fee: optional_decimal(f.activity_fee),
            total_fee: format_decimal(f.total_fee),
            is_active: f.is_active,
            created_at: Some(datetime_to_timestamp(f.created_utc)),
        }
    }
}

impl From<FeePayment> for proto::FeePayment {
    fn from(p: FeePayment) -> Self {
        Self {
            payment_id: p.payment_id.to_string(),
            tenant_id: p.tenant_id.to_string(),
            student_id: p.student_id.to_string(),
            academic_year: p.academic_year,
            session: p.session,
            amount_paid: format_decimal(p.amount_paid),
            payment_method: proto::PaymentMethod::from(PaymentMethod::from_string(
                &p.payment_method,
            ))
            .into(),
            transaction_ref: p.transaction_ref,
            status: proto::PaymentStatus::from(PaymentStatus::from_string(&p.status)).into(),
            payment_date: p.payment_date.to_string(),
            created_at: Some(datetime_to_timestamp(p.created_utc)),
        }
    }
}

impl From<InvoiceLineItem> for proto::InvoiceLineItem {
    fn from(item: InvoiceLineItem) -> Self {
        Self {
            votehead: item.votehead,
            amount: format_decimal(item.amount),
        }
    }
}

impl From<InvoiceStudent> for proto::InvoiceStudent {
    fn from(s: InvoiceStudent) -> Self {
        Self {
            student_id: s.student_id.to_string(),
            admission_number: s.admission_number,
            full_name: s.full_name,
            programme: s.programme,
            department: s.department,
            class_name: s.class_name.unwrap_or_default(),
        }
    }
}

impl From<Invoice> for proto::Invoice {
    fn from(i: Invoice) -> Self {
        Self {
            invoice_number: i.invoice_number,
            invoice_date: i.invoice_date.to_string(),
            due_date: i.due_date.to_string(),
            student: Some(i.student.into()),
            academic_year: i.academic_year,
            session: i.session,
            term: proto::Term::from(i.term).into(),
            line_items: i.line_items.into_iter().map(Into::into).collect(),
            subtotal: format_decimal(i.subtotal),
            total_paid: format_decimal(i.total_paid),
            balance: format_decimal(i.balance),
        }
    }
}

impl From<InvoiceFailure> for proto::InvoiceFailure {
    fn from(f: InvoiceFailure) -> Self {
        Self {
            student_id: f.student_id.to_string(),
            admission_number: f.admission_number,
            error: f.error,
        }
    }
}

fn buckets(map: BTreeMap<String, SummaryBucket>) -> Vec<proto::SummaryBucket> {
    map.into_iter()
        .map(|(key, bucket)| proto::SummaryBucket {
            key,
            count: bucket.count,
            amount: format_decimal(bucket.amount),
        })
        .collect()
}

impl From<PaymentSummary> for proto::PaymentSummary {
    fn from(s: PaymentSummary) -> Self {
        Self {
            total_payments: s.total_payments,
            total_amount: format_decimal(s.total_amount),
            by_method: buckets(s.by_method),
            by_programme: buckets(s.by_programme),
            by_department: buckets(s.by_department),
        }
    }
}

impl From<Pagination> for proto::Pagination {
    fn from(p: Pagination) -> Self {
        Self {
            total: p.total,
            total_pages: p.total_pages,
            current_page: p.current_page,
        }
    }
}
