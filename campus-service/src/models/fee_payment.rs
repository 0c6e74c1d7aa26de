//! Fee payment model for campus-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status. Only `Completed` payments reduce a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "COMPLETED" => PaymentStatus::Completed,
            "FAILED" => PaymentStatus::Failed,
            "REFUNDED" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
    Cheque,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::MobileMoney => "MOBILE_MONEY",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Cheque => "CHEQUE",
            PaymentMethod::Card => "CARD",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "MOBILE_MONEY" => PaymentMethod::MobileMoney,
            "BANK_TRANSFER" => PaymentMethod::BankTransfer,
            "CHEQUE" => PaymentMethod::Cheque,
            "CARD" => PaymentMethod::Card,
            _ => PaymentMethod::Cash,
        }
    }
}

/// Fee payment row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeePayment {
    pub payment_id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub academic_year: String,
    pub session: String,
    pub amount_paid: Decimal,
    pub payment_method: String,
    pub transaction_ref: String,
    pub status: String,
    pub payment_date: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

impl FeePayment {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed.as_str()
    }
}

/// A payment joined with the student's programme and department names,
/// the shape aggregated by the payment summary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentWithContext {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: FeePayment,
    pub admission_number: String,
    pub programme_name: String,
    pub department_name: String,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct CreateFeePayment {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub academic_year: String,
    pub session: String,
    pub amount_paid: Decimal,
    pub payment_method: PaymentMethod,
    pub transaction_ref: String,
    pub status: PaymentStatus,
    pub payment_date: NaiveDate,
}

/// Filter parameters for listing and aggregating payments.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub academic_year: Option<String>,
    pub session: Option<String>,
    pub student_id: Option<Uuid>,
    pub programme_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
