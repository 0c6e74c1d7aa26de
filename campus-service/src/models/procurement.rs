//! Procurement request model for campus-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Procurement request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcurementStatus {
    Pending,
    Approved,
    Rejected,
    Ordered,
}

impl ProcurementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementStatus::Pending => "PENDING",
            ProcurementStatus::Approved => "APPROVED",
            ProcurementStatus::Rejected => "REJECTED",
            ProcurementStatus::Ordered => "ORDERED",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "APPROVED" => ProcurementStatus::Approved,
            "REJECTED" => ProcurementStatus::Rejected,
            "ORDERED" => ProcurementStatus::Ordered,
            _ => ProcurementStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProcurementRequest {
    pub request_id: Uuid,
    pub tenant_id: Uuid,
    pub request_number: String,
    pub department_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub estimated_amount: Decimal,
    pub status: String,
    pub requested_by: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProcurementRequest {
    pub tenant_id: Uuid,
    pub request_number: String,
    pub department_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub estimated_amount: Decimal,
    pub requested_by: String,
}
