//! Term invoice model for campus-service. Invoices are derived on request and
//! never persisted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StudentFilter;

/// One of the three terms of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "TERM1")]
    Term1,
    #[serde(rename = "TERM2")]
    Term2,
    #[serde(rename = "TERM3")]
    Term3,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::Term1 => "TERM1",
            Term::Term2 => "TERM2",
            Term::Term3 => "TERM3",
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named fee category (votehead) and its amount for the term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub votehead: String,
    pub amount: Decimal,
}

impl InvoiceLineItem {
    pub fn new(votehead: impl Into<String>, amount: Decimal) -> Self {
        Self {
            votehead: votehead.into(),
            amount,
        }
    }
}

/// Student summary printed on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStudent {
    pub student_id: Uuid,
    pub admission_number: String,
    pub full_name: String,
    pub programme: String,
    pub department: String,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub student: InvoiceStudent,
    pub academic_year: String,
    pub session: String,
    pub term: Term,
    pub line_items: Vec<InvoiceLineItem>,
    /// One third of the structure's total fee.
    pub subtotal: Decimal,
    /// Completed payments for the whole session.
    pub total_paid: Decimal,
    /// `subtotal - total_paid`; negative when overpaid.
    pub balance: Decimal,
}

/// Parameters for invoicing every active student in a selection.
#[derive(Debug, Clone)]
pub struct BulkInvoiceRequest {
    pub tenant_id: Uuid,
    pub academic_year: String,
    pub session: String,
    pub term: Term,
    pub filter: StudentFilter,
    pub invoice_date: NaiveDate,
}

/// A student whose invoice could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFailure {
    pub student_id: Uuid,
    pub admission_number: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkInvoiceResult {
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub invoices: Vec<Invoice>,
    pub failures: Vec<InvoiceFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_labels_match_serde_names() {
        for term in [Term::Term1, Term::Term2, Term::Term3] {
            let json = serde_json::to_string(&term).unwrap();
            assert_eq!(json, format!("\"{}\"", term.as_str()));
        }
        assert_eq!(Term::Term2.to_string(), "TERM2");
    }
}
