//! Payment summary model for campus-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count and amount accumulated for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBucket {
    pub count: i64,
    pub amount: Decimal,
}

impl SummaryBucket {
    pub fn add(&mut self, amount: Decimal) {
        self.count += 1;
        self.amount += amount;
    }
}

/// Aggregate over a list of payments. Maps are ordered by key so output is
/// stable across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub total_payments: i64,
    pub total_amount: Decimal,
    pub by_method: BTreeMap<String, SummaryBucket>,
    pub by_programme: BTreeMap<String, SummaryBucket>,
    pub by_department: BTreeMap<String, SummaryBucket>,
}
