//! Fee structure model for campus-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

/// Fees charged for one programme in one (academic year, session).
///
/// `total_fee` is expected to equal the sum of the components. The store does
/// not enforce it; see [`FeeStructure::matches_components`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeStructure {
    pub fee_structure_id: Uuid,
    pub tenant_id: Uuid,
    pub programme_id: Uuid,
    pub academic_year: String,
    pub session: String,
    pub tuition_fee: Decimal,
    pub exam_fee: Option<Decimal>,
    pub library_fee: Option<Decimal>,
    pub activity_fee: Option<Decimal>,
    pub total_fee: Decimal,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl FeeStructure {
    pub fn component_sum(&self) -> Decimal {
        component_sum(
            self.tuition_fee,
            self.exam_fee,
            self.library_fee,
            self.activity_fee,
        )
    }

    pub fn matches_components(&self) -> bool {
        self.total_fee == self.component_sum()
    }

    /// Logs a warning when `total_fee` disagrees with the components. Returns
    /// whether they agree.
    pub fn check_total(&self) -> bool {
        let matches = self.matches_components();
        if !matches {
            warn!(
                fee_structure_id = %self.fee_structure_id,
                total_fee = %self.total_fee,
                component_sum = %self.component_sum(),
                "Fee structure total does not match its components"
            );
        }
        matches
    }
}

pub(crate) fn component_sum(
    tuition: Decimal,
    exam: Option<Decimal>,
    library: Option<Decimal>,
    activity: Option<Decimal>,
) -> Decimal {
    tuition + exam.unwrap_or_default() + library.unwrap_or_default() + activity.unwrap_or_default()
}

/// Input for creating a fee structure. New structures are active.
#[derive(Debug, Clone)]
pub struct CreateFeeStructure {
    pub tenant_id: Uuid,
    pub programme_id: Uuid,
    pub academic_year: String,
    pub session: String,
    pub tuition_fee: Decimal,
    pub exam_fee: Option<Decimal>,
    pub library_fee: Option<Decimal>,
    pub activity_fee: Option<Decimal>,
    /// `None` stores the sum of the components.
    pub total_fee: Option<Decimal>,
}

impl CreateFeeStructure {
    pub fn resolved_total(&self) -> Decimal {
        self.total_fee.unwrap_or_else(|| {
            component_sum(
                self.tuition_fee,
                self.exam_fee,
                self.library_fee,
                self.activity_fee,
            )
        })
    }
}

/// Sparse patch for a fee structure: only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UpdateFeeStructure {
    pub tuition_fee: Option<Decimal>,
    pub exam_fee: Option<Decimal>,
    pub library_fee: Option<Decimal>,
    pub activity_fee: Option<Decimal>,
    pub total_fee: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl UpdateFeeStructure {
    pub fn is_empty(&self) -> bool {
        self.tuition_fee.is_none()
            && self.exam_fee.is_none()
            && self.library_fee.is_none()
            && self.activity_fee.is_none()
            && self.total_fee.is_none()
            && self.is_active.is_none()
    }

    /// Apply the patch to an in-memory copy.
    pub fn apply(&self, structure: &mut FeeStructure) {
        if let Some(v) = self.tuition_fee {
            structure.tuition_fee = v;
        }
        if let Some(v) = self.exam_fee {
            structure.exam_fee = Some(v);
        }
        if let Some(v) = self.library_fee {
            structure.library_fee = Some(v);
        }
        if let Some(v) = self.activity_fee {
            structure.activity_fee = Some(v);
        }
        if let Some(v) = self.total_fee {
            structure.total_fee = v;
        }
        if let Some(v) = self.is_active {
            structure.is_active = v;
        }
    }
}
