//! Student model for campus-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Enrolment status of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    Active,
    Suspended,
    Graduated,
    Withdrawn,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "ACTIVE",
            StudentStatus::Suspended => "SUSPENDED",
            StudentStatus::Graduated => "GRADUATED",
            StudentStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "SUSPENDED" => StudentStatus::Suspended,
            "GRADUATED" => StudentStatus::Graduated,
            "WITHDRAWN" => StudentStatus::Withdrawn,
            _ => StudentStatus::Active,
        }
    }
}

/// Student row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    pub tenant_id: Uuid,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub programme_id: Uuid,
    pub department_id: Uuid,
    pub class_id: Option<Uuid>,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Student joined with the names of its programme, department and class.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub student: Student,
    pub programme_name: String,
    pub department_name: String,
    pub class_name: Option<String>,
}

/// Input for admitting a student. The admission number is allocated by the
/// code generator immediately before insert.
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub tenant_id: Uuid,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub programme_id: Uuid,
    pub department_id: Uuid,
    pub class_id: Option<Uuid>,
}

/// Selection of students for bulk operations. `None` fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class_id: Option<Uuid>,
    pub programme_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
}
