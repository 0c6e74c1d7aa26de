//! In-process [`DataStore`] used by tests and local experiments.
//!
//! Mirrors the PostgreSQL schema closely enough that the same constraint
//! names come back on conflicts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::codes::CodeKind;
use crate::models::{
    CreateFeePayment, CreateFeeStructure, CreateProcurementRequest, CreateStudent, CreateTutor,
    FeePayment, FeeStructure, PageRequest, PaymentFilter, PaymentStatus, PaymentWithContext,
    ProcurementRequest, ProcurementStatus, Student, StudentFilter, StudentRecord, StudentStatus,
    Tutor, UpdateFeeStructure,
};
use crate::services::store::{DataStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct NamedRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
}

#[derive(Default)]
struct State {
    departments: Vec<NamedRow>,
    programmes: Vec<NamedRow>,
    classes: Vec<NamedRow>,
    students: Vec<Student>,
    tutors: Vec<Tutor>,
    procurement_requests: Vec<ProcurementRequest>,
    fee_structures: Vec<FeeStructure>,
    payments: Vec<FeePayment>,
    counters: HashMap<(Uuid, String), i64>,
}

impl State {
    fn name_of(rows: &[NamedRow], tenant_id: Uuid, id: Uuid) -> Option<String> {
        rows.iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .map(|r| r.name.clone())
    }

    fn exists(rows: &[NamedRow], tenant_id: Uuid, id: Uuid) -> bool {
        rows.iter().any(|r| r.tenant_id == tenant_id && r.id == id)
    }

    fn record(&self, student: &Student) -> Option<StudentRecord> {
        Some(StudentRecord {
            programme_name: Self::name_of(&self.programmes, student.tenant_id, student.programme_id)?,
            department_name: Self::name_of(
                &self.departments,
                student.tenant_id,
                student.department_id,
            )?,
            class_name: student
                .class_id
                .and_then(|id| Self::name_of(&self.classes, student.tenant_id, id)),
            student: student.clone(),
        })
    }

    fn codes(&self, tenant_id: Uuid, kind: CodeKind) -> Vec<&str> {
        match kind {
            CodeKind::AdmissionNumber => self
                .students
                .iter()
                .filter(|s| s.tenant_id == tenant_id)
                .map(|s| s.admission_number.as_str())
                .collect(),
            CodeKind::EmployeeCode => self
                .tutors
                .iter()
                .filter(|t| t.tenant_id == tenant_id)
                .map(|t| t.employee_code.as_str())
                .collect(),
            CodeKind::RequestNumber => self
                .procurement_requests
                .iter()
                .filter(|r| r.tenant_id == tenant_id)
                .map(|r| r.request_number.as_str())
                .collect(),
        }
    }

    fn payments_with_context(&self, tenant_id: Uuid, filter: &PaymentFilter) -> Vec<PaymentWithContext> {
        let mut matched: Vec<PaymentWithContext> = self
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .filter_map(|payment| {
                let student = self
                    .students
                    .iter()
                    .find(|s| s.student_id == payment.student_id)?;
                if !payment_matches(payment, student, filter) {
                    return None;
                }
                let record = self.record(student)?;
                Some(PaymentWithContext {
                    payment: payment.clone(),
                    admission_number: student.admission_number.clone(),
                    programme_name: record.programme_name,
                    department_name: record.department_name,
                })
            })
            .collect();
        matched.sort_by(|a, b| {
            b.payment
                .payment_date
                .cmp(&a.payment.payment_date)
                .then(b.payment.created_utc.cmp(&a.payment.created_utc))
        });
        matched
    }
}

fn payment_matches(payment: &FeePayment, student: &Student, filter: &PaymentFilter) -> bool {
    fn within(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
    }

    filter
        .academic_year
        .as_deref()
        .is_none_or(|y| payment.academic_year == y)
        && filter.session.as_deref().is_none_or(|s| payment.session == s)
        && filter.student_id.is_none_or(|id| payment.student_id == id)
        && filter.programme_id.is_none_or(|id| student.programme_id == id)
        && filter.department_id.is_none_or(|id| student.department_id == id)
        && filter.status.is_none_or(|s| payment.status == s.as_str())
        && filter
            .payment_method
            .is_none_or(|m| payment.payment_method == m.as_str())
        && within(payment.payment_date, filter.start_date, filter.end_date)
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn foreign_key(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_department(&self, tenant_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.departments.push(NamedRow {
            id,
            tenant_id,
            name: name.to_string(),
        });
        id
    }

    pub async fn add_programme(&self, tenant_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.programmes.push(NamedRow {
            id,
            tenant_id,
            name: name.to_string(),
        });
        id
    }

    pub async fn add_class(&self, tenant_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.classes.push(NamedRow {
            id,
            tenant_id,
            name: name.to_string(),
        });
        id
    }

    /// Changes a student's status, e.g. to take them out of bulk runs.
    pub async fn set_student_status(&self, student_id: Uuid, status: StudentStatus) {
        let mut state = self.state.write().await;
        if let Some(student) = state
            .students
            .iter_mut()
            .find(|s| s.student_id == student_id)
        {
            student.status = status.as_str().to_string();
        }
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn highest_code(
        &self,
        tenant_id: Uuid,
        kind: CodeKind,
        prefix: &str,
    ) -> StoreResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .codes(tenant_id, kind)
            .into_iter()
            .filter(|code| code.starts_with(prefix))
            .max()
            .map(str::to_string))
    }

    async fn codes_with_prefix(
        &self,
        tenant_id: Uuid,
        kind: CodeKind,
        prefix: &str,
    ) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .codes(tenant_id, kind)
            .into_iter()
            .filter(|code| code.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    async fn advance_counter(
        &self,
        tenant_id: Uuid,
        series_key: &str,
        floor: i64,
    ) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        let value = state
            .counters
            .entry((tenant_id, series_key.to_string()))
            .or_insert(floor);
        let next = (*value).max(floor).checked_add(1).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("counter {} is out of range", series_key))
        })?;
        *value = next;
        Ok(next)
    }

    async fn get_student(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> StoreResult<Option<StudentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .students
            .iter()
            .find(|s| s.tenant_id == tenant_id && s.student_id == student_id)
            .and_then(|s| state.record(s)))
    }

    async fn list_active_students(
        &self,
        tenant_id: Uuid,
        filter: &StudentFilter,
    ) -> StoreResult<Vec<StudentRecord>> {
        let state = self.state.read().await;
        let mut students: Vec<StudentRecord> = state
            .students
            .iter()
            .filter(|s| {
                s.tenant_id == tenant_id
                    && s.status == StudentStatus::Active.as_str()
                    && filter.class_id.is_none_or(|id| s.class_id == Some(id))
                    && filter.programme_id.is_none_or(|id| s.programme_id == id)
                    && filter.department_id.is_none_or(|id| s.department_id == id)
            })
            .filter_map(|s| state.record(s))
            .collect();
        students.sort_by(|a, b| a.student.admission_number.cmp(&b.student.admission_number));
        Ok(students)
    }

    async fn find_active_fee_structures(
        &self,
        tenant_id: Uuid,
        programme_id: Uuid,
        academic_year: &str,
        session: &str,
    ) -> StoreResult<Vec<FeeStructure>> {
        let state = self.state.read().await;
        Ok(state
            .fee_structures
            .iter()
            .rev()
            .filter(|f| {
                f.tenant_id == tenant_id
                    && f.programme_id == programme_id
                    && f.academic_year == academic_year
                    && f.session == session
                    && f.is_active
            })
            .cloned()
            .collect())
    }

    async fn list_completed_payments(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        academic_year: &str,
        session: &str,
    ) -> StoreResult<Vec<FeePayment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| {
                p.tenant_id == tenant_id
                    && p.student_id == student_id
                    && p.academic_year == academic_year
                    && p.session == session
                    && p.is_completed()
            })
            .cloned()
            .collect())
    }

    async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
        page: &PageRequest,
    ) -> StoreResult<Vec<FeePayment>> {
        let state = self.state.read().await;
        Ok(state
            .payments_with_context(tenant_id, filter)
            .into_iter()
            .skip(page.offset().max(0) as usize)
            .take(page.limit().max(0) as usize)
            .map(|p| p.payment)
            .collect())
    }

    async fn count_payments(&self, tenant_id: Uuid, filter: &PaymentFilter) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state.payments_with_context(tenant_id, filter).len() as i64)
    }

    async fn list_payments_with_context(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
    ) -> StoreResult<Vec<PaymentWithContext>> {
        let state = self.state.read().await;
        Ok(state.payments_with_context(tenant_id, filter))
    }

    async fn insert_student(&self, input: &CreateStudent) -> StoreResult<Student> {
        let mut state = self.state.write().await;
        let tenant_id = input.tenant_id;

        if !State::exists(&state.programmes, tenant_id, input.programme_id) {
            return Err(foreign_key("students_programme_id_fkey"));
        }
        if !State::exists(&state.departments, tenant_id, input.department_id) {
            return Err(foreign_key("students_department_id_fkey"));
        }
        if let Some(class_id) = input.class_id {
            if !State::exists(&state.classes, tenant_id, class_id) {
                return Err(foreign_key("students_class_id_fkey"));
            }
        }
        for existing in state.students.iter().filter(|s| s.tenant_id == tenant_id) {
            if existing.admission_number == input.admission_number {
                return Err(unique(CodeKind::AdmissionNumber.unique_constraint()));
            }
            if input.email.is_some() && existing.email == input.email {
                return Err(unique("students_email_key"));
            }
        }

        let student = Student {
            student_id: Uuid::new_v4(),
            tenant_id,
            admission_number: input.admission_number.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            programme_id: input.programme_id,
            department_id: input.department_id,
            class_id: input.class_id,
            status: StudentStatus::Active.as_str().to_string(),
            created_utc: Utc::now(),
        };
        state.students.push(student.clone());
        Ok(student)
    }

    async fn insert_tutor(&self, input: &CreateTutor) -> StoreResult<Tutor> {
        let mut state = self.state.write().await;
        let tenant_id = input.tenant_id;

        if let Some(department_id) = input.department_id {
            if !State::exists(&state.departments, tenant_id, department_id) {
                return Err(foreign_key("tutors_department_id_fkey"));
            }
        }
        for existing in state.tutors.iter().filter(|t| t.tenant_id == tenant_id) {
            if existing.employee_code == input.employee_code {
                return Err(unique(CodeKind::EmployeeCode.unique_constraint()));
            }
            if input.email.is_some() && existing.email == input.email {
                return Err(unique("tutors_email_key"));
            }
        }

        let tutor = Tutor {
            tutor_id: Uuid::new_v4(),
            tenant_id,
            employee_code: input.employee_code.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            department_id: input.department_id,
            created_utc: Utc::now(),
        };
        state.tutors.push(tutor.clone());
        Ok(tutor)
    }

    async fn insert_procurement_request(
        &self,
        input: &CreateProcurementRequest,
    ) -> StoreResult<ProcurementRequest> {
        let mut state = self.state.write().await;
        let tenant_id = input.tenant_id;

        if let Some(department_id) = input.department_id {
            if !State::exists(&state.departments, tenant_id, department_id) {
                return Err(foreign_key("procurement_requests_department_id_fkey"));
            }
        }
        if state
            .procurement_requests
            .iter()
            .any(|r| r.tenant_id == tenant_id && r.request_number == input.request_number)
        {
            return Err(unique(CodeKind::RequestNumber.unique_constraint()));
        }

        let request = ProcurementRequest {
            request_id: Uuid::new_v4(),
            tenant_id,
            request_number: input.request_number.clone(),
            department_id: input.department_id,
            title: input.title.clone(),
            description: input.description.clone(),
            estimated_amount: input.estimated_amount,
            status: ProcurementStatus::Pending.as_str().to_string(),
            requested_by: input.requested_by.clone(),
            created_utc: Utc::now(),
        };
        state.procurement_requests.push(request.clone());
        Ok(request)
    }

    async fn insert_fee_structure(&self, input: &CreateFeeStructure) -> StoreResult<FeeStructure> {
        let mut state = self.state.write().await;

        if !State::exists(&state.programmes, input.tenant_id, input.programme_id) {
            return Err(foreign_key("fee_structures_programme_id_fkey"));
        }

        let structure = FeeStructure {
            fee_structure_id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            programme_id: input.programme_id,
            academic_year: input.academic_year.clone(),
            session: input.session.clone(),
            tuition_fee: input.tuition_fee,
            exam_fee: input.exam_fee,
            library_fee: input.library_fee,
            activity_fee: input.activity_fee,
            total_fee: input.resolved_total(),
            is_active: true,
            created_utc: Utc::now(),
        };
        state.fee_structures.push(structure.clone());
        Ok(structure)
    }

    async fn update_fee_structure(
        &self,
        tenant_id: Uuid,
        fee_structure_id: Uuid,
        patch: &UpdateFeeStructure,
    ) -> StoreResult<Option<FeeStructure>> {
        let mut state = self.state.write().await;
        Ok(state
            .fee_structures
            .iter_mut()
            .find(|f| f.tenant_id == tenant_id && f.fee_structure_id == fee_structure_id)
            .map(|structure| {
                patch.apply(structure);
                structure.clone()
            }))
    }

    async fn insert_fee_payment(&self, input: &CreateFeePayment) -> StoreResult<FeePayment> {
        let mut state = self.state.write().await;
        let tenant_id = input.tenant_id;

        if !state
            .students
            .iter()
            .any(|s| s.tenant_id == tenant_id && s.student_id == input.student_id)
        {
            return Err(foreign_key("fee_payments_student_id_fkey"));
        }
        if state
            .payments
            .iter()
            .any(|p| p.tenant_id == tenant_id && p.transaction_ref == input.transaction_ref)
        {
            return Err(unique("fee_payments_transaction_ref_key"));
        }

        let payment = FeePayment {
            payment_id: Uuid::new_v4(),
            tenant_id,
            student_id: input.student_id,
            academic_year: input.academic_year.clone(),
            session: input.session.clone(),
            amount_paid: input.amount_paid,
            payment_method: input.payment_method.as_str().to_string(),
            transaction_ref: input.transaction_ref.clone(),
            status: input.status.as_str().to_string(),
            payment_date: input.payment_date,
            created_utc: Utc::now(),
        };
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn update_payment_status(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> StoreResult<Option<FeePayment>> {
        let mut state = self.state.write().await;
        Ok(state
            .payments
            .iter_mut()
            .find(|p| p.tenant_id == tenant_id && p.payment_id == payment_id)
            .map(|payment| {
                payment.status = status.as_str().to_string();
                payment.clone()
            }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
