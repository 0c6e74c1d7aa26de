//! PostgreSQL adapter for campus-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::codes::CodeKind;
use crate::models::{
    CreateFeePayment, CreateFeeStructure, CreateProcurementRequest, CreateStudent, CreateTutor,
    FeePayment, FeeStructure, PageRequest, PaymentFilter, PaymentStatus, PaymentWithContext,
    ProcurementRequest, ProcurementStatus, Student, StudentFilter, StudentRecord, StudentStatus,
    Tutor, UpdateFeeStructure,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{DataStore, StoreResult};

const STUDENT_COLUMNS: &str = "student_id, tenant_id, admission_number, first_name, last_name, email, programme_id, department_id, class_id, status, created_utc";

const STUDENT_RECORD_SELECT: &str = r#"
    SELECT s.student_id, s.tenant_id, s.admission_number, s.first_name, s.last_name, s.email,
           s.programme_id, s.department_id, s.class_id, s.status, s.created_utc,
           p.name AS programme_name, d.name AS department_name, c.name AS class_name
    FROM students s
    JOIN programmes p ON p.programme_id = s.programme_id
    JOIN departments d ON d.department_id = s.department_id
    LEFT JOIN classes c ON c.class_id = s.class_id
"#;

const FEE_STRUCTURE_COLUMNS: &str = "fee_structure_id, tenant_id, programme_id, academic_year, session, tuition_fee, exam_fee, library_fee, activity_fee, total_fee, is_active, created_utc";

const PAYMENT_COLUMNS: &str = "payment_id, tenant_id, student_id, academic_year, session, amount_paid, payment_method, transaction_ref, status, payment_date, created_utc";

// Filter predicates over `fee_payments f` joined to `students s`, bound as
// $2..$10 in PaymentFilter field order.
const PAYMENT_FILTER: &str = r#"
      AND ($2::varchar IS NULL OR f.academic_year = $2)
      AND ($3::varchar IS NULL OR f.session = $3)
      AND ($4::uuid IS NULL OR f.student_id = $4)
      AND ($5::uuid IS NULL OR s.programme_id = $5)
      AND ($6::uuid IS NULL OR s.department_id = $6)
      AND ($7::varchar IS NULL OR f.status = $7)
      AND ($8::varchar IS NULL OR f.payment_method = $8)
      AND ($9::date IS NULL OR f.payment_date >= $9)
      AND ($10::date IS NULL OR f.payment_date <= $10)
"#;

/// Escapes LIKE wildcards so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{}%", escaped)
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "campus-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl DataStore for Database {
    // =========================================================================
    // Sequential codes
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id, kind = kind.as_str()))]
    async fn highest_code(
        &self,
        tenant_id: Uuid,
        kind: CodeKind,
        prefix: &str,
    ) -> StoreResult<Option<String>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["highest_code"])
            .start_timer();

        // Byte order, independent of the database collation.
        let sql = format!(
            r#"SELECT {column} FROM {table}
               WHERE tenant_id = $1 AND {column} LIKE $2
               ORDER BY {column} COLLATE "C" DESC
               LIMIT 1"#,
            column = kind.column(),
            table = kind.table(),
        );
        let code = sqlx::query_scalar::<_, String>(&sql)
            .bind(tenant_id)
            .bind(like_prefix(prefix))
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(code)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, kind = kind.as_str()))]
    async fn codes_with_prefix(
        &self,
        tenant_id: Uuid,
        kind: CodeKind,
        prefix: &str,
    ) -> StoreResult<Vec<String>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["codes_with_prefix"])
            .start_timer();

        let sql = format!(
            "SELECT {column} FROM {table} WHERE tenant_id = $1 AND {column} LIKE $2",
            column = kind.column(),
            table = kind.table(),
        );
        let codes = sqlx::query_scalar::<_, String>(&sql)
            .bind(tenant_id)
            .bind(like_prefix(prefix))
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(codes)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn advance_counter(
        &self,
        tenant_id: Uuid,
        series_key: &str,
        floor: i64,
    ) -> StoreResult<i64> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["advance_counter"])
            .start_timer();

        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO code_counters (tenant_id, series_key, value)
            VALUES ($1, $2, $3 + 1)
            ON CONFLICT (tenant_id, series_key)
            DO UPDATE SET value = GREATEST(code_counters.value, $3) + 1, updated_utc = NOW()
            RETURNING value
            "#,
        )
        .bind(tenant_id)
        .bind(series_key)
        .bind(floor)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(value)
    }

    // =========================================================================
    // Students
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id, student_id = %student_id))]
    async fn get_student(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
    ) -> StoreResult<Option<StudentRecord>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_student"])
            .start_timer();

        let sql = format!(
            "{} WHERE s.tenant_id = $1 AND s.student_id = $2",
            STUDENT_RECORD_SELECT
        );
        let student = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(tenant_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(student)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_active_students(
        &self,
        tenant_id: Uuid,
        filter: &StudentFilter,
    ) -> StoreResult<Vec<StudentRecord>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_students"])
            .start_timer();

        let sql = format!(
            r#"{}
            WHERE s.tenant_id = $1
              AND s.status = $2
              AND ($3::uuid IS NULL OR s.class_id = $3)
              AND ($4::uuid IS NULL OR s.programme_id = $4)
              AND ($5::uuid IS NULL OR s.department_id = $5)
            ORDER BY s.admission_number
            "#,
            STUDENT_RECORD_SELECT
        );
        let students = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(tenant_id)
            .bind(StudentStatus::Active.as_str())
            .bind(filter.class_id)
            .bind(filter.programme_id)
            .bind(filter.department_id)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(students)
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, admission_number = %input.admission_number))]
    async fn insert_student(&self, input: &CreateStudent) -> StoreResult<Student> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_student"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO students (student_id, tenant_id, admission_number, first_name, last_name, email, programme_id, department_id, class_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            STUDENT_COLUMNS
        );
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.tenant_id)
            .bind(&input.admission_number)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(input.programme_id)
            .bind(input.department_id)
            .bind(input.class_id)
            .bind(StudentStatus::Active.as_str())
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        info!(student_id = %student.student_id, "Student created");

        Ok(student)
    }

    // =========================================================================
    // Tutors and procurement
    // =========================================================================

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, employee_code = %input.employee_code))]
    async fn insert_tutor(&self, input: &CreateTutor) -> StoreResult<Tutor> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_tutor"])
            .start_timer();

        let tutor = sqlx::query_as::<_, Tutor>(
            r#"
            INSERT INTO tutors (tutor_id, tenant_id, employee_code, first_name, last_name, email, department_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING tutor_id, tenant_id, employee_code, first_name, last_name, email, department_id, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(&input.employee_code)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(input.department_id)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        info!(tutor_id = %tutor.tutor_id, "Tutor created");

        Ok(tutor)
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, request_number = %input.request_number))]
    async fn insert_procurement_request(
        &self,
        input: &CreateProcurementRequest,
    ) -> StoreResult<ProcurementRequest> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_procurement_request"])
            .start_timer();

        let request = sqlx::query_as::<_, ProcurementRequest>(
            r#"
            INSERT INTO procurement_requests (request_id, tenant_id, request_number, department_id, title, description, estimated_amount, status, requested_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING request_id, tenant_id, request_number, department_id, title, description, estimated_amount, status, requested_by, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(&input.request_number)
        .bind(input.department_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.estimated_amount)
        .bind(ProcurementStatus::Pending.as_str())
        .bind(&input.requested_by)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        info!(request_id = %request.request_id, "Procurement request created");

        Ok(request)
    }

    // =========================================================================
    // Fee structures
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id, programme_id = %programme_id))]
    async fn find_active_fee_structures(
        &self,
        tenant_id: Uuid,
        programme_id: Uuid,
        academic_year: &str,
        session: &str,
    ) -> StoreResult<Vec<FeeStructure>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_fee_structures"])
            .start_timer();

        // Two rows are enough to tell the caller the data is ambiguous.
        let sql = format!(
            r#"
            SELECT {}
            FROM fee_structures
            WHERE tenant_id = $1 AND programme_id = $2 AND academic_year = $3 AND session = $4 AND is_active
            ORDER BY created_utc DESC
            LIMIT 2
            "#,
            FEE_STRUCTURE_COLUMNS
        );
        let structures = sqlx::query_as::<_, FeeStructure>(&sql)
            .bind(tenant_id)
            .bind(programme_id)
            .bind(academic_year)
            .bind(session)
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(structures)
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, programme_id = %input.programme_id))]
    async fn insert_fee_structure(&self, input: &CreateFeeStructure) -> StoreResult<FeeStructure> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_fee_structure"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO fee_structures (fee_structure_id, tenant_id, programme_id, academic_year, session, tuition_fee, exam_fee, library_fee, activity_fee, total_fee, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
            RETURNING {}
            "#,
            FEE_STRUCTURE_COLUMNS
        );
        let structure = sqlx::query_as::<_, FeeStructure>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.tenant_id)
            .bind(input.programme_id)
            .bind(&input.academic_year)
            .bind(&input.session)
            .bind(input.tuition_fee)
            .bind(input.exam_fee)
            .bind(input.library_fee)
            .bind(input.activity_fee)
            .bind(input.resolved_total())
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        info!(fee_structure_id = %structure.fee_structure_id, "Fee structure created");

        Ok(structure)
    }

    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, fee_structure_id = %fee_structure_id))]
    async fn update_fee_structure(
        &self,
        tenant_id: Uuid,
        fee_structure_id: Uuid,
        patch: &UpdateFeeStructure,
    ) -> StoreResult<Option<FeeStructure>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_fee_structure"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE fee_structures
            SET tuition_fee = COALESCE($3, tuition_fee),
                exam_fee = COALESCE($4, exam_fee),
                library_fee = COALESCE($5, library_fee),
                activity_fee = COALESCE($6, activity_fee),
                total_fee = COALESCE($7, total_fee),
                is_active = COALESCE($8, is_active)
            WHERE tenant_id = $1 AND fee_structure_id = $2
            RETURNING {}
            "#,
            FEE_STRUCTURE_COLUMNS
        );
        let structure = sqlx::query_as::<_, FeeStructure>(&sql)
            .bind(tenant_id)
            .bind(fee_structure_id)
            .bind(patch.tuition_fee)
            .bind(patch.exam_fee)
            .bind(patch.library_fee)
            .bind(patch.activity_fee)
            .bind(patch.total_fee)
            .bind(patch.is_active)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(structure)
    }

    // =========================================================================
    // Fee payments
    // =========================================================================

    #[instrument(skip(self), fields(tenant_id = %tenant_id, student_id = %student_id))]
    async fn list_completed_payments(
        &self,
        tenant_id: Uuid,
        student_id: Uuid,
        academic_year: &str,
        session: &str,
    ) -> StoreResult<Vec<FeePayment>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_completed_payments"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {}
            FROM fee_payments
            WHERE tenant_id = $1 AND student_id = $2 AND academic_year = $3 AND session = $4 AND status = $5
            ORDER BY payment_date
            "#,
            PAYMENT_COLUMNS
        );
        let payments = sqlx::query_as::<_, FeePayment>(&sql)
            .bind(tenant_id)
            .bind(student_id)
            .bind(academic_year)
            .bind(session)
            .bind(PaymentStatus::Completed.as_str())
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self, filter, page), fields(tenant_id = %tenant_id, page = page.page))]
    async fn list_payments(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
        page: &PageRequest,
    ) -> StoreResult<Vec<FeePayment>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let columns = PAYMENT_COLUMNS
            .split(", ")
            .map(|c| format!("f.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {}
            FROM fee_payments f
            JOIN students s ON s.student_id = f.student_id
            WHERE f.tenant_id = $1
            {}
            ORDER BY f.payment_date DESC, f.created_utc DESC
            LIMIT $11 OFFSET $12
            "#,
            columns, PAYMENT_FILTER
        );
        let payments = bind_payment_filter(sqlx::query_as::<_, FeePayment>(&sql), tenant_id, filter)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn count_payments(&self, tenant_id: Uuid, filter: &PaymentFilter) -> StoreResult<i64> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_payments"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM fee_payments f
            JOIN students s ON s.student_id = f.student_id
            WHERE f.tenant_id = $1
            {}
            "#,
            PAYMENT_FILTER
        );
        let (total,) = bind_payment_filter(sqlx::query_as::<_, (i64,)>(&sql), tenant_id, filter)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(total)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    async fn list_payments_with_context(
        &self,
        tenant_id: Uuid,
        filter: &PaymentFilter,
    ) -> StoreResult<Vec<PaymentWithContext>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments_with_context"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT f.payment_id, f.tenant_id, f.student_id, f.academic_year, f.session, f.amount_paid,
                   f.payment_method, f.transaction_ref, f.status, f.payment_date, f.created_utc,
                   s.admission_number, p.name AS programme_name, d.name AS department_name
            FROM fee_payments f
            JOIN students s ON s.student_id = f.student_id
            JOIN programmes p ON p.programme_id = s.programme_id
            JOIN departments d ON d.department_id = s.department_id
            WHERE f.tenant_id = $1
            {}
            ORDER BY f.payment_date DESC
            "#,
            PAYMENT_FILTER
        );
        let payments =
            bind_payment_filter(sqlx::query_as::<_, PaymentWithContext>(&sql), tenant_id, filter)
                .fetch_all(&self.pool)
                .await?;

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, student_id = %input.student_id))]
    async fn insert_fee_payment(&self, input: &CreateFeePayment) -> StoreResult<FeePayment> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_fee_payment"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO fee_payments (payment_id, tenant_id, student_id, academic_year, session, amount_paid, payment_method, transaction_ref, status, payment_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let payment = sqlx::query_as::<_, FeePayment>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.tenant_id)
            .bind(input.student_id)
            .bind(&input.academic_year)
            .bind(&input.session)
            .bind(input.amount_paid)
            .bind(input.payment_method.as_str())
            .bind(&input.transaction_ref)
            .bind(input.status.as_str())
            .bind(input.payment_date)
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        info!(payment_id = %payment.payment_id, "Fee payment recorded");

        Ok(payment)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, payment_id = %payment_id))]
    async fn update_payment_status(
        &self,
        tenant_id: Uuid,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> StoreResult<Option<FeePayment>> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment_status"])
            .start_timer();

        let sql = format!(
            r#"
            UPDATE fee_payments SET status = $3
            WHERE tenant_id = $1 AND payment_id = $2
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let payment = sqlx::query_as::<_, FeePayment>(&sql)
            .bind(tenant_id)
            .bind(payment_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StoreResult<()> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1").execute(&self.pool).await?;

        timer.observe_duration();
        Ok(())
    }
}

/// Binds `$1..$10` of [`PAYMENT_FILTER`] queries.
fn bind_payment_filter<'q, O>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    tenant_id: Uuid,
    filter: &'q PaymentFilter,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    query
        .bind(tenant_id)
        .bind(filter.academic_year.as_deref())
        .bind(filter.session.as_deref())
        .bind(filter.student_id)
        .bind(filter.programme_id)
        .bind(filter.department_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.payment_method.map(|m| m.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("KTYC/TUT/"), "KTYC/TUT/%");
        assert_eq!(like_prefix("A_B%/"), "A\\_B\\%/%");
    }
}
