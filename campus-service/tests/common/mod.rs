//! Common test utilities for campus-service integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use campus_service::config::{CampusConfig, CodeConfig, DatabaseConfig};
use campus_service::grpc::proto::campus_service_client::CampusServiceClient;
use campus_service::models::{
    CreateFeePayment, CreateFeeStructure, CreateStudent, FeePayment, FeeStructure, PaymentMethod,
    PaymentStatus, Student,
};
use campus_service::services::{DataStore, InMemoryStore};
use campus_service::startup::Application;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::config::Config as CommonConfig;
use tonic::transport::Channel;
use uuid::Uuid;

static INIT: Once = Once::new();

pub const YEAR: &str = "2025";
pub const SESSION: &str = "JAN-APR";

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,campus_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One tenant with a department, a programme and a class, backed by the
/// in-memory store.
pub struct Campus {
    pub store: Arc<InMemoryStore>,
    pub tenant_id: Uuid,
    pub department_id: Uuid,
    pub programme_id: Uuid,
    pub class_id: Uuid,
    next_admission: std::sync::atomic::AtomicU32,
}

impl Campus {
    pub async fn new() -> Self {
        init_tracing();

        let store = Arc::new(InMemoryStore::new());
        let tenant_id = Uuid::new_v4();
        let department_id = store.add_department(tenant_id, "Computing").await;
        let programme_id = store.add_programme(tenant_id, "Diploma in ICT").await;
        let class_id = store.add_class(tenant_id, "ICT-2025-A").await;

        Self {
            store,
            tenant_id,
            department_id,
            programme_id,
            class_id,
            next_admission: std::sync::atomic::AtomicU32::new(1),
        }
    }

    pub fn data_store(&self) -> Arc<dyn DataStore> {
        self.store.clone()
    }

    /// Inserts a student in the default programme with the next admission
    /// number.
    pub async fn student(&self, first_name: &str, last_name: &str) -> Student {
        self.student_in(first_name, last_name, self.programme_id).await
    }

    pub async fn student_in(&self, first_name: &str, last_name: &str, programme_id: Uuid) -> Student {
        let n = self
            .next_admission
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.store
            .insert_student(&CreateStudent {
                tenant_id: self.tenant_id,
                admission_number: format!("KTYC/S/{}/25", n),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: None,
                programme_id,
                department_id: self.department_id,
                class_id: Some(self.class_id),
            })
            .await
            .expect("Failed to insert student")
    }

    /// Tuition 60000 and exam 15000 against a total of 90000.
    pub async fn standard_fee_structure(&self) -> FeeStructure {
        self.fee_structure(
            self.programme_id,
            Decimal::from(60000),
            Some(Decimal::from(15000)),
            Some(Decimal::from(90000)),
        )
        .await
    }

    pub async fn fee_structure(
        &self,
        programme_id: Uuid,
        tuition_fee: Decimal,
        exam_fee: Option<Decimal>,
        total_fee: Option<Decimal>,
    ) -> FeeStructure {
        self.store
            .insert_fee_structure(&CreateFeeStructure {
                tenant_id: self.tenant_id,
                programme_id,
                academic_year: YEAR.to_string(),
                session: SESSION.to_string(),
                tuition_fee,
                exam_fee,
                library_fee: None,
                activity_fee: None,
                total_fee,
            })
            .await
            .expect("Failed to insert fee structure")
    }

    pub async fn payment(
        &self,
        student_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        status: PaymentStatus,
    ) -> FeePayment {
        self.payment_on(student_id, amount, method, status, date(2025, 2, 1))
            .await
    }

    pub async fn payment_on(
        &self,
        student_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        status: PaymentStatus,
        payment_date: NaiveDate,
    ) -> FeePayment {
        self.store
            .insert_fee_payment(&CreateFeePayment {
                tenant_id: self.tenant_id,
                student_id,
                academic_year: YEAR.to_string(),
                session: SESSION.to_string(),
                amount_paid: amount,
                payment_method: method,
                transaction_ref: Uuid::new_v4().to_string(),
                status,
                payment_date,
            })
            .await
            .expect("Failed to insert payment")
    }
}

// =============================================================================
// PostgreSQL end-to-end harness
// =============================================================================

/// Test configuration pointing at `TEST_DATABASE_URL`.
fn test_config() -> CampusConfig {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run the PostgreSQL tests");

    CampusConfig {
        common: CommonConfig {
            port: 0,
            ..Default::default()
        },
        service_name: "campus-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
        codes: CodeConfig::default(),
    }
}

/// Test application wrapper.
pub struct TestApp {
    pub grpc_client: CampusServiceClient<Channel>,
    pub pool: sqlx::PgPool,
    pub tenant_id: Uuid,
    pub http_port: u16,
    pub grpc_port: u16,
}

impl TestApp {
    /// Seeds a department and a programme for this app's tenant.
    pub async fn seed_programme(&self) -> (Uuid, Uuid) {
        let department_id = Uuid::new_v4();
        let programme_id = Uuid::new_v4();

        sqlx::query("INSERT INTO departments (department_id, tenant_id, name) VALUES ($1, $2, $3)")
            .bind(department_id)
            .bind(self.tenant_id)
            .bind("Computing")
            .execute(&self.pool)
            .await
            .expect("Failed to seed department");

        sqlx::query(
            "INSERT INTO programmes (programme_id, tenant_id, department_id, name) VALUES ($1, $2, $3, $4)",
        )
        .bind(programme_id)
        .bind(self.tenant_id)
        .bind(department_id)
        .bind("Diploma in ICT")
        .execute(&self.pool)
        .await
        .expect("Failed to seed programme");

        (department_id, programme_id)
    }
}

/// Spawn a test application and return the gRPC client with a unique tenant ID.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let app = Application::build(test_config())
        .await
        .expect("Failed to build application");

    let http_port = app.http_port();
    let grpc_port = app.grpc_port();
    let pool = app.db().pool().clone();
    let grpc_addr = format!("http://127.0.0.1:{}", grpc_port);

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let grpc_client = {
        let mut attempts = 0;
        loop {
            match CampusServiceClient::connect(grpc_addr.clone()).await {
                Ok(client) => break client,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Failed to connect gRPC client after 20 attempts: {}", e),
            }
        }
    };

    TestApp {
        grpc_client,
        pool,
        tenant_id: Uuid::new_v4(),
        http_port,
        grpc_port,
    }
}
