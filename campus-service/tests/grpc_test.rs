//! Integration tests for the CampusService gRPC surface.
//!
//! The in-memory tests call the service implementation directly. The
//! PostgreSQL tests spawn the full application and are ignored unless
//! `TEST_DATABASE_URL` points at a database.

mod common;

use campus_service::config::CodeConfig;
use campus_service::grpc::proto::campus_service_server::CampusService;
use campus_service::grpc::proto::*;
use campus_service::grpc::CampusServiceImpl;
use chrono::{Datelike, Utc};
use common::{spawn_app, Campus, SESSION, YEAR};
use tonic::{Code, Request};
use uuid::Uuid;

fn service(campus: &Campus) -> CampusServiceImpl {
    CampusServiceImpl::new(campus.data_store(), CodeConfig::default())
}

fn year_suffix() -> String {
    format!("{:02}", Utc::now().year() % 100)
}

fn admit_request(campus: &Campus, first_name: &str, email: &str) -> AdmitStudentRequest {
    AdmitStudentRequest {
        tenant_id: campus.tenant_id.to_string(),
        first_name: first_name.to_string(),
        last_name: "Wekesa".to_string(),
        email: email.to_string(),
        programme_id: campus.programme_id.to_string(),
        department_id: campus.department_id.to_string(),
        class_id: campus.class_id.to_string(),
    }
}

async fn admit(svc: &CampusServiceImpl, campus: &Campus, first_name: &str) -> Student {
    svc.admit_student(Request::new(admit_request(campus, first_name, "")))
        .await
        .unwrap()
        .into_inner()
        .student
        .unwrap()
}

async fn create_fee_structure(svc: &CampusServiceImpl, campus: &Campus) -> FeeStructure {
    svc.create_fee_structure(Request::new(CreateFeeStructureRequest {
        tenant_id: campus.tenant_id.to_string(),
        programme_id: campus.programme_id.to_string(),
        academic_year: YEAR.to_string(),
        session: SESSION.to_string(),
        tuition_fee: "60000".to_string(),
        exam_fee: "15000".to_string(),
        library_fee: String::new(),
        activity_fee: String::new(),
        total_fee: "90000".to_string(),
    }))
    .await
    .unwrap()
    .into_inner()
    .fee_structure
    .unwrap()
}

fn payment_request(
    tenant_id: Uuid,
    student_id: &str,
    amount: &str,
    method: PaymentMethod,
    status: PaymentStatus,
) -> RecordFeePaymentRequest {
    RecordFeePaymentRequest {
        tenant_id: tenant_id.to_string(),
        student_id: student_id.to_string(),
        academic_year: YEAR.to_string(),
        session: SESSION.to_string(),
        amount_paid: amount.to_string(),
        payment_method: method as i32,
        transaction_ref: Uuid::new_v4().to_string(),
        status: status as i32,
        payment_date: "2025-02-01".to_string(),
    }
}

async fn record_payment(
    svc: &CampusServiceImpl,
    campus: &Campus,
    student_id: &str,
    amount: &str,
    status: PaymentStatus,
) -> FeePayment {
    svc.record_fee_payment(Request::new(payment_request(
        campus.tenant_id,
        student_id,
        amount,
        PaymentMethod::MobileMoney,
        status,
    )))
    .await
    .unwrap()
    .into_inner()
    .payment
    .unwrap()
}

fn invoice_request(campus: &Campus, student_id: &str, term: Term) -> GenerateStudentInvoiceRequest {
    GenerateStudentInvoiceRequest {
        tenant_id: campus.tenant_id.to_string(),
        student_id: student_id.to_string(),
        academic_year: YEAR.to_string(),
        session: SESSION.to_string(),
        term: term as i32,
    }
}

// =============================================================================
// Sequential codes
// =============================================================================

#[tokio::test]
async fn admitted_students_get_consecutive_admission_numbers() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    let first = admit(&svc, &campus, "Alice").await;
    let second = admit(&svc, &campus, "Bob").await;

    let suffix = year_suffix();
    assert_eq!(first.admission_number, format!("KTYC/S/1/{}", suffix));
    assert_eq!(second.admission_number, format!("KTYC/S/2/{}", suffix));
    assert_eq!(first.status, StudentStatus::Active as i32);

    let next = svc
        .generate_admission_number(Request::new(GenerateAdmissionNumberRequest {
            tenant_id: campus.tenant_id.to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(next.code, format!("KTYC/S/3/{}", suffix));
}

#[tokio::test]
async fn duplicate_email_is_already_exists() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    svc.admit_student(Request::new(admit_request(&campus, "Alice", "alice@example.com")))
        .await
        .unwrap();
    let status = svc
        .admit_student(Request::new(admit_request(&campus, "Alicia", "alice@example.com")))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::AlreadyExists);
    assert_eq!(status.message(), "Email already registered");
}

#[tokio::test]
async fn unknown_programme_is_not_found() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    let mut request = admit_request(&campus, "Alice", "");
    request.programme_id = Uuid::new_v4().to_string();
    let status = svc.admit_student(Request::new(request)).await.unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "Programme not found");
}

#[tokio::test]
async fn missing_name_is_invalid_argument() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    let mut request = admit_request(&campus, "Alice", "");
    request.last_name = "   ".to_string();
    let status = svc.admit_student(Request::new(request)).await.unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "last_name is required");
}

#[tokio::test]
async fn tutors_and_requests_get_padded_codes() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    let tutor = svc
        .register_tutor(Request::new(RegisterTutorRequest {
            tenant_id: campus.tenant_id.to_string(),
            first_name: "Grace".to_string(),
            last_name: "Wanjiru".to_string(),
            email: String::new(),
            department_id: campus.department_id.to_string(),
        }))
        .await
        .unwrap()
        .into_inner()
        .tutor
        .unwrap();
    assert_eq!(tutor.employee_code, "KTYC/TUT/0001");

    let request = svc
        .create_procurement_request(Request::new(CreateProcurementRequestRequest {
            tenant_id: campus.tenant_id.to_string(),
            department_id: String::new(),
            title: "Lab consumables".to_string(),
            description: String::new(),
            estimated_amount: "12000.50".to_string(),
            requested_by: "bursar".to_string(),
        }))
        .await
        .unwrap()
        .into_inner()
        .request
        .unwrap();
    assert_eq!(
        request.request_number,
        format!("PR/{}/0001", Utc::now().year())
    );
    assert_eq!(request.estimated_amount, "12000.5");
    assert_eq!(request.status, ProcurementStatus::Pending as i32);

    let explicit_year = svc
        .generate_request_number(Request::new(GenerateRequestNumberRequest {
            tenant_id: campus.tenant_id.to_string(),
            year: 2030,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(explicit_year.code, "PR/2030/0001");
}

#[tokio::test]
async fn invalid_inputs_are_rejected() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    let status = svc
        .generate_request_number(Request::new(GenerateRequestNumberRequest {
            tenant_id: campus.tenant_id.to_string(),
            year: -4,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = svc
        .generate_employee_code(Request::new(GenerateEmployeeCodeRequest {
            tenant_id: "not-a-uuid".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "Invalid tenant_id");
}

// =============================================================================
// Fee ledger
// =============================================================================

#[tokio::test]
async fn invoice_over_grpc_uses_decimal_strings() {
    let campus = Campus::new().await;
    let svc = service(&campus);
    create_fee_structure(&svc, &campus).await;
    let student = admit(&svc, &campus, "Alice").await;
    record_payment(&svc, &campus, &student.student_id, "30000", PaymentStatus::Completed).await;

    let invoice = svc
        .generate_student_invoice(Request::new(invoice_request(
            &campus,
            &student.student_id,
            Term::Term1,
        )))
        .await
        .unwrap()
        .into_inner()
        .invoice
        .unwrap();

    assert_eq!(
        invoice.invoice_number,
        format!("INV/{}/{}/TERM1", YEAR, student.admission_number)
    );
    assert_eq!(invoice.term, Term::Term1 as i32);
    let lines: Vec<(&str, &str)> = invoice
        .line_items
        .iter()
        .map(|l| (l.votehead.as_str(), l.amount.as_str()))
        .collect();
    assert_eq!(
        lines,
        vec![("Tuition Fees", "20000"), ("Examination Fees", "5000")]
    );
    assert_eq!(invoice.subtotal, "30000");
    assert_eq!(invoice.total_paid, "30000");
    assert_eq!(invoice.balance, "0");

    let student_block = invoice.student.unwrap();
    assert_eq!(student_block.full_name, "Alice Wekesa");
    assert_eq!(student_block.class_name, "ICT-2025-A");
}

#[tokio::test]
async fn completing_a_pending_payment_reduces_the_balance() {
    let campus = Campus::new().await;
    let svc = service(&campus);
    create_fee_structure(&svc, &campus).await;
    let student = admit(&svc, &campus, "Alice").await;
    let payment =
        record_payment(&svc, &campus, &student.student_id, "10000", PaymentStatus::Pending).await;

    let before = svc
        .generate_student_invoice(Request::new(invoice_request(
            &campus,
            &student.student_id,
            Term::Term2,
        )))
        .await
        .unwrap()
        .into_inner()
        .invoice
        .unwrap();
    assert_eq!(before.balance, "30000");

    let updated = svc
        .update_payment_status(Request::new(UpdatePaymentStatusRequest {
            tenant_id: campus.tenant_id.to_string(),
            payment_id: payment.payment_id.clone(),
            status: PaymentStatus::Completed as i32,
        }))
        .await
        .unwrap()
        .into_inner()
        .payment
        .unwrap();
    assert_eq!(updated.status, PaymentStatus::Completed as i32);

    let after = svc
        .generate_student_invoice(Request::new(invoice_request(
            &campus,
            &student.student_id,
            Term::Term2,
        )))
        .await
        .unwrap()
        .into_inner()
        .invoice
        .unwrap();
    assert_eq!(after.balance, "20000");
}

#[tokio::test]
async fn invoice_without_fee_structure_is_not_found() {
    let campus = Campus::new().await;
    let svc = service(&campus);
    let student = admit(&svc, &campus, "Alice").await;

    let status = svc
        .generate_student_invoice(Request::new(invoice_request(
            &campus,
            &student.student_id,
            Term::Term1,
        )))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(
        status.message(),
        "No active fee structure found for this programme"
    );
}

#[tokio::test]
async fn unspecified_term_is_invalid_argument() {
    let campus = Campus::new().await;
    let svc = service(&campus);

    let status = svc
        .generate_bulk_invoices(Request::new(GenerateBulkInvoicesRequest {
            tenant_id: campus.tenant_id.to_string(),
            academic_year: YEAR.to_string(),
            session: SESSION.to_string(),
            term: Term::Unspecified as i32,
            class_id: String::new(),
            programme_id: String::new(),
            department_id: String::new(),
        }))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn zero_payment_is_rejected() {
    let campus = Campus::new().await;
    let svc = service(&campus);
    let student = admit(&svc, &campus, "Alice").await;

    let status = svc
        .record_fee_payment(Request::new(payment_request(
            campus.tenant_id,
            &student.student_id,
            "0",
            PaymentMethod::Cash,
            PaymentStatus::Completed,
        )))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "amount_paid must be greater than zero");
}

#[tokio::test]
async fn payments_are_listed_in_pages() {
    let campus = Campus::new().await;
    let svc = service(&campus);
    let student = admit(&svc, &campus, "Alice").await;
    for amount in ["1000", "2000", "3000"] {
        record_payment(&svc, &campus, &student.student_id, amount, PaymentStatus::Completed).await;
    }

    let page = svc
        .list_fee_payments(Request::new(ListFeePaymentsRequest {
            tenant_id: campus.tenant_id.to_string(),
            filter: Some(PaymentFilter {
                student_id: student.student_id.clone(),
                ..Default::default()
            }),
            page: 2,
            page_size: 2,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(page.payments.len(), 1);
    let pagination = page.pagination.unwrap();
    assert_eq!(pagination.total, 3);
    assert_eq!(pagination.total_pages, 2);
    assert_eq!(pagination.current_page, 2);
}

#[tokio::test]
async fn payment_statistics_are_bucketed_by_key() {
    let campus = Campus::new().await;
    let svc = service(&campus);
    let student = admit(&svc, &campus, "Alice").await;
    record_payment(&svc, &campus, &student.student_id, "1500", PaymentStatus::Completed).await;
    svc.record_fee_payment(Request::new(payment_request(
        campus.tenant_id,
        &student.student_id,
        "500",
        PaymentMethod::Cash,
        PaymentStatus::Completed,
    )))
    .await
    .unwrap();

    let summary = svc
        .get_payment_statistics(Request::new(GetPaymentStatisticsRequest {
            tenant_id: campus.tenant_id.to_string(),
            filter: None,
        }))
        .await
        .unwrap()
        .into_inner()
        .summary
        .unwrap();

    assert_eq!(summary.total_payments, 2);
    assert_eq!(summary.total_amount, "2000");
    let methods: Vec<(&str, i64, &str)> = summary
        .by_method
        .iter()
        .map(|b| (b.key.as_str(), b.count, b.amount.as_str()))
        .collect();
    assert_eq!(methods, vec![("CASH", 1, "500"), ("MOBILE_MONEY", 1, "1500")]);
    assert_eq!(summary.by_department[0].key, "Computing");
}

// =============================================================================
// PostgreSQL end to end
// =============================================================================

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn postgres_admission_and_invoice_flow() {
    let app = spawn_app().await;
    let mut client = app.grpc_client.clone();
    let (department_id, programme_id) = app.seed_programme().await;
    let tenant_id = app.tenant_id.to_string();

    client
        .create_fee_structure(CreateFeeStructureRequest {
            tenant_id: tenant_id.clone(),
            programme_id: programme_id.to_string(),
            academic_year: YEAR.to_string(),
            session: SESSION.to_string(),
            tuition_fee: "60000".to_string(),
            exam_fee: "15000".to_string(),
            library_fee: String::new(),
            activity_fee: String::new(),
            total_fee: "90000".to_string(),
        })
        .await
        .unwrap();

    let mut admission_numbers = Vec::new();
    let mut last_student = None;
    for name in ["Alice", "Bob"] {
        let student = client
            .admit_student(AdmitStudentRequest {
                tenant_id: tenant_id.clone(),
                first_name: name.to_string(),
                last_name: "Wekesa".to_string(),
                email: String::new(),
                programme_id: programme_id.to_string(),
                department_id: department_id.to_string(),
                class_id: String::new(),
            })
            .await
            .unwrap()
            .into_inner()
            .student
            .unwrap();
        admission_numbers.push(student.admission_number.clone());
        last_student = Some(student);
    }
    let suffix = year_suffix();
    assert_eq!(
        admission_numbers,
        vec![format!("KTYC/S/1/{}", suffix), format!("KTYC/S/2/{}", suffix)]
    );

    let student = last_student.unwrap();
    client
        .record_fee_payment(payment_request(
            app.tenant_id,
            &student.student_id,
            "35000",
            PaymentMethod::BankTransfer,
            PaymentStatus::Completed,
        ))
        .await
        .unwrap();

    let invoice = client
        .generate_student_invoice(GenerateStudentInvoiceRequest {
            tenant_id: tenant_id.clone(),
            student_id: student.student_id.clone(),
            academic_year: YEAR.to_string(),
            session: SESSION.to_string(),
            term: Term::Term3 as i32,
        })
        .await
        .unwrap()
        .into_inner()
        .invoice
        .unwrap();

    assert_eq!(invoice.subtotal, "30000");
    assert_eq!(invoice.balance, "-5000");

    let listing = client
        .list_fee_payments(ListFeePaymentsRequest {
            tenant_id: tenant_id.clone(),
            filter: Some(PaymentFilter {
                student_id: student.student_id.clone(),
                ..Default::default()
            }),
            page: 1,
            page_size: 10,
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(listing.payments.len(), 1);
    assert_eq!(listing.pagination.unwrap().total, 1);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn postgres_health_endpoints_respond() {
    let app = spawn_app().await;
    let base = format!("http://127.0.0.1:{}", app.http_port);

    let health = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body["service"], "campus-service");

    let ready = reqwest::get(format!("{}/ready", base)).await.unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::OK);

    let metrics = reqwest::get(format!("{}/metrics", base)).await.unwrap();
    assert_eq!(metrics.status(), reqwest::StatusCode::OK);
}
