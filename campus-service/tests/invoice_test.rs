//! Integration tests for term invoices and bulk invoicing.

mod common;

use campus_service::ledger::{FeeLedgerEngine, LedgerError};
use campus_service::models::{
    BulkInvoiceRequest, InvoiceLineItem, PaymentMethod, PaymentStatus, StudentFilter,
    StudentStatus, Term, UpdateFeeStructure,
};
use campus_service::services::DataStore;
use common::{date, Campus, SESSION, YEAR};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn bulk_request(campus: &Campus, filter: StudentFilter) -> BulkInvoiceRequest {
    BulkInvoiceRequest {
        tenant_id: campus.tenant_id,
        academic_year: YEAR.to_string(),
        session: SESSION.to_string(),
        term: Term::Term1,
        filter,
        invoice_date: date(2025, 1, 15),
    }
}

#[tokio::test]
async fn invoice_charges_a_third_of_the_fee_structure() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let student = campus.student("Amina", "Njeri").await;
    campus
        .payment(student.student_id, dec!(30000), PaymentMethod::MobileMoney, PaymentStatus::Completed)
        .await;

    let engine = FeeLedgerEngine::new(campus.data_store());
    let invoice = engine
        .build_invoice(
            campus.tenant_id,
            student.student_id,
            YEAR,
            SESSION,
            Term::Term1,
            date(2025, 1, 15),
        )
        .await
        .unwrap();

    assert_eq!(invoice.invoice_number, "INV/2025/KTYC/S/1/25/TERM1");
    assert_eq!(invoice.due_date, date(2025, 2, 14));
    assert_eq!(
        invoice.line_items,
        vec![
            InvoiceLineItem::new("Tuition Fees", dec!(20000)),
            InvoiceLineItem::new("Examination Fees", dec!(5000)),
        ]
    );
    assert_eq!(invoice.subtotal, dec!(30000));
    assert_eq!(invoice.total_paid, dec!(30000));
    assert_eq!(invoice.balance, Decimal::ZERO);

    assert_eq!(invoice.student.full_name, "Amina Njeri");
    assert_eq!(invoice.student.programme, "Diploma in ICT");
    assert_eq!(invoice.student.department, "Computing");
    assert_eq!(invoice.student.class_name.as_deref(), Some("ICT-2025-A"));
}

#[tokio::test]
async fn overpayment_gives_negative_balance() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let student = campus.student("Kevin", "Mutua").await;
    campus
        .payment(student.student_id, dec!(35000), PaymentMethod::Cash, PaymentStatus::Completed)
        .await;

    let engine = FeeLedgerEngine::new(campus.data_store());
    let invoice = engine
        .build_invoice(
            campus.tenant_id,
            student.student_id,
            YEAR,
            SESSION,
            Term::Term2,
            date(2025, 5, 2),
        )
        .await
        .unwrap();

    assert_eq!(invoice.balance, dec!(-5000));
}

#[tokio::test]
async fn only_completed_payments_are_credited() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let student = campus.student("Faith", "Chebet").await;
    for status in [
        PaymentStatus::Pending,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ] {
        campus
            .payment(student.student_id, dec!(10000), PaymentMethod::Card, status)
            .await;
    }
    campus
        .payment(student.student_id, dec!(2500.50), PaymentMethod::Cash, PaymentStatus::Completed)
        .await;

    let engine = FeeLedgerEngine::new(campus.data_store());
    let invoice = engine
        .build_invoice(
            campus.tenant_id,
            student.student_id,
            YEAR,
            SESSION,
            Term::Term1,
            date(2025, 1, 15),
        )
        .await
        .unwrap();

    assert_eq!(invoice.total_paid, dec!(2500.50));
    assert_eq!(invoice.balance, dec!(27499.50));
}

#[tokio::test]
async fn payments_count_against_every_term_of_the_session() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let student = campus.student("Peter", "Kamau").await;
    campus
        .payment(student.student_id, dec!(12000), PaymentMethod::BankTransfer, PaymentStatus::Completed)
        .await;

    let engine = FeeLedgerEngine::new(campus.data_store());
    for term in [Term::Term1, Term::Term2, Term::Term3] {
        let invoice = engine
            .build_invoice(
                campus.tenant_id,
                student.student_id,
                YEAR,
                SESSION,
                term,
                date(2025, 1, 15),
            )
            .await
            .unwrap();
        assert_eq!(invoice.total_paid, dec!(12000));
        assert_eq!(invoice.balance, dec!(18000));
        assert!(invoice.invoice_number.ends_with(term.as_str()));
    }
}

#[tokio::test]
async fn missing_student_is_reported() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let student = campus.student("Mary", "Akinyi").await;

    let engine = FeeLedgerEngine::new(campus.data_store());

    let err = engine
        .build_invoice(
            campus.tenant_id,
            Uuid::new_v4(),
            YEAR,
            SESSION,
            Term::Term1,
            date(2025, 1, 15),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::StudentNotFound));

    // Students of another tenant are invisible.
    let err = engine
        .build_invoice(
            Uuid::new_v4(),
            student.student_id,
            YEAR,
            SESSION,
            Term::Term1,
            date(2025, 1, 15),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::StudentNotFound));
}

#[tokio::test]
async fn inactive_fee_structure_is_not_used() {
    let campus = Campus::new().await;
    let structure = campus.standard_fee_structure().await;
    let student = campus.student("James", "Omondi").await;

    campus
        .store
        .update_fee_structure(
            campus.tenant_id,
            structure.fee_structure_id,
            &UpdateFeeStructure {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let engine = FeeLedgerEngine::new(campus.data_store());
    let err = engine
        .build_invoice(
            campus.tenant_id,
            student.student_id,
            YEAR,
            SESSION,
            Term::Term1,
            date(2025, 1, 15),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NoActiveFeeStructure));
    assert_eq!(
        err.to_string(),
        "No active fee structure found for this programme"
    );
}

#[tokio::test]
async fn newest_active_structure_wins() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    campus
        .fee_structure(campus.programme_id, dec!(120000), None, None)
        .await;
    let student = campus.student("Ruth", "Wambui").await;

    let engine = FeeLedgerEngine::new(campus.data_store());
    let invoice = engine
        .build_invoice(
            campus.tenant_id,
            student.student_id,
            YEAR,
            SESSION,
            Term::Term1,
            date(2025, 1, 15),
        )
        .await
        .unwrap();

    assert_eq!(invoice.subtotal, dec!(40000));
    assert_eq!(
        invoice.line_items,
        vec![InvoiceLineItem::new("Tuition Fees", dec!(40000))]
    );
}

#[tokio::test]
async fn bulk_run_reports_failures_without_stopping() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let unfunded = campus
        .store
        .add_programme(campus.tenant_id, "Certificate in Plumbing")
        .await;

    for i in 0..9 {
        campus.student("Student", &format!("No{}", i)).await;
    }
    let orphan = campus.student_in("Odd", "One", unfunded).await;

    let engine = FeeLedgerEngine::new(campus.data_store());
    let result = engine
        .build_bulk_invoices(&bulk_request(&campus, StudentFilter::default()))
        .await
        .unwrap();

    assert_eq!(result.total, 10);
    assert_eq!(result.successful, 9);
    assert_eq!(result.failed, 1);
    assert_eq!(result.invoices.len(), 9);
    assert_eq!(result.failures.len(), 1);

    let failure = &result.failures[0];
    assert_eq!(failure.student_id, orphan.student_id);
    assert_eq!(failure.admission_number, orphan.admission_number);
    assert_eq!(
        failure.error,
        "No active fee structure found for this programme"
    );
    assert!(result
        .invoices
        .iter()
        .all(|invoice| invoice.subtotal == dec!(30000)));
}

#[tokio::test]
async fn bulk_run_skips_inactive_students_and_honours_filters() {
    let campus = Campus::new().await;
    campus.standard_fee_structure().await;
    let other_programme = campus
        .store
        .add_programme(campus.tenant_id, "Certificate in Plumbing")
        .await;
    campus
        .fee_structure(other_programme, dec!(30000), None, None)
        .await;

    let active = campus.student("Active", "Student").await;
    let withdrawn = campus.student("Withdrawn", "Student").await;
    let plumber = campus.student_in("Plumbing", "Student", other_programme).await;
    campus
        .store
        .set_student_status(withdrawn.student_id, StudentStatus::Withdrawn)
        .await;

    let engine = FeeLedgerEngine::new(campus.data_store());

    let everyone = engine
        .build_bulk_invoices(&bulk_request(&campus, StudentFilter::default()))
        .await
        .unwrap();
    assert_eq!(everyone.total, 2);
    assert_eq!(everyone.successful, 2);
    assert!(everyone
        .invoices
        .iter()
        .all(|invoice| invoice.student.student_id != withdrawn.student_id));

    let ict_only = engine
        .build_bulk_invoices(&bulk_request(
            &campus,
            StudentFilter {
                programme_id: Some(campus.programme_id),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
    assert_eq!(ict_only.total, 1);
    assert_eq!(ict_only.invoices[0].student.student_id, active.student_id);

    let plumbing = engine
        .build_bulk_invoices(&bulk_request(
            &campus,
            StudentFilter {
                programme_id: Some(other_programme),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
    assert_eq!(plumbing.invoices[0].student.student_id, plumber.student_id);
    assert_eq!(plumbing.invoices[0].subtotal, dec!(10000));
}

#[tokio::test]
async fn empty_selection_is_an_empty_result() {
    let campus = Campus::new().await;
    let engine = FeeLedgerEngine::new(campus.data_store());

    let result = engine
        .build_bulk_invoices(&bulk_request(
            &campus,
            StudentFilter {
                class_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    assert_eq!(result.total, 0);
    assert_eq!(result.successful, 0);
    assert_eq!(result.failed, 0);
    assert!(result.invoices.is_empty());
}
