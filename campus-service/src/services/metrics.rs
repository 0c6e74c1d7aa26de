//! Prometheus metrics for campus-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for gRPC requests by method and status.
pub static GRPC_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "campus_grpc_requests_total",
        "Total number of gRPC requests",
        &["method", "status"]
    )
    .expect("Failed to register GRPC_REQUESTS")
});

/// Histogram for gRPC request duration by method.
pub static GRPC_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "campus_grpc_request_duration_seconds",
        "gRPC request duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register GRPC_REQUEST_DURATION")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "campus_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Codes handed out, by series and allocation mode.
pub static CODES_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "campus_codes_issued_total",
        "Total number of sequential codes generated",
        &["series", "mode"]
    )
    .expect("Failed to register CODES_ISSUED")
});

pub static INVOICES_GENERATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "campus_invoices_generated_total",
        "Total number of invoice builds by outcome",
        &["outcome"]
    )
    .expect("Failed to register INVOICES_GENERATED")
});

pub static PAYMENTS_RECORDED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "campus_fee_payments_recorded_total",
        "Total number of fee payments recorded",
        &["method", "status"]
    )
    .expect("Failed to register PAYMENTS_RECORDED")
});

/// Sum of recorded fee amounts by method. Floating point, for dashboards only.
pub static PAYMENT_AMOUNTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "campus_fee_payment_amount_total",
        "Sum of recorded fee payment amounts",
        &["method"]
    )
    .expect("Failed to register PAYMENT_AMOUNTS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "campus_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&GRPC_REQUESTS);
    Lazy::force(&GRPC_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&CODES_ISSUED);
    Lazy::force(&INVOICES_GENERATED);
    Lazy::force(&PAYMENTS_RECORDED);
    Lazy::force(&PAYMENT_AMOUNTS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_grpc_request(method: &str, status: &str) {
    GRPC_REQUESTS.with_label_values(&[method, status]).inc();
}

pub fn record_grpc_request_duration(method: &str, duration_secs: f64) {
    GRPC_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

pub fn record_code_issued(series: &str, mode: &str) {
    CODES_ISSUED.with_label_values(&[series, mode]).inc();
}

pub fn record_invoice(outcome: &str) {
    INVOICES_GENERATED.with_label_values(&[outcome]).inc();
}

pub fn record_payment(method: &str, status: &str, amount: f64) {
    PAYMENTS_RECORDED.with_label_values(&[method, status]).inc();
    PAYMENT_AMOUNTS.with_label_values(&[method]).inc_by(amount);
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
