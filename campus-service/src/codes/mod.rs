//! Sequential human-readable codes: admission numbers, employee codes and
//! procurement request numbers.
//!
//! A code is `<PREFIX>/<DIGITS>` or `<PREFIX>/<DIGITS>/<SUFFIX>`. The next code
//! in a series is derived from the highest stored code sharing the prefix.

mod generator;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

pub use generator::{with_code_retry, CodeError, SequentialCodeGenerator};

pub const DEFAULT_ADMISSION_PREFIX: &str = "KTYC/S";
pub const DEFAULT_EMPLOYEE_PREFIX: &str = "KTYC/TUT";
pub const DEFAULT_REQUEST_PREFIX: &str = "PR";

/// Counters wider than this are treated as malformed, which keeps `+ 1` in
/// range of `i64`.
pub const MAX_COUNTER_DIGITS: usize = 18;

static BARE_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,18})$").expect("bare counter pattern is valid"));

static SUFFIXED_COUNTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,18})(?:/[0-9]{2})?$").expect("suffixed counter pattern is valid")
});

/// Which record type a series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    AdmissionNumber,
    EmployeeCode,
    RequestNumber,
}

impl CodeKind {
    /// Metric and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::AdmissionNumber => "admission_number",
            CodeKind::EmployeeCode => "employee_code",
            CodeKind::RequestNumber => "request_number",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            CodeKind::AdmissionNumber => "students",
            CodeKind::EmployeeCode => "tutors",
            CodeKind::RequestNumber => "procurement_requests",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            CodeKind::AdmissionNumber => "admission_number",
            CodeKind::EmployeeCode => "employee_code",
            CodeKind::RequestNumber => "request_number",
        }
    }

    /// Name of the unique constraint guarding the code column.
    pub fn unique_constraint(&self) -> &'static str {
        match self {
            CodeKind::AdmissionNumber => "students_admission_number_key",
            CodeKind::EmployeeCode => "tutors_employee_code_key",
            CodeKind::RequestNumber => "procurement_requests_request_number_key",
        }
    }
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CodeKind::AdmissionNumber => "admission number",
            CodeKind::EmployeeCode => "employee code",
            CodeKind::RequestNumber => "request number",
        })
    }
}

/// How the highest existing code is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeOrdering {
    /// Store orders the code text descending and returns the first row. Only
    /// correct while every code in the series has the same width.
    #[default]
    Lexicographic,
    /// Every matching code is parsed and the numeric maximum is taken.
    Numeric,
}

impl CodeOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeOrdering::Lexicographic => "lexicographic",
            CodeOrdering::Numeric => "numeric",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lexicographic" => Some(CodeOrdering::Lexicographic),
            "numeric" => Some(CodeOrdering::Numeric),
            _ => None,
        }
    }
}

/// How the next counter value is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationMode {
    /// Read the highest code and add one. Two concurrent callers can get the
    /// same code; the unique constraint on insert catches it.
    #[default]
    Scan,
    /// Bump a per-prefix counter row atomically, floored at the scanned
    /// maximum.
    Counter,
}

impl AllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::Scan => "scan",
            AllocationMode::Counter => "counter",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scan" => Some(AllocationMode::Scan),
            "counter" => Some(AllocationMode::Counter),
            _ => None,
        }
    }
}

/// A code series: where codes live and how they look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSeries {
    pub kind: CodeKind,
    /// Storage filter, always ending in `/`.
    pub prefix: String,
    /// Zero-pad width of the counter. 0 leaves it unpadded.
    pub width: usize,
    /// Fixed trailing segment appended after the counter.
    pub suffix: Option<String>,
    pub ordering: CodeOrdering,
}

impl CodeSeries {
    /// `KTYC/S/{n}/{yy}`, where `yy` is the year of `today`.
    pub fn admission(prefix: &str, today: NaiveDate, ordering: CodeOrdering) -> Self {
        Self {
            kind: CodeKind::AdmissionNumber,
            prefix: normalize_prefix(prefix),
            width: 0,
            suffix: Some(format!("{:02}", today.year().rem_euclid(100))),
            ordering,
        }
    }

    /// `KTYC/TUT/{nnnn}`.
    pub fn employee(prefix: &str) -> Self {
        Self {
            kind: CodeKind::EmployeeCode,
            prefix: normalize_prefix(prefix),
            width: 4,
            suffix: None,
            ordering: CodeOrdering::Lexicographic,
        }
    }

    /// `PR/{yyyy}/{nnnn}`. The year is part of the prefix, so each year
    /// restarts at 1.
    pub fn request(prefix: &str, year: i32) -> Self {
        Self {
            kind: CodeKind::RequestNumber,
            prefix: format!("{}{}/", normalize_prefix(prefix), year),
            width: 4,
            suffix: None,
            ordering: CodeOrdering::Lexicographic,
        }
    }

    /// Counter embedded in a stored code, or `None` when the code does not
    /// have the expected shape. Suffixed series accept any two-digit suffix,
    /// so earlier years still count.
    pub fn extract(&self, code: &str) -> Option<i64> {
        let rest = code.strip_prefix(&self.prefix)?;
        let pattern = if self.suffix.is_some() {
            &SUFFIXED_COUNTER
        } else {
            &BARE_COUNTER
        };
        extract_counter(rest, pattern)
    }

    pub fn format(&self, counter: i64) -> String {
        format_code(&self.prefix, counter, self.width, self.suffix.as_deref())
    }

    /// Key of the counter row used by [`AllocationMode::Counter`].
    pub fn counter_key(&self) -> &str {
        &self.prefix
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    format!("{}/", trimmed)
}

/// First capture of `pattern` over the whole of `rest`, as a number.
fn extract_counter(rest: &str, pattern: &Regex) -> Option<i64> {
    pattern
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<i64>().ok())
}

/// `prefix` (ending in `/`) + zero-padded counter + optional `/suffix`.
pub fn format_code(prefix: &str, counter: i64, width: usize, suffix: Option<&str>) -> String {
    let mut code = format!("{}{:0width$}", prefix, counter, width = width);
    if let Some(suffix) = suffix {
        code.push('/');
        code.push_str(suffix);
    }
    code
}
