use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{AllocationMode, CodeKind, CodeOrdering, CodeSeries};
use crate::services::metrics::record_code_issued;
use crate::services::store::{DataStore, StoreError};

#[derive(Debug, Error)]
pub enum CodeError {
    #[error("Failed to generate {kind}")]
    Generate {
        kind: CodeKind,
        #[source]
        source: StoreError,
    },

    /// The insert that was meant to persist the code failed.
    #[error("Failed to save record with new {kind}")]
    Insert {
        kind: CodeKind,
        #[source]
        source: StoreError,
    },
}

impl CodeError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            CodeError::Generate { source, .. } | CodeError::Insert { source, .. } => source,
        }
    }
}

/// Derives the next code of a series from what is already stored.
///
/// The generator never retries on its own; see [`with_code_retry`].
#[derive(Clone)]
pub struct SequentialCodeGenerator {
    store: Arc<dyn DataStore>,
    mode: AllocationMode,
}

impl SequentialCodeGenerator {
    pub fn new(store: Arc<dyn DataStore>, mode: AllocationMode) -> Self {
        Self { store, mode }
    }

    #[instrument(skip(self, series), fields(kind = series.kind.as_str(), prefix = %series.prefix, mode = self.mode.as_str()))]
    pub async fn next(&self, tenant_id: Uuid, series: &CodeSeries) -> Result<String, CodeError> {
        let highest = self
            .highest_counter(tenant_id, series)
            .await
            .map_err(|source| CodeError::Generate {
                kind: series.kind,
                source,
            })?;

        let counter = match self.mode {
            AllocationMode::Scan => highest.checked_add(1).unwrap_or_else(|| {
                warn!(highest = highest, "Stored counter is out of range, restarting series at 1");
                1
            }),
            AllocationMode::Counter => self
                .store
                .advance_counter(tenant_id, series.counter_key(), highest)
                .await
                .map_err(|source| CodeError::Generate {
                    kind: series.kind,
                    source,
                })?,
        };

        let code = series.format(counter);
        record_code_issued(series.kind.as_str(), self.mode.as_str());
        info!(code = %code, "Code generated");

        Ok(code)
    }

    /// Highest counter already used in the series. 0 when the series is empty
    /// or the stored code cannot be parsed.
    async fn highest_counter(&self, tenant_id: Uuid, series: &CodeSeries) -> Result<i64, StoreError> {
        match series.ordering {
            CodeOrdering::Lexicographic => {
                let Some(code) = self
                    .store
                    .highest_code(tenant_id, series.kind, &series.prefix)
                    .await?
                else {
                    return Ok(0);
                };
                Ok(series.extract(&code).unwrap_or_else(|| {
                    warn!(code = %code, "Stored code is malformed, restarting series at 1");
                    0
                }))
            }
            CodeOrdering::Numeric => {
                let codes = self
                    .store
                    .codes_with_prefix(tenant_id, series.kind, &series.prefix)
                    .await?;
                let mut highest = 0;
                for code in &codes {
                    match series.extract(code) {
                        Some(value) => highest = highest.max(value),
                        None => warn!(code = %code, "Skipping malformed stored code"),
                    }
                }
                Ok(highest)
            }
        }
    }
}

/// Generates a code and hands it to `insert`, regenerating and retrying when
/// the insert loses a race on the code's unique constraint. Any other failure,
/// or exhausting `max_attempts`, is returned as [`CodeError::Insert`].
pub async fn with_code_retry<T, F, Fut>(
    generator: &SequentialCodeGenerator,
    tenant_id: Uuid,
    series: &CodeSeries,
    max_attempts: u32,
    mut insert: F,
) -> Result<T, CodeError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let code = generator.next(tenant_id, series).await?;

        match insert(code.clone()).await {
            Ok(value) => return Ok(value),
            Err(err)
                if attempt < max_attempts
                    && err.is_unique_violation_of(series.kind.unique_constraint()) =>
            {
                warn!(
                    code = %code,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    "Generated code already taken, retrying"
                );
                attempt += 1;
            }
            Err(source) => {
                return Err(CodeError::Insert {
                    kind: series.kind,
                    source,
                })
            }
        }
    }
}
