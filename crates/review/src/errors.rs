//! Error and retry-policy types for the review-sheet domain.
//!
//! [`SyncError`] covers every condition that aborts a cycle. Port
//! implementations (issue source, sheet store) report their failures as
//! [`ServiceError`]; the domain wraps them with the context of what it was
//! doing at the time.
//!
//! [`RetryPolicy`] tells the scheduler whether waiting for the next interval
//! can fix the problem, or whether an operator has to look at the
//! configuration first.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RepoCode, RepositoryId};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is expected to clear up on its own.
///
/// The scheduler retries every failed cycle after its fixed interval either
/// way; the policy only decides how loudly the failure is reported.
///
/// - `Retryable` errors: network failures, non-success HTTP responses, rate limits.
/// - `NonRetryable` errors: catalog gaps, malformed rows, broken invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The cycle may succeed when retried.
    Retryable {
        /// Minimum back-off before the next attempt, when the remote service
        /// told us (e.g. derived from `x-ratelimit-reset`).
        after: Option<Duration>,
    },
    /// Retrying will hit the same failure until the configuration or the
    /// sheet is fixed.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure reported by an external service behind one of the port traits.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The service refused the request because of rate limiting.
    #[error("rate limited")]
    RateLimited {
        /// How long the service asked us to wait, if it said.
        retry_after: Option<Duration>,
    },

    /// The response arrived but could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ServiceError {
    fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle errors
// ---------------------------------------------------------------------------

/// Which half of a sheet write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteStage {
    /// The bulk cell-range update. Nothing was written.
    Values,
    /// The formatting batch. Cell values are already saved and are not rolled back.
    Formatting,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStage::Values => write!(f, "cell values"),
            WriteStage::Formatting => write!(f, "formatting requests"),
        }
    }
}

/// Errors that abort a fetch → reconcile → write cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Paging through a repository's issues failed. No partial result is kept.
    #[error("failed to fetch issues of '{repository}': {source}")]
    FetchFailed {
        /// Repository being fetched when the failure happened.
        repository: RepositoryId,
        /// Underlying service failure.
        source: ServiceError,
    },

    /// An issue belongs to a repository that has no short code.
    #[error("repository '{repository}' has no entry in the repository catalog")]
    UnknownRepository {
        /// The repository missing from the catalog.
        repository: RepositoryId,
    },

    /// A sheet row carries a repository code that maps to no repository.
    #[error("repository code '{code}' has no entry in the repository catalog")]
    UnknownRepositoryCode {
        /// The code found in the sheet.
        code: RepoCode,
    },

    /// Reconciliation found the identity-key bookkeeping inconsistent.
    #[error("reconciliation invariant violated: {detail}")]
    InvariantViolation {
        /// What was inconsistent.
        detail: String,
    },

    /// Reading the persisted table failed.
    #[error("failed to read the sheet: {source}")]
    ReadFailed {
        /// Underlying service failure.
        source: ServiceError,
    },

    /// Writing to the sheet failed.
    #[error("failed to write {stage} to the sheet: {source}")]
    WriteFailed {
        /// Which write failed.
        stage: WriteStage,
        /// Underlying service failure.
        source: ServiceError,
    },

    /// A row of the persisted table has no usable identity key.
    ///
    /// `row` is the 1-based sheet row number when known.
    #[error("sheet row {row} is malformed: {reason}")]
    MalformedRow {
        /// Sheet row number.
        row: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The tracker was configured inconsistently.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl SyncError {
    /// Returns how the scheduler should treat this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            SyncError::FetchFailed { source, .. }
            | SyncError::ReadFailed { source }
            | SyncError::WriteFailed { source, .. } => RetryPolicy::Retryable {
                after: source.retry_after(),
            },
            SyncError::UnknownRepository { .. }
            | SyncError::UnknownRepositoryCode { .. }
            | SyncError::InvariantViolation { .. }
            | SyncError::MalformedRow { .. }
            | SyncError::Configuration { .. } => RetryPolicy::NonRetryable,
        }
    }

    /// Returns `true` when the failure points at configuration or sheet
    /// contents rather than a transient outage.
    pub fn is_configuration_fault(&self) -> bool {
        self.retry_policy() == RetryPolicy::NonRetryable
    }
}
