//! Port traits implemented by the infrastructure crates.
//!
//! The domain never talks to GitHub or Google Sheets directly. The `github`
//! crate implements [`IssueSource`], the `sheets` crate implements
//! [`SheetStore`]; tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::{FormatRequest, Issue, RepositoryId, ServiceError};

/// Read access to a repository's open issues.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Returns page `page` (0-based) of the repository's open issues, labels
    /// included. An empty page means there are no more.
    async fn issues_page(
        &self,
        repository: &RepositoryId,
        page: u32,
    ) -> Result<Vec<Issue>, ServiceError>;
}

/// Cell and formatting access to one sheet of one spreadsheet.
///
/// Ranges are A1 notation relative to the sheet the store is bound to
/// (e.g. `"A2:H40"`); an empty range means the whole sheet.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Reads a range as rows of cell text. Formula cells come back as formulas.
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, ServiceError>;

    /// Overwrites a range with `rows` in a single update, interpreting values
    /// as if typed by a user (so formulas are evaluated).
    async fn write_range(&self, range: &str, rows: &[Vec<String>]) -> Result<(), ServiceError>;

    /// Submits formatting requests as one batch.
    async fn apply_formatting(&self, requests: &[FormatRequest]) -> Result<(), ServiceError>;
}
