//! Table Fetcher: pages through every tracked repository and builds the
//! candidate table.

use tracing::{debug, info};

use crate::{IssueSource, Row, RowBuilder, SyncError};

/// Sheet row number of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// Rows built from the current open issues, in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTable {
    pub rows: Vec<Row>,
    /// `FIRST_DATA_ROW + rows.len()`; sizes the destination write range.
    pub row_count: usize,
}

/// Fetches all open issues of every repository in the builder's catalog.
///
/// Repositories are fetched in catalog order and pages in source order; the
/// result is not sorted. A failure on any page aborts the whole fetch.
pub async fn fetch_table(
    source: &dyn IssueSource,
    builder: &RowBuilder<'_>,
) -> Result<FetchedTable, SyncError> {
    let mut rows = Vec::new();
    let mut row_count = FIRST_DATA_ROW;

    for repository in builder.repositories().repositories() {
        let before = rows.len();
        let mut page = 0;

        loop {
            let issues = source
                .issues_page(repository, page)
                .await
                .map_err(|source| SyncError::FetchFailed {
                    repository: repository.clone(),
                    source,
                })?;
            if issues.is_empty() {
                break;
            }
            debug!(%repository, page, issues = issues.len(), "fetched issue page");

            for issue in &issues {
                if let Some(row) = builder.build(issue, repository)? {
                    rows.push(row);
                    row_count += 1;
                }
            }
            page += 1;
        }

        info!(%repository, pages = page, rows = rows.len() - before, "fetched repository");
    }

    Ok(FetchedTable { rows, row_count })
}
