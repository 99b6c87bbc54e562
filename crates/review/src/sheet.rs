//! Reading the persisted table and the Sheet Writer.

use tracing::{debug, info};

use crate::fetch::FIRST_DATA_ROW;
use crate::layout::column_letter;
use crate::reconcile::canonical_sort;
use crate::types::column;
use crate::{FormatRequest, LinkCodec, Row, SheetStore, SyncError, WriteStage};

/// What a write put into the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// A1 range the values were written to.
    pub range: String,
    pub rows: usize,
    pub formatting_requests: usize,
}

/// Reads the data rows of the sheet in canonical order.
///
/// The header row is dropped and blank lines are skipped. Rows shorter than
/// the tracked width (the store trims trailing empty cells) are padded.
pub async fn read_table(store: &dyn SheetStore, links: &LinkCodec) -> Result<Vec<Row>, SyncError> {
    let values = store
        .read_range("")
        .await
        .map_err(|source| SyncError::ReadFailed { source })?;

    let mut rows = Vec::with_capacity(values.len().saturating_sub(1));
    for (index, cells) in values.into_iter().enumerate().skip(1) {
        let row = Row::from_cells(cells);
        if row.is_blank() {
            continue;
        }
        if links.decode(row.link()).is_none() {
            return Err(SyncError::MalformedRow {
                row: index + 1,
                reason: format!("no issue number in link cell '{}'", row.link()),
            });
        }
        rows.push(row);
    }

    debug!(rows = rows.len(), "read existing table");
    canonical_sort(rows, links)
}

/// Writes `rows` below the header in one range update, then submits
/// `requests` as a separate batch.
///
/// Rows are sorted into canonical order once more before writing. The range
/// covers at least `row_count` and always enough rows and columns for the
/// data; shorter rows are padded so cells of rows that moved are cleared.
///
/// If the values are written but the formatting batch fails, the error is
/// returned with [`WriteStage::Formatting`]; the values stay written.
pub async fn write_table(
    store: &dyn SheetStore,
    links: &LinkCodec,
    rows: Vec<Row>,
    row_count: usize,
    requests: Vec<FormatRequest>,
) -> Result<WriteSummary, SyncError> {
    let rows = canonical_sort(rows, links)?;

    let row_count = row_count.max(rows.len() + FIRST_DATA_ROW);
    let width = rows
        .iter()
        .map(Row::width)
        .max()
        .unwrap_or(column::WIDTH)
        .max(column::WIDTH);
    let range = format!("A{FIRST_DATA_ROW}:{}{row_count}", column_letter(width - 1));

    let values: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| {
            let mut cells = row.into_cells();
            cells.resize(width, String::new());
            cells
        })
        .collect();

    store
        .write_range(&range, &values)
        .await
        .map_err(|source| SyncError::WriteFailed {
            stage: WriteStage::Values,
            source,
        })?;
    info!(%range, rows = values.len(), "wrote table");

    if !requests.is_empty() {
        store
            .apply_formatting(&requests)
            .await
            .map_err(|source| SyncError::WriteFailed {
                stage: WriteStage::Formatting,
                source,
            })?;
        info!(requests = requests.len(), "applied formatting");
    }

    Ok(WriteSummary {
        range,
        rows: values.len(),
        formatting_requests: requests.len(),
    })
}
