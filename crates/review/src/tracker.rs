//! The cycle driver: fetch → reconcile → write.

use std::collections::HashMap;

use tracing::{info, info_span, Instrument};

use crate::fetch::{fetch_table, FIRST_DATA_ROW};
use crate::layout::{column_requests, title_range, ColumnSpec};
use crate::sheet::{read_table, write_table};
use crate::types::column;
use crate::{
    Color, CycleId, FormatRequest, IssueSource, LinkCodec, ProjectCatalog, Reconciler,
    RepositoryCatalog, RepositoryEntry, RowBuilder, SheetStore, SyncError, WriteStage,
};

/// Everything the tracker needs to know about the sheet and its sources.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Tracked repositories, in fetch order.
    pub repositories: Vec<RepositoryEntry>,
    /// Raw label → project display name.
    pub projects: HashMap<String, String>,
    /// Substring that marks a label as a project label.
    pub label_marker: String,
    /// Spreadsheet-locale name of the hyperlink function.
    pub hyperlink_function: String,
    /// Web root for rebuilt links of closed issues.
    pub web_url: String,
    /// Background of link cells whose issue left the open set.
    pub highlight: Color,
}

/// Counts from one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: CycleId,
    pub fetched: usize,
    pub rows: usize,
    pub inserted: usize,
    pub refreshed: usize,
    pub closed: usize,
    pub range: String,
}

/// Keeps one review sheet in step with the tracked repositories.
#[derive(Debug, Clone)]
pub struct Tracker {
    repositories: RepositoryCatalog,
    projects: ProjectCatalog,
    links: LinkCodec,
    highlight: Color,
}

impl Tracker {
    pub fn new(settings: TrackerSettings) -> Result<Self, SyncError> {
        if settings.repositories.is_empty() {
            return Err(SyncError::Configuration {
                message: "no repositories to track".into(),
            });
        }
        Ok(Self {
            repositories: RepositoryCatalog::new(settings.repositories)?,
            projects: ProjectCatalog::new(settings.label_marker, settings.projects),
            links: LinkCodec::new(settings.hyperlink_function, settings.web_url),
            highlight: settings.highlight,
        })
    }

    pub fn row_builder(&self) -> RowBuilder<'_> {
        RowBuilder::new(&self.repositories, &self.projects, &self.links)
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.repositories, &self.links)
    }

    pub fn links(&self) -> &LinkCodec {
        &self.links
    }

    /// Runs one full cycle against the sheet behind `store`.
    ///
    /// Any failure aborts the cycle; nothing is retried here. The sheet keeps
    /// the last successful cycle's data unless the failure happened after the
    /// values were written (formatting only).
    pub async fn run_cycle(
        &self,
        source: &dyn IssueSource,
        store: &dyn SheetStore,
    ) -> Result<CycleReport, SyncError> {
        let cycle = CycleId::new_random();
        self.cycle(cycle, source, store)
            .instrument(info_span!("cycle", %cycle))
            .await
    }

    async fn cycle(
        &self,
        cycle: CycleId,
        source: &dyn IssueSource,
        store: &dyn SheetStore,
    ) -> Result<CycleReport, SyncError> {
        let fetched = fetch_table(source, &self.row_builder()).await?;
        let fetched_rows = fetched.rows.len();
        let existing = read_table(store, &self.links).await?;

        let result = self.reconciler().reconcile(existing, fetched.rows)?;

        // Backgrounds stick to grid cells, not rows: wipe the link column
        // before painting, or rows that moved keep a stale highlight.
        let written_rows = fetched.row_count.max(result.merged.len() + FIRST_DATA_ROW);
        let requests = std::iter::once(FormatRequest::ClearBackground {
            column: column::ISSUE_LINK,
            start_row: FIRST_DATA_ROW - 1,
            end_row: written_rows,
        })
        .chain(
            result
                .highlights
                .iter()
                .map(|&h| FormatRequest::highlight(h, self.highlight)),
        )
        .collect();

        let summary =
            write_table(store, &self.links, result.merged, fetched.row_count, requests).await?;

        let report = CycleReport {
            cycle,
            fetched: fetched_rows,
            rows: summary.rows,
            inserted: result.inserted,
            refreshed: result.refreshed,
            closed: result.closed,
            range: summary.range,
        };
        info!(
            fetched = report.fetched,
            rows = report.rows,
            inserted = report.inserted,
            closed = report.closed,
            "cycle complete"
        );
        Ok(report)
    }

    /// Sets up an empty sheet: writes the title row, applies the column
    /// layout, then fills in every open issue.
    pub async fn initialise(
        &self,
        source: &dyn IssueSource,
        store: &dyn SheetStore,
        columns: &[ColumnSpec],
    ) -> Result<CycleReport, SyncError> {
        let cycle = CycleId::new_random();
        self.setup(cycle, source, store, columns)
            .instrument(info_span!("initialise", %cycle))
            .await
    }

    async fn setup(
        &self,
        cycle: CycleId,
        source: &dyn IssueSource,
        store: &dyn SheetStore,
        columns: &[ColumnSpec],
    ) -> Result<CycleReport, SyncError> {
        let titles: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        store
            .write_range(&title_range(titles.len()), &[titles])
            .await
            .map_err(|source| SyncError::WriteFailed {
                stage: WriteStage::Values,
                source,
            })?;
        store
            .apply_formatting(&column_requests(columns))
            .await
            .map_err(|source| SyncError::WriteFailed {
                stage: WriteStage::Formatting,
                source,
            })?;
        info!(columns = columns.len(), "wrote title row");

        let fetched = fetch_table(source, &self.row_builder()).await?;
        let fetched_rows = fetched.rows.len();
        let summary =
            write_table(store, &self.links, fetched.rows, fetched.row_count, Vec::new()).await?;

        Ok(CycleReport {
            cycle,
            fetched: fetched_rows,
            rows: summary.rows,
            inserted: summary.rows,
            refreshed: 0,
            closed: 0,
            range: summary.range,
        })
    }
}
