//! Review-sheet domain.
//!
//! Keeps a spreadsheet of open issues in step with a set of GitHub
//! repositories. Each cycle fetches every open issue, reconciles the result
//! against the rows already in the sheet, and writes the merged table back,
//! flagging the link cells of issues that were closed since the last cycle.
//! Columns the operator fills in by hand are never overwritten.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! The `github` crate supplies [`IssueSource`], the `sheets` crate supplies
//! [`SheetStore`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryId`, `RepoCode`, `IssueNumber`, ...) |
//! | [`types`] | Issues, rows, highlights, colours |
//! | [`errors`] | Cycle errors, port errors, retry policy |
//! | [`catalog`] | Repository and project lookup tables |
//! | [`link`] | Encoding and decoding of the issue link cell |
//! | [`rows`] | Row Builder |
//! | [`fetch`] | Table Fetcher |
//! | [`reconcile`] | Reconciler and canonical order |
//! | [`sheet`] | Table reader and Sheet Writer |
//! | [`layout`] | Column layout and formatting requests |
//! | [`ports`] | `IssueSource` and `SheetStore` traits |
//! | [`tracker`] | The fetch → reconcile → write cycle |

pub mod catalog;
pub mod errors;
pub mod fetch;
pub mod identifiers;
pub mod layout;
pub mod link;
pub mod ports;
pub mod reconcile;
pub mod rows;
pub mod sheet;
pub mod tracker;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use catalog::{
    ProjectCatalog, RepositoryCatalog, RepositoryEntry, DEFAULT_LABEL_MARKER, OTHER_PROJECT,
};
pub use errors::{RetryPolicy, ServiceError, SyncError, WriteStage};
pub use fetch::{fetch_table, FetchedTable, FIRST_DATA_ROW};
pub use identifiers::{CycleId, IssueNumber, RepoCode, RepositoryId, SpreadsheetId};
pub use layout::{default_columns, Alignment, ColumnSpec, FormatRequest};
pub use link::{LinkCodec, DEFAULT_HYPERLINK_FUNCTION, DEFAULT_WEB_URL};
pub use ports::{IssueSource, SheetStore};
pub use reconcile::{canonical_sort, Reconciler, Reconciliation};
pub use rows::RowBuilder;
pub use sheet::{read_table, write_table, WriteSummary};
pub use tracker::{CycleReport, Tracker, TrackerSettings};
pub use types::{Color, Highlight, Issue, Row, RowKey, Timestamp};
