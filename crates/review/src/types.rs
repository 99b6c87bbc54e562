//! Shared value types for the review-sheet domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the data that flows through a cycle: issues fetched from the tracker, the
//! rows they become, and the highlight instructions produced by reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IssueNumber, RepoCode};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Formats the date the way the sheet's `Created` column shows it
    /// (e.g. `"05 Mar 2019"`).
    pub fn sheet_date(self) -> String {
        self.0.format("%d %b %Y").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// One item of a repository's issue list, as reported by the issue source.
///
/// GitHub lists pull requests alongside issues; `is_pull_request` lets the
/// row builder drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueNumber,
    pub title: String,
    pub created_at: Timestamp,
    pub html_url: String,
    pub labels: Vec<String>,
    pub is_pull_request: bool,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Column positions of the fixed part of a sheet row (0-based).
pub mod column {
    pub const PRIORITY: usize = 0;
    pub const ISSUE_LINK: usize = 1;
    pub const STATUS: usize = 2;
    pub const CREATED: usize = 3;
    pub const TITLE: usize = 4;
    pub const REPOSITORY: usize = 5;
    pub const API_LABELS: usize = 6;
    pub const ASSIGNEE: usize = 7;

    /// Number of columns the tool owns. Rows may carry more, entered by hand.
    pub const WIDTH: usize = 8;

    /// Columns refreshed from fresh data on every cycle. Everything else
    /// belongs to the operator.
    pub const TRACKED: [usize; 3] = [ISSUE_LINK, STATUS, API_LABELS];
}

/// Seed values written into operator-owned columns when a row is created.
pub mod seed {
    pub const PRIORITY: &str = "Medium";
    pub const STATUS: &str = "PENDING";
    pub const ASSIGNEE: &str = "N/A";
}

/// One row of the review sheet.
///
/// Always at least [`column::WIDTH`] cells wide; extra cells hold manual
/// columns and are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<String>);

impl Row {
    /// Creates a row from raw cells, padding with empty cells up to
    /// [`column::WIDTH`].
    pub fn from_cells(mut cells: Vec<String>) -> Self {
        if cells.len() < column::WIDTH {
            cells.resize(column::WIDTH, String::new());
        }
        Self(cells)
    }

    pub fn cell(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn set_cell(&mut self, index: usize, value: impl Into<String>) {
        if index >= self.0.len() {
            self.0.resize(index + 1, String::new());
        }
        self.0[index] = value.into();
    }

    pub fn link(&self) -> &str {
        self.cell(column::ISSUE_LINK)
    }

    pub fn repository(&self) -> &str {
        self.cell(column::REPOSITORY)
    }

    pub fn api_labels(&self) -> &str {
        self.cell(column::API_LABELS)
    }

    /// Overwrites the tracked columns with the values of `fresh`.
    pub fn refresh_from(&mut self, fresh: &Row) {
        for index in column::TRACKED {
            self.set_cell(index, fresh.cell(index));
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn into_cells(self) -> Vec<String> {
        self.0
    }

    /// Returns `true` if every cell is empty (a blank line in the sheet).
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|c| c.trim().is_empty())
    }
}

/// Identity of a row across cycles: the issue number together with the
/// repository code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub number: IssueNumber,
    pub repository: RepoCode,
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// A cell that must be painted with the highlight colour because its issue
/// left the open set.
///
/// Both positions are 0-based sheet coordinates, so `row` already includes
/// the header offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Highlight {
    pub row: usize,
    pub column: usize,
}

/// An RGBA colour with components in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    #[serde(default = "opaque")]
    pub alpha: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    /// The pink-red used to mark closed issues.
    pub const CLOSED: Color = Color {
        red: 1.0,
        green: 0.38,
        blue: 0.52,
        alpha: 1.0,
    };
}

impl Default for Color {
    fn default() -> Self {
        Color::CLOSED
    }
}
