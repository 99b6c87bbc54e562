//! Column layout of the review sheet and the formatting requests derived
//! from it.
//!
//! [`FormatRequest`] is transport-agnostic; the `sheets` crate translates it
//! into Google Sheets `batchUpdate` request objects.

use serde::{Deserialize, Serialize};

use crate::{Color, Highlight};

/// Last data row that column-wide alignment and validation rules cover.
pub const FORMATTED_ROWS_END: usize = 1000;

/// Horizontal alignment of a column's data cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "LEFT",
            Alignment::Center => "CENTER",
            Alignment::Right => "RIGHT",
        }
    }
}

/// One column of the title row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Width in pixels; the sheet default when absent.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub align: Option<Alignment>,
    /// Allowed values, rendered as a strict dropdown.
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

impl ColumnSpec {
    fn new(name: &str, width: Option<u32>, align: Option<Alignment>, choices: Option<&[&str]>) -> Self {
        Self {
            name: name.to_string(),
            width,
            align,
            choices: choices.map(|c| c.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// The layout of the review sheet as first deployed: the eight columns the
/// tool maintains followed by the operator's own columns.
pub fn default_columns() -> Vec<ColumnSpec> {
    use Alignment::Center;

    const PRIORITIES: &[&str] = &["Paused", "Low", "Medium", "High", "Critical", "Done"];
    const STATUSES: &[&str] = &[
        "PENDING", "OPEN", "SUBMITTED", "ON HOLD", "MERGED", "REOPENED", "CLOSED", "IRRELEVANT",
    ];
    const ASSIGNEES: &[&str] = &["Ilya", "Hemang", "Maxim", "Paras", "Sumit", "Sangram", "N/A"];

    vec![
        ColumnSpec::new("Priority", Some(80), Some(Center), Some(PRIORITIES)),
        ColumnSpec::new("Issue", Some(50), Some(Center), None),
        ColumnSpec::new("Status", None, Some(Center), Some(STATUSES)),
        ColumnSpec::new("Created", None, Some(Center), None),
        ColumnSpec::new("Description", Some(450), None, None),
        ColumnSpec::new("Repository", None, Some(Center), None),
        ColumnSpec::new("API", None, Some(Center), None),
        ColumnSpec::new("Assignee", None, Some(Center), Some(ASSIGNEES)),
        ColumnSpec::new("Task", None, Some(Center), None),
        ColumnSpec::new("Opened", None, Some(Center), None),
        ColumnSpec::new("Internal PR", None, Some(Center), None),
        ColumnSpec::new("Public PR", None, Some(Center), None),
        ColumnSpec::new("Comment", Some(550), None, None),
    ]
}

/// A formatting change submitted separately from cell values.
///
/// Row and column indices are 0-based; ranges are half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormatRequest {
    ColumnWidth {
        column: usize,
        pixels: u32,
    },
    ColumnAlignment {
        column: usize,
        align: Alignment,
        start_row: usize,
        end_row: usize,
    },
    OneOfList {
        column: usize,
        values: Vec<String>,
        start_row: usize,
        end_row: usize,
    },
    /// Bold, centered header row across `columns` columns.
    TitleRow {
        columns: usize,
    },
    CellBackground {
        row: usize,
        column: usize,
        color: Color,
    },
    /// Resets the background of one column over a row range to the sheet
    /// default.
    ClearBackground {
        column: usize,
        start_row: usize,
        end_row: usize,
    },
}

impl FormatRequest {
    pub fn highlight(highlight: Highlight, color: Color) -> Self {
        FormatRequest::CellBackground {
            row: highlight.row,
            column: highlight.column,
            color,
        }
    }
}

/// Requests that set up a fresh sheet for `columns`: widths, alignments and
/// dropdowns per column, then the title row styling.
pub fn column_requests(columns: &[ColumnSpec]) -> Vec<FormatRequest> {
    let mut requests = Vec::new();

    for (index, col) in columns.iter().enumerate() {
        if let Some(pixels) = col.width {
            requests.push(FormatRequest::ColumnWidth {
                column: index,
                pixels,
            });
        }
        if let Some(align) = col.align {
            requests.push(FormatRequest::ColumnAlignment {
                column: index,
                align,
                start_row: 1,
                end_row: FORMATTED_ROWS_END,
            });
        }
        if let Some(values) = &col.choices {
            requests.push(FormatRequest::OneOfList {
                column: index,
                values: values.clone(),
                start_row: 1,
                end_row: FORMATTED_ROWS_END,
            });
        }
    }

    requests.push(FormatRequest::TitleRow {
        columns: columns.len(),
    });
    requests
}

/// A1 column letters for a 0-based column index (`0 → A`, `26 → AA`).
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 range of the title row for `count` columns, e.g. `"A1:M1"`.
pub fn title_range(count: usize) -> String {
    format!("A1:{}1", column_letter(count.max(1) - 1))
}
