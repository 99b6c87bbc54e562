//! Reconciler: merges the persisted table with freshly fetched rows.
//!
//! The persisted table is the source of truth for operator-owned columns;
//! fresh rows are the source of truth for the tracked columns and for which
//! issues are still open. Rows are never removed: an issue that left the open
//! set keeps its row, gets its link rewritten to the closed form and is
//! reported as a [`Highlight`].

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::fetch::FIRST_DATA_ROW;
use crate::types::column;
use crate::{Highlight, LinkCodec, RepoCode, RepositoryCatalog, Row, RowKey, SyncError};

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Updated table in canonical order.
    pub merged: Vec<Row>,
    /// Link cells of rows whose issue is no longer open, by final position.
    pub highlights: Vec<Highlight>,
    pub inserted: usize,
    pub refreshed: usize,
    pub closed: usize,
}

/// Sort key of the canonical order: repository code (trimmed, as in the
/// identity key), API labels, then the issue number compared numerically.
type SortKey = (String, String, u64);

/// Sorts rows by canonical order.
///
/// Fails with [`SyncError::MalformedRow`] if a link cell holds no issue number.
pub fn canonical_sort(rows: Vec<Row>, links: &LinkCodec) -> Result<Vec<Row>, SyncError> {
    let mut keyed: Vec<(SortKey, Row)> = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let number = links
            .decode(row.link())
            .ok_or_else(|| malformed_link(index, &row))?;
        let key = (
            row.repository().trim().to_string(),
            row.api_labels().to_string(),
            number.as_u64(),
        );
        keyed.push((key, row));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

/// Identity key of a row.
pub fn row_key(row: &Row, index: usize, links: &LinkCodec) -> Result<RowKey, SyncError> {
    let number = links
        .decode(row.link())
        .ok_or_else(|| malformed_link(index, row))?;
    let repository = RepoCode::new(row.repository().trim()).ok_or(SyncError::MalformedRow {
        row: index + FIRST_DATA_ROW,
        reason: "repository cell is empty".into(),
    })?;
    Ok(RowKey { number, repository })
}

fn malformed_link(index: usize, row: &Row) -> SyncError {
    SyncError::MalformedRow {
        row: index + FIRST_DATA_ROW,
        reason: format!("no issue number in link cell '{}'", row.link()),
    }
}

/// Identity keys of `rows`, by position. Duplicate keys break the one-row-per-issue
/// invariant and are rejected.
fn unique_keys(rows: &[Row], links: &LinkCodec, table: &str) -> Result<Vec<RowKey>, SyncError> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut keys = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let key = row_key(row, index, links)?;
        if !seen.insert(key.clone()) {
            return Err(SyncError::InvariantViolation {
                detail: format!("issue {key} appears more than once in the {table} table"),
            });
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Reconciles tables using the injected repository catalog and link codec.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    repositories: &'a RepositoryCatalog,
    links: &'a LinkCodec,
}

impl<'a> Reconciler<'a> {
    pub fn new(repositories: &'a RepositoryCatalog, links: &'a LinkCodec) -> Self {
        Self {
            repositories,
            links,
        }
    }

    /// Merges `fresh` into `existing`.
    ///
    /// Both tables are brought into canonical order first, then walked in a
    /// single pass. `i` walks the merged table, `j` the fresh rows:
    ///
    /// 1. An existing row whose key is not among the fresh keys is closed:
    ///    its link is rewritten and only `i` advances.
    /// 2. Otherwise the fresh row at `j` is inserted at `i` if its key is new,
    ///    or the open row at `i` has its tracked columns refreshed from the
    ///    fresh row carrying the same key. Both cursors advance.
    ///
    /// Keeping `j` separate means a run of closures never shifts the pairing
    /// of the rows after it.
    pub fn reconcile(&self, existing: Vec<Row>, fresh: Vec<Row>) -> Result<Reconciliation, SyncError> {
        let mut merged = canonical_sort(existing, self.links)?;
        let fresh = canonical_sort(fresh, self.links)?;

        let existing_keys: HashSet<RowKey> = unique_keys(&merged, self.links, "existing")?
            .into_iter()
            .collect();
        let fresh_keys = unique_keys(&fresh, self.links, "fresh")?;
        let fresh_by_key: HashMap<&RowKey, &Row> = fresh_keys.iter().zip(&fresh).collect();

        let mut closed = HashSet::new();
        let (mut inserted, mut refreshed) = (0, 0);
        let (mut i, mut j) = (0, 0);

        while i < merged.len() || j < fresh.len() {
            let current = match merged.get(i) {
                Some(row) => Some(row_key(row, i, self.links)?),
                None => None,
            };

            if let Some(key) = current.as_ref().filter(|key| !fresh_by_key.contains_key(key)) {
                let repository = self.repositories.repository_of(&key.repository)?;
                merged[i].set_cell(
                    column::ISSUE_LINK,
                    self.links.encode_closed(repository, key.number),
                );
                closed.insert(key.clone());
                i += 1;
                continue;
            }

            let Some(incoming) = fresh_keys.get(j) else {
                return Err(SyncError::InvariantViolation {
                    detail: format!(
                        "issue {} is open but every fresh row is already accounted for",
                        current.map(|key| key.to_string()).unwrap_or_default()
                    ),
                });
            };

            if !existing_keys.contains(incoming) {
                merged.insert(i, fresh[j].clone());
                inserted += 1;
            } else {
                let Some(key) = current else {
                    return Err(SyncError::InvariantViolation {
                        detail: format!("issue {incoming} is tracked but no existing row is left for it"),
                    });
                };
                let source = fresh_by_key[&key];
                merged[i].refresh_from(source);
                refreshed += 1;
            }

            i += 1;
            j += 1;
        }

        let merged = canonical_sort(merged, self.links)?;
        let mut highlights = Vec::with_capacity(closed.len());
        for (index, row) in merged.iter().enumerate() {
            if closed.contains(&row_key(row, index, self.links)?) {
                highlights.push(Highlight {
                    row: index + 1,
                    column: column::ISSUE_LINK,
                });
            }
        }

        info!(
            rows = merged.len(),
            inserted,
            refreshed,
            closed = closed.len(),
            "reconciled sheet"
        );

        Ok(Reconciliation {
            merged,
            highlights,
            inserted,
            refreshed,
            closed: closed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{IssueNumber, RepositoryEntry, RepositoryId};

    const GCP: &str = "googleapis/google-cloud-python";
    const GRMP: &str = "googleapis/google-resumable-media-python";

    fn catalog() -> RepositoryCatalog {
        RepositoryCatalog::new(vec![
            RepositoryEntry {
                name: RepositoryId::new(GCP).unwrap(),
                code: RepoCode::new("GCP").unwrap(),
            },
            RepositoryEntry {
                name: RepositoryId::new(GRMP).unwrap(),
                code: RepoCode::new("GRMP").unwrap(),
            },
        ])
        .unwrap()
    }

    fn full_name(code: &str) -> &'static str {
        if code == "GCP" {
            GCP
        } else {
            GRMP
        }
    }

    /// A row as the row builder would produce it.
    fn fresh_row(number: u64, code: &str, labels: &str) -> Row {
        let links = LinkCodec::default();
        let url = format!("https://github.com/{}/issues/{number}", full_name(code));
        Row::from_cells(vec![
            "Medium".into(),
            links.encode(&url, IssueNumber::new(number)),
            "PENDING".into(),
            "01 Jan 2019".into(),
            format!("Issue {number}"),
            code.into(),
            labels.into(),
            "N/A".into(),
        ])
    }

    /// A row as read back from the sheet after an operator worked on it.
    fn worked_row(number: u64, code: &str, labels: &str, priority: &str, assignee: &str) -> Row {
        let mut row = fresh_row(number, code, labels);
        row.set_cell(column::PRIORITY, priority);
        row.set_cell(column::STATUS, "OPEN");
        row.set_cell(column::ASSIGNEE, assignee);
        row
    }

    fn closed_link(number: u64, code: &str) -> String {
        LinkCodec::default().encode_closed(&RepositoryId::new(full_name(code)).unwrap(), IssueNumber::new(number))
    }

    fn numbers(rows: &[Row]) -> Vec<u64> {
        let links = LinkCodec::default();
        rows.iter()
            .map(|row| links.decode(row.link()).unwrap().as_u64())
            .collect()
    }

    fn run(existing: Vec<Row>, fresh: Vec<Row>) -> Reconciliation {
        let repositories = catalog();
        let links = LinkCodec::default();
        Reconciler::new(&repositories, &links)
            .reconcile(existing, fresh)
            .unwrap()
    }

    fn run_err(existing: Vec<Row>, fresh: Vec<Row>) -> SyncError {
        let repositories = catalog();
        let links = LinkCodec::default();
        Reconciler::new(&repositories, &links)
            .reconcile(existing, fresh)
            .unwrap_err()
    }

    #[test]
    fn identical_fetch_is_idempotent() {
        let table = vec![
            fresh_row(12, "GRMP", ""),
            fresh_row(5, "GCP", "Storage"),
            fresh_row(3, "GCP", "Core"),
        ];

        let result = run(table.clone(), table.clone());

        let expected = canonical_sort(table, &LinkCodec::default()).unwrap();
        assert_eq!(result.merged, expected);
        assert!(result.highlights.is_empty());
        assert_eq!((result.inserted, result.refreshed, result.closed), (0, 3, 0));
    }

    #[test]
    fn closed_issue_is_flagged_and_keeps_manual_fields() {
        let existing = vec![worked_row(5, "GCP", "Core", "High", "Ilya")];

        let result = run(existing, Vec::new());

        assert_eq!(result.merged.len(), 1);
        let row = &result.merged[0];
        assert_eq!(row.link(), closed_link(5, "GCP"));
        assert_eq!(row.cell(column::PRIORITY), "High");
        assert_eq!(row.cell(column::STATUS), "OPEN");
        assert_eq!(row.cell(column::ASSIGNEE), "Ilya");
        assert_eq!(result.highlights, [Highlight { row: 1, column: 1 }]);
    }

    #[test]
    fn stray_whitespace_in_the_repository_cell_does_not_move_a_row() {
        let mut typed = worked_row(9, "GCP", "", "Low", "Maxim");
        typed.set_cell(column::REPOSITORY, " GCP");
        let existing = vec![typed, fresh_row(4, "GCP", "")];
        let fresh = vec![fresh_row(4, "GCP", ""), fresh_row(9, "GCP", "")];

        let result = run(existing, fresh);

        assert_eq!(numbers(&result.merged), [4, 9]);
        assert_eq!(result.merged[1].cell(column::ASSIGNEE), "Maxim");
        assert_eq!(result.refreshed, 2);
    }

    #[test]
    fn new_issue_is_inserted_with_seed_values() {
        let result = run(Vec::new(), vec![fresh_row(9, "GRMP", "Storage")]);

        assert_eq!(result.merged, [fresh_row(9, "GRMP", "Storage")]);
        let row = &result.merged[0];
        assert_eq!(row.cell(column::PRIORITY), "Medium");
        assert_eq!(row.cell(column::STATUS), "PENDING");
        assert_eq!(row.cell(column::ASSIGNEE), "N/A");
        assert!(result.highlights.is_empty());
        assert_eq!(result.inserted, 1);
    }

    #[test]
    fn tracked_fields_are_overwritten_and_manual_fields_survive() {
        let mut existing = worked_row(5, "GCP", "Core", "Critical", "Maxim");
        existing.set_cell(column::TITLE, "Edited title");
        existing.set_cell(9, "see internal PR");
        let fresh = fresh_row(5, "GCP", "Other, Storage");

        let result = run(vec![existing], vec![fresh.clone()]);

        let row = &result.merged[0];
        assert_eq!(row.link(), fresh.link());
        assert_eq!(row.cell(column::STATUS), "PENDING");
        assert_eq!(row.api_labels(), "Other, Storage");
        assert_eq!(row.cell(column::PRIORITY), "Critical");
        assert_eq!(row.cell(column::ASSIGNEE), "Maxim");
        assert_eq!(row.cell(column::TITLE), "Edited title");
        assert_eq!(row.cell(9), "see internal PR");
        assert_eq!(row.width(), 10);
    }

    #[test]
    fn consecutive_closures_do_not_shift_later_rows() {
        let existing = vec![
            worked_row(1, "GCP", "Core", "Low", "Ilya"),
            worked_row(2, "GCP", "Core", "High", "Paras"),
            worked_row(3, "GCP", "Core", "High", "Sumit"),
            worked_row(4, "GCP", "Core", "Critical", "Hemang"),
            worked_row(5, "GCP", "Core", "Paused", "Sangram"),
        ];
        let fresh = vec![
            fresh_row(1, "GCP", "Core"),
            fresh_row(4, "GCP", "Core"),
            fresh_row(5, "GCP", "Core"),
            fresh_row(6, "GCP", "Core"),
        ];

        let result = run(existing, fresh);

        assert_eq!(numbers(&result.merged), [1, 2, 3, 4, 5, 6]);
        let assignees: Vec<_> = result
            .merged
            .iter()
            .map(|row| row.cell(column::ASSIGNEE))
            .collect();
        assert_eq!(assignees, ["Ilya", "Paras", "Sumit", "Hemang", "Sangram", "N/A"]);
        assert_eq!(
            result.highlights,
            [Highlight { row: 2, column: 1 }, Highlight { row: 3, column: 1 }]
        );
        assert_eq!(result.merged[1].link(), closed_link(2, "GCP"));
        assert_eq!(result.merged[2].link(), closed_link(3, "GCP"));
        assert_eq!((result.inserted, result.refreshed, result.closed), (1, 3, 2));
    }

    #[test]
    fn closures_and_insertions_interleave() {
        let existing = vec![
            worked_row(2, "GCP", "", "High", "Ilya"),
            worked_row(4, "GCP", "", "Low", "Maxim"),
            worked_row(7, "GRMP", "", "Low", "Paras"),
        ];
        let fresh = vec![
            fresh_row(8, "GRMP", ""),
            fresh_row(1, "GCP", ""),
            fresh_row(3, "GCP", ""),
            fresh_row(4, "GCP", ""),
        ];

        let result = run(existing, fresh);

        assert_eq!(numbers(&result.merged), [1, 2, 3, 4, 7, 8]);
        assert_eq!(result.merged[3].cell(column::ASSIGNEE), "Maxim");
        assert_eq!(
            result.highlights,
            [Highlight { row: 2, column: 1 }, Highlight { row: 5, column: 1 }]
        );
    }

    #[test]
    fn relabelled_issues_move_to_their_new_place() {
        let existing = vec![
            worked_row(1, "GCP", "Core", "High", "Ilya"),
            worked_row(2, "GCP", "Storage", "Low", "Maxim"),
        ];
        let fresh = vec![fresh_row(1, "GCP", "Storage"), fresh_row(2, "GCP", "Core")];

        let result = run(existing, fresh);

        assert_eq!(numbers(&result.merged), [2, 1]);
        assert_eq!(result.merged[0].cell(column::ASSIGNEE), "Maxim");
        assert_eq!(result.merged[0].api_labels(), "Core");
        assert_eq!(result.merged[1].cell(column::ASSIGNEE), "Ilya");
        assert_eq!(result.merged[1].api_labels(), "Storage");
    }

    #[test]
    fn display_value_links_match_fresh_formulas() {
        let mut existing = worked_row(5, "GCP", "", "High", "Ilya");
        existing.set_cell(column::ISSUE_LINK, "5");

        let result = run(vec![existing], vec![fresh_row(5, "GCP", "")]);

        assert!(result.highlights.is_empty());
        assert_eq!(result.merged[0].link(), fresh_row(5, "GCP", "").link());
        assert_eq!(result.merged[0].cell(column::PRIORITY), "High");
    }

    #[test]
    fn closed_rows_stay_closed_on_later_cycles() {
        let first = run(vec![worked_row(5, "GCP", "", "High", "Ilya")], Vec::new());
        let second = run(first.merged.clone(), Vec::new());

        assert_eq!(second.merged, first.merged);
        assert_eq!(second.highlights, first.highlights);
    }

    #[test]
    fn issue_numbers_sort_numerically() {
        let fresh = vec![
            fresh_row(10, "GCP", ""),
            fresh_row(9, "GCP", ""),
            fresh_row(100, "GCP", ""),
        ];

        let result = run(Vec::new(), fresh);

        assert_eq!(numbers(&result.merged), [9, 10, 100]);
    }

    #[test]
    fn duplicate_fresh_keys_violate_the_invariant() {
        let fresh = vec![fresh_row(1, "GCP", ""), fresh_row(1, "GCP", "Core")];
        assert!(matches!(
            run_err(Vec::new(), fresh),
            SyncError::InvariantViolation { .. }
        ));
    }

    #[test]
    fn duplicate_existing_keys_violate_the_invariant() {
        let existing = vec![fresh_row(1, "GCP", ""), fresh_row(1, "GCP", "")];
        assert!(matches!(
            run_err(existing, vec![fresh_row(1, "GCP", "")]),
            SyncError::InvariantViolation { .. }
        ));
    }

    #[test]
    fn same_number_in_two_repositories_is_two_issues() {
        let fresh = vec![fresh_row(1, "GCP", ""), fresh_row(1, "GRMP", "")];
        let result = run(vec![fresh_row(1, "GCP", "")], fresh);
        assert_eq!(result.merged.len(), 2);
        assert_eq!(result.inserted, 1);
    }

    #[test]
    fn unreadable_link_is_a_malformed_row() {
        let mut existing = fresh_row(1, "GCP", "");
        existing.set_cell(column::ISSUE_LINK, "TBD");
        assert!(matches!(
            run_err(vec![existing], Vec::new()),
            SyncError::MalformedRow { row: 2, .. }
        ));
    }

    #[test]
    fn closing_a_row_of_an_unknown_repository_fails() {
        let mut existing = fresh_row(1, "GCP", "");
        existing.set_cell(column::REPOSITORY, "XYZ");
        assert!(matches!(
            run_err(vec![existing], Vec::new()),
            SyncError::UnknownRepositoryCode { .. }
        ));
    }

    /// Every combination of open/closed/new over five issues keeps the
    /// one-row-per-issue invariant, flags exactly the closed issues and ends
    /// in canonical order.
    #[test]
    fn every_open_set_combination_reconciles_consistently() {
        let links = LinkCodec::default();
        for existing_mask in 0u32..32 {
            for fresh_mask in 0u32..32 {
                let pick = |mask: u32| -> Vec<u64> { (1..=5).filter(|n| mask & (1 << (n - 1)) != 0).collect() };
                let existing: Vec<Row> = pick(existing_mask)
                    .into_iter()
                    .map(|n| worked_row(n, "GCP", "", "High", "Ilya"))
                    .collect();
                let fresh: Vec<Row> = pick(fresh_mask)
                    .into_iter()
                    .rev()
                    .map(|n| fresh_row(n, "GCP", ""))
                    .collect();

                let result = run(existing, fresh);

                let expected: Vec<u64> = pick(existing_mask | fresh_mask);
                assert_eq!(numbers(&result.merged), expected);

                let only_existing = pick(existing_mask & !fresh_mask);
                let flagged: Vec<u64> = result
                    .highlights
                    .iter()
                    .map(|h| links.decode(result.merged[h.row - 1].link()).unwrap().as_u64())
                    .collect();
                assert_eq!(flagged, only_existing);

                for row in &result.merged {
                    let number = links.decode(row.link()).unwrap().as_u64();
                    let was_tracked = existing_mask & (1 << (number - 1)) != 0;
                    let expected_assignee = if was_tracked { "Ilya" } else { "N/A" };
                    assert_eq!(row.cell(column::ASSIGNEE), expected_assignee);
                }
            }
        }
    }
}
