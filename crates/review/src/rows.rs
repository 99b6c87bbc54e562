//! Row Builder: turns one fetched issue into one sheet row.

use crate::types::{column, seed};
use crate::{Issue, LinkCodec, ProjectCatalog, RepositoryCatalog, RepositoryId, Row, SyncError};

/// Builds sheet rows from issues using the injected lookup tables.
#[derive(Debug, Clone, Copy)]
pub struct RowBuilder<'a> {
    repositories: &'a RepositoryCatalog,
    projects: &'a ProjectCatalog,
    links: &'a LinkCodec,
}

impl<'a> RowBuilder<'a> {
    pub fn new(
        repositories: &'a RepositoryCatalog,
        projects: &'a ProjectCatalog,
        links: &'a LinkCodec,
    ) -> Self {
        Self {
            repositories,
            projects,
            links,
        }
    }

    pub fn repositories(&self) -> &'a RepositoryCatalog {
        self.repositories
    }

    /// Returns the row for `issue`, or `None` when the item is a pull request.
    ///
    /// Priority, status and assignee are seeded with placeholders; the
    /// operator fills them in later.
    pub fn build(&self, issue: &Issue, repository: &RepositoryId) -> Result<Option<Row>, SyncError> {
        if issue.is_pull_request {
            return Ok(None);
        }

        let code = self.repositories.code_of(repository)?;

        let mut row = Row::from_cells(Vec::with_capacity(column::WIDTH));
        row.set_cell(column::PRIORITY, seed::PRIORITY);
        row.set_cell(column::ISSUE_LINK, self.links.encode(&issue.html_url, issue.number));
        row.set_cell(column::STATUS, seed::STATUS);
        row.set_cell(column::CREATED, issue.created_at.sheet_date());
        row.set_cell(column::TITLE, issue.title.as_str());
        row.set_cell(column::REPOSITORY, code.as_str());
        row.set_cell(column::API_LABELS, self.projects.project_labels(&issue.labels));
        row.set_cell(column::ASSIGNEE, seed::ASSIGNEE);

        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{IssueNumber, RepoCode, RepositoryEntry, Timestamp, DEFAULT_LABEL_MARKER};

    fn catalogs() -> (RepositoryCatalog, ProjectCatalog) {
        let repositories = RepositoryCatalog::new(vec![RepositoryEntry {
            name: RepositoryId::new("googleapis/google-cloud-python").unwrap(),
            code: RepoCode::new("GCP").unwrap(),
        }])
        .unwrap();
        let projects = ProjectCatalog::new(
            DEFAULT_LABEL_MARKER,
            HashMap::from([("api: spanner".to_string(), "Spanner".to_string())]),
        );
        (repositories, projects)
    }

    fn issue(number: u64, is_pull_request: bool) -> Issue {
        Issue {
            number: IssueNumber::new(number),
            title: "Spanner: session pool leaks".into(),
            created_at: Timestamp::from_utc(Utc.with_ymd_and_hms(2019, 2, 14, 9, 30, 0).unwrap()),
            html_url: format!("https://github.com/googleapis/google-cloud-python/issues/{number}"),
            labels: vec!["api: spanner".into(), "api: unknown-x".into(), "bug".into()],
            is_pull_request,
        }
    }

    #[test]
    fn issue_becomes_a_seeded_row() {
        let (repositories, projects) = catalogs();
        let links = LinkCodec::default();
        let builder = RowBuilder::new(&repositories, &projects, &links);
        let repo = RepositoryId::new("googleapis/google-cloud-python").unwrap();

        let row = builder.build(&issue(7261, false), &repo).unwrap().unwrap();

        assert_eq!(
            row.cells(),
            [
                "Medium",
                r#"=ГИПЕРССЫЛКА("https://github.com/googleapis/google-cloud-python/issues/7261";"7261")"#,
                "PENDING",
                "14 Feb 2019",
                "Spanner: session pool leaks",
                "GCP",
                "Other, Spanner",
                "N/A",
            ]
        );
    }

    #[test]
    fn pull_requests_are_skipped() {
        let (repositories, projects) = catalogs();
        let links = LinkCodec::default();
        let builder = RowBuilder::new(&repositories, &projects, &links);
        let repo = RepositoryId::new("googleapis/google-cloud-python").unwrap();

        assert_eq!(builder.build(&issue(1, true), &repo).unwrap(), None);
    }

    #[test]
    fn unknown_repository_fails() {
        let (repositories, projects) = catalogs();
        let links = LinkCodec::default();
        let builder = RowBuilder::new(&repositories, &projects, &links);
        let repo = RepositoryId::new("googleapis/somewhere-else").unwrap();

        let err = builder.build(&issue(1, false), &repo).unwrap_err();
        assert!(matches!(err, SyncError::UnknownRepository { .. }));
    }
}
