//! Static lookup tables injected at startup.
//!
//! [`RepositoryCatalog`] maps full repository names to the short codes shown
//! in the sheet and back; [`ProjectCatalog`] maps raw labels to project names.
//! Both are plain configuration data: adding a repository or a project never
//! touches the reconciliation code.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{RepoCode, RepositoryId, SyncError};

/// Project name used for category labels missing from the project table.
pub const OTHER_PROJECT: &str = "Other";

/// Substring that marks a label as a project/category label.
pub const DEFAULT_LABEL_MARKER: &str = "api:";

/// One tracked repository and its short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: RepositoryId,
    pub code: RepoCode,
}

/// Ordered, bidirectional repository ↔ code table.
///
/// Order is the fetch order of the Table Fetcher.
#[derive(Debug, Clone)]
pub struct RepositoryCatalog {
    entries: Vec<RepositoryEntry>,
    by_name: HashMap<RepositoryId, RepoCode>,
    by_code: HashMap<RepoCode, RepositoryId>,
}

impl RepositoryCatalog {
    /// Builds the catalog, rejecting tables that are not 1:1.
    pub fn new(entries: Vec<RepositoryEntry>) -> Result<Self, SyncError> {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_code = HashMap::with_capacity(entries.len());

        for entry in &entries {
            if by_name.insert(entry.name.clone(), entry.code.clone()).is_some() {
                return Err(SyncError::Configuration {
                    message: format!("repository '{}' is listed more than once", entry.name),
                });
            }
            if by_code.insert(entry.code.clone(), entry.name.clone()).is_some() {
                return Err(SyncError::Configuration {
                    message: format!("repository code '{}' is used more than once", entry.code),
                });
            }
        }

        Ok(Self {
            entries,
            by_name,
            by_code,
        })
    }

    pub fn entries(&self) -> &[RepositoryEntry] {
        &self.entries
    }

    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryId> {
        self.entries.iter().map(|e| &e.name)
    }

    /// Short code for a repository.
    pub fn code_of(&self, repository: &RepositoryId) -> Result<&RepoCode, SyncError> {
        self.by_name
            .get(repository)
            .ok_or_else(|| SyncError::UnknownRepository {
                repository: repository.clone(),
            })
    }

    /// Repository for a short code.
    pub fn repository_of(&self, code: &RepoCode) -> Result<&RepositoryId, SyncError> {
        self.by_code
            .get(code)
            .ok_or_else(|| SyncError::UnknownRepositoryCode { code: code.clone() })
    }
}

/// Label → project display name table.
#[derive(Debug, Clone)]
pub struct ProjectCatalog {
    marker: String,
    names: HashMap<String, String>,
}

impl ProjectCatalog {
    pub fn new(marker: impl Into<String>, names: HashMap<String, String>) -> Self {
        Self {
            marker: marker.into(),
            names,
        }
    }

    /// Derives the `API` cell from an issue's raw labels.
    ///
    /// Only labels containing the marker count. Known labels map through the
    /// table, unknown ones collapse to [`OTHER_PROJECT`]. The result is
    /// deduplicated, sorted and joined with `", "`; it is empty when no label
    /// matches.
    pub fn project_labels<S: AsRef<str>>(&self, labels: &[S]) -> String {
        let projects: BTreeSet<&str> = labels
            .iter()
            .map(AsRef::as_ref)
            .filter(|label| label.contains(self.marker.as_str()))
            .map(|label| {
                self.names
                    .get(label)
                    .map(String::as_str)
                    .unwrap_or(OTHER_PROJECT)
            })
            .collect();

        projects.into_iter().collect::<Vec<_>>().join(", ")
    }
}
