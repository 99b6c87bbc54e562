//! `review-sheet.toml`: what to track and where to write it.
//!
//! Every section has defaults matching the review sheet as first deployed, so
//! a config file only needs `[sheet] spreadsheet_id`. Tokens never live in
//! the file; the file names the environment variables that hold them.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use review::{
    default_columns, Color, ColumnSpec, RepositoryEntry, TrackerSettings, DEFAULT_HYPERLINK_FUNCTION,
    DEFAULT_LABEL_MARKER, DEFAULT_WEB_URL,
};

pub const DEFAULT_CONFIG_PATH: &str = "review-sheet.toml";

/// Seconds between two sync cycles: 60 hours.
const DEFAULT_INTERVAL_SECS: u64 = 216_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_label_marker")]
    pub label_marker: String,
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryEntry>,
    #[serde(default = "default_projects")]
    pub projects: HashMap<String, String>,
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    /// Target spreadsheet. Only `init` runs without one.
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_sheet_name")]
    pub name: String,
    #[serde(default)]
    pub gid: u64,
    /// Name of the hyperlink function in the spreadsheet's locale.
    #[serde(default = "default_hyperlink_function")]
    pub hyperlink_function: String,
    #[serde(default)]
    pub highlight: Color,
}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

fn default_hyperlink_function() -> String {
    DEFAULT_HYPERLINK_FUNCTION.to_string()
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            name: default_sheet_name(),
            gid: 0,
            hyperlink_function: default_hyperlink_function(),
            highlight: Color::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api")]
    pub api_url: String,
    /// Root that closed-issue links are rebuilt under.
    #[serde(default = "default_web_url")]
    pub web_url: String,
    #[serde(default = "default_github_token_env")]
    pub token_env: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_github_api() -> String {
    github::DEFAULT_API_URL.to_string()
}

fn default_web_url() -> String {
    DEFAULT_WEB_URL.to_string()
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_per_page() -> u32 {
    github::MAX_PER_PAGE
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api(),
            web_url: default_web_url(),
            token_env: default_github_token_env(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleConfig {
    #[serde(default = "default_sheets_api")]
    pub api_url: String,
    /// Variable holding an OAuth access token with the spreadsheets scope.
    #[serde(default = "default_google_token_env")]
    pub token_env: String,
}

fn default_sheets_api() -> String {
    sheets::DEFAULT_API_URL.to_string()
}

fn default_google_token_env() -> String {
    "GOOGLE_OAUTH_TOKEN".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_url: default_sheets_api(),
            token_env: default_google_token_env(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`.
    /// `OTEL_EXPORTER_OTLP_ENDPOINT` is used when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_label_marker() -> String {
    DEFAULT_LABEL_MARKER.to_string()
}

fn default_repositories() -> Vec<RepositoryEntry> {
    [
        ("googleapis/google-cloud-python", "GCP"),
        ("googleapis/google-resumable-media-python", "GRMP"),
    ]
    .into_iter()
    .filter_map(|(name, code)| {
        Some(RepositoryEntry {
            name: review::RepositoryId::new(name)?,
            code: review::RepoCode::new(code)?,
        })
    })
    .collect()
}

fn default_projects() -> HashMap<String, String> {
    [
        ("api: pubsub", "Pubsub"),
        ("api: bigtable", "BigTable"),
        ("api: bigquery", "BigQuery"),
        ("api: firestore", "FireStore"),
        ("api: storage", "Storage"),
        ("api: spanner", "Spanner"),
        ("api: core", "Core"),
    ]
    .into_iter()
    .map(|(label, name)| (label.to_string(), name.to_string()))
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            label_marker: default_label_marker(),
            sheet: SheetConfig::default(),
            github: GitHubConfig::default(),
            google: GoogleConfig::default(),
            repositories: default_repositories(),
            projects: default_projects(),
            columns: default_columns(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            repositories: self.repositories.clone(),
            projects: self.projects.clone(),
            label_marker: self.label_marker.clone(),
            hyperlink_function: self.sheet.hyperlink_function.clone(),
            web_url: self.github.web_url.clone(),
            highlight: self.sheet.highlight,
        }
    }

    /// The collector endpoint, file setting first.
    pub fn otlp_endpoint(&self) -> Option<String> {
        self.telemetry
            .otlp_endpoint
            .clone()
            .or_else(|| std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok())
            .filter(|e| !e.trim().is_empty())
    }
}

/// Loads the config file. A missing file at the default path yields the
/// defaults; a missing file the user named explicitly is an error.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };

    if !path.exists() {
        if explicit {
            anyhow::bail!("Config file not found at {}", path.display());
        }
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
}

fn parse(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Reads a secret from the environment; `None` when unset or empty.
pub fn secret(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_file_reproduces_the_first_deployment() {
        let config = parse("").unwrap();

        assert_eq!(config.interval_secs, 216_000);
        assert_eq!(config.label_marker, "api:");
        assert_eq!(config.sheet.name, "Sheet1");
        assert_eq!(config.sheet.hyperlink_function, "ГИПЕРССЫЛКА");
        assert_eq!(config.sheet.highlight, Color::CLOSED);
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[1].code.as_str(), "GRMP");
        assert_eq!(config.projects.len(), 7);
        assert_eq!(config.projects["api: spanner"], "Spanner");
        assert_eq!(config.columns.len(), 13);
        assert_eq!(config.github.per_page, 100);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse(
            r#"
            interval_secs = 3600

            [sheet]
            spreadsheet_id = "1_ENbCfw7V5kY32jLM3hUlwXxv80poIHpXFdfysM9r-s"
            hyperlink_function = "HYPERLINK"
            highlight = { red = 1.0, green = 0.9, blue = 0.0 }

            [[repositories]]
            name = "acme/widgets"
            code = "W"

            [projects]
            "api: gears" = "Gears"

            [telemetry]
            otlp_endpoint = "http://localhost:4317"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval(), Duration::from_secs(3600));
        assert_eq!(
            config.sheet.spreadsheet_id.as_deref(),
            Some("1_ENbCfw7V5kY32jLM3hUlwXxv80poIHpXFdfysM9r-s")
        );
        assert_eq!(config.sheet.highlight.alpha, 1.0);
        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.otlp_endpoint().as_deref(), Some("http://localhost:4317"));

        let settings = config.tracker_settings();
        assert_eq!(settings.hyperlink_function, "HYPERLINK");
        assert_eq!(settings.web_url, "https://github.com");
        assert_eq!(settings.repositories[0].name.as_str(), "acme/widgets");
    }

    #[test]
    fn custom_columns_replace_the_default_layout() {
        let config = parse(
            r#"
            [[columns]]
            name = "Priority"
            width = 80
            align = "CENTER"
            choices = ["Low", "High"]

            [[columns]]
            name = "Issue"
            "#,
        )
        .unwrap();

        assert_eq!(config.columns.len(), 2);
        assert_eq!(config.columns[0].align, Some(review::Alignment::Center));
        assert_eq!(config.columns[1].width, None);
    }

    #[test]
    fn typos_are_rejected() {
        assert!(parse("[sheet]\nspreadsheet = \"x\"").is_err());
    }

    #[test]
    fn named_config_file_must_exist() {
        let err = load(Some(Path::new("/nonexistent/review-sheet.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
