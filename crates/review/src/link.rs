//! Encoding and decoding of the `Issue` cell.
//!
//! The sheet stores issue links as a hyperlink formula whose visible text is
//! the issue number, e.g.
//!
//! ```text
//! =ГИПЕРССЫЛКА("https://github.com/googleapis/google-cloud-python/issues/5";"5")
//! ```
//!
//! The function name depends on the spreadsheet locale, so it is part of the
//! codec. Depending on how the sheet is read, the cell comes back either as
//! the formula or as its display value (`"5"`); [`LinkCodec::decode`] accepts
//! both.

use crate::{IssueNumber, RepositoryId};

/// Hyperlink function name of the spreadsheet the tool was first deployed on.
pub const DEFAULT_HYPERLINK_FUNCTION: &str = "ГИПЕРССЫЛКА";

/// Web root used to rebuild links of issues that are no longer open.
pub const DEFAULT_WEB_URL: &str = "https://github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCodec {
    function: String,
    web_url: String,
}

impl Default for LinkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_HYPERLINK_FUNCTION, DEFAULT_WEB_URL)
    }
}

impl LinkCodec {
    pub fn new(function: impl Into<String>, web_url: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            web_url: web_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Renders the link cell for an open issue from its native URL.
    pub fn encode(&self, url: &str, number: IssueNumber) -> String {
        format!(r#"={}("{url}";"{number}")"#, self.function)
    }

    /// Renders the link cell for an issue that left the open set.
    ///
    /// The URL is rebuilt from the repository and the number alone, since the
    /// issue's own URL is no longer known.
    pub fn encode_closed(&self, repository: &RepositoryId, number: IssueNumber) -> String {
        let url = format!("{}/{repository}/issues/{number}", self.web_url);
        self.encode(&url, number)
    }

    /// Recovers the issue number from a link cell.
    ///
    /// Formula cells are split on `;` and the second argument is stripped of
    /// its surrounding quotes and closing parenthesis. Cells without `;` are
    /// taken as a display value.
    pub fn decode(&self, cell: &str) -> Option<IssueNumber> {
        let text = match cell.split(';').nth(1) {
            Some(argument) => argument
                .trim()
                .trim_start_matches('"')
                .trim_end_matches([')', '"']),
            None => cell.trim().trim_start_matches('#'),
        };
        text.trim().parse().ok().map(IssueNumber::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_link_matches_the_stored_format() {
        let codec = LinkCodec::default();
        let cell = codec.encode(
            "https://github.com/googleapis/google-cloud-python/issues/5",
            IssueNumber::new(5),
        );
        assert_eq!(
            cell,
            r#"=ГИПЕРССЫЛКА("https://github.com/googleapis/google-cloud-python/issues/5";"5")"#
        );
        assert_eq!(codec.decode(&cell), Some(IssueNumber::new(5)));
    }

    #[test]
    fn closed_link_is_rebuilt_from_repository_and_number() {
        let codec = LinkCodec::new("HYPERLINK", "https://github.com/");
        let repo = RepositoryId::new("googleapis/google-resumable-media-python").unwrap();
        assert_eq!(
            codec.encode_closed(&repo, IssueNumber::new(42)),
            r#"=HYPERLINK("https://github.com/googleapis/google-resumable-media-python/issues/42";"42")"#
        );
    }

    #[test]
    fn display_values_decode_as_numbers() {
        let codec = LinkCodec::default();
        assert_eq!(codec.decode("117"), Some(IssueNumber::new(117)));
        assert_eq!(codec.decode(" 9 "), Some(IssueNumber::new(9)));
    }

    #[test]
    fn garbage_does_not_decode() {
        let codec = LinkCodec::default();
        assert_eq!(codec.decode(""), None);
        assert_eq!(codec.decode("see comment"), None);
        assert_eq!(codec.decode(r#"=HYPERLINK("x";"abc")"#), None);
    }
}
