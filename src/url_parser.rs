//! Extract document tokens from Feishu/Lark document URLs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LarkError, Result};

/// Kind of document a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Docx,
    Wiki,
    Sheet,
    Bitable,
    Doc,
}

impl DocumentKind {
    /// The `obj_type` name the open platform uses for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Docx => "docx",
            DocumentKind::Wiki => "wiki",
            DocumentKind::Sheet => "sheet",
            DocumentKind::Bitable => "bitable",
            DocumentKind::Doc => "doc",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path segment patterns, checked in order.
static DOCUMENT_URL_PATTERNS: LazyLock<Vec<(Regex, DocumentKind)>> = LazyLock::new(|| {
    [
        (r"/docx/([a-zA-Z0-9]+)", DocumentKind::Docx),
        (r"/wiki/([a-zA-Z0-9]+)", DocumentKind::Wiki),
        (r"/sheets/([a-zA-Z0-9]+)", DocumentKind::Sheet),
        (r"/base/([a-zA-Z0-9]+)", DocumentKind::Bitable),
        (r"/docs/([a-zA-Z0-9]+)", DocumentKind::Doc),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("Invalid document URL regex"), kind))
    .collect()
});

/// Valid bare token pattern.
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("Invalid token regex"));

/// Parse a document URL into its token and kind.
///
/// Supports URLs of the form `https://{domain}/{docx|wiki|sheets|base|docs}/{token}`.
///
/// # Examples
///
/// ```
/// use lark_client::url_parser::{parse_document_url, DocumentKind};
///
/// let parsed = parse_document_url("https://example.feishu.cn/docx/AbC123").unwrap();
/// assert_eq!(parsed, ("AbC123".to_string(), DocumentKind::Docx));
/// ```
pub fn parse_document_url(url: &str) -> Option<(String, DocumentKind)> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    DOCUMENT_URL_PATTERNS.iter().find_map(|(regex, kind)| {
        regex
            .captures(trimmed)
            .and_then(|captures| captures.get(1))
            .map(|token| (token.as_str().to_string(), *kind))
    })
}

/// Extract a document token from a URL, or validate a bare token.
pub fn extract_token(url_or_token: &str) -> Result<String> {
    let trimmed = url_or_token.trim();

    if let Some((token, _)) = parse_document_url(trimmed) {
        return Ok(token);
    }

    if TOKEN_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(LarkError::InvalidUrlOrToken(url_or_token.to_string()))
}
