use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A link split on its first `#` into a path and an optional anchor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LinkTarget {
    /// Everything before the first `#`
    pub path: String,

    /// Fragment after the first `#`, never empty
    pub anchor: Option<String>,
}

impl LinkTarget {
    /// Split a link string on its first `#`
    pub fn parse(link: &str) -> Self {
        match link.split_once('#') {
            Some((path, anchor)) => Self {
                path: path.to_string(),
                anchor: (!anchor.is_empty()).then(|| anchor.to_string()),
            },
            None => Self {
                path: link.to_string(),
                anchor: None,
            },
        }
    }

    /// Path and fragment of an absolute URL, dropping scheme and host
    pub fn from_url(url: &Url) -> Self {
        Self {
            path: url.path().to_string(),
            anchor: url.fragment().filter(|f| !f.is_empty()).map(str::to_string),
        }
    }

    /// Like [`LinkTarget::from_url`] for an href string, falling back to
    /// [`LinkTarget::parse`] when the href is not an absolute URL
    pub fn from_href(href: &str) -> Self {
        match Url::parse(href) {
            Ok(url) => Self::from_url(&url),
            Err(_) => Self::parse(href),
        }
    }

    /// Replace the anchor
    pub fn with_anchor(mut self, anchor: Option<&str>) -> Self {
        self.anchor = anchor.filter(|a| !a.is_empty()).map(str::to_string);
        self
    }

    /// Non-empty `/`-separated segments of the path
    pub fn path_parts(&self) -> Vec<&str> {
        path_parts(&self.path)
    }
}

/// Non-empty `/`-separated segments of a path
pub fn path_parts(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.anchor {
            Some(anchor) => write!(f, "{}#{}", self.path, anchor),
            None => write!(f, "{}", self.path),
        }
    }
}

impl From<String> for LinkTarget {
    fn from(link: String) -> Self {
        Self::parse(&link)
    }
}

impl From<&str> for LinkTarget {
    fn from(link: &str) -> Self {
        Self::parse(link)
    }
}

impl From<LinkTarget> for String {
    fn from(target: LinkTarget) -> Self {
        target.to_string()
    }
}
