use regex::Regex;
use url::Url;

/// Decides which hrefs on a page are worth clicking as candidate fixes
#[derive(Debug)]
pub struct UrlFilter {
    /// Host the candidates must live on
    required_domain: Option<String>,
    /// Path prefix the candidates must live under
    required_path_prefix: String,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Filter for links that stay inside the site rooted at `base_url`
    pub fn for_site(base_url: &str, exclude_patterns: &[String]) -> Result<Self, regex::Error> {
        let base = Url::parse(base_url).ok();

        let mut exclude_regexes = Vec::with_capacity(exclude_patterns.len());
        for pattern in exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            required_domain: base.as_ref().and_then(|b| b.host_str()).map(str::to_string),
            required_path_prefix: base
                .as_ref()
                .map(|b| b.path().trim_end_matches('/').to_string())
                .unwrap_or_default(),
            exclude_regexes,
        })
    }

    /// Whether a resolved href may be clicked as a candidate
    pub fn accepts(&self, href: &str) -> bool {
        let Ok(url) = Url::parse(href) else {
            // relative href that could not be resolved, stays on the site
            return !self.is_excluded(href);
        };

        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        if !self.is_in_domain_scope(&url) || !self.is_in_path_scope(&url) {
            return false;
        }
        !self.is_excluded(url.as_str())
    }

    fn is_excluded(&self, href: &str) -> bool {
        self.exclude_regexes.iter().any(|regex| regex.is_match(href))
    }

    /// Check if a URL is on the site's host
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        match &self.required_domain {
            Some(domain) => url.host_str() == Some(domain.as_str()),
            None => true,
        }
    }

    /// Check if a URL is under the site's path
    fn is_in_path_scope(&self, url: &Url) -> bool {
        let path = url.path();
        self.required_path_prefix.is_empty()
            || path == self.required_path_prefix
            || path.starts_with(&format!("{}/", self.required_path_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset_patterns() -> Vec<String> {
        vec![r"\.(jpg|jpeg|png|gif|css|js|ico|svg|woff|woff2|ttf|eot|pdf)$".to_string()]
    }

    #[test]
    fn test_site_links_accepted() {
        let filter = UrlFilter::for_site("https://docs.x.io", &asset_patterns()).unwrap();
        assert!(filter.accepts("https://docs.x.io/guides/track"));
        assert!(filter.accepts("https://docs.x.io/guides/track#runs"));
    }

    #[test]
    fn test_external_links_rejected() {
        let filter = UrlFilter::for_site("https://docs.x.io", &[]).unwrap();
        assert!(!filter.accepts("https://github.com/x/repo"));
        assert!(!filter.accepts("https://x.io/guides"));
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        let filter = UrlFilter::for_site("https://docs.x.io", &[]).unwrap();
        assert!(!filter.accepts("mailto:support@x.io"));
        assert!(!filter.accepts("javascript:void(0)"));
    }

    #[test]
    fn test_path_prefix_restriction() {
        let filter = UrlFilter::for_site("https://x.io/docs/", &[]).unwrap();
        assert!(filter.accepts("https://x.io/docs"));
        assert!(filter.accepts("https://x.io/docs/guide"));
        assert!(!filter.accepts("https://x.io/docsearch"));
        assert!(!filter.accepts("https://x.io/blog/post"));
    }

    #[test]
    fn test_assets_rejected() {
        let filter = UrlFilter::for_site("https://docs.x.io", &asset_patterns()).unwrap();
        assert!(!filter.accepts("https://docs.x.io/images/logo.png"));
        assert!(!filter.accepts("/static/site.css"));
        assert!(filter.accepts("/guides/track"));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(UrlFilter::for_site("https://docs.x.io", &["(".to_string()]).is_err());
    }
}
