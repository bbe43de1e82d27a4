use url::Url;

/// Extensions a catalogue page path may carry for its source document
pub const SOURCE_EXTENSIONS: [&str; 2] = [".mdx", ".md"];

/// Build the absolute URL for a link found on the site.
///
/// Absolute-path links are appended to the base with its trailing slashes
/// removed. Anything else is joined under the base treated as a directory.
pub fn join_link(base_url: &str, link: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if link.starts_with('/') {
        return format!("{base}{link}");
    }

    match Url::parse(&format!("{base}/")).and_then(|b| b.join(link)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{base}/{link}"),
    }
}

/// Published URL of a catalogue page such as `guides/intro.mdx`
pub fn page_url(base_url: &str, page: &str) -> String {
    let mut clean = page.trim_start_matches('/');
    for ext in SOURCE_EXTENSIONS {
        if let Some(stripped) = clean.strip_suffix(ext) {
            clean = stripped;
            break;
        }
    }
    join_link(base_url, clean)
}

/// The URL with its fragment removed, used to compare page identity
pub fn without_fragment(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}
