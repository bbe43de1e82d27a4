use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Glyph that starts a broken-link line in the catalogue
pub const LINK_MARKER: char = '⎿';

/// One source page and the broken links found on it, in catalogue order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub page: String,
    pub broken_links: Vec<String>,
}

impl Entry {
    pub fn new(page: impl Into<String>, broken_links: Vec<String>) -> Self {
        Self {
            page: page.into(),
            broken_links,
        }
    }
}

/// Options for reading a catalogue file
#[derive(Debug, Clone, Default)]
pub struct CatalogueOptions {
    /// Join lines that were wrapped before parsing
    pub repair_wrapped_lines: bool,
    /// Prefixes that always start a new line during repair
    pub page_prefixes: Vec<String>,
}

/// Reads and parses a catalogue file.
///
/// Fails only when the file cannot be read as UTF-8 text.
pub fn read_catalogue<P: AsRef<Path>>(path: P, options: &CatalogueOptions) -> Result<Vec<Entry>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let entries = if options.repair_wrapped_lines {
        parse_catalogue(&repair_wrapped_lines(&content, &options.page_prefixes))
    } else {
        parse_catalogue(&content)
    };

    ::log::info!(
        "Parsed {} pages with broken links from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Parses catalogue text into entries.
///
/// A marker line attaches a broken link to the most recent page line. Any
/// other non-blank line starts a new page. Pages without links are dropped.
pub fn parse_catalogue(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut current_page: Option<String> = None;
    let mut current_links: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(link) = line.strip_prefix(LINK_MARKER) {
            let link = link.trim();
            if current_page.is_some() && !link.is_empty() {
                current_links.push(link.to_string());
            } else {
                ::log::trace!("Ignoring broken link line without a page: {}", line);
            }
        } else {
            flush_entry(&mut entries, current_page.take(), &mut current_links);
            current_page = Some(line.to_string());
        }
    }

    flush_entry(&mut entries, current_page, &mut current_links);
    entries
}

fn flush_entry(entries: &mut Vec<Entry>, page: Option<String>, links: &mut Vec<String>) {
    match page {
        Some(page) if !links.is_empty() => {
            entries.push(Entry::new(page, std::mem::take(links)));
        }
        Some(page) => {
            ::log::debug!("Dropping page without broken links: {}", page);
        }
        None => {}
    }
    links.clear();
}

/// Joins catalogue lines that were wrapped by the tool that printed them.
///
/// A line that does not end in `.mdx` or `/` is joined with the next line
/// when the next line is non-blank and starts neither with the link marker
/// nor with one of `page_prefixes`.
pub fn repair_wrapped_lines(content: &str, page_prefixes: &[String]) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut repaired = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let current = lines[i].trim_end();

        if let Some(next) = lines.get(i + 1).map(|l| l.trim()) {
            let starts_new_line = next.starts_with(LINK_MARKER)
                || page_prefixes.iter().any(|p| next.starts_with(p.as_str()));
            let is_complete = current.ends_with(".mdx") || current.ends_with('/');

            if !next.is_empty() && !starts_new_line && !is_complete && !current.trim().is_empty() {
                repaired.push(format!("{current}{next}"));
                i += 2;
                continue;
            }
        }

        repaired.push(lines[i].to_string());
        i += 1;
    }

    let mut out = repaired.join("\n");
    if content.ends_with('\n') {
        out.push('\n');
    }
    out
}
