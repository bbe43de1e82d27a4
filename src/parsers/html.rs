use crate::browser::{Anchor, AnchorScope, ElementLocator, Heading};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            ::log::error!("Invalid selector {}: {:?}", css, e);
            None
        }
    }
}

/// Visible text of an element with whitespace collapsed
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an href against the page it appears on
fn resolve_href(href: &str, page_url: Option<&Url>) -> String {
    match page_url.and_then(|base| base.join(href).ok()) {
        Some(resolved) => resolved.to_string(),
        None => href.to_string(),
    }
}

/// Extracts the anchors of one page region, in document order
pub fn parse_anchors(html: &str, page_url: Option<&Url>, scope: AnchorScope) -> Vec<Anchor> {
    let Some(link_selector) = selector(scope.selector()) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let anchors = doc
        .select(&link_selector)
        .enumerate()
        .map(|(index, element)| Anchor {
            href: element
                .value()
                .attr("href")
                .map(|href| resolve_href(href, page_url)),
            text: element_text(&element),
            locator: ElementLocator::Position { scope, index },
        })
        .collect::<Vec<_>>();

    ::log::debug!("HTML parser found {} anchors in {:?}", anchors.len(), scope);
    anchors
}

/// Extracts `h1`..`h6` elements that carry an id or some text
pub fn parse_headings(html: &str) -> Vec<Heading> {
    let Some(heading_selector) = selector(HEADING_SELECTOR) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    doc.select(&heading_selector)
        .filter_map(|element| {
            let id = element
                .value()
                .attr("id")
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            let text = element_text(&element);
            if id.is_none() && text.is_empty() {
                return None;
            }
            let level = element
                .value()
                .name()
                .trim_start_matches('h')
                .parse()
                .unwrap_or(0);
            Some(Heading { id, text, level })
        })
        .collect()
}

/// Finds the first anchor whose text equals `text`, or contains it when
/// `partial` is set
pub fn find_link_by_text(
    html: &str,
    page_url: Option<&Url>,
    text: &str,
    partial: bool,
) -> Option<Anchor> {
    let wanted = text.trim();
    if wanted.is_empty() {
        return None;
    }

    parse_anchors(html, page_url, AnchorScope::Document)
        .into_iter()
        .find(|anchor| {
            if partial {
                anchor.text.contains(wanted)
            } else {
                anchor.text == wanted
            }
        })
        .map(|anchor| Anchor {
            locator: if partial {
                ElementLocator::PartialText(wanted.to_string())
            } else {
                ElementLocator::ExactText(wanted.to_string())
            },
            ..anchor
        })
}

/// Whether any element carries this id
pub fn has_element_id(html: &str, id: &str) -> bool {
    let Some(id_selector) = selector("[id]") else {
        return false;
    };
    let doc = Html::parse_document(html);
    doc.select(&id_selector)
        .any(|element| element.value().attr("id") == Some(id))
}

/// Resolves a locator to the href of the element it points at.
///
/// Returns `None` when the element no longer exists, `Some(None)` when it
/// exists but has no href.
pub fn locate_href(
    html: &str,
    page_url: Option<&Url>,
    locator: &ElementLocator,
) -> Option<Option<String>> {
    let anchor = match locator {
        ElementLocator::Position { scope, index } => {
            parse_anchors(html, page_url, *scope).into_iter().nth(*index)
        }
        ElementLocator::ExactText(text) => find_link_by_text(html, page_url, text, false),
        ElementLocator::PartialText(text) => find_link_by_text(html, page_url, text, true),
    };
    anchor.map(|a| a.href)
}
