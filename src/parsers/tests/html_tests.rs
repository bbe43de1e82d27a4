use crate::browser::{AnchorScope, ElementLocator};
use crate::parsers::html;
use url::Url;

const PAGE: &str = r##"<html><body>
<nav><a href="/guides/track">Track   runs</a><a href="/guides/sweeps">Sweeps</a></nav>
<div class="breadcrumb"><a href="/guides">Guides</a></div>
<h1 id="intro">Intro</h1>
<h2>Set up your environment</h2>
<h3 id=""></h3>
<p><a href="../reference/api">API reference</a> and <a>no href</a></p>
<a href="#intro">Back to top</a>
</body></html>"##;

fn page_url() -> Url {
    Url::parse("https://x.io/guides/start").unwrap()
}

#[test]
fn test_document_anchors_resolved_against_page() {
    let anchors = html::parse_anchors(PAGE, Some(&page_url()), AnchorScope::Document);
    assert_eq!(anchors.len(), 6);
    assert_eq!(anchors[0].href.as_deref(), Some("https://x.io/guides/track"));
    assert_eq!(anchors[0].text, "Track runs");
    assert_eq!(anchors[3].href.as_deref(), Some("https://x.io/reference/api"));
    assert_eq!(anchors[4].href, None);
    assert_eq!(anchors[5].href.as_deref(), Some("https://x.io/guides/start#intro"));
    assert_eq!(
        anchors[3].locator,
        ElementLocator::Position {
            scope: AnchorScope::Document,
            index: 3
        }
    );
}

#[test]
fn test_scoped_anchors() {
    let nav = html::parse_anchors(PAGE, Some(&page_url()), AnchorScope::Navigation);
    assert_eq!(nav.len(), 2);
    let crumbs = html::parse_anchors(PAGE, Some(&page_url()), AnchorScope::Breadcrumb);
    assert_eq!(crumbs.len(), 1);
    assert_eq!(crumbs[0].text, "Guides");
}

#[test]
fn test_anchors_without_page_url_keep_raw_href() {
    let anchors = html::parse_anchors(PAGE, None, AnchorScope::Breadcrumb);
    assert_eq!(anchors[0].href.as_deref(), Some("/guides"));
}

#[test]
fn test_headings() {
    let headings = html::parse_headings(PAGE);
    assert_eq!(headings.len(), 2);
    assert_eq!(headings[0].id.as_deref(), Some("intro"));
    assert_eq!(headings[0].level, 1);
    assert_eq!(headings[1].id, None);
    assert_eq!(headings[1].text, "Set up your environment");
    assert_eq!(headings[1].level, 2);
}

#[test]
fn test_find_link_by_text() {
    let exact = html::find_link_by_text(PAGE, Some(&page_url()), "Sweeps", false).unwrap();
    assert_eq!(exact.href.as_deref(), Some("https://x.io/guides/sweeps"));
    assert_eq!(exact.locator, ElementLocator::ExactText("Sweeps".to_string()));

    assert!(html::find_link_by_text(PAGE, Some(&page_url()), "API", false).is_none());
    let partial = html::find_link_by_text(PAGE, Some(&page_url()), "API", true).unwrap();
    assert_eq!(partial.text, "API reference");
}

#[test]
fn test_has_element_id() {
    assert!(html::has_element_id(PAGE, "intro"));
    assert!(!html::has_element_id(PAGE, "missing"));
}

#[test]
fn test_locate_href() {
    let locator = ElementLocator::Position {
        scope: AnchorScope::Navigation,
        index: 1,
    };
    assert_eq!(
        html::locate_href(PAGE, Some(&page_url()), &locator),
        Some(Some("https://x.io/guides/sweeps".to_string()))
    );

    let gone = ElementLocator::Position {
        scope: AnchorScope::Navigation,
        index: 9,
    };
    assert_eq!(html::locate_href(PAGE, Some(&page_url()), &gone), None);
}
