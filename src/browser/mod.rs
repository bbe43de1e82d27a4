pub mod snapshot;
pub mod webdriver;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Region of the page to enumerate anchors from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorScope {
    /// Every anchor in the document
    Document,
    /// Anchors inside navigation menus and sidebars
    Navigation,
    /// Anchors inside breadcrumb trails
    Breadcrumb,
}

impl AnchorScope {
    /// CSS selector matching the anchors of this scope
    pub fn selector(&self) -> &'static str {
        match self {
            AnchorScope::Document => "a",
            AnchorScope::Navigation => "nav a, .navigation a, .sidebar a, .menu a",
            AnchorScope::Breadcrumb => ".breadcrumb a, [aria-label*='breadcrumb'] a",
        }
    }
}

/// How to find an anchor element again when it is time to click it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementLocator {
    /// The n-th match of a scope selector, in document order
    Position { scope: AnchorScope, index: usize },
    /// The first link whose visible text equals this
    ExactText(String),
    /// The first link whose visible text contains this
    PartialText(String),
}

/// An anchor element on the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// href resolved against the page URL, if the element has one
    pub href: Option<String>,
    /// Visible text, whitespace collapsed
    pub text: String,
    pub locator: ElementLocator,
}

/// A heading element on the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub id: Option<String>,
    pub text: String,
    /// 1 for `h1` through 6 for `h6`
    pub level: u8,
}

/// One isolated browser session.
///
/// DOM queries never fail: a missing element or an unreadable page yields an
/// empty result. Only clicking reports errors, so the caller can tell "the
/// element vanished" apart from "nothing happened".
#[async_trait]
pub trait PageContext: Send {
    /// Load a page and wait until it is ready. Returns false on timeout or
    /// load failure.
    async fn navigate(&mut self, url: &str) -> bool;

    /// URL of the page currently shown
    async fn current_url(&mut self) -> Option<Url>;

    /// Anchors in the given region of the current page
    async fn list_anchors(&mut self, scope: AnchorScope) -> Vec<Anchor>;

    /// `h1`..`h6` elements of the current page, in document order
    async fn find_headings(&mut self) -> Vec<Heading>;

    /// First link whose visible text is exactly `text`
    async fn find_by_exact_text(&mut self, text: &str) -> Option<Anchor>;

    /// First link whose visible text contains `text`
    async fn find_by_partial_text(&mut self, text: &str) -> Option<Anchor>;

    /// Whether an element with this id exists on the current page
    async fn has_id(&mut self, id: &str) -> bool;

    /// Click the anchor and watch for the URL to change for up to
    /// `max_wait`. Returns the URL afterwards, which may be unchanged.
    async fn click_and_observe(&mut self, anchor: &Anchor, max_wait: Duration) -> Result<Url>;

    /// Go back one entry in the session history
    async fn go_back(&mut self) -> bool;

    /// End the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens a fresh [`PageContext`] for each job
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Context: PageContext + 'static;

    async fn open(&self, worker_id: usize) -> Result<Self::Context>;
}

/// Find a link by exact text, falling back to partial text
pub async fn find_by_text<C: PageContext + ?Sized>(ctx: &mut C, text: &str) -> Option<Anchor> {
    if let Some(anchor) = ctx.find_by_exact_text(text).await {
        ::log::debug!("Found link with exact text: '{}'", text);
        return Some(anchor);
    }
    let anchor = ctx.find_by_partial_text(text).await;
    if anchor.is_some() {
        ::log::debug!("Found link with partial text: '{}'", text);
    }
    anchor
}
