//! A deterministic in-memory browser over a fixed set of HTML pages.
//!
//! Clicking an anchor follows its href, the way a browser would without
//! JavaScript, and client-side redirects can be declared per URL. Navigating
//! to a URL that is not in the site fails to load.

use super::{Anchor, AnchorScope, Heading, PageContext, SessionFactory};
use crate::error::{Error, Result};
use crate::parsers::html;
use crate::utils::without_fragment;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// HTML pages keyed by URL without fragment
#[derive(Debug, Clone, Default)]
pub struct Site {
    pages: HashMap<String, String>,
    redirects: HashMap<String, Url>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page at an absolute URL. Relative URLs are skipped.
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        match Url::parse(url) {
            Ok(url) => {
                self.pages
                    .insert(without_fragment(&url).to_string(), html.to_string());
            }
            Err(e) => ::log::warn!("Skipping snapshot page {}: {}", url, e),
        }
        self
    }

    /// Send visitors of `from` on to `to`, as a client-side redirect would
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        match (Url::parse(from), Url::parse(to)) {
            (Ok(from), Ok(to)) => {
                self.redirects.insert(without_fragment(&from).to_string(), to);
            }
            _ => ::log::warn!("Skipping snapshot redirect {} -> {}", from, to),
        }
        self
    }

    /// Where a browser ends up after requesting `url`
    fn follow(&self, url: Url) -> Url {
        match self.redirects.get(without_fragment(&url).as_str()) {
            Some(to) if to.fragment().is_none() && url.fragment().is_some() => {
                let mut to = to.clone();
                to.set_fragment(url.fragment());
                to
            }
            Some(to) => to.clone(),
            None => url,
        }
    }

    fn page(&self, url: &Url) -> Option<&str> {
        self.pages
            .get(without_fragment(url).as_str())
            .map(String::as_str)
    }
}

/// Browser session over a [`Site`]
#[derive(Debug)]
pub struct SnapshotContext {
    site: Arc<Site>,
    history: Vec<Url>,
    navigations: Arc<AtomicUsize>,
    closed: bool,
}

impl SnapshotContext {
    pub fn new(site: Arc<Site>) -> Self {
        Self {
            site,
            history: Vec::new(),
            navigations: Arc::new(AtomicUsize::new(0)),
            closed: false,
        }
    }

    /// Number of `navigate` calls made through this session
    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> Option<&Url> {
        self.history.last()
    }

    /// HTML of the current page. A page outside the site renders empty.
    fn current_html(&self) -> &str {
        self.current()
            .and_then(|url| self.site.page(url))
            .unwrap_or("")
    }
}

#[async_trait]
impl PageContext for SnapshotContext {
    async fn navigate(&mut self, url: &str) -> bool {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let url = self.site.follow(url);
        if self.site.page(&url).is_none() {
            ::log::debug!("Snapshot has no page for {}", url);
            return false;
        }
        self.history.push(url);
        true
    }

    async fn current_url(&mut self) -> Option<Url> {
        self.current().cloned()
    }

    async fn list_anchors(&mut self, scope: AnchorScope) -> Vec<Anchor> {
        html::parse_anchors(self.current_html(), self.current(), scope)
    }

    async fn find_headings(&mut self) -> Vec<Heading> {
        html::parse_headings(self.current_html())
    }

    async fn find_by_exact_text(&mut self, text: &str) -> Option<Anchor> {
        html::find_link_by_text(self.current_html(), self.current(), text, false)
    }

    async fn find_by_partial_text(&mut self, text: &str) -> Option<Anchor> {
        html::find_link_by_text(self.current_html(), self.current(), text, true)
    }

    async fn has_id(&mut self, id: &str) -> bool {
        html::has_element_id(self.current_html(), id)
    }

    async fn click_and_observe(&mut self, anchor: &Anchor, _max_wait: Duration) -> Result<Url> {
        let current = self
            .current()
            .cloned()
            .ok_or_else(|| Error::Navigation("no page loaded".to_string()))?;

        let href = html::locate_href(self.current_html(), Some(&current), &anchor.locator)
            .ok_or_else(|| Error::Navigation(format!("element not found: {:?}", anchor.locator)))?;

        let Some(target) = href.and_then(|h| current.join(&h).ok()) else {
            return Ok(current);
        };
        let target = self.site.follow(target);
        if target != current {
            self.history.push(target.clone());
        }
        Ok(target)
    }

    async fn go_back(&mut self) -> bool {
        if self.history.len() > 1 {
            self.history.pop();
            true
        } else {
            false
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.history.clear();
    }
}

/// Opens [`SnapshotContext`] sessions over a shared [`Site`]
#[derive(Debug, Clone)]
pub struct SnapshotFactory {
    site: Arc<Site>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl SnapshotFactory {
    pub fn new(site: Site) -> Self {
        Self {
            site: Arc::new(site),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sessions opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far, explicitly or by drop
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A [`SnapshotContext`] that reports its release to the factory
#[derive(Debug)]
pub struct TrackedSnapshot {
    inner: SnapshotContext,
    closed: Arc<AtomicUsize>,
    released: bool,
}

impl TrackedSnapshot {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for TrackedSnapshot {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl PageContext for TrackedSnapshot {
    async fn navigate(&mut self, url: &str) -> bool {
        self.inner.navigate(url).await
    }

    async fn current_url(&mut self) -> Option<Url> {
        self.inner.current_url().await
    }

    async fn list_anchors(&mut self, scope: AnchorScope) -> Vec<Anchor> {
        self.inner.list_anchors(scope).await
    }

    async fn find_headings(&mut self) -> Vec<Heading> {
        self.inner.find_headings().await
    }

    async fn find_by_exact_text(&mut self, text: &str) -> Option<Anchor> {
        self.inner.find_by_exact_text(text).await
    }

    async fn find_by_partial_text(&mut self, text: &str) -> Option<Anchor> {
        self.inner.find_by_partial_text(text).await
    }

    async fn has_id(&mut self, id: &str) -> bool {
        self.inner.has_id(id).await
    }

    async fn click_and_observe(&mut self, anchor: &Anchor, max_wait: Duration) -> Result<Url> {
        self.inner.click_and_observe(anchor, max_wait).await
    }

    async fn go_back(&mut self) -> bool {
        self.inner.go_back().await
    }

    async fn close(&mut self) {
        self.inner.close().await;
        self.release();
    }
}

#[async_trait]
impl SessionFactory for SnapshotFactory {
    type Context = TrackedSnapshot;

    async fn open(&self, _worker_id: usize) -> Result<Self::Context> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(TrackedSnapshot {
            inner: SnapshotContext::new(Arc::clone(&self.site)),
            closed: Arc::clone(&self.closed),
            released: false,
        })
    }
}
