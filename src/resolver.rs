//! The strategy cascade that turns one broken link into a proposed fix.

use crate::browser::{AnchorScope, PageContext, find_by_text};
use crate::config::FixerConfig;
use crate::error::{Error, Result};
use crate::filter::UrlFilter;
use crate::link::LinkTarget;
use crate::matcher::{self, MatchCandidate};
use crate::parsers::SourceDocs;
use crate::probe::RedirectProbe;
use crate::results::{FixMethod, ResolutionOutcome};
use crate::utils::page_url;
use std::time::Duration;

/// Strategies that run against the loaded owning page, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Find the link by the text it has in the source document
    TextAnchor,
    /// Compare against navigation and breadcrumb links, then headings
    ContentMatch,
    /// Click the best-scoring links on the page and see where they lead
    CandidateNavigation,
}

impl Strategy {
    pub const CASCADE: [Strategy; 3] = [
        Strategy::TextAnchor,
        Strategy::ContentMatch,
        Strategy::CandidateNavigation,
    ];
}

/// A fix found by one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub target: LinkTarget,
    pub method: FixMethod,
}

impl Fix {
    fn new(target: LinkTarget, method: FixMethod) -> Self {
        Self { target, method }
    }
}

/// Resolves broken links one at a time against a [`PageContext`]
#[derive(Debug)]
pub struct LinkResolver {
    base_url: String,
    probe: RedirectProbe,
    docs: SourceDocs,
    filter: UrlFilter,
    click_wait: Duration,
    candidate_limit: usize,
}

impl LinkResolver {
    pub fn new(
        base_url: &str,
        probe: RedirectProbe,
        docs: SourceDocs,
        filter: UrlFilter,
        click_wait: Duration,
        candidate_limit: usize,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            probe,
            docs,
            filter,
            click_wait,
            candidate_limit,
        }
    }

    /// Build a resolver from configuration
    pub fn from_config(config: &FixerConfig) -> Result<Self> {
        let probe = RedirectProbe::new(&config.base_url, config.probe_timeout())?;
        let filter = UrlFilter::for_site(&config.base_url, &config.exclude_patterns)
            .map_err(|e| Error::Config(format!("invalid exclude pattern: {e}")))?;
        Ok(Self::new(
            &config.base_url,
            probe,
            SourceDocs::new(&config.docs_root),
            filter,
            config.click_wait(),
            config.candidate_limit,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run the full cascade for one broken link found on `page`.
    ///
    /// The first strategy to produce a fix wins. A failing strategy hands
    /// over to the next one; only a failure to load the owning page ends
    /// the cascade early.
    pub async fn resolve<C: PageContext + ?Sized>(
        &self,
        ctx: &mut C,
        page: &str,
        broken_link: &str,
    ) -> ResolutionOutcome {
        let broken = LinkTarget::parse(broken_link);
        ::log::debug!("Processing broken link: {}", broken_link);

        if let Some(fix) = self.try_redirect(&broken).await {
            return ResolutionOutcome::fixed(broken, fix.target, fix.method);
        }

        let url = page_url(&self.base_url, page);
        ::log::debug!("Visiting: {}", url);
        if !ctx.navigate(&url).await {
            ::log::warn!("Page load timeout for {}", url);
            return ResolutionOutcome::failed(broken, format!("page failed to load: {url}"));
        }

        for strategy in Strategy::CASCADE {
            match self.attempt(strategy, ctx, page, broken_link).await {
                Ok(Some(fix)) => {
                    ::log::info!("{:?} found {} -> {}", strategy, broken, fix.target);
                    return ResolutionOutcome::fixed(broken, fix.target, fix.method);
                }
                Ok(None) => ::log::debug!("{:?} found no match for {}", strategy, broken),
                Err(e) => ::log::warn!("{:?} failed for {}: {}", strategy, broken, e),
            }
        }

        ResolutionOutcome::unresolved(broken)
    }

    /// Run one browser strategy against the currently loaded page.
    /// `broken_link` is the link as written in the catalogue.
    pub async fn attempt<C: PageContext + ?Sized>(
        &self,
        strategy: Strategy,
        ctx: &mut C,
        page: &str,
        broken_link: &str,
    ) -> Result<Option<Fix>> {
        let broken = LinkTarget::parse(broken_link);
        match strategy {
            Strategy::TextAnchor => self.try_text_anchor(ctx, page, broken_link).await,
            Strategy::ContentMatch => self.try_content_match(ctx, &broken).await,
            Strategy::CandidateNavigation => self.try_candidate_navigation(ctx, &broken).await,
        }
    }

    /// Ask the server whether the link now redirects somewhere
    pub async fn try_redirect(&self, broken: &LinkTarget) -> Option<Fix> {
        self.probe
            .probe(broken)
            .await
            .map(|target| Fix::new(target, FixMethod::HttpRedirect))
    }

    /// Look up the link's text in the source document and find the same
    /// text on the rendered page
    pub async fn try_text_anchor<C: PageContext + ?Sized>(
        &self,
        ctx: &mut C,
        page: &str,
        broken_link: &str,
    ) -> Result<Option<Fix>> {
        // the source is searched for the link exactly as the catalogue wrote it
        let Some(link_text) = self.docs.link_text(page, broken_link).await else {
            return Ok(None);
        };
        let broken = LinkTarget::parse(broken_link);
        let Some(anchor) = find_by_text(ctx, &link_text).await else {
            ::log::debug!("No link found with text: '{}'", link_text);
            return Ok(None);
        };

        if let Some(href) = anchor.href.as_deref() {
            let target = LinkTarget::from_href(href);
            if target != broken {
                return Ok(Some(Fix::new(target, FixMethod::TextHrefMatch)));
            }
        }

        let original = ctx
            .current_url()
            .await
            .ok_or_else(|| Error::Navigation("current URL unavailable".to_string()))?;
        let landed = ctx.click_and_observe(&anchor, self.click_wait).await?;
        if landed != original {
            return Ok(Some(Fix::new(
                LinkTarget::from_url(&landed),
                FixMethod::TextClickNavigation,
            )));
        }
        Ok(None)
    }

    /// Compare the broken link against the page's navigation structure,
    /// falling back to the headings of the page for anchor-only fixes
    pub async fn try_content_match<C: PageContext + ?Sized>(
        &self,
        ctx: &mut C,
        broken: &LinkTarget,
    ) -> Result<Option<Fix>> {
        let mut anchors = ctx.list_anchors(AnchorScope::Navigation).await;
        anchors.extend(ctx.list_anchors(AnchorScope::Breadcrumb).await);

        let candidates: Vec<MatchCandidate> = anchors
            .iter()
            .filter(|anchor| !anchor.text.is_empty())
            .filter_map(MatchCandidate::from_anchor)
            .collect();

        if let Some((best, score)) = matcher::best_nav_candidate(broken, &candidates) {
            ::log::debug!("Best navigation match ({:.2}): {}", score, best.href);
            let target =
                LinkTarget::from_href(&best.href).with_anchor(broken.anchor.as_deref());
            return Ok(Some(Fix::new(target, FixMethod::ContentMatching)));
        }

        let Some(anchor) = broken.anchor.as_deref() else {
            return Ok(None);
        };
        let headings = ctx.find_headings().await;
        let Some(id) = matcher::match_heading_anchor(anchor, &headings) else {
            return Ok(None);
        };
        let current = ctx
            .current_url()
            .await
            .ok_or_else(|| Error::Navigation("current URL unavailable".to_string()))?;
        let target = LinkTarget::from_url(&current).with_anchor(Some(&id));
        Ok(Some(Fix::new(target, FixMethod::ContentMatching)))
    }

    /// Click the best-scoring links on the page, keeping the first that
    /// actually navigates
    pub async fn try_candidate_navigation<C: PageContext + ?Sized>(
        &self,
        ctx: &mut C,
        broken: &LinkTarget,
    ) -> Result<Option<Fix>> {
        let anchors = ctx.list_anchors(AnchorScope::Document).await;
        // ranking consumes the candidates, keep a way back to the element to click
        let mut by_href = Vec::new();
        let candidates: Vec<MatchCandidate> = anchors
            .iter()
            .filter(|anchor| anchor.href.as_deref().is_some_and(|h| self.filter.accepts(h)))
            .filter_map(|anchor| {
                let candidate = MatchCandidate::from_anchor(anchor)?;
                by_href.push((candidate.href.clone(), anchor));
                Some(candidate)
            })
            .collect();

        let ranked = matcher::rank_generic_candidates(broken, candidates);
        for (candidate, score) in ranked.into_iter().take(self.candidate_limit) {
            ::log::debug!("Trying link (score: {:.2}): {}", score, candidate.href);
            let Some((_, anchor)) = by_href.iter().find(|(href, _)| *href == candidate.href) else {
                continue;
            };

            let Some(original) = ctx.current_url().await else {
                return Err(Error::Navigation("current URL unavailable".to_string()));
            };
            let landed = match ctx.click_and_observe(anchor, self.click_wait).await {
                Ok(url) => url,
                Err(e) => {
                    ::log::debug!("Error testing candidate link {}: {}", candidate.href, e);
                    continue;
                }
            };
            // same URL: the click did nothing, try the next candidate
            if landed == original {
                continue;
            }

            let mut target = LinkTarget::from_url(&landed);
            if target.anchor.is_none() {
                if let Some(anchor) = broken.anchor.as_deref() {
                    target.anchor = Some(self.resolve_anchor_on_page(ctx, anchor).await);
                }
            }

            // later links on this page expect to start from it again
            if !ctx.go_back().await {
                ::log::debug!("Could not navigate back to {}", original);
            }
            return Ok(Some(Fix::new(target, FixMethod::Navigation)));
        }

        Ok(None)
    }

    /// Fragment to use on the page just navigated to: the broken one if an
    /// element carries it, else a close heading id, else the broken one as
    /// a best guess
    async fn resolve_anchor_on_page<C: PageContext + ?Sized>(&self, ctx: &mut C, anchor: &str) -> String {
        if ctx.has_id(anchor).await {
            return anchor.to_string();
        }
        let headings = ctx.find_headings().await;
        matcher::fuzzy_heading_id(anchor, &headings).unwrap_or_else(|| anchor.to_string())
    }
}
