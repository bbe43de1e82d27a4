//! Similarity scoring between broken links and candidate links found on a page.
//!
//! Everything here is pure: no I/O, no browser, identical inputs always give
//! identical scores.

use crate::browser::{Anchor, Heading};
use crate::link::LinkTarget;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A candidate must score strictly above this to be considered
pub const CANDIDATE_THRESHOLD: f64 = 0.3;

/// Fuzzy anchor matches must score strictly above this
pub const ANCHOR_THRESHOLD: f64 = 0.7;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// A link on the rendered page considered as a replacement for a broken one
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// Absolute href of the anchor element
    pub href: String,
    /// Visible text of the anchor element
    pub text: String,
    /// Path segments of the href, in order
    pub path_parts: Vec<String>,
}

impl MatchCandidate {
    pub fn new(href: &str, text: &str) -> Self {
        let target = LinkTarget::from_href(href);
        Self {
            href: href.to_string(),
            text: text.trim().to_string(),
            path_parts: target.path_parts().into_iter().map(str::to_string).collect(),
        }
    }

    /// Build a candidate from an anchor element, if it has an href
    pub fn from_anchor(anchor: &Anchor) -> Option<Self> {
        anchor
            .href
            .as_deref()
            .filter(|href| !href.is_empty())
            .map(|href| Self::new(href, &anchor.text))
    }

    fn part_set(&self) -> HashSet<&str> {
        self.path_parts.iter().map(String::as_str).collect()
    }
}

/// Case-insensitive Ratcliff/Obershelp similarity in `[0, 1]`.
///
/// The ratio is `2M / (|a| + |b|)` where `M` is the number of characters in
/// the longest matching block plus, recursively, the matching blocks to its
/// left and right. The pair is put in a canonical order first so the result
/// is symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched = if a <= b {
        matching_characters(&a, &b)
    } else {
        matching_characters(&b, &a)
    };
    2.0 * matched as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest first on ties
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // run[k + 1] is the length of the common run ending at a[i] and b[blo + k]
    let mut previous = vec![0usize; width + 1];

    for i in alo..ahi {
        let mut current = vec![0usize; width + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let size = previous[j - blo] + 1;
                current[j - blo + 1] = size;
                if size > best.2 {
                    best = (i + 1 - size, j + 1 - size, size);
                }
            }
        }
        previous = current;
    }

    best
}

/// Lowercase, collapse runs of non-alphanumerics into `-`, trim `-`
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Score a navigation or breadcrumb link against a broken link.
///
/// Path overlap relative to the longer of the two paths, plus a text bonus
/// for how closely the link text resembles the broken path.
pub fn score_nav_candidate(broken: &LinkTarget, candidate: &MatchCandidate) -> f64 {
    let broken_parts: HashSet<&str> = broken.path_parts().into_iter().collect();
    let href_parts = candidate.part_set();

    let longest = broken_parts.len().max(href_parts.len());
    let overlap = if longest == 0 {
        0.0
    } else {
        broken_parts.intersection(&href_parts).count() as f64 / longest as f64
    };

    overlap + 0.3 * similarity(&broken.path, &candidate.text)
}

/// Score any link on the page against a broken link.
///
/// Weighted path overlap relative to the broken path, the best text match
/// against any single broken path segment, and a bonus when the final
/// segments agree.
pub fn score_generic_candidate(broken: &LinkTarget, candidate: &MatchCandidate) -> f64 {
    let broken_parts = broken.path_parts();
    if broken_parts.is_empty() {
        return 0.0;
    }

    let broken_set: HashSet<&str> = broken_parts.iter().copied().collect();
    let common = broken_set.intersection(&candidate.part_set()).count();
    let mut score = 0.7 * common as f64 / broken_parts.len() as f64;

    if !candidate.text.is_empty() {
        let text_score = broken_parts
            .iter()
            .map(|part| similarity(&candidate.text, part))
            .fold(0.0, f64::max);
        score += 0.3 * text_score;
    }

    if let (Some(last_broken), Some(last_candidate)) =
        (broken_parts.last(), candidate.path_parts.last())
    {
        if *last_broken == last_candidate {
            score += 0.2;
        }
    }

    score
}

/// Pick the highest-scoring navigation candidate above the threshold.
/// Earlier candidates win ties.
pub fn best_nav_candidate<'a>(
    broken: &LinkTarget,
    candidates: &'a [MatchCandidate],
) -> Option<(&'a MatchCandidate, f64)> {
    let mut best: Option<(&MatchCandidate, f64)> = None;
    for candidate in candidates {
        let score = score_nav_candidate(broken, candidate);
        if score > CANDIDATE_THRESHOLD && best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Candidates above the threshold, best first. Sorting is stable so page
/// order breaks ties.
pub fn rank_generic_candidates(
    broken: &LinkTarget,
    candidates: Vec<MatchCandidate>,
) -> Vec<(MatchCandidate, f64)> {
    let mut ranked: Vec<(MatchCandidate, f64)> = candidates
        .into_iter()
        .map(|candidate| {
            let score = score_generic_candidate(broken, &candidate);
            (candidate, score)
        })
        .filter(|(_, score)| *score > CANDIDATE_THRESHOLD)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Heading id that a broken fragment most plausibly meant.
///
/// Tries an exact id match, then a fuzzy id match, then a fuzzy match
/// against the slug of the heading text. A slug match on a heading without
/// an id yields the slug itself.
pub fn match_heading_anchor(anchor: &str, headings: &[Heading]) -> Option<String> {
    if let Some(id) = headings
        .iter()
        .filter_map(|h| h.id.as_deref())
        .find(|id| *id == anchor)
    {
        return Some(id.to_string());
    }

    if let Some(id) = fuzzy_heading_id(anchor, headings) {
        return Some(id);
    }

    headings.iter().find_map(|heading| {
        if heading.text.is_empty() {
            return None;
        }
        let slug = slugify(&heading.text);
        (similarity(&slug, anchor) > ANCHOR_THRESHOLD)
            .then(|| heading.id.clone().unwrap_or(slug))
    })
}

/// First heading id whose similarity to the anchor clears the threshold
pub fn fuzzy_heading_id(anchor: &str, headings: &[Heading]) -> Option<String> {
    headings
        .iter()
        .filter_map(|h| h.id.as_deref())
        .find(|id| similarity(id, anchor) > ANCHOR_THRESHOLD)
        .map(str::to_string)
}
