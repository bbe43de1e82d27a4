use crate::link::LinkTarget;
use serde::{Deserialize, Serialize};

/// Which strategy produced a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixMethod {
    HttpRedirect,
    TextHrefMatch,
    TextClickNavigation,
    ContentMatching,
    Navigation,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    None,
}

/// Whether a fix points somewhere new or confirms the link already works
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    Redirect,
    Validation,
}

/// The result of resolving one broken link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub broken: LinkTarget,
    pub fix: Option<LinkTarget>,
    pub method: FixMethod,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_type: Option<FixType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolutionOutcome {
    pub fn fixed(broken: LinkTarget, fix: LinkTarget, method: FixMethod) -> Self {
        let fix_type = if fix == broken {
            FixType::Validation
        } else {
            FixType::Redirect
        };
        Self {
            broken,
            fix: Some(fix),
            method,
            confidence: Confidence::High,
            fix_type: Some(fix_type),
            error: None,
        }
    }

    pub fn unresolved(broken: LinkTarget) -> Self {
        Self {
            broken,
            fix: None,
            method: FixMethod::None,
            confidence: Confidence::None,
            fix_type: None,
            error: None,
        }
    }

    pub fn failed(broken: LinkTarget, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::unresolved(broken)
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.fix.is_some()
    }
}

/// Outcomes for every broken link of one catalogue page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: String,
    #[serde(rename = "links")]
    pub outcomes: Vec<ResolutionOutcome>,
    /// Wall-clock seconds spent on the page
    #[serde(rename = "processing_time")]
    pub processing_time_seconds: f64,
    pub worker_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageReport {
    /// A page whose job failed before or while resolving its links
    pub fn failed(
        page: &str,
        worker_id: usize,
        outcomes: Vec<ResolutionOutcome>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            page: page.to_string(),
            outcomes,
            processing_time_seconds: 0.0,
            worker_id,
            error: Some(error.into()),
        }
    }

    pub fn fixed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_fixed()).count()
    }
}
