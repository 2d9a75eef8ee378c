//! Element resolution strategies
//!
//! Two strategies in fallback order:
//! 1. Selector - stable attribute selector supplied by the flow definition
//! 2. Text - normalized visible-text containment over candidate tags

use async_trait::async_trait;
use formflow_core_types::LocatorSpec;
use formflow_page_port::{NodeId, PagePort};
use tracing::debug;

use crate::{errors::LocatorError, text::normalize_text, types::*};

/// Strategy trait for element resolution
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Collect candidates under `scope`. Specs the strategy cannot use yield
    /// no candidates.
    async fn resolve(
        &self,
        page: &dyn PagePort,
        scope: Option<NodeId>,
        spec: &LocatorSpec,
    ) -> Result<Vec<Candidate>, LocatorError>;

    /// Get strategy type
    fn strategy_type(&self) -> LocatorStrategy;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

/// Stable attribute selector strategy
#[derive(Debug, Default, Clone)]
pub struct SelectorStrategy;

#[async_trait]
impl Strategy for SelectorStrategy {
    async fn resolve(
        &self,
        page: &dyn PagePort,
        scope: Option<NodeId>,
        spec: &LocatorSpec,
    ) -> Result<Vec<Candidate>, LocatorError> {
        let Some(selector) = spec.selector.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        debug!(selector, "Resolving by selector");

        let mut candidates = Vec::new();
        for node in page.query_selector_all(scope, selector).await? {
            let mut candidate = Candidate::new(node, LocatorStrategy::Selector);
            candidate.visible = page.is_visible(node).await?;
            candidates.push(candidate);
        }
        Ok(candidates)
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Selector
    }
}

/// Normalized text containment strategy
#[derive(Debug, Clone)]
pub struct TextStrategy {
    tags: Vec<String>,
}

impl TextStrategy {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }

    /// Candidates whose text matches `wanted` among elements matching
    /// `candidate_selector` (or the configured tag list).
    pub async fn candidates(
        &self,
        page: &dyn PagePort,
        scope: Option<NodeId>,
        wanted: &str,
        candidate_selector: Option<&str>,
    ) -> Result<Vec<Candidate>, LocatorError> {
        let wanted = normalize_text(wanted);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let selector = match candidate_selector {
            Some(selector) => selector.to_string(),
            None => self.tags.join(", "),
        };

        let mut candidates = Vec::new();
        for node in page.query_selector_all(scope, &selector).await? {
            let actual = normalize_text(&page.text_content(node).await?);
            if actual.is_empty() {
                continue;
            }
            let covers = actual.contains(&wanted);
            if !covers && !wanted.contains(&actual) {
                continue;
            }
            let tag = page.tag_name(node).await?;
            let mut candidate = Candidate::new(node, LocatorStrategy::Text);
            candidate.exact = actual == wanted;
            candidate.covers = covers;
            candidate.distance = actual.chars().count().abs_diff(wanted.chars().count());
            candidate.tag_rank = self
                .tags
                .iter()
                .position(|t| *t == tag)
                .unwrap_or(self.tags.len());
            candidate.visible = page.is_visible(node).await?;
            candidates.push(candidate);
        }
        Ok(candidates)
    }
}

#[async_trait]
impl Strategy for TextStrategy {
    async fn resolve(
        &self,
        page: &dyn PagePort,
        scope: Option<NodeId>,
        spec: &LocatorSpec,
    ) -> Result<Vec<Candidate>, LocatorError> {
        let Some(label) = spec.label.as_deref() else {
            return Ok(Vec::new());
        };
        debug!(label, "Resolving by text");
        self.candidates(page, scope, label, None).await
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Text
    }
}
