//! Element resolver with fallback chain orchestration

use std::sync::Arc;

use formflow_core_types::{FormProfile, LocatorSpec};
use formflow_page_port::{NodeId, PagePort};
use tracing::{debug, warn};

use crate::{errors::LocatorError, strategies::*, text::normalize_text, types::*};

/// Section headings checked before falling back to whole-section text.
const SECTION_TITLE_SELECTOR: &str =
    "legend, h1, h2, h3, h4, h5, h6, .section-title, [data-section-title]";

/// Elements a click on a text node should be redirected to.
const ACTIONABLE_SELECTOR: &str = "button, a, label, [role=\"button\"], input[type=\"button\"], input[type=\"submit\"], [onclick]";

/// How far up a text match may be walked looking for an actionable element.
const MAX_ANCESTOR_WALK: usize = 6;

/// Resolves elements of the hosted form page.
pub struct Locator {
    page: Arc<dyn PagePort>,
    profile: Arc<FormProfile>,
    selector_strategy: SelectorStrategy,
    text_strategy: TextStrategy,
}

impl Locator {
    pub fn new(page: Arc<dyn PagePort>, profile: Arc<FormProfile>) -> Self {
        let text_strategy = TextStrategy::new(profile.text_candidate_tags.clone());
        Self {
            page,
            profile,
            selector_strategy: SelectorStrategy,
            text_strategy,
        }
    }

    pub fn page(&self) -> &Arc<dyn PagePort> {
        &self.page
    }

    pub fn profile(&self) -> &FormProfile {
        &self.profile
    }

    fn strategy(&self, strategy: LocatorStrategy) -> &dyn Strategy {
        match strategy {
            LocatorStrategy::Selector => &self.selector_strategy,
            LocatorStrategy::Text => &self.text_strategy,
        }
    }

    /// Resolve a step locator. A named section narrows the search when it can
    /// be found; otherwise the whole document is searched.
    pub async fn resolve(&self, spec: &LocatorSpec) -> Result<Option<Resolution>, LocatorError> {
        let scope = match spec.section.as_deref() {
            Some(title) => {
                let section = self.find_section(title).await?;
                if section.is_none() {
                    debug!(section = title, "Section not found, searching whole page");
                }
                section
            }
            None => None,
        };
        self.resolve_in(scope, spec).await
    }

    /// Resolve within `scope`, trying each strategy in fallback order.
    pub async fn resolve_in(
        &self,
        scope: Option<NodeId>,
        spec: &LocatorSpec,
    ) -> Result<Option<Resolution>, LocatorError> {
        if spec.is_empty() {
            return Err(LocatorError::InvalidSpec(
                "neither selector nor label given".to_string(),
            ));
        }

        for strategy_type in LocatorStrategy::fallback_chain() {
            let strategy = self.strategy(strategy_type);
            match strategy.resolve(self.page.as_ref(), scope, spec).await {
                Ok(candidates) => {
                    if let Some(best) = select_best_candidate(&candidates) {
                        debug!(
                            strategy = strategy.name(),
                            node = %best.node,
                            "Resolved element"
                        );
                        return Ok(Some(Resolution {
                            node: best.node,
                            strategy: strategy_type,
                        }));
                    }
                    debug!(strategy = strategy.name(), "Strategy returned no candidates");
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(strategy = strategy.name(), error = %err, "Strategy failed"),
            }
        }
        Ok(None)
    }

    /// Node-only form of [`Locator::resolve`].
    pub async fn locate(&self, spec: &LocatorSpec) -> Result<Option<NodeId>, LocatorError> {
        Ok(self.resolve(spec).await?.map(|resolution| resolution.node))
    }

    /// First visible match of `selector`, else the first match at all.
    pub async fn find_by_selector(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Option<NodeId>, LocatorError> {
        let candidates = self
            .selector_strategy
            .resolve(self.page.as_ref(), scope, &LocatorSpec::by_selector(selector))
            .await?;
        Ok(select_best_candidate(&candidates).map(|c| c.node))
    }

    /// Best text match among the configured candidate tags.
    pub async fn find_by_text(
        &self,
        scope: Option<NodeId>,
        text: &str,
    ) -> Result<Option<NodeId>, LocatorError> {
        let candidates = self
            .text_strategy
            .candidates(self.page.as_ref(), scope, text, None)
            .await?;
        Ok(select_best_candidate(&candidates).map(|c| c.node))
    }

    /// Best text match among elements matching `candidate_selector`.
    pub async fn find_by_text_among(
        &self,
        scope: Option<NodeId>,
        text: &str,
        candidate_selector: &str,
    ) -> Result<Option<NodeId>, LocatorError> {
        let candidates = self
            .text_strategy
            .candidates(self.page.as_ref(), scope, text, Some(candidate_selector))
            .await?;
        Ok(select_best_candidate(&candidates).map(|c| c.node))
    }

    /// Element among `candidate_selector` matches whose normalized text is
    /// exactly `text`.
    pub async fn find_exact_text(
        &self,
        scope: Option<NodeId>,
        text: &str,
        candidate_selector: &str,
    ) -> Result<Option<NodeId>, LocatorError> {
        let candidates = self
            .text_strategy
            .candidates(self.page.as_ref(), scope, text, Some(candidate_selector))
            .await?;
        Ok(candidates
            .iter()
            .filter(|c| c.exact)
            .min_by_key(|c| c.rank())
            .map(|c| c.node))
    }

    /// Section container whose title (or, failing that, content) contains
    /// `title`. The innermost such container wins.
    pub async fn find_section(&self, title: &str) -> Result<Option<NodeId>, LocatorError> {
        let wanted = normalize_text(title);
        if wanted.is_empty() {
            return Ok(None);
        }
        let sections = self
            .page
            .query_selector_all(None, &self.profile.section_selector)
            .await?;

        let mut by_heading: Option<(usize, NodeId)> = None;
        let mut by_content: Option<(usize, NodeId)> = None;
        for section in sections {
            for heading in self
                .page
                .query_selector_all(Some(section), SECTION_TITLE_SELECTOR)
                .await?
            {
                let text = normalize_text(&self.page.text_content(heading).await?);
                if !text.is_empty() && (text.contains(&wanted) || wanted.contains(&text)) {
                    let len = normalize_text(&self.page.text_content(section).await?).len();
                    if by_heading.map_or(true, |(best, _)| len < best) {
                        by_heading = Some((len, section));
                    }
                    break;
                }
            }
            let content = normalize_text(&self.page.text_content(section).await?);
            if content.contains(&wanted) && by_content.map_or(true, |(best, _)| content.len() < best)
            {
                by_content = Some((content.len(), section));
            }
        }
        Ok(by_heading.or(by_content).map(|(_, section)| section))
    }

    /// Nearest question wrapper around `node`, else its parent.
    pub async fn container_of(&self, node: NodeId) -> Result<Option<NodeId>, LocatorError> {
        if let Some(container) = self
            .page
            .closest(node, &self.profile.field_container_selector)
            .await?
        {
            if container != node {
                return Ok(Some(container));
            }
        }
        Ok(self.page.parent(node).await?)
    }

    /// Find the label text, then the first `control_selector` match inside
    /// its question wrapper.
    pub async fn container_from_label(
        &self,
        scope: Option<NodeId>,
        label: &str,
    ) -> Result<Option<NodeId>, LocatorError> {
        match self.find_by_text(scope, label).await? {
            Some(found) => self.container_of(found).await,
            None => Ok(None),
        }
    }

    /// Control a label refers to: its `for` target, a nested control, or the
    /// first control in the surrounding container.
    pub async fn control_for_label(
        &self,
        label: NodeId,
        control_selector: &str,
    ) -> Result<Option<NodeId>, LocatorError> {
        if let Some(target) = self.page.attribute(label, "for").await? {
            if !target.is_empty() {
                let by_id = format!("[id=\"{}\"]", target.replace('"', "\\\""));
                if let Some(control) = self.page.query_selector(None, &by_id).await? {
                    return Ok(Some(control));
                }
            }
        }
        if self.page.matches(label, control_selector).await? {
            return Ok(Some(label));
        }
        if let Some(nested) = self.page.query_selector(Some(label), control_selector).await? {
            return Ok(Some(nested));
        }
        match self.container_of(label).await? {
            Some(container) => Ok(self
                .page
                .query_selector(Some(container), control_selector)
                .await?),
            None => Ok(None),
        }
    }

    /// Walk from a text match up to the nearest element that reacts to clicks.
    pub async fn actionable_ancestor(&self, node: NodeId) -> Result<Option<NodeId>, LocatorError> {
        let mut current = Some(node);
        for _ in 0..=MAX_ANCESTOR_WALK {
            let Some(candidate) = current else {
                break;
            };
            if self.page.matches(candidate, ACTIONABLE_SELECTOR).await? {
                return Ok(Some(candidate));
            }
            current = self.page.parent(candidate).await?;
        }
        Ok(None)
    }
}
