//! Core types for locator system

use formflow_page_port::NodeId;
use serde::{Deserialize, Serialize};

/// Locator strategy enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Stable attribute selector
    Selector,

    /// Normalized text containment
    Text,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Selector => "selector",
            LocatorStrategy::Text => "text",
        }
    }

    /// Get all strategies in fallback order
    pub fn fallback_chain() -> [LocatorStrategy; 2] {
        [LocatorStrategy::Selector, LocatorStrategy::Text]
    }
}

/// Element candidate with the facts used to rank it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    pub strategy: LocatorStrategy,
    /// Normalized text equals the wanted text
    pub exact: bool,
    pub visible: bool,
    /// Element text contains the wanted text (padded rather than truncated)
    pub covers: bool,
    /// Length difference between element text and wanted text
    pub distance: usize,
    /// Position of the element's tag in the candidate tag list
    pub tag_rank: usize,
}

impl Candidate {
    pub fn new(node: NodeId, strategy: LocatorStrategy) -> Self {
        Self {
            node,
            strategy,
            exact: true,
            visible: true,
            covers: true,
            distance: 0,
            tag_rank: 0,
        }
    }

    /// Sort key, smallest wins.
    pub fn rank(&self) -> (bool, bool, bool, usize, usize) {
        (
            !self.exact,
            !self.visible,
            !self.covers,
            self.distance,
            self.tag_rank,
        )
    }
}

/// Pick the best-ranked candidate; ties keep document order.
pub fn select_best_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by_key(|candidate| candidate.rank())
}

/// Successful resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    pub strategy: LocatorStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_candidate(id: u64) -> Candidate {
        Candidate::new(NodeId(id), LocatorStrategy::Text)
    }

    #[test]
    fn exact_visible_candidates_win() {
        let mut partial = text_candidate(1);
        partial.exact = false;
        let mut hidden = text_candidate(2);
        hidden.visible = false;
        let mut wrapper = text_candidate(3);
        wrapper.tag_rank = 3;
        let label = text_candidate(4);

        let all = vec![partial, hidden, wrapper, label];
        assert_eq!(select_best_candidate(&all).unwrap().node, NodeId(4));
    }

    #[test]
    fn padded_text_beats_truncated_text() {
        let mut truncated = text_candidate(1);
        truncated.exact = false;
        truncated.covers = false;
        truncated.distance = 2;
        let mut padded = text_candidate(2);
        padded.exact = false;
        padded.distance = 9;

        let all = vec![truncated, padded];
        assert_eq!(select_best_candidate(&all).unwrap().node, NodeId(2));
    }
}
