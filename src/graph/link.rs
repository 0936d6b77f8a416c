//! Directed influence links between items

use super::item::ItemId;
use serde::{Deserialize, Serialize};

/// Identity of a link: the ordered `(source, target)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub source: ItemId,
    pub target: ItemId,
}

impl LinkKey {
    pub fn new(source: impl Into<ItemId>, target: impl Into<ItemId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

/// A directed, annotated influence edge: `source` influenced `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: ItemId,
    pub target: ItemId,
    /// Confidence in the relationship (0.0 - 1.0)
    pub confidence: f32,
    /// Free-form classification (e.g. "direct", "stylistic", "audio_sample")
    pub influence_type: String,
    pub category: String,
    pub explanation: String,
    /// Citation for the claim, if the research pipeline supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    /// Level of detail the claim belongs to (e.g. "macro", "micro", "nano")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Tags used for visual grouping
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

impl GraphLink {
    /// Create a link with empty metadata and full confidence
    pub fn new(source: impl Into<ItemId>, target: impl Into<ItemId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            confidence: 1.0,
            influence_type: String::new(),
            category: String::new(),
            explanation: String::new(),
            source_ref: None,
            scope: None,
            clusters: Vec::new(),
        }
    }

    /// Confidence is clamped into 0.0 - 1.0; NaN becomes 0.0
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_influence_type(mut self, influence_type: impl Into<String>) -> Self {
        self.influence_type = influence_type.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn with_clusters(mut self, clusters: Vec<String>) -> Self {
        self.clusters = clusters;
        self
    }

    pub fn key(&self) -> LinkKey {
        LinkKey {
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }
}

pub(crate) fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
