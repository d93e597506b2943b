//! Visual highlight hints attached to trace steps.
//!
//! Highlights are display hints only: the playback engine never inspects
//! them. `target_id` points into the owning producer's id space.

use serde::{Deserialize, Serialize};

/// What kind of element a highlight targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    /// A structural node (B-Tree node, AST node).
    Node,
    /// An edge between two structural nodes.
    Edge,
    /// A table cell (an MVCC version, a B-Tree key).
    Cell,
    /// A logical row (an MVCC transaction or row).
    Row,
    /// A lexical token.
    Token,
}

/// Animation applied while a highlight is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Animation {
    Pulse,
    Shake,
    FadeIn,
    None,
}

/// Named colors shared by all producers.
pub mod palette {
    /// Node or element currently being examined.
    pub const EXAMINE: &str = "#3b82f6";
    /// Successful outcome, visible version, inserted key.
    pub const SUCCESS: &str = "#10b981";
    /// Structural change in progress (split, merge, borrow, pointer follow).
    pub const CHANGE: &str = "#f59e0b";
    /// Failure, invisible version, removal.
    pub const FAILURE: &str = "#ef4444";
    /// Superseded element.
    pub const MUTED: &str = "#94a3b8";
    /// AST construction.
    pub const BUILD: &str = "#8b5cf6";
}

/// A single visual highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub kind: HighlightKind,
    pub target_id: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
}

impl Highlight {
    pub fn new(kind: HighlightKind, target_id: impl ToString, color: &str) -> Self {
        Highlight {
            kind,
            target_id: target_id.to_string(),
            color: color.to_string(),
            animation: None,
            duration_ms: None,
        }
    }

    pub fn node(target_id: impl ToString, color: &str) -> Self {
        Self::new(HighlightKind::Node, target_id, color)
    }

    /// Edge highlight between `from` and `to`, keyed as `from->to`.
    pub fn edge(from: impl ToString, to: impl ToString, color: &str) -> Self {
        Self::new(
            HighlightKind::Edge,
            format!("{}->{}", from.to_string(), to.to_string()),
            color,
        )
    }

    pub fn cell(target_id: impl ToString, color: &str) -> Self {
        Self::new(HighlightKind::Cell, target_id, color)
    }

    pub fn row(target_id: impl ToString, color: &str) -> Self {
        Self::new(HighlightKind::Row, target_id, color)
    }

    pub fn token(target_id: impl ToString, color: &str) -> Self {
        Self::new(HighlightKind::Token, target_id, color)
    }

    pub fn animate(mut self, animation: Animation) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn pulse(self) -> Self {
        self.animate(Animation::Pulse)
    }

    pub fn shake(self) -> Self {
        self.animate(Animation::Shake)
    }

    pub fn fade_in(self) -> Self {
        self.animate(Animation::FadeIn)
    }

    pub fn lasting(mut self, duration_ms: u32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_target_joins_endpoints() {
        let h = Highlight::edge("node-1", "node-2", palette::CHANGE);
        assert_eq!(h.kind, HighlightKind::Edge);
        assert_eq!(h.target_id, "node-1->node-2");
    }

    #[test]
    fn optional_fields_are_omitted_when_unset() {
        let json = serde_json::to_value(Highlight::cell("ver-1", palette::SUCCESS)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "cell", "targetId": "ver-1", "color": "#10b981" })
        );
    }

    #[test]
    fn builder_sets_animation_and_duration() {
        let h = Highlight::node("node-4", palette::CHANGE).fade_in().lasting(600);
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["animation"], "fadeIn");
        assert_eq!(json["durationMs"], 600);
    }
}
