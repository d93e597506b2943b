//! A single recorded micro-operation.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::highlight::Highlight;

/// One micro-operation of a trace.
///
/// Steps are created only by [`TraceRecorder`](crate::TraceRecorder), in
/// strictly increasing `index` order, and are never modified afterwards.
/// `snapshot` is the producer's full visualization data at the moment the
/// step was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub index: usize,
    pub title: String,
    pub description: String,
    pub highlights: SmallVec<[Highlight; 2]>,
    /// Set on the step that reports a semantic failure. Such steps carry no
    /// highlights.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    pub snapshot: serde_json::Value,
}
