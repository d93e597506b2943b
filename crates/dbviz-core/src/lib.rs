//! Trace data model and producer contract shared by every dbviz crate.
//!
//! An algorithm (a trace producer) runs one operation to completion against a
//! private clone of its structure and records a [`Step`] for every
//! semantically meaningful micro-operation. The resulting [`Trace`] is plain
//! data: playback never re-runs the algorithm.

pub mod error;
pub mod highlight;
pub mod id;
pub mod producer;
pub mod step;
pub mod trace;

pub use error::{CoreError, OperationError};
pub use highlight::{palette, Animation, Highlight, HighlightKind};
pub use id::{AstNodeId, NodeId, TxId, VersionId};
pub use producer::{ProducerSimulation, Simulation, TraceProducer};
pub use step::Step;
pub use trace::{capture, Probe, Trace, TraceRecorder};

/// Free-form, insertion-ordered key/value map used for row payloads and
/// AST node metadata.
pub type Metadata = indexmap::IndexMap<String, serde_json::Value>;
