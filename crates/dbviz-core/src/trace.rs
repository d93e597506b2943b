//! Trace recording.
//!
//! A producer drives a [`TraceRecorder`] while its algorithm runs against a
//! private clone of the structure. Each recorded step captures a snapshot of
//! that clone, so every step is independently renderable and backward
//! navigation needs no undo logic. [`TraceRecorder::finish`] seals the
//! recorder into an immutable [`Trace`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::highlight::Highlight;
use crate::step::Step;

/// The ordered, immutable result of running one operation to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub project: String,
    pub operation: String,
    steps: Vec<Step>,
    /// The structure before the operation ran.
    pub initial_snapshot: serde_json::Value,
    /// The structure after the last step.
    pub final_snapshot: serde_json::Value,
}

impl Trace {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Whether the operation ended in a semantic failure.
    pub fn failed(&self) -> bool {
        self.steps.iter().any(|s| s.error)
    }

    /// Step titles in order, handy for logs and assertions.
    pub fn titles(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.title.as_str()).collect()
    }
}

/// Serializes a producer structure into visualization data.
///
/// Producer structures use string-keyed maps only, so this cannot fail in
/// practice; a failure is logged and rendered as `null`.
pub fn capture<S: Serialize>(state: &S) -> serde_json::Value {
    serde_json::to_value(state).unwrap_or_else(|err| {
        tracing::warn!("failed to capture snapshot: {}", err);
        serde_json::Value::Null
    })
}

/// Append-only step sink used by producers while an operation runs.
#[derive(Debug)]
pub struct TraceRecorder {
    project: String,
    operation: String,
    initial_snapshot: serde_json::Value,
    steps: Vec<Step>,
}

impl TraceRecorder {
    /// Starts a recorder, capturing `initial` as the pre-operation structure.
    pub fn new<S: Serialize>(project: &str, operation: &str, initial: &S) -> Self {
        TraceRecorder {
            project: project.to_string(),
            operation: operation.to_string(),
            initial_snapshot: capture(initial),
            steps: Vec::new(),
        }
    }

    /// Records one step, snapshotting `state` as it is right now.
    pub fn record<S: Serialize>(
        &mut self,
        state: &S,
        title: impl Into<String>,
        description: impl Into<String>,
        highlights: impl IntoIterator<Item = Highlight>,
    ) {
        self.push(state, title.into(), description.into(), highlights, false);
    }

    /// Records the terminal semantic-failure step. It carries no highlights.
    pub fn fail<S: Serialize>(
        &mut self,
        state: &S,
        title: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.push(state, title.into(), description.into(), [], true);
    }

    fn push<S: Serialize>(
        &mut self,
        state: &S,
        title: String,
        description: String,
        highlights: impl IntoIterator<Item = Highlight>,
        error: bool,
    ) {
        let step = Step {
            index: self.steps.len(),
            title,
            description,
            highlights: highlights.into_iter().collect::<SmallVec<_>>(),
            error,
            snapshot: capture(state),
        };
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Seals the recorder. `final_state` becomes the trace's final snapshot.
    pub fn finish<S: Serialize>(self, final_state: &S) -> Trace {
        Trace {
            project: self.project,
            operation: self.operation,
            steps: self.steps,
            initial_snapshot: self.initial_snapshot,
            final_snapshot: capture(final_state),
        }
    }
}

/// An optional [`TraceRecorder`].
///
/// Producers build structures from configuration by running the same
/// algorithms they trace, with a silent probe that records nothing.
pub struct Probe<'a> {
    recorder: Option<&'a mut TraceRecorder>,
}

impl<'a> Probe<'a> {
    pub fn new(recorder: &'a mut TraceRecorder) -> Self {
        Probe {
            recorder: Some(recorder),
        }
    }

    pub fn silent() -> Self {
        Probe { recorder: None }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn record<S: Serialize>(
        &mut self,
        state: &S,
        title: impl Into<String>,
        description: impl Into<String>,
        highlights: impl IntoIterator<Item = Highlight>,
    ) {
        if let Some(rec) = self.recorder.as_deref_mut() {
            rec.record(state, title, description, highlights);
        }
    }

    pub fn fail<S: Serialize>(
        &mut self,
        state: &S,
        title: impl Into<String>,
        description: impl Into<String>,
    ) {
        if let Some(rec) = self.recorder.as_deref_mut() {
            rec.fail(state, title, description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::palette;
    use serde_json::json;

    #[derive(Serialize)]
    struct Counter {
        value: i32,
    }

    #[test]
    fn steps_are_indexed_in_order() {
        let mut c = Counter { value: 0 };
        let mut rec = TraceRecorder::new("test", "count", &c);
        for _ in 0..3 {
            c.value += 1;
            rec.record(&c, "Tick", format!("value is {}", c.value), []);
        }
        let trace = rec.finish(&c);

        assert_eq!(trace.len(), 3);
        for (i, step) in trace.steps().iter().enumerate() {
            assert_eq!(step.index, i);
        }
    }

    #[test]
    fn each_step_keeps_its_own_snapshot() {
        let mut c = Counter { value: 1 };
        let mut rec = TraceRecorder::new("test", "count", &c);
        rec.record(&c, "One", "", [Highlight::node("n", palette::EXAMINE)]);
        c.value = 2;
        rec.record(&c, "Two", "", []);
        let trace = rec.finish(&c);

        assert_eq!(trace.initial_snapshot, json!({ "value": 1 }));
        assert_eq!(trace.get(0).unwrap().snapshot, json!({ "value": 1 }));
        assert_eq!(trace.get(1).unwrap().snapshot, json!({ "value": 2 }));
        assert_eq!(trace.final_snapshot, json!({ "value": 2 }));
    }

    #[test]
    fn fail_marks_error_without_highlights() {
        let c = Counter { value: 0 };
        let mut rec = TraceRecorder::new("test", "count", &c);
        rec.record(&c, "Start", "", []);
        rec.fail(&c, "Error", "something went wrong");
        let trace = rec.finish(&c);

        assert!(trace.failed());
        let last = trace.last().unwrap();
        assert!(last.error);
        assert!(last.highlights.is_empty());
        assert_eq!(trace.titles(), vec!["Start", "Error"]);
    }

    #[test]
    fn silent_probe_records_nothing() {
        let c = Counter { value: 0 };
        let mut probe = Probe::silent();
        probe.record(&c, "Ignored", "", []);
        probe.fail(&c, "Ignored", "");
        assert!(!probe.is_recording());

        let mut rec = TraceRecorder::new("test", "count", &c);
        let mut probe = Probe::new(&mut rec);
        probe.record(&c, "Kept", "", []);
        assert_eq!(rec.len(), 1);
    }
}
