//! The trace producer contract.
//!
//! [`TraceProducer`] is the typed contract each algorithm implements: given a
//! structure and a decoded operation, run the operation to completion on a
//! private clone and return the new structure together with its [`Trace`].
//!
//! The session layer never sees the concrete structure types. It drives a
//! `Box<dyn Simulation>`, and [`ProducerSimulation`] bridges the two by owning
//! the live structure and swapping it only after a trace has been fully built.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::OperationError;
use crate::trace::{capture, Trace};

/// A deterministic algorithm that records its execution as a [`Trace`].
pub trait TraceProducer: Send + 'static {
    /// The structure the producer mutates. Cloned before every operation.
    type State: Clone + Send + Serialize + 'static;

    /// Typed operation request, decoded from `{"operation": kind, "params": ...}`.
    type Operation: DeserializeOwned;

    /// Stable project name (`btree`, `mvcc`, `query-parser`).
    fn project(&self) -> &'static str;

    /// Builds a fresh structure from a project configuration object.
    fn initial_state(&self, config: &Value) -> Result<Self::State, OperationError>;

    /// Decodes an operation request.
    ///
    /// The default implementation expects `Operation` to be an adjacently
    /// tagged enum (`tag = "operation"`, `content = "params"`). Null or empty
    /// params are dropped so that unit variants decode.
    fn parse_operation(&self, kind: &str, params: &Value) -> Result<Self::Operation, OperationError> {
        let mut request = serde_json::Map::new();
        request.insert("operation".to_string(), Value::String(kind.to_string()));
        let empty = match params {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if !empty {
            request.insert("params".to_string(), params.clone());
        }
        serde_json::from_value(Value::Object(request)).map_err(|err| {
            OperationError::InvalidPayload {
                operation: kind.to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Runs `operation` against a clone of `state`.
    ///
    /// Total: semantic failures end the trace with an error step instead of
    /// returning early. `state` itself is never touched.
    fn run_operation(&self, state: &Self::State, operation: &Self::Operation) -> (Self::State, Trace);
}

/// Object-safe view of a producer bound to its live structure.
pub trait Simulation: Send {
    fn project(&self) -> &'static str;

    /// Decodes and runs one operation, committing the resulting structure.
    fn execute(&mut self, kind: &str, params: &Value) -> Result<Trace, OperationError>;

    /// Visualization data for the live structure.
    fn snapshot(&self) -> Value;
}

/// A [`TraceProducer`] together with the structure it currently owns.
#[derive(Debug)]
pub struct ProducerSimulation<P: TraceProducer> {
    producer: P,
    state: P::State,
}

impl<P: TraceProducer> ProducerSimulation<P> {
    /// Creates a simulation whose structure is built from `config`.
    pub fn new(producer: P, config: &Value) -> Result<Self, OperationError> {
        let state = producer.initial_state(config)?;
        Ok(ProducerSimulation { producer, state })
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn state(&self) -> &P::State {
        &self.state
    }
}

impl<P: TraceProducer> Simulation for ProducerSimulation<P> {
    fn project(&self) -> &'static str {
        self.producer.project()
    }

    fn execute(&mut self, kind: &str, params: &Value) -> Result<Trace, OperationError> {
        let operation = self.producer.parse_operation(kind, params)?;
        let (next, trace) = self.producer.run_operation(&self.state, &operation);
        self.state = next;
        Ok(trace)
    }

    fn snapshot(&self) -> Value {
        capture(&self.state)
    }
}
