//! The dbviz trace producers and the project registry.
//!
//! Each project pairs a [`TraceProducer`] with catalogue metadata. The
//! session layer creates simulations through [`Project::create`] and never
//! names a concrete producer type.

pub mod btree;
mod config;
pub mod mvcc;
pub mod scenarios;
pub mod sql;

use dbviz_core::{OperationError, ProducerSimulation, Simulation, TraceProducer};
use serde::Serialize;
use serde_json::Value;

pub use btree::BTreeProducer;
pub use mvcc::MvccProducer;
pub use scenarios::Scenario;
pub use sql::QueryProducer;

/// Catalogue entry describing one project.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub operations: &'static [&'static str],
}

pub type SimulationFactory = fn(&Value) -> Result<Box<dyn Simulation>, OperationError>;

pub struct Project {
    pub info: ProjectInfo,
    factory: SimulationFactory,
}

impl Project {
    /// Builds a fresh simulation from a project configuration object.
    pub fn create(&self, config: &Value) -> Result<Box<dyn Simulation>, OperationError> {
        (self.factory)(config)
    }
}

fn simulation<P: TraceProducer + Default>(config: &Value) -> Result<Box<dyn Simulation>, OperationError> {
    Ok(Box::new(ProducerSimulation::new(P::default(), config)?))
}

static PROJECTS: [Project; 3] = [
    Project {
        info: ProjectInfo {
            id: btree::PROJECT,
            name: "B-Tree",
            description: "Node search, insertion with splits, deletion with borrow and merge, range scans",
            operations: &["insert", "search", "delete", "range"],
        },
        factory: simulation::<BTreeProducer>,
    },
    Project {
        info: ProjectInfo {
            id: mvcc::PROJECT,
            name: "MVCC",
            description: "Snapshot isolation over version chains: visibility, commit, abort, garbage collection",
            operations: &["begin", "read", "write", "delete", "commit", "abort", "gc"],
        },
        factory: simulation::<MvccProducer>,
    },
    Project {
        info: ProjectInfo {
            id: sql::PROJECT,
            name: "Query Parser",
            description: "SQL lexing and recursive-descent parsing into an AST",
            operations: &["parse", "tokenize"],
        },
        factory: simulation::<QueryProducer>,
    },
];

/// Learning topic. Only some topics have a simulation behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    /// True when a project with the same id is registered.
    pub available: bool,
}

const TOPICS: [(&str, &str, &str, &str); 10] = [
    ("btree", "B-Tree", "Self-balancing tree data structure for sorted data", "storage"),
    ("lsm-tree", "LSM Tree", "Log-structured merge tree for write-optimized storage", "storage"),
    ("buffer-pool", "Buffer Pool", "In-memory page cache management", "storage"),
    ("page-layout", "Page Layout", "On-disk page structure and organization", "storage"),
    ("query-parser", "Query Parser", "SQL parsing and AST generation", "query"),
    ("query-optimizer", "Query Optimizer", "Query plan optimization and cost estimation", "query"),
    ("execution-engine", "Execution Engine", "Query plan execution and operators", "query"),
    ("mvcc", "MVCC", "Multi-version concurrency control", "transaction"),
    ("wal", "Write-Ahead Log", "Durability and crash recovery", "transaction"),
    ("locking", "Locking", "Lock management and deadlock detection", "transaction"),
];

pub fn topics() -> Vec<Topic> {
    TOPICS
        .iter()
        .map(|&(id, name, description, category)| Topic {
            id,
            name,
            description,
            category,
            available: find_project(id).is_some(),
        })
        .collect()
}

pub fn projects() -> &'static [Project] {
    &PROJECTS
}

pub fn find_project(id: &str) -> Option<&'static Project> {
    PROJECTS.iter().find(|p| p.info.id == id)
}
