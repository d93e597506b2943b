//! Built-in demonstration scenarios.
//!
//! A scenario is a project configuration plus an ordered list of operations.
//! Clients replay them through the session protocol; the CLI runs them
//! offline with [`Scenario::run`].

use dbviz_core::{OperationError, Trace};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOperation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub description: String,
    pub project: String,
    pub config: Value,
    pub operations: Vec<ScenarioOperation>,
}

impl Scenario {
    fn new(id: &str, project: &str, name: &str, description: &str, config: Value) -> Self {
        Scenario {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            project: project.to_string(),
            config,
            operations: Vec::new(),
        }
    }

    fn then(mut self, kind: &str, params: Value) -> Self {
        self.operations.push(ScenarioOperation {
            kind: kind.to_string(),
            params,
        });
        self
    }

    /// Builds the configured structure and runs every operation in order,
    /// returning one trace per operation.
    pub fn run(&self) -> Result<Vec<Trace>, OperationError> {
        let project = crate::find_project(&self.project).ok_or_else(|| OperationError::InvalidConfig {
            reason: format!("unknown project '{}'", self.project),
        })?;
        let mut sim = project.create(&self.config)?;
        self.operations
            .iter()
            .map(|op| sim.execute(&op.kind, &op.params))
            .collect()
    }
}

fn btree_scenarios() -> Vec<Scenario> {
    let insert = |k: i64| json!({ "key": k });
    let large = [50, 25, 75, 10, 30, 60, 90, 5, 15, 27, 35, 55, 65, 80, 95];

    vec![
        Scenario::new(
            "basic-insert",
            "btree",
            "Basic Insertion",
            "Insert keys into an empty B-Tree without triggering splits",
            json!({ "order": 4 }),
        )
        .then("insert", insert(10))
        .then("insert", insert(20))
        .then("insert", insert(5)),
        Scenario::new(
            "split-demo",
            "btree",
            "Node Splitting",
            "Demonstrates how nodes split when they become full",
            json!({ "order": 4, "initialKeys": [10, 20, 30] }),
        )
        .then("insert", insert(40))
        .then("insert", insert(50))
        .then("insert", insert(25))
        .then("insert", insert(35)),
        Scenario::new(
            "search-demo",
            "btree",
            "Search Operations",
            "Demonstrates how search traverses the B-Tree",
            json!({ "order": 4, "initialKeys": [10, 20, 30, 40, 50, 60, 70, 80] }),
        )
        .then("search", insert(50))
        .then("search", insert(25))
        .then("search", insert(70)),
        Scenario::new(
            "delete-demo",
            "btree",
            "Delete Operations",
            "Demonstrates key deletion and node rebalancing",
            json!({ "order": 4, "initialKeys": [10, 20, 30, 40, 50, 60, 70] }),
        )
        .then("delete", insert(30))
        .then("delete", insert(50))
        .then("delete", insert(10)),
        Scenario::new(
            "range-query",
            "btree",
            "Range Queries",
            "Demonstrates range search operations",
            json!({ "order": 4, "initialKeys": [5, 10, 15, 20, 25, 30, 35, 40, 45, 50] }),
        )
        .then("range", json!({ "start": 15, "end": 35 }))
        .then("range", json!({ "start": 1, "end": 10 }))
        .then("range", json!({ "start": 100, "end": 200 })),
        large.iter().fold(
            Scenario::new(
                "large-tree",
                "btree",
                "Multi-Level Tree",
                "Build a larger B-Tree with multiple levels",
                json!({ "order": 4 }),
            ),
            |s, &k| s.then("insert", insert(k)),
        ),
    ]
}

fn mvcc_scenarios() -> Vec<Scenario> {
    let seeded = || json!({ "initialData": true });
    let tx = |id: &str| json!({ "txId": id });
    let read = |id: &str, row: &str| json!({ "txId": id, "rowId": row });

    vec![
        Scenario::new(
            "snapshot-read",
            "mvcc",
            "Snapshot Isolation",
            "A reader keeps seeing its snapshot while another transaction commits a new version",
            seeded(),
        )
        .then("begin", Value::Null)
        .then("begin", Value::Null)
        .then(
            "write",
            json!({
                "txId": "tx-2",
                "rowId": "users:1",
                "data": { "id": 1, "name": "Alice Cooper", "email": "alice@example.com" }
            }),
        )
        .then("read", read("tx-3", "users:1"))
        .then("commit", tx("tx-2"))
        .then("read", read("tx-3", "users:1"))
        .then("begin", Value::Null)
        .then("read", read("tx-4", "users:1")),
        Scenario::new(
            "abort-rollback",
            "mvcc",
            "Abort and Rollback",
            "An aborted transaction's versions and tombstones disappear",
            seeded(),
        )
        .then("begin", Value::Null)
        .then(
            "write",
            json!({
                "txId": "tx-2",
                "rowId": "users:2",
                "data": { "id": 2, "name": "Robert", "email": "bob@example.com" }
            }),
        )
        .then("delete", read("tx-2", "products:1"))
        .then("abort", tx("tx-2"))
        .then("begin", Value::Null)
        .then("read", read("tx-3", "users:2"))
        .then("read", read("tx-3", "products:1")),
        Scenario::new(
            "garbage-collect",
            "mvcc",
            "Garbage Collection",
            "Superseded versions no snapshot can see are reclaimed",
            seeded(),
        )
        .then("begin", Value::Null)
        .then("write", json!({ "txId": "tx-2", "rowId": "users:1", "data": { "name": "Alice v2" } }))
        .then("commit", tx("tx-2"))
        .then("begin", Value::Null)
        .then("write", json!({ "txId": "tx-3", "rowId": "users:1", "data": { "name": "Alice v3" } }))
        .then("commit", tx("tx-3"))
        .then("gc", Value::Null),
    ]
}

fn query_scenarios() -> Vec<Scenario> {
    let parse = |q: &str| json!({ "query": q });

    vec![
        Scenario::new(
            "simple-select",
            "query-parser",
            "Simple SELECT",
            "Tokenize and parse a single-table query with a filter",
            Value::Null,
        )
        .then("parse", parse("SELECT * FROM users WHERE id = 1")),
        Scenario::new(
            "join-query",
            "query-parser",
            "JOIN with ORDER BY",
            "Qualified names, a join condition, sorting and a limit",
            Value::Null,
        )
        .then(
            "parse",
            parse(
                "SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id \
                 WHERE o.total > 100 ORDER BY o.total DESC LIMIT 10",
            ),
        ),
        Scenario::new(
            "syntax-error",
            "query-parser",
            "Syntax Errors",
            "A missing table name and an unterminated string",
            Value::Null,
        )
        .then("parse", parse("SELECT name FROM WHERE id = 1"))
        .then("tokenize", parse("SELECT 'unterminated")),
    ]
}

/// Every scenario, grouped by project.
pub fn all() -> Vec<Scenario> {
    let mut scenarios = btree_scenarios();
    scenarios.extend(mvcc_scenarios());
    scenarios.extend(query_scenarios());
    scenarios
}

pub fn find(id: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let all = all();
        let ids: HashSet<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), all.len());
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn every_scenario_runs() {
        for scenario in all() {
            let traces = scenario
                .run()
                .unwrap_or_else(|e| panic!("{} failed: {e}", scenario.id));
            assert_eq!(traces.len(), scenario.operations.len(), "{}", scenario.id);
            assert!(traces.iter().all(|t| !t.is_empty()), "{}", scenario.id);
        }
    }

    #[test]
    fn only_syntax_error_scenario_has_failing_traces() {
        for scenario in all() {
            let failed = scenario.run().unwrap().iter().any(|t| t.failed());
            assert_eq!(failed, scenario.id == "syntax-error", "{}", scenario.id);
        }
    }

    #[test]
    fn snapshot_read_keeps_old_value_for_older_reader() {
        let traces = find("snapshot-read").unwrap().run().unwrap();
        let second_read = &traces[5];
        let value = &second_read.final_snapshot["rows"]["users:1"];
        assert!(value.is_object());
        let found = second_read
            .steps()
            .iter()
            .find(|s| s.title == "Version Found")
            .unwrap();
        assert!(found.description.contains("ver-1"));
    }

    #[test]
    fn scenario_serializes_operations_with_type() {
        let json = serde_json::to_value(find("basic-insert").unwrap()).unwrap();
        assert_eq!(json["operations"][0], json!({ "type": "insert", "params": { "key": 10 } }));
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(find("nope").is_none());
    }
}
