//! End-to-end producer behaviour through the object-safe simulation API.

use dbviz_core::Simulation;
use dbviz_engines::find_project;
use serde_json::{json, Value};

fn simulation(project: &str, config: Value) -> Box<dyn Simulation> {
    find_project(project).unwrap().create(&config).unwrap()
}

#[test]
fn small_inserts_fill_a_single_leaf() {
    let mut sim = simulation("btree", json!({ "order": 4 }));
    let mut steps = 0;
    for key in [10, 20, 5] {
        let trace = sim.execute("insert", &json!({ "key": key })).unwrap();
        assert!(!trace.titles().contains(&"Split Node"));
        steps += trace.len();
    }
    assert!(steps >= 3);

    let snapshot = sim.snapshot();
    let root = snapshot["rootId"].as_str().unwrap();
    assert_eq!(snapshot["nodes"][root]["isLeaf"], true);
    assert_eq!(snapshot["nodes"][root]["keys"], json!([5, 10, 20]));
}

#[test]
fn fourth_insert_splits_the_root_once() {
    let mut sim = simulation("btree", json!({ "order": 4 }));
    let mut split_steps = Vec::new();
    for key in [10, 20, 30, 40] {
        let trace = sim.execute("insert", &json!({ "key": key })).unwrap();
        split_steps.extend(
            trace
                .steps()
                .iter()
                .filter(|s| s.title == "Split Node")
                .cloned(),
        );
    }
    assert_eq!(split_steps.len(), 1);
    assert_eq!(split_steps[0].highlights.len(), 2);

    let snapshot = sim.snapshot();
    let root = snapshot["rootId"].as_str().unwrap();
    assert_eq!(snapshot["nodes"][root]["isLeaf"], false);
    assert_eq!(snapshot["nodes"][root]["keys"].as_array().unwrap().len(), 1);
}

#[test]
fn reader_sees_version_committed_before_its_snapshot() {
    let mut sim = simulation("mvcc", Value::Null);
    sim.execute("begin", &Value::Null).unwrap();
    sim.execute(
        "write",
        &json!({ "txId": "tx-1", "rowId": "users:1", "data": { "name": "A" } }),
    )
    .unwrap();
    sim.execute("commit", &json!({ "txId": "tx-1" })).unwrap();
    sim.execute("begin", &Value::Null).unwrap();
    let trace = sim
        .execute("read", &json!({ "txId": "tx-2", "rowId": "users:1" }))
        .unwrap();

    let check = trace
        .steps()
        .iter()
        .find(|s| s.title.starts_with("Check "))
        .unwrap();
    assert!(check.description.contains("committed before snapshot"));
    assert_eq!(trace.last().unwrap().title, "Version Found");
}

#[test]
fn select_tokens_and_statement_children() {
    let mut sim = simulation("query-parser", Value::Null);
    let trace = sim
        .execute("parse", &json!({ "query": "SELECT * FROM users WHERE id = 1" }))
        .unwrap();
    assert!(!trace.failed());

    let snapshot = sim.snapshot();
    let tokens: Vec<(String, String)> = snapshot["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| {
            (
                t["type"].as_str().unwrap().to_string(),
                t["value"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    let expected = [
        ("SELECT", "SELECT"),
        ("STAR", "*"),
        ("FROM", "FROM"),
        ("IDENTIFIER", "users"),
        ("WHERE", "WHERE"),
        ("IDENTIFIER", "id"),
        ("OPERATOR", "="),
        ("NUMBER", "1"),
        ("EOF", ""),
    ];
    assert_eq!(
        tokens,
        expected
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>()
    );

    let root = snapshot["astRoot"].as_str().unwrap();
    let nodes = &snapshot["astNodes"];
    assert_eq!(nodes[root]["type"], "STATEMENT");
    let children: Vec<&str> = nodes[root]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| nodes[c.as_str().unwrap()]["type"].as_str().unwrap())
        .collect();
    assert_eq!(children, vec!["COLUMNS", "FROM", "WHERE"]);
}

#[test]
fn semantic_failures_are_steps_and_keep_the_structure() {
    let mut sim = simulation("btree", json!({ "initialKeys": [1, 2, 3] }));
    let before = sim.snapshot();
    let trace = sim.execute("delete", &json!({ "key": 99 })).unwrap();
    assert!(trace.failed());
    assert!(trace.last().unwrap().highlights.is_empty());
    assert_eq!(sim.snapshot()["nodes"], before["nodes"]);
}

#[test]
fn malformed_requests_are_errors_not_traces() {
    let mut sim = simulation("mvcc", Value::Null);
    assert!(sim.execute("commit", &json!({ "txId": 5 })).is_err());
    assert!(sim.execute("explode", &Value::Null).is_err());
}

#[test]
fn oversized_query_yields_a_short_error_trace() {
    use dbviz_engines::sql::{MAX_QUERY_LEN, MAX_QUERY_TOKENS};

    let mut sim = simulation("query-parser", Value::Null);
    let columns = vec!["a"; 1000].join(",");
    let trace = sim
        .execute("parse", &json!({ "query": format!("SELECT {columns} FROM t") }))
        .unwrap();
    assert!(trace.failed());
    assert_eq!(trace.len(), 2);
    assert_eq!(trace.last().unwrap().title, "Query Too Large");
    assert_eq!(sim.snapshot()["phase"], "error");
    assert!(sim.snapshot()["tokens"].as_array().unwrap().is_empty());

    let columns = vec!["a"; MAX_QUERY_TOKENS].join(",");
    assert!(columns.len() < MAX_QUERY_LEN);
    let trace = sim
        .execute("tokenize", &json!({ "query": format!("SELECT {columns} FROM t") }))
        .unwrap();
    assert_eq!(trace.titles(), vec!["Start Parsing", "Query Too Large"]);
}

#[test]
fn deeply_nested_query_fails_within_a_bounded_trace() {
    use dbviz_engines::sql::MAX_NESTING_DEPTH;

    let mut sim = simulation("query-parser", Value::Null);
    let depth = MAX_NESTING_DEPTH + 1;
    let query = format!("SELECT a FROM t WHERE {}a = 1{}", "(".repeat(depth), ")".repeat(depth));
    let trace = sim.execute("parse", &json!({ "query": query })).unwrap();
    assert!(trace.failed());
    assert!(trace.len() < 100);
    let last = trace.last().unwrap();
    assert_eq!(last.title, "Parse Error");
    assert!(last.description.contains("nested deeper than"));
}
