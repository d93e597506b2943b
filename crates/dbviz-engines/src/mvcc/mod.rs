//! MVCC trace producer.
//!
//! Operations: `begin`, `read {txId, rowId}`, `write {txId, rowId, data}`,
//! `delete {txId, rowId}`, `commit {txId}`, `abort {txId}` and `gc`.

pub mod store;

use dbviz_core::{Metadata, OperationError, Probe, Trace, TraceProducer, TraceRecorder, TxId};
use serde::Deserialize;
use serde_json::{json, Value};

pub use store::{MvccStore, ReadOutcome, Row, Transaction, TxStatus, Verdict, Version};

use crate::config::decode_config;

pub const PROJECT: &str = "mvcc";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "operation",
    content = "params",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum MvccOperation {
    Begin,
    Read {
        tx_id: TxId,
        row_id: String,
    },
    Write {
        tx_id: TxId,
        row_id: String,
        #[serde(default)]
        data: Metadata,
    },
    Delete {
        tx_id: TxId,
        row_id: String,
    },
    Commit {
        tx_id: TxId,
    },
    Abort {
        tx_id: TxId,
    },
    #[serde(alias = "garbage_collect")]
    Gc,
}

impl MvccOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            MvccOperation::Begin => "begin",
            MvccOperation::Read { .. } => "read",
            MvccOperation::Write { .. } => "write",
            MvccOperation::Delete { .. } => "delete",
            MvccOperation::Commit { .. } => "commit",
            MvccOperation::Abort { .. } => "abort",
            MvccOperation::Gc => "gc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MvccConfig {
    /// Seed `users:1`, `users:2` and `products:1`, committed by one transaction.
    pub initial_data: bool,
}

impl MvccConfig {
    pub fn build(&self) -> MvccStore {
        let mut store = MvccStore::new();
        if self.initial_data {
            seed_initial_data(&mut store);
        }
        store
    }
}

fn row_data(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Metadata::new(),
    }
}

fn seed_initial_data(store: &mut MvccStore) {
    let mut probe = Probe::silent();
    let tx = store.begin(&mut probe);
    let rows = [
        ("users:1", json!({ "id": 1, "name": "Alice", "email": "alice@example.com" })),
        ("users:2", json!({ "id": 2, "name": "Bob", "email": "bob@example.com" })),
        ("products:1", json!({ "id": 1, "name": "Widget", "price": 9.99 })),
    ];
    for (row, data) in rows {
        store.write(tx, row, row_data(data), &mut probe);
    }
    store.commit(tx, &mut probe);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MvccProducer;

impl TraceProducer for MvccProducer {
    type State = MvccStore;
    type Operation = MvccOperation;

    fn project(&self) -> &'static str {
        PROJECT
    }

    fn initial_state(&self, config: &Value) -> Result<MvccStore, OperationError> {
        Ok(decode_config::<MvccConfig>(config)?.build())
    }

    fn run_operation(&self, state: &MvccStore, operation: &MvccOperation) -> (MvccStore, Trace) {
        let mut store = state.clone();
        let mut rec = TraceRecorder::new(PROJECT, operation.kind(), &store);
        {
            let mut probe = Probe::new(&mut rec);
            match operation {
                MvccOperation::Begin => {
                    store.begin(&mut probe);
                }
                MvccOperation::Read { tx_id, row_id } => {
                    store.read(*tx_id, row_id, &mut probe);
                }
                MvccOperation::Write { tx_id, row_id, data } => {
                    store.write(*tx_id, row_id, data.clone(), &mut probe);
                }
                MvccOperation::Delete { tx_id, row_id } => {
                    store.delete(*tx_id, row_id, &mut probe);
                }
                MvccOperation::Commit { tx_id } => {
                    store.commit(*tx_id, &mut probe);
                }
                MvccOperation::Abort { tx_id } => {
                    store.abort(*tx_id, &mut probe);
                }
                MvccOperation::Gc => {
                    store.garbage_collect(&mut probe);
                }
            }
        }
        let trace = rec.finish(&store);
        (store, trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbviz_core::{ProducerSimulation, Simulation};

    #[test]
    fn initial_data_is_committed_and_readable() {
        let store = MvccProducer
            .initial_state(&json!({ "initialData": true }))
            .unwrap();
        assert_eq!(store.clock(), 2);
        assert_eq!(store.rows().count(), 3);
        assert!(store.active_transaction().is_none());
        assert_eq!(
            store.transaction(TxId(1)).unwrap().status,
            TxStatus::Committed
        );
    }

    #[test]
    fn empty_config_gives_empty_store() {
        let store = MvccProducer.initial_state(&Value::Null).unwrap();
        assert_eq!(store.clock(), 1);
        assert_eq!(store.rows().count(), 0);
    }

    #[test]
    fn operations_decode_with_camel_case_params() {
        let op = MvccProducer
            .parse_operation(
                "write",
                &json!({ "txId": "tx-1", "rowId": "users:1", "data": { "name": "A" } }),
            )
            .unwrap();
        assert!(matches!(op, MvccOperation::Write { tx_id: TxId(1), ref row_id, .. } if row_id == "users:1"));
        assert_eq!(MvccProducer.parse_operation("begin", &Value::Null).unwrap(), MvccOperation::Begin);
        assert_eq!(
            MvccProducer.parse_operation("garbage_collect", &json!({})).unwrap(),
            MvccOperation::Gc
        );
        assert!(MvccProducer
            .parse_operation("read", &json!({ "txId": "ver-1", "rowId": "x" }))
            .is_err());
    }

    #[test]
    fn snapshot_read_through_simulation() {
        let mut sim = ProducerSimulation::new(MvccProducer, &Value::Null).unwrap();
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

        assert!(!trace.failed());
        assert!(trace
            .steps()
            .iter()
            .any(|s| s.description.contains("committed before snapshot")));
        assert_eq!(sim.snapshot()["transactions"]["tx-2"]["readSet"], json!(["users:1"]));
    }

    #[test]
    fn unknown_transaction_yields_error_step_not_error() {
        let mut sim = ProducerSimulation::new(MvccProducer, &Value::Null).unwrap();
        let trace = sim.execute("commit", &json!({ "txId": "tx-9" })).unwrap();
        assert!(trace.failed());
        assert!(trace.last().unwrap().highlights.is_empty());
    }
}
