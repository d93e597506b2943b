//! Property tests for MVCC snapshot visibility.

use dbviz_core::{Metadata, Probe};
use dbviz_engines::mvcc::{MvccStore, ReadOutcome};
use proptest::prelude::*;
use serde_json::Value;

fn data(n: usize) -> Metadata {
    let mut m = Metadata::new();
    m.insert("n".to_string(), Value::from(n));
    m
}

proptest! {
    #[test]
    fn committed_writes_are_visible_to_later_transactions(
        rows in prop::collection::vec("[a-c]:[0-3]", 1..10),
    ) {
        let mut store = MvccStore::new();
        let mut probe = Probe::silent();
        let t1 = store.begin(&mut probe);
        let mut written = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let version = store.write(t1, row, data(i), &mut probe);
            prop_assert!(version.is_some());
            written.push((row.clone(), version));
        }
        store.commit(t1, &mut probe);

        let t2 = store.begin(&mut probe);
        for row in &rows {
            // The newest version of each row wins.
            let newest = written.iter().rev().find(|(r, _)| r == row).and_then(|(_, v)| *v);
            let outcome = store.visible_version(t2, row);
            prop_assert_eq!(outcome, ReadOutcome::Found(newest.unwrap()));
        }
    }

    #[test]
    fn uncommitted_writes_are_visible_only_to_their_creator(
        rows in prop::collection::vec("[a-c]:[0-3]", 1..10),
        readers in 1usize..4,
    ) {
        let mut store = MvccStore::new();
        let mut probe = Probe::silent();
        let writer = store.begin(&mut probe);
        let others: Vec<_> = (0..readers).map(|_| store.begin(&mut probe)).collect();
        for (i, row) in rows.iter().enumerate() {
            store.write(writer, row, data(i), &mut probe);
        }

        for row in &rows {
            prop_assert!(matches!(store.visible_version(writer, row), ReadOutcome::Found(_)));
            for &other in &others {
                prop_assert_eq!(store.visible_version(other, row), ReadOutcome::NotFound);
            }
        }
    }
}
