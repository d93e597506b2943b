//! B-Tree trace producer.
//!
//! Operations: `insert {key}`, `search {key}`, `delete {key}` and
//! `range {start, end}`. Configuration: `order`, `initialKeys`, `randomKeys`.

pub mod tree;

use dbviz_core::{OperationError, Probe, Trace, TraceProducer, TraceRecorder};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use serde_json::Value;

pub use tree::{effective_order, key_target, BTree, BTreeNode, MAX_ORDER, MIN_ORDER};

use crate::config::decode_config;

pub const PROJECT: &str = "btree";

/// Largest number of keys `randomKeys` may generate.
const MAX_RANDOM_KEYS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub enum BTreeOperation {
    Insert {
        key: i64,
    },
    Search {
        key: i64,
    },
    Delete {
        key: i64,
    },
    #[serde(rename = "range", alias = "range_search")]
    RangeSearch {
        start: i64,
        end: i64,
    },
}

impl BTreeOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            BTreeOperation::Insert { .. } => "insert",
            BTreeOperation::Search { .. } => "search",
            BTreeOperation::Delete { .. } => "delete",
            BTreeOperation::RangeSearch { .. } => "range",
        }
    }
}

/// Seeded key generation: `count` distinct keys in `1..=max`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RandomKeys {
    pub count: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_random_max")]
    pub max: i64,
}

fn default_random_max() -> i64 {
    100
}

impl RandomKeys {
    /// Generates the keys. The same seed always yields the same sequence.
    pub fn generate(&self) -> Result<Vec<i64>, OperationError> {
        if self.max < 1 {
            return Err(OperationError::InvalidConfig {
                reason: format!("randomKeys.max must be at least 1, got {}", self.max),
            });
        }
        if self.count > MAX_RANDOM_KEYS {
            return Err(OperationError::InvalidConfig {
                reason: format!(
                    "randomKeys.count must be at most {MAX_RANDOM_KEYS}, got {}",
                    self.count
                ),
            });
        }
        let target = self.count.min(usize::try_from(self.max).unwrap_or(usize::MAX));
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut keys = Vec::with_capacity(target);
        while keys.len() < target {
            let key = rng.gen_range(1..=self.max);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BTreeConfig {
    pub order: usize,
    pub initial_keys: Vec<i64>,
    pub random_keys: Option<RandomKeys>,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        BTreeConfig {
            order: 4,
            initial_keys: Vec::new(),
            random_keys: None,
        }
    }
}

impl BTreeConfig {
    /// Builds the configured tree. Duplicate seed keys are skipped.
    pub fn build(&self) -> Result<BTree, OperationError> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&self.order) {
            return Err(OperationError::InvalidConfig {
                reason: format!(
                    "order must be between {MIN_ORDER} and {MAX_ORDER}, got {}",
                    self.order
                ),
            });
        }
        let mut tree = BTree::new(self.order);
        if tree.order() != self.order {
            tracing::info!("btree order {} rounded up to {}", self.order, tree.order());
        }

        let random = match &self.random_keys {
            Some(random) => random.generate()?,
            None => Vec::new(),
        };
        let mut probe = Probe::silent();
        for &key in self.initial_keys.iter().chain(random.iter()) {
            tree.insert(key, &mut probe);
        }
        tree.clear_path();
        Ok(tree)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BTreeProducer;

impl TraceProducer for BTreeProducer {
    type State = BTree;
    type Operation = BTreeOperation;

    fn project(&self) -> &'static str {
        PROJECT
    }

    fn initial_state(&self, config: &Value) -> Result<BTree, OperationError> {
        decode_config::<BTreeConfig>(config)?.build()
    }

    fn run_operation(&self, state: &BTree, operation: &BTreeOperation) -> (BTree, Trace) {
        let mut tree = state.clone();
        tree.clear_path();
        let mut rec = TraceRecorder::new(PROJECT, operation.kind(), &tree);
        {
            let mut probe = Probe::new(&mut rec);
            match *operation {
                BTreeOperation::Insert { key } => {
                    tree.insert(key, &mut probe);
                }
                BTreeOperation::Search { key } => {
                    tree.search(key, &mut probe);
                }
                BTreeOperation::Delete { key } => {
                    tree.delete(key, &mut probe);
                }
                BTreeOperation::RangeSearch { start, end } => {
                    tree.range_search(start, end, &mut probe);
                }
            }
        }
        let trace = rec.finish(&tree);
        (tree, trace)
    }
}
