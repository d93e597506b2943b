//! The B-Tree structure and its traced algorithms.
//!
//! Insertion splits proactively: a full node is split before the descent
//! enters it, so a promoted median always finds room in the parent. Deletion
//! fills proactively: a child holding the minimum number of keys borrows from
//! a sibling or merges with one before the descent enters it.
//!
//! Every algorithm takes a [`Probe`]. The producer passes a recording probe;
//! configuration seeding passes a silent one and runs the very same code.

use std::collections::{BTreeMap, BTreeSet};

use dbviz_core::{palette, Highlight, NodeId, Probe};
use serde::Serialize;

/// Smallest accepted order.
pub const MIN_ORDER: usize = 3;
/// Largest accepted order.
pub const MAX_ORDER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BTreeNode {
    pub id: NodeId,
    pub keys: Vec<i64>,
    pub children: Vec<NodeId>,
    pub is_leaf: bool,
    pub parent: Option<NodeId>,
}

/// A B-Tree of unique `i64` keys. Serializes as its visualization snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BTree {
    /// Effective order; see [`effective_order`].
    order: usize,
    /// Order as configured, before rounding.
    requested_order: usize,
    root_id: Option<NodeId>,
    nodes: BTreeMap<NodeId, BTreeNode>,
    /// Nodes visited by the latest search, insert or delete.
    path: Vec<NodeId>,
    #[serde(skip)]
    next_node: u32,
}

/// Highlight target for a key.
pub fn key_target(key: i64) -> String {
    format!("key-{key}")
}

/// Odd orders cannot keep both halves of a proactive split at or above the
/// minimum fill, so they are rounded up to the next even order.
pub fn effective_order(requested: usize) -> usize {
    let order = requested.clamp(MIN_ORDER, MAX_ORDER);
    if order % 2 == 1 {
        order + 1
    } else {
        order
    }
}

/// Index of the first key that is `>= key`.
fn position(keys: &[i64], key: i64) -> usize {
    keys.partition_point(|&k| k < key)
}

impl BTree {
    pub fn new(order: usize) -> Self {
        BTree {
            order: effective_order(order),
            requested_order: order,
            root_id: None,
            nodes: BTreeMap::new(),
            path: Vec::new(),
            next_node: 0,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn requested_order(&self) -> usize {
        self.requested_order
    }

    pub fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum key count of every non-root node, `ceil(m/2) - 1`.
    pub fn min_keys(&self) -> usize {
        (self.order - 1) / 2
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    pub fn node(&self, id: NodeId) -> Option<&BTreeNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &BTreeNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.root_id.is_none()
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<i64> {
        let mut out = Vec::new();
        if let Some(root) = self.root_id {
            self.collect_range(root, i64::MIN, i64::MAX, &mut out);
        }
        out
    }

    pub fn contains(&self, key: i64) -> bool {
        self.locate(key).is_some()
    }

    /// Number of levels; 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root_id;
        while let Some(id) = current {
            height += 1;
            current = self.nodes.get(&id).and_then(|n| n.children.first().copied());
        }
        height
    }

    /// Node and position holding `key`, found without recording anything.
    pub fn locate(&self, key: i64) -> Option<(NodeId, usize)> {
        let mut current = self.root_id?;
        loop {
            let node = self.nodes.get(&current)?;
            let i = position(&node.keys, key);
            if node.keys.get(i) == Some(&key) {
                return Some((current, i));
            }
            if node.is_leaf {
                return None;
            }
            current = *node.children.get(i)?;
        }
    }

    /// Verifies the structural invariants: sorted keys within bounds, key
    /// counts within `[min, max]` for non-root nodes, consistent parent
    /// links, `keys + 1` children per internal node, and leaves at one depth.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(root) = self.root_id else {
            return if self.nodes.is_empty() {
                Ok(())
            } else {
                Err(format!("{} nodes but no root", self.nodes.len()))
            };
        };
        let mut leaf_depth = None;
        let mut seen = 0;
        self.check_node(root, None, None, None, 0, &mut leaf_depth, &mut seen)?;
        if seen != self.nodes.len() {
            return Err(format!(
                "{} of {} nodes unreachable from the root",
                self.nodes.len() - seen,
                self.nodes.len()
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        lo: Option<i64>,
        hi: Option<i64>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        seen: &mut usize,
    ) -> Result<(), String> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| format!("dangling child pointer to {id}"))?;
        *seen += 1;

        if node.parent != parent {
            return Err(format!("{id} has parent {:?}, expected {:?}", node.parent, parent));
        }
        let n = node.keys.len();
        if n > self.max_keys() {
            return Err(format!("{id} holds {n} keys, max is {}", self.max_keys()));
        }
        if parent.is_some() && n < self.min_keys() {
            return Err(format!("{id} holds {n} keys, min is {}", self.min_keys()));
        }
        if n == 0 {
            return Err(format!("{id} has no keys"));
        }
        if !node.keys.windows(2).all(|w| w[0] < w[1]) {
            return Err(format!("{id} keys {:?} are not strictly ascending", node.keys));
        }
        let in_bounds = node
            .keys
            .iter()
            .all(|&k| lo.map_or(true, |lo| k > lo) && hi.map_or(true, |hi| k < hi));
        if !in_bounds {
            return Err(format!("{id} keys {:?} escape bounds ({lo:?}, {hi:?})", node.keys));
        }

        if node.is_leaf {
            if !node.children.is_empty() {
                return Err(format!("leaf {id} has children"));
            }
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(format!("leaf {id} at depth {depth}, other leaves at {d}"));
                }
                Some(_) => {}
            }
            return Ok(());
        }

        if node.children.len() != n + 1 {
            return Err(format!(
                "{id} has {n} keys but {} children",
                node.children.len()
            ));
        }
        for (i, &child) in node.children.iter().enumerate() {
            let child_lo = if i == 0 { lo } else { Some(node.keys[i - 1]) };
            let child_hi = node.keys.get(i).copied().or(hi);
            self.check_node(child, Some(id), child_lo, child_hi, depth + 1, leaf_depth, seen)?;
        }
        Ok(())
    }

    // -- node storage ------------------------------------------------------

    fn get(&self, id: NodeId) -> &BTreeNode {
        &self.nodes[&id]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut BTreeNode {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => unreachable!("{id} is not in the tree"),
        }
    }

    fn alloc(&mut self, is_leaf: bool, parent: Option<NodeId>) -> NodeId {
        self.next_node += 1;
        let id = NodeId(self.next_node);
        self.nodes.insert(
            id,
            BTreeNode {
                id,
                keys: Vec::new(),
                children: Vec::new(),
                is_leaf,
                parent,
            },
        );
        id
    }

    fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn created_since(&self, before: &BTreeSet<NodeId>) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|id| !before.contains(id))
            .copied()
            .collect()
    }

    fn max_key(&self, mut id: NodeId) -> i64 {
        loop {
            let node = self.get(id);
            match node.children.last() {
                Some(&child) if !node.is_leaf => id = child,
                _ => return node.keys.last().copied().unwrap_or_default(),
            }
        }
    }

    fn min_key(&self, mut id: NodeId) -> i64 {
        loop {
            let node = self.get(id);
            match node.children.first() {
                Some(&child) if !node.is_leaf => id = child,
                _ => return node.keys.first().copied().unwrap_or_default(),
            }
        }
    }

    // -- search ------------------------------------------------------------

    /// Descends from the root, recording each comparison and pointer follow.
    pub fn search(&mut self, key: i64, probe: &mut Probe<'_>) -> bool {
        self.path.clear();
        probe.record(
            self,
            format!("Search for {key}"),
            format!("Starting search for key {key} in the B-Tree"),
            [],
        );
        let Some(mut current) = self.root_id else {
            probe.record(
                self,
                "Tree Empty",
                format!("The tree is empty. Key {key} not found."),
                [],
            );
            return false;
        };

        loop {
            self.path.push(current);
            let node = self.get(current);
            let i = position(&node.keys, key);
            let found = node.keys.get(i) == Some(&key);
            let verdict = match node.keys.get(i) {
                Some(&k) if k == key => format!("equal to key at position {i}"),
                Some(&k) => format!("less than key {k} at position {i}"),
                None => "greater than all keys".to_string(),
            };
            let next = if found || node.is_leaf {
                None
            } else {
                node.children.get(i).copied()
            };
            let description = format!("Comparing {key} with keys {:?}. Result: {verdict}", node.keys);
            probe.record(
                self,
                format!("Examine {current}"),
                description,
                [Highlight::node(current, palette::EXAMINE).pulse()],
            );

            if found {
                probe.record(
                    self,
                    "Key Found!",
                    format!("Key {key} found in {current} at position {i}"),
                    [
                        Highlight::node(current, palette::SUCCESS),
                        Highlight::cell(key_target(key), palette::SUCCESS).pulse(),
                    ],
                );
                return true;
            }
            let Some(next) = next else {
                probe.record(
                    self,
                    "Key Not Found",
                    format!("{current} is a leaf without key {key}. Key {key} does not exist in the B-Tree"),
                    [],
                );
                return false;
            };
            probe.record(
                self,
                "Follow Child Pointer",
                format!("Following child pointer {i} from {current} to {next}"),
                [Highlight::edge(current, next, palette::CHANGE).pulse()],
            );
            current = next;
        }
    }

    // -- insert ------------------------------------------------------------

    /// Inserts `key`, splitting full nodes on the way down.
    pub fn insert(&mut self, key: i64, probe: &mut Probe<'_>) -> bool {
        self.path.clear();
        probe.record(
            self,
            format!("Insert {key}"),
            format!("Starting insertion of key {key} into the B-Tree"),
            [],
        );

        let Some(root) = self.root_id else {
            let id = self.alloc(true, None);
            self.get_mut(id).keys.push(key);
            self.root_id = Some(id);
            self.path.push(id);
            probe.record(
                self,
                "Create Root",
                format!("Tree is empty. Creating root {id} with key {key}"),
                [Highlight::node(id, palette::SUCCESS).fade_in()],
            );
            probe.record(
                self,
                "Insertion Complete",
                format!("Key {key} inserted as the root"),
                [Highlight::cell(key_target(key), palette::SUCCESS).pulse()],
            );
            return true;
        };

        if self.contains(key) {
            probe.fail(
                self,
                "Duplicate Key",
                format!("Key {key} is already in the tree. Keys are unique, so nothing was inserted."),
            );
            return false;
        }

        let mut current = root;
        if self.get(root).keys.len() == self.max_keys() {
            let before = self.node_ids();
            let new_root = self.alloc(false, None);
            self.get_mut(new_root).children.push(root);
            self.get_mut(root).parent = Some(new_root);
            self.root_id = Some(new_root);
            let median = self.split_child(new_root, 0);
            let created = self.created_since(&before);
            probe.record(
                self,
                "Split Node",
                format!(
                    "Root {root} is full ({} keys). Median {median} moves up into new root {new_root} and the tree grows by one level",
                    self.max_keys()
                ),
                created
                    .iter()
                    .map(|&id| Highlight::node(id, palette::CHANGE).fade_in()),
            );
            current = new_root;
        }

        loop {
            self.path.push(current);
            let node = self.get(current);
            let is_leaf = node.is_leaf;
            let mut i = position(&node.keys, key);
            let description = format!(
                "Examining node with keys {:?}. Looking for position to insert {key}",
                node.keys
            );
            probe.record(
                self,
                format!("Traverse to {current}"),
                description,
                [Highlight::node(current, palette::EXAMINE).pulse()],
            );

            if is_leaf {
                self.get_mut(current).keys.insert(i, key);
                probe.record(
                    self,
                    "Insert Key",
                    format!("Leaf {current} has space. Inserting key {key} at position {i}"),
                    [
                        Highlight::node(current, palette::SUCCESS),
                        Highlight::cell(key_target(key), palette::SUCCESS).fade_in(),
                    ],
                );
                break;
            }

            let child = self.get(current).children[i];
            if self.get(child).keys.len() == self.max_keys() {
                let before = self.node_ids();
                let median = self.split_child(current, i);
                let created = self.created_since(&before);
                probe.record(
                    self,
                    "Split Node",
                    format!(
                        "Child {child} is full ({} keys). Median {median} moves up into {current}",
                        self.max_keys()
                    ),
                    created
                        .iter()
                        .map(|&id| Highlight::node(id, palette::CHANGE).fade_in()),
                );
                if key > median {
                    i += 1;
                }
            }
            current = self.get(current).children[i];
        }

        probe.record(
            self,
            "Insertion Complete",
            format!("Key {key} successfully inserted into the B-Tree"),
            [Highlight::cell(key_target(key), palette::SUCCESS).pulse()],
        );
        true
    }

    /// Splits the full child at `index` of `parent`. Returns the promoted median.
    fn split_child(&mut self, parent: NodeId, index: usize) -> i64 {
        let mid = (self.order - 1) / 2;
        let full = self.get(parent).children[index];
        let is_leaf = self.get(full).is_leaf;
        let sibling = self.alloc(is_leaf, Some(parent));

        let node = self.get_mut(full);
        let right_keys = node.keys.split_off(mid + 1);
        let median = node.keys.remove(mid);
        let right_children = if is_leaf {
            Vec::new()
        } else {
            node.children.split_off(mid + 1)
        };

        for &child in &right_children {
            self.get_mut(child).parent = Some(sibling);
        }
        let right = self.get_mut(sibling);
        right.keys = right_keys;
        right.children = right_children;

        let p = self.get_mut(parent);
        p.keys.insert(index, median);
        p.children.insert(index + 1, sibling);
        median
    }

    // -- delete ------------------------------------------------------------

    /// Deletes `key`. A missing key leaves the tree untouched and ends the
    /// trace with an error step.
    pub fn delete(&mut self, key: i64, probe: &mut Probe<'_>) -> bool {
        self.path.clear();
        probe.record(
            self,
            format!("Delete {key}"),
            format!("Starting deletion of key {key} from the B-Tree"),
            [],
        );
        let (Some(root), Some((at, index))) = (self.root_id, self.locate(key)) else {
            probe.fail(
                self,
                "Key Not Found",
                format!("Key {key} does not exist in the tree. Nothing to delete."),
            );
            return false;
        };
        probe.record(
            self,
            "Key Found",
            format!("Found key {key} at {at}, position {index}"),
            [
                Highlight::node(at, palette::EXAMINE),
                Highlight::cell(key_target(key), palette::FAILURE).pulse(),
            ],
        );

        self.delete_from(root, key, probe);
        self.collapse_root(probe);
        let nodes = &self.nodes;
        self.path.retain(|id| nodes.contains_key(id));

        probe.record(
            self,
            "Deletion Complete",
            format!("Key {key} successfully deleted from the B-Tree"),
            [],
        );
        true
    }

    fn delete_from(&mut self, start: NodeId, key: i64, probe: &mut Probe<'_>) {
        let min = self.min_keys();
        let mut current = start;
        let mut key = key;

        loop {
            self.path.push(current);
            let node = self.get(current);
            let i = position(&node.keys, key);
            let found = node.keys.get(i) == Some(&key);
            let is_leaf = node.is_leaf;
            let left = node.children.get(i).copied();
            let right = node.children.get(i + 1).copied();

            if is_leaf {
                if found {
                    self.get_mut(current).keys.remove(i);
                    probe.record(
                        self,
                        "Delete from Leaf",
                        format!("Key {key} is in leaf {current}. Removing it directly"),
                        [Highlight::node(current, palette::CHANGE).pulse()],
                    );
                }
                return;
            }
            let Some(left) = left else {
                return;
            };

            if found {
                let Some(right) = right else {
                    return;
                };
                if self.get(left).keys.len() > min {
                    let pred = self.max_key(left);
                    self.get_mut(current).keys[i] = pred;
                    probe.record(
                        self,
                        "Replace with Predecessor",
                        format!(
                            "Key {key} is in internal node {current}. Left child {left} can spare a key, so {key} is replaced by its predecessor {pred}, which is then deleted from the left subtree"
                        ),
                        [
                            Highlight::node(current, palette::CHANGE),
                            Highlight::cell(key_target(pred), palette::CHANGE).pulse(),
                        ],
                    );
                    key = pred;
                    current = left;
                } else if self.get(right).keys.len() > min {
                    let succ = self.min_key(right);
                    self.get_mut(current).keys[i] = succ;
                    probe.record(
                        self,
                        "Replace with Successor",
                        format!(
                            "Key {key} is in internal node {current}. Right child {right} can spare a key, so {key} is replaced by its successor {succ}, which is then deleted from the right subtree"
                        ),
                        [
                            Highlight::node(current, palette::CHANGE),
                            Highlight::cell(key_target(succ), palette::CHANGE).pulse(),
                        ],
                    );
                    key = succ;
                    current = right;
                } else {
                    self.merge_children(current, i);
                    probe.record(
                        self,
                        "Merge Nodes",
                        format!(
                            "Children {left} and {right} both hold the minimum {min} key(s). Key {key} and {right} are merged into {left}"
                        ),
                        [Highlight::node(left, palette::CHANGE).fade_in()],
                    );
                    current = left;
                }
                continue;
            }

            let next = if self.get(left).keys.len() <= min {
                let index = self.fill_child(current, i, probe);
                self.get(current).children[index]
            } else {
                left
            };
            probe.record(
                self,
                "Follow Child Pointer",
                format!("Key {key} is not in {current}. Descending into {next}"),
                [Highlight::edge(current, next, palette::CHANGE).pulse()],
            );
            current = next;
        }
    }

    /// Brings the child at `index` above the minimum before the descent
    /// enters it. Returns the index of the child to descend into.
    fn fill_child(&mut self, parent: NodeId, index: usize, probe: &mut Probe<'_>) -> usize {
        let min = self.min_keys();
        let p = self.get(parent);
        let child = p.children[index];
        let left = index.checked_sub(1).map(|j| p.children[j]);
        let right = p.children.get(index + 1).copied();

        if let Some(left) = left.filter(|&l| self.get(l).keys.len() > min) {
            self.borrow_from_left(parent, index);
            probe.record(
                self,
                "Borrow from Left Sibling",
                format!(
                    "{child} holds only {min} key(s). A key rotates from left sibling {left} through {parent} into {child}"
                ),
                [
                    Highlight::node(child, palette::CHANGE).pulse(),
                    Highlight::node(left, palette::CHANGE),
                ],
            );
            return index;
        }
        if let Some(right) = right.filter(|&r| self.get(r).keys.len() > min) {
            self.borrow_from_right(parent, index);
            probe.record(
                self,
                "Borrow from Right Sibling",
                format!(
                    "{child} holds only {min} key(s). A key rotates from right sibling {right} through {parent} into {child}"
                ),
                [
                    Highlight::node(child, palette::CHANGE).pulse(),
                    Highlight::node(right, palette::CHANGE),
                ],
            );
            return index;
        }

        let (into, absorbed, index) = match (left, right) {
            (Some(left), _) => (left, child, index - 1),
            (None, Some(right)) => (child, right, index),
            (None, None) => return index,
        };
        self.merge_children(parent, index);
        probe.record(
            self,
            "Merge Nodes",
            format!(
                "{child} and its siblings hold the minimum {min} key(s). {absorbed} and a separator key from {parent} are merged into {into}"
            ),
            [Highlight::node(into, palette::CHANGE).fade_in()],
        );
        index
    }

    fn borrow_from_left(&mut self, parent: NodeId, index: usize) {
        let p = self.get(parent);
        let (child, left, separator) = (p.children[index], p.children[index - 1], p.keys[index - 1]);

        let donor = self.get_mut(left);
        let Some(donated) = donor.keys.pop() else {
            return;
        };
        let moved = if donor.is_leaf { None } else { donor.children.pop() };

        self.get_mut(parent).keys[index - 1] = donated;
        let node = self.get_mut(child);
        node.keys.insert(0, separator);
        if let Some(moved) = moved {
            node.children.insert(0, moved);
            self.get_mut(moved).parent = Some(child);
        }
    }

    fn borrow_from_right(&mut self, parent: NodeId, index: usize) {
        let p = self.get(parent);
        let (child, right, separator) = (p.children[index], p.children[index + 1], p.keys[index]);

        let donor = self.get_mut(right);
        if donor.keys.is_empty() {
            return;
        }
        let donated = donor.keys.remove(0);
        let moved = if donor.is_leaf || donor.children.is_empty() {
            None
        } else {
            Some(donor.children.remove(0))
        };

        self.get_mut(parent).keys[index] = donated;
        let node = self.get_mut(child);
        node.keys.push(separator);
        if let Some(moved) = moved {
            node.children.push(moved);
            self.get_mut(moved).parent = Some(child);
        }
    }

    /// Merges child `index + 1` and the separator between them into child `index`.
    fn merge_children(&mut self, parent: NodeId, index: usize) {
        let p = self.get_mut(parent);
        let left = p.children[index];
        let separator = p.keys.remove(index);
        let right = p.children.remove(index + 1);

        let Some(absorbed) = self.nodes.remove(&right) else {
            return;
        };
        for &child in &absorbed.children {
            self.get_mut(child).parent = Some(left);
        }
        let node = self.get_mut(left);
        node.keys.push(separator);
        node.keys.extend(absorbed.keys);
        node.children.extend(absorbed.children);
    }

    fn collapse_root(&mut self, probe: &mut Probe<'_>) {
        let Some(root) = self.root_id else {
            return;
        };
        let node = self.get(root);
        if !node.keys.is_empty() {
            return;
        }
        match node.children.first().copied() {
            None => {
                self.nodes.remove(&root);
                self.root_id = None;
                probe.record(
                    self,
                    "Tree Empty",
                    "The last key was removed. The tree is now empty",
                    [],
                );
            }
            Some(child) => {
                self.nodes.remove(&root);
                self.get_mut(child).parent = None;
                self.root_id = Some(child);
                probe.record(
                    self,
                    "Shrink Root",
                    format!("Root {root} has no keys left. {child} becomes the new root and the tree loses one level"),
                    [Highlight::node(child, palette::CHANGE).fade_in()],
                );
            }
        }
    }

    // -- range search ------------------------------------------------------

    /// Collects keys in `[lo, hi]` in ascending order.
    pub fn range_search(&mut self, lo: i64, hi: i64, probe: &mut Probe<'_>) -> Vec<i64> {
        self.path.clear();
        probe.record(
            self,
            format!("Range [{lo}, {hi}]"),
            format!("Starting range search for keys between {lo} and {hi}"),
            [],
        );
        if lo > hi {
            probe.fail(
                self,
                "Invalid Range",
                format!("Lower bound {lo} is greater than upper bound {hi}"),
            );
            return Vec::new();
        }

        let mut found = Vec::new();
        if let Some(root) = self.root_id {
            self.collect_range(root, lo, hi, &mut found);
        }
        if found.is_empty() {
            probe.record(
                self,
                "No Results",
                format!("No keys found in range [{lo}, {hi}]"),
                [],
            );
        } else {
            probe.record(
                self,
                "Range Search Complete",
                format!("Found {} keys in range: {:?}", found.len(), found),
                found
                    .iter()
                    .map(|&k| Highlight::cell(key_target(k), palette::SUCCESS)),
            );
        }
        found
    }

    fn collect_range(&self, id: NodeId, lo: i64, hi: i64, out: &mut Vec<i64>) {
        let node = self.get(id);
        let mut i = position(&node.keys, lo);
        while i < node.keys.len() && node.keys[i] <= hi {
            if !node.is_leaf {
                self.collect_range(node.children[i], lo, hi, out);
            }
            out.push(node.keys[i]);
            i += 1;
        }
        if !node.is_leaf {
            if let Some(&child) = node.children.get(i) {
                self.collect_range(child, lo, hi, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbviz_core::TraceRecorder;

    fn build(order: usize, keys: &[i64]) -> BTree {
        let mut tree = BTree::new(order);
        for &k in keys {
            tree.insert(k, &mut Probe::silent());
        }
        tree
    }

    fn traced<F: FnOnce(&mut BTree, &mut Probe<'_>)>(tree: &mut BTree, f: F) -> dbviz_core::Trace {
        let mut rec = TraceRecorder::new("btree", "test", &*tree);
        {
            let mut probe = Probe::new(&mut rec);
            f(tree, &mut probe);
        }
        rec.finish(&*tree)
    }

    #[test]
    fn odd_orders_round_up() {
        assert_eq!(effective_order(3), 4);
        assert_eq!(effective_order(4), 4);
        assert_eq!(effective_order(5), 6);
        assert_eq!(effective_order(1), 4);
        assert_eq!(effective_order(100), MAX_ORDER);
    }

    #[test]
    fn inserts_without_split_stay_in_root_leaf() {
        let mut tree = BTree::new(4);
        for k in [10, 20, 5] {
            let trace = traced(&mut tree, |t, p| {
                t.insert(k, p);
            });
            assert!(trace.len() >= 3);
            assert!(!trace.titles().contains(&"Split Node"));
        }
        let root = tree.node(tree.root_id().unwrap()).unwrap();
        assert!(root.is_leaf);
        assert_eq!(root.keys, vec![5, 10, 20]);
    }

    #[test]
    fn root_split_creates_two_nodes_once() {
        let mut tree = build(4, &[10, 20, 30]);
        let trace = traced(&mut tree, |t, p| {
            t.insert(40, p);
        });

        let splits: Vec<_> = trace
            .steps()
            .iter()
            .filter(|s| s.title == "Split Node")
            .collect();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].highlights.len(), 2);

        let root = tree.node(tree.root_id().unwrap()).unwrap();
        assert!(!root.is_leaf);
        assert_eq!(root.keys, vec![20]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn duplicate_insert_is_an_error_step() {
        let mut tree = build(4, &[1, 2, 3]);
        let before = tree.keys();
        let trace = traced(&mut tree, |t, p| {
            assert!(!t.insert(2, p));
        });
        assert!(trace.last().unwrap().error);
        assert_eq!(tree.keys(), before);
    }

    #[test]
    fn search_records_path_and_pointer_follows() {
        let mut tree = build(4, &[10, 20, 30, 40, 50, 60, 70, 80]);
        let trace = traced(&mut tree, |t, p| {
            assert!(t.search(70, p));
        });
        assert_eq!(trace.last().unwrap().title, "Key Found!");
        assert!(trace.titles().contains(&"Follow Child Pointer"));
        assert_eq!(tree.path().first().copied(), tree.root_id());
        assert_eq!(tree.path().len(), tree.height());

        let trace = traced(&mut tree, |t, p| {
            assert!(!t.search(25, p));
        });
        assert_eq!(trace.last().unwrap().title, "Key Not Found");
        assert!(!trace.failed());
    }

    #[test]
    fn delete_missing_key_leaves_tree_untouched() {
        let mut tree = build(4, &[10, 20, 30, 40]);
        let snapshot = serde_json::to_value(&tree).unwrap();
        let trace = traced(&mut tree, |t, p| {
            assert!(!t.delete(99, p));
        });
        assert!(trace.failed());
        assert_eq!(trace.len(), 2);
        let mut after = serde_json::to_value(&tree).unwrap();
        after["path"] = snapshot["path"].clone();
        assert_eq!(after, snapshot);
    }

    #[test]
    fn delete_demo_keeps_invariants() {
        let mut tree = build(4, &[10, 20, 30, 40, 50, 60, 70]);
        for k in [30, 50, 10] {
            let trace = traced(&mut tree, |t, p| {
                assert!(t.delete(k, p));
            });
            assert_eq!(trace.last().unwrap().title, "Deletion Complete");
            tree.check_invariants().unwrap();
            assert!(!tree.contains(k));
        }
        assert_eq!(tree.keys(), vec![20, 40, 60, 70]);
    }

    #[test]
    fn deleting_everything_clears_the_root() {
        let keys: Vec<i64> = (1..=20).collect();
        let mut tree = build(4, &keys);
        for &k in keys.iter().rev() {
            assert!(tree.delete(k, &mut Probe::silent()));
            tree.check_invariants().unwrap();
        }
        assert!(tree.root_id().is_none());
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn internal_delete_uses_predecessor_or_merge() {
        let mut tree = build(4, &[10, 20, 30, 40, 50, 60, 70]);
        let trace = traced(&mut tree, |t, p| {
            t.delete(40, p);
        });
        let titles = trace.titles();
        assert!(
            titles.contains(&"Replace with Predecessor")
                || titles.contains(&"Replace with Successor")
                || titles.contains(&"Merge Nodes")
        );
        tree.check_invariants().unwrap();
    }

    #[test]
    fn range_search_returns_sorted_keys() {
        let mut tree = build(4, &[5, 10, 15, 20, 25, 30, 35, 40, 45, 50]);
        let keys = tree.range_search(15, 35, &mut Probe::silent());
        assert_eq!(keys, vec![15, 20, 25, 30, 35]);
        assert_eq!(tree.range_search(1, 10, &mut Probe::silent()), vec![5, 10]);
        assert!(tree.range_search(100, 200, &mut Probe::silent()).is_empty());
    }

    #[test]
    fn inverted_range_is_an_error_step() {
        let mut tree = build(4, &[1, 2, 3]);
        let trace = traced(&mut tree, |t, p| {
            assert!(t.range_search(9, 1, p).is_empty());
        });
        assert!(trace.failed());
    }

    #[test]
    fn snapshot_has_renderer_fields() {
        let tree = build(4, &[1, 2, 3, 4]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["order"], 4);
        assert!(json["rootId"].is_string());
        let root = json["rootId"].as_str().unwrap();
        assert_eq!(json["nodes"][root]["isLeaf"], false);
        assert!(json["nodes"][root]["parent"].is_null());
        assert!(json.get("nextNode").is_none());
    }
}
