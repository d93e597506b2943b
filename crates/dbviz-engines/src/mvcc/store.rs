//! Multi-version row store with snapshot isolation.
//!
//! Rows own a newest-first chain of versions. A transaction reads the first
//! version in the chain that its snapshot (its start timestamp) can see.
//! Deletes stamp a tombstone on the chain head instead of removing it.

use std::collections::BTreeMap;

use dbviz_core::{palette, Highlight, Metadata, Probe, TxId, VersionId};
use indexmap::IndexSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TxId,
    pub start_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<u64>,
    pub status: TxStatus,
    pub read_set: IndexSet<String>,
    pub write_set: IndexSet<String>,
}

impl Transaction {
    /// Commit timestamp if the transaction committed.
    pub fn committed_at(&self) -> Option<u64> {
        match self.status {
            TxStatus::Committed => self.commit_time,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub row_id: String,
    pub data: Metadata,
    pub created_by: TxId,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<TxId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<u64>,
    /// Next older version of the same row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<VersionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    pub current_version: Option<VersionId>,
    /// Newest first.
    pub version_chain: Vec<VersionId>,
}

/// Outcome of checking one version against a reader's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Visible(String),
    Invisible(String),
    /// The row is deleted as far as the reader can tell; the walk stops.
    Deleted(String),
}

impl Verdict {
    pub fn reason(&self) -> &str {
        match self {
            Verdict::Visible(r) | Verdict::Invisible(r) | Verdict::Deleted(r) => r,
        }
    }
}

/// Result of a chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(VersionId),
    Deleted(VersionId),
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MvccStore {
    transactions: BTreeMap<TxId, Transaction>,
    versions: BTreeMap<VersionId, Version>,
    rows: BTreeMap<String, Row>,
    /// Logical clock, advanced once per commit.
    global_timestamp: u64,
    active_transaction: Option<TxId>,
    #[serde(skip)]
    next_tx: u32,
    #[serde(skip)]
    next_version: u32,
}

impl Default for MvccStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MvccStore {
    pub fn new() -> Self {
        MvccStore {
            transactions: BTreeMap::new(),
            versions: BTreeMap::new(),
            rows: BTreeMap::new(),
            global_timestamp: 1,
            active_transaction: None,
            next_tx: 0,
            next_version: 0,
        }
    }

    pub fn clock(&self) -> u64 {
        self.global_timestamp
    }

    pub fn active_transaction(&self) -> Option<TxId> {
        self.active_transaction
    }

    pub fn transaction(&self, id: TxId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub fn version(&self, id: VersionId) -> Option<&Version> {
        self.versions.get(&id)
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Decides whether `version` is visible to `reader`.
    ///
    /// Rules, in order: the reader's own tombstone hides the row; the
    /// reader's own writes are visible; versions of uncommitted creators or
    /// creators that committed after the snapshot are invisible; a tombstone
    /// committed at or before the snapshot hides the row; anything else is
    /// visible.
    pub fn verdict(&self, reader: &Transaction, version: &Version) -> Verdict {
        if version.deleted_by == Some(reader.id) {
            return Verdict::Deleted(format!(
                "Deleted by current transaction {}",
                reader.id
            ));
        }
        if version.created_by == reader.id {
            return Verdict::Visible("Created by current transaction".to_string());
        }
        let creator = self.transactions.get(&version.created_by);
        let Some(commit) = creator.and_then(Transaction::committed_at) else {
            let status = creator.map_or("unknown", |t| match t.status {
                TxStatus::Active => "still active",
                TxStatus::Aborted => "aborted",
                TxStatus::Committed => "committed",
            });
            return Verdict::Invisible(format!(
                "Creator transaction {} is {status}, not committed",
                version.created_by
            ));
        };
        if commit > reader.start_time {
            return Verdict::Invisible(format!(
                "Committed at {commit}, after our snapshot {}",
                reader.start_time
            ));
        }
        if let Some(deleter) = version.deleted_by {
            let deleted = self
                .transactions
                .get(&deleter)
                .and_then(Transaction::committed_at);
            if let Some(deleted) = deleted.filter(|&d| d <= reader.start_time) {
                return Verdict::Deleted(format!(
                    "Deleted by {deleter}, committed at {deleted} before our snapshot {}",
                    reader.start_time
                ));
            }
        }
        Verdict::Visible(format!(
            "Created by {}, committed at {commit}: committed before snapshot {}",
            version.created_by, reader.start_time
        ))
    }

    /// Walks `row`'s chain for `reader` without recording anything.
    pub fn visible_version(&self, reader: TxId, row: &str) -> ReadOutcome {
        let (Some(tx), Some(row)) = (self.transactions.get(&reader), self.rows.get(row)) else {
            return ReadOutcome::NotFound;
        };
        for id in &row.version_chain {
            let Some(version) = self.versions.get(id) else {
                continue;
            };
            match self.verdict(tx, version) {
                Verdict::Visible(_) => return ReadOutcome::Found(*id),
                Verdict::Deleted(_) => return ReadOutcome::Deleted(*id),
                Verdict::Invisible(_) => {}
            }
        }
        ReadOutcome::NotFound
    }

    /// The version of every row that `reader` would read, in row order.
    /// Rows it cannot see, or sees as deleted, are left out.
    pub fn visible_versions(&self, reader: TxId) -> Vec<VersionId> {
        self.rows
            .keys()
            .filter_map(|row| match self.visible_version(reader, row) {
                ReadOutcome::Found(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Looks up an active transaction, recording an error step otherwise.
    fn require_active(&self, tx: TxId, probe: &mut Probe<'_>) -> bool {
        match self.transactions.get(&tx) {
            None => {
                probe.fail(self, "Error", format!("Transaction {tx} not found"));
                false
            }
            Some(t) if t.status != TxStatus::Active => {
                let status = match t.status {
                    TxStatus::Committed => "committed",
                    _ => "aborted",
                };
                probe.fail(
                    self,
                    "Error",
                    format!("Transaction {tx} is already {status}; only active transactions can do that"),
                );
                false
            }
            Some(_) => true,
        }
    }

    fn tx_mut(&mut self, tx: TxId) -> Option<&mut Transaction> {
        self.transactions.get_mut(&tx)
    }

    /// Re-links `prev` pointers and the current version after removals.
    fn relink(&mut self, row: &str) {
        let Some(r) = self.rows.get_mut(row) else {
            return;
        };
        r.current_version = r.version_chain.first().copied();
        for (i, id) in r.version_chain.iter().enumerate() {
            if let Some(v) = self.versions.get_mut(id) {
                v.prev = r.version_chain.get(i + 1).copied();
            }
        }
    }

    // -- operations --------------------------------------------------------

    pub fn begin(&mut self, probe: &mut Probe<'_>) -> TxId {
        probe.record(
            self,
            "Begin Transaction",
            format!("Starting new transaction at timestamp {}", self.global_timestamp),
            [],
        );
        self.next_tx += 1;
        let id = TxId(self.next_tx);
        self.transactions.insert(
            id,
            Transaction {
                id,
                start_time: self.global_timestamp,
                commit_time: None,
                status: TxStatus::Active,
                read_set: IndexSet::new(),
                write_set: IndexSet::new(),
            },
        );
        self.active_transaction = Some(id);
        if probe.is_recording() {
            let visible = self.visible_versions(id);
            let highlights = std::iter::once(Highlight::row(id, palette::SUCCESS).pulse())
                .chain(visible.iter().map(|v| Highlight::cell(v, palette::EXAMINE)));
            probe.record(
                self,
                "Transaction Started",
                format!(
                    "Created transaction {id} with start time {}. It sees every version committed at or before {}: {} row(s) visible",
                    self.global_timestamp,
                    self.global_timestamp,
                    visible.len()
                ),
                highlights,
            );
        }
        id
    }

    pub fn read(&mut self, tx: TxId, row: &str, probe: &mut Probe<'_>) -> ReadOutcome {
        if !self.require_active(tx, probe) {
            return ReadOutcome::NotFound;
        }
        let (Some(reader), Some(chain)) = (
            self.transactions.get(&tx).cloned(),
            self.rows.get(row).map(|r| r.version_chain.clone()),
        ) else {
            probe.fail(self, "Error", format!("Row {row} not found"));
            return ReadOutcome::NotFound;
        };

        probe.record(
            self,
            format!("Read {row}"),
            format!(
                "Transaction {tx} reading row {row} at snapshot time {}",
                reader.start_time
            ),
            [Highlight::row(tx, palette::EXAMINE).pulse()],
        );

        let mut outcome = ReadOutcome::NotFound;
        for id in chain {
            let Some(version) = self.versions.get(&id) else {
                continue;
            };
            let verdict = self.verdict(&reader, version);
            let color = match verdict {
                Verdict::Visible(_) => palette::SUCCESS,
                Verdict::Invisible(_) | Verdict::Deleted(_) => palette::FAILURE,
            };
            probe.record(
                self,
                format!("Check {id}"),
                verdict.reason().to_string(),
                [Highlight::cell(id, color).pulse()],
            );
            match verdict {
                Verdict::Visible(_) => {
                    outcome = ReadOutcome::Found(id);
                    break;
                }
                Verdict::Deleted(_) => {
                    outcome = ReadOutcome::Deleted(id);
                    break;
                }
                Verdict::Invisible(_) => {}
            }
        }

        match outcome {
            ReadOutcome::Found(id) => {
                if let Some(t) = self.tx_mut(tx) {
                    t.read_set.insert(row.to_string());
                }
                let data = self
                    .versions
                    .get(&id)
                    .and_then(|v| serde_json::to_string(&v.data).ok())
                    .unwrap_or_default();
                probe.record(
                    self,
                    "Version Found",
                    format!("Reading version {id} with data: {data}"),
                    [Highlight::cell(id, palette::SUCCESS).pulse()],
                );
            }
            ReadOutcome::Deleted(id) => {
                probe.record(
                    self,
                    "Row Deleted",
                    format!("Version {id} carries a tombstone visible to {tx}. Row {row} does not exist in this snapshot"),
                    [Highlight::cell(id, palette::FAILURE)],
                );
            }
            ReadOutcome::NotFound => {
                probe.record(
                    self,
                    "No Visible Version",
                    format!("No version of row {row} is visible to {tx}"),
                    [],
                );
            }
        }
        outcome
    }

    pub fn write(&mut self, tx: TxId, row: &str, data: Metadata, probe: &mut Probe<'_>) -> Option<VersionId> {
        if !self.require_active(tx, probe) {
            return None;
        }
        probe.record(
            self,
            format!("Write to {row}"),
            format!("Transaction {tx} writing to row {row}"),
            [Highlight::row(tx, palette::CHANGE).pulse()],
        );

        let previous = self.rows.get(row).and_then(|r| r.version_chain.first().copied());
        if previous.is_none() {
            self.rows.insert(
                row.to_string(),
                Row {
                    id: row.to_string(),
                    current_version: None,
                    version_chain: Vec::new(),
                },
            );
            probe.record(
                self,
                "Create Row",
                format!("Row {row} doesn't exist, creating new row"),
                [],
            );
        }

        self.next_version += 1;
        let id = VersionId(self.next_version);
        let description = format!(
            "Created version {id} with data: {}",
            serde_json::to_string(&data).unwrap_or_default()
        );
        self.versions.insert(
            id,
            Version {
                id,
                row_id: row.to_string(),
                data,
                created_by: tx,
                created_at: self.global_timestamp,
                deleted_by: None,
                deleted_at: None,
                prev: previous,
            },
        );
        if let Some(r) = self.rows.get_mut(row) {
            r.version_chain.insert(0, id);
            r.current_version = Some(id);
        }
        if let Some(t) = self.tx_mut(tx) {
            t.write_set.insert(row.to_string());
        }
        probe.record(
            self,
            "Version Created",
            description,
            [Highlight::cell(id, palette::SUCCESS).fade_in()],
        );

        if let Some(prev) = previous {
            probe.record(
                self,
                "Shadow Previous Version",
                format!("{id} is the new head of row {row} and shadows {prev}. Older snapshots still read {prev} until {tx} commits"),
                [
                    Highlight::cell(prev, palette::MUTED),
                    Highlight::edge(id, prev, palette::MUTED),
                ],
            );
        }
        Some(id)
    }

    pub fn delete(&mut self, tx: TxId, row: &str, probe: &mut Probe<'_>) -> Option<VersionId> {
        if !self.require_active(tx, probe) {
            return None;
        }
        let Some(head) = self.rows.get(row).and_then(|r| r.version_chain.first().copied()) else {
            probe.fail(self, "Error", format!("Row {row} not found"));
            return None;
        };
        if let Some(other) = self.versions.get(&head).and_then(|v| v.deleted_by) {
            probe.fail(
                self,
                "Error",
                format!("Version {head} of row {row} is already deleted by {other}"),
            );
            return None;
        }

        probe.record(
            self,
            format!("Delete {row}"),
            format!("Transaction {tx} deleting row {row}. Versions are never removed in place; the head version {head} gets a tombstone"),
            [Highlight::row(tx, palette::CHANGE).pulse()],
        );
        let now = self.global_timestamp;
        if let Some(v) = self.versions.get_mut(&head) {
            v.deleted_by = Some(tx);
            v.deleted_at = Some(now);
        }
        if let Some(t) = self.tx_mut(tx) {
            t.write_set.insert(row.to_string());
        }
        probe.record(
            self,
            "Mark Tombstone",
            format!("{head} marked deleted by {tx} at {now}. Snapshots taken after {tx} commits will not see row {row}"),
            [Highlight::cell(head, palette::FAILURE).pulse()],
        );
        Some(head)
    }

    pub fn commit(&mut self, tx: TxId, probe: &mut Probe<'_>) -> Option<u64> {
        if !self.require_active(tx, probe) {
            return None;
        }
        let write_set: Vec<String> = self
            .transactions
            .get(&tx)
            .map(|t| t.write_set.iter().cloned().collect())
            .unwrap_or_default();
        probe.record(
            self,
            format!("Commit {tx}"),
            format!("Committing transaction {tx} with {} writes", write_set.len()),
            [Highlight::row(tx, palette::CHANGE).pulse()],
        );

        self.global_timestamp += 1;
        let commit = self.global_timestamp;
        if let Some(t) = self.tx_mut(tx) {
            t.commit_time = Some(commit);
            t.status = TxStatus::Committed;
        }
        if self.active_transaction == Some(tx) {
            self.active_transaction = None;
        }

        for row in &write_set {
            let touched = self.rows.get(row).and_then(|r| {
                r.version_chain.iter().copied().find(|id| {
                    self.versions
                        .get(id)
                        .is_some_and(|v| v.created_by == tx || v.deleted_by == Some(tx))
                })
            });
            let Some(id) = touched else {
                continue;
            };
            let deleted = self.versions.get(&id).is_some_and(|v| v.deleted_by == Some(tx));
            let (description, color) = if deleted {
                (
                    format!("Tombstone on {id} takes effect: row {row} is gone for transactions starting at {commit} or later"),
                    palette::FAILURE,
                )
            } else {
                (
                    format!("Version {id} of row {row} is now visible to transactions starting at {commit} or later"),
                    palette::SUCCESS,
                )
            };
            probe.record(
                self,
                format!("Finalize {row}"),
                description,
                [Highlight::cell(id, color).pulse()],
            );
        }

        probe.record(
            self,
            "Commit Complete",
            format!("Transaction {tx} committed at timestamp {commit}"),
            [Highlight::row(tx, palette::SUCCESS).pulse()],
        );
        Some(commit)
    }

    pub fn abort(&mut self, tx: TxId, probe: &mut Probe<'_>) -> bool {
        if !self.require_active(tx, probe) {
            return false;
        }
        probe.record(
            self,
            format!("Abort {tx}"),
            format!("Aborting transaction {tx}"),
            [Highlight::row(tx, palette::FAILURE).shake()],
        );
        if let Some(t) = self.tx_mut(tx) {
            t.status = TxStatus::Aborted;
        }
        if self.active_transaction == Some(tx) {
            self.active_transaction = None;
        }

        let write_set: Vec<String> = self
            .transactions
            .get(&tx)
            .map(|t| t.write_set.iter().cloned().collect())
            .unwrap_or_default();
        for row in &write_set {
            let chain = self
                .rows
                .get(row)
                .map(|r| r.version_chain.clone())
                .unwrap_or_default();
            for id in chain {
                let Some(version) = self.versions.get(&id) else {
                    continue;
                };
                if version.created_by == tx {
                    probe.record(
                        self,
                        format!("Remove {id}"),
                        format!("Removing uncommitted version {id} of row {row}"),
                        [Highlight::cell(id, palette::FAILURE).pulse()],
                    );
                    self.versions.remove(&id);
                    if let Some(r) = self.rows.get_mut(row) {
                        r.version_chain.retain(|v| *v != id);
                    }
                    self.relink(row);
                } else if version.deleted_by == Some(tx) {
                    if let Some(v) = self.versions.get_mut(&id) {
                        v.deleted_by = None;
                        v.deleted_at = None;
                    }
                    probe.record(
                        self,
                        format!("Restore {id}"),
                        format!("Clearing the tombstone {tx} placed on {id}"),
                        [Highlight::cell(id, palette::SUCCESS).pulse()],
                    );
                }
            }
            if self.rows.get(row).is_some_and(|r| r.version_chain.is_empty()) {
                self.rows.remove(row);
                probe.record(
                    self,
                    format!("Drop {row}"),
                    format!("Row {row} has no versions left and is removed"),
                    [],
                );
            }
        }

        probe.record(
            self,
            "Abort Complete",
            format!("Transaction {tx} aborted, all changes rolled back"),
            [Highlight::row(tx, palette::FAILURE)],
        );
        true
    }

    /// Oldest start timestamp among active transactions, or the clock.
    pub fn gc_threshold(&self) -> u64 {
        self.transactions
            .values()
            .filter(|t| t.status == TxStatus::Active)
            .map(|t| t.start_time)
            .min()
            .unwrap_or(self.global_timestamp)
    }

    /// Drops versions no snapshot at or after the threshold can reach.
    ///
    /// Walking each chain newest first, the first version committed at or
    /// before the threshold is the one the oldest snapshot reads; committed
    /// versions behind it, committed strictly before the threshold, are
    /// dropped. Uncommitted versions are always kept.
    pub fn garbage_collect(&mut self, probe: &mut Probe<'_>) -> Vec<VersionId> {
        probe.record(
            self,
            "Garbage Collection",
            "Starting garbage collection to remove old versions",
            [],
        );
        let threshold = self.gc_threshold();
        probe.record(
            self,
            "Find Threshold",
            format!("Oldest active snapshot is {threshold}. Versions shadowed by a version committed at or before {threshold} can be removed"),
            [],
        );

        let mut removed = Vec::new();
        let row_ids: Vec<String> = self.rows.keys().cloned().collect();
        for row in row_ids {
            let chain = self
                .rows
                .get(&row)
                .map(|r| r.version_chain.clone())
                .unwrap_or_default();
            let mut found_visible = false;
            let mut doomed = Vec::new();
            for id in chain {
                let commit = self
                    .versions
                    .get(&id)
                    .and_then(|v| self.transactions.get(&v.created_by))
                    .and_then(Transaction::committed_at);
                match commit {
                    Some(c) if found_visible && c < threshold => doomed.push(id),
                    Some(c) if c <= threshold => found_visible = true,
                    _ => {}
                }
            }
            for id in doomed {
                probe.record(
                    self,
                    format!("Remove {id}"),
                    format!("Version {id} of row {row} is shadowed by a newer version every active snapshot can see"),
                    [Highlight::cell(id, palette::FAILURE).pulse()],
                );
                self.versions.remove(&id);
                if let Some(r) = self.rows.get_mut(&row) {
                    r.version_chain.retain(|v| *v != id);
                }
                self.relink(&row);
                removed.push(id);
            }
        }

        probe.record(
            self,
            "GC Complete",
            format!("Garbage collection complete, removed {} versions", removed.len()),
            [],
        );
        removed
    }
}
