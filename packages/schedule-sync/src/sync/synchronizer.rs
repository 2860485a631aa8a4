//! Row events → tree mutations

use tracing::{debug, info, warn};

use super::id_generator::TransientIdGenerator;
use crate::config::UpdatePolicy;
use crate::domain::{
    ColumnType, Entry, EntryId, Origin, RangeValue, Row, RowEvent, RowEventKind, RowPatch,
    RowStore,
};
use crate::error::Result;
use crate::mapping::EntryMapper;
use crate::tree::{EntryTree, TreeBuilder};

/// Entry field compared on external updates, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Name,
    Completion,
    Range,
}

/// Why an event left the tree untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Caused by this crate's own writes
    SelfInflicted,
    /// Row has no id
    NoId,
    /// Inserted row's id already in the tree
    AlreadyPresent,
    /// No entry for the row
    UnknownEntry,
    /// Entry is being edited interactively
    Adjusting,
    /// Nothing differs
    Unchanged,
    /// Inserted row is no longer in the store
    RowGone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Inserted {
        id: EntryId,
        parent: Option<EntryId>,
    },
    /// Inserted row whose parent is not in the tree
    Orphaned {
        id: EntryId,
        parent: EntryId,
    },
    Updated {
        id: EntryId,
        fields: Vec<EntryField>,
    },
    Removed {
        id: EntryId,
    },
    Rebuilt {
        entries: usize,
    },
    Ignored(Skip),
}

/// Keeps an `EntryTree` current with row-store events
///
/// Holds no handle to the store or the tree; both are passed per event.
#[derive(Debug)]
pub struct ChangeSynchronizer<T> {
    mapper: EntryMapper<T>,
    ids: TransientIdGenerator,
    orphans: Vec<EntryId>,
    candidates: Vec<EntryId>,
}

impl<T: RangeValue> ChangeSynchronizer<T> {
    pub fn new(mapper: EntryMapper<T>) -> Self {
        Self {
            mapper,
            ids: TransientIdGenerator::new(),
            orphans: Vec::new(),
            candidates: Vec::new(),
        }
    }

    /// Ids of rows that could not be attached
    pub fn orphans(&self) -> &[EntryId] {
        &self.orphans
    }

    /// Entries a relation may reference, in registration order
    pub fn relation_candidates(&self) -> &[EntryId] {
        &self.candidates
    }

    /// Take over the diagnostics of an initial build
    pub(crate) fn adopt(&mut self, orphans: Vec<EntryId>, candidates: Vec<EntryId>) {
        self.orphans = orphans;
        self.candidates = candidates;
    }

    /// Entry attached outside the event stream
    pub(crate) fn register(&mut self, id: EntryId) {
        if !self.candidates.contains(&id) {
            self.candidates.push(id);
        }
    }

    /// Entries detached outside the event stream
    pub(crate) fn forget(&mut self, ids: &[EntryId]) {
        self.candidates.retain(|c| !ids.contains(c));
        self.orphans.retain(|o| !ids.contains(o));
    }

    pub fn handle(
        &mut self,
        event: &RowEvent,
        tree: &mut EntryTree<T>,
        store: &mut dyn RowStore,
    ) -> Result<SyncOutcome> {
        let outcome = match event.kind {
            RowEventKind::StructureChanged => Ok(self.rebuild(tree, store)),
            _ if event.origin.is_self_inflicted() => Ok(SyncOutcome::Ignored(Skip::SelfInflicted)),
            RowEventKind::Inserted => self.on_insert(event, tree, store),
            RowEventKind::Updated => Ok(self.on_update(&event.row, tree)),
            RowEventKind::Deleted => Ok(self.on_delete(&event.row, tree)),
        }?;
        debug!("handle: {:?} ({:?}) -> {:?}", event.kind, event.origin, outcome);
        Ok(outcome)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Insert
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn on_insert(
        &mut self,
        event: &RowEvent,
        tree: &mut EntryTree<T>,
        store: &mut dyn RowStore,
    ) -> Result<SyncOutcome> {
        let mut row = event.row.clone();

        if event.origin != Origin::Load {
            let id_column = self.mapper.mapping().id_column();
            let Some(index) = locate(store, event.index, &event.row, id_column) else {
                warn!("insert: row {} of {} no longer found", event.index, store.table());
                return Ok(SyncOutcome::Ignored(Skip::RowGone));
            };
            if let Some(current) = store.row(index) {
                row = current.clone();
            }
            let column_type = store
                .column(id_column)
                .map(|c| c.column_type)
                .unwrap_or(ColumnType::Integer);
            let id = {
                let store: &dyn RowStore = store;
                self.ids.next_id(column_type, |value| {
                    EntryId::from_value(value).is_some_and(|id| tree.contains(&id))
                        || store.position(id_column, value).is_some()
                })
            };
            let patch = RowPatch::new().with(id_column, id.clone());
            store.update_row(index, &patch, self.mapper.mapping().db_sync(), Origin::Synchronizer)?;
            row.set(id_column, id);
        }

        let Some(mut entry) = self.mapper.map(&row) else {
            return Ok(SyncOutcome::Ignored(Skip::NoId));
        };
        if tree.contains(&entry.id) {
            return Ok(SyncOutcome::Ignored(Skip::AlreadyPresent));
        }

        let id = entry.id.clone();
        match entry.parent.clone() {
            None => {
                entry.expandable = true;
                entry.expanded = true;
                tree.add_root(entry)?;
                self.candidates.push(id.clone());
                Ok(SyncOutcome::Inserted { id, parent: None })
            }
            Some(parent) if tree.contains(&parent) => {
                tree.add_child(&parent, entry)?;
                self.candidates.push(id.clone());
                Ok(SyncOutcome::Inserted {
                    id,
                    parent: Some(parent),
                })
            }
            Some(parent) => {
                warn!("insert: parent {} of entry {} not found, left detached", parent, id);
                self.orphans.push(id.clone());
                Ok(SyncOutcome::Orphaned { id, parent })
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Update
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn on_update(&mut self, row: &Row, tree: &mut EntryTree<T>) -> SyncOutcome {
        let Some(incoming) = self.mapper.map(row) else {
            return SyncOutcome::Ignored(Skip::NoId);
        };
        let Some(current) = tree.get(&incoming.id) else {
            return SyncOutcome::Ignored(Skip::UnknownEntry);
        };
        if current.adjusting {
            return SyncOutcome::Ignored(Skip::Adjusting);
        }

        let mut fields = changed_fields(current, &incoming);
        if self.mapper.mapping().update_policy() == UpdatePolicy::FirstChanged {
            fields.truncate(1);
        }
        if fields.is_empty() {
            return SyncOutcome::Ignored(Skip::Unchanged);
        }

        let id = incoming.id.clone();
        for field in &fields {
            match field {
                EntryField::Name => tree.set_name(&id, incoming.name.clone()),
                EntryField::Completion => tree.set_completion(&id, incoming.completion),
                EntryField::Range => tree.set_range(&id, incoming.range.clone()),
            };
        }
        SyncOutcome::Updated { id, fields }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Delete
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn on_delete(&mut self, row: &Row, tree: &mut EntryTree<T>) -> SyncOutcome {
        let Some(id) = self.mapper.row_id(row) else {
            return SyncOutcome::Ignored(Skip::NoId);
        };
        self.orphans.retain(|o| o != &id);
        let Some(removed) = tree.remove(&id) else {
            return SyncOutcome::Ignored(Skip::UnknownEntry);
        };
        let subtree = removed.subtree_ids();
        self.candidates.retain(|c| !subtree.contains(c));
        // Descendant rows stay in the store without a reachable parent
        let detached: Vec<EntryId> = subtree.into_iter().filter(|d| d != &id).collect();
        if !detached.is_empty() {
            warn!(
                "delete: entry {} removed, {} descendants left detached",
                id,
                detached.len()
            );
            self.orphans.extend(detached);
        }
        SyncOutcome::Removed { id }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Rebuild
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Replace the tree with a fresh build from every row of `store`
    pub fn rebuild(&mut self, tree: &mut EntryTree<T>, store: &dyn RowStore) -> SyncOutcome {
        let report = TreeBuilder::new(self.mapper.clone()).build(&store.rows());
        let entries = report.tree.len();
        tree.reset(report.tree);
        self.orphans = report.orphans;
        self.candidates = report.relation_candidates;
        info!("rebuild: {} entries from {} rows", entries, store.row_count());
        SyncOutcome::Rebuilt { entries }
    }
}

/// Fields of `current` that differ from `incoming`, in priority order
fn changed_fields<T: RangeValue>(current: &Entry<T>, incoming: &Entry<T>) -> Vec<EntryField> {
    let mut fields = Vec::new();
    if current.name != incoming.name {
        fields.push(EntryField::Name);
    }
    if current.completion != incoming.completion {
        fields.push(EntryField::Completion);
    }
    if current.range != incoming.range {
        fields.push(EntryField::Range);
    }
    fields
}

/// Current position of an event's row; events may be delivered after later edits
fn locate(store: &dyn RowStore, hint: usize, row: &Row, id_column: &str) -> Option<usize> {
    if store.row(hint) == Some(row) {
        return Some(hint);
    }
    if let Some(index) = (0..store.row_count()).find(|&i| store.row(i) == Some(row)) {
        return Some(index);
    }
    // Edited since: the row still at its slot with the same id cell is the inserted one
    store
        .row(hint)
        .filter(|current| current.get(id_column) == row.get(id_column))
        .map(|_| hint)
}
