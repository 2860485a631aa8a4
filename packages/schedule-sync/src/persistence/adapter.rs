//! Tree edits → row store writes
//!
//! Every public operation is best-effort: store and database failures are
//! logged and reported through `PersistOutcome::Failed`, never raised. The
//! in-memory tree may run ahead of the store until the next successful write.

use tracing::{debug, error, warn};

use super::row_index::RowIndex;
use crate::aggregate::CompletionAggregator;
use crate::domain::{
    ColumnType, Entry, EntryId, Origin, RangeValue, Relation, RowPatch, RowStore, Value,
};
use crate::error::{ErrorKind, Result, SyncError};
use crate::mapping::{EntryMapper, RelationMapper};
use crate::tree::EntryTree;

/// Result of a persistence call
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Written { rows: usize },
    /// No row (or entry) to act on
    Missing,
    /// Entry id or relation pair already stored
    Duplicate,
    /// Store or database failure, already logged
    Failed { kind: ErrorKind, message: String },
}

impl PersistOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, PersistOutcome::Written { .. })
    }

    pub(crate) fn failed(operation: &str, err: SyncError) -> Self {
        error!("{}: {}", operation, err);
        PersistOutcome::Failed {
            kind: err.kind,
            message: err.message,
        }
    }
}

pub struct PersistenceAdapter<T> {
    mapper: EntryMapper<T>,
    relation_mapper: Option<RelationMapper>,
    aggregator: CompletionAggregator,
    entry_rows: RowIndex<EntryId>,
    relation_rows: RowIndex<(EntryId, EntryId)>,
}

impl<T: RangeValue> PersistenceAdapter<T> {
    pub fn new(mapper: EntryMapper<T>, relation_mapper: Option<RelationMapper>) -> Self {
        let aggregator = CompletionAggregator::new(mapper.mapping().aggregation());
        Self {
            mapper,
            relation_mapper,
            aggregator,
            entry_rows: RowIndex::new(),
            relation_rows: RowIndex::new(),
        }
    }

    /// Forget cached row positions (after a structural change)
    pub fn invalidate(&mut self) {
        self.entry_rows.invalidate();
        self.relation_rows.invalidate();
    }

    /// Position of the entry row holding `id`
    pub fn entry_row(&mut self, store: &dyn RowStore, id: &EntryId) -> Option<usize> {
        let mapper = &self.mapper;
        self.entry_rows.lookup(store, id, |row| mapper.row_id(row))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Entries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Write the entry `id` to its row, rolling completion up through its ancestors
    pub fn update_entry(
        &mut self,
        tree: &mut EntryTree<T>,
        id: &EntryId,
        store: &mut dyn RowStore,
    ) -> PersistOutcome {
        if !tree.contains(id) {
            debug!("update_entry: entry {} not in tree", id);
            return PersistOutcome::Missing;
        }
        match self.try_update_entry(tree, id, store) {
            Ok(Some(rows)) => PersistOutcome::Written { rows },
            Ok(None) => PersistOutcome::Missing,
            Err(err) => PersistOutcome::failed("update_entry", err),
        }
    }

    fn try_update_entry(
        &mut self,
        tree: &mut EntryTree<T>,
        id: &EntryId,
        store: &mut dyn RowStore,
    ) -> Result<Option<usize>> {
        let Some(index) = self.entry_row(store, id) else {
            warn!("update_entry: no row for entry {}", id);
            return Ok(None);
        };
        self.recompute(tree, id);
        self.write_entry(tree, id, index, store)?;
        let mut rows = 1;

        for ancestor in tree.ancestors(id) {
            if !self.recompute(tree, &ancestor) {
                break;
            }
            match self.entry_row(store, &ancestor) {
                Some(index) => {
                    self.write_entry(tree, &ancestor, index, store)?;
                    rows += 1;
                }
                None => warn!("update_entry: no row for ancestor {}", ancestor),
            }
        }

        if self.mapper.mapping().db_sync() {
            store.flush_changed()?;
        }
        debug!("update_entry: entry {} wrote {} rows", id, rows);
        Ok(Some(rows))
    }

    /// Re-aggregate `id`; true when its completion changed
    fn recompute(&self, tree: &mut EntryTree<T>, id: &EntryId) -> bool {
        let changed = tree
            .get_mut(id)
            .is_some_and(|entry| self.aggregator.recompute(entry));
        if changed {
            tree.notify(crate::tree::TreeEvent::Changed { id: id.clone() });
        }
        changed
    }

    fn write_entry(
        &self,
        tree: &EntryTree<T>,
        id: &EntryId,
        index: usize,
        store: &mut dyn RowStore,
    ) -> Result<()> {
        let Some(entry) = tree.get(id) else {
            return Ok(());
        };
        let patch = self.entry_patch(entry);
        store.update_row(index, &patch, self.mapper.mapping().db_sync(), Origin::Persistence)
    }

    /// Range always; description, root and completion when bound
    fn entry_patch(&self, entry: &Entry<T>) -> RowPatch {
        let m = self.mapper.mapping();
        let (start, end) = m.range_policy().to_values(&entry.range);
        let mut patch = RowPatch::new()
            .with(m.start_column(), start)
            .with(m.end_column(), end);
        if let Some(column) = m.description_column() {
            patch.set(column, entry.name.as_str());
        }
        if let Some(column) = m.root_column() {
            patch.set(column, m.parent_value(entry.parent.as_ref()));
        }
        if let Some(column) = m.completion_column() {
            patch.set(column, entry.completion);
        }
        patch
    }

    /// Persist a new entry; its id is replaced by the stored row's id.
    ///
    /// Generated ids avoid every id held by `tree` or `store`. Once the row
    /// is in the store the entry counts as written; a failed database flush
    /// is logged and its changes stay queued.
    pub fn add_entry(
        &mut self,
        entry: &mut Entry<T>,
        tree: &EntryTree<T>,
        store: &mut dyn RowStore,
    ) -> PersistOutcome {
        if self.entry_row(store, &entry.id).is_some() {
            warn!("add_entry: entry {} already stored", entry.id);
            return PersistOutcome::Duplicate;
        }
        match self.try_add_entry(entry, tree, store) {
            Ok(()) => PersistOutcome::Written { rows: 1 },
            Err(err) => PersistOutcome::failed("add_entry", err),
        }
    }

    fn try_add_entry(
        &mut self,
        entry: &mut Entry<T>,
        tree: &EntryTree<T>,
        store: &mut dyn RowStore,
    ) -> Result<()> {
        let m = self.mapper.mapping();
        let id_column = m.id_column();

        let mut row = store.new_row();
        let in_tree = |v: &Value| EntryId::from_value(v).is_some_and(|id| tree.contains(&id));
        if let Some(id) = next_id(store, id_column, in_tree)? {
            row.set(id_column, id);
        }
        row.apply(&self.entry_patch(entry));

        let index = store.insert_row(row, m.db_sync(), Origin::Persistence)?;
        let stored = store
            .row(index)
            .and_then(|r| self.mapper.row_id(r))
            .ok_or_else(|| SyncError::row_not_found(store.table(), index))?;
        if stored != entry.id {
            debug!("add_entry: entry {} stored as {}", entry.id, stored);
            entry.id = stored;
        }
        for child in entry.children.iter_mut() {
            child.parent = Some(entry.id.clone());
        }
        self.entry_rows.record(entry.id.clone(), index);

        if m.db_sync() {
            flush_stored(store, "add_entry");
        }
        Ok(())
    }

    /// Delete the rows of `id`, its descendants and every relation touching them
    pub fn remove_entry(
        &mut self,
        tree: &EntryTree<T>,
        id: &EntryId,
        store: &mut dyn RowStore,
        relation_store: Option<&mut dyn RowStore>,
    ) -> PersistOutcome {
        let Some(entry) = tree.get(id) else {
            return PersistOutcome::Missing;
        };
        let ids = entry.subtree_ids();
        match self.try_remove_entry(&ids, store, relation_store) {
            Ok(rows) => PersistOutcome::Written { rows },
            Err(err) => PersistOutcome::failed("remove_entry", err),
        }
    }

    fn try_remove_entry(
        &mut self,
        ids: &[EntryId],
        store: &mut dyn RowStore,
        relation_store: Option<&mut dyn RowStore>,
    ) -> Result<usize> {
        let mut positions: Vec<usize> = ids
            .iter()
            .filter_map(|id| self.entry_row(store, id))
            .collect();
        let sync = self.mapper.mapping().db_sync();
        let removed = delete_positions(store, &mut positions, sync)?;
        self.entry_rows.invalidate();
        if sync {
            store.flush_changed()?;
        }

        let mut relation_rows = 0;
        if let (Some(mapper), Some(relations)) = (&self.relation_mapper, relation_store) {
            let mut positions: Vec<usize> = (0..relations.row_count())
                .filter(|&i| {
                    relations
                        .row(i)
                        .and_then(|r| mapper.key(r))
                        .is_some_and(|(pred, succ)| ids.contains(&pred) || ids.contains(&succ))
                })
                .collect();
            let sync = mapper.mapping().db_sync;
            relation_rows = delete_positions(relations, &mut positions, sync)?;
            self.relation_rows.invalidate();
            if sync {
                relations.flush_changed()?;
            }
        }
        debug!(
            "remove_entry: {} entry rows, {} relation rows deleted",
            removed, relation_rows
        );
        Ok(removed + relation_rows)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Relations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Position of the relation row for (predecessor, successor)
    pub fn relation_row(
        &mut self,
        store: &dyn RowStore,
        key: &(EntryId, EntryId),
    ) -> Option<usize> {
        let mapper = self.relation_mapper.as_ref()?;
        self.relation_rows.lookup(store, key, |row| mapper.key(row))
    }

    pub fn add_relation(&mut self, relation: &Relation, store: &mut dyn RowStore) -> PersistOutcome {
        let key = relation.key();
        if self.relation_row(store, &key).is_some() {
            warn!(
                "add_relation: {} -> {} already stored",
                relation.predecessor, relation.successor
            );
            return PersistOutcome::Duplicate;
        }
        match self.try_add_relation(relation, key, store) {
            Ok(()) => PersistOutcome::Written { rows: 1 },
            Err(err) => PersistOutcome::failed("add_relation", err),
        }
    }

    fn try_add_relation(
        &mut self,
        relation: &Relation,
        key: (EntryId, EntryId),
        store: &mut dyn RowStore,
    ) -> Result<()> {
        let mapper = self.relation_mapper.as_ref().ok_or_else(no_relation_mapping)?;
        let sync = mapper.mapping().db_sync;

        let mut row = store.new_row();
        if let Some(id) = next_id(store, &mapper.mapping().id, |_| false)? {
            row.set(&mapper.mapping().id, id);
        }
        mapper.fill(&mut row, relation);
        let index = store.insert_row(row, sync, Origin::Persistence)?;
        self.relation_rows.record(key, index);

        if sync {
            flush_stored(store, "add_relation");
        }
        Ok(())
    }

    pub fn remove_relation(
        &mut self,
        relation: &Relation,
        store: &mut dyn RowStore,
    ) -> PersistOutcome {
        if self.relation_mapper.is_none() {
            return PersistOutcome::failed("remove_relation", no_relation_mapping());
        }
        let Some(index) = self.relation_row(store, &relation.key()) else {
            debug!(
                "remove_relation: no row for {} -> {}",
                relation.predecessor, relation.successor
            );
            return PersistOutcome::Missing;
        };
        let sync = self
            .relation_mapper
            .as_ref()
            .is_some_and(|m| m.mapping().db_sync);
        let result = store
            .delete_row(index, sync, Origin::Persistence)
            .and_then(|_| if sync { store.flush_changed().map(|_| ()) } else { Ok(()) });
        self.relation_rows.invalidate();
        match result {
            Ok(()) => PersistOutcome::Written { rows: 1 },
            Err(err) => PersistOutcome::failed("remove_relation", err),
        }
    }
}

/// Next free "max + 1" id for `column`, or `None` when the store generates it.
///
/// The maximum is numeric, so text ids "9" and "10" compare as numbers.
/// Candidates held by the store or reported by `is_taken` are skipped.
fn next_id(
    store: &dyn RowStore,
    column: &str,
    is_taken: impl Fn(&Value) -> bool,
) -> Result<Option<Value>> {
    let info = store.require_column(column)?;
    if info.auto_generated {
        return Ok(None);
    }
    let column_type = info.column_type;
    let mut next = (0..store.row_count())
        .filter_map(|i| store.row(i))
        .filter_map(|r| r.get(column).as_i64())
        .max()
        .unwrap_or(0);
    loop {
        next = next
            .checked_add(1)
            .ok_or_else(|| SyncError::config(format!("id space of column {} exhausted", column)))?;
        let candidate = match column_type {
            ColumnType::Text => Value::Text(next.to_string()),
            ColumnType::Real => Value::Real(next as f64),
            _ => Value::Int(next),
        };
        if store.position(column, &candidate).is_none() && !is_taken(&candidate) {
            return Ok(Some(candidate));
        }
    }
}

/// Flush after a row already landed in the store; failures stay queued
fn flush_stored(store: &mut dyn RowStore, operation: &str) {
    if let Err(err) = store.flush_changed() {
        error!(
            "{}: row kept in {}, database flush failed: {}",
            operation,
            store.table(),
            err
        );
    }
}

/// Delete rows at `positions`, last first so earlier positions stay valid
fn delete_positions(store: &mut dyn RowStore, positions: &mut [usize], sync: bool) -> Result<usize> {
    positions.sort_unstable_by(|a, b| b.cmp(a));
    for &index in positions.iter() {
        store.delete_row(index, sync, Origin::Persistence)?;
    }
    Ok(positions.len())
}

fn no_relation_mapping() -> SyncError {
    SyncError::config("No relation table mapping configured")
}
