//! Sync session
//!
//! Owns the tree, the row stores and the components acting on them. Every
//! operation runs to completion, then `pump` delivers the queued row events,
//! so only one component holds a store at a time.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{FieldMapping, RelationFieldMapping};
use crate::domain::{Entry, EntryId, RangeValue, Relation, RowEventKind, RowStore};
use crate::error::{Result, SyncError};
use crate::mapping::{EntryMapper, RelationMapper};
use crate::persistence::{PersistOutcome, PersistenceAdapter};
use crate::relations::RelationModel;
use crate::sync::{ChangeSynchronizer, SyncOutcome};
use crate::tree::{EntryTree, TreeBuilder};

/// Relation table wiring
struct RelationTable {
    mapper: RelationMapper,
    store: Box<dyn RowStore>,
}

pub struct SyncSession<T> {
    mapping: Arc<FieldMapping<T>>,
    entries: Box<dyn RowStore>,
    relation_table: Option<RelationTable>,
    tree: EntryTree<T>,
    relations: RelationModel,
    synchronizer: ChangeSynchronizer<T>,
    persistence: PersistenceAdapter<T>,
    duplicates: Vec<EntryId>,
}

impl<T: RangeValue> SyncSession<T> {
    /// Validate `mapping` against `entries` and build the initial tree
    pub fn open(mapping: FieldMapping<T>, entries: impl RowStore + 'static) -> Result<Self> {
        let mut entries: Box<dyn RowStore> = Box::new(entries);
        mapping.validate_against(entries.as_ref())?;
        entries.drain_events();

        let mapping = Arc::new(mapping);
        let mapper = EntryMapper::new(mapping.clone());
        let report = TreeBuilder::new(mapper.clone()).build(&entries.rows());
        let mut synchronizer = ChangeSynchronizer::new(mapper.clone());
        synchronizer.adopt(report.orphans, report.relation_candidates);
        info!(
            "open: {} entries from table {} ({} orphans)",
            report.tree.len(),
            entries.table(),
            synchronizer.orphans().len()
        );

        Ok(Self {
            mapping,
            entries,
            relation_table: None,
            tree: report.tree,
            relations: RelationModel::new(),
            synchronizer,
            persistence: PersistenceAdapter::new(mapper, None),
            duplicates: report.duplicates,
        })
    }

    /// Attach the relation table and load its relations
    pub fn with_relations(
        mut self,
        mapping: RelationFieldMapping,
        store: impl RowStore + 'static,
    ) -> Result<Self> {
        mapping.validate()?;
        mapping.validate_against(&store)?;
        let mut store: Box<dyn RowStore> = Box::new(store);
        store.drain_events();

        let mapper = RelationMapper::new(mapping);
        self.relations
            .reset(RelationModel::load(store.as_ref(), &mapper).relations().to_vec());
        self.persistence = PersistenceAdapter::new(
            EntryMapper::new(self.mapping.clone()),
            Some(mapper.clone()),
        );
        self.relation_table = Some(RelationTable { mapper, store });
        Ok(self)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Accessors
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn mapping(&self) -> &FieldMapping<T> {
        &self.mapping
    }

    pub fn tree(&self) -> &EntryTree<T> {
        &self.tree
    }

    /// Field edits and subscriptions; persist edits with `update_entry`
    pub fn tree_mut(&mut self) -> &mut EntryTree<T> {
        &mut self.tree
    }

    pub fn relations(&self) -> &RelationModel {
        &self.relations
    }

    pub fn relations_mut(&mut self) -> &mut RelationModel {
        &mut self.relations
    }

    pub fn entry_count(&self) -> usize {
        self.tree.len()
    }

    /// Entry at pre-order position `index`
    pub fn entry_at(&self, index: usize) -> Option<&Entry<T>> {
        self.tree.entry_at(index)
    }

    pub fn entry(&self, id: &EntryId) -> Option<&Entry<T>> {
        self.tree.get(id)
    }

    /// Rows left out of the tree (unresolved parent or parent cycle)
    pub fn orphans(&self) -> &[EntryId] {
        self.synchronizer.orphans()
    }

    /// Entries a relation may reference, in registration order
    pub fn relation_candidates(&self) -> &[EntryId] {
        self.synchronizer.relation_candidates()
    }

    /// Ids dropped by the opening build because an earlier row held them
    pub fn duplicates(&self) -> &[EntryId] {
        &self.duplicates
    }

    pub fn entry_store(&self) -> &dyn RowStore {
        self.entries.as_ref()
    }

    /// Direct store access; call `pump` afterwards to apply the edits
    pub fn entry_store_mut(&mut self) -> &mut dyn RowStore {
        self.entries.as_mut()
    }

    pub fn relation_store(&self) -> Option<&dyn RowStore> {
        self.relation_table.as_ref().map(|t| t.store.as_ref())
    }

    pub fn relation_store_mut(&mut self) -> Option<&mut dyn RowStore> {
        match self.relation_table.as_mut() {
            Some(table) => Some(table.store.as_mut() as &mut dyn RowStore),
            None => None,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Event delivery
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Deliver queued row events until both stores are quiet
    pub fn pump(&mut self) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let events = self.entries.drain_events();
            if events.is_empty() {
                break;
            }
            for event in &events {
                match self
                    .synchronizer
                    .handle(event, &mut self.tree, self.entries.as_mut())
                {
                    Ok(outcome) => {
                        if matches!(outcome, SyncOutcome::Rebuilt { .. }) {
                            self.persistence.invalidate();
                            self.duplicates.clear();
                        }
                        outcomes.push(outcome);
                    }
                    Err(err) => error!("pump: {:?} event dropped: {}", event.kind, err),
                }
            }
        }
        self.pump_relations();
        outcomes
    }

    fn pump_relations(&mut self) {
        let Some(table) = self.relation_table.as_mut() else {
            return;
        };
        let mut reload = false;
        for event in table.store.drain_events() {
            if event.origin.is_self_inflicted() {
                continue;
            }
            match event.kind {
                RowEventKind::Inserted => {
                    if let Some(relation) = table.mapper.map(&event.row) {
                        self.relations.add(relation);
                    }
                }
                RowEventKind::Deleted => {
                    if let Some((pred, succ)) = table.mapper.key(&event.row) {
                        self.relations.remove(&pred, &succ);
                    }
                }
                RowEventKind::Updated | RowEventKind::StructureChanged => reload = true,
            }
        }
        if reload {
            let loaded = RelationModel::load(table.store.as_ref(), &table.mapper);
            self.relations.reset(loaded.relations().to_vec());
            self.persistence.invalidate();
        }
    }

    /// Rebuild the tree from the entry store
    pub fn rebuild(&mut self) {
        self.synchronizer.rebuild(&mut self.tree, self.entries.as_ref());
        self.persistence.invalidate();
        self.duplicates.clear();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Entry edits
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Persist the current state of entry `id` (and re-aggregated ancestors)
    pub fn update_entry(&mut self, id: &EntryId) -> PersistOutcome {
        let outcome = self
            .persistence
            .update_entry(&mut self.tree, id, self.entries.as_mut());
        self.pump();
        outcome
    }

    /// Persist `entry` and attach it to the tree.
    ///
    /// The stored id is copied back into `entry`.
    pub fn add_entry(&mut self, entry: &mut Entry<T>) -> PersistOutcome {
        if entry.parent.is_some() && entry.parent.as_ref() == self.mapping.synthetic_root() {
            entry.parent = None;
        }
        if let Some(parent) = &entry.parent {
            if !self.tree.contains(parent) {
                warn!("add_entry: parent {} not in tree", parent);
                return PersistOutcome::Missing;
            }
        }

        let mut outcome = self
            .persistence
            .add_entry(entry, &self.tree, self.entries.as_mut());
        if outcome.is_written() {
            if entry.parent.is_none() {
                entry.expandable = true;
                entry.expanded = true;
            }
            match self.tree.attach(entry.clone()) {
                Ok(()) => self.synchronizer.register(entry.id.clone()),
                Err(err) => outcome = PersistOutcome::failed("add_entry", err),
            }
        }
        self.pump();
        outcome
    }

    /// `add_entry` under `parent`
    pub fn add_child(&mut self, parent: &EntryId, entry: &mut Entry<T>) -> PersistOutcome {
        entry.parent = Some(parent.clone());
        self.add_entry(entry)
    }

    /// Delete entry `id` with its subtree and every relation touching them
    pub fn remove_entry(&mut self, id: &EntryId) -> PersistOutcome {
        let relation_store = match self.relation_table.as_mut() {
            Some(table) => Some(table.store.as_mut() as &mut dyn RowStore),
            None => None,
        };
        let outcome =
            self.persistence
                .remove_entry(&self.tree, id, self.entries.as_mut(), relation_store);
        if outcome != PersistOutcome::Missing {
            if let Some(removed) = self.tree.remove(id) {
                let ids = removed.subtree_ids();
                self.synchronizer.forget(&ids);
                self.relations.remove_touching(&ids);
            }
        }
        self.pump();
        outcome
    }

    /// Mark `id` as being edited interactively; external updates are ignored meanwhile
    pub fn begin_adjusting(&mut self, id: &EntryId) -> bool {
        self.tree.set_adjusting(id, true)
    }

    /// Clear the adjusting flag and persist the entry
    pub fn end_adjusting(&mut self, id: &EntryId) -> PersistOutcome {
        if !self.tree.set_adjusting(id, false) {
            return PersistOutcome::Missing;
        }
        self.update_entry(id)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Relation edits
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn add_relation(&mut self, relation: Relation) -> PersistOutcome {
        if !self.tree.contains(&relation.predecessor) || !self.tree.contains(&relation.successor) {
            warn!(
                "add_relation: {} -> {} references an unknown entry",
                relation.predecessor, relation.successor
            );
            return PersistOutcome::Missing;
        }
        let Some(table) = self.relation_table.as_mut() else {
            return PersistOutcome::failed("add_relation", no_relation_table());
        };
        let outcome = self.persistence.add_relation(&relation, table.store.as_mut());
        if outcome.is_written() {
            self.relations.add(relation);
        }
        self.pump();
        outcome
    }

    pub fn remove_relation(&mut self, predecessor: &EntryId, successor: &EntryId) -> PersistOutcome {
        let Some(relation) = self.relations.get(predecessor, successor).cloned() else {
            return PersistOutcome::Missing;
        };
        let Some(table) = self.relation_table.as_mut() else {
            return PersistOutcome::failed("remove_relation", no_relation_table());
        };
        let outcome = self.persistence.remove_relation(&relation, table.store.as_mut());
        if outcome.is_written() {
            self.relations.remove(predecessor, successor);
        }
        self.pump();
        outcome
    }
}

fn no_relation_table() -> SyncError {
    SyncError::config("No relation table attached")
}
