//! View-side relation list with change notification

use std::fmt;
use tracing::debug;

use crate::domain::{EntryId, Relation, RowStore};
use crate::mapping::RelationMapper;

#[derive(Debug, Clone, PartialEq)]
pub enum RelationEvent {
    Added(Relation),
    Removed(Relation),
    /// Whole list replaced
    Reset,
}

type Listener = Box<dyn FnMut(&RelationEvent)>;

/// Relations keyed by (predecessor, successor); at most one per pair
#[derive(Default)]
pub struct RelationModel {
    relations: Vec<Relation>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for RelationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationModel")
            .field("relations", &self.relations)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl RelationModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relations read from every row of the relation table
    pub fn load(store: &dyn RowStore, mapper: &RelationMapper) -> Self {
        let mut model = Self::new();
        for row in store.rows() {
            if let Some(relation) = mapper.map(&row) {
                if !model.contains(&relation.predecessor, &relation.successor) {
                    model.relations.push(relation);
                }
            }
        }
        debug!("load: {} relations from {}", model.len(), store.table());
        model
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn get(&self, predecessor: &EntryId, successor: &EntryId) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| &r.predecessor == predecessor && &r.successor == successor)
    }

    pub fn contains(&self, predecessor: &EntryId, successor: &EntryId) -> bool {
        self.get(predecessor, successor).is_some()
    }

    /// Relations with `id` at either end
    pub fn for_entry(&self, id: &EntryId) -> Vec<&Relation> {
        self.relations.iter().filter(|r| r.touches(id)).collect()
    }

    /// False when the pair is already related
    pub fn add(&mut self, relation: Relation) -> bool {
        if self.contains(&relation.predecessor, &relation.successor) {
            return false;
        }
        self.relations.push(relation.clone());
        self.notify(RelationEvent::Added(relation));
        true
    }

    pub fn remove(&mut self, predecessor: &EntryId, successor: &EntryId) -> Option<Relation> {
        let pos = self
            .relations
            .iter()
            .position(|r| &r.predecessor == predecessor && &r.successor == successor)?;
        let removed = self.relations.remove(pos);
        self.notify(RelationEvent::Removed(removed.clone()));
        Some(removed)
    }

    /// Drop every relation touching one of `ids`
    pub fn remove_touching(&mut self, ids: &[EntryId]) -> Vec<Relation> {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.relations)
            .into_iter()
            .partition(|r| ids.iter().any(|id| r.touches(id)));
        self.relations = kept;
        for relation in &gone {
            self.notify(RelationEvent::Removed(relation.clone()));
        }
        gone
    }

    pub fn reset(&mut self, relations: Vec<Relation>) {
        self.relations = relations;
        self.notify(RelationEvent::Reset);
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&RelationEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: RelationEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}
