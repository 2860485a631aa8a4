//! Entry tree
//!
//! Roots own their children exclusively; parent links are ids. An
//! id → parent index gives O(depth) lookups and enforces id uniqueness.

pub mod builder;

pub use builder::{BuildReport, TreeBuilder};

use std::collections::HashMap;
use std::fmt;

use crate::domain::{Entry, EntryId, Range, RangeValue};
use crate::error::{Result, SyncError};

/// Change notification delivered to tree listeners
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    Added {
        id: EntryId,
        parent: Option<EntryId>,
    },
    Removed {
        id: EntryId,
        parent: Option<EntryId>,
    },
    Changed {
        id: EntryId,
    },
    /// Whole tree replaced (rebuild)
    Reset,
}

type Listener = Box<dyn FnMut(&TreeEvent)>;

pub struct EntryTree<T> {
    roots: Vec<Entry<T>>,
    parents: HashMap<EntryId, Option<EntryId>>,
    listeners: Vec<Listener>,
}

impl<T> Default for EntryTree<T> {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            parents: HashMap::new(),
            listeners: Vec::new(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for EntryTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryTree")
            .field("roots", &self.roots)
            .field("len", &self.parents.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T: RangeValue> EntryTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree over `roots`; fails on duplicate ids
    pub fn from_roots(roots: Vec<Entry<T>>) -> Result<Self> {
        let mut tree = Self::new();
        for root in roots {
            tree.add_root(root)?;
        }
        Ok(tree)
    }

    /// Index roots whose ids are already known to be unique
    pub(crate) fn indexed(roots: Vec<Entry<T>>) -> Self {
        let mut tree = Self::new();
        for root in &roots {
            tree.index_subtree_under(root, None);
        }
        tree.roots = roots;
        tree
    }

    pub fn roots(&self) -> &[Entry<T>] {
        &self.roots
    }

    /// Number of entries at any depth
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.parents.contains_key(id)
    }

    /// Parent of `id`; `None` for roots and unknown ids
    pub fn parent_id(&self, id: &EntryId) -> Option<&EntryId> {
        self.parents.get(id).and_then(|p| p.as_ref())
    }

    /// Ids from the root down to `id`
    pub fn path(&self, id: &EntryId) -> Option<Vec<EntryId>> {
        let mut chain = vec![id.clone()];
        let mut current = self.parents.get(id)?;
        while let Some(parent) = current {
            if chain.len() > self.parents.len() {
                return None;
            }
            chain.push(parent.clone());
            current = self.parents.get(parent)?;
        }
        chain.reverse();
        Some(chain)
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: &EntryId) -> Vec<EntryId> {
        let mut path = self.path(id).unwrap_or_default();
        path.pop();
        path.reverse();
        path
    }

    pub fn get(&self, id: &EntryId) -> Option<&Entry<T>> {
        let path = self.path(id)?;
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.iter().find(|e| &e.id == first)?;
        for step in rest {
            current = current.child(step)?;
        }
        Some(current)
    }

    /// Mutable access for field edits; ids, parent links and children must not be touched
    pub(crate) fn get_mut(&mut self, id: &EntryId) -> Option<&mut Entry<T>> {
        let path = self.path(id)?;
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.iter_mut().find(|e| &e.id == first)?;
        for step in rest {
            current = current.child_mut(step)?;
        }
        Some(current)
    }

    /// Pre-order walk over all entries
    pub fn iter(&self) -> Vec<&Entry<T>> {
        let mut out = Vec::with_capacity(self.len());
        for root in &self.roots {
            root.walk(&mut |e| out.push(e));
        }
        out
    }

    /// Entry at pre-order position `index`
    pub fn entry_at(&self, index: usize) -> Option<&Entry<T>> {
        self.iter().into_iter().nth(index)
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.iter().into_iter().map(|e| e.id.clone()).collect()
    }

    /// Height of the tallest root
    pub fn depth(&self) -> usize {
        self.roots.iter().map(|r| r.depth()).max().unwrap_or(0)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Structure
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Append a top-level entry (with any subtree it carries)
    pub fn add_root(&mut self, mut entry: Entry<T>) -> Result<()> {
        entry.parent = None;
        self.check_new_ids(&entry)?;
        self.index_subtree(&entry);
        let id = entry.id.clone();
        self.roots.push(entry);
        self.notify(TreeEvent::Added { id, parent: None });
        Ok(())
    }

    /// Append `entry` to the children of `parent`
    pub fn add_child(&mut self, parent: &EntryId, entry: Entry<T>) -> Result<()> {
        if !self.contains(parent) {
            return Err(SyncError::unknown_parent(parent));
        }
        self.check_new_ids(&entry)?;
        self.index_subtree_under(&entry, Some(parent.clone()));
        let id = entry.id.clone();
        if let Some(node) = self.get_mut(parent) {
            node.add_child(entry);
        }
        self.notify(TreeEvent::Added {
            id,
            parent: Some(parent.clone()),
        });
        Ok(())
    }

    /// Attach `entry` under its declared parent, or as a root
    pub fn attach(&mut self, entry: Entry<T>) -> Result<()> {
        match entry.parent.clone() {
            Some(parent) => self.add_child(&parent, entry),
            None => self.add_root(entry),
        }
    }

    /// Detach `id` with its subtree
    pub fn remove(&mut self, id: &EntryId) -> Option<Entry<T>> {
        let parent = self.parents.get(id)?.clone();
        let removed = match &parent {
            None => {
                let pos = self.roots.iter().position(|e| &e.id == id)?;
                self.roots.remove(pos)
            }
            Some(parent_id) => {
                let node = self.get_mut(parent_id)?;
                let pos = node.children.iter().position(|e| &e.id == id)?;
                let removed = node.children.remove(pos);
                if node.children.is_empty() && node.parent.is_some() {
                    node.expandable = false;
                }
                removed
            }
        };
        for gone in removed.subtree_ids() {
            self.parents.remove(&gone);
        }
        self.notify(TreeEvent::Removed {
            id: id.clone(),
            parent,
        });
        Some(removed)
    }

    /// Swap in a rebuilt set of roots, keeping listeners
    pub fn reset(&mut self, other: EntryTree<T>) {
        self.roots = other.roots;
        self.parents = other.parents;
        self.notify(TreeEvent::Reset);
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Field mutators
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn set_name(&mut self, id: &EntryId, name: impl Into<String>) -> bool {
        self.edit(id, |e| e.name = name.into())
    }

    pub fn set_range(&mut self, id: &EntryId, range: Range<T>) -> bool {
        self.edit(id, |e| e.range = range)
    }

    pub fn set_completion(&mut self, id: &EntryId, completion: f64) -> bool {
        self.edit(id, |e| e.completion = completion)
    }

    pub fn set_adjusting(&mut self, id: &EntryId, adjusting: bool) -> bool {
        match self.get_mut(id) {
            Some(e) => {
                e.adjusting = adjusting;
                true
            }
            None => false,
        }
    }

    pub fn set_expanded(&mut self, id: &EntryId, expanded: bool) -> bool {
        self.edit(id, |e| e.expanded = expanded)
    }

    fn edit(&mut self, id: &EntryId, f: impl FnOnce(&mut Entry<T>)) -> bool {
        match self.get_mut(id) {
            Some(entry) => f(entry),
            None => return false,
        }
        self.notify(TreeEvent::Changed { id: id.clone() });
        true
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Observation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn subscribe(&mut self, listener: impl FnMut(&TreeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn notify(&mut self, event: TreeEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Index maintenance
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn check_new_ids(&self, entry: &Entry<T>) -> Result<()> {
        let ids = entry.subtree_ids();
        for (i, id) in ids.iter().enumerate() {
            if self.contains(id) || ids[..i].contains(id) {
                return Err(SyncError::duplicate_id(id));
            }
        }
        Ok(())
    }

    fn index_subtree(&mut self, entry: &Entry<T>) {
        self.index_subtree_under(entry, entry.parent.clone());
    }

    fn index_subtree_under(&mut self, entry: &Entry<T>, parent: Option<EntryId>) {
        self.parents.insert(entry.id.clone(), parent);
        for child in &entry.children {
            self.index_subtree_under(child, Some(entry.id.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn leaf(id: i64) -> Entry<f64> {
        Entry::new(id, Range::new(0.0, 1.0))
    }

    fn sample() -> EntryTree<f64> {
        let mut tree = EntryTree::new();
        tree.add_root(leaf(1)).unwrap();
        tree.add_child(&1.into(), leaf(2)).unwrap();
        tree.add_child(&2.into(), leaf(3)).unwrap();
        tree.add_root(leaf(4)).unwrap();
        tree
    }

    #[test]
    fn test_lookup_and_path() {
        let tree = sample();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.path(&3.into()), Some(vec![1.into(), 2.into(), 3.into()]));
        assert_eq!(tree.ancestors(&3.into()), vec![2.into(), 1.into()]);
        assert_eq!(tree.get(&3.into()).unwrap().parent, Some(EntryId::Int(2)));
        assert_eq!(tree.parent_id(&1.into()), None);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_entry_at_is_preorder() {
        let tree = sample();
        let ids: Vec<_> = (0..4).map(|i| tree.entry_at(i).unwrap().id.clone()).collect();
        assert_eq!(ids, vec![1.into(), 2.into(), 3.into(), 4.into()]);
        assert!(tree.entry_at(4).is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut tree = sample();
        let err = tree.add_root(leaf(3)).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::DuplicateId);

        let mut carrier = leaf(10);
        carrier.add_child(leaf(2));
        assert!(tree.add_root(carrier).is_err());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut tree = sample();
        let err = tree.add_child(&99.into(), leaf(5)).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::UnknownParent);
    }

    #[test]
    fn test_remove_subtree_unindexes() {
        let mut tree = sample();

        let removed = tree.remove(&2.into()).unwrap();

        assert_eq!(removed.subtree_ids(), vec![2.into(), 3.into()]);
        assert!(!tree.contains(&3.into()));
        assert_eq!(tree.len(), 2);
        assert!(tree.get(&1.into()).unwrap().children.is_empty());
        assert!(tree.remove(&2.into()).is_none());
    }

    #[test]
    fn test_attach_uses_declared_parent() {
        let mut tree = sample();
        tree.attach(leaf(5).with_parent(4)).unwrap();
        tree.attach(leaf(6)).unwrap();

        assert_eq!(tree.parent_id(&5.into()), Some(&EntryId::Int(4)));
        assert_eq!(tree.roots().len(), 3);
    }

    #[test]
    fn test_listeners_receive_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut tree = sample();
        tree.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        tree.set_completion(&3.into(), 50.0);
        tree.remove(&4.into());
        tree.set_name(&99.into(), "nobody");

        assert_eq!(
            *seen.borrow(),
            vec![
                TreeEvent::Changed { id: 3.into() },
                TreeEvent::Removed {
                    id: 4.into(),
                    parent: None
                },
            ]
        );
        assert_eq!(tree.get(&3.into()).unwrap().completion, 50.0);
    }

    #[test]
    fn test_reset_keeps_listeners() {
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let mut tree = sample();
        tree.subscribe(move |_| *sink.borrow_mut() += 1);

        tree.reset(EntryTree::from_roots(vec![leaf(7)]).unwrap());
        tree.set_expanded(&7.into(), true);

        assert_eq!(*count.borrow(), 2);
        assert_eq!(tree.ids(), vec![EntryId::Int(7)]);
    }
}
