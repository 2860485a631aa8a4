//! Tree Builder - one-shot construction of the entry tree from flat rows
//!
//! # Algorithm
//! 1. Sort rows ascending by id (deterministic output)
//! 2. Project rows through the `EntryMapper`, dropping empty ids and duplicates
//! 3. Group entries by declared parent (O(N))
//! 4. Attach children recursively, starting from top-level rows
//!
//! Rows never reached from a top-level row (unknown parent, or a parent
//! cycle) are reported as orphans.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::EntryTree;
use crate::domain::{Entry, EntryId, RangeValue, Row};
use crate::mapping::EntryMapper;

/// Result of a tree build
#[derive(Debug)]
pub struct BuildReport<T> {
    pub tree: EntryTree<T>,
    /// Ids of rows whose parent chain never reaches a top-level row
    pub orphans: Vec<EntryId>,
    /// Ids seen on more than one row (later rows are dropped)
    pub duplicates: Vec<EntryId>,
    /// Every attached entry, pre-order
    pub relation_candidates: Vec<EntryId>,
    /// Rows without an id
    pub skipped_rows: usize,
}

pub struct TreeBuilder<T> {
    mapper: EntryMapper<T>,
}

impl<T: RangeValue> TreeBuilder<T> {
    pub fn new(mapper: EntryMapper<T>) -> Self {
        Self { mapper }
    }

    /// Build the tree from all rows of the entry table
    pub fn build(&self, rows: &[Row]) -> BuildReport<T> {
        if rows.is_empty() {
            debug!("build: no rows provided");
        }
        info!("build: building tree from {} rows", rows.len());

        let id_column = self.mapper.mapping().id_column();
        let mut sorted: Vec<&Row> = rows.iter().collect();
        sorted.sort_by(|a, b| a.get(id_column).sort_cmp(b.get(id_column)));

        // Step 1: project
        let mut slots: Vec<Option<Entry<T>>> = Vec::with_capacity(sorted.len());
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let mut skipped_rows = 0;
        for row in sorted {
            let Some(entry) = self.mapper.map(row) else {
                skipped_rows += 1;
                continue;
            };
            if !seen.insert(entry.id.clone()) {
                warn!("build: duplicate id {} dropped", entry.id);
                duplicates.push(entry.id);
                continue;
            }
            slots.push(Some(entry));
        }

        // Step 2: group by parent
        let mut top_level = Vec::new();
        let mut children_of: HashMap<EntryId, Vec<usize>> = HashMap::new();
        for (i, slot) in slots.iter().enumerate() {
            let Some(entry) = slot else { continue };
            match &entry.parent {
                None => top_level.push(i),
                Some(parent) => children_of.entry(parent.clone()).or_default().push(i),
            }
        }

        // Step 3: attach
        let mut roots = Vec::with_capacity(top_level.len());
        for i in top_level {
            if let Some(mut root) = Self::assemble(i, &mut slots, &children_of) {
                root.expandable = true;
                root.expanded = true;
                roots.push(root);
            }
        }

        let orphans: Vec<EntryId> = slots
            .into_iter()
            .flatten()
            .map(|entry| entry.id)
            .collect();
        for id in &orphans {
            warn!("build: entry {} has no reachable parent, left detached", id);
        }

        let mut relation_candidates = Vec::new();
        for root in &roots {
            root.walk(&mut |e| relation_candidates.push(e.id.clone()));
        }

        let tree = EntryTree::indexed(roots);
        info!(
            "build: completed tree with {} entries ({} roots, {} orphans, {} duplicates)",
            tree.len(),
            tree.roots().len(),
            orphans.len(),
            duplicates.len()
        );

        BuildReport {
            tree,
            orphans,
            duplicates,
            relation_candidates,
            skipped_rows,
        }
    }

    fn assemble(
        index: usize,
        slots: &mut [Option<Entry<T>>],
        children_of: &HashMap<EntryId, Vec<usize>>,
    ) -> Option<Entry<T>> {
        let mut entry = slots.get_mut(index)?.take()?;
        if let Some(children) = children_of.get(&entry.id) {
            for &child in children {
                if let Some(child) = Self::assemble(child, slots, children_of) {
                    entry.add_child(child);
                }
            }
        }
        Some(entry)
    }
}
