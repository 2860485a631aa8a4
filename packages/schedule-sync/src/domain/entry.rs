//! Schedule entries

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

use super::value::Value;

/// Name given to entries whose description cell is empty
pub const DEFAULT_ENTRY_NAME: &str = "New Entry";

/// Opaque entry identifier (integer or string id column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Int(i64),
    Text(String),
}

impl EntryId {
    /// Id carried by a cell; `None` for empty cells.
    ///
    /// Values that are neither integral nor text are keyed by their rendering.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Text(s) => Some(EntryId::Text(s.clone())),
            other => match other.as_i64() {
                Some(v) => Some(EntryId::Int(v)),
                None => Some(EntryId::Text(other.to_string())),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntryId::Int(v) => Value::Int(*v),
            EntryId::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Int(v) => write!(f, "{}", v),
            EntryId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for EntryId {
    fn from(v: i64) -> Self {
        EntryId::Int(v)
    }
}

impl From<i32> for EntryId {
    fn from(v: i32) -> Self {
        EntryId::Int(v as i64)
    }
}

impl From<&str> for EntryId {
    fn from(v: &str) -> Self {
        EntryId::Text(v.to_string())
    }
}

/// Ordered endpoint type of an entry range
pub trait RangeValue: Clone + PartialEq + PartialOrd + Debug + Default + 'static {
    /// Non-negative length of `start..end`, used as an aggregation weight
    fn span(start: &Self, end: &Self) -> f64;
}

impl RangeValue for NaiveDateTime {
    fn span(start: &Self, end: &Self) -> f64 {
        (*end - *start).num_seconds().max(0) as f64
    }
}

impl RangeValue for f64 {
    fn span(start: &Self, end: &Self) -> f64 {
        (end - start).max(0.0)
    }
}

impl RangeValue for i64 {
    fn span(start: &Self, end: &Self) -> f64 {
        (end - start).max(0) as f64
    }
}

/// Time range of an entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Range<T> {
    pub start: T,
    pub end: T,
}

impl<T: RangeValue> Range<T> {
    /// Endpoints are swapped when given in reverse order
    pub fn new(start: T, end: T) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn span(&self) -> f64 {
        T::span(&self.start, &self.end)
    }
}

/// Node of the schedule tree
///
/// # Invariants
///
/// 1. `parent` is `None` exactly for top-level entries
/// 2. every child's `parent` equals this entry's `id`
/// 3. children are exclusively owned; parents are referenced by id only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    pub id: EntryId,
    pub name: String,
    pub range: Range<T>,
    /// Completion percentage
    pub completion: f64,
    /// Parent id (`None` = the root identifier)
    pub parent: Option<EntryId>,
    pub children: Vec<Entry<T>>,
    /// Set while an interactive edit is in progress
    #[serde(skip)]
    pub adjusting: bool,
    pub expandable: bool,
    pub expanded: bool,
}

impl<T: RangeValue> Entry<T> {
    pub fn new(id: impl Into<EntryId>, range: Range<T>) -> Self {
        Self {
            id: id.into(),
            name: DEFAULT_ENTRY_NAME.to_string(),
            range,
            completion: 0.0,
            parent: None,
            children: Vec::new(),
            adjusting: false,
            expandable: false,
            expanded: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_completion(mut self, completion: f64) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<EntryId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Attach `child`, rewriting its parent link
    pub fn add_child(&mut self, mut child: Entry<T>) {
        child.parent = Some(self.id.clone());
        self.children.push(child);
        self.expandable = true;
    }

    pub fn child(&self, id: &EntryId) -> Option<&Entry<T>> {
        self.children.iter().find(|c| &c.id == id)
    }

    pub fn child_mut(&mut self, id: &EntryId) -> Option<&mut Entry<T>> {
        self.children.iter_mut().find(|c| &c.id == id)
    }

    /// Pre-order walk over this entry and its descendants
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Entry<T>)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Ids of this entry and every descendant, pre-order
    pub fn subtree_ids(&self) -> Vec<EntryId> {
        let mut ids = Vec::new();
        self.walk(&mut |e| ids.push(e.id.clone()));
        ids
    }

    /// Height of the subtree (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}
