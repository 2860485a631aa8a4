//! Predecessor → successor dependencies between entries

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entry::EntryId;

/// Dependency kind, stored in the relation table as an integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Successor starts after predecessor finishes
    FinishStart,
    FinishFinish,
    StartStart,
    StartFinish,
}

impl RelationType {
    pub fn code(&self) -> i64 {
        match self {
            RelationType::FinishStart => 0,
            RelationType::FinishFinish => 1,
            RelationType::StartStart => 2,
            RelationType::StartFinish => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RelationType::FinishStart),
            1 => Some(RelationType::FinishFinish),
            2 => Some(RelationType::StartStart),
            3 => Some(RelationType::StartFinish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::FinishStart => "FINISH_START",
            RelationType::FinishFinish => "FINISH_FINISH",
            RelationType::StartStart => "START_START",
            RelationType::StartFinish => "START_FINISH",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub predecessor: EntryId,
    pub successor: EntryId,
    pub relation_type: RelationType,
}

impl Relation {
    pub fn new(
        predecessor: impl Into<EntryId>,
        successor: impl Into<EntryId>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            predecessor: predecessor.into(),
            successor: successor.into(),
            relation_type,
        }
    }

    /// Key used to resolve the backing relation row
    pub fn key(&self) -> (EntryId, EntryId) {
        (self.predecessor.clone(), self.successor.clone())
    }

    pub fn touches(&self, id: &EntryId) -> bool {
        &self.predecessor == id || &self.successor == id
    }
}
