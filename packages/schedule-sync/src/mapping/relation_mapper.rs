//! Relation-table rows ↔ `Relation`

use tracing::warn;

use crate::config::RelationFieldMapping;
use crate::domain::{EntryId, Relation, RelationType, Row};

/// `entry_id` holds the successor, `relation_root` the predecessor
#[derive(Debug, Clone)]
pub struct RelationMapper {
    mapping: RelationFieldMapping,
}

impl RelationMapper {
    pub fn new(mapping: RelationFieldMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &RelationFieldMapping {
        &self.mapping
    }

    /// `None` for rows with empty endpoints or an unknown type code
    pub fn map(&self, row: &Row) -> Option<Relation> {
        let successor = EntryId::from_value(row.get(&self.mapping.entry_id))?;
        let predecessor = EntryId::from_value(row.get(&self.mapping.relation_root))?;
        let code = row.get(&self.mapping.relation_type).as_i64()?;
        let Some(relation_type) = RelationType::from_code(code) else {
            warn!("Unknown relation type code {} ({} -> {})", code, predecessor, successor);
            return None;
        };
        Some(Relation {
            predecessor,
            successor,
            relation_type,
        })
    }

    /// Fill the endpoint and type cells of `row`
    pub fn fill(&self, row: &mut Row, relation: &Relation) {
        row.set(&self.mapping.entry_id, relation.successor.to_value());
        row.set(&self.mapping.relation_root, relation.predecessor.to_value());
        row.set(&self.mapping.relation_type, relation.relation_type.code());
    }

    /// (predecessor, successor) key of a relation row
    pub fn key(&self, row: &Row) -> Option<(EntryId, EntryId)> {
        Some((
            EntryId::from_value(row.get(&self.mapping.relation_root))?,
            EntryId::from_value(row.get(&self.mapping.entry_id))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;

    fn mapper() -> RelationMapper {
        RelationMapper::new(RelationFieldMapping::new(
            "id",
            "entry_id",
            "relation_root",
            "relation_type",
        ))
    }

    #[test]
    fn test_fill_then_map() {
        let mapper = mapper();
        let relation = Relation::new(1, 2, RelationType::StartStart);
        let mut row = Row::with_columns(["id", "entry_id", "relation_root", "relation_type"]);

        mapper.fill(&mut row, &relation);

        assert_eq!(row.get("entry_id"), &Value::Int(2));
        assert_eq!(row.get("relation_root"), &Value::Int(1));
        assert_eq!(row.get("relation_type"), &Value::Int(2));
        assert_eq!(mapper.map(&row), Some(relation));
        assert_eq!(mapper.key(&row), Some((EntryId::Int(1), EntryId::Int(2))));
    }

    #[test]
    fn test_unknown_code_is_dropped() {
        let row = Row::new()
            .with("entry_id", 2)
            .with("relation_root", 1)
            .with("relation_type", 17);
        assert!(mapper().map(&row).is_none());
    }

    #[test]
    fn test_empty_endpoint_is_dropped() {
        let row = Row::new().with("entry_id", 2).with("relation_type", 0);
        assert!(mapper().map(&row).is_none());
    }
}
