//! Session edits written through to SQLite and read back
#![cfg(feature = "sqlite")]

mod common;

use common::*;
use pretty_assertions::assert_eq;
use schedule_sync::{
    EntryId, InMemoryRowStore, Origin, PersistOutcome, Relation, RelationType, RowStore,
    SqliteDatabase, SyncSession, Value,
};
use std::path::Path;

fn open_entries(path: &Path) -> InMemoryRowStore {
    InMemoryRowStore::load(
        "entries",
        entry_columns(),
        "id",
        SqliteDatabase::open(path).unwrap(),
    )
    .unwrap()
}

fn open_relations(path: &Path) -> InMemoryRowStore {
    InMemoryRowStore::load(
        "relations",
        relation_columns(),
        "id",
        SqliteDatabase::open(path).unwrap(),
    )
    .unwrap()
}

/// Database file holding a root (1) with one child (2)
fn seeded_database() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut store = open_entries(file.path());
    store
        .insert_row(entry_row(1, 1, 5, Value::Null, 0.0), true, Origin::Load)
        .unwrap();
    store
        .insert_row(entry_row(2, 1, 3, 1, 0.0), true, Origin::Load)
        .unwrap();
    assert_eq!(store.flush_changed().unwrap(), 2);
    file
}

fn synced_session(path: &Path) -> SyncSession<chrono::NaiveDateTime> {
    let mut relations = relation_mapping();
    relations.db_sync = true;
    SyncSession::open(
        mapping_builder().db_sync(true).build().unwrap(),
        open_entries(path),
    )
    .and_then(|s| s.with_relations(relations, open_relations(path)))
    .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Write-through
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_completion_rollup_survives_reload() {
    let file = seeded_database();
    let mut session = synced_session(file.path());

    session.tree_mut().set_completion(&EntryId::Int(2), 100.0);
    assert_eq!(
        session.update_entry(&EntryId::Int(2)),
        PersistOutcome::Written { rows: 2 }
    );
    drop(session);

    let reloaded = synced_session(file.path());
    assert_eq!(reloaded.entry_count(), 2);
    assert_eq!(reloaded.entry(&EntryId::Int(1)).unwrap().completion, 100.0);
    assert_eq!(reloaded.entry(&EntryId::Int(2)).unwrap().completion, 100.0);
    assert_eq!(
        reloaded.entry(&EntryId::Int(2)).unwrap().range.end,
        day(3)
    );
}

#[test]
fn test_relations_survive_reload() {
    let file = seeded_database();
    let mut session = synced_session(file.path());

    session.add_relation(Relation::new(1, 2, RelationType::StartFinish));
    drop(session);

    let db = SqliteDatabase::open(file.path()).unwrap();
    assert_eq!(db.count("relations").unwrap(), 1);
    let reloaded = synced_session(file.path());
    let relation = reloaded
        .relations()
        .get(&EntryId::Int(1), &EntryId::Int(2))
        .unwrap();
    assert_eq!(relation.relation_type, RelationType::StartFinish);
}

#[test]
fn test_remove_entry_deletes_from_database() {
    let file = seeded_database();
    let mut session = synced_session(file.path());
    session.add_relation(Relation::new(1, 2, RelationType::FinishStart));

    session.remove_entry(&EntryId::Int(2));
    drop(session);

    let db = SqliteDatabase::open(file.path()).unwrap();
    assert_eq!(db.count("entries").unwrap(), 1);
    assert_eq!(db.count("relations").unwrap(), 0);
}

#[test]
fn test_external_insert_id_is_written_back() {
    let file = seeded_database();
    let mut session = synced_session(file.path());

    session
        .entry_store_mut()
        .insert_row(
            entry_row(0, 2, 4, 1, 0.0).with("id", Value::Null),
            false,
            Origin::External,
        )
        .unwrap();
    session.pump();
    session.entry_store_mut().flush_changed().unwrap();
    drop(session);

    let db = SqliteDatabase::open(file.path()).unwrap();
    assert_eq!(db.count("entries").unwrap(), 3);
    let reloaded = synced_session(file.path());
    assert_eq!(reloaded.entry_count(), 3);
    assert!(reloaded.orphans().is_empty());
}
