//! Behaviour of the object store across every backend.

use gendb_store::{BackendKind, RawRow, StorageBackend};
use gendb_types::{
    Attribute, Citation, CustomType, Event, Family, Handle, Media, Name, Note, ObjectRef,
    ObjectType, Person, Place, ReferenceEdge, RegistryKind, Repository, Source, Tag,
};
use proptest::prelude::*;
use tempfile::TempDir;

use crate::{
    ChangeKind, Database, DbConfig, DbError, EventFilter, IntegrityError, NoProgress,
};

fn configs(dir: &TempDir) -> Vec<DbConfig> {
    vec![
        DbConfig::memory(),
        DbConfig::sqlite(dir.path().join("tree.db")),
        DbConfig::logfile(dir.path().join("tree.log")),
    ]
}

fn databases(dir: &TempDir) -> Vec<Database> {
    configs(dir)
        .into_iter()
        .map(|c| Database::open(c).unwrap())
        .collect()
}

fn person(first: &str, surname: &str) -> Person {
    Person::new(Name::new(first, surname))
}

fn add_person(db: &mut Database, first: &str, surname: &str) -> Handle {
    db.with_transaction("add person", |db, txn| {
        db.add(&mut person(first, surname), txn, true)
    })
    .unwrap()
}

fn snapshot(db: &Database) -> Vec<(ObjectType, RawRow)> {
    ObjectType::ALL
        .into_iter()
        .flat_map(|ty| db.raw_cursor(ty).map(move |row| (ty, row.unwrap())))
        .collect()
}

#[test]
fn ids_are_allocated_in_sequence() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        let p1 = add_person(&mut db, "Ada", "Byron");
        let p2 = add_person(&mut db, "Anne", "Byron");
        let p1 = db.get::<Person>(&p1).unwrap();
        let p2 = db.get::<Person>(&p2).unwrap();
        assert!(!p1.handle.is_empty());
        assert_eq!(p1.gramps_id, "I0000", "{}", db.backend_kind());
        assert_eq!(p2.gramps_id, "I0001");
    }
}

#[test]
fn family_parent_has_backlink() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        let p1 = add_person(&mut db, "Ada", "Byron");
        let f1 = db
            .with_transaction("add family", |db, txn| {
                let mut family = Family::new();
                family.father_handle = Some(p1.clone());
                db.add(&mut family, txn, true)
            })
            .unwrap();
        let backlinks: Vec<_> = db.find_backlink_handles(&p1, None).unwrap().collect();
        assert_eq!(backlinks, [ObjectRef::new(ObjectType::Family, f1.clone())]);

        let only_people: Vec<_> = db
            .find_backlink_handles(&p1, Some(&[ObjectType::Person]))
            .unwrap()
            .collect();
        assert!(only_people.is_empty());
    }
}

#[test]
fn dangling_edge_survives_reindex() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        let p1 = add_person(&mut db, "Ada", "Byron");
        let f1 = db
            .with_transaction("add family", |db, txn| {
                let mut family = Family::new();
                family.father_handle = Some(p1.clone());
                db.add(&mut family, txn, true)
            })
            .unwrap();
        db.with_transaction("remove person", |db, txn| db.remove::<Person>(&p1, txn))
            .unwrap();
        db.reindex_reference_map(&mut NoProgress).unwrap();

        let backlinks: Vec<_> = db.find_backlink_handles(&p1, None).unwrap().collect();
        assert_eq!(backlinks, [ObjectRef::new(ObjectType::Family, f1)]);
        let report = db.check_integrity().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.dangling.len(), 1);
    }
}

#[test]
fn backends_agree_on_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut orders = Vec::new();
    for mut db in databases(&dir) {
        db.with_transaction("load", |db, txn| {
            for (h, first, last) in [
                ("h3", "Carl", "Zeller"),
                ("h1", "Björn", "Ångström"),
                ("h2", "Ada", "Byron"),
                ("h0", "Ada", "Byron"),
            ] {
                let mut p = person(first, last);
                p.handle = Handle::from(h);
                db.add(&mut p, txn, true)?;
            }
            Ok(())
        })
        .unwrap();
        orders.push(db.handles(ObjectType::Person, true).unwrap());
    }
    let expected: Vec<Handle> = ["h1", "h0", "h2", "h3"].into_iter().map(Handle::from).collect();
    for order in orders {
        assert_eq!(order, expected);
    }
}

#[test]
fn every_type_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        db.with_transaction("all types", |db, txn| {
            let mut tag = Tag::new("ToDo");
            db.add(&mut tag, txn, true)?;
            let mut note = Note::new("Born at sea");
            note.tag_list.push(tag.handle.clone());
            db.add(&mut note, txn, true)?;
            let mut repo = Repository::new("County archive");
            db.add(&mut repo, txn, true)?;
            let mut source = Source::new("Parish register");
            source.note_list.push(note.handle.clone());
            db.add(&mut source, txn, true)?;
            let mut citation = Citation::new(source.handle.clone());
            citation.page = "p. 12".into();
            db.add(&mut citation, txn, true)?;
            let mut place = Place::new("Lisbon");
            db.add(&mut place, txn, true)?;
            let mut event = Event::new(CustomType::standard("Birth"));
            event.place = Some(place.handle.clone());
            db.add(&mut event, txn, true)?;
            let mut media = Media::new("photos/ada.jpg");
            db.add(&mut media, txn, true)?;
            let mut p = person("Ada", "Byron");
            p.citation_list.push(citation.handle.clone());
            db.add(&mut p, txn, true)?;
            let mut family = Family::new();
            family.mother_handle = Some(p.handle.clone());
            db.add(&mut family, txn, true)?;

            assert_eq!(db.get::<Tag>(&tag.handle), Some(tag.clone()));
            assert_eq!(db.get::<Note>(&note.handle), Some(note.clone()));
            assert_eq!(db.get::<Repository>(&repo.handle), Some(repo.clone()));
            assert_eq!(db.get::<Source>(&source.handle), Some(source.clone()));
            assert_eq!(db.get::<Citation>(&citation.handle), Some(citation.clone()));
            assert_eq!(db.get::<Place>(&place.handle), Some(place.clone()));
            assert_eq!(db.get::<Event>(&event.handle), Some(event.clone()));
            assert_eq!(db.get::<Media>(&media.handle), Some(media.clone()));
            assert_eq!(db.get::<Person>(&p.handle), Some(p.clone()));
            assert_eq!(db.get::<Family>(&family.handle), Some(family.clone()));
            assert_eq!(db.get_by_id::<Citation>("C0000"), Some(citation));
            Ok(())
        })
        .unwrap();
        for ty in ObjectType::ALL {
            assert_eq!(db.count(ty).unwrap(), 1, "{ty} on {}", db.backend_kind());
        }
        assert!(db.check_integrity().unwrap().is_clean());
    }
}

#[test]
fn duplicate_id_is_an_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        add_person(&mut db, "Ada", "Byron");
        let mut txn = db.transaction_begin("clash").unwrap();
        db.add(&mut person("Mary", "Somerville"), &mut txn, true).unwrap();
        let mut other = person("Anne", "Byron");
        other.gramps_id = "I0000".into();
        let err = db.add(&mut other, &mut txn, true).unwrap_err();
        assert!(matches!(
            err,
            DbError::Integrity(IntegrityError::DuplicateId { .. })
        ));
        assert!(matches!(
            db.transaction_commit(txn).unwrap_err(),
            DbError::TransactionAborted
        ));
        // Only SQLite can take back the write made before the clash.
        let expected = if db.backend_kind() == BackendKind::Sqlite { 1 } else { 2 };
        assert_eq!(db.count(ObjectType::Person).unwrap(), expected, "{}", db.backend_kind());
        assert!(db.check_integrity().unwrap().is_clean());
        db.transaction_begin("next").unwrap();
    }
}

#[test]
fn handle_of_another_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        let (p, n) = db
            .with_transaction("person with note", |db, txn| {
                let n = db.add(&mut Note::new("x"), txn, true)?;
                let mut p = person("Ada", "Byron");
                p.note_list.push(n.clone());
                Ok((db.add(&mut p, txn, true)?, n))
            })
            .unwrap();
        let err = db
            .with_transaction("tag", |db, txn| {
                let mut tag = Tag::new("ToDo");
                tag.handle = p.clone();
                db.add(&mut tag, txn, true)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Integrity(IntegrityError::HandleInUse {
                object_type: ObjectType::Tag,
                existing: ObjectType::Person,
                ..
            })
        ));
        assert_eq!(db.count(ObjectType::Tag).unwrap(), 0);
        let referrers: Vec<_> = db.find_backlink_handles(&n, None).unwrap().collect();
        assert_eq!(referrers, [ObjectRef::new(ObjectType::Person, p.clone())]);
        assert!(db.check_integrity().unwrap().is_clean());
    }
}

#[test]
fn close_with_open_transaction_keeps_surnames_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.db");
    let mut db = Database::open(DbConfig::sqlite(&path)).unwrap();
    let mut txn = db.transaction_begin("unfinished").unwrap();
    db.add(&mut person("Ghost", "Ghost"), &mut txn, true).unwrap();
    db.close().unwrap();

    let mut db = Database::open(DbConfig::sqlite(&path)).unwrap();
    assert_eq!(db.count(ObjectType::Person).unwrap(), 0);
    assert!(db.surname_list().is_empty());
    let h = add_person(&mut db, "Ada", "Byron");
    assert_eq!(db.get::<Person>(&h).unwrap().gramps_id, "I0000");
}

#[test]
fn reference_to_wrong_type_is_rejected() {
    let mut db = Database::in_memory().unwrap();
    let note = db
        .with_transaction("note", |db, txn| db.add(&mut Note::new("x"), txn, true))
        .unwrap();
    let err = db
        .with_transaction("bad family", |db, txn| {
            let mut family = Family::new();
            family.father_handle = Some(note.clone());
            db.add(&mut family, txn, true)
        })
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Integrity(IntegrityError::ImpossibleReference {
            expected: ObjectType::Person,
            actual: ObjectType::Note,
            ..
        })
    ));
}

#[test]
fn explicit_ids_are_skipped_by_allocation() {
    let mut db = Database::in_memory().unwrap();
    db.with_transaction("import", |db, txn| {
        let mut p = person("Ada", "Byron");
        p.gramps_id = "I0000".into();
        db.add(&mut p, txn, false)
    })
    .unwrap();
    let h = add_person(&mut db, "Anne", "Byron");
    assert_eq!(db.get::<Person>(&h).unwrap().gramps_id, "I0001");
}

#[test]
fn remove_of_missing_object_is_a_no_op() {
    let mut db = Database::in_memory().unwrap();
    let removed = db
        .with_transaction("remove", |db, txn| {
            db.remove::<Person>(&Handle::from("nobody"), txn)
        })
        .unwrap();
    assert!(!removed);
    assert!(!db.can_undo());
}

#[test]
fn undo_and_redo_restore_exact_rows() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        let p = add_person(&mut db, "Ada", "Byron");
        let before = snapshot(&db);

        db.with_transaction("edit", |db, txn| {
            let mut ada = db.try_get::<Person>(&p)?.unwrap();
            ada.primary_name.first_name = "Augusta".into();
            db.commit(&mut ada, txn)
        })
        .unwrap();
        db.with_transaction("add note", |db, txn| db.add(&mut Note::new("n"), txn, true))
            .unwrap();
        db.with_transaction("remove", |db, txn| db.remove::<Person>(&p, txn))
            .unwrap();
        let after = snapshot(&db);

        for _ in 0..3 {
            assert!(db.undo().unwrap());
        }
        assert_eq!(snapshot(&db), before, "{}", db.backend_kind());
        assert_eq!(db.redo_description(), Some("edit"));
        for _ in 0..3 {
            assert!(db.redo().unwrap());
        }
        assert_eq!(snapshot(&db), after);
        assert!(!db.redo().unwrap());
    }
}

#[test]
fn undo_restores_backlinks_and_surnames() {
    let mut db = Database::in_memory().unwrap();
    let p = add_person(&mut db, "Ada", "Byron");
    db.with_transaction("family", |db, txn| {
        let mut family = Family::new();
        family.father_handle = Some(p.clone());
        db.add(&mut family, txn, true)
    })
    .unwrap();
    assert_eq!(db.find_backlink_handles(&p, None).unwrap().count(), 1);
    db.undo().unwrap();
    assert_eq!(db.find_backlink_handles(&p, None).unwrap().count(), 0);
    assert_eq!(db.surname_list(), ["Byron"]);
    db.undo().unwrap();
    assert!(db.surname_list().is_empty());
    assert!(db.check_integrity().unwrap().is_clean());
}

#[test]
fn new_commit_clears_redo() {
    let mut db = Database::in_memory().unwrap();
    add_person(&mut db, "Ada", "Byron");
    db.undo().unwrap();
    assert!(db.can_redo());
    add_person(&mut db, "Anne", "Byron");
    assert!(!db.can_redo());
}

#[test]
fn abandon_reverts_the_session() {
    let mut db = Database::in_memory().unwrap();
    add_person(&mut db, "Ada", "Byron");
    add_person(&mut db, "Anne", "Byron");
    db.abandon_changes().unwrap();
    assert!(db.is_empty().unwrap());
    assert!(!db.can_redo());
}

#[test]
fn abandon_is_refused_after_batch_or_truncation() {
    let mut db = Database::in_memory().unwrap();
    let txn = db.batch_begin("import").unwrap();
    db.transaction_commit(txn).unwrap();
    assert!(matches!(db.abandon_changes(), Err(DbError::AbandonNotPossible)));

    let mut config = DbConfig::memory();
    config.undo_retention = 1;
    let mut db = Database::open(config).unwrap();
    add_person(&mut db, "Ada", "Byron");
    add_person(&mut db, "Anne", "Byron");
    assert!(matches!(db.abandon_changes(), Err(DbError::AbandonNotPossible)));
}

#[test]
fn only_one_transaction_at_a_time() {
    let mut db = Database::in_memory().unwrap();
    let txn = db.transaction_begin("first").unwrap();
    assert!(matches!(db.transaction_begin("second"), Err(DbError::TransactionActive)));
    assert!(matches!(db.undo(), Err(DbError::TransactionActive)));
    db.transaction_commit(txn).unwrap();
    db.transaction_begin("third").unwrap();
}

#[test]
fn transaction_from_another_database_is_stale() {
    let mut a = Database::in_memory().unwrap();
    let mut b = Database::in_memory().unwrap();
    let mut txn = a.transaction_begin("a").unwrap();
    let err = b.add(&mut person("Ada", "Byron"), &mut txn, true).unwrap_err();
    assert!(matches!(err, DbError::StaleTransaction));
}

#[test]
fn sqlite_abort_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(DbConfig::sqlite(dir.path().join("t.db"))).unwrap();
    let mut txn = db.transaction_begin("discard").unwrap();
    db.add(&mut person("Ada", "Byron"), &mut txn, true).unwrap();
    assert!(db.transaction_abort(txn).unwrap());
    assert_eq!(db.count(ObjectType::Person).unwrap(), 0);
    assert!(db.surname_list().is_empty());
    assert!(!db.can_undo());
    // The id counter was rolled back with the data.
    let h = add_person(&mut db, "Anne", "Byron");
    assert_eq!(db.get::<Person>(&h).unwrap().gramps_id, "I0000");
}

#[test]
fn memory_abort_keeps_writes_and_records_them() {
    let mut db = Database::in_memory().unwrap();
    let mut txn = db.transaction_begin("discard").unwrap();
    db.add(&mut person("Ada", "Byron"), &mut txn, true).unwrap();
    assert!(!db.transaction_abort(txn).unwrap());
    assert_eq!(db.count(ObjectType::Person).unwrap(), 1);
    assert!(db.undo().unwrap());
    assert_eq!(db.count(ObjectType::Person).unwrap(), 0);
}

#[test]
fn failed_body_aborts_the_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(DbConfig::sqlite(dir.path().join("t.db"))).unwrap();
    let err = db
        .with_transaction("fails", |db, txn| {
            db.add(&mut person("Ada", "Byron"), txn, true)?;
            Err::<(), _>(DbError::Cancelled)
        })
        .unwrap_err();
    assert!(matches!(err, DbError::Cancelled));
    assert_eq!(db.count(ObjectType::Person).unwrap(), 0);
    db.transaction_begin("next").unwrap();
}

#[test]
fn read_only_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.db");
    let mut db = Database::open(DbConfig::sqlite(&path)).unwrap();
    let h = add_person(&mut db, "Ada", "Byron");
    db.close().unwrap();

    let mut db = Database::open(DbConfig::sqlite(&path).read_only()).unwrap();
    assert!(db.is_read_only());
    assert!(db.get::<Person>(&h).is_some());
    assert!(matches!(db.transaction_begin("x"), Err(DbError::ReadOnly)));
    assert!(matches!(db.set_metadata("k", &1), Err(DbError::ReadOnly)));
    assert!(matches!(db.undo(), Err(DbError::ReadOnly)));
}

#[test]
fn newer_schema_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.db");
    let mut db = Database::open(DbConfig::sqlite(&path)).unwrap();
    db.set_metadata("version", &99u32).unwrap();
    db.close().unwrap();
    let err = Database::open(DbConfig::sqlite(&path)).unwrap_err();
    assert!(matches!(err, DbError::VersionTooNew { found: 99, .. }));

    let mut db = Database::open(DbConfig::logfile(dir.path().join("t.log"))).unwrap();
    db.set_metadata("version", &0u32).unwrap();
    db.close().unwrap();
    let err = Database::open(DbConfig::logfile(dir.path().join("t.log"))).unwrap_err();
    assert!(matches!(err, DbError::UpgradeRequired { found: 0, .. }));
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    for config in configs(&dir).into_iter().skip(1) {
        let mut db = Database::open(config.clone()).unwrap();
        let dbid = db.dbid().to_string();
        let p = add_person(&mut db, "Ada", "Byron");
        add_person(&mut db, "Anne", "Byron");
        db.set_default_person_handle(Some(&p)).unwrap();
        db.set_bookmarks(ObjectType::Person, &[p.clone()]).unwrap();
        db.set_name_group_mapping("Byron", Some("Biron")).unwrap();
        db.close().unwrap();

        let mut db = Database::open(config).unwrap();
        assert_eq!(db.dbid(), dbid);
        assert_eq!(db.surname_list(), ["Byron"]);
        assert_eq!(db.default_person_handle().unwrap(), Some(p.clone()));
        assert_eq!(db.get_bookmarks(ObjectType::Person).unwrap(), [p]);
        assert_eq!(db.get_name_group_mapping("Byron").unwrap(), "Biron");
        let h = add_person(&mut db, "Augusta", "Leigh");
        assert_eq!(db.get::<Person>(&h).unwrap().gramps_id, "I0002");
    }
}

#[test]
fn id_prefix_is_validated_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t.db");
    let mut db = Database::open(DbConfig::sqlite(&path)).unwrap();
    assert_eq!(db.set_id_prefix(ObjectType::Person, "P-").unwrap(), "P-%d");
    assert_eq!(db.set_id_prefix(ObjectType::Family, "%q").unwrap(), "F%04d");
    db.set_id_prefix(ObjectType::Person, "I%05d").unwrap();
    db.close().unwrap();

    let mut db = Database::open(DbConfig::sqlite(&path)).unwrap();
    assert_eq!(db.id_prefix(ObjectType::Person), "I%05d");
    assert_eq!(db.normalize_id(ObjectType::Person, "I12"), "I00012");
    assert_eq!(db.normalize_id(ObjectType::Person, "X12"), "X12");
    let h = add_person(&mut db, "Ada", "Byron");
    assert_eq!(db.get::<Person>(&h).unwrap().gramps_id, "I00000");
}

#[test]
fn configured_prefix_overrides_stored_one() {
    let mut config = DbConfig::memory();
    config
        .id_prefixes
        .insert("person".into(), "P%03d".into());
    let mut db = Database::open(config).unwrap();
    let h = add_person(&mut db, "Ada", "Byron");
    assert_eq!(db.get::<Person>(&h).unwrap().gramps_id, "P000");
    assert!(db.find_next_id(ObjectType::Tag).is_err());
}

#[test]
fn observers_see_commits_and_undo() {
    let mut db = Database::in_memory().unwrap();
    let mut people = db.subscribe(EventFilter::object_type(ObjectType::Person));
    let mut notes = db.subscribe(EventFilter::object_type(ObjectType::Note));

    let h = add_person(&mut db, "Ada", "Byron");
    let event = people.try_recv().unwrap();
    assert_eq!(event.change, ChangeKind::Add);
    assert_eq!(event.handles, [h.clone()]);
    assert!(notes.try_recv().is_err());

    db.undo().unwrap();
    let event = people.try_recv().unwrap();
    assert_eq!(event.change, ChangeKind::Delete);

    let txn = db.batch_begin("quiet").unwrap();
    db.transaction_commit(txn).unwrap();
    assert!(people.try_recv().is_err());
}

#[test]
fn custom_values_and_surnames_are_tracked() {
    let mut db = Database::in_memory().unwrap();
    db.with_transaction("load", |db, txn| {
        let mut p = person("Ada", "Byron");
        p.attribute_list
            .push(Attribute::new(CustomType::custom("Shoe size"), "38"));
        db.add(&mut p, txn, true)?;
        db.add(&mut Event::new(CustomType::custom("Graduation")), txn, true)?;
        db.add(&mut person("Carl", "Ångström"), txn, true)?;
        Ok(())
    })
    .unwrap();
    assert_eq!(db.custom_values(RegistryKind::PersonAttributes), ["Shoe size"]);
    assert_eq!(db.custom_values(RegistryKind::EventNames), ["Graduation"]);
    assert_eq!(db.surname_list(), ["Ångström", "Byron"]);
}

#[test]
fn initial_person_falls_back_to_first_person() {
    let mut db = Database::in_memory().unwrap();
    assert_eq!(db.find_initial_person().unwrap(), None);
    let a = db
        .with_transaction("a", |db, txn| {
            let mut p = person("Ada", "Byron");
            p.handle = Handle::from("b");
            db.add(&mut p, txn, true)
        })
        .unwrap();
    let b = db
        .with_transaction("b", |db, txn| {
            let mut p = person("Anne", "Byron");
            p.handle = Handle::from("a");
            db.add(&mut p, txn, true)
        })
        .unwrap();
    assert_eq!(db.find_initial_person().unwrap().unwrap().handle, b);
    db.set_default_person_handle(Some(&a)).unwrap();
    assert_eq!(db.find_initial_person().unwrap().unwrap().handle, a);
    db.set_default_person_handle(None).unwrap();
    assert_eq!(db.default_person_handle().unwrap(), None);
}

#[test]
fn name_groups_map_and_unmap() {
    let mut db = Database::in_memory().unwrap();
    assert_eq!(db.get_name_group_mapping("Smyth").unwrap(), "Smyth");
    db.set_name_group_mapping("Smyth", Some("Smith")).unwrap();
    assert!(db.has_name_group_key("Smyth").unwrap());
    assert_eq!(db.name_group_keys().unwrap(), ["Smyth"]);
    db.set_name_group_mapping("Smyth", None).unwrap();
    assert!(!db.has_name_group_key("Smyth").unwrap());
}

#[test]
fn batch_skips_backlinks_until_reindex() {
    let dir = tempfile::tempdir().unwrap();
    for mut db in databases(&dir) {
        let mut txn = db.batch_begin("import").unwrap();
        let mut p = person("Ada", "Byron");
        db.add(&mut p, &mut txn, true).unwrap();
        let mut family = Family::new();
        family.father_handle = Some(p.handle.clone());
        db.add(&mut family, &mut txn, true).unwrap();
        assert!(txn.is_empty());
        db.transaction_commit(txn).unwrap();

        assert!(!db.can_undo());
        let report = db.check_integrity().unwrap();
        assert_eq!(report.missing.len(), 1);
        assert!(!report.is_clean());

        db.reindex_reference_map(&mut NoProgress).unwrap();
        assert!(db.check_integrity().unwrap().is_clean());
        assert_eq!(db.surname_list(), ["Byron"]);
    }
}

#[test]
fn reindex_can_be_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(DbConfig::sqlite(dir.path().join("t.db"))).unwrap();
    add_person(&mut db, "Ada", "Byron");
    add_person(&mut db, "Anne", "Byron");
    let mut calls = 0;
    let mut stop_early = |_: &str, _: usize, _: usize| {
        calls += 1;
        false
    };
    let err = db.reindex_reference_map(&mut stop_early).unwrap_err();
    assert!(matches!(err, DbError::Cancelled));
    assert_eq!(calls, 1);
}

#[test]
fn rebuild_secondary_refreshes_family_order() {
    let mut db = Database::in_memory().unwrap();
    let father = Handle::from("father");
    db.with_transaction("families", |db, txn| {
        let mut early = Family::new();
        early.handle = Handle::from("f1");
        early.father_handle = Some(father.clone());
        db.add(&mut early, txn, true)?;
        let mut other = Family::new();
        other.handle = Handle::from("f0");
        db.add(&mut other, txn, true)?;
        let mut p = person("Zed", "Zeller");
        p.handle = father.clone();
        db.add(&mut p, txn, true)?;
        Ok(())
    })
    .unwrap();
    // f1 was stored before its father existed, so both keys are empty.
    assert_eq!(
        db.handles(ObjectType::Family, true).unwrap(),
        [Handle::from("f0"), Handle::from("f1")]
    );

    let mut other = db.get::<Family>(&Handle::from("f0")).unwrap();
    db.with_transaction("father for f0", |db, txn| {
        let mut p = person("Ada", "Adams");
        db.add(&mut p, txn, true)?;
        other.father_handle = Some(p.handle.clone());
        db.commit(&mut other, txn)
    })
    .unwrap();
    db.rebuild_secondary(&mut NoProgress).unwrap();
    assert_eq!(
        db.handles(ObjectType::Family, true).unwrap(),
        [Handle::from("f0"), Handle::from("f1")]
    );
    let stored = db
        .backend()
        .get(ObjectType::Family, &Handle::from("f1"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.order_by, gendb_types::sort_key("Zeller Zed"));
}

#[test]
fn copy_between_backends() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = Database::in_memory().unwrap();
    let p = add_person(&mut source, "Ada", "Byron");
    source
        .with_transaction("family", |db, txn| {
            let mut family = Family::new();
            family.mother_handle = Some(p.clone());
            db.add(&mut family, txn, true)
        })
        .unwrap();
    source.set_name_group_mapping("Byron", Some("Biron")).unwrap();

    let mut target = Database::open(DbConfig::sqlite(dir.path().join("copy.db"))).unwrap();
    target.copy_from(&source, &mut NoProgress).unwrap();

    assert_eq!(snapshot(&target), snapshot(&source));
    assert_ne!(target.dbid(), source.dbid());
    assert_eq!(target.find_backlink_handles(&p, None).unwrap().count(), 1);
    assert_eq!(target.surname_list(), ["Byron"]);
    assert_eq!(target.get_name_group_mapping("Byron").unwrap(), "Biron");
    let h = add_person(&mut target, "Anne", "Byron");
    assert_eq!(target.get::<Person>(&h).unwrap().gramps_id, "I0001");

    assert!(matches!(
        target.copy_from(&source, &mut NoProgress),
        Err(DbError::Config(_))
    ));
}

#[test]
fn undecodable_rows_read_as_absent() {
    let mut db = Database::in_memory().unwrap();
    let good = add_person(&mut db, "Ada", "Byron");
    let bad = Handle::from("garbage");
    db.backend()
        .put(
            ObjectType::Person,
            &RawRow {
                handle: bad.clone(),
                gramps_id: String::new(),
                order_by: String::new(),
                data: b"not json".to_vec(),
            },
        )
        .unwrap();
    assert_eq!(db.get::<Person>(&bad), None);
    assert!(db.try_get::<Person>(&bad).is_err());
    let seen: Vec<_> = db.cursor::<Person>().map(|r| r.unwrap().0).collect();
    assert_eq!(seen, [good]);
    assert_eq!(db.check_integrity().unwrap().undecodable.len(), 1);
}

#[test]
fn rebuild_progress_counts_undecodable_rows() {
    let mut db = Database::in_memory().unwrap();
    add_person(&mut db, "Ada", "Byron");
    db.backend()
        .put(
            ObjectType::Person,
            &RawRow {
                handle: Handle::from("garbage"),
                gramps_id: String::new(),
                order_by: String::new(),
                data: b"not json".to_vec(),
            },
        )
        .unwrap();
    let mut last = (0, 0);
    let mut record = |_: &str, done: usize, total: usize| {
        last = (done, total);
        true
    };
    db.rebuild_secondary(&mut record).unwrap();
    assert_eq!(last, (2, 2));
    assert_eq!(db.surname_list(), ["Byron"]);
}

#[test]
fn summary_reports_counts() {
    let mut db = Database::in_memory().unwrap();
    add_person(&mut db, "Ada", "Byron");
    let summary = db.summary().unwrap();
    assert_eq!(summary.backend, BackendKind::Memory);
    assert_eq!(summary.counts[0], (ObjectType::Person, 1));
    assert_eq!(summary.undo_depth, 1);
    assert!(!summary.read_only);
}

#[derive(Clone, Debug)]
enum Op {
    AddPerson(String),
    Rename(usize, String),
    AddNote(usize),
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[A-Z][a-z]{0,6}".prop_map(Op::AddPerson),
        (0usize..8, "[A-Z][a-z]{0,6}").prop_map(|(i, s)| Op::Rename(i, s)),
        (0usize..8).prop_map(Op::AddNote),
        (0usize..8).prop_map(Op::Remove),
    ]
}

fn apply(db: &mut Database, op: &Op) {
    let people = db.handles(ObjectType::Person, false).unwrap();
    let pick = |i: usize| people.get(i % people.len().max(1)).cloned();
    db.with_transaction("op", |db, txn| {
        match op {
            Op::AddPerson(surname) => {
                db.add(&mut person("X", surname), txn, true)?;
            }
            Op::Rename(i, surname) => {
                if let Some(h) = pick(*i) {
                    let mut p = db.try_get::<Person>(&h)?.unwrap();
                    p.primary_name.surname_list[0].surname = surname.clone();
                    db.commit(&mut p, txn)?;
                }
            }
            Op::AddNote(i) => {
                let mut note = Note::new("n");
                let h = db.add(&mut note, txn, true)?;
                if let Some(p) = pick(*i) {
                    let mut p = db.try_get::<Person>(&p)?.unwrap();
                    p.note_list.push(h);
                    db.commit(&mut p, txn)?;
                }
            }
            Op::Remove(i) => {
                if let Some(h) = pick(*i) {
                    db.remove::<Person>(&h, txn)?;
                }
            }
        }
        Ok(())
    })
    .unwrap();
}

fn edges(db: &Database) -> Vec<ReferenceEdge> {
    let mut edges = db.backend().all_references().unwrap();
    edges.sort();
    edges
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn undo_all_then_redo_all_is_identity(ops in prop::collection::vec(op(), 1..12)) {
        let dir = tempfile::tempdir().unwrap();
        for mut db in databases(&dir) {
            let start = snapshot(&db);
            for op in &ops {
                apply(&mut db, op);
            }
            let end = snapshot(&db);
            let mut undone = 0;
            while db.undo().unwrap() {
                undone += 1;
            }
            prop_assert!(undone <= ops.len());
            prop_assert_eq!(snapshot(&db), start);
            while db.redo().unwrap() {}
            prop_assert_eq!(snapshot(&db), end);
            prop_assert!(db.check_integrity().unwrap().is_clean());
        }
    }

    #[test]
    fn cursor_yields_each_handle_once(ops in prop::collection::vec(op(), 0..12)) {
        let dir = tempfile::tempdir().unwrap();
        for mut db in databases(&dir) {
            for op in &ops {
                apply(&mut db, op);
            }
            let mut from_cursor: Vec<Handle> =
                db.cursor::<Person>().map(|r| r.unwrap().0).collect();
            from_cursor.sort();
            let mut handles = db.handles(ObjectType::Person, false).unwrap();
            handles.sort();
            prop_assert_eq!(from_cursor, handles);
            let notes: Vec<_> = db.cursor::<Note>().map(|r| r.unwrap().0).collect();
            prop_assert_eq!(notes.len(), db.count(ObjectType::Note).unwrap());
        }
    }

    #[test]
    fn reindex_matches_stored_references(ops in prop::collection::vec(op(), 0..12)) {
        let dir = tempfile::tempdir().unwrap();
        for mut db in databases(&dir) {
            for op in &ops {
                apply(&mut db, op);
            }
            let maintained = edges(&db);
            db.reindex_reference_map(&mut NoProgress).unwrap();
            let report = db.check_integrity().unwrap();
            prop_assert!(report.missing.is_empty());
            prop_assert!(report.stale.is_empty());
            let first = edges(&db);
            prop_assert_eq!(&first, &maintained);
            db.reindex_reference_map(&mut NoProgress).unwrap();
            prop_assert_eq!(edges(&db), first);
        }
    }
}
