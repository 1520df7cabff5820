//! # gendb-store
//!
//! Raw storage for gendb: the record codec and the backends it is written
//! through.
//!
//! Every backend implements [`StorageBackend`] and is chosen purely by
//! [`BackendConfig`]:
//!
//! - [`InMemoryBackend`]: maps behind a `RwLock`, no persistence
//! - [`SqliteBackend`]: durable, one table per object type plus reference,
//!   metadata and name-group tables
//! - [`LogFileBackend`]: in-memory state replayed from an append-only,
//!   CRC-framed log file
//!
//! Backends store encoded rows; they never decode objects. Decoding, order
//! keys and reference extraction happen in `gendb-db`.

pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod logfile;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use codec::{decode, encode, from_row, to_row, SCHEMA_VERSION};
pub use config::{open_backend, BackendConfig, SyncMode};
pub use cursor::{RawCursor, DEFAULT_PAGE_SIZE};
pub use error::{StoreError, StoreResult};
pub use logfile::LogFileBackend;
pub use memory::InMemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::{BackendKind, RawRow, StorageBackend};

#[cfg(test)]
mod conformance {
    //! The same checks against every backend.

    use std::collections::BTreeSet;

    use gendb_types::{Handle, ObjectRef, ObjectType};
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn backends(dir: &TempDir) -> Vec<Box<dyn StorageBackend>> {
        vec![
            Box::new(InMemoryBackend::new()),
            Box::new(SqliteBackend::open(&dir.path().join("c.db"), false).unwrap()),
            Box::new(
                LogFileBackend::open(&dir.path().join("c.log"), false, SyncMode::OsDefault)
                    .unwrap(),
            ),
        ]
    }

    fn row(handle: &str, id: &str, order: &str) -> RawRow {
        RawRow {
            handle: Handle::from(handle),
            gramps_id: id.to_string(),
            order_by: order.to_string(),
            data: handle.as_bytes().to_vec(),
        }
    }

    #[test]
    fn get_put_delete() {
        let dir = tempfile::tempdir().unwrap();
        for b in backends(&dir) {
            let h = Handle::from("p1");
            assert_eq!(b.get(ObjectType::Person, &h).unwrap(), None);
            b.put(ObjectType::Person, &row("p1", "I0001", "k")).unwrap();
            assert_eq!(b.get(ObjectType::Person, &h).unwrap(), Some(row("p1", "I0001", "k")));
            assert!(b.contains(ObjectType::Person, &h).unwrap(), "{:?}", b.kind());
            assert_eq!(b.handle_for_id(ObjectType::Person, "I0001").unwrap(), Some(h.clone()));
            assert!(b.delete(ObjectType::Person, &h).unwrap());
            assert!(!b.delete(ObjectType::Person, &h).unwrap());
            assert_eq!(b.count(ObjectType::Person).unwrap(), 0);
            assert_eq!(b.handle_for_id(ObjectType::Person, "I0001").unwrap(), None);
        }
    }

    #[test]
    fn sorted_handles_break_ties_by_handle() {
        let dir = tempfile::tempdir().unwrap();
        for b in backends(&dir) {
            b.put(ObjectType::Place, &row("c", "P2", "b")).unwrap();
            b.put(ObjectType::Place, &row("a", "P0", "b")).unwrap();
            b.put(ObjectType::Place, &row("b", "P1", "a")).unwrap();
            let sorted: Vec<_> = b
                .handles(ObjectType::Place, true)
                .unwrap()
                .into_iter()
                .map(|h| h.to_string())
                .collect();
            assert_eq!(sorted, ["b", "a", "c"], "{:?}", b.kind());
            let unsorted = b.handles(ObjectType::Place, false).unwrap();
            assert_eq!(unsorted.len(), 3);
            let ids: Vec<_> = b.ids(ObjectType::Place).unwrap().into_iter().map(|i| i.to_string()).collect();
            assert_eq!(ids, ["P0", "P1", "P2"]);
        }
    }

    #[test]
    fn references_metadata_and_name_groups() {
        let dir = tempfile::tempdir().unwrap();
        for b in backends(&dir) {
            let p = ObjectRef::new(ObjectType::Person, Handle::from("p1"));
            let f = ObjectRef::new(ObjectType::Family, Handle::from("f1"));
            let n = ObjectRef::new(ObjectType::Note, Handle::from("n1"));
            b.replace_references(&p, &[n.clone()].into()).unwrap();
            b.replace_references(&f, &[n.clone(), p.clone()].into()).unwrap();

            let to_note = b.references_to(&n.handle).unwrap();
            assert_eq!(to_note.len(), 2, "{:?}", b.kind());
            assert_eq!(to_note[0].referrer, p.handle);
            assert_eq!(b.references_from(&f.handle).unwrap().len(), 2);
            assert_eq!(b.all_references().unwrap().len(), 3);

            b.delete_references_from(&f.handle).unwrap();
            assert_eq!(b.all_references().unwrap().len(), 1);
            b.clear_references().unwrap();
            assert!(b.all_references().unwrap().is_empty());

            b.set_metadata("b", "2").unwrap();
            b.set_metadata("a", "1").unwrap();
            assert_eq!(b.metadata_keys().unwrap(), ["a", "b"]);
            assert_eq!(b.get_metadata("missing").unwrap(), None);

            b.set_name_group("Smyth", Some("Smith")).unwrap();
            assert_eq!(b.get_name_group("Smyth").unwrap().as_deref(), Some("Smith"));
            b.set_name_group("Smyth", None).unwrap();
            assert!(b.name_group_keys().unwrap().is_empty());
        }
    }

    #[derive(Clone, Debug)]
    enum Op {
        Put(u8, u8, u8),
        Delete(u8),
        Refs(u8, Vec<u8>),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..12, 0u8..6, 0u8..4).prop_map(|(h, id, k)| Op::Put(h, id, k)),
            (0u8..12).prop_map(Op::Delete),
            (0u8..12, proptest::collection::vec(0u8..12, 0..4)).prop_map(|(h, t)| Op::Refs(h, t)),
        ]
    }

    fn observe(b: &dyn StorageBackend) -> (Vec<Handle>, Vec<RawRow>, Vec<gendb_types::ReferenceEdge>) {
        let sorted = b.handles(ObjectType::Event, true).unwrap();
        let rows = RawCursor::new(b, ObjectType::Event, 5)
            .collect::<StoreResult<Vec<_>>>()
            .unwrap();
        (sorted, rows, b.all_references().unwrap())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn backends_agree_on_every_operation_sequence(ops in proptest::collection::vec(op(), 1..40)) {
            let dir = tempfile::tempdir().unwrap();
            let all = backends(&dir);
            for b in &all {
                b.begin().unwrap();
                for op in &ops {
                    match op {
                        Op::Put(h, id, k) => b
                            .put(ObjectType::Event, &row(&format!("e{h:02}"), &format!("E{id}"), &format!("k{k}")))
                            .unwrap(),
                        Op::Delete(h) => {
                            b.delete(ObjectType::Event, &Handle::from(format!("e{h:02}"))).unwrap();
                        }
                        Op::Refs(h, targets) => {
                            let from = ObjectRef::new(ObjectType::Event, Handle::from(format!("e{h:02}")));
                            let to: BTreeSet<_> = targets
                                .iter()
                                .map(|t| ObjectRef::new(ObjectType::Note, Handle::from(format!("n{t:02}"))))
                                .collect();
                            b.replace_references(&from, &to).unwrap();
                        }
                    }
                }
                b.commit().unwrap();
            }
            let expected = observe(all[0].as_ref());
            for b in &all[1..] {
                prop_assert_eq!(&observe(b.as_ref()), &expected, "{:?}", b.kind());
            }
        }
    }
}
