//! Property tests for the persisted stores: any valid document survives a
//! save/load cycle unchanged, and saving what was loaded changes nothing.

use chrono::{TimeZone, Utc};
use foreman_core::{StateDocument, TaskRecord, Timestamp, WorkerInstance, WorkerStatus};
use foreman_storage::{LockStore, StateStore};
use proptest::prelude::*;
use tempfile::tempdir;

fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0i64..2_000_000_000i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn worker_strategy() -> impl Strategy<Value = WorkerInstance> {
    (
        "[a-z]{3,8}_[0-9a-f]{6}_[0-9]{1,5}",
        proptest::option::of("[ -~]{1,40}"),
        proptest::collection::vec("[a-z]{1,12}\\.rs", 0..4),
        any::<bool>(),
        proptest::option::of("[a-z0-9_]{1,16}"),
        proptest::option::of(1u32..99_999),
        timestamp_strategy(),
        proptest::option::of(timestamp_strategy()),
    )
        .prop_map(
            |(id, task, files, completed, session, pid, started_at, heartbeat)| {
                let mut worker = WorkerInstance::new(id, started_at);
                worker.task = task;
                for file in files {
                    worker.claim_file(file);
                }
                worker.session_ref = session;
                worker.process_ref = pid;
                worker.last_heartbeat = heartbeat;
                if completed {
                    worker.status = WorkerStatus::Completed;
                    worker.completed_at = Some(started_at);
                }
                worker
            },
        )
}

fn document_strategy() -> impl Strategy<Value = StateDocument> {
    (
        proptest::collection::vec(worker_strategy(), 0..5),
        proptest::collection::vec(("[a-z]{3,8}_[0-9]{1,4}", "[ -~]{1,40}", timestamp_strategy()), 0..4),
        timestamp_strategy(),
    )
        .prop_map(|(workers, tasks, started_at)| {
            let mut doc = StateDocument::new(started_at);
            for worker in workers {
                doc.instances.insert(worker.id.clone(), worker);
            }
            for (instance, description, at) in tasks {
                doc.record_task(TaskRecord::new(instance, description, at));
            }
            doc
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn state_document_roundtrips_through_store(doc in document_strategy()) {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        store.save(&doc).unwrap();
        let loaded = store.load().unwrap();
        prop_assert_eq!(&loaded, &doc);

        // save(load()) is byte-stable.
        let before = std::fs::read_to_string(store.path()).unwrap();
        store.save(&loaded).unwrap();
        let after = std::fs::read_to_string(store.path()).unwrap();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn lock_records_roundtrip_through_store(
        file in "[a-z/]{1,24}\\.rs",
        instance in "[a-z]{3,8}_[0-9a-f]{6}_[0-9]{1,5}",
        at in timestamp_strategy(),
    ) {
        let dir = tempdir().unwrap();
        let store = LockStore::new(dir.path().join("locks"));

        let written = store.acquire(&file, &instance, at).unwrap();
        let read = store.peek(&file).unwrap().unwrap();
        prop_assert_eq!(read, written);
    }
}
