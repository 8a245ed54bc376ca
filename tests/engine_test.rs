use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tempfile::TempDir;

use txseq::engines::sled::SledStore;
use txseq::sequence::{run_sequence, FailureKind, Operation};
use txseq::{LogStore, Statement, StoreError, TransactionalStore};

fn set(key: &str, value: &str) -> Statement {
    Statement::Set {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

fn data_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("txseq-data-"))
        .collect();
    names.sort();
    names
}

fn committed_values_survive<S, F>(open: F)
where
    S: TransactionalStore,
    F: Fn(&Path) -> txseq::Result<S>,
{
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    {
        let store = open(temp_dir.path()).unwrap();
        run_sequence(
            &store,
            &[
                Operation::new(set("user:1:age", "18"), 1),
                Operation::new(set("user:3:age", "30"), 1),
            ],
        )
        .unwrap();
        run_sequence(
            &store,
            &[
                Operation::update_one("user:1:age", "20"),
                Operation::delete_one("user:3:age"),
            ],
        )
        .unwrap();
    }

    let store = open(temp_dir.path()).unwrap();
    assert_eq!(store.get("user:1:age".to_owned()).unwrap(), Some("20".to_owned()));
    assert_eq!(store.get("user:3:age".to_owned()).unwrap(), None);
}

fn rolled_back_values_never_land<S, F>(open: F)
where
    S: TransactionalStore,
    F: Fn(&Path) -> txseq::Result<S>,
{
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    {
        let store = open(temp_dir.path()).unwrap();
        let failure = run_sequence(
            &store,
            &[
                Operation::new(set("user:1:age", "18"), 1),
                Operation::update_one("user:2:age", "20"),
            ],
        )
        .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::EffectMismatch);
        assert_eq!(store.get("user:1:age".to_owned()).unwrap(), None);
    }
    let store = open(temp_dir.path()).unwrap();
    assert_eq!(store.get("user:1:age".to_owned()).unwrap(), None);
}

#[test]
fn log_store_persists_commits() {
    committed_values_survive(|p| LogStore::open(p));
}

#[test]
fn sled_store_persists_commits() {
    committed_values_survive(|p| SledStore::open(p));
}

#[test]
fn log_store_discards_rollbacks() {
    rolled_back_values_never_land(|p| LogStore::open(p));
}

#[test]
fn sled_store_discards_rollbacks() {
    rolled_back_values_never_land(|p| SledStore::open(p));
}

#[test]
fn uncommitted_writes_are_invisible() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let store = LogStore::open(temp_dir.path()).unwrap();
    let mut txn = store.begin().unwrap();
    assert_eq!(store.execute(&mut txn, &set("key1", "value1")).unwrap(), 1);
    assert_eq!(store.get("key1".to_owned()).unwrap(), None);
    store.commit(txn).unwrap();
    assert_eq!(store.get("key1".to_owned()).unwrap(), Some("value1".to_owned()));
}

#[test]
fn torn_tail_is_ignored_on_replay() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    {
        let store = LogStore::open(temp_dir.path()).unwrap();
        run_sequence(&store, &[Operation::new(set("key1", "value1"), 1)]).unwrap();
    }
    let files = data_files(temp_dir.path());
    assert_eq!(files.len(), 1);
    {
        // a crash in the middle of the next commit.
        let mut file = OpenOptions::new()
            .append(true)
            .open(temp_dir.path().join(&files[0]))
            .unwrap();
        file.write_all(b"{\"put\":{\"txn\":99,\"key\":\"key1\",\"value\":\"value2\"}}\n{\"commit\":{\"tx")
            .unwrap();
    }

    let store = LogStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.get("key1".to_owned()).unwrap(), Some("value1".to_owned()));
    run_sequence(&store, &[Operation::update_one("key1", "value3")]).unwrap();
    drop(store);

    let store = LogStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.get("key1".to_owned()).unwrap(), Some("value3".to_owned()));
}

#[test]
fn compaction_keeps_live_keys_only() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let store = LogStore::open(temp_dir.path()).unwrap();
    for round in 0..50 {
        let operations: Vec<Operation> = (0..10)
            .map(|i| Operation::new(set(&format!("key{}", i), &format!("value{}", round)), 1))
            .collect();
        run_sequence(&store, &operations).unwrap();
    }
    run_sequence(&store, &[Operation::delete_one("key0")]).unwrap();
    let before = fs::metadata(temp_dir.path().join(&data_files(temp_dir.path())[0]))
        .unwrap()
        .len();

    store.compact().unwrap();
    let files = data_files(temp_dir.path());
    assert_eq!(files, vec!["txseq-data-2".to_owned()]);
    let after = fs::metadata(temp_dir.path().join(&files[0])).unwrap().len();
    assert!(after < before, "compaction must shrink the log ({} >= {})", after, before);

    drop(store);
    let store = LogStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.get("key0".to_owned()).unwrap(), None);
    for i in 1..10 {
        assert_eq!(
            store.get(format!("key{}", i)).unwrap(),
            Some("value49".to_owned())
        );
    }
}

#[test]
fn clones_share_the_log() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let store = LogStore::open(temp_dir.path()).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    run_sequence(
                        &store,
                        &[Operation::insert_one(format!("t{}-{}", t, i), "x")],
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    drop(store);

    let store = LogStore::open(temp_dir.path()).unwrap();
    for t in 0..4 {
        for i in 0..25 {
            assert_eq!(store.get(format!("t{}-{}", t, i)).unwrap(), Some("x".to_owned()));
        }
    }
}

#[test]
fn directory_belongs_to_one_engine() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    drop(LogStore::open(temp_dir.path()).unwrap());
    match SledStore::open(temp_dir.path()) {
        Err(StoreError::IllegalWorkingDirectory { expected, found }) => {
            assert_eq!(expected, "sled");
            assert_eq!(found, "log");
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("sled must refuse a log directory"),
    }
}

#[test]
fn insert_conflicts_with_committed_key() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let store = SledStore::open(temp_dir.path()).unwrap();
    run_sequence(&store, &[Operation::insert_one("user:1:name", "Paul")]).unwrap();
    let failure = run_sequence(&store, &[Operation::insert_one("user:1:name", "Pauline")])
        .unwrap_err();
    assert_eq!(failure.kind(), FailureKind::ExecutionError);
    assert_eq!(
        store.get("user:1:name".to_owned()).unwrap(),
        Some("Paul".to_owned())
    );
}

#[test]
fn failed_compaction_keeps_the_commit() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let store = LogStore::open(temp_dir.path()).unwrap();
    let big = "x".repeat(9 * 1024 * 1024);
    run_sequence(&store, &[Operation::new(set("big", &big), 1)]).unwrap();

    // the next generation file can't be created, so compaction fails.
    let blocker = temp_dir.path().join("txseq-data-2");
    fs::create_dir(&blocker).unwrap();
    let committed = run_sequence(&store, &[Operation::update_one("big", "small")]).unwrap();
    assert_eq!(committed.effects, vec![1]);
    assert_eq!(store.get("big".to_owned()).unwrap(), Some("small".to_owned()));
    drop(store);

    fs::remove_dir(&blocker).unwrap();
    let store = LogStore::open(temp_dir.path()).unwrap();
    assert_eq!(store.get("big".to_owned()).unwrap(), Some("small".to_owned()));
}
