// tests/lock_store.rs

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use reprodag::fs::RealFileSystem;
use reprodag::lock::{FileLockStore, LockEntry, LockStore, MemoryLockStore};
use tempfile::tempdir;

use crate::common::LOCK_FILE;

fn entry(cmd_hash: &str, out_digest: &str) -> LockEntry {
    LockEntry {
        cmd_hash: cmd_hash.to_string(),
        deps: BTreeMap::from([("data.csv".to_string(), "d".to_string())]),
        params: BTreeMap::from([("train.lr".to_string(), toml::Value::Float(0.01))]),
        outs: BTreeMap::from([("model.bin".to_string(), out_digest.to_string())]),
    }
}

/// The lines of the `[stage.<name>]` table and its sub-tables.
fn stage_block(text: &str, name: &str) -> String {
    let own = format!("[stage.{name}]");
    let nested = format!("[stage.{name}.");
    let mut inside = false;
    let mut lines = Vec::new();
    for line in text.lines() {
        if line.starts_with('[') {
            inside = line.starts_with(&own) || line.starts_with(&nested);
        }
        if inside && !line.trim().is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

#[test]
fn put_rewrites_only_the_given_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(LOCK_FILE);
    let mut store = FileLockStore::new(Arc::new(RealFileSystem), &path);

    store.put("prepare", entry("p", "1")).unwrap();
    store.put("train", entry("t", "1")).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    store.put("train", entry("t", "2")).unwrap();
    let after = std::fs::read_to_string(&path).unwrap();

    assert_ne!(before, after);
    assert_eq!(stage_block(&before, "prepare"), stage_block(&after, "prepare"));
    assert!(!stage_block(&after, "prepare").is_empty());
    assert_eq!(store.get("train").unwrap(), Some(entry("t", "2")));
}

#[test]
fn rendering_is_deterministic() {
    let dir = tempdir().unwrap();
    let fs = Arc::new(RealFileSystem);

    let a = dir.path().join("a.lock");
    let b = dir.path().join("b.lock");
    let mut first = FileLockStore::new(fs.clone(), &a);
    let mut second = FileLockStore::new(fs, &b);

    first.put("x", entry("1", "1")).unwrap();
    first.put("y", entry("2", "2")).unwrap();
    second.put("y", entry("2", "2")).unwrap();
    second.put("x", entry("1", "1")).unwrap();

    assert_eq!(
        std::fs::read_to_string(a).unwrap(),
        std::fs::read_to_string(b).unwrap()
    );
}

#[test]
fn lock_file_records_version_and_never_annotations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(LOCK_FILE);
    let mut store = FileLockStore::new(Arc::new(RealFileSystem), &path);
    store.put("train", entry("t", "1")).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("version = 1"));
    assert!(!text.contains("props"));

    let parsed: toml::Table = text.parse().unwrap();
    assert!(parsed["stage"]["train"].get("cmd_hash").is_some());
}

#[test]
fn missing_lock_reads_empty_and_is_not_created_by_remove_or_prune() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(LOCK_FILE);
    let mut store = FileLockStore::new(Arc::new(RealFileSystem), &path);

    assert!(store.get("train").unwrap().is_none());
    assert!(!store.remove("train").unwrap());
    assert!(store.prune(&["train".to_string()]).unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn memory_store_behaves_like_file_store() {
    let mut store = MemoryLockStore::new();
    store.put("a", entry("1", "1")).unwrap();
    store.put("b", entry("2", "2")).unwrap();

    assert!(store.remove("a").unwrap());
    assert!(!store.remove("a").unwrap());
    assert_eq!(store.prune(&[]).unwrap(), vec!["b".to_string()]);
    assert!(store.entries().is_empty());
}
