// tests/hashing.rs

mod common;

use std::sync::Arc;

use reprodag::errors::ReprodagError;
use reprodag::fs::mock::MockFileSystem;
use reprodag::fs::RealFileSystem;
use reprodag::hash::{compute_aggregate_hash, hash_cmd, ContentHasher, HashCache, DIR_SUFFIX};
use tempfile::tempdir;

use crate::common::write_file;

#[test]
fn directory_hash_ignores_creation_order() {
    let first = Arc::new(MockFileSystem::new());
    first.add_file("/repo/data/b.txt", "b");
    first.add_file("/repo/data/a.txt", "a");
    first.add_file("/repo/data/sub/c.txt", "c");

    let second = Arc::new(MockFileSystem::new());
    second.add_file("/repo/data/sub/c.txt", "c");
    second.add_file("/repo/data/a.txt", "a");
    second.add_file("/repo/data/b.txt", "b");

    let h1 = ContentHasher::new(first, "/repo").hash("data").unwrap();
    let h2 = ContentHasher::new(second, "/repo").hash("data").unwrap();
    assert_eq!(h1, h2);
    assert!(h1.ends_with(DIR_SUFFIX));
}

#[test]
fn directory_hash_changes_with_contents_and_names() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/repo/data/a.txt", "a");
    let hasher = ContentHasher::new(fs.clone(), "/repo");
    let before = hasher.hash("data").unwrap();

    fs.add_file("/repo/data/a.txt", "A");
    let edited = hasher.hash("data").unwrap();
    assert_ne!(before, edited);

    fs.add_file("/repo/data/a.txt", "a");
    assert_eq!(hasher.hash("data").unwrap(), before);

    fs.add_file("/repo/data/extra.txt", "");
    assert_ne!(hasher.hash("data").unwrap(), before);
}

#[test]
fn file_and_directory_digests_never_collide() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/repo/file.txt", "x");
    fs.add_file("/repo/dir/file.txt", "x");
    let hasher = ContentHasher::new(fs, "/repo");

    let file = hasher.hash("file.txt").unwrap();
    let dir = hasher.hash("dir").unwrap();
    assert!(!file.ends_with(DIR_SUFFIX));
    assert_ne!(file, dir);
    assert_eq!(file, blake3::hash(b"x").to_hex().to_string());
}

#[test]
fn missing_path_is_reported() {
    let fs = Arc::new(MockFileSystem::new());
    let hasher = ContentHasher::new(fs, "/repo");
    assert!(matches!(
        hasher.hash("nope.txt"),
        Err(ReprodagError::MissingPath(_))
    ));
}

#[test]
fn on_disk_hash_matches_in_memory_hash() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "data/a.txt", "alpha");
    write_file(dir.path(), "data/nested/b.txt", "beta");

    let mock = Arc::new(MockFileSystem::new());
    mock.add_file("/repo/data/a.txt", "alpha");
    mock.add_file("/repo/data/nested/b.txt", "beta");

    let real = ContentHasher::new(Arc::new(RealFileSystem), dir.path()).hash("data").unwrap();
    let fake = ContentHasher::new(mock, "/repo").hash("data").unwrap();
    assert_eq!(real, fake);
}

#[test]
fn aggregate_hash_depends_on_pairs() {
    let a = compute_aggregate_hash(&[("a".into(), "1".into()), ("b".into(), "2".into())]);
    let b = compute_aggregate_hash(&[("a".into(), "2".into()), ("b".into(), "1".into())]);
    assert_ne!(a, b);
    assert_ne!(hash_cmd("echo a"), hash_cmd("echo b"));
}

#[test]
fn cache_serves_stale_digest_until_invalidated() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/repo/out/a.txt", "one");
    let hasher = ContentHasher::new(fs.clone(), "/repo");
    let mut cache = HashCache::new();

    let first = hasher.hash_cached("out", &mut cache).unwrap();
    assert_eq!(cache.len(), 1);

    fs.add_file("/repo/out/a.txt", "two");
    assert_eq!(hasher.hash_cached("out", &mut cache).unwrap(), first);

    cache.invalidate(&hasher.resolve("out"));
    assert!(cache.is_empty());
    assert_ne!(hasher.hash_cached("out", &mut cache).unwrap(), first);
}

#[test]
fn invalidating_one_file_keeps_its_siblings_cached() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/repo/data/a.txt", "one");
    fs.add_file("/repo/data/b.txt", "b");
    let hasher = ContentHasher::new(fs.clone(), "/repo");
    let mut cache = HashCache::new();

    let dir = hasher.hash_cached("data", &mut cache).unwrap();
    hasher.hash_cached("data/b.txt", &mut cache).unwrap();

    fs.add_file("/repo/data/a.txt", "two");
    cache.invalidate(&hasher.resolve("data/a.txt"));

    assert_eq!(cache.len(), 1);
    assert_ne!(hasher.hash_cached("data", &mut cache).unwrap(), dir);
}
