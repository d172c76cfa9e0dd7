//! End-to-end tests that drive a real `git` repository the way the CLI
//! commands do internally: real commits, a real object store under
//! `.git/fat/objects`, no mocked filesystem or subprocess layer.

mod common;

use std::collections::HashSet;
use std::fs;

use git_fat_rs::error::GitFatError;
use git_fat_rs::opts::Command;
use git_fat_rs::scanner::Revs;
use git_fat_rs::{codec, filter, maintenance, reconcile, run, scanner, GitFat};

#[test]
fn init_writes_filter_config_and_is_idempotent() {
    let repo = common::init_repo();

    let code = run(&repo, Command::Init, std::io::empty(), std::io::sink()).unwrap();
    assert_eq!(code, 0);

    let (_, clean, _) = common::run_git(&repo, &["config", "--get", "filter.fat.clean"]);
    assert_eq!(clean.trim(), "git-fat filter-clean");
    let (_, smudge, _) = common::run_git(&repo, &["config", "--get", "filter.fat.smudge"]);
    assert_eq!(smudge.trim(), "git-fat filter-smudge");

    // Running init again must not error or duplicate the config entries.
    let code = run(&repo, Command::Init, std::io::empty(), std::io::sink()).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn filter_clean_then_filter_smudge_roundtrip_through_cli_dispatch() {
    let repo = common::init_repo();
    run(&repo, Command::Init, std::io::empty(), std::io::sink()).unwrap();

    let content = b"payload that stands in for a large binary asset".repeat(200);

    let mut placeholder = Vec::new();
    run(&repo, Command::FilterClean, content.as_slice(), &mut placeholder).unwrap();
    assert!(placeholder.starts_with(b"#$# git-fat "));

    let mut restored = Vec::new();
    run(&repo, Command::FilterSmudge, placeholder.as_slice(), &mut restored).unwrap();
    assert_eq!(restored, content);
}

#[test]
fn scanner_finds_committed_blob_and_gc_removes_the_uncommitted_one() {
    let repo = common::init_repo();
    let fat = GitFat::discover(&repo).unwrap();
    fat.setup().unwrap();

    let content = b"tracked asset".repeat(500);
    let mut placeholder = Vec::new();
    filter::clean(&fat.store, &fat.magic_lengths, fat.version, content.as_slice(), &mut placeholder).unwrap();
    let kept_digest = codec::try_decode(&placeholder).unwrap().digest;

    common::write_file(&repo, "big.bin", &placeholder);
    common::commit_all(&repo, "add big file");

    // A second blob admitted to the store but never committed to any ref.
    let mut orphan_placeholder = Vec::new();
    filter::clean(
        &fat.store,
        &fat.magic_lengths,
        fat.version,
        b"abandoned-branch content".as_slice(),
        &mut orphan_placeholder,
    )
    .unwrap();
    let garbage_digest = codec::try_decode(&orphan_placeholder).unwrap().digest;

    assert_eq!(fat.store.list().unwrap(), HashSet::from([kept_digest.clone(), garbage_digest.clone()]));

    let referenced = scanner::referenced_objects(&repo, &fat.magic_lengths, Revs::Rev("HEAD")).unwrap();
    assert_eq!(referenced, HashSet::from([kept_digest.clone()]));

    maintenance::gc(&repo, &fat.store, &fat.magic_lengths).unwrap();

    assert_eq!(fat.store.list().unwrap(), HashSet::from([kept_digest.clone()]));
    assert!(!fat.store.exists(&garbage_digest));
}

#[test]
fn verify_detects_corruption_via_cli_dispatch() {
    let repo = common::init_repo();
    let fat = GitFat::discover(&repo).unwrap();
    fat.setup().unwrap();

    let mut placeholder = Vec::new();
    filter::clean(&fat.store, &fat.magic_lengths, fat.version, b"clean bytes".as_slice(), &mut placeholder).unwrap();
    let digest = codec::try_decode(&placeholder).unwrap().digest;

    // A healthy store exits 0.
    let code = run(&repo, Command::Verify, std::io::empty(), std::io::sink()).unwrap();
    assert_eq!(code, 0);

    fs::write(fat.store.path(&digest), b"flipped a byte here").unwrap();

    let code = run(&repo, Command::Verify, std::io::empty(), std::io::sink()).unwrap();
    assert_eq!(code, 1);

    let err = maintenance::verify(&fat.store).unwrap_err();
    assert!(matches!(err, GitFatError::CorruptBlob { expected, .. } if expected == digest));
}

/// Wires `filter.fat.clean`/`filter.fat.smudge` to the binary this test
/// itself builds against (by absolute path, via `CARGO_BIN_EXE_git-fat`),
/// so that real `git` invocations of the filter actually run our code
/// instead of a literal `git-fat` that may not be on `PATH`.
fn configure_real_filters(repo: &std::path::Path) {
    let bin = env!("CARGO_BIN_EXE_git-fat");
    common::run_git(repo, &["config", "filter.fat.clean", &format!("'{}' filter-clean", bin)]);
    common::run_git(repo, &["config", "filter.fat.smudge", &format!("'{}' filter-smudge", bin)]);
    common::write_file(repo, ".gitattributes", b"big.bin filter=fat -text\n");
    common::run_git(repo, &["add", ".gitattributes"]);
    common::commit_all(repo, "track big.bin with git-fat");
}

#[test]
fn checkout_rematerializes_placeholder_and_bumps_mtime() {
    let repo = common::init_repo();
    let fat = GitFat::discover(&repo).unwrap();
    fat.setup().unwrap();
    configure_real_filters(&repo);

    // `git add` invokes our real clean filter binary: the working tree gets
    // the real content, the index gets the placeholder, and the blob lands
    // in the object store.
    let content = b"hello world, checked out".repeat(50);
    common::write_file(&repo, "big.bin", &content);
    common::commit_all(&repo, "add big file");
    assert_eq!(fs::read(repo.join("big.bin")).unwrap(), content);

    // Simulate the state right after a fresh clone on a machine that has
    // pulled history but not yet fetched the blob: overwrite the working
    // tree with the index's placeholder bytes, the raw content a smudge-less
    // checkout would have left behind.
    let (code, index_placeholder, _) = common::run_git(&repo, &["show", "HEAD:big.bin"]);
    assert_eq!(code, 0);
    let index_placeholder = index_placeholder.into_bytes();
    assert_ne!(index_placeholder, content, "index entry must be the placeholder, not real content");
    fs::write(repo.join("big.bin"), &index_placeholder).unwrap();

    let before = fs::symlink_metadata(repo.join("big.bin")).unwrap().modified().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    reconcile::checkout(&repo, &fat.store, &fat.magic_lengths, true).unwrap();

    let restored = fs::read(repo.join("big.bin")).unwrap();
    assert_eq!(restored, content);
    let after = fs::symlink_metadata(repo.join("big.bin")).unwrap().modified().unwrap();
    assert!(after > before);
}

#[test]
fn checkout_reports_missing_blob_without_failing() {
    let repo = common::init_repo();
    let fat = GitFat::discover(&repo).unwrap();
    fat.setup().unwrap();

    let placeholder = codec::encode(fat.version, "0000000000000000000000000000000000dead", 4);
    common::write_file(&repo, "missing.bin", &placeholder);
    common::commit_all(&repo, "add placeholder for a blob we never fetched");

    // Must not error even though the blob was never admitted to the store.
    reconcile::checkout(&repo, &fat.store, &fat.magic_lengths, true).unwrap();
    let still_placeholder = fs::read(repo.join("missing.bin")).unwrap();
    assert_eq!(still_placeholder, placeholder);
}
