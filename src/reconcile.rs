//! Working-tree reconciler (C5): finds placeholder files still sitting in
//! the working tree and re-materializes them once their blob is local.

use std::fs;
use std::io;
use std::path::Path;

use crate::codec::{self, MagicLengths};
use crate::gitutil;
use crate::store::Store;

/// A tracked file still in placeholder form.
#[derive(Debug, Clone)]
pub struct Orphan {
    pub digest: String,
    pub path: String,
}

/// Enumerates tracked files (optionally limited to `patterns`) that are
/// still placeholders rather than real content.
///
/// Performs a fast `lstat`-size check before reading a file's contents, so
/// that the common case of "most tracked files are not managed by git-fat"
/// costs one syscall rather than a read.
pub fn orphan_files(
    repo: &Path,
    magic_lengths: &MagicLengths,
    patterns: &[String],
) -> io::Result<Vec<Orphan>> {
    let mut out = Vec::new();
    for rel_path in gitutil::ls_files_z(repo, patterns)? {
        let abs_path = repo.join(&rel_path);
        let meta = match fs::symlink_metadata(&abs_path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let len = meta.len() as usize;
        if len != magic_lengths.v1 && len != magic_lengths.v2 {
            continue;
        }
        let contents = match fs::read(&abs_path) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if let Some(decoded) = codec::try_decode(&contents) {
            out.push(Orphan { digest: decoded.digest, path: rel_path });
        }
    }
    Ok(out)
}

/// For every orphan whose blob is present in `store`, bumps its mtime one
/// second past its current value (defeating the host VCS's stat cache) and
/// re-smudges it via `checkout-index`. When `show_missing` is set, orphans
/// whose blob is absent are reported rather than silently skipped.
pub fn checkout(
    repo: &Path,
    store: &Store,
    magic_lengths: &MagicLengths,
    show_missing: bool,
) -> io::Result<()> {
    for orphan in orphan_files(repo, magic_lengths, &[])? {
        if store.exists(&orphan.digest) {
            bump_mtime(&repo.join(&orphan.path))?;
            gitutil::checkout_index(repo, &orphan.path)?;
        } else if show_missing {
            println!("Data unavailable: {} {}", orphan.digest, orphan.path);
        }
    }
    Ok(())
}

/// Sets `path`'s mtime to its current mtime plus one second, preserving
/// atime. A plain "touch" (set mtime to now) is not enough: a checkout and a
/// git-fat checkout that land within the same wall-clock second would leave
/// the stat cache unchanged.
fn bump_mtime(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    let atime = filetime::FileTime::from_last_access_time(&meta);
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    let bumped = filetime::FileTime::from_unix_time(
        mtime.seconds() + 1,
        mtime.nanoseconds(),
    );
    filetime::set_file_times(path, atime, bumped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Version;
    use crate::filter;
    use std::process::Command;
    use std::time::Duration;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        Command::new("git").arg("init").current_dir(dir.path()).status().unwrap();
        Command::new("git").args(["config", "user.name", "Test"]).current_dir(dir.path()).status().unwrap();
        Command::new("git").args(["config", "user.email", "t@example.com"]).current_dir(dir.path()).status().unwrap();
        dir
    }

    #[test]
    fn orphan_files_finds_placeholder_and_skips_plain_files() {
        let repo = init_repo();
        let lens = MagicLengths::compute();
        let digest = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
        let placeholder = codec::encode(Version::V2, digest, 11);
        fs::write(repo.path().join("big.bin"), &placeholder).unwrap();
        fs::write(repo.path().join("plain.txt"), "just text").unwrap();
        Command::new("git").args(["add", "-A"]).current_dir(repo.path()).status().unwrap();

        let orphans = orphan_files(repo.path(), &lens, &[]).unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].digest, digest);
        assert_eq!(orphans[0].path, "big.bin");
    }

    #[test]
    fn checkout_restores_present_blob_and_bumps_mtime() {
        let repo = init_repo();
        let lens = MagicLengths::compute();
        let store = Store::new(repo.path().join(".git/fat/objects"));
        store.setup().unwrap();

        let mut placeholder = Vec::new();
        filter::clean(&store, &lens, Version::V2, "hello world".as_bytes(), &mut placeholder).unwrap();
        fs::write(repo.path().join("big.bin"), &placeholder).unwrap();
        Command::new("git").args(["add", "-A"]).current_dir(repo.path()).status().unwrap();
        Command::new("git").args(["commit", "-q", "-m", "add"]).current_dir(repo.path()).status().unwrap();

        let before = fs::metadata(repo.path().join("big.bin")).unwrap().modified().unwrap();
        std::thread::sleep(Duration::from_millis(10));

        checkout(repo.path(), &store, &lens, true).unwrap();

        let after_meta = fs::symlink_metadata(repo.path().join("big.bin")).unwrap();
        let after = after_meta.modified().unwrap();
        assert!(after > before);
    }
}
