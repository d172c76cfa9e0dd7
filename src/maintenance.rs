//! Maintenance operations (C7): garbage collection, integrity verification,
//! large-blob discovery, and the history-rewrite index filter.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::codec::{self, MagicLengths, Version};
use crate::error::{GitFatError, Result};
use crate::filter;
use crate::gitutil;
use crate::scanner::{self, Revs};
use crate::store::Store;

/// Removes every blob in `store` not reachable from HEAD (or `--all`).
/// Idempotent: a second run finds nothing left to remove.
pub fn gc(repo: &Path, store: &Store, magic_lengths: &MagicLengths) -> io::Result<()> {
    let referenced = scanner::referenced_objects(repo, magic_lengths, Revs::Rev("HEAD"))?;
    let catalog = store.list()?;
    let mut garbage: Vec<&String> = catalog.difference(&referenced).collect();
    garbage.sort();

    println!("Unreferenced objects to remove: {}", garbage.len());
    for digest in garbage {
        let size = fs::metadata(store.path(digest))?.len();
        println!("{:10} {}", size, digest);
        store.remove(digest)?;
    }
    Ok(())
}

/// Recomputes the hash of every stored blob and reports any whose contents
/// no longer match their name.
pub fn verify(store: &Store) -> Result<()> {
    let mut corrupted = Vec::new();
    let mut digests: Vec<String> = store.list()?.into_iter().collect();
    digests.sort();

    for digest in digests {
        let mut file = store.read(&digest)?;
        let mut hasher = Sha1::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let actual = hex::encode(hasher.finalize());
        if actual != digest {
            corrupted.push((digest, actual));
        }
    }

    if !corrupted.is_empty() {
        println!("Corrupted objects: {}", corrupted.len());
        for (expected, actual) in &corrupted {
            println!("{} data hash is {}", expected, actual);
        }
        let (expected, actual) = corrupted.into_iter().next().unwrap();
        return Err(GitFatError::CorruptBlob { expected, actual });
    }
    Ok(())
}

/// Scans all of history for blobs bigger than `threshold_bytes`, then
/// correlates them with every path they were ever committed under, printing
/// one `.gitattributes`-shaped line per path, largest first.
pub fn find(repo: &Path, threshold_bytes: u64) -> io::Result<()> {
    let blob_sizes = gen_large_blobs(repo, threshold_bytes)?;

    let mut rev_list = gitutil::spawn_rev_list(repo, "--all")?;
    let rev_list_stdout = rev_list.stdout.take().expect("piped");
    let mut diff_tree =
        gitutil::spawn_diff_tree_stdin(repo, std::process::Stdio::from(rev_list_stdout))?;
    let diff_tree_stdout = diff_tree.stdout.take().expect("piped");

    let mut path_sizes: HashMap<String, Vec<u64>> = HashMap::new();
    for (blob_hash, path) in read_diff_tree_z(diff_tree_stdout)? {
        if let Some(&size) = blob_sizes.get(&blob_hash) {
            path_sizes.entry(path).or_default().push(size);
        }
    }

    rev_list.wait()?;
    diff_tree.wait()?;

    let max_len = path_sizes.keys().map(|p| p.len()).max().unwrap_or(0);
    let mut entries: Vec<(&String, &Vec<u64>)> = path_sizes.iter().collect();
    entries.sort_by_key(|(_, sizes)| std::cmp::Reverse(*sizes.iter().max().unwrap()));
    for (path, sizes) in entries {
        println!(
            "{:width$} filter=fat -text # {:10} {}",
            path,
            sizes.iter().max().unwrap(),
            sizes.len(),
            width = max_len
        );
    }
    Ok(())
}

fn gen_large_blobs(repo: &Path, threshold: u64) -> io::Result<HashMap<String, u64>> {
    let mut rev_list = gitutil::spawn_rev_list_objects(repo, "--all")?;
    let mut batch_check = gitutil::spawn_cat_file_batch_check(repo)?;

    let rev_list_stdout = rev_list.stdout.take().expect("piped");
    let batch_check_stdin = batch_check.stdin.take().expect("piped");
    let cut_thread = std::thread::spawn(move || -> io::Result<()> {
        let reader = BufReader::new(rev_list_stdout);
        let mut out = batch_check_stdin;
        for line in reader.lines() {
            let line = line?;
            if line.len() < 40 {
                continue;
            }
            out.write_all(line[..40].as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    });

    let batch_check_stdout = batch_check.stdout.take().expect("piped");
    let mut blobs = HashMap::new();
    for line in BufReader::new(batch_check_stdout).lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(kind), Some(size)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if kind != "blob" {
            continue;
        }
        let Ok(size) = size.parse::<u64>() else {
            continue;
        };
        if size > threshold {
            blobs.insert(hash.to_string(), size);
        }
    }

    let cut_result = cut_thread.join().unwrap_or(Ok(()));
    rev_list.wait()?;
    batch_check.wait()?;
    cut_result?;
    Ok(blobs)
}

/// Reads `diff-tree -z --diff-filter=AMCR --no-renames --root` output,
/// yielding `(new_blob_hash, path)` for each changed entry.
fn read_diff_tree_z<R: Read>(input: R) -> io::Result<Vec<(String, String)>> {
    let mut reader = BufReader::new(input);
    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = read_until_nul(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        let record = String::from_utf8_lossy(&buf);
        // Records look like ":100644 100644 <old> <new> M" for a changed
        // blob, followed by a second NUL-delimited field: the path.
        if !record.starts_with(':') {
            continue;
        }
        let new_hash = record.split_whitespace().nth(3).map(str::to_string);

        buf.clear();
        let n2 = read_until_nul(&mut reader, &mut buf)?;
        if n2 == 0 {
            break;
        }
        let path = String::from_utf8_lossy(&buf).into_owned();

        if let Some(new_hash) = new_hash {
            out.push((new_hash, path));
        }
    }
    Ok(out)
}

fn read_until_nul<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    reader.read_until(0, buf)?;
    if buf.last() == Some(&0) {
        buf.pop();
    }
    Ok(buf.len())
}

/// Rewrites every blob named in `list_file` (one path per line) through the
/// clean filter, staging the result via `update-index --index-info`.
/// Symlinks are left untouched. Mappings from pre-rewrite to post-rewrite
/// blob hash are memoized under `<git-dir>/fat/index-filter/` so re-running
/// the same history rewrite doesn't redo the work.
pub fn index_filter(
    repo: &Path,
    store: &Store,
    magic_lengths: &MagicLengths,
    version: Version,
    list_file: &Path,
    manage_gitattributes: bool,
) -> io::Result<()> {
    let wanted: std::collections::HashSet<String> = fs::read_to_string(list_file)?
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let git_dir = gitutil::git_dir(repo)?;
    let cache_dir = git_dir.join("fat").join("index-filter");
    fs::create_dir_all(&cache_dir)?;

    let mut ls_files = gitutil::spawn_ls_files_stage(repo)?;
    let mut update_index = gitutil::spawn_update_index_info(repo)?;
    let mut update_index_stdin = update_index.stdin.take().expect("piped");

    let stdout = ls_files.stdout.take().expect("piped");
    for line in BufReader::new(stdout).lines() {
        let line = line?;
        let Some((mode, rest)) = line.split_once(' ') else { continue };
        let Some((blob_hash, rest)) = rest.split_once(' ') else { continue };
        let Some((stage, filename)) = rest.split_once('\t') else { continue };
        if !wanted.contains(filename) {
            continue;
        }
        if mode == "120000" {
            continue; // symlinks are not managed
        }

        let cleaned = rewrite_blob(repo, store, magic_lengths, version, &cache_dir, blob_hash)?;
        writeln!(update_index_stdin, "{} {} {}\t{}", mode, cleaned, stage, filename)?;
    }

    if manage_gitattributes {
        rewrite_gitattributes(repo, &wanted, &mut update_index_stdin)?;
    }

    drop(update_index_stdin);
    ls_files.wait()?;
    update_index.wait()?;
    Ok(())
}

fn rewrite_blob(
    repo: &Path,
    store: &Store,
    magic_lengths: &MagicLengths,
    version: Version,
    cache_dir: &Path,
    blob_hash: &str,
) -> io::Result<String> {
    let cache_file = cache_dir.join(blob_hash);
    if let Ok(cached) = fs::read_to_string(&cache_file) {
        return Ok(cached.trim().to_string());
    }

    let content = gitutil::cat_file_blob(repo, blob_hash)?;
    let mut placeholder = Vec::new();
    filter::clean(store, magic_lengths, version, content.as_slice(), &mut placeholder)?;
    let new_hash = gitutil::hash_object_w_stdin(repo, &placeholder)?;

    fs::write(&cache_file, format!("{}\n", new_hash))?;
    Ok(new_hash)
}

fn rewrite_gitattributes(
    repo: &Path,
    wanted: &std::collections::HashSet<String>,
    update_index_stdin: &mut impl Write,
) -> io::Result<()> {
    let (mode, stage, mut lines) = match indexed_gitattributes(repo)? {
        Some((mode, blob_hash, stage)) => {
            let body = gitutil::cat_file_blob(repo, &blob_hash)?;
            let lines = String::from_utf8_lossy(&body).lines().map(str::to_string).collect();
            (mode, stage, lines)
        }
        None => ("100644".to_string(), "0".to_string(), Vec::new()),
    };

    let mut filenames: Vec<&String> = wanted.iter().collect();
    filenames.sort();
    for filename in filenames {
        lines.push(format!("{} filter=fat -text", filename));
    }

    let mut joined = lines.join("\n");
    joined.push('\n');
    let new_hash = gitutil::hash_object_w_stdin(repo, joined.as_bytes())?;
    writeln!(update_index_stdin, "{} {} {}\t.gitattributes", mode, new_hash, stage)?;
    Ok(())
}

/// Returns `(mode, blob_hash, stage)` for the currently indexed
/// `.gitattributes`, or `None` if it isn't tracked yet.
fn indexed_gitattributes(repo: &Path) -> io::Result<Option<(String, String, String)>> {
    let mut ls_files = gitutil::spawn_ls_files_stage(repo)?;
    let stdout = ls_files.stdout.take().expect("piped");
    let mut found = None;
    for line in BufReader::new(stdout).lines() {
        let line = line?;
        let Some((mode, rest)) = line.split_once(' ') else { continue };
        let Some((blob_hash, rest)) = rest.split_once(' ') else { continue };
        let Some((stage, filename)) = rest.split_once('\t') else { continue };
        if filename == ".gitattributes" {
            found = Some((mode.to_string(), blob_hash.to_string(), stage.to_string()));
        }
    }
    ls_files.wait()?;
    Ok(found)
}
