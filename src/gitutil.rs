//! Host-VCS adapter (C8): thin, typed wrappers around the git plumbing
//! commands the rest of this crate drives. Every function here propagates a
//! non-zero exit as an `io::Error` and returns raw bytes where the command's
//! stdout is not guaranteed to be valid UTF-8 — no locale translation, no
//! line-ending rewriting.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Resolves `--git-dir`, made absolute relative to `repo` if git reports a
/// relative path (as it does for the common non-bare case, `.git`).
pub fn git_dir(repo: &Path) -> io::Result<PathBuf> {
    let out = run(repo, &["rev-parse", "--git-dir"])?;
    let s = String::from_utf8_lossy(&out).trim().to_string();
    let p = PathBuf::from(&s);
    if p.is_absolute() {
        Ok(p)
    } else {
        Ok(repo.join(p))
    }
}

/// Resolves `--show-toplevel`, the working-tree root.
pub fn git_root(repo: &Path) -> io::Result<PathBuf> {
    let out = run(repo, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(String::from_utf8_lossy(&out).trim()))
}

pub fn rev_parse(repo: &Path, rev: &str) -> io::Result<String> {
    let out = run(repo, &["rev-parse", rev])?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// `git config --get <key>`, or `--file <file> --get <key>` when `file` is
/// set. Returns `Ok(None)` when the key is unset rather than erroring, since
/// that is the normal "not configured" outcome, not a failure.
///
/// When `file` is set and the scoped lookup misses, falls back to a
/// file-less `git config --get <key>` so a key left in the user's normal git
/// config (rather than the tracked file) is still honored, matching the
/// original's `gitconfig_get`.
pub fn config_get(repo: &Path, key: &str, file: Option<&Path>) -> io::Result<Option<String>> {
    let scoped = config_get_one(repo, key, file)?;
    if scoped.is_some() || file.is_none() {
        return Ok(scoped);
    }
    config_get_one(repo, key, None)
}

fn config_get_one(repo: &Path, key: &str, file: Option<&Path>) -> io::Result<Option<String>> {
    let mut args: Vec<String> = vec!["config".into(), "--get".into()];
    if let Some(f) = file {
        args.push("--file".into());
        args.push(f.to_string_lossy().into_owned());
    }
    args.push(key.into());
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(&arg_refs)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Ok(None);
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

pub fn config_set(repo: &Path, key: &str, value: &str) -> io::Result<()> {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("config")
        .arg(key)
        .arg(value)
        .status()?;
    if !status.success() {
        return Err(command_failed("git config", status.code()));
    }
    Ok(())
}

/// `git ls-files -z` with optional path-pattern limiters, split on the NUL
/// delimiters git writes between entries.
pub fn ls_files_z(repo: &Path, patterns: &[String]) -> io::Result<Vec<String>> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).arg("ls-files").arg("-z");
    if patterns.is_empty() {
        cmd.arg(".");
    } else {
        cmd.args(patterns);
    }
    let output = cmd.stdout(Stdio::piped()).stderr(Stdio::inherit()).output()?;
    if !output.status.success() {
        return Err(command_failed("git ls-files -z", output.status.code()));
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .split('\0')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Spawns `git rev-list --objects <rev>` (or `--all` when `all` is set),
/// with stdout piped for a downstream stage to consume.
pub fn spawn_rev_list_objects(repo: &Path, rev: &str) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("rev-list")
        .arg("--objects")
        .arg(rev)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// Spawns `git rev-list <rev>` with no `--objects`, for driving `diff-tree
/// --stdin` (C7 find).
pub fn spawn_rev_list(repo: &Path, rev: &str) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("rev-list")
        .arg(rev)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// Spawns `git cat-file --batch-check` with stdin/stdout piped.
pub fn spawn_cat_file_batch_check(repo: &Path) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("cat-file")
        .arg("--batch-check")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// Spawns `git cat-file --batch` with stdin/stdout piped.
pub fn spawn_cat_file_batch(repo: &Path) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("cat-file")
        .arg("--batch")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// `git cat-file blob <hash>`, read fully into memory. Used for one-shot
/// lookups (e.g. the `.gitattributes` blob in index-filter) rather than
/// the streaming batch protocol.
pub fn cat_file_blob(repo: &Path, hash: &str) -> io::Result<Vec<u8>> {
    run(repo, &["cat-file", "blob", hash])
}

/// Spawns `git diff-tree --root --no-renames --no-commit-id
/// --diff-filter=AMCR -r --stdin -z`, reading revisions from `stdin_from`.
pub fn spawn_diff_tree_stdin(repo: &Path, stdin_from: Stdio) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("diff-tree")
        .arg("--root")
        .arg("--no-renames")
        .arg("--no-commit-id")
        .arg("--diff-filter=AMCR")
        .arg("-r")
        .arg("--stdin")
        .arg("-z")
        .stdin(stdin_from)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// `git ls-files -s`, one `<mode> <hash> <stage>\t<path>` line per entry.
pub fn spawn_ls_files_stage(repo: &Path) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("ls-files")
        .arg("-s")
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// Spawns `git update-index --index-info`, stdin piped for the caller to
/// write `<mode> <hash> <stage>\t<path>\n` lines to.
pub fn spawn_update_index_info(repo: &Path) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("update-index")
        .arg("--index-info")
        .stdin(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

pub fn checkout_index(repo: &Path, path: &str) -> io::Result<()> {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("checkout-index")
        .arg("--index")
        .arg("--force")
        .arg(path)
        .status()?;
    if !status.success() {
        return Err(command_failed("git checkout-index", status.code()));
    }
    Ok(())
}

/// Spawns `git hash-object -w --stdin`, stdin/stdout piped.
pub fn spawn_hash_object_w_stdin(repo: &Path) -> io::Result<Child> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("hash-object")
        .arg("-w")
        .arg("--stdin")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// Writes `content` to a fresh `git hash-object -w --stdin` and returns the
/// resulting object hash, trimmed.
pub fn hash_object_w_stdin(repo: &Path, content: &[u8]) -> io::Result<String> {
    let mut child = spawn_hash_object_w_stdin(repo)?;
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(content)?;
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(command_failed("git hash-object", output.status.code()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn run(repo: &Path, args: &[&str]) -> io::Result<Vec<u8>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()?;
    if !output.status.success() {
        return Err(command_failed(&format!("git {}", args.join(" ")), output.status.code()));
    }
    Ok(output.stdout)
}

fn command_failed(command: &str, code: Option<i32>) -> io::Error {
    crate::error::GitFatError::ChildProcessFailure {
        command: command.to_string(),
        status: code.unwrap_or(-1),
    }
    .into()
}
