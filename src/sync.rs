//! Sync driver (C6): computes push/pull sets from the object store and the
//! graph scanner, and drives an external copy tool (rsync) over a
//! NUL-delimited file list.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::codec::MagicLengths;
use crate::git_config::RsyncConfig;
use crate::reconcile;
use crate::scanner::{self, Revs};
use crate::store::Store;

/// Builds the rsync invocation for `push` (when `push` is true) or `pull`.
/// Matches the original tool's argument shape byte for byte: `rsync
/// --progress --ignore-existing --from0 --files-from=- [--rsh=ssh ...]
/// [options...] <src>/ <dst>/`.
fn build_rsync_command(store: &Store, cfg: &RsyncConfig, push: bool) -> Command {
    let mut cmd = Command::new("rsync");
    cmd.arg("--progress")
        .arg("--ignore-existing")
        .arg("--from0")
        .arg("--files-from=-");

    let mut rsh_opts = String::new();
    if let Some(user) = &cfg.ssh_user {
        rsh_opts.push_str(" -l ");
        rsh_opts.push_str(user);
    }
    if let Some(port) = &cfg.ssh_port {
        rsh_opts.push_str(" -p ");
        rsh_opts.push_str(port);
    }
    if !rsh_opts.is_empty() {
        cmd.arg(format!("--rsh=ssh{}", rsh_opts));
    }
    if let Some(options) = &cfg.options {
        for tok in options.split(' ') {
            if !tok.is_empty() {
                cmd.arg(tok);
            }
        }
    }

    let objdir = format!("{}/", store.dir().display());
    let remote = format!("{}/", cfg.remote);
    if push {
        cmd.arg(objdir).arg(remote);
    } else {
        cmd.arg(remote).arg(objdir);
    }
    cmd
}

fn run_copy_tool(mut cmd: Command, digests: &[String]) -> io::Result<i32> {
    cmd.stdin(Stdio::piped());
    let mut child = cmd.spawn()?;
    {
        let mut stdin = child.stdin.take().expect("piped");
        let joined = digests.join("\0");
        stdin.write_all(joined.as_bytes())?;
    }
    let status = child.wait()?;
    Ok(status.code().unwrap_or(1))
}

/// Pushes every locally-stored blob that is referenced by the selected
/// revisions (HEAD's ancestry, or the whole reflog when `all`).
pub fn push(
    repo: &Path,
    store: &Store,
    magic_lengths: &MagicLengths,
    cfg: &RsyncConfig,
    all: bool,
) -> io::Result<i32> {
    let revs = if all { Revs::All } else { Revs::Rev("HEAD") };
    let referenced = scanner::referenced_objects(repo, magic_lengths, revs)?;
    let catalog = store.list()?;
    let mut files: Vec<String> = referenced.intersection(&catalog).cloned().collect();
    files.sort();

    let cmd = build_rsync_command(store, cfg, true);
    run_copy_tool(cmd, &files)
}

/// Pulls referenced-but-not-stored blobs. Unless `all` is set, the wanted
/// set is narrowed to digests that orphan files in the working tree
/// (optionally limited by `patterns`) actually need, so a path-scoped pull
/// doesn't fetch the whole history's worth of large files.
pub fn pull(
    repo: &Path,
    store: &Store,
    magic_lengths: &MagicLengths,
    cfg: &RsyncConfig,
    all: bool,
    rev: Option<&str>,
    patterns: &[String],
) -> io::Result<i32> {
    let revs = match (&all, rev) {
        (true, _) => Revs::All,
        (false, Some(r)) => Revs::Rev(r),
        (false, None) => Revs::Rev("HEAD"),
    };
    let referenced = scanner::referenced_objects(repo, magic_lengths, revs)?;
    let catalog = store.list()?;
    let mut wanted: Vec<String> = referenced.difference(&catalog).cloned().collect();

    if !all {
        let orphans = reconcile::orphan_files(repo, magic_lengths, patterns)?;
        let orphan_digests: std::collections::HashSet<String> =
            orphans.into_iter().map(|o| o.digest).collect();
        wanted.retain(|d| orphan_digests.contains(d));
    }
    wanted.sort();

    let cmd = build_rsync_command(store, cfg, false);
    let code = run_copy_tool(cmd, &wanted)?;
    if code != 0 {
        return Ok(code);
    }
    reconcile::checkout(repo, store, magic_lengths, false)?;
    Ok(0)
}
