//! Reads `.gitfat`, the tracked, `git config`-format file at the
//! working-tree root that tells the sync driver (C6) where the remote
//! object store lives.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{GitFatError, Result};
use crate::gitutil;

/// The remote-copy settings read from `.gitfat`.
#[derive(Debug, Clone)]
pub struct RsyncConfig {
    pub remote: String,
    pub ssh_user: Option<String>,
    pub ssh_port: Option<String>,
    pub options: Option<String>,
}

impl RsyncConfig {
    /// Reads `rsync.remote` (required), `rsync.sshuser`, `rsync.sshport`,
    /// and `rsync.options` from the `.gitfat` file at `git_root`.
    ///
    /// # Errors
    ///
    /// Returns [`GitFatError::MissingConfig`] if `rsync.remote` is absent —
    /// absence of a remote is a fatal configuration error, not a silent
    /// no-op.
    pub fn read(git_root: &Path) -> Result<RsyncConfig> {
        let cfg_path = git_root.join(".gitfat");
        let get = |key: &str| -> io::Result<Option<String>> {
            gitutil::config_get(git_root, key, Some(cfg_path.as_path()))
        };
        let remote = get("rsync.remote")?
            .ok_or_else(|| GitFatError::MissingConfig(format!("rsync.remote in {}", cfg_path.display())))?;
        Ok(RsyncConfig {
            remote,
            ssh_user: get("rsync.sshuser")?,
            ssh_port: get("rsync.sshport")?,
            options: get("rsync.options")?,
        })
    }

    pub fn config_path(git_root: &Path) -> PathBuf {
        git_root.join(".gitfat")
    }
}
