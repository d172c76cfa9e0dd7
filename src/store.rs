//! Content-addressed object store (C2): `<git-dir>/fat/objects/`, one regular
//! file per blob named by its digest.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Directory of blobs named by their SHA-1 digest.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: PathBuf) -> Store {
        Store { dir }
    }

    /// Creates the object directory if it does not already exist.
    pub fn setup(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, digest: &str) -> PathBuf {
        self.dir.join(digest)
    }

    pub fn exists(&self, digest: &str) -> bool {
        self.path(digest).exists()
    }

    pub fn read(&self, digest: &str) -> io::Result<File> {
        File::open(self.path(digest))
    }

    pub fn remove(&self, digest: &str) -> io::Result<()> {
        fs::remove_file(self.path(digest))
    }

    /// Every digest currently in the store. Entries that aren't 40 lowercase
    /// hex characters (e.g. stray temp files) are ignored rather than
    /// surfaced as blobs.
    pub fn list(&self) -> io::Result<HashSet<String>> {
        let mut out = HashSet::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(it) => it,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if is_digest(name) {
                    out.insert(name.to_string());
                }
            }
        }
        Ok(out)
    }

    /// Atomically installs `temp_path` (which must already live in this
    /// store's directory) as the blob named `digest`.
    ///
    /// If a file already exists under `digest`, the temp file is discarded
    /// and admission is a no-op: the content is already present and, because
    /// the name is content-addressed, must be identical. This is also what
    /// makes two concurrent clean invocations over identical content
    /// harmless: whichever rename wins, the loser simply finds the
    /// destination already occupied.
    pub fn admit(&self, temp_path: &Path, digest: &str) -> io::Result<()> {
        let final_path = self.path(digest);
        if final_path.exists() {
            fs::remove_file(temp_path)?;
            return Ok(());
        }
        set_readonly(temp_path)?;
        match fs::rename(temp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(_) if final_path.exists() => {
                let _ = fs::remove_file(temp_path);
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(temp_path);
                Err(e)
            }
        }
    }

    /// Creates an empty, uniquely-named temp file in this store's directory
    /// so that [`admit`](Self::admit)'s rename stays on the same filesystem.
    pub fn new_temp_file(&self) -> io::Result<(PathBuf, File)> {
        let mut counter: u32 = 0;
        loop {
            counter = counter.wrapping_add(1);
            let name = format!(".tmp-{}-{}", std::process::id(), counter);
            let path = self.dir.join(name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_digest(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

#[cfg(unix)]
fn set_readonly(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let umask = current_umask();
    let mode = 0o444 & !umask;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_readonly(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}

/// Reads the process umask without permanently changing it (umask() only
/// reports the previous value as a side effect of setting a new one, so the
/// old value must be restored immediately).
#[cfg(unix)]
fn current_umask() -> u32 {
    unsafe {
        let old = libc::umask(0o022);
        libc::umask(old);
        old as u32
    }
}
