pub mod codec;
pub mod error;
pub mod git_config;
pub mod gitutil;
pub mod maintenance;
pub mod opts;
pub mod reconcile;
pub mod scanner;
pub mod store;
pub mod sync;
pub mod filter;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use codec::{MagicLengths, Version};
use error::{GitFatError, Result};
use opts::Command;
use store::Store;

/// Bundles the state every command needs: where the repository lives, its
/// object store, and the codec parameters derived once at startup (mirrors
/// the Python `GitFat.__init__`, which computes `gitroot`/`gitdir`/`objdir`
/// and the magic lengths exactly once per process).
pub struct GitFat {
    pub repo_root: PathBuf,
    pub git_dir: PathBuf,
    pub store: Store,
    pub magic_lengths: MagicLengths,
    pub version: Version,
}

impl GitFat {
    pub fn discover(start_dir: &Path) -> io::Result<GitFat> {
        let repo_root = gitutil::git_root(start_dir)?;
        let git_dir = gitutil::git_dir(start_dir)?;
        let store = Store::new(git_dir.join("fat").join("objects"));
        Ok(GitFat {
            repo_root,
            git_dir,
            store,
            magic_lengths: MagicLengths::compute(),
            version: Version::from_env(),
        })
    }

    pub fn setup(&self) -> io::Result<()> {
        self.store.setup()
    }

    pub fn is_init_done(&self) -> io::Result<bool> {
        let clean = gitutil::config_get(&self.repo_root, "filter.fat.clean", None)?;
        let smudge = gitutil::config_get(&self.repo_root, "filter.fat.smudge", None)?;
        Ok(clean.is_some() || smudge.is_some())
    }

    fn assert_init_done(&self) -> Result<()> {
        if self.is_init_done()? {
            Ok(())
        } else {
            Err(GitFatError::NotInitialized)
        }
    }

    fn rsync_config(&self) -> Result<git_config::RsyncConfig> {
        Ok(git_config::RsyncConfig::read(&self.repo_root)?)
    }
}

/// Prints a message to stderr only when `GIT_FAT_VERBOSE` is set, matching
/// the original's debug-vs-info log-level split without pulling in a
/// logging crate for a tool this small.
pub fn verbose(message: &str) {
    if std::env::var_os("GIT_FAT_VERBOSE").is_some() {
        eprintln!("{}", message);
    }
}

/// Runs `command` against the repository discovered from `cwd`, writing to
/// `stdin`/`stdout` only for the two filter subcommands. Returns the
/// process exit code the caller should use.
pub fn run<R: Read, W: Write>(
    cwd: &Path,
    command: Command,
    stdin: R,
    stdout: W,
) -> io::Result<i32> {
    let fat = GitFat::discover(cwd)?;

    match command {
        Command::Init => cmd_init(&fat)?,
        Command::FilterClean => {
            fat.setup()?;
            filter::clean(&fat.store, &fat.magic_lengths, fat.version, stdin, stdout)?;
        }
        Command::FilterSmudge => {
            fat.setup()?;
            filter::smudge(&fat.store, &fat.magic_lengths, stdin, stdout)?;
        }
        Command::Status { all } => cmd_status(&fat, all)?,
        Command::Push { all } => {
            let cfg = fat.rsync_config()?;
            fat.setup()?;
            let code = sync::push(&fat.repo_root, &fat.store, &fat.magic_lengths, &cfg, all)?;
            return Ok(code);
        }
        Command::Pull { all, rev, patterns } => {
            let cfg = fat.rsync_config()?;
            fat.setup()?;
            let rev = match &rev {
                Some(r) => Some(gitutil::rev_parse(&fat.repo_root, r)?),
                None => None,
            };
            let code = sync::pull(
                &fat.repo_root,
                &fat.store,
                &fat.magic_lengths,
                &cfg,
                all,
                rev.as_deref(),
                &patterns,
            )?;
            return Ok(code);
        }
        Command::Checkout => {
            fat.assert_init_done()?;
            reconcile::checkout(&fat.repo_root, &fat.store, &fat.magic_lengths, true)?;
        }
        Command::Gc => maintenance::gc(&fat.repo_root, &fat.store, &fat.magic_lengths)?,
        Command::Verify => match maintenance::verify(&fat.store) {
            Ok(()) => {}
            Err(err @ GitFatError::CorruptBlob { .. }) => {
                eprintln!("{}", err);
                return Ok(1);
            }
            Err(other) => return Err(other.into()),
        },
        Command::Find { threshold_bytes } => maintenance::find(&fat.repo_root, threshold_bytes)?,
        Command::IndexFilter { list_file, manage_gitattributes } => {
            fat.setup()?;
            maintenance::index_filter(
                &fat.repo_root,
                &fat.store,
                &fat.magic_lengths,
                fat.version,
                &list_file,
                manage_gitattributes,
            )?;
        }
    }
    Ok(0)
}

fn cmd_init(fat: &GitFat) -> Result<()> {
    fat.setup()?;
    if fat.is_init_done()? {
        println!("Git fat already configured, check configuration in .git/config");
    } else {
        gitutil::config_set(&fat.repo_root, "filter.fat.clean", "git-fat filter-clean")?;
        gitutil::config_set(&fat.repo_root, "filter.fat.smudge", "git-fat filter-smudge")?;
        println!("Initialized git fat");
    }
    Ok(())
}

fn cmd_status(fat: &GitFat, all: bool) -> Result<()> {
    fat.setup()?;
    let catalog = fat.store.list()?;
    let revs = if all { scanner::Revs::All } else { scanner::Revs::Rev("HEAD") };
    let referenced = scanner::referenced_objects(&fat.repo_root, &fat.magic_lengths, revs)?;

    if all {
        let mut sorted: Vec<&String> = referenced.iter().collect();
        sorted.sort();
        for obj in sorted {
            println!("{}", obj);
        }
    }

    let mut orphans: Vec<&String> = referenced.difference(&catalog).collect();
    orphans.sort();
    if !orphans.is_empty() {
        println!("Orphan objects:");
        for obj in orphans {
            println!("    {}", obj);
        }
    }

    let mut garbage: Vec<&String> = catalog.difference(&referenced).collect();
    garbage.sort();
    if !garbage.is_empty() {
        println!("Garbage objects:");
        for obj in garbage {
            println!("    {}", obj);
        }
    }
    Ok(())
}
