use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

pub fn mktemp(prefix: &str) -> PathBuf {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("target");
    p.push("it");
    static COUNT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let c = COUNT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    p.push(format!("{}_{}_{}_{}", prefix, pid, t, c));
    p
}

pub fn run_git(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let out = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run git");
    let code = out.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    (code, stdout, stderr)
}

pub fn write_file(dir: &Path, rel: &str, contents: &[u8]) {
    let path = dir.join(rel);
    if let Some(p) = path.parent() {
        fs::create_dir_all(p).unwrap();
    }
    let mut f = File::create(&path).unwrap();
    f.write_all(contents).unwrap();
}

pub fn init_repo() -> PathBuf {
    let repo = mktemp("git_fat_it");
    fs::create_dir_all(&repo).unwrap();
    let (c, _o, e) = run_git(&repo, &["init", "-q"]);
    assert_eq!(c, 0, "git init failed: {}", e);
    assert_eq!(
        run_git(&repo, &["config", "user.name", "A U Thor"]).0,
        0,
        "failed to set user.name"
    );
    assert_eq!(
        run_git(&repo, &["config", "user.email", "a.u.thor@example.com"]).0,
        0,
        "failed to set user.email"
    );
    write_file(&repo, "README.md", b"hello");
    assert_eq!(run_git(&repo, &["add", "."]).0, 0, "git add failed");
    assert_eq!(run_git(&repo, &["commit", "-q", "-m", "init commit"]).0, 0);
    repo
}

pub fn commit_all(dir: &Path, msg: &str) {
    assert_eq!(run_git(dir, &["add", "-A"]).0, 0, "git add -A failed");
    assert_eq!(run_git(dir, &["commit", "-q", "-m", msg]).0, 0, "git commit failed");
}
