//! Graph scanner (C4): walks the host VCS's object graph through a pipeline
//! of cooperating subprocesses to enumerate referenced placeholder digests.
//!
//! `rev-list --objects` produces a line per reachable object; a background
//! thread strips each line to its hash and feeds `cat-file --batch-check`;
//! another background thread filters that for blob-sized candidates and
//! feeds `cat-file --batch`; the calling thread consumes the batch output
//! directly. Reading the final stage while simultaneously feeding the
//! middle one is what keeps this from deadlocking on a non-trivial
//! repository: if any stage's pipe buffer fills before its downstream
//! starts draining, everything upstream blocks.

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::thread;

use crate::codec;
use crate::codec::MagicLengths;
use crate::gitutil;

/// Revision selector for [`referenced_objects`].
pub enum Revs<'a> {
    /// `rev-list --all`, ignoring `rev`.
    All,
    /// `rev-list <rev>`.
    Rev(&'a str),
}

/// Returns the set of digests of every placeholder blob reachable from the
/// selected revisions.
pub fn referenced_objects(
    repo: &Path,
    magic_lengths: &MagicLengths,
    revs: Revs,
) -> io::Result<HashSet<String>> {
    let rev = match revs {
        Revs::All => "--all",
        Revs::Rev(r) => r,
    };

    let mut rev_list = gitutil::spawn_rev_list_objects(repo, rev)?;
    let mut batch_check = gitutil::spawn_cat_file_batch_check(repo)?;
    let mut batch = gitutil::spawn_cat_file_batch(repo)?;

    let rev_list_stdout = rev_list.stdout.take().expect("piped");
    let batch_check_stdin = batch_check.stdin.take().expect("piped");
    let cut_thread = thread::spawn(move || cut_sha1_hashes(rev_list_stdout, batch_check_stdin));

    let batch_check_stdout = batch_check.stdout.take().expect("piped");
    let batch_stdin = batch.stdin.take().expect("piped");
    let magic_lengths_for_filter = *magic_lengths;
    let filter_thread = thread::spawn(move || {
        filter_blob_candidates(batch_check_stdout, batch_stdin, &magic_lengths_for_filter)
    });

    let mut batch_stdout = batch.stdout.take().expect("piped");
    let referenced = consume_batch(&mut batch_stdout)?;

    // Propagate the first error encountered, but make sure every child and
    // thread is waited on regardless so nothing leaks a zombie process.
    let cut_result = cut_thread.join().unwrap_or(Ok(()));
    let filter_result = filter_thread.join().unwrap_or(Ok(()));
    rev_list.wait()?;
    batch_check.wait()?;
    batch.wait()?;
    cut_result?;
    filter_result?;

    Ok(referenced)
}

/// Stage 2: copies each `rev-list --objects` line, truncated to its leading
/// 40-char object hash, to `output`.
fn cut_sha1_hashes<R: Read, W: Write>(input: R, mut output: W) -> io::Result<()> {
    let reader = BufReader::new(input);
    for line in reader.lines() {
        let line = line?;
        if line.len() < 40 {
            continue;
        }
        output.write_all(line[..40].as_bytes())?;
        output.write_all(b"\n")?;
    }
    // Dropping `output` closes its write end, which is what lets the
    // downstream `cat-file --batch-check` see EOF on its stdin.
    Ok(())
}

/// Stage 4: reads `cat-file --batch-check` lines (`<hash> <type> <size>` or
/// `<hash> missing`), keeping only blobs whose size matches a magic length,
/// and feeds the surviving hashes to `output`.
fn filter_blob_candidates<R: Read, W: Write>(
    input: R,
    mut output: W,
    magic_lengths: &MagicLengths,
) -> io::Result<()> {
    let reader = BufReader::new(input);
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(kind), Some(size)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if kind != "blob" {
            continue;
        }
        let Ok(size) = size.parse::<usize>() else {
            continue;
        };
        if !magic_lengths.contains(size) {
            continue;
        }
        output.write_all(hash.as_bytes())?;
        output.write_all(b"\n")?;
    }
    Ok(())
}

/// Stage 5/6: reads `cat-file --batch` records (`<hash> blob <size>\n` +
/// exactly `size` content bytes + a single LF delimiter) until EOF, decoding
/// each candidate's content as a placeholder.
fn consume_batch<R: Read>(input: &mut R) -> io::Result<HashSet<String>> {
    let mut referenced = HashSet::new();
    let mut reader = BufReader::new(input);

    loop {
        let mut header = String::new();
        let n = reader.read_line(&mut header)?;
        if n == 0 {
            break; // EOF: done.
        }
        let mut parts = header.split_whitespace();
        let (Some(_hash), Some(_kind), Some(size)) = (parts.next(), parts.next(), parts.next())
        else {
            break;
        };
        let Ok(size) = size.parse::<usize>() else {
            break;
        };

        let mut content = vec![0u8; size];
        if reader.read_exact(&mut content).is_err() {
            break; // short read: treat as EOF, not an error.
        }
        if let Some(decoded) = codec::try_decode(&content) {
            referenced.insert(decoded.digest);
        }

        let mut delim = [0u8; 1];
        if reader.read_exact(&mut delim).is_err() {
            break;
        }
    }
    Ok(referenced)
}
