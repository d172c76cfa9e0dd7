//! Streaming clean/smudge filter (C3): single-pass hash-and-tee between the
//! working tree and the object store.

use std::fs;
use std::io::{self, Read, Write};

use sha1::{Digest, Sha1};

use crate::codec::{self, MagicLengths, Version};
use crate::store::Store;

const BLOCK_SIZE: usize = 64 * 1024;

/// Converts working-tree content on `input` into placeholder bytes on
/// `output`, admitting the real content to `store` as a side effect.
///
/// Hashing, the temp-file write, and the byte counter all happen in one pass
/// over `input` so that arbitrarily large files never need to be buffered in
/// memory.
pub fn clean<R: Read, W: Write>(
    store: &Store,
    magic_lengths: &MagicLengths,
    version: Version,
    mut input: R,
    mut output: W,
) -> io::Result<()> {
    store.setup()?;
    let (tmp_path, mut tmp_file) = store.new_temp_file()?;

    let result = (|| -> io::Result<()> {
        let mut hasher = Sha1::new();
        let mut total: u64 = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        let mut first_block = true;
        let mut hanging = false;

        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let block = &buf[..n];

            if first_block {
                first_block = false;
                if n == magic_lengths.for_version(version) && codec::try_decode(block).is_some() {
                    // The working tree already holds an un-smudged placeholder.
                    // Pass it and the remainder of the stream straight through
                    // without admitting anything, so it never double-encodes.
                    hanging = true;
                    output.write_all(block)?;
                    io::copy(&mut input, &mut output)?;
                    break;
                }
            }

            hasher.update(block);
            total += n as u64;
            tmp_file.write_all(block)?;
        }

        if hanging {
            return Ok(());
        }

        tmp_file.flush()?;
        drop(tmp_file);
        let digest = hex::encode(hasher.finalize());
        store.admit(&tmp_path, &digest)?;
        output.write_all(&codec::encode(version, &digest, total))?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Converts a placeholder (or arbitrary, unmanaged content) on `input` back
/// into real bytes on `output`. Never writes to the store.
pub fn smudge<R: Read, W: Write>(
    store: &Store,
    magic_lengths: &MagicLengths,
    mut input: R,
    mut output: W,
) -> io::Result<()> {
    // We don't know ahead of time which version produced this placeholder,
    // so probe the larger of the two magic lengths and fall back if the
    // stream is shorter (a non-managed file may be smaller than that).
    let probe_len = magic_lengths.v1.max(magic_lengths.v2);
    let mut head = vec![0u8; probe_len];
    let read = read_up_to(&mut input, &mut head)?;
    head.truncate(read);

    let candidate = if read == magic_lengths.v1 || read == magic_lengths.v2 {
        codec::try_decode(&head)
    } else {
        None
    };

    match candidate {
        Some(decoded) => match store.read(&decoded.digest) {
            Ok(mut blob) => {
                io::copy(&mut blob, &mut output)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Leave a recognizable stub rather than an empty file.
                output.write_all(&head)?;
            }
            Err(e) => return Err(e),
        },
        None => {
            output.write_all(&head)?;
            io::copy(&mut input, &mut output)?;
        }
    }
    Ok(())
}

fn read_up_to<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = input.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}
