//! Placeholder codec (C1): the fixed-format text stub that links a managed
//! working-tree file to the blob holding its real contents.
//!
//! Two wire versions exist. Both are read; only one is written per process,
//! selected once at startup via `GIT_FAT_VERSION`.

use crate::error::{GitFatError, Result};

const COOKIE: &[u8] = b"#$# git-fat ";
/// Width of the right-justified decimal size field in a V2 placeholder.
/// Wide enough to hold any 64-bit unsigned value.
const SIZE_FIELD_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    /// Reads `GIT_FAT_VERSION` to decide which version new placeholders are
    /// written as. Any value other than `"1"` (including unset) means V2.
    pub fn from_env() -> Version {
        match std::env::var("GIT_FAT_VERSION") {
            Ok(v) if v == "1" => Version::V1,
            _ => Version::V2,
        }
    }
}

/// Encodes `digest` (and, for V2, `size`) as placeholder bytes.
pub fn encode(version: Version, digest: &str, size: u64) -> Vec<u8> {
    match version {
        Version::V1 => encode_v1(digest),
        Version::V2 => encode_v2(digest, size),
    }
}

pub fn encode_v1(digest: &str) -> Vec<u8> {
    format!("#$# git-fat {}\n", digest).into_bytes()
}

pub fn encode_v2(digest: &str, size: u64) -> Vec<u8> {
    format!("#$# git-fat {} {:>width$}\n", digest, size, width = SIZE_FIELD_WIDTH).into_bytes()
}

/// Decoded placeholder contents. `size` is `None` for V1 placeholders, which
/// carry only the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub digest: String,
    pub size: Option<u64>,
}

/// Decodes `bytes` as a placeholder. If `bytes` does not start with the
/// `#$# git-fat ` cookie, returns `Ok(None)` rather than an error — callers
/// on a pass-through path use this to distinguish "not managed" from a
/// genuine I/O failure.
pub fn try_decode(bytes: &[u8]) -> Option<Decoded> {
    let rest = bytes.strip_prefix(COOKIE)?;
    let mut parts = rest.split(|&b| b == b' ' || b == b'\n' || b == b'\t' || b == b'\r')
        .filter(|p| !p.is_empty());
    let digest = parts.next()?;
    let digest = std::str::from_utf8(digest).ok()?.to_string();
    let size = match parts.next() {
        Some(tok) => Some(std::str::from_utf8(tok).ok()?.parse::<u64>().ok()?),
        None => None,
    };
    Some(Decoded { digest, size })
}

/// Same as [`try_decode`] but turns a non-placeholder into
/// [`GitFatError::NotAPlaceholder`] for callers that require one.
pub fn decode_strict(bytes: &[u8]) -> Result<Decoded> {
    try_decode(bytes).ok_or_else(|| {
        GitFatError::NotAPlaceholder(String::from_utf8_lossy(bytes).into_owned())
    })
}

/// The set of possible encoded lengths, one per supported version, computed
/// once by encoding a fixed dummy digest under each version.
#[derive(Debug, Clone, Copy)]
pub struct MagicLengths {
    pub v1: usize,
    pub v2: usize,
}

impl MagicLengths {
    pub fn compute() -> MagicLengths {
        const DUMMY_DIGEST: &str = "0000000000000000000000000000000000dead";
        MagicLengths {
            v1: encode_v1(DUMMY_DIGEST).len(),
            v2: encode_v2(DUMMY_DIGEST, 5).len(),
        }
    }

    pub fn contains(&self, len: usize) -> bool {
        len == self.v1 || len == self.v2
    }

    /// The length relevant to the currently selected write version; used by
    /// the streaming filter's single-block hanging-file check.
    pub fn for_version(&self, version: Version) -> usize {
        match version {
            Version::V1 => self.v1,
            Version::V2 => self.v2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_v2() {
        let digest = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
        let enc = encode(Version::V2, digest, 11);
        let dec = try_decode(&enc).unwrap();
        assert_eq!(dec.digest, digest);
        assert_eq!(dec.size, Some(11));
    }

    #[test]
    fn s1_exact_bytes() {
        let digest = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
        let enc = encode_v2(digest, 11);
        assert_eq!(
            String::from_utf8(enc).unwrap(),
            "#$# git-fat 2aae6c35c94fcfb415dbe95f408b9ce91ee846ed                   11\n"
        );
    }

    #[test]
    fn roundtrip_v1_has_no_size() {
        let digest = "0000000000000000000000000000000000dead";
        let enc = encode(Version::V1, digest, 999);
        let dec = try_decode(&enc).unwrap();
        assert_eq!(dec.digest, digest);
        assert_eq!(dec.size, None);
    }

    #[test]
    fn length_is_constant_per_version() {
        let lens = MagicLengths::compute();
        let d1 = "1111111111111111111111111111111111111111";
        let d2 = "2222222222222222222222222222222222222222";
        assert_eq!(encode_v2(d1, 0).len(), lens.v2);
        assert_eq!(encode_v2(d2, u64::MAX).len(), lens.v2);
        assert_eq!(encode_v1(d1).len(), lens.v1);
    }

    #[test]
    fn non_placeholder_is_none() {
        assert!(try_decode(b"hello world").is_none());
    }

    #[test]
    fn decode_strict_errors_on_garbage() {
        assert!(decode_strict(b"not a placeholder").is_err());
    }

    #[test]
    fn magic_lengths_v2_for_s2() {
        // 10 MiB of zero bytes still encodes to the fixed V2 length, the
        // same length the S1 scenario's placeholder bytes have.
        let lens = MagicLengths::compute();
        let enc = encode_v2("2222222222222222222222222222222222222222", 10 * 1024 * 1024);
        assert_eq!(enc.len(), lens.v2);
        assert_eq!(lens.v2, 74);
    }
}
