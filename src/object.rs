//! Canonical object encodings and the loose object store (§3, §4.C).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::error::GitError;
use crate::hash::sha1;
use crate::zlib::{deflate_all, inflate_stream};

/// Tagged variant over the four object kinds the store can hold (§9 design
/// note: polymorphism over object kind as a tagged variant, not subclassing).
/// `Tag` is never produced by this client but must round-trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    /// The pack object type code for this kind (§4.G), distinct from
    /// the loose-object string header.
    pub fn pack_type_code(self) -> u8 {
        match self {
            ObjectKind::Commit => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Blob => 3,
            ObjectKind::Tag => 4,
        }
    }

    pub fn from_pack_type_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ObjectKind::Commit),
            2 => Some(ObjectKind::Tree),
            3 => Some(ObjectKind::Blob),
            4 => Some(ObjectKind::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(GitError::object("", format!("unknown object type '{other}'"))),
        }
    }
}

/// A tree entry as stored on disk: `<mode> <name>\0<20-byte sha>` (§3).
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub mode: &'static str,
    pub name: String,
    pub sha: [u8; 20],
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.mode == "40000"
    }

    /// Name extended with a trailing `/` for comparison purposes only,
    /// per §3: "directories sort as if their name has a trailing /".
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.clone().into_bytes();
        if self.is_dir() {
            key.push(b'/');
        }
        key
    }
}

/// Prefix a payload with its canonical `<type> <len>\0` header (§3).
pub fn canonical_encoding(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 32);
    out.extend_from_slice(kind.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    out
}

pub fn encode_blob(data: &[u8]) -> Vec<u8> {
    canonical_encoding(ObjectKind::Blob, data)
}

/// Encode a tree's entries in canonical sorted order (§3, §4.C). The input
/// order is not assumed to already be sorted.
pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_unstable_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut payload = Vec::new();
    for entry in sorted {
        payload.extend_from_slice(entry.mode.as_bytes());
        payload.push(b' ');
        payload.extend_from_slice(entry.name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&entry.sha);
    }
    canonical_encoding(ObjectKind::Tree, &payload)
}

/// A parsed identity line, `<name> <email> <seconds> <±HHMM>` (§3).
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    pub tz_offset: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.tz_offset
        )
    }
}

pub fn encode_commit(
    tree: &str,
    parents: &[String],
    author: &Identity,
    committer: &Identity,
    message: &str,
) -> Vec<u8> {
    use std::fmt::Write as _;

    let mut payload = String::new();
    writeln!(payload, "tree {tree}").unwrap();
    for parent in parents {
        writeln!(payload, "parent {parent}").unwrap();
    }
    writeln!(payload, "author {author}").unwrap();
    writeln!(payload, "committer {committer}").unwrap();
    payload.push('\n');
    payload.push_str(message);

    canonical_encoding(ObjectKind::Commit, payload.as_bytes())
}

/// A decoded entry from a tree's payload, read back in file order.
pub struct TreeIter<'a> {
    remaining: &'a [u8],
}

impl<'a> TreeIter<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { remaining: payload }
    }
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = Result<(String, String, [u8; 20])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let nul = match self.remaining.iter().position(|&b| b == 0) {
            Some(i) => i,
            None => return Some(Err(anyhow::anyhow!("truncated tree entry header"))),
        };
        let header = &self.remaining[..nul];
        let header = match std::str::from_utf8(header).context("tree entry header is not UTF-8") {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };
        let (mode, name) = match header.split_once(' ') {
            Some(pair) => pair,
            None => {
                return Some(Err(anyhow::anyhow!(
                    "malformed tree entry header '{header}'"
                )))
            }
        };
        let rest = &self.remaining[nul + 1..];
        if rest.len() < 20 {
            return Some(Err(anyhow::anyhow!("truncated tree entry sha")));
        }
        let mut sha = [0u8; 20];
        sha.copy_from_slice(&rest[..20]);
        self.remaining = &rest[20..];
        Some(Ok((mode.to_string(), name.to_string(), sha)))
    }
}

/// Path of a loose object under `<root>/.git/objects/xx/yyyy...` (§3, §6).
/// `sha` must already be a validated 40-hex-digit string.
pub fn object_path(root: &Path, sha: &str) -> PathBuf {
    root.join(".git")
        .join("objects")
        .join(&sha[..2])
        .join(&sha[2..])
}

/// Reject anything that isn't a 40-character lowercase-or-mixed-case hex
/// string before it is sliced into a fan-out path, so a malformed CLI
/// argument surfaces as a typed error instead of an index-out-of-bounds
/// panic (§7: errors are never swallowed, and never panics).
fn validate_sha(sha: &str) -> Result<()> {
    if sha.len() == 40 && sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(GitError::object(sha, "not a valid 40-character hex object name").into())
    }
}

/// Write a canonically-encoded object to the store, deflating it and
/// placing it at its fan-out path. A no-op if the object already exists
/// (§4.C: "Writing an object that already exists is a no-op").
pub fn write(root: &Path, canonical: &[u8]) -> Result<[u8; 20]> {
    let sha = sha1(canonical);
    let hex = hex::encode(sha);
    let path = object_path(root, &hex);

    if path.exists() {
        return Ok(sha);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating object directory {}", parent.display()))?;
    }

    let compressed = deflate_all(canonical).context("deflating object")?;
    fs::write(&path, compressed).with_context(|| format!("writing object {hex}"))?;

    Ok(sha)
}

/// Read a loose object back, inflating it and splitting the canonical
/// `<type> <len>\0<payload>` header from the payload (§4.C).
pub fn read(root: &Path, sha: &str) -> Result<(ObjectKind, Vec<u8>)> {
    validate_sha(sha)?;
    let path = object_path(root, sha);
    let compressed = fs::read(&path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::object(sha, "not found in object store")
            } else {
                GitError::Io(e)
            }
        })
        .with_context(|| format!("reading object file {}", path.display()))?;

    let (decoded, _) = inflate_stream(&compressed)
        .map_err(|e| GitError::object(sha, format!("corrupt zlib stream: {e}")))?;

    let nul = decoded
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GitError::object(sha, "missing NUL in object header"))?;

    let header = std::str::from_utf8(&decoded[..nul])
        .map_err(|_| GitError::object(sha, "object header is not UTF-8"))?;
    let (kind_str, size_str) = header
        .split_once(' ')
        .ok_or_else(|| GitError::object(sha, format!("malformed object header '{header}'")))?;

    let kind: ObjectKind = kind_str
        .parse()
        .map_err(|_| GitError::object(sha, format!("unknown object type '{kind_str}'")))?;
    let size: usize = size_str
        .parse()
        .map_err(|_| GitError::object(sha, format!("invalid length '{size_str}' in header")))?;

    let payload = decoded[nul + 1..].to_vec();
    if payload.len() != size {
        return Err(GitError::object(
            sha,
            format!(
                "header declared length {size} but payload is {} bytes",
                payload.len()
            ),
        )
        .into());
    }

    Ok((kind, payload))
}
