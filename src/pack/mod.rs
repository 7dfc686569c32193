//! Packfile decoding (§4.G) — the heart of the clone pipeline.
//!
//! Two passes over the pack bytes: `scan` walks it once sequentially,
//! inflating every object and canonicalizing the non-delta ones on the
//! spot; `resolve` then reconstructs delta objects against their bases,
//! processed in increasing pack order so every base (ofs, by construction;
//! ref, by the scan/resolve order of this implementation) is already
//! resolved by the time its dependent is reached.

pub mod delta;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use tracing::{debug, info};

use crate::error::GitError;
use crate::hash::Hasher;
use crate::object::{self, ObjectKind};
use crate::zlib::inflate_stream_to_len;

/// Upper bound on a single object's declared inflated size. A server
/// advertising a bogus multi-gigabyte size in the object header would
/// otherwise make `inflate_stream_to_len` allocate that much memory up
/// front, before a single byte of the (much smaller) compressed stream is
/// actually read.
const MAX_OBJECT_SIZE: usize = 1 << 32;

enum ScannedBody {
    Base {
        kind: ObjectKind,
        payload: Vec<u8>,
    },
    OfsDelta {
        base_offset: usize,
        delta: Vec<u8>,
    },
    RefDelta {
        base_sha: [u8; 20],
        delta: Vec<u8>,
    },
}

struct ScannedObject {
    body: ScannedBody,
}

/// Parse the variable-length per-object header (§4.G "Per-object header").
/// Returns (type code, declared inflated size, bytes consumed).
fn parse_object_header(input: &[u8]) -> Result<(u8, usize, usize)> {
    let mut i = 0;
    let first = *input
        .first()
        .ok_or_else(|| GitError::pack("truncated object header"))?;
    i += 1;
    let type_code = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as usize;
    let mut shift = 4u32;
    let mut continuation = first & 0x80 != 0;
    while continuation {
        let b = *input
            .get(i)
            .ok_or_else(|| GitError::pack("truncated object header size bytes"))?;
        i += 1;
        let term = ((b & 0x7f) as usize)
            .checked_shl(shift)
            .ok_or_else(|| GitError::pack("object header size varint too long"))?;
        size |= term;
        shift += 7;
        continuation = b & 0x80 != 0;
    }
    Ok((type_code, size, i))
}

/// Parse the ofs-delta negative base offset varint (§4.G "After the
/// header"): each continuation byte beyond the first increments the
/// accumulator before shifting, matching git's `offset-encoding`.
fn parse_ofs_delta_offset(input: &[u8]) -> Result<(usize, usize)> {
    let mut i = 0;
    let mut c = *input
        .first()
        .ok_or_else(|| GitError::pack("truncated ofs-delta offset"))?;
    i += 1;
    let mut value = (c & 0x7f) as usize;
    while c & 0x80 != 0 {
        c = *input
            .get(i)
            .ok_or_else(|| GitError::pack("truncated ofs-delta offset"))?;
        i += 1;
        value = value
            .checked_add(1)
            .and_then(|v| v.checked_shl(7))
            .map(|v| v | (c & 0x7f) as usize)
            .ok_or_else(|| GitError::pack("ofs-delta offset too large"))?;
    }
    Ok((value, i))
}

/// Decode a pack byte stream and write every resulting object into the
/// store rooted at `root`, returning the hex SHAs written (§4.G "Decode
/// strategy", §4.C).
pub fn decode_into_store(root: &Path, data: &[u8]) -> Result<Vec<String>> {
    ensure!(data.len() >= 12, GitError::pack("truncated pack header"));
    ensure!(&data[0..4] == b"PACK", GitError::pack("bad pack magic"));

    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    ensure!(
        version == 2,
        GitError::pack(format!("unsupported pack version {version}"))
    );
    let count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
    info!("pack contains {count} objects");

    let mut offset = 12usize;
    let mut scanned: Vec<ScannedObject> = Vec::with_capacity(count as usize);
    let mut offset_to_index: HashMap<usize, usize> = HashMap::new();
    let mut sha_to_index: HashMap<[u8; 20], usize> = HashMap::new();

    for idx in 0..count {
        let start = offset;
        let (type_code, size, header_len) = parse_object_header(&data[offset..])
            .map_err(|e| pack_err_at(idx, e))?;
        ensure!(
            size <= MAX_OBJECT_SIZE,
            GitError::pack_at(idx, format!("declared object size {size} exceeds the {MAX_OBJECT_SIZE}-byte limit"))
        );
        offset += header_len;

        let body = match type_code {
            1 | 2 | 3 | 4 => {
                let kind = ObjectKind::from_pack_type_code(type_code).unwrap();
                let (payload, consumed) = inflate_stream_to_len(&data[offset..], size)
                    .map_err(|e| GitError::pack_at(idx, format!("inflating object: {e}")))?;
                offset += consumed as usize;
                debug!(index = idx, kind = %kind, size, "scanned base object");
                ScannedBody::Base { kind, payload }
            }
            6 => {
                let (back, used) = parse_ofs_delta_offset(&data[offset..])
                    .map_err(|e| pack_err_at(idx, e))?;
                offset += used;
                ensure!(
                    back > 0 && back <= start,
                    GitError::pack_at(idx, "ofs-delta base offset is forward or self-referential")
                );
                let base_offset = start - back;
                let (delta, consumed) = inflate_stream_to_len(&data[offset..], size)
                    .map_err(|e| GitError::pack_at(idx, format!("inflating ofs-delta: {e}")))?;
                offset += consumed as usize;
                debug!(index = idx, base_offset, size, "scanned ofs-delta");
                ScannedBody::OfsDelta { base_offset, delta }
            }
            7 => {
                ensure!(
                    data.len() - offset >= 20,
                    GitError::pack_at(idx, "truncated ref-delta base sha")
                );
                let mut base_sha = [0u8; 20];
                base_sha.copy_from_slice(&data[offset..offset + 20]);
                offset += 20;
                let (delta, consumed) = inflate_stream_to_len(&data[offset..], size)
                    .map_err(|e| GitError::pack_at(idx, format!("inflating ref-delta: {e}")))?;
                offset += consumed as usize;
                debug!(index = idx, base_sha = %hex::encode(base_sha), size, "scanned ref-delta");
                ScannedBody::RefDelta { base_sha, delta }
            }
            other => {
                return Err(GitError::pack_at(idx, format!("reserved or unknown object type {other}")).into())
            }
        };

        if let ScannedBody::Base { kind, payload } = &body {
            let canonical = object::canonical_encoding(*kind, payload);
            let sha = crate::hash::sha1(&canonical);
            sha_to_index.insert(sha, scanned.len());
        }
        offset_to_index.insert(start, scanned.len());
        scanned.push(ScannedObject { body });
    }

    ensure!(
        data.len() >= offset + 20,
        GitError::pack("pack is missing its trailing checksum")
    );
    let mut hasher = Hasher::new();
    hasher.update(&data[..offset]);
    let digest = hasher.finalize();
    ensure!(
        digest == data[offset..offset + 20],
        GitError::pack("trailing checksum does not match pack contents")
    );
    ensure!(
        data.len() == offset + 20,
        GitError::pack("trailing bytes after pack checksum")
    );

    let mut resolved: Vec<Option<(ObjectKind, Vec<u8>)>> = (0..scanned.len()).map(|_| None).collect();
    let mut written = Vec::with_capacity(scanned.len());
    let mut deltas_resolved = 0usize;
    let mut bases_written = 0usize;

    for idx in 0..scanned.len() {
        let (kind, payload) = match &scanned[idx].body {
            ScannedBody::Base { kind, payload } => {
                bases_written += 1;
                (*kind, payload.clone())
            }
            ScannedBody::OfsDelta { base_offset, delta } => {
                let base_idx = *offset_to_index
                    .get(base_offset)
                    .ok_or_else(|| GitError::pack_at(idx as u32, "ofs-delta base offset not found in pack"))?;
                let (base_kind, base_payload) = resolved[base_idx].as_ref().ok_or_else(|| {
                    GitError::pack_at(idx as u32, "ofs-delta base was not resolved before this object")
                })?;
                let payload = delta::apply(base_payload, delta)
                    .map_err(|e| GitError::pack_at(idx as u32, e.to_string()))?;
                deltas_resolved += 1;
                (*base_kind, payload)
            }
            ScannedBody::RefDelta { base_sha, delta } => {
                let base_idx = *sha_to_index.get(base_sha).ok_or_else(|| {
                    GitError::pack_at(
                        idx as u32,
                        format!("ref-delta base {} not present in pack", hex::encode(base_sha)),
                    )
                })?;
                let (base_kind, base_payload) = resolved[base_idx].as_ref().ok_or_else(|| {
                    GitError::pack_at(idx as u32, "ref-delta base was not resolved before this object")
                })?;
                let payload = delta::apply(base_payload, delta)
                    .map_err(|e| GitError::pack_at(idx as u32, e.to_string()))?;
                deltas_resolved += 1;
                (*base_kind, payload)
            }
        };

        let canonical = object::canonical_encoding(kind, &payload);
        let sha = crate::hash::sha1(&canonical);
        sha_to_index.entry(sha).or_insert(idx);

        let hex_sha = object::write(root, &canonical)
            .map(hex::encode)
            .with_context(|| format!("writing pack object {idx}"))?;
        written.push(hex_sha);
        resolved[idx] = Some((kind, payload));
    }

    info!(
        "received {bases_written} objects, resolved {deltas_resolved} deltas"
    );

    Ok(written)
}

fn pack_err_at(idx: u32, err: anyhow::Error) -> anyhow::Error {
    GitError::pack_at(idx, err.to_string()).into()
}
