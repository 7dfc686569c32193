//! pkt-line framing (§4.D, GLOSSARY).

use crate::error::GitError;

/// A single pkt-line frame. `Delim` (`0001`) belongs to protocol v2 and is
/// never emitted by this client; it is parsed so a v2-only server's
/// response is rejected with a clear protocol error instead of silently
/// misparsed as data (§9: "this spec targets v1 only").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Flush,
    Delim,
    Data(Vec<u8>),
}

/// Encode a payload as a pkt-line. An empty payload is not meaningful here;
/// callers that want a flush packet call `flush()` instead.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() + 4;
    let mut out = format!("{len:04x}").into_bytes();
    out.extend_from_slice(payload);
    out
}

pub fn flush() -> Vec<u8> {
    b"0000".to_vec()
}

/// Decode one pkt-line frame from the front of `input`, returning the
/// frame and the number of bytes consumed. Rejects frames whose declared
/// length exceeds the remaining input (§4.D).
pub fn decode_one(input: &[u8]) -> anyhow::Result<(PktLine, usize)> {
    if input.len() < 4 {
        return Err(GitError::Protocol("truncated pkt-line length prefix".into()).into());
    }
    let len_str = std::str::from_utf8(&input[..4])
        .map_err(|_| GitError::Protocol("pkt-line length is not ASCII".into()))?;
    let len = usize::from_str_radix(len_str, 16)
        .map_err(|_| GitError::Protocol(format!("pkt-line length '{len_str}' is not hex")))?;

    match len {
        0 => Ok((PktLine::Flush, 4)),
        1 => Ok((PktLine::Delim, 4)),
        n if n < 4 => Err(GitError::Protocol(format!("invalid pkt-line length {n}")).into()),
        n => {
            let data_len = n - 4;
            if input.len() - 4 < data_len {
                return Err(GitError::Protocol(
                    "pkt-line declared length exceeds remaining input".into(),
                )
                .into());
            }
            let data = input[4..4 + data_len].to_vec();
            Ok((PktLine::Data(data), n))
        }
    }
}

/// Decode a full sequence of pkt-lines up to and including the first
/// flush, returning the frames and the number of bytes consumed overall.
pub fn decode_until_flush(input: &[u8]) -> anyhow::Result<(Vec<PktLine>, usize)> {
    let mut offset = 0;
    let mut frames = Vec::new();
    loop {
        let (frame, consumed) = decode_one(&input[offset..])?;
        offset += consumed;
        let is_flush = matches!(frame, PktLine::Flush);
        frames.push(frame);
        if is_flush {
            break;
        }
        if offset >= input.len() {
            return Err(GitError::Protocol("pkt-line stream ended without a flush".into()).into());
        }
    }
    Ok((frames, offset))
}
