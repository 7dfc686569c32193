use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

/// Errors from the streaming inflater (§4.B). Distinguishes a slice that
/// simply doesn't contain a full stream yet from one that is actually
/// malformed, which matters when a caller is probing an unknown-length
/// compressed region (the packfile decoder always has the whole pack in
/// memory, so in practice only `Format`/`Checksum` are reachable there).
#[derive(Debug, Error)]
pub enum ZlibError {
    #[error("need more input")]
    NeedMoreInput,
    #[error("zlib format error: {0}")]
    Format(String),
    #[error("zlib checksum mismatch")]
    ChecksumMismatch,
}

impl From<io::Error> for ZlibError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => ZlibError::NeedMoreInput,
            _ => {
                let msg = e.to_string();
                if msg.contains("checksum") {
                    ZlibError::ChecksumMismatch
                } else {
                    ZlibError::Format(msg)
                }
            }
        }
    }
}

/// Inflate a zlib stream whose compressed length within `input` is unknown.
/// Returns the decompressed bytes and the number of input bytes the
/// decoder actually consumed, so the caller (the packfile decoder) can
/// advance past exactly this object's compressed region without a length
/// prefix (§4.B, §9).
pub fn inflate_stream(input: &[u8]) -> Result<(Vec<u8>, u64), ZlibError> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok((out, decoder.total_in()))
}

/// Inflate a zlib stream of known decompressed length, stopping as soon as
/// that many bytes have been produced. Used by the pack decoder, which
/// knows the object's `size` field up front and does not need to read
/// trailing garbage the compressor may not even emit separately.
pub fn inflate_stream_to_len(input: &[u8], expected_len: usize) -> Result<(Vec<u8>, u64), ZlibError> {
    let mut decoder = ZlibDecoder::new(input);
    let mut out = vec![0u8; expected_len];
    if expected_len == 0 {
        // read_exact on an empty buffer never reads from the underlying
        // reader, which would leave total_in() at 0 for a zero-length
        // object (e.g. an empty blob) and desync the pack scan. Drive the
        // decoder to the end of its stream instead so it actually consumes
        // the header, empty block and trailing checksum.
        let mut discard = Vec::new();
        decoder.read_to_end(&mut discard)?;
    } else {
        decoder.read_exact(&mut out)?;
    }
    Ok((out, decoder.total_in()))
}

/// One-shot deflate at the default compression level, used for loose
/// object writes (§4.C).
pub fn deflate_all(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    encoder.finish()
}
