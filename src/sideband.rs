//! Side-band demultiplexing of the upload-pack response (§4.E, GLOSSARY).

use tracing::debug;

use crate::error::GitError;
use crate::pktline::{self, PktLine};

/// Whether the server honored the `side-band-64k` (or plain `side-band`)
/// capability. Resolved from the advertised capability set (§9 Open
/// Question: side-band-less servers are handled by bypassing the demux).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebandMode {
    Demux,
    Raw,
}

impl SidebandMode {
    pub fn from_capabilities(capabilities: &[String]) -> Self {
        if capabilities.iter().any(|c| c == "side-band-64k" || c == "side-band") {
            SidebandMode::Demux
        } else {
            SidebandMode::Raw
        }
    }
}

/// Demultiplex a side-band-64k framed byte stream (following the `NAK`
/// line) into the raw packfile bytes. Band 2 (progress) is forwarded to
/// `tracing::debug!`; band 3 (fatal error) aborts with `GitError::Protocol`.
pub fn demux(mut input: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut pack = Vec::new();

    loop {
        let (frame, consumed) = pktline::decode_one(input)?;
        input = &input[consumed..];

        match frame {
            PktLine::Flush => break,
            PktLine::Delim => {
                return Err(GitError::Protocol("unexpected delim-pkt in v1 side-band stream".into()).into())
            }
            PktLine::Data(data) => {
                if data.is_empty() {
                    return Err(GitError::Protocol("side-band frame missing channel byte".into()).into());
                }
                let (band, payload) = (data[0], &data[1..]);
                match band {
                    1 => pack.extend_from_slice(payload),
                    2 => {
                        if let Ok(text) = std::str::from_utf8(payload) {
                            debug!(target: "sideband-progress", "{}", text.trim_end());
                        }
                    }
                    3 => {
                        let message = String::from_utf8_lossy(payload).trim_end().to_string();
                        return Err(GitError::Protocol(format!("remote error: {message}")).into());
                    }
                    other => {
                        return Err(GitError::Protocol(format!("unknown side-band channel {other}")).into())
                    }
                }
            }
        }
    }

    Ok(pack)
}
