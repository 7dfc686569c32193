//! Smart HTTP v1 client (§4.F): reference discovery and the upload-pack RPC.

use anyhow::{ensure, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};

use crate::error::GitError;
use crate::pktline::{self, PktLine};
use crate::sideband::{self, SidebandMode};

const SERVICE: &str = "git-upload-pack";
const AGENT: &str = "git/2.0.0-rust-mini";

/// Capabilities this client knows how to exploit, requested only when the
/// server also advertises them (§4.F).
const DESIRED_CAPABILITIES: &[&str] = &["multi_ack_detailed", "side-band-64k", "ofs-delta"];

/// The parsed `info/refs` advertisement (§4.F "Ref discovery").
pub struct Advertisement {
    /// `refname -> sha`, in advertised order, including the synthetic
    /// `HEAD` pseudo-ref if the server sent one.
    pub refs: Vec<(String, String)>,
    pub capabilities: Vec<String>,
}

impl Advertisement {
    pub fn head_sha(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|(name, _)| name == "HEAD")
            .map(|(_, sha)| sha.as_str())
    }

    /// `symref=HEAD:refs/heads/<name>` from the capability list, naming the
    /// branch HEAD points at (§4.F, §9 Open Question resolution).
    pub fn head_symref_target(&self) -> Option<&str> {
        self.capabilities
            .iter()
            .find_map(|c| c.strip_prefix("symref=HEAD:"))
    }
}

fn strip_trailing_newline(s: &str) -> &str {
    s.strip_suffix('\n').unwrap_or(s)
}

/// `GET <repo>/info/refs?service=git-upload-pack` (§4.F).
pub fn discover_refs(repo_url: &str) -> Result<Advertisement> {
    let url = format!("{repo_url}/info/refs?service={SERVICE}");
    let client = Client::new();
    let resp = client
        .get(&url)
        .header(USER_AGENT, AGENT)
        .send()
        .with_context(|| format!("requesting {url}"))?;

    ensure!(
        resp.status().is_success(),
        GitError::Protocol(format!("{url} returned {}", resp.status()))
    );

    let expected_ct = format!("application/x-{SERVICE}-advertisement");
    match resp.headers().get(CONTENT_TYPE) {
        Some(ct) if ct.to_str().unwrap_or_default() == expected_ct => {}
        Some(ct) => {
            return Err(GitError::Protocol(format!(
                "unexpected Content-Type '{}', server may not support the smart protocol",
                ct.to_str().unwrap_or("<invalid>")
            ))
            .into())
        }
        None => {
            return Err(GitError::Protocol("missing Content-Type header in ref advertisement".into()).into())
        }
    }

    let body = resp.bytes().context("reading ref advertisement body")?;
    parse_advertisement(&body)
}

fn parse_advertisement(mut data: &[u8]) -> Result<Advertisement> {
    let (frame, consumed) = pktline::decode_one(data)?;
    data = &data[consumed..];
    match frame {
        PktLine::Data(payload) => {
            let text = String::from_utf8_lossy(&payload);
            let text = strip_trailing_newline(&text);
            ensure!(
                text == format!("# service={SERVICE}"),
                GitError::Protocol(format!("unexpected first pkt-line '{text}'"))
            );
        }
        _ => return Err(GitError::Protocol("advertisement is missing the service line".into()).into()),
    }

    let (frame, consumed) = pktline::decode_one(data)?;
    data = &data[consumed..];
    ensure!(
        matches!(frame, PktLine::Flush),
        GitError::Protocol("expected flush after service line".into())
    );

    let mut refs = Vec::new();
    let mut capabilities = Vec::new();
    let mut first = true;

    loop {
        let (frame, consumed) = pktline::decode_one(data)?;
        data = &data[consumed..];
        match frame {
            PktLine::Flush => break,
            PktLine::Delim => {
                return Err(GitError::Protocol("protocol v2 delim-pkt in v1 advertisement".into()).into())
            }
            PktLine::Data(payload) => {
                let text = String::from_utf8_lossy(&payload).into_owned();
                let text = strip_trailing_newline(&text);
                let ref_info = if let Some((info, caps)) = text.split_once('\0') {
                    ensure!(
                        first,
                        GitError::Protocol("capability list attached to a non-first ref line".into())
                    );
                    capabilities = caps.split_whitespace().map(String::from).collect();
                    info
                } else {
                    text
                };
                let (sha, name) = ref_info
                    .split_once(' ')
                    .ok_or_else(|| GitError::Protocol(format!("malformed ref line '{ref_info}'")))?;
                refs.push((name.to_string(), sha.to_string()));
                first = false;
            }
        }
        if data.is_empty() {
            return Err(GitError::Protocol("advertisement ended without a final flush".into()).into());
        }
    }

    Ok(Advertisement { refs, capabilities })
}

/// Intersect our desired capabilities with what the server advertised, and
/// append our agent string (§4.F).
pub fn negotiate_capabilities(server_capabilities: &[String]) -> Vec<String> {
    let mut caps: Vec<String> = DESIRED_CAPABILITIES
        .iter()
        .filter(|wanted| server_capabilities.iter().any(|c| c == *wanted))
        .map(|s| s.to_string())
        .collect();
    caps.push(format!("agent={AGENT}"));
    caps
}

fn build_want_request(wants: &[String], capabilities: &[String]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, want) in wants.iter().enumerate() {
        let mut line = format!("want {want}");
        if i == 0 && !capabilities.is_empty() {
            line.push(' ');
            line.push_str(&capabilities.join(" "));
        }
        line.push('\n');
        body.extend(pktline::encode(line.as_bytes()));
    }
    body.extend(pktline::flush());
    body.extend(pktline::encode(b"done\n"));
    body
}

/// `POST <repo>/git-upload-pack` (§4.F "Upload-pack request"). Returns the
/// raw packfile bytes after the side-band is demultiplexed (or passed
/// through untouched, per the negotiated `SidebandMode`).
pub fn request_pack(
    repo_url: &str,
    wants: &[String],
    capabilities: &[String],
    mode: SidebandMode,
) -> Result<Vec<u8>> {
    let url = format!("{repo_url}/{SERVICE}");
    let body = build_want_request(wants, capabilities);

    let client = Client::new();
    let resp = client
        .post(&url)
        .header(USER_AGENT, AGENT)
        .header(CONTENT_TYPE, "application/x-git-upload-pack-request")
        .header(ACCEPT, "application/x-git-upload-pack-result")
        .body(body)
        .send()
        .with_context(|| format!("posting upload-pack request to {url}"))?;

    ensure!(
        resp.status().is_success(),
        GitError::Protocol(format!("{url} returned {}", resp.status()))
    );

    match resp.headers().get(CONTENT_TYPE) {
        Some(ct) if ct.to_str().unwrap_or_default() == "application/x-git-upload-pack-result" => {}
        Some(ct) => {
            return Err(GitError::Protocol(format!(
                "unexpected Content-Type '{}' from upload-pack",
                ct.to_str().unwrap_or("<invalid>")
            ))
            .into())
        }
        None => return Err(GitError::Protocol("missing Content-Type header from upload-pack".into()).into()),
    }

    let data = resp.bytes().context("reading upload-pack response body")?;
    let mut data: &[u8] = &data;

    let (frame, consumed) = pktline::decode_one(data)?;
    data = &data[consumed..];
    match frame {
        PktLine::Data(payload) => {
            let text = String::from_utf8_lossy(&payload);
            let text = strip_trailing_newline(&text);
            ensure!(
                text == "NAK" || text.starts_with("ACK"),
                GitError::Protocol(format!("expected NAK/ACK line, got '{text}'"))
            );
        }
        _ => return Err(GitError::Protocol("upload-pack response missing NAK/ACK line".into()).into()),
    }

    match mode {
        SidebandMode::Demux => sideband::demux(data),
        SidebandMode::Raw => Ok(data.to_vec()),
    }
}
