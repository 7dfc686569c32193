//! Clone integration test against a local fixture Smart HTTP v1 server
//! (§4.N, §8 scenario 6 narrowed to a synthetic fixture — no external
//! network access here).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::thread;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use tempfile::tempdir;

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn sha1_bytes(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn canonical(kind: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(kind.as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    out
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn pkt_line(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() + 4;
    let mut out = format!("{len:04x}").into_bytes();
    out.extend_from_slice(payload);
    out
}

fn pkt_flush() -> Vec<u8> {
    b"0000".to_vec()
}

fn obj_header_byte(type_code: u8, mut size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut first = 0x80 | (type_code << 4) | (size as u8 & 0x0f);
    size >>= 4;
    if size == 0 {
        first &= 0x7f;
    }
    out.push(first);
    while size > 0 {
        let mut b = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            b |= 0x80;
        }
        out.push(b);
    }
    out
}

fn varint_size(mut value: usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

/// Builds a fixture pack with four objects: a base blob, an ofs-delta blob
/// derived from it, a tree pointing at the derived blob, and a commit
/// pointing at the tree. Returns `(pack_bytes, commit_sha_hex)`.
fn build_fixture_pack() -> (Vec<u8>, String) {
    let mut objects = Vec::new();
    let mut offsets = Vec::new();
    let mut running = 12usize; // "PACK" + version + count

    // Object 0: base blob "hello"
    let base_payload = b"hello".to_vec();
    let base_canonical = canonical("blob", &base_payload);
    let base_sha = sha1_bytes(&base_canonical);
    let mut entry0 = obj_header_byte(3, base_payload.len());
    entry0.extend(deflate(&base_payload));
    offsets.push(running);
    running += entry0.len();
    objects.push(entry0);

    // Object 1: ofs-delta blob "hello" -> "hello world"
    let target_payload = b"hello world".to_vec();
    let mut delta_body = varint_size(base_payload.len());
    delta_body.extend(varint_size(target_payload.len()));
    delta_body.push(0b1001_0000); // copy, size byte 0 present, offset implicit 0
    delta_body.push(base_payload.len() as u8); // copy 5 bytes
    delta_body.push(6); // insert 6 bytes: " world"
    delta_body.extend_from_slice(b" world");

    let base_start = offsets[0];
    let this_start = running;
    let back = (this_start - base_start) as u8;
    let mut entry1 = obj_header_byte(6, delta_body.len());
    entry1.push(back); // single-byte varint, no continuation
    entry1.extend(deflate(&delta_body));
    offsets.push(running);
    running += entry1.len();
    objects.push(entry1);

    let target_sha = sha1_bytes(&canonical("blob", &target_payload));

    // Object 2: tree { "hello.txt" -> target_sha }
    let mut tree_payload = Vec::new();
    tree_payload.extend_from_slice(b"100644 hello.txt");
    tree_payload.push(0);
    tree_payload.extend_from_slice(&target_sha);
    let tree_canonical = canonical("tree", &tree_payload);
    let tree_sha = sha1_bytes(&tree_canonical);
    let mut entry2 = obj_header_byte(2, tree_payload.len());
    entry2.extend(deflate(&tree_payload));
    offsets.push(running);
    running += entry2.len();
    objects.push(entry2);

    // Object 3: commit -> tree
    let commit_text = format!(
        "tree {}\nauthor fixture <fixture@example.com> 0 +0000\ncommitter fixture <fixture@example.com> 0 +0000\n\nfixture commit\n",
        hex::encode(tree_sha)
    );
    let commit_canonical = canonical("commit", commit_text.as_bytes());
    let commit_sha = sha1_bytes(&commit_canonical);
    let mut entry3 = obj_header_byte(1, commit_text.len());
    entry3.extend(deflate(commit_text.as_bytes()));
    objects.push(entry3);

    let _ = &base_sha;

    let mut pack = Vec::new();
    pack.extend_from_slice(b"PACK");
    pack.extend_from_slice(&2u32.to_be_bytes());
    pack.extend_from_slice(&(objects.len() as u32).to_be_bytes());
    for entry in &objects {
        pack.extend_from_slice(entry);
    }
    let checksum = sha1_bytes(&pack);
    pack.extend_from_slice(&checksum);

    (pack, hex::encode(commit_sha))
}

fn build_advertisement(commit_sha: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pkt_line(b"# service=git-upload-pack\n"));
    out.extend(pkt_flush());
    let first_line = format!(
        "{commit_sha} HEAD\0multi_ack_detailed side-band-64k ofs-delta symref=HEAD:refs/heads/main\n"
    );
    out.extend(pkt_line(first_line.as_bytes()));
    out.extend(pkt_line(format!("{commit_sha} refs/heads/main\n").as_bytes()));
    out.extend(pkt_flush());
    out
}

fn build_upload_pack_response(pack: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pkt_line(b"NAK\n"));
    // side-band-64k channel 1 framing around the whole pack, one frame.
    let mut band = vec![1u8];
    band.extend_from_slice(pack);
    out.extend(pkt_line(&band));
    out.extend(pkt_flush());
    out
}

fn read_http_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf).unwrap();
        data.extend_from_slice(&buf[..n]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") || n == 0 {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data).to_string();
    let request_line = text.lines().next().unwrap_or_default().to_string();
    (request_line, data)
}

fn write_response(stream: &mut TcpStream, content_type: &str, body: &[u8]) {
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).unwrap();
    stream.write_all(body).unwrap();
    stream.flush().unwrap();
}

#[test]
fn clone_decodes_fixture_pack_and_checks_out_tree() {
    let (pack, commit_sha) = build_fixture_pack();
    let advertisement = build_advertisement(&commit_sha);
    let upload_pack_response = build_upload_pack_response(&pack);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().unwrap();
            let (request_line, _) = read_http_request(&mut stream);
            if request_line.contains("/info/refs") {
                write_response(
                    &mut stream,
                    "application/x-git-upload-pack-advertisement",
                    &advertisement,
                );
            } else if request_line.contains("/git-upload-pack") {
                write_response(
                    &mut stream,
                    "application/x-git-upload-pack-result",
                    &upload_pack_response,
                );
            }
        }
    });

    let dest = tempdir().unwrap();
    let clone_dir = dest.path().join("cloned");
    let repo_url = format!("http://{addr}/repo");

    let out = Command::new(env!("CARGO_BIN_EXE_mini-git"))
        .args(["clone", &repo_url, clone_dir.to_str().unwrap()])
        .output()
        .expect("failed to run mini-git clone");

    server.join().unwrap();

    assert!(out.status.success(), "{:?}", out);

    let content = std::fs::read_to_string(clone_dir.join("hello.txt")).unwrap();
    assert_eq!(content, "hello world");

    let head = std::fs::read_to_string(clone_dir.join(".git/HEAD")).unwrap();
    assert_eq!(head, "ref: refs/heads/main\n");

    let branch_ref = std::fs::read_to_string(clone_dir.join(".git/refs/heads/main")).unwrap();
    assert_eq!(branch_ref.trim(), commit_sha);
}

#[test]
fn sha1_hex_matches_known_digest() {
    assert_eq!(
        sha1_hex(b"blob 5\0hello"),
        "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
    );
}
