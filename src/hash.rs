use sha1::{Digest, Sha1};

/// Streaming SHA-1, finalized once. Used both for object identity (§4.A)
/// and for verifying a packfile's trailing checksum over a byte range that
/// is built up incrementally during the scan pass.
pub struct Hasher {
    inner: Sha1,
}

impl Hasher {
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(self) -> [u8; 20] {
        self.inner.finalize().into()
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot SHA-1 over a full byte slice.
pub fn sha1(bytes: &[u8]) -> [u8; 20] {
    Sha1::digest(bytes).into()
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(sha1(bytes))
}
