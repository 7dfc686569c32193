use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::object;

/// git hash-object command
pub fn invoke(root: &Path, path: &Path, write: bool) -> anyhow::Result<[u8; 20]> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let canonical = object::encode_blob(&data);

    if write {
        object::write(root, &canonical)
    } else {
        Ok(crate::hash::sha1(&canonical))
    }
}
