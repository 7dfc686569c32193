use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::object::{self, TreeEntry};

/// git write-tree command
pub fn invoke(root: &Path) -> anyhow::Result<()> {
    let Some(sha) = write_tree_for(root, root).context("constructing root tree object")? else {
        anyhow::bail!("refusing to write a tree object for an empty working tree");
    };

    println!("{}", hex::encode(sha));
    Ok(())
}

fn write_tree_for(root: &Path, path: &Path) -> anyhow::Result<Option<[u8; 20]>> {
    let dir = fs::read_dir(path).with_context(|| format!("opening directory {}", path.display()))?;

    let mut children = Vec::new();
    for entry in dir {
        let entry = entry.with_context(|| format!("bad directory entry in {}", path.display()))?;
        let file_name = entry.file_name();
        if file_name == ".git" {
            continue;
        }
        let metadata = entry.metadata().context("reading directory entry metadata")?;
        children.push((entry, file_name, metadata));
    }

    let mut entries = Vec::new();
    for (entry, file_name, metadata) in children {
        let name = file_name
            .into_string()
            .map_err(|_| anyhow::anyhow!("non-UTF-8 file name in {}", path.display()))?;

        let (mode, sha) = if metadata.is_dir() {
            match write_tree_for(root, &entry.path())? {
                Some(sha) => ("40000", sha),
                None => continue, // empty subdirectory, has nothing to record
            }
        } else if metadata.is_symlink() {
            let target = fs::read_link(entry.path())
                .with_context(|| format!("reading symlink {}", entry.path().display()))?;
            let canonical = object::encode_blob(target.to_string_lossy().as_bytes());
            ("120000", object::write(root, &canonical)?)
        } else {
            let data = fs::read(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            let canonical = object::encode_blob(&data);
            let sha = object::write(root, &canonical)?;
            let executable = is_executable(&metadata);
            (if executable { "100755" } else { "100644" }, sha)
        };

        entries.push(TreeEntry { mode, name, sha });
    }

    if entries.is_empty() {
        return Ok(None);
    }

    let canonical = object::encode_tree(&entries);
    Ok(Some(object::write(root, &canonical)?))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}
