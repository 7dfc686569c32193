use std::path::{Path, PathBuf};

use anyhow::ensure;

use crate::error::GitError;
use crate::object::{self, ObjectKind, TreeIter};

/// git ls-tree command
pub fn invoke(root: &Path, hash: &str, recurse: bool, name_only: bool) -> anyhow::Result<()> {
    list_tree(root, hash, recurse, name_only, None)
}

fn list_tree(
    root: &Path,
    hash: &str,
    recurse: bool,
    name_only: bool,
    path_prefix: Option<&Path>,
) -> anyhow::Result<()> {
    let (kind, payload) = object::read(root, hash)?;
    ensure!(
        kind == ObjectKind::Tree,
        GitError::object(hash, format!("expected a tree, got {kind}"))
    );

    for entry in TreeIter::new(&payload) {
        let (mode, name, sha) = entry?;
        let hex_sha = hex::encode(sha);
        let kind = if mode.starts_with('4') {
            ObjectKind::Tree
        } else {
            ObjectKind::Blob
        };

        if recurse && kind == ObjectKind::Tree {
            let prefix = match path_prefix {
                Some(p) => p.join(&name),
                None => PathBuf::from(&name),
            };
            list_tree(root, &hex_sha, recurse, name_only, Some(&prefix))?;
            continue;
        }

        let display_name = match path_prefix {
            Some(p) => p.join(&name),
            None => PathBuf::from(&name),
        };

        if name_only {
            println!("{}", display_name.display());
        } else {
            println!(
                "{:0>6} {} {}\t{}",
                mode,
                kind,
                hex_sha,
                display_name.display()
            );
        }
    }

    Ok(())
}
