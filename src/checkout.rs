//! Working-tree checkout (§4.H): commit -> tree -> (subtree|blob) materialization.

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::error::GitError;
use crate::object::{self, ObjectKind, TreeIter};

/// Check out the working tree for `commit_sha` into `dest`, reading objects
/// from the store rooted at `root`.
pub fn checkout_commit(root: &Path, dest: &Path, commit_sha: &str) -> Result<()> {
    let (kind, payload) = object::read(root, commit_sha)?;
    ensure!(
        kind == ObjectKind::Commit,
        GitError::object(commit_sha, "HEAD does not point at a commit")
    );

    let text = String::from_utf8(payload)
        .map_err(|_| GitError::object(commit_sha, "commit payload is not valid UTF-8"))?;
    let tree_sha = text
        .lines()
        .find_map(|line| line.strip_prefix("tree "))
        .ok_or_else(|| GitError::object(commit_sha, "commit is missing a tree header"))?
        .to_string();

    checkout_tree(root, dest, &tree_sha)
}

fn refuse_if_nonempty(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.is_file() && meta.len() > 0 {
            return Err(GitError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite existing non-empty file {}", path.display()),
            ))
            .into());
        }
        if meta.file_type().is_symlink() {
            return Err(GitError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite existing symlink {}", path.display()),
            ))
            .into());
        }
        if meta.is_dir() && fs::read_dir(path).map(|mut d| d.next().is_some()).unwrap_or(false) {
            return Err(GitError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("refusing to overwrite existing non-empty directory {}", path.display()),
            ))
            .into());
        }
    }
    Ok(())
}

/// A tree entry name must be a single plain path component: no `/`, no
/// `..`, nothing that would let a malicious pack write outside `dest`.
fn validate_entry_name(name: &str) -> Result<()> {
    use std::path::Component;
    ensure!(
        !name.is_empty()
            && name != ".git"
            && matches!(Path::new(name).components().next(), Some(Component::Normal(_)))
            && Path::new(name).components().count() == 1,
        GitError::object(name, "tree entry name is not a safe path component")
    );
    Ok(())
}

fn checkout_tree(root: &Path, dest: &Path, tree_sha: &str) -> Result<()> {
    let (kind, payload) = object::read(root, tree_sha)?;
    ensure!(
        kind == ObjectKind::Tree,
        GitError::object(tree_sha, "expected a tree object")
    );

    for entry in TreeIter::new(&payload) {
        let (mode, name, sha) = entry.context("parsing tree entry")?;
        validate_entry_name(&name)?;
        let hex_sha = hex::encode(sha);
        let path = dest.join(&name);

        match mode.as_str() {
            "40000" => {
                fs::create_dir_all(&path)
                    .with_context(|| format!("creating directory {}", path.display()))?;
                checkout_tree(root, &path, &hex_sha)?;
            }
            "160000" => {
                // Gitlink/submodule: an empty directory, fetching submodules is out of scope (§4.H).
                fs::create_dir_all(&path)
                    .with_context(|| format!("creating gitlink placeholder {}", path.display()))?;
            }
            "120000" => {
                refuse_if_nonempty(&path)?;
                let (blob_kind, blob_payload) = object::read(root, &hex_sha)?;
                ensure!(
                    blob_kind == ObjectKind::Blob,
                    GitError::object(&hex_sha, "symlink target is not a blob")
                );
                let target = String::from_utf8(blob_payload)
                    .map_err(|_| GitError::object(&hex_sha, "symlink target is not UTF-8"))?;
                symlink(&target, &path)
                    .with_context(|| format!("creating symlink {}", path.display()))?;
            }
            "100644" | "100755" => {
                refuse_if_nonempty(&path)?;
                let (blob_kind, blob_payload) = object::read(root, &hex_sha)?;
                ensure!(
                    blob_kind == ObjectKind::Blob,
                    GitError::object(&hex_sha, "tree entry is not a blob")
                );
                fs::write(&path, &blob_payload)
                    .with_context(|| format!("writing file {}", path.display()))?;
                set_executable(&path, mode == "100755")
                    .with_context(|| format!("setting mode on {}", path.display()))?;
            }
            other => {
                return Err(GitError::object(tree_sha, format!("unsupported tree entry mode '{other}'")).into())
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn symlink(target: &str, path: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn symlink(_target: &str, _path: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are only supported on unix targets",
    ))
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    let mode = if executable { 0o755 } else { 0o644 };
    perms.set_mode(mode);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> std::io::Result<()> {
    Ok(())
}
