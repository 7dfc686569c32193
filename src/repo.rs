//! Repository initialization (§4.I).

use std::fs;
use std::path::{Component, Path};

use anyhow::{ensure, Context, Result};

use crate::error::GitError;

/// Reject branch names that would escape `refs/heads/` when joined onto a
/// path, e.g. a remote's `symref` capability advertising `../../etc/passwd`.
fn validate_branch_name(branch: &str) -> Result<()> {
    ensure!(
        !branch.is_empty() && Path::new(branch).components().all(|c| matches!(c, Component::Normal(_))),
        GitError::Protocol(format!("refusing unsafe branch name '{branch}'"))
    );
    Ok(())
}

/// Create the `.git` skeleton rooted at `root` and point `HEAD` at
/// `refs/heads/main`. Idempotent: repeated invocations leave the
/// repository in the same final state.
pub fn create_git_dirs(root: &Path) -> Result<()> {
    let git_dir = root.join(".git");
    fs::create_dir_all(git_dir.join("objects")).context("creating objects directory")?;
    fs::create_dir_all(git_dir.join("refs/heads")).context("creating refs/heads directory")?;
    fs::create_dir_all(git_dir.join("refs/tags")).context("creating refs/tags directory")?;
    fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").context("writing HEAD")?;
    Ok(())
}

/// Write `refs/heads/<name>` to point at `sha`.
pub fn write_branch_ref(root: &Path, branch: &str, sha: &str) -> Result<()> {
    validate_branch_name(branch)?;
    let path = root.join(".git").join("refs").join("heads").join(branch);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, format!("{sha}\n")).with_context(|| format!("writing ref {}", path.display()))
}

/// Point `HEAD` at a branch (symbolic ref).
pub fn set_head_to_branch(root: &Path, branch: &str) -> Result<()> {
    validate_branch_name(branch)?;
    fs::write(
        root.join(".git").join("HEAD"),
        format!("ref: refs/heads/{branch}\n"),
    )
    .context("writing HEAD")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_is_idempotent() {
        let dir = tempdir().unwrap();
        create_git_dirs(dir.path()).unwrap();
        let head_once = fs::read_to_string(dir.path().join(".git/HEAD")).unwrap();
        create_git_dirs(dir.path()).unwrap();
        let head_twice = fs::read_to_string(dir.path().join(".git/HEAD")).unwrap();
        assert_eq!(head_once, head_twice);
        assert_eq!(head_once, "ref: refs/heads/main\n");
    }

    #[test]
    fn rejects_branch_names_that_escape_refs_heads() {
        let dir = tempdir().unwrap();
        create_git_dirs(dir.path()).unwrap();
        assert!(write_branch_ref(dir.path(), "../../evil", &"a".repeat(40)).is_err());
        assert!(set_head_to_branch(dir.path(), "../../evil").is_err());
    }
}
