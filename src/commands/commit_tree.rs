use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{ensure, Context};

use crate::error::GitError;
use crate::object::{self, Identity, ObjectKind};

const AUTHOR_NAME: &str = "mini-git";
const AUTHOR_EMAIL: &str = "mini-git@localhost";

/// git commit-tree command
pub fn invoke(
    root: &Path,
    tree_sha: &str,
    message: &str,
    parents: &[String],
) -> anyhow::Result<[u8; 20]> {
    let (kind, _) = object::read(root, tree_sha)
        .with_context(|| format!("tree object {tree_sha} does not exist"))?;
    ensure!(
        kind == ObjectKind::Tree,
        GitError::object(tree_sha, "commit-tree requires a tree object")
    );

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("current system time is before UNIX epoch")?;
    let identity = Identity {
        name: AUTHOR_NAME.to_string(),
        email: AUTHOR_EMAIL.to_string(),
        timestamp: now.as_secs() as i64,
        tz_offset: "+0000".to_string(),
    };

    let canonical = object::encode_commit(tree_sha, parents, &identity, &identity, message);
    object::write(root, &canonical)
}
