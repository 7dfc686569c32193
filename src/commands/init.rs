use std::path::Path;

use anyhow::Context;

use crate::repo;

/// git init command
pub fn invoke(root: &Path) -> anyhow::Result<()> {
    repo::create_git_dirs(root).context("creating git directories")?;
    println!("Initialized empty Git repository in {}", root.join(".git").display());
    Ok(())
}
