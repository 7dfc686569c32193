use std::io::Write as _;
use std::path::Path;

use anyhow::ensure;

use crate::error::GitError;
use crate::object;

/// git cat-file command
pub fn invoke(root: &Path, hash: &str, type_only: bool, size_only: bool, pretty_print: bool) -> anyhow::Result<()> {
    let (kind, payload) = object::read(root, hash)?;

    if type_only {
        println!("{kind}");
        return Ok(());
    }

    if size_only {
        println!("{}", payload.len());
        return Ok(());
    }

    ensure!(
        pretty_print,
        GitError::Usage("one of -t, -s, or -p is required".to_string())
    );

    std::io::stdout().write_all(&payload)?;
    Ok(())
}
