use thiserror::Error;

/// Crate-wide error taxonomy, mirrored onto the exit codes in the CLI driver.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("pack error{}: {message}", index.map(|i| format!(" (object {i})")).unwrap_or_default())]
    Pack {
        index: Option<u32>,
        message: String,
    },

    #[error("object error{}: {message}", sha.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
    Object {
        sha: Option<String>,
        message: String,
    },
}

impl GitError {
    pub fn pack(message: impl Into<String>) -> Self {
        GitError::Pack {
            index: None,
            message: message.into(),
        }
    }

    pub fn pack_at(index: u32, message: impl Into<String>) -> Self {
        GitError::Pack {
            index: Some(index),
            message: message.into(),
        }
    }

    pub fn object(sha: impl Into<String>, message: impl Into<String>) -> Self {
        GitError::Object {
            sha: Some(sha.into()),
            message: message.into(),
        }
    }

    /// Exit code per the spec's error taxonomy (§7): usage/I-O exit 1, protocol/pack/object exit 128.
    pub fn exit_code(&self) -> i32 {
        match self {
            GitError::Usage(_) | GitError::Io(_) => 1,
            GitError::Protocol(_) | GitError::Pack { .. } | GitError::Object { .. } => 128,
        }
    }
}

/// Walks an anyhow error chain looking for a `GitError`, used by `main` to
/// pick the exit code. A chain with no `GitError` cause (a bare `anyhow!` or
/// plain I/O bubbled through `Context`) is treated as a usage/I-O failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(git_err) = cause.downcast_ref::<GitError>() {
            return git_err.exit_code();
        }
    }
    1
}
