//! Commit lookups through libgit2

use std::path::Path;

use git2::Repository;

use crate::{Error, Result};

fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            Error::Git(format!("Not a git repository: {}", path.display()))
        } else {
            Error::Git(format!("Git error: {}", e))
        }
    })
}

/// Commit checked out in the working tree at `path`
pub fn head_commit(path: &Path) -> Result<String> {
    let repo = open(path)?;
    let commit = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .map_err(|e| Error::Git(format!("Failed to resolve HEAD in {}: {}", path.display(), e)))?;
    Ok(commit.id().to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::init_with_commit;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_head_commit() {
        let dir = TempDir::new().unwrap();
        let sha = init_with_commit(dir.path(), "main");
        assert_eq!(head_commit(dir.path()).unwrap(), sha);
    }

    #[test]
    fn test_open_non_git_dir() {
        let dir = TempDir::new().unwrap();
        let err = head_commit(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Not a git repository"));
    }
}
