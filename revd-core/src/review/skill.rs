//! Skill files shipped inside the reviewed repository

use std::path::{Path, PathBuf};

use crate::Result;

/// Paths tried for `skill`, relative to the worktree, in order
pub fn skill_candidates(skill: &str) -> [PathBuf; 2] {
    [
        Path::new(".claude").join("skills").join(skill).join("SKILL.md"),
        Path::new(".claude").join("commands").join(format!("{skill}.md")),
    ]
}

/// Message posted when no skill file exists
pub fn missing_skill_message(skill: &str) -> String {
    format!(
        "Skill file not found. Tried:\n- `.claude/skills/{skill}/SKILL.md`\n- `.claude/commands/{skill}.md`"
    )
}

/// Read the first existing skill file for `skill` under `worktree`
///
/// Returns the path it was read from with its contents, or `None` when
/// neither candidate exists.
pub fn load_skill(worktree: &Path, skill: &str) -> Result<Option<(PathBuf, String)>> {
    for candidate in skill_candidates(skill) {
        let path = worktree.join(candidate);
        if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            return Ok(Some((path, content)));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_prefers_skill_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".claude/skills/review-pr/SKILL.md", "from skills");
        write(dir.path(), ".claude/commands/review-pr.md", "from commands");

        let (path, content) = load_skill(dir.path(), "review-pr").unwrap().unwrap();
        assert_eq!(content, "from skills");
        assert!(path.ends_with("SKILL.md"));
    }

    #[test]
    fn test_falls_back_to_command_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".claude/commands/review-pr.md", "from commands");

        let (_, content) = load_skill(dir.path(), "review-pr").unwrap().unwrap();
        assert_eq!(content, "from commands");
    }

    #[test]
    fn test_missing_skill_lists_both_paths() {
        let dir = TempDir::new().unwrap();
        assert!(load_skill(dir.path(), "security").unwrap().is_none());

        let msg = missing_skill_message("security");
        assert!(msg.contains(".claude/skills/security/SKILL.md"));
        assert!(msg.contains(".claude/commands/security.md"));
    }
}
