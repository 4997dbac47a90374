//! On-disk layout of the sandbox.
//!
//! ```text
//! <root>/projects/<projectId>/
//! ├── meta.json     # Project metadata document
//! ├── chat.json     # Bounded chat transcript
//! ├── current/      # Generated file tree (the only tree read or written)
//! ├── versions/     # Reserved
//! ├── staging/      # Reserved
//! └── template/     # Reserved
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SandboxResult;
use crate::project::ProjectId;

/// Resolves per-project locations under a single data root.
#[derive(Debug, Clone)]
pub struct SandboxPaths {
    root: PathBuf,
}

impl SandboxPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the data root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every project
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn project_dir(&self, id: &ProjectId) -> PathBuf {
        self.projects_dir().join(id.as_str())
    }

    pub fn meta_path(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("meta.json")
    }

    pub fn chat_path(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("chat.json")
    }

    /// Working directory of the generated project.
    pub fn current_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("current")
    }

    pub fn versions_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("versions")
    }

    pub fn staging_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("staging")
    }

    pub fn template_dir(&self, id: &ProjectId) -> PathBuf {
        self.project_dir(id).join("template")
    }

    /// Create the project directory and all four sub-trees.
    pub fn ensure_layout(&self, id: &ProjectId) -> SandboxResult<()> {
        for dir in [
            self.current_dir(id),
            self.versions_dir(id),
            self.staging_dir(id),
            self.template_dir(id),
        ] {
            fs::create_dir_all(&dir)?;
        }
        debug!(project_id = %id, "Sandbox layout ensured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let paths = SandboxPaths::new("/data");
        let id = ProjectId::new("p1").unwrap();

        assert_eq!(paths.project_dir(&id), PathBuf::from("/data/projects/p1"));
        assert_eq!(paths.meta_path(&id), PathBuf::from("/data/projects/p1/meta.json"));
        assert_eq!(paths.chat_path(&id), PathBuf::from("/data/projects/p1/chat.json"));
        assert_eq!(paths.current_dir(&id), PathBuf::from("/data/projects/p1/current"));
    }

    #[test]
    fn test_ensure_layout_creates_reserved_dirs_empty() {
        let temp = tempdir().unwrap();
        let paths = SandboxPaths::new(temp.path());
        let id = ProjectId::new("p1").unwrap();

        paths.ensure_layout(&id).unwrap();
        paths.ensure_layout(&id).unwrap();

        for dir in [
            paths.current_dir(&id),
            paths.versions_dir(&id),
            paths.staging_dir(&id),
            paths.template_dir(&id),
        ] {
            assert!(dir.is_dir());
            assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        }
    }
}
