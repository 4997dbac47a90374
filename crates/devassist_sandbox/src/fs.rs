//! Sandbox file store.
//!
//! Generated files only ever land under `<project>/current/`. Every
//! requested path is resolved lexically against that directory and rejected
//! with [`SandboxError::PathEscape`] if it would leave it.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{SandboxError, SandboxResult};
use crate::paths::SandboxPaths;
use crate::project::ProjectId;

/// Directory names never descended into when listing a project.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".next",
    ".git",
    ".turbo",
    "dist",
    "build",
    ".cache",
];

/// A file inside a project sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxFile {
    /// Sandbox-relative path, `/`-separated
    pub path: String,
    /// Full file content
    pub content: String,
}

impl SandboxFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Outcome of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Paths whose content changed on disk
    pub written: Vec<String>,
    /// Paths that already held identical content
    pub unchanged: Vec<String>,
}

impl WriteReport {
    pub fn total(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }
}

/// Reads and writes generated files for projects.
#[derive(Debug, Clone)]
pub struct SandboxFiles {
    paths: SandboxPaths,
}

impl SandboxFiles {
    pub fn new(paths: SandboxPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &SandboxPaths {
        &self.paths
    }

    /// Write a batch of files into the project's `current/` tree.
    ///
    /// All paths are validated before the first write, so a batch containing
    /// an escaping path leaves the sandbox untouched. Existing files are
    /// replaced wholesale; identical content is left alone.
    pub fn write_files(&self, id: &ProjectId, files: &[SandboxFile]) -> SandboxResult<WriteReport> {
        self.paths.ensure_layout(id)?;
        let root = self.paths.current_dir(id);

        let resolved = files
            .iter()
            .map(|file| resolve_within(&root, &file.path).map(|abs| (abs, file)))
            .collect::<SandboxResult<Vec<_>>>()?;

        let mut report = WriteReport::default();
        for (abs, file) in resolved {
            let relative = relative_display(&root, &abs);

            if let Ok(existing) = fs::read(&abs) {
                if existing == file.content.as_bytes() {
                    report.unchanged.push(relative);
                    continue;
                }
            }

            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&abs, &file.content)?;
            report.written.push(relative);
        }

        info!(
            project_id = %id,
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            "Wrote sandbox files"
        );
        Ok(report)
    }

    /// List every file in the project's `current/` tree, sorted.
    pub fn list_files(&self, id: &ProjectId) -> SandboxResult<Vec<String>> {
        let root = self.paths.current_dir(id);
        if !root.exists() {
            return Ok(Vec::new());
        }

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !is_ignored_dir(entry));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(relative_display(&root, entry.path()));
            }
        }

        files.sort();
        Ok(files)
    }

    /// Read a single file. Returns `None` when it does not exist.
    pub fn read_file(&self, id: &ProjectId, relative_path: &str) -> SandboxResult<Option<String>> {
        let root = self.paths.current_dir(id);
        let abs = resolve_within(&root, relative_path)?;

        if !abs.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&abs)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Read a snapshot of the given paths, each truncated to `max_chars`
    /// characters. Missing paths are skipped.
    pub fn read_snapshot(
        &self,
        id: &ProjectId,
        paths: &[String],
        max_chars: usize,
    ) -> SandboxResult<Vec<SandboxFile>> {
        let mut snapshot = Vec::with_capacity(paths.len());
        for path in paths {
            match self.read_file(id, path)? {
                Some(content) => snapshot.push(SandboxFile::new(path.clone(), truncate_chars(&content, max_chars))),
                None => debug!(project_id = %id, path = %path, "Snapshot path missing, skipped"),
            }
        }
        Ok(snapshot)
    }
}

/// Resolve `target` under `base` without touching the filesystem.
///
/// Leading separators are stripped so absolute-looking paths are treated as
/// sandbox-relative. `..` segments may move up only within `base`.
pub fn resolve_within(base: &Path, target: &str) -> SandboxResult<PathBuf> {
    let clean = target.trim_start_matches(&['/', '\\'][..]);
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(clean).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(SandboxError::PathEscape(target.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SandboxError::PathEscape(target.to_string()));
            }
        }
    }

    if parts.is_empty() {
        return Err(SandboxError::InvalidEntry(format!(
            "path does not name a file: {:?}",
            target
        )));
    }

    let mut resolved = base.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

/// Truncate to at most `max_chars` characters, respecting UTF-8 boundaries.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => s[..byte_index].to_string(),
        None => s.to_string(),
    }
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| IGNORED_DIRS.contains(&name))
}

fn relative_display(root: &Path, abs: &Path) -> String {
    let relative = abs.strip_prefix(root).unwrap_or(abs);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SandboxFiles, ProjectId) {
        let temp = tempdir().unwrap();
        let files = SandboxFiles::new(SandboxPaths::new(temp.path()));
        (temp, files, ProjectId::new("p1").unwrap())
    }

    #[test]
    fn test_resolve_within_rules() {
        let base = Path::new("/sandbox/current");

        assert_eq!(
            resolve_within(base, "src/app.js").unwrap(),
            PathBuf::from("/sandbox/current/src/app.js")
        );
        assert_eq!(
            resolve_within(base, "/README.md").unwrap(),
            PathBuf::from("/sandbox/current/README.md")
        );
        assert_eq!(
            resolve_within(base, "a/../b.txt").unwrap(),
            PathBuf::from("/sandbox/current/b.txt")
        );
        assert_eq!(
            resolve_within(base, "./a/./b.txt").unwrap(),
            PathBuf::from("/sandbox/current/a/b.txt")
        );

        assert!(matches!(
            resolve_within(base, "../../etc/passwd"),
            Err(SandboxError::PathEscape(_))
        ));
        assert!(matches!(
            resolve_within(base, "a/../../x"),
            Err(SandboxError::PathEscape(_))
        ));
        assert!(matches!(
            resolve_within(base, "a/.."),
            Err(SandboxError::InvalidEntry(_))
        ));
    }

    #[test]
    fn test_write_and_read_back() {
        let (_temp, store, id) = store();

        let report = store
            .write_files(
                &id,
                &[
                    SandboxFile::new("index.html", "<h1>hi</h1>"),
                    SandboxFile::new("src/app.js", "console.log(1)"),
                ],
            )
            .unwrap();

        assert_eq!(report.written, vec!["index.html", "src/app.js"]);
        assert_eq!(
            store.read_file(&id, "src/app.js").unwrap().as_deref(),
            Some("console.log(1)")
        );
        assert_eq!(store.read_file(&id, "missing.txt").unwrap(), None);
    }

    #[test]
    fn test_escape_aborts_whole_batch() {
        let (temp, store, id) = store();

        let result = store.write_files(
            &id,
            &[
                SandboxFile::new("ok.txt", "fine"),
                SandboxFile::new("../../etc/passwd", "nope"),
            ],
        );

        assert!(matches!(result, Err(SandboxError::PathEscape(_))));
        assert!(store.list_files(&id).unwrap().is_empty());
        assert!(!temp.path().join("etc").exists());
        assert!(!temp.path().join("projects").join("etc").exists());
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let (_temp, store, id) = store();
        let batch = vec![
            SandboxFile::new("a.txt", "one"),
            SandboxFile::new("dir/b.txt", "two"),
        ];

        store.write_files(&id, &batch).unwrap();
        let listing = store.list_files(&id).unwrap();
        let abs = store.paths().current_dir(&id).join("a.txt");
        let mtime = fs::metadata(&abs).unwrap().modified().unwrap();

        let second = store.write_files(&id, &batch).unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged.len(), 2);
        assert_eq!(store.list_files(&id).unwrap(), listing);
        assert_eq!(fs::metadata(&abs).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn test_list_skips_tooling_dirs_and_sorts() {
        let (_temp, store, id) = store();
        store
            .write_files(
                &id,
                &[
                    SandboxFile::new("z.txt", ""),
                    SandboxFile::new("a/b.txt", ""),
                    SandboxFile::new("node_modules/pkg/index.js", ""),
                    SandboxFile::new(".git/HEAD", ""),
                    SandboxFile::new("dist/out.js", ""),
                    SandboxFile::new("src/build.rs", ""),
                ],
            )
            .unwrap();

        assert_eq!(
            store.list_files(&id).unwrap(),
            vec!["a/b.txt", "src/build.rs", "z.txt"]
        );
    }

    #[test]
    fn test_list_on_missing_project_is_empty() {
        let (_temp, store, _id) = store();
        let other = ProjectId::new("never-created").unwrap();
        assert!(store.list_files(&other).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_truncates_and_skips_missing() {
        let (_temp, store, id) = store();
        store
            .write_files(&id, &[SandboxFile::new("long.txt", "héllo world")])
            .unwrap();

        let snapshot = store
            .read_snapshot(&id, &["long.txt".to_string(), "gone.txt".to_string()], 5)
            .unwrap();

        assert_eq!(snapshot, vec![SandboxFile::new("long.txt", "héllo")]);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 2), "ab");
        assert_eq!(truncate_chars("ééé", 1), "é");
        assert_eq!(truncate_chars("", 0), "");
    }
}
