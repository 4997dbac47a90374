//! # devassist_sandbox
//!
//! Isolated per-project directory trees for generated applications.
//!
//! Each project owns `<root>/projects/<id>/`. Generated code is written to
//! `current/` only, through [`SandboxFiles`], which refuses any path that
//! resolves outside that directory.
//!
//! ## Example
//!
//! ```rust,no_run
//! use devassist_sandbox::{ProjectId, SandboxFile, SandboxFiles, SandboxPaths};
//!
//! let files = SandboxFiles::new(SandboxPaths::new("/tmp/sandbox"));
//! let id = ProjectId::new("demo").unwrap();
//!
//! files.write_files(&id, &[SandboxFile::new("README.md", "# Demo")]).unwrap();
//! assert_eq!(files.list_files(&id).unwrap(), vec!["README.md"]);
//! ```

pub mod error;
pub mod fs;
pub mod paths;
pub mod project;

pub use error::{SandboxError, SandboxResult};
pub use fs::{resolve_within, truncate_chars, SandboxFile, SandboxFiles, WriteReport, IGNORED_DIRS};
pub use paths::SandboxPaths;
pub use project::{ProjectId, MAX_PROJECT_ID_LEN};
