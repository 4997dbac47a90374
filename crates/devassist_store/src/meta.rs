//! Project metadata document.
//!
//! One `meta.json` per project. Every write is read, shallow-merge, write,
//! with `updatedAt` refreshed. `version` only moves through
//! [`MetaStore::record_build`].

use std::fs;

use chrono::{DateTime, Utc};
use devassist_sandbox::{truncate_chars, ProjectId, SandboxPaths};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::lock::DocumentGuards;

/// Maximum length of [`BuildSpec::one_liner`].
pub const ONE_LINER_MAX_CHARS: usize = 140;

/// Maximum number of entries in [`BuildSpec::core_features`].
pub const MAX_CORE_FEATURES: usize = 8;

/// Maximum number of generated images kept per project.
pub const MAX_IMAGES: usize = 20;

/// One-liner used when the originating message is blank.
pub const DEFAULT_ONE_LINER: &str = "App build in progress.";

/// Target platform of a generated application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Ios,
    Android,
    IosAndroid,
}

impl Platform {
    /// Locked framework and language for this platform.
    pub fn stack(&self) -> (Framework, Language) {
        match self {
            Self::Web => (Framework::Nextjs, Language::Javascript),
            Self::IosAndroid => (Framework::SharedMobile, Language::Javascript),
            Self::Ios => (Framework::Swift, Language::Swift),
            Self::Android => (Framework::Kotlin, Language::Kotlin),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::IosAndroid => "ios_android",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Nextjs,
    SharedMobile,
    Swift,
    Kotlin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Javascript,
    Typescript,
    Swift,
    Kotlin,
}

/// Locked build specification of a project.
///
/// Everything except `core_features` is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    pub platform: Platform,
    pub framework: Framework,
    pub language: Language,
    pub app_name: String,
    pub one_liner: String,
    #[serde(default)]
    pub core_features: Vec<String>,
}

impl BuildSpec {
    /// Create a spec from the platform lock table.
    pub fn lock(platform: Platform, app_name: impl Into<String>, one_liner: &str) -> Self {
        let (framework, language) = platform.stack();
        let one_liner = truncate_chars(one_liner.trim(), ONE_LINER_MAX_CHARS);
        Self {
            platform,
            framework,
            language,
            app_name: app_name.into(),
            one_liner: if one_liner.is_empty() {
                DEFAULT_ONE_LINER.to_string()
            } else {
                one_liner
            },
            core_features: Vec::new(),
        }
    }

    /// Prepend a feature summary, dropping case-insensitive duplicates and
    /// keeping at most [`MAX_CORE_FEATURES`] entries (newest first).
    pub fn push_feature(&mut self, summary: &str) {
        let summary = summary.trim();
        let mut merged: Vec<String> = Vec::with_capacity(self.core_features.len() + 1);
        let candidates = (!summary.is_empty())
            .then(|| summary.to_string())
            .into_iter()
            .chain(self.core_features.drain(..));

        for feature in candidates {
            let lower = feature.to_lowercase();
            if !merged.iter().any(|seen| seen.to_lowercase() == lower) {
                merged.push(feature);
            }
        }
        merged.truncate(MAX_CORE_FEATURES);
        self.core_features = merged;
    }
}

/// Running preview process recorded for a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewState {
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

impl PreviewState {
    /// A preview started now on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            started_at: Utc::now(),
        }
    }
}

/// A generated UI mockup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

impl ImageRecord {
    pub fn new(prompt: impl Into<String>, url: Option<String>, data_url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            prompt: prompt.into(),
            url,
            data_url,
        }
    }
}

/// The per-project metadata document.
///
/// Absent fields deserialize to their defaults, so documents written by
/// older builds keep loading. A missing `id` is filled from the document's
/// location by [`MetaStore::read`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub id: ProjectId,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_spec: Option<BuildSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_image: Option<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_clarification: Option<String>,
    #[serde(default)]
    pub built: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build_at: Option<DateTime<Utc>>,
}

impl ProjectMeta {
    /// Fresh document for a project that has never been written.
    pub fn new(id: ProjectId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            title: None,
            description: None,
            build_spec: None,
            memory: None,
            version: 0,
            images: Vec::new(),
            last_image: None,
            preview: None,
            pending_clarification: None,
            built: false,
            entry: None,
            files: Vec::new(),
            last_build_at: None,
        }
    }

    /// Memory text, empty when none was recorded yet.
    pub fn memory_text(&self) -> &str {
        self.memory.as_deref().unwrap_or("")
    }

    /// Display name used when locking a build spec.
    pub fn app_name(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Project {}", self.id),
        }
    }
}

/// Fields a plain metadata write may change.
///
/// The build spec is not among them: it is set once through
/// [`MetaStore::lock_build_spec`]. `None` keeps the stored value. `pending_clarification` is doubly optional
/// so it can be cleared (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct MetaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub memory: Option<String>,
    pub preview: Option<PreviewState>,
    pub pending_clarification: Option<Option<String>>,
}

impl MetaPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    pub fn preview(mut self, preview: PreviewState) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn pending_clarification(mut self, message: impl Into<String>) -> Self {
        self.pending_clarification = Some(Some(message.into()));
        self
    }

    pub fn clear_pending_clarification(mut self) -> Self {
        self.pending_clarification = Some(None);
        self
    }

    fn apply(self, meta: &mut ProjectMeta) {
        if let Some(title) = self.title {
            meta.title = Some(title);
        }
        if let Some(description) = self.description {
            meta.description = Some(description);
        }
        if let Some(memory) = self.memory {
            meta.memory = Some(memory);
        }
        if let Some(preview) = self.preview {
            meta.preview = Some(preview);
        }
        if let Some(pending) = self.pending_clarification {
            meta.pending_clarification = pending;
        }
    }
}

/// Result of a successful build, applied in one metadata write.
#[derive(Debug, Clone)]
pub struct BuildCompletion {
    /// Canonical listing of the sandbox after the write
    pub files: Vec<String>,
    /// Summary prepended to the spec's core features
    pub feature_summary: String,
    /// Memory computed for this build, if summarization succeeded
    pub memory: Option<String>,
    /// Entry point recorded for the preview
    pub entry: String,
}

/// Reads and writes `meta.json` documents.
#[derive(Debug, Clone)]
pub struct MetaStore {
    paths: SandboxPaths,
    guards: DocumentGuards,
}

impl MetaStore {
    pub fn new(paths: SandboxPaths) -> Self {
        Self {
            paths,
            guards: DocumentGuards::new(),
        }
    }

    /// Load the document, `None` if it does not exist.
    ///
    /// An unparseable document is logged and treated as absent.
    pub fn read(&self, id: &ProjectId) -> StoreResult<Option<ProjectMeta>> {
        let path = self.paths.meta_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match decode(id, &content) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(project_id = %id, error = %e, "Unreadable meta.json, treating as absent");
                Ok(None)
            }
        }
    }

    /// Load the document or a fresh default (not persisted).
    pub fn read_or_default(&self, id: &ProjectId) -> StoreResult<ProjectMeta> {
        Ok(self.read(id)?.unwrap_or_else(|| ProjectMeta::new(id.clone())))
    }

    /// Shallow-merge `patch` into the stored document.
    pub fn patch(&self, id: &ProjectId, patch: MetaPatch) -> StoreResult<ProjectMeta> {
        self.update(id, |meta| patch.apply(meta))
    }

    /// Lock the build spec and resolve any pending clarification.
    ///
    /// A spec that is already locked stays as it is; the returned document
    /// carries whichever spec is in force.
    pub fn lock_build_spec(&self, id: &ProjectId, spec: BuildSpec) -> StoreResult<ProjectMeta> {
        self.update(id, |meta| {
            match meta.build_spec.as_ref().map(|existing| existing.platform) {
                Some(platform) => debug!(project_id = %id, platform = %platform, "Build spec already locked"),
                None => meta.build_spec = Some(spec),
            }
            meta.pending_clarification = None;
        })
    }

    /// Record a successful build: bumps `version`, stores the listing, and
    /// prepends the feature summary to the build spec.
    pub fn record_build(&self, id: &ProjectId, completion: BuildCompletion) -> StoreResult<ProjectMeta> {
        self.update(id, |meta| {
            let now = Utc::now();
            meta.built = true;
            meta.entry = Some(completion.entry);
            meta.files = completion.files;
            meta.version += 1;
            meta.last_build_at = Some(now);
            if let Some(memory) = completion.memory {
                meta.memory = Some(memory);
            }
            if let Some(spec) = meta.build_spec.as_mut() {
                spec.push_feature(&completion.feature_summary);
            }
        })
    }

    /// Prepend a generated image, keeping the newest [`MAX_IMAGES`].
    pub fn record_image(&self, id: &ProjectId, image: ImageRecord) -> StoreResult<ProjectMeta> {
        self.update(id, |meta| {
            meta.images.insert(0, image.clone());
            meta.images.truncate(MAX_IMAGES);
            meta.last_image = Some(image);
        })
    }

    fn update(&self, id: &ProjectId, f: impl FnOnce(&mut ProjectMeta)) -> StoreResult<ProjectMeta> {
        self.guards.with(id, || {
            let path = self.paths.meta_path(id);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut meta = self.read_or_default(id)?;
            f(&mut meta);
            meta.id = id.clone();
            meta.updated_at = Utc::now();

            fs::write(&path, serde_json::to_string_pretty(&meta)?)?;
            debug!(project_id = %id, version = meta.version, "Metadata written");
            Ok(meta)
        })
    }
}

fn decode(id: &ProjectId, content: &str) -> serde_json::Result<ProjectMeta> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(doc) = value.as_object_mut() {
        doc.entry("id")
            .or_insert_with(|| serde_json::Value::String(id.as_str().to_string()));
    }
    serde_json::from_value(value)
}
