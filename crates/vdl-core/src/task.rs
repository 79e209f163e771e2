//! Task description built from a persisted record plus configuration defaults.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::planner::VariantPreference;

/// Record id; one active worker per id.
pub type TaskId = i64;

/// How a task's source is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Single file.
    Direct,
    /// HLS-style manifest plus segments.
    Segmented,
    /// Page URL resolved by a registered extractor.
    Platform(String),
}

impl TaskKind {
    /// Parse a kind name as stored in records. `m3u8` and `hls` are aliases of segmented.
    pub fn parse(s: &str) -> TaskKind {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "segmented" | "m3u8" | "hls" => TaskKind::Segmented,
            "direct" | "" => TaskKind::Direct,
            _ => TaskKind::Platform(lower),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Direct => "direct",
            TaskKind::Segmented => "segmented",
            TaskKind::Platform(name) => name,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters the gateway returns for a record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParams {
    pub name: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub kind: TaskKind,
    pub folder: Option<String>,
    /// Per-task variant choice; `None` uses the configured `quality`.
    pub variant: Option<VariantPreference>,
}

/// Engine-wide defaults applied when building a task.
#[derive(Debug, Clone)]
pub struct TaskDefaults {
    pub download_dir: PathBuf,
    pub delete_segments: bool,
}

/// Transient work description; rebuilt on every start.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub source_url: String,
    pub kind: TaskKind,
    pub destination_directory: PathBuf,
    pub display_name: String,
    pub request_headers: HashMap<String, String>,
    pub delete_segments_after_merge: bool,
    pub subfolder: Option<String>,
    /// Overrides the configured variant preference.
    pub variant: Option<VariantPreference>,
}

impl Task {
    pub fn from_params(id: TaskId, params: TaskParams, defaults: &TaskDefaults) -> Self {
        Task {
            id,
            source_url: params.url,
            kind: params.kind,
            destination_directory: defaults.download_dir.clone(),
            display_name: params.name,
            request_headers: params.headers,
            delete_segments_after_merge: defaults.delete_segments,
            subfolder: params.folder.filter(|f| !f.trim().is_empty()),
            variant: params.variant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_aliases() {
        assert_eq!(TaskKind::parse("m3u8"), TaskKind::Segmented);
        assert_eq!(TaskKind::parse("HLS"), TaskKind::Segmented);
        assert_eq!(TaskKind::parse("direct"), TaskKind::Direct);
        assert_eq!(
            TaskKind::parse("Bilibili"),
            TaskKind::Platform("bilibili".to_string())
        );
        assert_eq!(TaskKind::parse("bilibili").to_string(), "bilibili");
    }

    #[test]
    fn from_params_applies_defaults() {
        let params = TaskParams {
            name: "ep1".into(),
            url: "https://x/video.m3u8".into(),
            headers: HashMap::new(),
            kind: TaskKind::Segmented,
            folder: Some("  ".into()),
            variant: Some(VariantPreference::Lowest),
        };
        let defaults = TaskDefaults {
            download_dir: PathBuf::from("/downloads"),
            delete_segments: true,
        };
        let task = Task::from_params(1, params, &defaults);
        assert_eq!(task.destination_directory, PathBuf::from("/downloads"));
        assert!(task.delete_segments_after_merge);
        assert_eq!(task.subfolder, None);
        assert_eq!(task.display_name, "ep1");
        assert_eq!(task.variant, Some(VariantPreference::Lowest));
    }
}
