//! Segment planner: resolves the ordered list of fetches for a task.
//!
//! - `segmented`: manifest fetch (retried), master → variant → media playlist,
//!   URIs resolved against the post-redirect playlist URL.
//! - `direct`: a one-element plan writing straight to the artifact path.
//! - `platform(name)`: the registered extractor resolves the page first.
//!
//! Segment temp files get stable names (`{task}_{index}.part`) inside the
//! task's scratch directory so a restart can find finished segments.

mod playlist;
mod variant;

use std::collections::HashMap;
use std::path::PathBuf;

use m3u8_rs::Playlist;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::extractor::{ExtractorRegistry, SourceKind};
use crate::layout;
use crate::retry::{run_with_retry, RetryError, RetryPolicy};
use crate::task::{Task, TaskId, TaskKind};
use crate::transfer::{self, ByteSpan, FetchedText, TransferOptions, TransferRequest};

pub use playlist::{media_segments, resolve_uri, MediaSources, SegmentSource};
pub use variant::{select_variant, VariantPreference};

/// Extension of artifacts that start with an fMP4 init section.
const INIT_SECTION_EXTENSION: &str = "mp4";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("manifest unreachable: {0}")]
    Unreachable(String),
    #[error("manifest unparsable: {0}")]
    Unparsable(String),
    #[error("playlist has no segments")]
    Empty,
    #[error("unsupported playlist: {0}")]
    Unsupported(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("no extractor registered for '{0}'")]
    NoExtractor(String),
    #[error("extractor '{name}' failed: {reason}")]
    Extractor { name: String, reason: String },
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSegment {
    pub index: usize,
    pub url: String,
    pub temp_path: PathBuf,
    pub byte_range: Option<ByteSpan>,
}

/// Ordered fetch list for one task run. Merge order is `segments` order.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    pub task_id: TaskId,
    pub segments: Vec<PlannedSegment>,
    /// Final artifact path.
    pub output: PathBuf,
    /// Headers sent with every segment fetch.
    pub headers: HashMap<String, String>,
    /// Per-task scratch directory (segmented plans only).
    pub scratch_dir: Option<PathBuf>,
    pub needs_merge: bool,
}

impl SegmentPlan {
    pub fn temp_paths(&self) -> Vec<PathBuf> {
        self.segments.iter().map(|s| s.temp_path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

pub struct SegmentPlanner {
    options: TransferOptions,
    retry: RetryPolicy,
    preference: VariantPreference,
    scratch_root: PathBuf,
    segmented_extension: String,
    extractors: ExtractorRegistry,
}

impl SegmentPlanner {
    pub fn new(
        options: TransferOptions,
        retry: RetryPolicy,
        preference: VariantPreference,
        scratch_root: PathBuf,
        segmented_extension: String,
        extractors: ExtractorRegistry,
    ) -> Self {
        Self {
            options,
            retry,
            preference,
            scratch_root,
            segmented_extension,
            extractors,
        }
    }

    pub fn scratch_root(&self) -> &std::path::Path {
        &self.scratch_root
    }

    /// Plan `task`. Network work observes `cancel`.
    pub async fn plan(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<SegmentPlan, PlanError> {
        match &task.kind {
            TaskKind::Direct => Ok(self.plan_direct(
                task,
                task.source_url.clone(),
                task.request_headers.clone(),
            )),
            TaskKind::Segmented => {
                self.plan_segmented(task, &task.source_url, task.request_headers.clone(), cancel)
                    .await
            }
            TaskKind::Platform(name) => {
                let extractor = self
                    .extractors
                    .get(name)
                    .ok_or_else(|| PlanError::NoExtractor(name.clone()))?;
                let source = tokio::select! {
                    _ = cancel.cancelled() => return Err(PlanError::Cancelled),
                    res = extractor.extract(&task.source_url, &task.request_headers) => {
                        res.map_err(|e| PlanError::Extractor {
                            name: name.clone(),
                            reason: format!("{:#}", e),
                        })?
                    }
                };
                tracing::debug!(task_id = task.id, platform = %name, url = %source.url, "extracted source");
                let mut headers = task.request_headers.clone();
                headers.extend(source.headers);
                match source.kind {
                    SourceKind::Direct => Ok(self.plan_direct(task, source.url, headers)),
                    SourceKind::Segmented => {
                        self.plan_segmented(task, &source.url, headers, cancel).await
                    }
                }
            }
        }
    }

    fn plan_direct(
        &self,
        task: &Task,
        url: String,
        headers: HashMap<String, String>,
    ) -> SegmentPlan {
        let ext = layout::extension_from_url(&url)
            .unwrap_or_else(|| layout::DIRECT_FALLBACK_EXTENSION.to_string());
        let output = layout::artifact_path(task, &ext);
        SegmentPlan {
            task_id: task.id,
            segments: vec![PlannedSegment {
                index: 0,
                url,
                temp_path: output.clone(),
                byte_range: None,
            }],
            output,
            headers,
            scratch_dir: None,
            needs_merge: false,
        }
    }

    async fn plan_segmented(
        &self,
        task: &Task,
        manifest_url: &str,
        headers: HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<SegmentPlan, PlanError> {
        let fetched = self.fetch_manifest(manifest_url, &headers, cancel).await?;
        let (media, media_url) = match parse(&fetched)? {
            Playlist::MediaPlaylist(pl) => (pl, fetched.effective_url),
            Playlist::MasterPlaylist(master) => {
                let preference = task.variant.unwrap_or(self.preference);
                let variant = select_variant(&master.variants, preference).ok_or_else(|| {
                    PlanError::Unparsable("master playlist has no playable variants".to_string())
                })?;
                let master_base = parse_url(&fetched.effective_url)?;
                let variant_url = resolve_uri(&master_base, &variant.uri)?;
                tracing::debug!(
                    task_id = task.id,
                    bandwidth = variant.bandwidth,
                    url = %variant_url,
                    "selected variant"
                );
                let fetched = self.fetch_manifest(&variant_url, &headers, cancel).await?;
                match parse(&fetched)? {
                    Playlist::MediaPlaylist(pl) => (pl, fetched.effective_url),
                    Playlist::MasterPlaylist(_) => {
                        return Err(PlanError::Unsupported(
                            "nested master playlists".to_string(),
                        ))
                    }
                }
            }
        };

        let base = parse_url(&media_url)?;
        let sources = media_segments(&media, &base)?;
        let ext = if sources.has_init_section {
            INIT_SECTION_EXTENSION.to_string()
        } else {
            self.segmented_extension.clone()
        };
        let scratch = layout::scratch_dir(&self.scratch_root, task.id);
        let segments = sources
            .segments
            .into_iter()
            .enumerate()
            .map(|(index, src)| PlannedSegment {
                index,
                temp_path: scratch.join(layout::segment_file_name(task.id, index)),
                url: src.url,
                byte_range: src.byte_range,
            })
            .collect();

        Ok(SegmentPlan {
            task_id: task.id,
            segments,
            output: layout::artifact_path(task, &ext),
            headers,
            scratch_dir: Some(scratch),
            needs_merge: true,
        })
    }

    async fn fetch_manifest(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<FetchedText, PlanError> {
        let request = TransferRequest::new(url, headers.clone());
        let options = self.options;
        run_with_retry(&self.retry, cancel, |attempt| {
            tracing::trace!(url = %request.url, attempt, "fetching manifest");
            transfer::fetch_text(request.clone(), options, cancel.clone())
        })
        .await
        .map_err(|e| match e {
            RetryError::Cancelled => PlanError::Cancelled,
            RetryError::Exhausted { attempts, last } => {
                PlanError::Unreachable(format!("{} ({} attempt(s)): {}", url, attempts, last))
            }
        })
    }
}

fn parse(fetched: &FetchedText) -> Result<Playlist, PlanError> {
    m3u8_rs::parse_playlist_res(&fetched.body).map_err(|e| {
        PlanError::Unparsable(format!("{}: {}", fetched.effective_url, e))
    })
}

fn parse_url(s: &str) -> Result<Url, PlanError> {
    Url::parse(s).map_err(|e| PlanError::InvalidUrl(format!("{}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn planner(scratch: &Path) -> SegmentPlanner {
        SegmentPlanner::new(
            TransferOptions::default(),
            RetryPolicy::no_retry(),
            VariantPreference::Highest,
            scratch.to_path_buf(),
            "ts".to_string(),
            ExtractorRegistry::new(),
        )
    }

    fn task(kind: TaskKind, url: &str) -> Task {
        Task {
            id: 4,
            source_url: url.to_string(),
            kind,
            destination_directory: PathBuf::from("/downloads"),
            display_name: "clip".into(),
            request_headers: HashMap::new(),
            delete_segments_after_merge: true,
            subfolder: None,
            variant: None,
        }
    }

    #[tokio::test]
    async fn direct_plan_is_single_segment_without_merge() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(dir.path());
        let plan = p
            .plan(
                &task(TaskKind::Direct, "https://x/files/clip.webm?sig=1"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert!(!plan.needs_merge);
        assert_eq!(plan.output, PathBuf::from("/downloads/clip.webm"));
        assert_eq!(plan.segments[0].temp_path, plan.output);
        assert!(plan.scratch_dir.is_none());

        let plan = p
            .plan(
                &task(TaskKind::Direct, "https://x/stream?id=9"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(plan.output, PathBuf::from("/downloads/clip.mp4"));
    }

    #[tokio::test]
    async fn segmented_plan_from_file_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("index.m3u8");
        std::fs::write(
            &manifest,
            "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4,\na.ts\n#EXTINF:4,\nb.ts\n#EXT-X-ENDLIST\n",
        )
        .unwrap();
        let url = Url::from_file_path(&manifest).unwrap().to_string();
        let scratch = dir.path().join("scratch");
        let plan = planner(&scratch)
            .plan(&task(TaskKind::Segmented, &url), &CancellationToken::new())
            .await
            .unwrap();
        assert!(plan.needs_merge);
        assert_eq!(plan.output, PathBuf::from("/downloads/clip.ts"));
        assert_eq!(plan.scratch_dir.as_deref(), Some(scratch.join("4").as_path()));
        assert_eq!(plan.segments[1].temp_path, scratch.join("4").join("4_1.part"));
        assert!(plan.segments[0].url.ends_with("/a.ts"));
    }

    #[tokio::test]
    async fn task_variant_overrides_configured_quality() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["low", "high"] {
            let sub = dir.path().join(name);
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(
                sub.join("index.m3u8"),
                "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4,\nseg0.ts\n#EXT-X-ENDLIST\n",
            )
            .unwrap();
        }
        let master = dir.path().join("master.m3u8");
        std::fs::write(
            &master,
            "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=2400000\nhigh/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=600000\nlow/index.m3u8\n",
        )
        .unwrap();
        let url = Url::from_file_path(&master).unwrap().to_string();
        let p = planner(&dir.path().join("scratch"));

        let plan = p
            .plan(&task(TaskKind::Segmented, &url), &CancellationToken::new())
            .await
            .unwrap();
        assert!(plan.segments[0].url.ends_with("/high/seg0.ts"));

        let mut lowest = task(TaskKind::Segmented, &url);
        lowest.variant = Some(VariantPreference::Lowest);
        let plan = p.plan(&lowest, &CancellationToken::new()).await.unwrap();
        assert!(plan.segments[0].url.ends_with("/low/seg0.ts"));
    }

    #[tokio::test]
    async fn unknown_platform_fails_planning() {
        let dir = tempfile::tempdir().unwrap();
        let err = planner(dir.path())
            .plan(
                &task(TaskKind::Platform("nowhere".into()), "https://nowhere/v/1"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NoExtractor(name) if name == "nowhere"));
    }

    #[tokio::test]
    async fn cancelled_planning_does_not_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = planner(dir.path())
            .plan(
                &task(TaskKind::Segmented, "http://127.0.0.1:9/index.m3u8"),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Cancelled));
    }
}
