use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::planner::VariantPreference;
use crate::retry::RetryPolicy;
use crate::transfer::TransferOptions;

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 8,
        }
    }
}

/// Global configuration loaded from `~/.config/vdl/config.toml`.
///
/// Read once when the engine is built; running tasks never see later edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VdlConfig {
    /// Maximum number of tasks downloading at the same time.
    pub max_concurrent: usize,
    /// Maximum concurrent segment fetches inside one task.
    pub segment_concurrency: usize,
    /// Default destination directory (None = current directory).
    pub download_dir: Option<PathBuf>,
    /// Remove segment temporaries after a successful merge.
    pub delete_segments: bool,
    /// Root for per-task segment scratch dirs (None = `~/.cache/vdl/segments`).
    pub scratch_dir: Option<PathBuf>,
    /// Per-attempt segment timeout; stall timeout for direct downloads.
    pub segment_timeout_secs: u64,
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout_secs: u64,
    /// Extension of merged segmented artifacts.
    pub segmented_extension: String,
    /// Variant choice for master playlists.
    pub quality: VariantPreference,
    /// Interval between progress snapshots in milliseconds.
    pub progress_interval_ms: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
}

impl Default for VdlConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            segment_concurrency: 6,
            download_dir: None,
            delete_segments: true,
            scratch_dir: None,
            segment_timeout_secs: 30,
            connect_timeout_secs: 15,
            segmented_extension: "ts".to_string(),
            quality: VariantPreference::Highest,
            progress_interval_ms: 500,
            retry: None,
        }
    }
}

impl VdlConfig {
    /// Retry policy from the `[retry]` section, or the built-in default.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(|r| RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            })
            .unwrap_or_default()
    }

    /// Options for segment and manifest fetches: hard per-attempt timeout.
    pub fn segment_transfer_options(&self) -> TransferOptions {
        TransferOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Some(Duration::from_secs(self.segment_timeout_secs)),
            stall_timeout: None,
        }
    }

    /// Options for direct single-file downloads: no wall-clock limit, only a stall timeout.
    pub fn direct_transfer_options(&self) -> TransferOptions {
        TransferOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: None,
            stall_timeout: Some(Duration::from_secs(self.segment_timeout_secs)),
        }
    }

    /// Destination used when a task does not carry its own directory.
    pub fn effective_download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Root of the per-task scratch directories.
    pub fn scratch_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.scratch_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("vdl")?;
        Ok(xdg_dirs.get_cache_home().join("segments"))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(50))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Control socket of a running `vdl run` (same XDG state dir as the DB).
pub fn control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vdl")?;
    Ok(xdg_dirs.get_state_home().join("control.sock"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VdlConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as `load_or_init` for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<VdlConfig> {
    if !path.exists() {
        let default_cfg = VdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: VdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
