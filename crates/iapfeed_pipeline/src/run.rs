//! The per-group run record and its status file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use iapfeed_common::DeviceGroup;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Stage of a [`GenerationRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Created, nothing fetched yet.
    Starting,
    /// Listing and fetching devices.
    Fetching,
    /// Loading scope rows and merging subnets.
    Reconciling,
    /// Rendering and writing the document.
    Building,
    /// Structural and schema validation, then compression.
    Validating,
    /// Login and import.
    Uploading,
    /// Finished successfully.
    Completed,
    /// Finished with an error; see [`GenerationRun::error`].
    Failed,
}

impl RunState {
    /// Returns the lowercase name used in the status file.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Starting => "starting",
            RunState::Fetching => "fetching",
            RunState::Reconciling => "reconciling",
            RunState::Building => "building",
            RunState::Validating => "validating",
            RunState::Uploading => "uploading",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    /// Returns `true` for `completed` and `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// The stage that was active.
    pub stage: RunState,
    /// The underlying error, rendered.
    pub cause: String,
}

/// A device left out of the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFailure {
    /// Device name.
    pub device: String,
    /// Stage where it was dropped.
    pub stage: RunState,
    /// Why it was dropped.
    pub reason: String,
}

/// One execution of the pipeline for one device group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRun {
    /// Identifier, `<group>-<start timestamp>`.
    pub run_id: String,
    /// The processed group.
    pub group: DeviceGroup,
    /// Current state.
    pub state: RunState,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Devices serialized into the artifact.
    pub device_count: usize,
    /// The written `.xml` file.
    pub output_path: Option<PathBuf>,
    /// The `.xml.gz` file.
    pub compressed_path: Option<PathBuf>,
    /// Set when the run failed.
    pub error: Option<RunFailure>,
    /// Devices dropped during fetching or building.
    pub device_failures: Vec<DeviceFailure>,
    /// Devices skipped for lack of a loopback.
    pub devices_without_loopback: usize,
    /// Scope rows skipped for bad network or netmask data.
    pub scope_rows_skipped: usize,
    /// Whether the import was accepted (a verification-mode dry run counts).
    pub uploaded: bool,
}

impl GenerationRun {
    /// Creates a run in the `starting` state.
    pub fn new(group: DeviceGroup, now: DateTime<Utc>) -> Self {
        Self {
            run_id: format!("{group}-{}", now.format("%Y%m%dT%H%M%S%.3fZ")),
            group,
            state: RunState::Starting,
            started_at: now,
            updated_at: now,
            finished_at: None,
            device_count: 0,
            output_path: None,
            compressed_path: None,
            error: None,
            device_failures: Vec::new(),
            devices_without_loopback: 0,
            scope_rows_skipped: 0,
            uploaded: false,
        }
    }

    /// Moves to a non-terminal stage.
    pub fn enter(&mut self, state: RunState, now: DateTime<Utc>) {
        tracing::info!(run = %self.run_id, from = %self.state, to = %state, "run stage");
        self.state = state;
        self.updated_at = now;
    }

    /// Marks the run completed.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.state = RunState::Completed;
        self.updated_at = now;
        self.finished_at = Some(now);
        tracing::info!(run = %self.run_id, devices = self.device_count, "run completed");
    }

    /// Marks the run failed at its current stage.
    pub fn fail(&mut self, cause: impl fmt::Display, now: DateTime<Utc>) {
        let failure = RunFailure {
            stage: self.state,
            cause: cause.to_string(),
        };
        tracing::error!(
            run = %self.run_id,
            stage = %failure.stage,
            cause = %failure.cause,
            "run failed"
        );
        self.error = Some(failure);
        self.state = RunState::Failed;
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    /// Records a dropped device at the current stage.
    pub fn record_device_failure(&mut self, device: impl Into<String>, reason: impl Into<String>) {
        self.device_failures.push(DeviceFailure {
            device: device.into(),
            stage: self.state,
            reason: reason.into(),
        });
    }
}

/// Returns `<output_dir>/status/<group>.json`.
pub fn status_path(output_dir: &Path, group: DeviceGroup) -> PathBuf {
    output_dir.join("status").join(format!("{group}.json"))
}

/// Writes the run snapshot, replacing the previous one atomically.
pub fn write_status(output_dir: &Path, run: &GenerationRun) -> Result<PathBuf, PipelineError> {
    let path = status_path(output_dir, run.group);
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PipelineError::Status { path, source }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let json = serde_json::to_vec_pretty(run)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_err(&tmp))?;
    fs::rename(&tmp, &path).map_err(io_err(&path))?;
    Ok(path)
}

/// Reads the last snapshot for a group, if one was written.
pub fn read_status(
    output_dir: &Path,
    group: DeviceGroup,
) -> Result<Option<GenerationRun>, PipelineError> {
    let path = status_path(output_dir, group);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PipelineError::Status { path, source }),
    }
}
