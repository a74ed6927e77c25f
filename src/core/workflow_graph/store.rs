#![allow(clippy::result_large_err)] // Store returns AppError to preserve structured diagnostic context.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::state::{ExecutionStatus, WorkflowExecution};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Paths under `<state_dir>/executions/<execution_id>`.
pub struct ExecutionPaths {
    pub execution_dir: PathBuf,
    pub execution_file: PathBuf,
}

impl ExecutionPaths {
    pub fn new(state_dir: &Path, execution_id: &Uuid) -> Self {
        let execution_dir = executions_root(state_dir).join(execution_id.to_string());
        let execution_file = execution_dir.join("execution.json");
        Self {
            execution_dir,
            execution_file,
        }
    }
}

fn executions_root(state_dir: &Path) -> PathBuf {
    state_dir.join("executions")
}

/// Short listing entry for `seecats status`.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub definition_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
}

/// File-backed store of execution records.
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    state_dir: PathBuf,
}

impl ExecutionStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn save(&self, execution: &WorkflowExecution) -> Result<(), AppError> {
        let paths = ExecutionPaths::new(&self.state_dir, &execution.execution_id);
        let content = serde_json::to_vec_pretty(execution).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to serialize execution.json: {}", err),
            )
        })?;
        atomic_write(&paths.execution_file, &content)
    }

    pub fn load(&self, execution_id: &Uuid) -> Result<WorkflowExecution, AppError> {
        let paths = ExecutionPaths::new(&self.state_dir, execution_id);
        let bytes = fs::read(&paths.execution_file).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", paths.execution_file.display(), err),
            )
            .with_code("SC-STORE-001")
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to deserialize execution.json: {}", err),
            )
        })
    }

    /// Every readable record, most recent first. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<ExecutionSummary>, AppError> {
        let mut entries = Vec::new();
        let base = executions_root(&self.state_dir);
        if !base.exists() {
            return Ok(entries);
        }
        for entry in fs::read_dir(&base)
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::IoError,
                    format!("failed to list executions: {}", err),
                )
            })?
            .flatten()
        {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Ok(uuid) = Uuid::parse_str(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            match self.load(&uuid) {
                Ok(execution) => entries.push(ExecutionSummary {
                    execution_id: execution.execution_id,
                    definition_name: execution.definition_name,
                    status: execution.status,
                    started_at: execution.started_at,
                }),
                Err(err) => tracing::debug!(execution_id = %uuid, "skipping record: {}", err),
            }
        }
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(entries)
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to create directory {}: {}", parent.display(), err),
            )
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to write {}: {}", tmp_path.display(), err),
        )
    })?;
    fs::rename(&tmp_path, path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!(
                "failed to rename {} -> {}: {}",
                tmp_path.display(),
                path.display(),
                err
            ),
        )
    })?;
    Ok(())
}
