//! Assimilation orchestrator
//!
//! Drives one task end to end:
//!
//! 1. Resolve the canonical output artifact (first descriptor wins)
//! 2. Read the artifact and open one transaction for it
//! 3. Decode block by block; reconcile and write each tree in file order
//! 4. Commit once the whole file has been walked
//!
//! Blocks the decoder rejects are reported and skipped. A store failure or an
//! unreadable artifact drops the transaction, which rolls the file back.
//!
//! [`Orchestrator::assimilate_batch`] runs several tasks at once, each with its
//! own transaction. Write phases are serialized inside one orchestrator so
//! concurrent tasks never race each other for SQLite's write lock.

use futures::stream::{self, StreamExt};
use pogs_common::time;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::Decoder;
use crate::error::{AssimilationError, DecodeError};
use crate::reconciler::{self, MergedResult};
use crate::task::TaskSource;
use crate::types::ContributorCredit;
use crate::writer::{self, WriteSummary};

/// A block the decoder rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedBlock {
    pub point_name: Option<String>,
    pub line: usize,
    pub error: String,
}

/// Outcome of one successfully committed task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssimilationReport {
    pub task_id: String,
    pub artifact: PathBuf,
    /// Point names in decode order
    pub committed: Vec<String>,
    pub rejected: Vec<RejectedBlock>,
    /// Committed points that were not in the store before
    pub new_points: usize,
    /// Child rows inserted (filters, parameters, histogram rows, contributors)
    pub rows_written: usize,
    /// Stale child rows deleted from points that already existed
    pub rows_replaced: u64,
}

impl AssimilationReport {
    fn new(task_id: &str, artifact: PathBuf) -> Self {
        Self {
            task_id: task_id.to_string(),
            artifact,
            committed: Vec::new(),
            rejected: Vec::new(),
            new_points: 0,
            rows_written: 0,
            rows_replaced: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    fn record(&mut self, merged: &MergedResult, summary: &WriteSummary) {
        if merged.is_new() {
            self.new_points += 1;
        }
        self.rows_written +=
            summary.filters + summary.parameters + summary.histogram_rows + summary.contributors;
        self.rows_replaced += summary.deleted;
        self.committed.push(merged.point_name().to_string());
    }
}

/// Result of one task in a batch
#[derive(Debug)]
pub struct TaskOutcome {
    pub task_id: String,
    pub result: Result<AssimilationReport, AssimilationError>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Orchestrator {
    db: SqlitePool,
    upload_root: PathBuf,
    write_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(db: SqlitePool, upload_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            upload_root: upload_root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// Assimilate one completed task
    pub async fn assimilate<T: TaskSource + ?Sized>(
        &self,
        task: &T,
    ) -> Result<AssimilationReport, AssimilationError> {
        let task_id = task.task_id();

        let descriptors = task
            .output_descriptors()
            .await
            .map_err(|source| AssimilationError::TaskSource {
                task_id: task_id.to_string(),
                source,
            })?;
        let Some(descriptor) = descriptors.first() else {
            return Err(AssimilationError::MissingOutput {
                task_id: task_id.to_string(),
                reason: "no canonical output descriptor".to_string(),
            });
        };
        if descriptors.len() > 1 {
            debug!(
                task_id = %task_id,
                descriptors = descriptors.len(),
                file_name = %descriptor.file_name,
                "Several output descriptors, using the first"
            );
        }
        let artifact = descriptor.resolve(&self.upload_root);

        let user_ids = task
            .crediting_identities()
            .await
            .map_err(|source| AssimilationError::TaskSource {
                task_id: task_id.to_string(),
                source,
            })?;
        let credits = ContributorCredit::for_users(&user_ids, time::now());

        // Reports are a few megabytes at most, so the artifact is read whole
        let bytes = match tokio::fs::read(&artifact).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssimilationError::MissingOutput {
                    task_id: task_id.to_string(),
                    reason: format!("{} does not exist", artifact.display()),
                });
            }
            Err(source) => {
                return Err(AssimilationError::Io {
                    task_id: task_id.to_string(),
                    path: artifact,
                    source,
                });
            }
        };

        info!(
            task_id = %task_id,
            artifact = %artifact.display(),
            bytes = bytes.len(),
            contributors = credits.len(),
            "Assimilating task"
        );

        let report = self
            .apply_artifact(task_id, artifact, &bytes, &credits)
            .await?;

        info!(
            task_id = %task_id,
            committed = report.committed.len(),
            new_points = report.new_points,
            rows_written = report.rows_written,
            rows_replaced = report.rows_replaced,
            rejected = report.rejected.len(),
            "Task assimilated"
        );
        Ok(report)
    }

    /// Decode and persist one artifact inside a single transaction
    ///
    /// `bytes` is the whole artifact; the decoder walks it line by line.
    async fn apply_artifact(
        &self,
        task_id: &str,
        artifact: PathBuf,
        bytes: &[u8],
        credits: &[ContributorCredit],
    ) -> Result<AssimilationReport, AssimilationError> {
        let persistence = |point_name: Option<&str>, source: sqlx::Error| {
            AssimilationError::Persistence {
                task_id: task_id.to_string(),
                point_name: point_name.map(str::to_string),
                source,
            }
        };

        let _write_guard = self.write_lock.lock().await;
        let mut tx = self.db.begin().await.map_err(|e| persistence(None, e))?;
        let mut report = AssimilationReport::new(task_id, artifact);

        for item in Decoder::new(bytes) {
            match item {
                Ok(fit) => {
                    let point_name = fit.point_name.clone();
                    let merged = reconciler::reconcile(&mut *tx, fit, credits)
                        .await
                        .map_err(|e| persistence(Some(point_name.as_str()), e))?;
                    let summary = writer::write(&mut *tx, &merged)
                        .await
                        .map_err(|e| persistence(Some(point_name.as_str()), e))?;
                    report.record(&merged, &summary);
                }
                Err(DecodeError::Io { line, source }) => {
                    // Dropping `tx` rolls back everything written for this file
                    error!(task_id = %task_id, line, error = %source, "Artifact unreadable");
                    return Err(AssimilationError::Io {
                        task_id: task_id.to_string(),
                        path: report.artifact,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        task_id = %task_id,
                        point_name = e.point_name().unwrap_or("<unnamed>"),
                        line = e.line(),
                        error = %e,
                        "Block rejected"
                    );
                    report.rejected.push(RejectedBlock {
                        point_name: e.point_name().map(str::to_string),
                        line: e.line(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(|e| persistence(None, e))?;
        Ok(report)
    }

    /// Assimilate several tasks, at most `max_concurrent` at a time
    ///
    /// Cancellation is checked as each task is about to start; tasks already
    /// running finish normally. Outcomes arrive in completion order.
    pub async fn assimilate_batch(
        &self,
        tasks: Vec<Arc<dyn TaskSource>>,
        max_concurrent: usize,
        cancel: &CancellationToken,
    ) -> Vec<TaskOutcome> {
        stream::iter(tasks)
            .map(|task| async move {
                let task_id = task.task_id().to_string();
                if cancel.is_cancelled() {
                    debug!(task_id = %task_id, "Skipping task after cancellation");
                    return TaskOutcome {
                        result: Err(AssimilationError::Cancelled {
                            task_id: task_id.clone(),
                        }),
                        task_id,
                    };
                }

                let result = self.assimilate(task.as_ref()).await;
                if let Err(e) = &result {
                    error!(
                        task_id = %task_id,
                        point_name = e.point_name().unwrap_or("-"),
                        error = %e,
                        "Task failed"
                    );
                }
                TaskOutcome { task_id, result }
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await
    }
}
