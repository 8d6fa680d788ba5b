//! Task collaborator
//!
//! The orchestrator asks a [`TaskSource`] two things about a completed task:
//! where its canonical output lives, and which users computed it. The
//! scheduler side is abstracted behind the trait; [`TaskManifest`] is the
//! file-based implementation the binary uses.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pogs_common::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `<file_name>` elements of a canonical result's XML document
static FILE_NAME_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<file_name>\s*([^<]*?)\s*</file_name>").expect("file_name pattern is valid")
});

static XML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

/// One output file named by the canonical result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub file_name: String,
}

impl OutputDescriptor {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Absolute names are kept; relative ones are joined to `upload_root`
    pub fn resolve(&self, upload_root: &Path) -> PathBuf {
        let path = Path::new(&self.file_name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            upload_root.join(path)
        }
    }
}

/// Output descriptors in document order; empty names are skipped
///
/// Commented-out elements are ignored and the predefined XML entities in a
/// name are expanded.
pub fn parse_output_descriptors(xml: &str) -> Vec<OutputDescriptor> {
    let xml = XML_COMMENT.replace_all(xml, "");
    FILE_NAME_ELEMENT
        .captures_iter(&xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_entities(m.as_str()))
        .filter(|name| !name.is_empty())
        .map(OutputDescriptor::new)
        .collect()
}

fn unescape_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Scheduler-side view of one completed task
#[async_trait]
pub trait TaskSource: Send + Sync {
    fn task_id(&self) -> &str;

    /// Output descriptors of the canonical result (zero or more; first wins)
    ///
    /// A task without a canonical result reports no descriptors.
    async fn output_descriptors(&self) -> Result<Vec<OutputDescriptor>>;

    /// User ids credited for the task, possibly with repeats
    async fn crediting_identities(&self) -> Result<Vec<i64>>;
}

/// One replica of a task, credited to its user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCredit {
    pub user_id: i64,
}

/// File-based task description
///
/// ```toml
/// task_id = "wu_1718_area_3"
/// canonical_result_xml = "<file_info><file_name>wu_1718_area_3_0</file_name></file_info>"
///
/// [[replicas]]
/// user_id = 17
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskManifest {
    pub task_id: String,

    /// `xml_doc_in` of the canonical result; absent when no canonical result exists
    #[serde(default)]
    pub canonical_result_xml: Option<String>,

    /// Explicit output files; take precedence over the XML document
    #[serde(default)]
    pub output_files: Vec<String>,

    #[serde(default)]
    pub replicas: Vec<ReplicaCredit>,
}

impl TaskManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: TaskManifest = toml::from_str(&content).map_err(|e| {
            Error::InvalidInput(format!("task manifest {}: {}", path.display(), e))
        })?;

        if manifest.task_id.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "task manifest {}: task_id is empty",
                path.display()
            )));
        }

        debug!(task_id = %manifest.task_id, path = %path.display(), "Loaded task manifest");
        Ok(manifest)
    }
}

#[async_trait]
impl TaskSource for TaskManifest {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn output_descriptors(&self) -> Result<Vec<OutputDescriptor>> {
        if !self.output_files.is_empty() {
            return Ok(self
                .output_files
                .iter()
                .map(OutputDescriptor::new)
                .collect());
        }
        Ok(self
            .canonical_result_xml
            .as_deref()
            .map(parse_output_descriptors)
            .unwrap_or_default())
    }

    async fn crediting_identities(&self) -> Result<Vec<i64>> {
        Ok(self.replicas.iter().map(|r| r.user_id).collect())
    }
}
