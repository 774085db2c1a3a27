//! Task list types
//!
//! The task list lives in `.ralph/tasks.json`. The initializer creates it, the
//! assistant updates task statuses between iterations, and the loop controller
//! only ever reads it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

use super::lenient;

/// Priority assigned to tasks that don't carry a usable one
pub const DEFAULT_PRIORITY: i64 = 99;

/// Schema version written by the initializer prompt
pub const SCHEMA_VERSION: &str = "1";

/// Status of a single task
///
/// Statuses outside the known set are kept verbatim in `Other` so a rewrite of
/// the file never loses what the assistant wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Complete => "complete",
            TaskStatus::Failed => "failed",
            TaskStatus::Other(s) => s,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "complete" => TaskStatus::Complete,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Other(s),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, e.g. "T001"
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub title: String,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub description: String,

    /// Lower number = higher priority
    #[serde(default = "default_priority", deserialize_with = "priority_or_default")]
    pub priority: i64,

    #[serde(default, deserialize_with = "status_or_raw")]
    pub status: TaskStatus,

    /// ISO-8601 timestamp set by the assistant when the task completes
    #[serde(default, deserialize_with = "lenient::or_none")]
    pub completed_at: Option<String>,
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

fn priority_or_default<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().unwrap_or(DEFAULT_PRIORITY))
}

/// A status that isn't a string is kept as its JSON text, so it never reads as pending
fn status_or_raw<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => TaskStatus::from(s),
        other => TaskStatus::Other(other.to_string()),
    })
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

/// Parsed representation of `.ralph/tasks.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default = "default_schema_version", deserialize_with = "schema_version_or_default")]
    pub schema_version: String,

    /// Human-readable task name
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub task: String,

    /// ISO-8601 creation timestamp
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub created_at: String,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub completion_criteria: Vec<String>,

    /// The tasks, in file order. Fields inside a task are forgiving, but an
    /// entry that isn't an object makes the whole file unreadable.
    #[serde(default, deserialize_with = "task_objects")]
    pub features: Vec<Task>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn schema_version_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string).unwrap_or_else(default_schema_version))
}

fn task_objects<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<serde_json::Value>::deserialize(deserializer)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| -> Result<Task, D::Error> {
            if !value.is_object() {
                return Err(de::Error::custom(format!("features[{}] is not an object", i)));
            }
            serde_json::from_value(value).map_err(de::Error::custom)
        })
        .collect()
}

impl Default for TaskFile {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            task: String::new(),
            created_at: String::new(),
            completion_criteria: Vec::new(),
            features: Vec::new(),
        }
    }
}

impl TaskFile {
    /// Parse a task file from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Number of tasks with the given status
    pub fn count(&self, status: &TaskStatus) -> usize {
        self.features.iter().filter(|t| &t.status == status).count()
    }

    pub fn pending_count(&self) -> usize {
        self.count(&TaskStatus::Pending)
    }

    /// The task the coder prompt should pick next: lowest priority number among
    /// pending tasks, file order breaking ties.
    pub fn next_pending(&self) -> Option<&Task> {
        self.features
            .iter()
            .filter(|t| t.is_pending())
            .min_by_key(|t| t.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: i64, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            title: format!("title of {}", id),
            description: String::new(),
            priority,
            status,
            completed_at: None,
        }
    }

    const SAMPLE: &str = r#"{
      "schema_version": "1",
      "task": "Build a CLI",
      "created_at": "2026-02-20T14:30:00Z",
      "completion_criteria": ["tests pass"],
      "features": [
        {"id": "T001", "title": "Scaffold", "description": "cargo new", "priority": 1, "status": "complete", "completed_at": "2026-02-20T15:00:00Z"},
        {"id": "T002", "title": "Parse args", "description": "clap", "priority": 2, "status": "pending", "completed_at": null},
        {"id": "T003", "title": "Docs", "description": "README", "priority": 3, "status": "in_progress", "completed_at": null}
      ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let file = TaskFile::from_json(SAMPLE).unwrap();
        assert_eq!(file.task, "Build a CLI");
        assert_eq!(file.features.len(), 3);
        assert_eq!(file.features[0].status, TaskStatus::Complete);
        assert_eq!(file.features[0].completed_at.as_deref(), Some("2026-02-20T15:00:00Z"));
        assert_eq!(file.pending_count(), 1);
        assert_eq!(file.count(&TaskStatus::InProgress), 1);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let file = TaskFile::from_json(r#"{"features": [{"id": "T001"}]}"#).unwrap();
        assert_eq!(file.schema_version, "1");
        assert!(file.task.is_empty());
        let task = &file.features[0];
        assert_eq!(task.priority, DEFAULT_PRIORITY);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_wrong_types_get_defaults() {
        let file = TaskFile::from_json(
            r#"{"schema_version": 2, "completion_criteria": "none",
                "features": [{"id": "T001", "priority": "high", "status": 5}]}"#,
        )
        .unwrap();
        assert_eq!(file.schema_version, "1");
        assert!(file.completion_criteria.is_empty());
        assert_eq!(file.features[0].priority, DEFAULT_PRIORITY);
        assert_eq!(file.features[0].status, TaskStatus::Other("5".to_string()));
        assert_eq!(file.pending_count(), 0);
    }

    #[test]
    fn test_null_status_is_not_pending() {
        let file = TaskFile::from_json(r#"{"features": [{"id": "T001", "status": null}]}"#).unwrap();
        assert_eq!(file.features[0].status, TaskStatus::Other("null".to_string()));
        assert_eq!(file.pending_count(), 0);
    }

    #[test]
    fn test_non_object_task_entry_is_an_error() {
        assert!(TaskFile::from_json(r#"{"features": [{"id": "T001", "status": "pending"}, "oops"]}"#).is_err());
        assert!(TaskFile::from_json(r#"{"features": "T001"}"#).is_err());
        assert!(TaskFile::from_json(r#"{"features": [["T001", "x"]]}"#).is_err());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(TaskFile::from_json("{\"features\": [").is_err());
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let file = TaskFile::from_json(r#"{"features": [{"id": "T001", "status": "blocked"}]}"#).unwrap();
        assert_eq!(file.features[0].status, TaskStatus::Other("blocked".to_string()));
        assert_eq!(file.pending_count(), 0);

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["features"][0]["status"], "blocked");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let task = task("T001", 1, TaskStatus::InProgress);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "in_progress");
    }

    #[test]
    fn test_next_pending_uses_priority_then_order() {
        let file = TaskFile {
            features: vec![
                task("T001", 1, TaskStatus::Complete),
                task("T002", 3, TaskStatus::Pending),
                task("T003", 2, TaskStatus::Pending),
                task("T004", 2, TaskStatus::Pending),
            ],
            ..Default::default()
        };
        assert_eq!(file.next_pending().map(|t| t.id.as_str()), Some("T003"));
    }
}
