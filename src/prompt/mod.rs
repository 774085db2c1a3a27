//! Prompt System - builds the initializer and coder prompts
//!
//! Both prompts are Handlebars templates. The embedded versions live in
//! [`templates`]; a prompts directory can override either one by providing
//! `initializer.md` or `coder.md`.

mod render;
pub mod templates;

use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::Serialize;

use crate::error::Result;

pub use render::PromptRenderer;

/// Context for the Phase 1 prompt
#[derive(Debug, Clone, Serialize)]
pub struct InitializerContext<'a> {
    pub task_description: &'a str,
    pub project_type: &'a str,
    pub ralph_dir: &'a str,
    pub now: String,
    pub tasks_schema: &'static str,
}

/// Context for one coder iteration
#[derive(Debug, Clone, Serialize)]
pub struct CoderContext<'a> {
    pub task_description: &'a str,
    pub tasks_json: &'a str,
    pub progress: &'a str,
    pub verify_command: Option<&'a str>,
    pub ralph_dir: &'a str,
    pub now: String,
}

/// Renders the two Ralph prompts
pub struct PromptBuilder {
    renderer: PromptRenderer,
    ralph_dir: String,
}

impl PromptBuilder {
    /// Builder using the embedded templates
    pub fn new(ralph_dir: &Path) -> Result<Self> {
        let mut renderer = PromptRenderer::new();
        renderer.register_template(templates::INITIALIZER, templates::INITIALIZER_TEMPLATE)?;
        renderer.register_template(templates::CODER, templates::CODER_TEMPLATE)?;
        Ok(Self {
            renderer,
            ralph_dir: ralph_dir.display().to_string(),
        })
    }

    /// Builder where `<dir>/initializer.md` and `<dir>/coder.md`, when present,
    /// replace the embedded templates
    pub fn with_overrides(ralph_dir: &Path, dir: &Path) -> Result<Self> {
        let mut builder = Self::new(ralph_dir)?;
        for name in [templates::INITIALIZER, templates::CODER] {
            let path = dir.join(format!("{}.md", name));
            if path.is_file() {
                let template = fs::read_to_string(&path)?;
                builder.renderer.register_template(name, &template)?;
                info!("Using prompt template override: {}", path.display());
            }
        }
        Ok(builder)
    }

    /// Phase 1: ask the assistant to break the task into a task list without implementing anything
    pub fn initializer(&self, task_description: &str, project_type: &str, now: DateTime<Utc>) -> Result<String> {
        let context = InitializerContext {
            task_description,
            project_type,
            ralph_dir: &self.ralph_dir,
            now: timestamp(now),
            tasks_schema: templates::TASKS_JSON_SCHEMA,
        };
        self.renderer.render_named(templates::INITIALIZER, &context)
    }

    /// Phase 2: ask the assistant to implement exactly one pending task
    pub fn coder(
        &self,
        task_description: &str,
        tasks_json: &str,
        progress: &str,
        verify_command: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let context = CoderContext {
            task_description,
            tasks_json,
            progress,
            verify_command,
            ralph_dir: &self.ralph_dir,
            now: timestamp(now),
        };
        self.renderer.render_named(templates::CODER, &context)
    }
}

/// ISO-8601 UTC with second precision, e.g. `2026-02-20T14:30:00Z`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
