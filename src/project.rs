//! Project auto-detection from filesystem markers
//!
//! Picks the tool allow-list handed to the assistant and the command the coder
//! prompt tells it to verify with.

use std::fmt;
use std::path::Path;

const GIT_TOOLS: &str = "Bash(git add *),Bash(git commit *),Bash(git status*),Bash(git diff*)";
const PYTHON_TOOLS: &str = "Bash(python *),Bash(python3 *),Bash(pytest *),Bash(ruff *),Bash(uv *)";
const PYTHON_MARKERS: [&str; 3] = ["pyproject.toml", "setup.py", "requirements.txt"];

/// Base tools every project gets
pub fn base_tools() -> String {
    format!("Read,Edit,Write,Grep,Glob,{}", GIT_TOOLS)
}

/// Detected project ecosystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Rust,
    Go,
    TypeScript,
    Python,
    PythonDbt,
    Dbt,
    Unknown,
}

impl ProjectKind {
    /// Label used in prompts and output
    pub fn label(&self) -> &'static str {
        match self {
            ProjectKind::Rust => "rust",
            ProjectKind::Go => "go",
            ProjectKind::TypeScript => "typescript",
            ProjectKind::Python => "python",
            ProjectKind::PythonDbt => "python+dbt",
            ProjectKind::Dbt => "dbt",
            ProjectKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the loop needs to know about the project it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectProfile {
    pub kind: ProjectKind,

    /// Comma-separated allow-list for `--allowedTools`
    pub tools: String,

    /// Command the assistant runs before committing; `None` for unknown projects
    pub verify_command: Option<String>,
}

impl ProjectProfile {
    fn new(kind: ProjectKind, extra_tools: &[&str], verify: Option<&str>) -> Self {
        let mut tools = base_tools();
        for extra in extra_tools {
            tools.push(',');
            tools.push_str(extra);
        }
        Self {
            kind,
            tools,
            verify_command: verify.map(str::to_string),
        }
    }
}

/// Inspect `dir` for marker files and build the matching profile.
///
/// Cargo.toml wins over go.mod, which wins over package.json (unless a Python
/// marker is also present), then Python (with dbt if `dbt_project.yml` exists),
/// then dbt alone.
pub fn detect(dir: &Path) -> ProjectProfile {
    let has = |marker: &str| dir.join(marker).exists();

    let is_python = PYTHON_MARKERS.iter().any(|m| has(m));
    let is_ts = has("package.json");
    let is_dbt = has("dbt_project.yml");

    if has("Cargo.toml") {
        return ProjectProfile::new(ProjectKind::Rust, &["Bash(cargo *)"], Some("cargo test"));
    }

    if has("go.mod") {
        return ProjectProfile::new(ProjectKind::Go, &["Bash(go *)"], Some("go test ./..."));
    }

    if is_ts && !is_python {
        return ProjectProfile::new(
            ProjectKind::TypeScript,
            &["Bash(npm *)", "Bash(npx *)"],
            Some("npm test"),
        );
    }

    if is_python {
        if is_dbt {
            return ProjectProfile::new(
                ProjectKind::PythonDbt,
                &[PYTHON_TOOLS, "Bash(dbt *)"],
                Some("pytest && dbt test"),
            );
        }
        return ProjectProfile::new(ProjectKind::Python, &[PYTHON_TOOLS], Some("pytest"));
    }

    if is_dbt {
        return ProjectProfile::new(ProjectKind::Dbt, &["Bash(dbt *)"], Some("dbt test"));
    }

    ProjectProfile::new(ProjectKind::Unknown, &[], None)
}
