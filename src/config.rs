use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ralph::runner::CircuitBreaker;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub ralph_dir: PathBuf,
    /// Directory holding `initializer.md` / `coder.md` template overrides
    pub prompts_dir: Option<PathBuf>,
    #[serde(rename = "loop")]
    pub loop_: LoopConfig,
    pub assistant: AssistantConfig,
    pub circuit: CircuitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub sleep_between_secs: u64,
    pub rate_limit_per_hour: u32,
    pub git_commit: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            sleep_between_secs: 2,
            rate_limit_per_hour: 40,
            git_commit: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub binary: String,
    pub max_turns: u32,
    pub timeout_secs: u64,
    /// Replaces the detected tool allow-list
    pub tools: Option<String>,
    pub skip_permissions: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            max_turns: 30,
            timeout_secs: 3600,
            tools: None,
            skip_permissions: false,
        }
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    pub no_progress_threshold: u32,
    pub same_error_threshold: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        let breaker = CircuitBreaker::default();
        Self {
            no_progress_threshold: breaker.no_progress_threshold,
            same_error_threshold: breaker.same_error_threshold,
        }
    }
}

impl CircuitConfig {
    pub fn breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(self.no_progress_threshold, self.same_error_threshold)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            ralph_dir: PathBuf::from(".ralph"),
            prompts_dir: None,
            loop_: LoopConfig::default(),
            assistant: AssistantConfig::default(),
            circuit: CircuitConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
