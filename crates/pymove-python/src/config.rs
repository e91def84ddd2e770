//! Project configuration from `pyproject.toml`.
//!
//! ```toml
//! [project]
//! name = "sample_project"
//!
//! [tool.pymove]
//! folders = ["sample_project"]
//! exclude = ["build"]
//!
//! [tool.pymove.formatter]
//! enabled = true
//! command = "ruff"
//! timeout_secs = 10
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Name of the project file searched for.
pub const PROJECT_FILE: &str = "pyproject.toml";

/// Directory names never scanned.
pub const DEFAULT_EXCLUDES: &[&str] = &["__pycache__", "venv", "node_modules", "target"];

/// Errors loading project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `pyproject.toml` at or above the starting path.
    #[error("no pyproject.toml found at or above {path}")]
    ProjectNotFound { path: String },

    /// The project file names no project.
    #[error("cannot determine the project name from {path}")]
    MissingProjectName { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// ============================================================================
// File Schema
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<NamedTable>,
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct NamedTable {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    poetry: Option<NamedTable>,
    pymove: Option<PymoveTable>,
}

#[derive(Debug, Default, Deserialize)]
struct PymoveTable {
    project_name: Option<String>,
    folders: Option<Vec<String>>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    formatter: FormatterConfig,
}

/// External formatter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Run the formatter on modules a move touched.
    #[serde(default)]
    pub enabled: bool,

    /// Formatter executable.
    #[serde(default = "default_command")]
    pub command: String,

    /// Seconds before a formatter run is abandoned.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_command() -> String {
    "ruff".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_command(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Project Config
// ============================================================================

/// Resolved configuration of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfig {
    /// Canonical directory holding `pyproject.toml`.
    pub root: PathBuf,
    /// Source folders relative to `root`; `None` scans `root` itself.
    pub folders: Option<Vec<String>>,
    pub project_name: String,
    /// Extra directory names to skip.
    pub exclude: Vec<String>,
    pub formatter: FormatterConfig,
}

impl ProjectConfig {
    /// A configuration scanning `root` with defaults.
    pub fn new(root: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        ProjectConfig {
            root: root.into(),
            folders: None,
            project_name: project_name.into(),
            exclude: Vec::new(),
            formatter: FormatterConfig::default(),
        }
    }

    pub fn with_folders(mut self, folders: Vec<String>) -> Self {
        self.folders = Some(folders);
        self
    }

    /// Whether a directory with this name is skipped during scans.
    pub fn is_excluded(&self, dir_name: &str) -> bool {
        is_excluded_dir(dir_name, &self.exclude)
    }
}

/// Whether a directory name is skipped: hidden directories, the defaults,
/// and `extra`.
pub fn is_excluded_dir(dir_name: &str, extra: &[String]) -> bool {
    dir_name.starts_with('.')
        || DEFAULT_EXCLUDES.contains(&dir_name)
        || extra.iter().any(|e| e == dir_name)
}

/// Find the nearest `pyproject.toml` at or above `path`.
pub fn find_project_file(path: &Path) -> ConfigResult<PathBuf> {
    let start = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };
    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_FILE);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found project file");
            return Ok(candidate);
        }
    }
    Err(ConfigError::ProjectNotFound {
        path: path.display().to_string(),
    })
}

/// Load the configuration of the project containing `path`.
pub fn load_project_config(path: &Path) -> ConfigResult<ProjectConfig> {
    let start = path.canonicalize().map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file = find_project_file(&start)?;
    let content = fs::read_to_string(&file).map_err(|source| ConfigError::Io {
        path: file.display().to_string(),
        source,
    })?;
    let root = file.parent().unwrap_or(&start).to_path_buf();
    parse_project_config(&root, &content).map_err(|err| match err {
        ConfigError::MissingProjectName { .. } => ConfigError::MissingProjectName {
            path: file.display().to_string(),
        },
        ConfigError::Toml { source, .. } => ConfigError::Toml {
            path: file.display().to_string(),
            source,
        },
        other => other,
    })
}

/// Build a configuration from `pyproject.toml` content.
pub fn parse_project_config(root: &Path, content: &str) -> ConfigResult<ProjectConfig> {
    let pyproject: PyProject = toml::from_str(content).map_err(|source| ConfigError::Toml {
        path: PROJECT_FILE.to_string(),
        source,
    })?;
    let project_name = project_name_of(&pyproject).ok_or_else(|| ConfigError::MissingProjectName {
        path: PROJECT_FILE.to_string(),
    })?;
    let pymove = pyproject.tool.and_then(|t| t.pymove).unwrap_or_default();
    Ok(ProjectConfig {
        root: root.to_path_buf(),
        folders: pymove.folders,
        project_name,
        exclude: pymove.exclude,
        formatter: pymove.formatter,
    })
}

/// The project name declared by `pyproject.toml` content.
///
/// Looks at `project.name`, then `tool.poetry.name`, then
/// `tool.pymove.project_name`, then the only entry of `tool.pymove.folders`.
pub fn project_name(content: &str) -> ConfigResult<String> {
    let pyproject: PyProject = toml::from_str(content).map_err(|source| ConfigError::Toml {
        path: PROJECT_FILE.to_string(),
        source,
    })?;
    project_name_of(&pyproject).ok_or_else(|| ConfigError::MissingProjectName {
        path: PROJECT_FILE.to_string(),
    })
}

fn project_name_of(pyproject: &PyProject) -> Option<String> {
    if let Some(name) = pyproject.project.as_ref().and_then(|p| p.name.clone()) {
        return Some(name);
    }
    let tool = pyproject.tool.as_ref()?;
    if let Some(name) = tool.poetry.as_ref().and_then(|p| p.name.clone()) {
        return Some(name);
    }
    let pymove = tool.pymove.as_ref()?;
    if let Some(name) = pymove.project_name.clone() {
        return Some(name);
    }
    match pymove.folders.as_deref() {
        Some([only]) => Some(only.clone()),
        _ => None,
    }
}
