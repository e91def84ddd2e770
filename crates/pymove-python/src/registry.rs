//! Module discovery.
//!
//! Walks a project's source folders and loads every `.py` file as a
//! [`Module`]. A declared folder's path becomes the leading package segments,
//! nested directories extend the package, and the file stem is the module
//! name. Without declared folders the project root is walked and top-level
//! files have no package.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{is_excluded_dir, ProjectConfig};
use crate::module::Module;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A declared source folder does not exist.
    #[error("source folder not found: {path}")]
    FolderNotFound { path: String },
}

/// Result type for scans.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A problem with one file; the rest of the scan continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanDiagnostic {
    pub path: PathBuf,
    pub message: String,
}

/// Modules found by a scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Loaded modules, sorted by path.
    pub modules: Vec<Module>,
    pub diagnostics: Vec<ScanDiagnostic>,
    /// The directories that were walked.
    pub folders: Vec<PathBuf>,
}

impl ScanResult {
    fn extend(&mut self, other: ScanResult) {
        self.modules.extend(other.modules);
        self.diagnostics.extend(other.diagnostics);
        self.folders.extend(other.folders);
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Scan every source folder of a project.
pub fn scan_project(config: &ProjectConfig) -> RegistryResult<ScanResult> {
    info!(root = %config.root.display(), "scanning project");
    let mut result = ScanResult::default();
    match &config.folders {
        Some(folders) => {
            for folder in folders {
                result.extend(scan_folder(&config.root, Some(folder), &config.exclude)?);
            }
        }
        None => result.extend(scan_folder(&config.root, None, &config.exclude)?),
    }
    result.modules.sort_by(|a, b| a.path.cmp(&b.path));
    info!(
        modules = result.modules.len(),
        diagnostics = result.diagnostics.len(),
        "scan finished"
    );
    Ok(result)
}

/// Scan one folder of `root`, or `root` itself when `folder` is `None`.
///
/// Files that cannot be read are reported and skipped. Files that do not
/// parse are loaded with their parse error and reported.
pub fn scan_folder(
    root: &Path,
    folder: Option<&str>,
    exclude: &[String],
) -> RegistryResult<ScanResult> {
    let dir = match folder {
        Some(folder) => root.join(folder),
        None => root.to_path_buf(),
    };
    if !dir.is_dir() {
        return Err(RegistryError::FolderNotFound {
            path: dir.display().to_string(),
        });
    }
    let base_package = folder.map(folder_package).unwrap_or_default();

    let mut result = ScanResult {
        folders: vec![dir.clone()],
        ..ScanResult::default()
    };
    let walker = WalkDir::new(&dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_excluded_dir(&entry.file_name().to_string_lossy(), exclude)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                warn!(path = %path.display(), error = %err, "cannot walk");
                result.diagnostics.push(ScanDiagnostic {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let package = file_package(&base_package, &dir, path);

        match Module::load(path, &dir, package, name) {
            Ok(module) => {
                if let Some(error) = module.parse_error() {
                    result.diagnostics.push(ScanDiagnostic {
                        path: path.to_path_buf(),
                        message: error.to_string(),
                    });
                }
                debug!(module = %module.full_mod_name(), "loaded module");
                result.modules.push(module);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping module");
                result.diagnostics.push(ScanDiagnostic {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(result)
}

/// Dotted package of a declared folder (`src/app` gives `src.app`).
fn folder_package(folder: &str) -> String {
    Path::new(folder)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Package of a file: the folder package extended by the directories
/// between the folder and the file.
fn file_package(base: &str, dir: &Path, file: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !base.is_empty() {
        parts.push(base.to_string());
    }
    if let Some(parent) = file.parent().and_then(|p| p.strip_prefix(dir).ok()) {
        parts.extend(
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                }),
        );
    }
    parts.join(".")
}
