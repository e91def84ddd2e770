//! Qualified-name resolution.
//!
//! Turns possibly-relative dotted names into absolute ones using the
//! importing module's package, and maps absolute `module.object` names onto
//! modules of a [`DependencyGraph`].

use thiserror::Error;
use tracing::trace;

use crate::graph::{DependencyGraph, ModuleId};

/// Errors resolving a relative name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A relative name was used outside of any package.
    #[error("no package specified for '{name}' (required for relative names)")]
    NoPackage { name: String },

    /// The relative name climbs above the top-level package.
    #[error("relative name '{name}' goes beyond top-level package '{package}'")]
    BeyondTopLevel { name: String, package: String },
}

/// Result type for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Resolve a possibly-relative dotted name against `package`.
///
/// Absolute names are returned unchanged. For a relative name, the number of
/// leading dots is the level: level 1 is the package itself, each further dot
/// climbs one parent.
///
/// # Example
///
/// ```ignore
/// assert_eq!(resolve_name(".mod2", "proj.pkg")?, "proj.pkg.mod2");
/// assert_eq!(resolve_name("..a", "proj.pkg")?, "proj.a");
/// assert_eq!(resolve_name(".", "proj.pkg")?, "proj.pkg");
/// ```
pub fn resolve_name(name: &str, package: &str) -> ResolveResult<String> {
    if !name.starts_with('.') {
        return Ok(name.to_string());
    }
    if package.is_empty() {
        return Err(ResolveError::NoPackage {
            name: name.to_string(),
        });
    }
    let level = name.chars().take_while(|&c| c == '.').count();
    let rest = &name[level..];

    let bits: Vec<&str> = package.rsplitn(level, '.').collect();
    if bits.len() < level {
        return Err(ResolveError::BeyondTopLevel {
            name: name.to_string(),
            package: package.to_string(),
        });
    }
    let base = bits[bits.len() - 1];
    if rest.is_empty() {
        Ok(base.to_string())
    } else {
        Ok(format!("{}.{}", base, rest))
    }
}

/// Split a dotted name into `(module, object)` at its last dot.
///
/// A name without a dot yields an empty module part.
pub fn split_qualified(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

/// Drop `__init__` components: `pkg.__init__.f` names the same object as `pkg.f`.
pub fn strip_init(name: &str) -> String {
    name.split('.')
        .filter(|part| *part != "__init__")
        .collect::<Vec<_>>()
        .join(".")
}

/// Resolve a possibly-relative `module.object` name to a graph module and
/// the object's name within it.
///
/// Returns `None` when the name cannot be resolved or names a module outside
/// the project.
pub fn resolve_qualified(
    graph: &DependencyGraph,
    name: &str,
    package: &str,
) -> Option<(ModuleId, String)> {
    let absolute = match resolve_name(name, package) {
        Ok(absolute) => absolute,
        Err(err) => {
            trace!(name, package, error = %err, "unresolvable name");
            return None;
        }
    };
    let (module, object) = split_qualified(&absolute);
    if module.is_empty() || object.is_empty() {
        return None;
    }
    graph
        .node_from_path(module)
        .map(|id| (id, object.to_string()))
}
