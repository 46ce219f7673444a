//! Canonicalizes a raw classpath token against a base directory into a
//! stable [`ClasspathIdentity`], following (but not opening) nested-archive
//! `!/` chains.

use std::path::{Path, PathBuf};

use classgraph_spec::ScanSpec;

use crate::error::Error;

/// `(canonical_file_path, in_archive_base_dir)`. Two tokens that resolve to
/// the same identity are the same Classpath Element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClasspathIdentity {
    pub canonical_path: PathBuf,
    pub in_archive_base_dir: String,
}

impl ClasspathIdentity {
    pub fn new(canonical_path: PathBuf, in_archive_base_dir: impl Into<String>) -> Self {
        Self {
            canonical_path,
            in_archive_base_dir: in_archive_base_dir.into(),
        }
    }

    /// The chain of `!/`-separated inner-archive segments, outermost first,
    /// if this token named a nested archive. Empty for a plain file/dir.
    pub fn nested_chain(&self) -> Vec<&str> {
        if self.in_archive_base_dir.is_empty() {
            Vec::new()
        } else {
            self.in_archive_base_dir.split("!/").collect()
        }
    }
}

/// A resolved raw classpath token: the token as given, its resolved
/// identity, and whether it names a directory (vs. a file/archive).
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub raw_token: String,
    pub identity: ClasspathIdentity,
    pub is_directory: bool,
    /// Set when the token could not be resolved to anything on disk.
    pub open_failed: bool,
}

/// Resolves one raw classpath token against `base_dir`, following `!/`
/// nested-archive notation without opening anything.
pub fn resolve(raw_token: &str, base_dir: &Path) -> ResolvedToken {
    let (outer, nested_suffix) = match raw_token.split_once("!/") {
        Some((outer, rest)) => (outer, Some(rest)),
        None => (raw_token, None),
    };

    let candidate = if Path::new(outer).is_absolute() {
        PathBuf::from(outer)
    } else {
        base_dir.join(outer)
    };

    let normalized = normalize(&candidate);

    match std::fs::canonicalize(&normalized) {
        Ok(canonical) => {
            let is_directory = canonical.is_dir();
            ResolvedToken {
                raw_token: raw_token.to_string(),
                identity: ClasspathIdentity::new(canonical, nested_suffix.unwrap_or("")),
                is_directory,
                open_failed: false,
            }
        }
        Err(_) => ResolvedToken {
            raw_token: raw_token.to_string(),
            identity: ClasspathIdentity::new(normalized, nested_suffix.unwrap_or("")),
            is_directory: false,
            open_failed: true,
        },
    }
}

/// Normalizes `.`/`..` components without touching the filesystem or
/// resolving symlinks (that happens only in [`resolve`]'s final
/// `canonicalize` call).
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `is_valid_element`: whether a resolved token should be admitted
/// as a Classpath Element given the scan spec's toggles.
pub fn is_valid_element(resolved: &ResolvedToken, spec: &ScanSpec, is_stdlib_archive: bool) -> bool {
    if resolved.open_failed {
        return false;
    }
    if resolved.is_directory {
        return spec.scan_directories_enabled();
    }
    if !spec.scan_archives_enabled() {
        return false;
    }
    if spec.deny_system_archive(is_stdlib_archive) {
        return false;
    }
    let archive_name = resolved
        .identity
        .canonical_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    spec.archive_is_allowed(archive_name)
}

/// Locates the current runtime's standard-library archive(s), if any can be
/// found, for optional insertion at classpath order position 0 and for
/// [`is_valid_element`]'s system-archive check. Absence is not an error: a
/// JDK may simply not be present in this environment.
pub fn locate_runtime_stdlib_archive() -> Option<PathBuf> {
    let java_home = java_locator::locate_java_home().ok()?;
    let candidates = [
        Path::new(&java_home).join("lib").join("rt.jar"),
        Path::new(&java_home).join("lib").join("jrt-fs.jar"),
    ];
    candidates.into_iter().find(|p| p.exists())
}

pub(crate) fn wrap_io<T>(result: std::io::Result<T>) -> Result<T, Error> {
    result.map_err(|e| Error::new(crate::error::ErrorKind::from(e)))
}
