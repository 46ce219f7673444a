//! One Classpath Element per canonical archive or directory: either kind
//! shares the capability set {enumerate-resources, open-resource,
//! list-child-classpath-elements}.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::path_resolver::ClasspathIdentity;

/// One matched classfile or generic-file resource.
#[derive(Debug, Clone)]
pub struct ClasspathResource {
    /// Path within the owning element (archive-entry name, or path below the
    /// directory root).
    pub path_within_element: String,
    /// The masking key: `path_within_element` with any in-archive base
    /// prefix stripped.
    pub relative_to_root: String,
}

/// Either a Directory Element or an Archive Element.
#[derive(Debug, Clone)]
pub enum ElementKind {
    Directory,
    Archive,
}

/// One classpath root, plus everything discovered about it during
/// traversal.
#[derive(Debug, Clone)]
pub struct ClasspathElement {
    pub identity: ClasspathIdentity,
    pub kind: ElementKind,
    pub open_failed: bool,
    pub classfile_matches: Vec<ClasspathResource>,
    pub file_matches: HashMap<String, Vec<ClasspathResource>>,
    /// Child identities declared via this element's manifest `Class-Path`.
    pub manifest_children: Vec<ClasspathIdentity>,
    /// Relative prefixes to skip during traversal because a nested element's
    /// root sits under this one.
    pub nested_root_prefixes: Vec<String>,
    pub examined_at: HashMap<String, SystemTime>,
    pub class_loaders: Vec<String>,
}

impl ClasspathElement {
    pub fn new(identity: ClasspathIdentity, kind: ElementKind) -> Self {
        Self {
            identity,
            kind,
            open_failed: false,
            classfile_matches: Vec::new(),
            file_matches: HashMap::new(),
            manifest_children: Vec::new(),
            nested_root_prefixes: Vec::new(),
            examined_at: HashMap::new(),
            class_loaders: Vec::new(),
        }
    }

    pub fn failed(identity: ClasspathIdentity, kind: ElementKind) -> Self {
        let mut element = Self::new(identity, kind);
        element.open_failed = true;
        element
    }

    pub fn display_path(&self) -> String {
        let base = self.identity.canonical_path.display().to_string();
        if self.identity.in_archive_base_dir.is_empty() {
            base
        } else {
            format!("{base}!/{}", self.identity.in_archive_base_dir)
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self.kind, ElementKind::Archive)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, ElementKind::Directory)
    }

    /// Every relative-to-root path currently recorded (classfile and
    /// generic-file matches), for masking.
    pub fn all_relative_paths(&self) -> impl Iterator<Item = &str> {
        self.classfile_matches
            .iter()
            .map(|r| r.relative_to_root.as_str())
            .chain(
                self.file_matches
                    .values()
                    .flatten()
                    .map(|r| r.relative_to_root.as_str()),
            )
    }

    pub fn retain_unmasked(&mut self, claimed: &mut std::collections::HashSet<String>) {
        self.classfile_matches.retain(|r| {
            if r.relative_to_root == "module-info.class" {
                claimed.insert(r.relative_to_root.clone());
                return true;
            }
            if claimed.contains(&r.relative_to_root) {
                tracing::debug!(path = %r.relative_to_root, element = %self.display_path(), "masked duplicate classfile");
                false
            } else {
                claimed.insert(r.relative_to_root.clone());
                true
            }
        });
        for matches in self.file_matches.values_mut() {
            matches.retain(|r| {
                if claimed.contains(&r.relative_to_root) {
                    tracing::debug!(path = %r.relative_to_root, element = %self.display_path(), "masked duplicate resource");
                    false
                } else {
                    claimed.insert(r.relative_to_root.clone());
                    true
                }
            });
        }
    }
}

/// Path of the canonical directory containing `file`, used to resolve a
/// manifest `Class-Path` attribute's space-delimited tokens.
pub fn containing_directory(file: &PathBuf) -> PathBuf {
    file.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}
