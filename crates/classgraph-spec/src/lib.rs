//! The scan specification: package/class/archive allow- and deny-lists, plus
//! the toggles that control what the rest of the engine indexes.
//!
//! A [`ScanSpec`] is built once from a sequence of tokens (see
//! [`ScanSpecBuilder`]) and is immutable afterwards; every other crate in
//! this workspace only ever reads from it.

mod defaults;
mod error;
mod glob;
mod tokens;

pub use error::{Error, ErrorKind};

use std::collections::HashSet;

use crate::glob::GlobSet;
use tokens::{ParsedToken, TokenKind};

/// Where a directory path sits relative to the allow/deny lists.
///
/// Returned by [`ScanSpec::path_match_status`]; drives pruning decisions
/// during path traversal.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum PathMatchStatus {
    /// The path is underneath (or equal to) a denied package prefix.
    WithinDenied,
    /// The path is underneath (or equal to) an allowed package prefix.
    WithinAllowed,
    /// The path is an ancestor of some allowed package prefix; traversal
    /// should recurse into it looking for the allowed subtree.
    AncestorOfAllowed,
    /// The path is the exact package of a specifically-allowed class.
    AtAllowedClassPackage,
    /// None of the above; prune.
    NotWithinAllowed,
}

/// Immutable, fully-resolved scan configuration.
///
/// Construct with [`ScanSpecBuilder`].
#[derive(Debug, Clone)]
pub struct ScanSpec {
    allowed_packages: Vec<String>,
    denied_packages: Vec<String>,
    allowed_classes: HashSet<String>,
    denied_classes: HashSet<String>,
    archive_allow: GlobSet,
    archive_deny: GlobSet,
    scan_archives: bool,
    scan_directories: bool,
    index_field_types: bool,
    index_method_annotations: bool,
    index_field_annotations: bool,
    capture_field_info: bool,
    capture_method_info: bool,
    strict_external_filtering: bool,
    ignore_visibility: bool,
    annotation_retention_class: bool,
    recursion_enabled: bool,
    deny_system_packages: bool,
    deny_system_archives: bool,
}

impl Default for ScanSpec {
    fn default() -> Self {
        ScanSpecBuilder::new().build()
    }
}

impl ScanSpec {
    /// Starts building a new scan spec.
    pub fn builder() -> ScanSpecBuilder {
        ScanSpecBuilder::new()
    }

    /// Classifies a directory's relative path against the allow/deny lists.
    ///
    /// Tie-break rules: denial always wins; the root `"/"` counts as an
    /// ancestor of every allowed path when recursion is enabled; with
    /// recursion disabled a directory is `WithinAllowed` only if it exactly
    /// equals an allowed prefix.
    pub fn path_match_status(&self, relative_dir_path: &str) -> PathMatchStatus {
        let normalized = normalize(relative_dir_path);

        if self.matches_any_prefix(&normalized, &self.denied_packages) {
            return PathMatchStatus::WithinDenied;
        }

        if self.matches_any_prefix(&normalized, &self.allowed_packages) {
            return PathMatchStatus::WithinAllowed;
        }

        if self.allowed_packages.is_empty() {
            // No package restriction at all: everything not denied is allowed.
            return PathMatchStatus::WithinAllowed;
        }

        if self.is_ancestor_of_some_allowed(&normalized) {
            return PathMatchStatus::AncestorOfAllowed;
        }

        if self.at_allowed_class_package(&normalized) {
            return PathMatchStatus::AtAllowedClassPackage;
        }

        PathMatchStatus::NotWithinAllowed
    }

    fn matches_any_prefix(&self, path: &str, prefixes: &[String]) -> bool {
        prefixes.iter().any(|prefix| is_prefix_of(prefix, path))
    }

    fn is_ancestor_of_some_allowed(&self, path: &str) -> bool {
        if path.is_empty() && self.recursion_enabled {
            // root is an ancestor of every allowed path when recursion is enabled
            return !self.allowed_packages.is_empty() || !self.allowed_classes.is_empty();
        }
        self.allowed_packages.iter().any(|allowed| {
            if self.recursion_enabled {
                is_prefix_of(path, allowed)
            } else {
                path == allowed
            }
        }) || self.allowed_classes.iter().any(|class_path| {
            let pkg = package_of(class_path);
            if self.recursion_enabled {
                is_prefix_of(path, pkg)
            } else {
                path == pkg
            }
        })
    }

    fn at_allowed_class_package(&self, path: &str) -> bool {
        self.allowed_classes
            .iter()
            .any(|class_path| package_of(class_path) == path)
    }

    /// True iff the given classfile relative path is specifically allowed
    /// and not specifically denied.
    pub fn is_specifically_allowed_class(&self, relative_path: &str) -> bool {
        let normalized = normalize(relative_path);
        let stem = normalized.strip_suffix(".class").unwrap_or(&normalized);
        if self.denied_classes.contains(stem) {
            return false;
        }
        self.allowed_classes.contains(stem)
    }

    /// True if the class is specifically denied, or falls under a denied
    /// package prefix.
    pub fn class_is_denied(&self, class_name: &str) -> bool {
        let normalized = class_name.replace('.', "/");
        if self.denied_classes.contains(&normalized) {
            return true;
        }
        if self.matches_any_prefix(&normalized, &self.denied_packages) {
            return true;
        }
        if self.deny_system_packages && is_system_package(&normalized) {
            return true;
        }
        false
    }

    /// Consults the exact and glob archive allow/deny sets. Deny wins; an
    /// empty allow-set means "all allowed".
    pub fn archive_is_allowed(&self, archive_name: &str) -> bool {
        if self.archive_deny.matches(archive_name) {
            return false;
        }
        if self.archive_allow.is_empty() {
            return true;
        }
        self.archive_allow.matches(archive_name)
    }

    /// Whether the standard-library archive at `path` should be denied,
    /// assuming system-archive denial hasn't been overridden off.
    pub fn deny_system_archive(&self, is_stdlib_archive: bool) -> bool {
        self.deny_system_archives && is_stdlib_archive
    }

    pub fn scan_archives_enabled(&self) -> bool {
        self.scan_archives
    }
    pub fn scan_directories_enabled(&self) -> bool {
        self.scan_directories
    }
    pub fn index_field_types(&self) -> bool {
        self.index_field_types
    }
    pub fn index_method_annotations(&self) -> bool {
        self.index_method_annotations
    }
    pub fn index_field_annotations(&self) -> bool {
        self.index_field_annotations
    }
    pub fn capture_field_info(&self) -> bool {
        self.capture_field_info
    }
    pub fn capture_method_info(&self) -> bool {
        self.capture_method_info
    }
    pub fn strict_external_filtering(&self) -> bool {
        self.strict_external_filtering
    }
    pub fn ignore_visibility(&self) -> bool {
        self.ignore_visibility
    }
    /// Whether `RuntimeInvisibleAnnotations` (CLASS retention) should also be read.
    pub fn annotation_retention_includes_class(&self) -> bool {
        self.annotation_retention_class
    }
    pub fn recursion_enabled(&self) -> bool {
        self.recursion_enabled
    }
    pub fn deny_system_packages(&self) -> bool {
        self.deny_system_packages
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').replace('.', "/")
}

fn package_of(class_relative_path: &str) -> &str {
    match class_relative_path.rfind('/') {
        Some(idx) => &class_relative_path[..idx],
        None => "",
    }
}

fn is_prefix_of(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Denied unless overridden: `java/`, `javax/`, `sun/`, and the JDK-internal
/// `jdk/internal/` family.
pub fn is_system_package(normalized_path: &str) -> bool {
    defaults::SYSTEM_PACKAGE_PREFIXES
        .iter()
        .any(|prefix| is_prefix_of(prefix, normalized_path))
}

/// Builds a [`ScanSpec`] from the token grammar described in the design:
/// `"!"` / `"!!"` toggle system-package/system-archive denial off, `"-"`
/// prefixes a deny, everything else is an allow, each optionally prefixed
/// with `jar:` or `dir:`.
#[derive(Debug, Default)]
pub struct ScanSpecBuilder {
    allowed_packages: Vec<String>,
    denied_packages: Vec<String>,
    allowed_classes: HashSet<String>,
    denied_classes: HashSet<String>,
    archive_allow_exact: HashSet<String>,
    archive_allow_glob: Vec<String>,
    archive_deny_exact: HashSet<String>,
    archive_deny_glob: Vec<String>,
    scan_archives: Option<bool>,
    scan_directories: Option<bool>,
    index_field_types: bool,
    index_method_annotations: bool,
    index_field_annotations: bool,
    capture_field_info: bool,
    capture_method_info: bool,
    strict_external_filtering: bool,
    ignore_visibility: bool,
    annotation_retention_class: bool,
    recursion_enabled: bool,
    deny_system_packages: bool,
    deny_system_archives: bool,
}

impl ScanSpecBuilder {
    pub fn new() -> Self {
        Self {
            scan_archives: None,
            scan_directories: None,
            recursion_enabled: true,
            deny_system_packages: true,
            deny_system_archives: true,
            ..Default::default()
        }
    }

    /// Feeds a single spec token through the grammar described above.
    pub fn token<S: AsRef<str>>(mut self, token: S) -> Self {
        match tokens::parse(token.as_ref()) {
            ParsedToken::DisableSystemPackageDenial => {
                self.deny_system_packages = false;
            }
            ParsedToken::DisableAllSystemDenial => {
                self.deny_system_packages = false;
                self.deny_system_archives = false;
            }
            ParsedToken::Entry {
                deny,
                kind,
                is_class,
                value,
            } => match kind {
                TokenKind::Unspecified if is_class => {
                    self.insert_class(deny, value);
                }
                TokenKind::Unspecified => {
                    self.insert_package(deny, value);
                }
                TokenKind::Dir if is_class => {
                    self.insert_class(deny, value);
                }
                TokenKind::Dir => {
                    self.insert_package(deny, value);
                }
                TokenKind::Jar => {
                    self.insert_archive(deny, value);
                }
            },
        }
        self
    }

    /// Feeds many tokens in order.
    pub fn tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for t in tokens {
            self = self.token(t);
        }
        self
    }

    fn insert_class(&mut self, deny: bool, value: String) {
        let normalized = value.replace('.', "/");
        if deny {
            self.denied_classes.insert(normalized);
        } else {
            self.allowed_classes.insert(normalized);
        }
    }

    fn insert_package(&mut self, deny: bool, value: String) {
        let normalized = value.trim_matches('/').replace('.', "/");
        if deny {
            self.denied_packages.push(normalized);
        } else {
            self.allowed_packages.push(normalized);
        }
    }

    fn insert_archive(&mut self, deny: bool, value: String) {
        let is_glob = value.contains('*');
        if deny {
            if is_glob {
                self.archive_deny_glob.push(value);
            } else {
                self.archive_deny_exact.insert(value);
            }
        } else if is_glob {
            self.archive_allow_glob.push(value);
        } else {
            self.archive_allow_exact.insert(value);
        }
    }

    pub fn scan_archives(mut self, yes: bool) -> Self {
        self.scan_archives = Some(yes);
        self
    }
    pub fn scan_directories(mut self, yes: bool) -> Self {
        self.scan_directories = Some(yes);
        self
    }
    pub fn index_field_types(mut self, yes: bool) -> Self {
        self.index_field_types = yes;
        self
    }
    pub fn index_method_annotations(mut self, yes: bool) -> Self {
        self.index_method_annotations = yes;
        self
    }
    pub fn index_field_annotations(mut self, yes: bool) -> Self {
        self.index_field_annotations = yes;
        self
    }
    pub fn capture_field_info(mut self, yes: bool) -> Self {
        self.capture_field_info = yes;
        self
    }
    pub fn capture_method_info(mut self, yes: bool) -> Self {
        self.capture_method_info = yes;
        self
    }
    pub fn strict_external_filtering(mut self, yes: bool) -> Self {
        self.strict_external_filtering = yes;
        self
    }
    pub fn ignore_visibility(mut self, yes: bool) -> Self {
        self.ignore_visibility = yes;
        self
    }
    pub fn annotation_retention_class(mut self, yes: bool) -> Self {
        self.annotation_retention_class = yes;
        self
    }
    pub fn recursion_enabled(mut self, yes: bool) -> Self {
        self.recursion_enabled = yes;
        self
    }

    /// Finalizes the builder into an immutable [`ScanSpec`].
    pub fn build(self) -> ScanSpec {
        ScanSpec {
            allowed_packages: self.allowed_packages,
            denied_packages: self.denied_packages,
            allowed_classes: self.allowed_classes,
            denied_classes: self.denied_classes,
            archive_allow: GlobSet::new(self.archive_allow_exact, self.archive_allow_glob),
            archive_deny: GlobSet::new(self.archive_deny_exact, self.archive_deny_glob),
            scan_archives: self.scan_archives.unwrap_or(true),
            scan_directories: self.scan_directories.unwrap_or(true),
            index_field_types: self.index_field_types,
            index_method_annotations: self.index_method_annotations,
            index_field_annotations: self.index_field_annotations,
            capture_field_info: self.capture_field_info,
            capture_method_info: self.capture_method_info,
            strict_external_filtering: self.strict_external_filtering,
            ignore_visibility: self.ignore_visibility,
            annotation_retention_class: self.annotation_retention_class,
            recursion_enabled: self.recursion_enabled,
            deny_system_packages: self.deny_system_packages,
            deny_system_archives: self.deny_system_archives,
        }
    }
}

/// Distinguishes a class name from a package name in a spec token using the
/// uppercase-leading-letter convention on the last path segment.
///
/// This heuristic can misclassify packages that begin with an uppercase
/// letter; that is a known, accepted limitation (see the design notes), not
/// a bug to be fixed here.
pub fn looks_like_class_name(token: &str) -> bool {
    let last_segment = token.rsplit(['/', '.']).next().unwrap_or(token);
    last_segment
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_package_prefix() {
        let spec = ScanSpec::builder().token("p").build();
        assert_eq!(
            spec.path_match_status("p/q"),
            PathMatchStatus::WithinAllowed
        );
        assert_eq!(spec.path_match_status("p"), PathMatchStatus::WithinAllowed);
        assert_eq!(
            spec.path_match_status("other"),
            PathMatchStatus::NotWithinAllowed
        );
    }

    #[test]
    fn ancestor_of_allowed_recurses() {
        let spec = ScanSpec::builder().token("p.q").build();
        assert_eq!(
            spec.path_match_status("p"),
            PathMatchStatus::AncestorOfAllowed
        );
    }

    #[test]
    fn root_is_ancestor_when_recursion_enabled() {
        let spec = ScanSpec::builder().token("p.q").build();
        assert_eq!(spec.path_match_status(""), PathMatchStatus::AncestorOfAllowed);
    }

    #[test]
    fn no_recursion_requires_exact_match() {
        let spec = ScanSpec::builder()
            .token("p.q")
            .recursion_enabled(false)
            .build();
        assert_eq!(
            spec.path_match_status("p"),
            PathMatchStatus::NotWithinAllowed
        );
        assert_eq!(
            spec.path_match_status("p/q"),
            PathMatchStatus::WithinAllowed
        );
    }

    #[test]
    fn denial_wins_over_allowance() {
        let spec = ScanSpec::builder().token("p").token("-p.secret").build();
        assert_eq!(
            spec.path_match_status("p/secret"),
            PathMatchStatus::WithinDenied
        );
        assert_eq!(
            spec.path_match_status("p/other"),
            PathMatchStatus::WithinAllowed
        );
    }

    #[test]
    fn specifically_allowed_class() {
        let spec = ScanSpecBuilder::new().token("p.MyClass").build();
        assert!(spec.is_specifically_allowed_class("p/MyClass.class"));
        assert!(!spec.is_specifically_allowed_class("p/Other.class"));
        assert_eq!(
            spec.path_match_status("p"),
            PathMatchStatus::AtAllowedClassPackage
        );
    }

    #[test]
    fn system_packages_denied_by_default() {
        let spec = ScanSpec::default();
        assert!(spec.class_is_denied("java/lang/Object"));
        assert!(spec.class_is_denied("javax/swing/JFrame"));
        assert!(spec.class_is_denied("sun/misc/Unsafe"));
    }

    #[test]
    fn bang_disables_system_package_denial() {
        let spec = ScanSpecBuilder::new().token("!").build();
        assert!(!spec.class_is_denied("java/lang/Object"));
    }

    #[test]
    fn archive_glob_matching() {
        let spec = ScanSpecBuilder::new().token("jar:app-*.jar").build();
        assert!(spec.archive_is_allowed("app-1.0.jar"));
        assert!(!spec.archive_is_allowed("other.jar"));
    }

    #[test]
    fn archive_deny_wins_over_allow() {
        let spec = ScanSpecBuilder::new()
            .token("jar:*.jar")
            .token("-jar:excluded.jar")
            .build();
        assert!(spec.archive_is_allowed("included.jar"));
        assert!(!spec.archive_is_allowed("excluded.jar"));
    }

    #[test]
    fn empty_allow_set_allows_everything() {
        let spec = ScanSpec::default();
        assert!(spec.archive_is_allowed("anything.jar"));
    }

    #[test]
    fn class_name_heuristic() {
        assert!(looks_like_class_name("com.example.MyClass"));
        assert!(!looks_like_class_name("com.example"));
        // Known misclassification: packages starting uppercase look like classes.
        assert!(looks_like_class_name("com.Example"));
    }
}
