//! Path Traversal: classifies every entry under a Classpath Element
//! and records classfile/generic-file matches. Directories get a recursive
//! filesystem walk pruned by [`ScanSpec::path_match_status`]; archives get a
//! single linear pass over their central directory.

use std::io::Read;

use classgraph_spec::{PathMatchStatus, ScanSpec};

use crate::archive_pool::ArchiveHandlePool;
use crate::classpath_element::{ClasspathElement, ClasspathResource};
use crate::error::Error;
use crate::path_resolver::{self, ClasspathIdentity};

/// Walks a Directory Element's filesystem subtree, recording matches
/// directly on `element`.
pub fn traverse_directory(element: &mut ClasspathElement, spec: &ScanSpec) -> Result<(), Error> {
    let root = element.identity.canonical_path.clone();

    let walker = walkdir::WalkDir::new(&root).into_iter().filter_entry(|entry| {
        if entry.path() == root {
            return true;
        }
        if !entry.file_type().is_dir() {
            return true;
        }
        let relative = relative_to(&root, entry.path());
        !matches!(
            spec.path_match_status(&relative),
            PathMatchStatus::WithinDenied | PathMatchStatus::NotWithinAllowed
        )
    });

    for entry in walker {
        let entry = path_resolver::wrap_io(entry.map_err(walkdir_to_io))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = relative_to(&root, entry.path());
        let parent_status = spec.path_match_status(parent_of(&relative));
        let recorded = record_match(element, &relative, parent_status, spec);
        if recorded {
            if let Ok(metadata) = entry.metadata() {
                if let Ok(modified) = metadata.modified() {
                    element.examined_at.insert(relative.clone(), modified);
                }
            }
        }
    }

    Ok(())
}

fn walkdir_to_io(e: walkdir::Error) -> std::io::Error {
    e.into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"))
}

fn relative_to(root: &std::path::Path, path: &std::path::Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn parent_of(relative_path: &str) -> &str {
    match relative_path.rfind('/') {
        Some(idx) => &relative_path[..idx],
        None => "",
    }
}

fn record_match(element: &mut ClasspathElement, relative: &str, parent_status: PathMatchStatus, spec: &ScanSpec) -> bool {
    match parent_status {
        PathMatchStatus::WithinDenied | PathMatchStatus::NotWithinAllowed => false,
        PathMatchStatus::AtAllowedClassPackage => {
            if relative.ends_with(".class") && spec.is_specifically_allowed_class(relative) {
                push_classfile(element, relative);
                true
            } else {
                false
            }
        }
        PathMatchStatus::WithinAllowed | PathMatchStatus::AncestorOfAllowed => {
            if relative.ends_with(".class") {
                push_classfile(element, relative);
            } else {
                push_generic_file(element, relative);
            }
            true
        }
    }
}

fn push_classfile(element: &mut ClasspathElement, relative: &str) {
    element.classfile_matches.push(ClasspathResource {
        path_within_element: relative.to_string(),
        relative_to_root: relative.to_string(),
    });
}

/// Files that aren't classfiles are grouped by extension (or `"other"` for
/// extension-less names), since the scan spec does not register named
/// file-path matchers of its own.
fn push_generic_file(element: &mut ClasspathElement, relative: &str) {
    let bucket = std::path::Path::new(relative)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("other")
        .to_string();
    element.file_matches.entry(bucket).or_default().push(ClasspathResource {
        path_within_element: relative.to_string(),
        relative_to_root: relative.to_string(),
    });
}

/// Single linear pass over an Archive Element's central directory. Returns
/// child identities declared in `META-INF/MANIFEST.MF`'s `Class-Path`
/// attribute, if present, for the caller to submit back onto the work
/// queue.
pub fn traverse_archive(
    element: &mut ClasspathElement,
    pool: &ArchiveHandlePool,
    spec: &ScanSpec,
) -> Result<Vec<ClasspathIdentity>, Error> {
    let base_prefix = if element.identity.in_archive_base_dir.is_empty() {
        String::new()
    } else {
        format!("{}/", element.identity.nested_chain().last().copied().unwrap_or(""))
    };

    let mut pooled = pool.acquire(&element.identity)?;
    let reader = pooled.reader();
    let count = reader.len();

    let mut cached_parent: Option<(String, PathMatchStatus)> = None;
    let mut manifest_bytes: Option<Vec<u8>> = None;

    for i in 0..count {
        let mut entry = reader.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();

        let Some(relative) = name.strip_prefix(&base_prefix).map(str::to_string) else { continue };

        if relative == "META-INF/MANIFEST.MF" {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            manifest_bytes = Some(bytes);
        }

        let parent = parent_of(&relative).to_string();
        let parent_status = match &cached_parent {
            Some((cached, status)) if cached == &parent => *status,
            _ => {
                let status = spec.path_match_status(&parent);
                cached_parent = Some((parent.clone(), status));
                status
            }
        };

        if relative.ends_with(".class") {
            match parent_status {
                PathMatchStatus::WithinAllowed | PathMatchStatus::AncestorOfAllowed => {
                    element.classfile_matches.push(ClasspathResource {
                        path_within_element: name,
                        relative_to_root: relative,
                    });
                }
                PathMatchStatus::AtAllowedClassPackage if spec.is_specifically_allowed_class(&relative) => {
                    element.classfile_matches.push(ClasspathResource {
                        path_within_element: name,
                        relative_to_root: relative,
                    });
                }
                _ => {}
            }
        } else if matches!(
            parent_status,
            PathMatchStatus::WithinAllowed | PathMatchStatus::AncestorOfAllowed
        ) {
            let bucket = std::path::Path::new(&relative)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("other")
                .to_string();
            element
                .file_matches
                .entry(bucket)
                .or_default()
                .push(ClasspathResource { path_within_element: name, relative_to_root: relative });
        }
    }
    drop(pooled);

    let Some(manifest_bytes) = manifest_bytes else { return Ok(Vec::new()) };
    let Some(class_path_tokens) = parse_manifest_class_path(&manifest_bytes) else { return Ok(Vec::new()) };

    let containing_dir = crate::classpath_element::containing_directory(&element.identity.canonical_path);
    let children: Vec<ClasspathIdentity> = class_path_tokens
        .iter()
        .map(|token| path_resolver::resolve(token, &containing_dir).identity)
        .collect();
    element.manifest_children = children.clone();
    Ok(children)
}

/// Extracts the space-delimited `Class-Path` main attribute from a raw
/// manifest byte stream, if present.
fn parse_manifest_class_path(bytes: &[u8]) -> Option<Vec<String>> {
    let text = String::from_utf8_lossy(bytes);
    // MANIFEST.MF continuation lines start with a single space; unfold them
    // before looking for the attribute.
    let mut unfolded = String::new();
    for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
        if let Some(continuation) = line.strip_prefix(' ') {
            unfolded.push_str(continuation);
        } else {
            if !unfolded.is_empty() {
                unfolded.push('\n');
            }
            unfolded.push_str(line);
        }
    }

    for line in unfolded.lines() {
        if let Some(value) = line.strip_prefix("Class-Path:") {
            return Some(
                value
                    .trim()
                    .split(' ')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect(),
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath_element::ElementKind;
    use std::fs;

    #[test]
    fn directory_traversal_records_classfiles_and_prunes_denied() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("com/example")).unwrap();
        fs::create_dir_all(dir.path().join("com/denied")).unwrap();
        fs::write(dir.path().join("com/example/Foo.class"), b"x").unwrap();
        fs::write(dir.path().join("com/denied/Bar.class"), b"x").unwrap();
        fs::write(dir.path().join("com/example/readme.txt"), b"hi").unwrap();

        let spec = ScanSpec::builder().token("com.example").token("-com.denied").build();
        let identity = ClasspathIdentity::new(dir.path().canonicalize().unwrap(), "");
        let mut element = ClasspathElement::new(identity, ElementKind::Directory);

        traverse_directory(&mut element, &spec).unwrap();

        assert_eq!(element.classfile_matches.len(), 1);
        assert_eq!(element.classfile_matches[0].relative_to_root, "com/example/Foo.class");
        assert_eq!(element.file_matches.get("txt").map(Vec::len), Some(1));
    }

    #[test]
    fn manifest_class_path_is_unfolded_and_split_on_space() {
        let manifest = b"Manifest-Version: 1.0\r\nClass-Path: a.jar b.jar \r\n c.jar\r\n";
        let tokens = parse_manifest_class_path(manifest).unwrap();
        assert_eq!(tokens, vec!["a.jar", "b.jar", "c.jar"]);
    }
}
