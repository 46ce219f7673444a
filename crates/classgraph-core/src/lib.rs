//! The classpath scanning and class-metadata indexing engine:
//! resolves a raw classpath into canonical elements, walks and masks their
//! contents, parses every surviving classfile, and links the result into a
//! queryable [`ClassGraph`].
//!
//! [`scan`] is the single entry point; everything else in this crate is a
//! component it wires together. The singleton registry and archive pool are
//! scoped to one call.

pub mod archive_pool;
pub mod classpath_element;
pub mod error;
pub mod graph;
pub mod linker;
pub mod ordering;
pub mod path_resolver;
pub mod traversal;
pub mod work_queue;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use classgraph_spec::ScanSpec;

pub use error::{Error, ErrorKind};
pub use graph::{ClassGraph, ClassInfo, ClassTypeMask, FQName, FQNameBuf, RelType};
pub use path_resolver::ClasspathIdentity;
pub use work_queue::InterruptHandle;

use archive_pool::ArchiveHandlePool;
use classpath_element::{ClasspathElement, ClasspathResource, ElementKind};
use linker::LinkInput;

/// One raw classpath entry, as supplied by the external classpath provider
/// optionally carrying the class loader(s) it should be associated
/// with once linked.
#[derive(Debug, Clone)]
pub struct ClasspathToken {
    pub raw: String,
    pub class_loaders: Vec<String>,
}

impl ClasspathToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), class_loaders: Vec::new() }
    }
}

/// Everything surfaced to external collaborators after a scan completes.
pub struct ScanResult {
    pub graph: ClassGraph,
    /// Classpath Elements in final scan order.
    pub elements: Vec<ClasspathElement>,
    /// `"<display_path>!<relative_path>" -> last modified`, for files
    /// actually examined during traversal.
    pub file_last_modified: HashMap<String, SystemTime>,
    /// Classfile parse failures and other non-fatal errors recorded during
    /// the scan.
    pub deferred_errors: Vec<Error>,
    pub interrupt_handle: InterruptHandle,
    pub spec: ScanSpec,
}

impl ScanResult {
    pub fn archive_paths(&self) -> Vec<String> {
        self.elements.iter().filter(|e| e.is_archive()).map(|e| e.display_path()).collect()
    }

    pub fn directory_paths(&self) -> Vec<String> {
        self.elements.iter().filter(|e| e.is_directory()).map(|e| e.display_path()).collect()
    }

    /// Same as [`ClassGraph::related`], but first checks that `rel`'s
    /// backing index was actually enabled on the spec this scan ran with.
    /// Querying a method/field-annotation or field-type-reference relation
    /// without having asked for it back at scan time is almost certainly a
    /// caller bug, so this fails loud instead of silently returning nothing.
    pub fn related_checked(&self, name: &FQName, rel: RelType) -> Result<Vec<&ClassInfo>, Error> {
        let axis = match rel {
            RelType::FieldTypeReference | RelType::FieldTypeReferencedBy => {
                Some(("field type references", self.spec.index_field_types()))
            }
            RelType::MethodAnnotation | RelType::ClassWithMethodAnnotation => {
                Some(("method annotations", self.spec.index_method_annotations()))
            }
            RelType::FieldAnnotation | RelType::ClassWithFieldAnnotation => {
                Some(("field annotations", self.spec.index_field_annotations()))
            }
            _ => None,
        };
        if let Some((axis, enabled)) = axis {
            graph::require_indexed(enabled, axis)?;
        }
        Ok(self.graph.related(name, rel))
    }
}

/// Runs a full scan: resolution, traversal, ordering/masking, classfile
/// parsing, and linking. `interrupt` lets a caller cancel from another
/// thread while this call blocks; it is also handed back on [`ScanResult`]
/// so callers can check whether the scan that produced it was cut short.
pub fn scan(
    spec: ScanSpec,
    tokens: Vec<ClasspathToken>,
    base_dir: PathBuf,
    pool_size: usize,
    interrupt: InterruptHandle,
) -> Result<ScanResult, Error> {
    let pool = ArchiveHandlePool::new()?;
    let registry: Mutex<HashMap<ClasspathIdentity, ClasspathElement>> = Mutex::new(HashMap::new());
    let loaders: Mutex<HashMap<ClasspathIdentity, Vec<String>>> = Mutex::new(HashMap::new());
    let deferred: Mutex<Vec<Error>> = Mutex::new(Vec::new());

    let stdlib_path = path_resolver::locate_runtime_stdlib_archive();

    let mut roots = Vec::new();
    let mut initial_units = Vec::new();
    for token in &tokens {
        let resolved = path_resolver::resolve(&token.raw, &base_dir);
        let is_stdlib = stdlib_path
            .as_deref()
            .map(|p| resolved.identity.canonical_path == p)
            .unwrap_or(false);
        if !path_resolver::is_valid_element(&resolved, &spec, is_stdlib) {
            tracing::warn!(token = %token.raw, "classpath token rejected during resolution");
            continue;
        }
        note_class_loaders(&loaders, &resolved.identity, &token.class_loaders);
        if register_new(&registry, &resolved.identity, resolved.is_directory) {
            initial_units.push(resolved.identity.clone());
        }
        if !roots.contains(&resolved.identity) {
            roots.push(resolved.identity.clone());
        }
    }

    // Runtime stdlib: traversed like any other element (when not denied)
    // but excluded from the ordinary depth-first root list; it is seated
    // at position 0 explicitly below.
    let stdlib_identity = if !spec.deny_system_archive(true) {
        stdlib_path.map(|path| {
            let identity = ClasspathIdentity::new(path, "");
            if register_new(&registry, &identity, false) {
                initial_units.push(identity.clone());
            }
            identity
        })
    } else {
        None
    };

    work_queue::run(pool_size, initial_units, interrupt.clone(), |identity, submitter| {
        match process_one_element(&identity, &spec, &pool, &registry) {
            Ok(children) => {
                for (child, child_loaders) in children {
                    note_class_loaders(&loaders, &child, &child_loaders);
                    if register_new(&registry, &child, is_directory_path(&child)) {
                        submitter.submit(child);
                    }
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(element = %identity.canonical_path.display(), error = %e, "element traversal failed");
                deferred.lock().expect("deferred-error mutex poisoned").push(e);
                Ok(())
            }
        }
    })?;

    let mut elements = registry.into_inner().expect("registry mutex poisoned");

    let mut order = ordering::depth_first_order(&roots, &elements);
    ordering::seat_runtime_stdlib(&mut order, stdlib_identity);
    ordering::detect_nested_roots(&order, &mut elements);
    ordering::mask(&order, &mut elements);

    let mut parse_units = Vec::new();
    for identity in &order {
        let Some(element) = elements.get(identity) else { continue };
        for resource in &element.classfile_matches {
            parse_units.push((identity.clone(), resource.clone()));
        }
    }

    let link_inputs: Mutex<Vec<LinkInput>> = Mutex::new(Vec::new());
    let loaders_snapshot = loaders.into_inner().expect("loaders mutex poisoned");
    work_queue::run(pool_size, parse_units, InterruptHandle::new(), |(identity, resource), _submitter| {
        match read_resource_bytes(&identity, &resource, &elements, &pool) {
            Ok(bytes) => match classgraph_classfile::parse_unlinked(&bytes, &spec) {
                Ok(Some(record)) => {
                    let class_loaders = loaders_snapshot.get(&identity).cloned().unwrap_or_default();
                    link_inputs
                        .lock()
                        .expect("link-input mutex poisoned")
                        .push(LinkInput { record, origin: identity, class_loaders });
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => {
                    tracing::warn!(path = %resource.relative_to_root, error = %e, "classfile parse failed");
                    deferred.lock().expect("deferred-error mutex poisoned").push(Error::new(
                        ErrorKind::ParseFailure(resource.relative_to_root.clone(), e.to_string()),
                    ));
                    Ok(())
                }
            },
            Err(e) => {
                tracing::warn!(path = %resource.relative_to_root, error = %e, "failed to read classfile bytes");
                deferred.lock().expect("deferred-error mutex poisoned").push(e);
                Ok(())
            }
        }
    })?;

    let graph = linker::link(link_inputs.into_inner().expect("link-input mutex poisoned"))?;

    let mut file_last_modified = HashMap::new();
    let mut ordered_elements = Vec::new();
    for identity in &order {
        if let Some(element) = elements.remove(identity) {
            let display = element.display_path();
            for (relative, modified) in &element.examined_at {
                file_last_modified.insert(format!("{display}!{relative}"), *modified);
            }
            ordered_elements.push(element);
        }
    }

    Ok(ScanResult {
        graph,
        elements: ordered_elements,
        file_last_modified,
        deferred_errors: deferred.into_inner().expect("deferred-error mutex poisoned"),
        interrupt_handle: interrupt,
        spec,
    })
}

fn is_directory_path(identity: &ClasspathIdentity) -> bool {
    identity.in_archive_base_dir.is_empty() && identity.canonical_path.is_dir()
}

fn note_class_loaders(
    loaders: &Mutex<HashMap<ClasspathIdentity, Vec<String>>>,
    identity: &ClasspathIdentity,
    new_loaders: &[String],
) {
    if new_loaders.is_empty() {
        return;
    }
    let mut guard = loaders.lock().expect("class-loader mutex poisoned");
    let entry = guard.entry(identity.clone()).or_default();
    for loader in new_loaders {
        if !entry.contains(loader) {
            entry.push(loader.clone());
        }
    }
}

/// Idempotent get-or-create against the singleton registry: a second
/// creation for the same identity returns the first. Returns `true` only
/// the first time `identity` is seen, so the caller knows whether to
/// schedule it for traversal.
fn register_new(
    registry: &Mutex<HashMap<ClasspathIdentity, ClasspathElement>>,
    identity: &ClasspathIdentity,
    is_directory: bool,
) -> bool {
    let mut guard = registry.lock().expect("registry mutex poisoned");
    if guard.contains_key(identity) {
        return false;
    }
    let kind = if is_directory { ElementKind::Directory } else { ElementKind::Archive };
    guard.insert(identity.clone(), ClasspathElement::new(identity.clone(), kind));
    true
}

/// Traverses one Classpath Element and returns any manifest-declared child
/// identities (with no associated class loaders of their own) to enqueue.
fn process_one_element(
    identity: &ClasspathIdentity,
    spec: &ScanSpec,
    pool: &ArchiveHandlePool,
    registry: &Mutex<HashMap<ClasspathIdentity, ClasspathElement>>,
) -> Result<Vec<(ClasspathIdentity, Vec<String>)>, Error> {
    let is_directory = {
        let guard = registry.lock().expect("registry mutex poisoned");
        guard.get(identity).map(|e| e.is_directory()).unwrap_or(false)
    };

    if is_directory {
        let mut element = ClasspathElement::new(identity.clone(), ElementKind::Directory);
        traversal::traverse_directory(&mut element, spec)?;
        let mut guard = registry.lock().expect("registry mutex poisoned");
        guard.insert(identity.clone(), element);
        Ok(Vec::new())
    } else {
        let mut element = ClasspathElement::new(identity.clone(), ElementKind::Archive);
        let children = traversal::traverse_archive(&mut element, pool, spec)?;
        let mut guard = registry.lock().expect("registry mutex poisoned");
        guard.insert(identity.clone(), element);
        Ok(children.into_iter().map(|c| (c, Vec::new())).collect())
    }
}

fn read_resource_bytes(
    identity: &ClasspathIdentity,
    resource: &ClasspathResource,
    elements: &HashMap<ClasspathIdentity, ClasspathElement>,
    pool: &ArchiveHandlePool,
) -> Result<Vec<u8>, Error> {
    let is_archive = elements.get(identity).map(|e| e.is_archive()).unwrap_or(false);
    if is_archive {
        use std::io::Read;
        let mut pooled = pool.acquire(identity)?;
        let mut entry = pooled.reader().by_name(&resource.path_within_element)?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        let path = identity.canonical_path.join(&resource.path_within_element);
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_an_empty_directory_yields_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ScanSpec::builder().scan_directories(true).scan_archives(true).build();
        let result = scan(
            spec,
            vec![ClasspathToken::new(dir.path().to_string_lossy().to_string())],
            dir.path().to_path_buf(),
            2,
            InterruptHandle::new(),
        )
        .unwrap();
        assert!(result.graph.is_empty());
        assert!(result.deferred_errors.is_empty());
        assert_eq!(result.directory_paths().len(), 1);
    }

    #[test]
    fn scan_rejects_nonexistent_root_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ScanSpec::default();
        let result = scan(
            spec,
            vec![ClasspathToken::new("does-not-exist")],
            dir.path().to_path_buf(),
            1,
            InterruptHandle::new(),
        )
        .unwrap();
        assert!(result.elements.is_empty());
    }

    #[test]
    fn directory_with_classfile_is_linked() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/Foo.class"), minimal_classfile()).unwrap();

        let spec = ScanSpec::builder().token("a").build();
        let result = scan(
            spec,
            vec![ClasspathToken::new(".")],
            dir.path().to_path_buf(),
            2,
            InterruptHandle::new(),
        )
        .unwrap();

        assert_eq!(result.graph.len(), 1);
        assert!(result.graph.get(FQName::new("a/Foo")).is_some());
    }

    #[test]
    fn related_checked_rejects_unindexed_relation() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ScanSpec::builder().scan_directories(true).scan_archives(true).build();
        let result = scan(
            spec,
            vec![ClasspathToken::new(dir.path().to_string_lossy().to_string())],
            dir.path().to_path_buf(),
            1,
            InterruptHandle::new(),
        )
        .unwrap();

        let err = result
            .related_checked(FQName::new("a/Foo"), RelType::FieldAnnotation)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IndexingNotEnabled("field annotations")));
    }

    fn minimal_classfile() -> Vec<u8> {
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
        // constant pool count = 3 (2 entries: #1 Utf8 "a/Foo", #2 Class -> #1)
        bytes.extend_from_slice(&3u16.to_be_bytes());
        bytes.push(1); // Utf8
        let name = b"a/Foo";
        bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(name);
        bytes.push(7); // Class
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&0x0021u16.to_be_bytes()); // access flags: public super
        bytes.extend_from_slice(&2u16.to_be_bytes()); // this_class -> #2
        bytes.extend_from_slice(&0u16.to_be_bytes()); // super_class: none
        bytes.extend_from_slice(&0u16.to_be_bytes()); // interfaces count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // fields count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // methods count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // attributes count
        bytes
    }
}
