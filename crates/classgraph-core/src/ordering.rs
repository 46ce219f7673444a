//! Classpath Ordering & Masking: computes the total scan order by a
//! depth-first walk over manifest-declared children, optionally seats the
//! runtime standard library at position 0, detects nested classpath roots,
//! and then enforces first-occurrence-wins masking across the ordered
//! elements.

use std::collections::{HashMap, HashSet};

use crate::classpath_element::ClasspathElement;
use crate::path_resolver::ClasspathIdentity;

/// Depth-first preorder over `roots`, recursing into each element's
/// manifest-declared children first-encountered; a visited-set breaks
/// cycles. This is the authoritative scan order.
pub fn depth_first_order(
    roots: &[ClasspathIdentity],
    elements: &HashMap<ClasspathIdentity, ClasspathElement>,
) -> Vec<ClasspathIdentity> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for root in roots {
        visit(root, elements, &mut visited, &mut order);
    }
    order
}

fn visit(
    identity: &ClasspathIdentity,
    elements: &HashMap<ClasspathIdentity, ClasspathElement>,
    visited: &mut HashSet<ClasspathIdentity>,
    order: &mut Vec<ClasspathIdentity>,
) {
    if !visited.insert(identity.clone()) {
        return;
    }
    order.push(identity.clone());
    if let Some(element) = elements.get(identity) {
        for child in &element.manifest_children {
            visit(child, elements, visited, order);
        }
    }
}

/// Inserts the runtime standard library archive at position 0, if present
/// and not already in `order`.
pub fn seat_runtime_stdlib(order: &mut Vec<ClasspathIdentity>, stdlib: Option<ClasspathIdentity>) {
    if let Some(stdlib) = stdlib {
        if !order.contains(&stdlib) {
            order.insert(0, stdlib);
        }
    }
}

/// Sorts a copy of `order` lexicographically by display path and records,
/// for each directory element that is a strict path-separator-bounded
/// prefix of another, the relative suffix to treat as a nested root to
/// skip during that outer element's (already-completed) traversal. Only
/// directory nesting matters; archives are never treated as
/// an outer element's nested root.
pub fn detect_nested_roots(
    order: &[ClasspathIdentity],
    elements: &mut HashMap<ClasspathIdentity, ClasspathElement>,
) {
    let mut sorted: Vec<&ClasspathIdentity> = order.iter().collect();
    sorted.sort_by_key(|id| id.canonical_path.display().to_string());

    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let Some(a_elem) = elements.get(a) else { continue };
        if !a_elem.is_directory() {
            continue;
        }
        let Some(b_elem) = elements.get(b) else { continue };
        if !b_elem.is_directory() {
            continue;
        }
        if let Some(suffix) = strict_prefix_suffix(&a.canonical_path, &b.canonical_path) {
            if let Some(a_elem) = elements.get_mut(a) {
                a_elem.nested_root_prefixes.push(suffix.clone());
                drop_entries_under_prefix(a_elem, &suffix);
            }
        }
    }
}

fn strict_prefix_suffix(a: &std::path::Path, b: &std::path::Path) -> Option<String> {
    let b_str = b.to_string_lossy();
    let a_str = a.to_string_lossy();
    if a_str.as_ref() == b_str.as_ref() {
        return None;
    }
    let suffix = b.strip_prefix(a).ok()?;
    if suffix.as_os_str().is_empty() {
        return None;
    }
    Some(suffix.to_string_lossy().replace('\\', "/"))
}

/// Traversal runs before nested roots are known, so rather than re-walking
/// the filesystem this drops the outer element's already-collected matches
/// that fall under `prefix` (now known to belong to a nested root instead).
fn drop_entries_under_prefix(element: &mut ClasspathElement, prefix: &str) {
    let under = |path: &str| path == prefix || path.starts_with(&format!("{prefix}/"));
    element.classfile_matches.retain(|r| !under(&r.relative_to_root));
    for matches in element.file_matches.values_mut() {
        matches.retain(|r| !under(&r.relative_to_root));
    }
}

/// First-occurrence-wins masking: iterates `order`, keeping a
/// running claimed-path set. `module-info.class` is exempt. Masked entries
/// are logged (by [`ClasspathElement::retain_unmasked`]) and dropped.
pub fn mask(order: &[ClasspathIdentity], elements: &mut HashMap<ClasspathIdentity, ClasspathElement>) {
    let mut claimed = HashSet::new();
    for identity in order {
        if let Some(element) = elements.get_mut(identity) {
            element.retain_unmasked(&mut claimed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath_element::{ClasspathResource, ElementKind};
    use std::path::PathBuf;

    fn identity(path: &str) -> ClasspathIdentity {
        ClasspathIdentity::new(PathBuf::from(path), "")
    }

    #[test]
    fn depth_first_order_visits_manifest_children_before_siblings() {
        let root_a = identity("/cp/a.jar");
        let child = identity("/cp/lib/b.jar");
        let root_c = identity("/cp/c.jar");

        let mut elements = HashMap::new();
        let mut a_elem = ClasspathElement::new(root_a.clone(), ElementKind::Archive);
        a_elem.manifest_children.push(child.clone());
        elements.insert(root_a.clone(), a_elem);
        elements.insert(child.clone(), ClasspathElement::new(child.clone(), ElementKind::Archive));
        elements.insert(root_c.clone(), ClasspathElement::new(root_c.clone(), ElementKind::Archive));

        let order = depth_first_order(&[root_a.clone(), root_c.clone()], &elements);
        assert_eq!(order, vec![root_a, child, root_c]);
    }

    #[test]
    fn masking_keeps_first_occurrence_and_exempts_module_info() {
        let e1 = identity("/cp/one");
        let e2 = identity("/cp/two");
        let mut elements = HashMap::new();

        let mut first = ClasspathElement::new(e1.clone(), ElementKind::Directory);
        first.classfile_matches.push(ClasspathResource {
            path_within_element: "a/Foo.class".into(),
            relative_to_root: "a/Foo.class".into(),
        });
        first.classfile_matches.push(ClasspathResource {
            path_within_element: "module-info.class".into(),
            relative_to_root: "module-info.class".into(),
        });
        elements.insert(e1.clone(), first);

        let mut second = ClasspathElement::new(e2.clone(), ElementKind::Directory);
        second.classfile_matches.push(ClasspathResource {
            path_within_element: "a/Foo.class".into(),
            relative_to_root: "a/Foo.class".into(),
        });
        second.classfile_matches.push(ClasspathResource {
            path_within_element: "module-info.class".into(),
            relative_to_root: "module-info.class".into(),
        });
        elements.insert(e2.clone(), second);

        let order = vec![e1.clone(), e2.clone()];
        mask(&order, &mut elements);

        assert_eq!(elements[&e1].classfile_matches.len(), 2);
        // a/Foo.class masked out of the second element; module-info survives in both.
        assert_eq!(elements[&e2].classfile_matches.len(), 1);
        assert_eq!(elements[&e2].classfile_matches[0].relative_to_root, "module-info.class");
    }
}
