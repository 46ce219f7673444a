//! The linked Class Graph: one [`ClassInfo`] per class name, connected by
//! bidirectional [`RelType`] edges, plus the closure-query algorithm shared
//! by every relationship kind.

use std::collections::{HashMap, HashSet, VecDeque};

pub use classgraph_classfile::{FQName, FQNameBuf};

use classgraph_classfile::annotation::{Annotation, AnnotationValue};
use classgraph_classfile::attributes::ConstantValue;
use classgraph_classfile::record::{FieldRecord, MethodRecord};

use crate::error::{Error, ErrorKind};
use crate::path_resolver::ClasspathIdentity;

/// Which Scala auxiliary form a record was scanned under, for the
/// "classfile_scanned set exactly once per (class identity, aux-kind)"
/// invariant.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum AuxKind {
    Base,
    /// The `Foo$` companion-object form.
    Dollar,
    /// The `Foo$class` trait-implementation form.
    DollarClass,
}

/// A relationship edge kind. Every variant but the four "unpaired" ones
/// (`FieldTypeReference`'s partner included) has a named inverse; see
/// [`RelType::inverse`].
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum RelType {
    Superclass,
    Subclass,
    Interface,
    InterfaceImplementedBy,
    InnerClassOf,
    OuterClassOf,
    ClassAnnotation,
    AnnotatedClass,
    MethodAnnotation,
    ClassWithMethodAnnotation,
    FieldAnnotation,
    ClassWithFieldAnnotation,
    FieldTypeReference,
    FieldTypeReferencedBy,
}

impl RelType {
    pub fn inverse(self) -> RelType {
        match self {
            RelType::Superclass => RelType::Subclass,
            RelType::Subclass => RelType::Superclass,
            RelType::Interface => RelType::InterfaceImplementedBy,
            RelType::InterfaceImplementedBy => RelType::Interface,
            RelType::InnerClassOf => RelType::OuterClassOf,
            RelType::OuterClassOf => RelType::InnerClassOf,
            RelType::ClassAnnotation => RelType::AnnotatedClass,
            RelType::AnnotatedClass => RelType::ClassAnnotation,
            RelType::MethodAnnotation => RelType::ClassWithMethodAnnotation,
            RelType::ClassWithMethodAnnotation => RelType::MethodAnnotation,
            RelType::FieldAnnotation => RelType::ClassWithFieldAnnotation,
            RelType::ClassWithFieldAnnotation => RelType::FieldAnnotation,
            RelType::FieldTypeReference => RelType::FieldTypeReferencedBy,
            RelType::FieldTypeReferencedBy => RelType::FieldTypeReference,
        }
    }

    /// True for the two "from a class to the annotations it carries"
    /// relations that meta-annotation closure switches away from once it
    /// lands on an annotation node.
    fn is_member_annotation_rel(self) -> bool {
        matches!(
            self,
            RelType::MethodAnnotation
                | RelType::ClassWithMethodAnnotation
                | RelType::FieldAnnotation
                | RelType::ClassWithFieldAnnotation
        )
    }
}

/// Which class "shapes" a closure query should keep.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ClassTypeMask {
    Standard,
    Interface,
    Annotation,
    InterfaceOrAnnotation,
    All,
}

impl ClassTypeMask {
    fn accepts(self, info: &ClassInfo) -> bool {
        match self {
            ClassTypeMask::All => true,
            ClassTypeMask::InterfaceOrAnnotation => {
                matches!(info.class_type(), ClassTypeMask::Interface | ClassTypeMask::Annotation)
            }
            other => info.class_type() == other,
        }
    }
}

/// The canonical linked node: everything known about one class name,
/// merged across however many Unlinked Class Records contributed to it.
#[derive(Clone)]
pub struct ClassInfo {
    pub name: FQNameBuf,
    pub modifier_flags: u16,
    pub is_interface: bool,
    pub is_annotation: bool,
    pub containing_method: Option<String>,
    /// Insertion-ordered, deduplicated: classpath identities this class was
    /// actually read from.
    pub origins: Vec<ClasspathIdentity>,
    /// Insertion-ordered, deduplicated class-loader references.
    pub class_loaders: Vec<String>,
    scanned_aux_kinds: HashSet<AuxKind>,
    pub class_annotations: Vec<Annotation>,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
    pub annotation_default_params: Option<HashMap<String, AnnotationValue>>,
    pub static_final_values: HashMap<String, ConstantValue>,
    relationships: HashMap<RelType, Vec<FQNameBuf>>,
}

impl ClassInfo {
    fn new(name: FQNameBuf) -> Self {
        Self {
            name,
            modifier_flags: 0,
            is_interface: false,
            is_annotation: false,
            containing_method: None,
            origins: Vec::new(),
            class_loaders: Vec::new(),
            scanned_aux_kinds: HashSet::new(),
            class_annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotation_default_params: None,
            static_final_values: HashMap::new(),
            relationships: HashMap::new(),
        }
    }

    /// An "external" class is referenced (as a supertype, field type, ...)
    /// but was never itself read from a classfile.
    pub fn is_external(&self) -> bool {
        self.scanned_aux_kinds.is_empty()
    }

    fn mark_scanned(&mut self, kind: AuxKind) {
        self.scanned_aux_kinds.insert(kind);
    }

    fn class_type(&self) -> ClassTypeMask {
        match (self.is_interface, self.is_annotation) {
            (_, true) => ClassTypeMask::Annotation,
            (true, false) => ClassTypeMask::Interface,
            (false, false) => ClassTypeMask::Standard,
        }
    }

    fn add_edge(&mut self, rel: RelType, target: &FQName) {
        let set = self.relationships.entry(rel).or_default();
        if !set.iter().any(|n| n.as_str() == target.as_str()) {
            set.push(target.to_owned_buf());
        }
    }

    fn related(&self, rel: RelType) -> &[FQNameBuf] {
        self.relationships.get(&rel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct (non-transitive) related names for `rel`, the name-only
    /// convenience next to [`ClassGraph::related`]'s full-object form.
    pub fn related_names(&self, rel: RelType) -> &[FQNameBuf] {
        self.related(rel)
    }

    pub fn get_static_final_field_value(&self, field_name: &str) -> Option<&ConstantValue> {
        self.static_final_values.get(field_name)
    }

    /// Fails with [`ErrorKind::MultipleOrigins`] when a Scala aux-class
    /// merge (or other multi-origin case) means there is no single answer.
    pub fn origin(&self) -> Result<&ClasspathIdentity, Error> {
        match self.origins.as_slice() {
            [single] => Ok(single),
            _ => Err(Error::new(ErrorKind::MultipleOrigins(self.name.clone()))),
        }
    }

    pub fn subclass_names(&self) -> &[FQNameBuf] {
        self.related_names(RelType::Subclass)
    }

    pub fn superclass_name(&self) -> Option<&FQNameBuf> {
        self.related_names(RelType::Superclass).first()
    }

    pub fn interface_names(&self) -> &[FQNameBuf] {
        self.related_names(RelType::Interface)
    }

    pub fn annotated_class_names(&self) -> &[FQNameBuf] {
        self.related_names(RelType::AnnotatedClass)
    }
}

impl std::fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name.source_form())
            .field("is_interface", &self.is_interface)
            .field("is_annotation", &self.is_annotation)
            .field("origins", &self.origins.len())
            .field("external", &self.is_external())
            .finish()
    }
}

impl std::fmt::Display for ClassInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name.source_form())
    }
}

/// The final queryable structure: every linked [`ClassInfo`], keyed by name.
#[derive(Debug, Default)]
pub struct ClassGraph {
    classes: HashMap<FQNameBuf, ClassInfo>,
}

impl ClassGraph {
    pub(crate) fn new() -> Self {
        Self { classes: HashMap::new() }
    }

    pub fn get(&self, name: &FQName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &FQNameBuf> {
        self.classes.keys()
    }

    /// Direct (non-transitive) related Class Infos for `rel`, the
    /// full-object form next to [`ClassInfo::related_names`].
    pub fn related(&self, name: &FQName, rel: RelType) -> Vec<&ClassInfo> {
        let Some(info) = self.classes.get(name) else { return Vec::new() };
        info.related(rel)
            .iter()
            .filter_map(|n| self.classes.get(n))
            .collect()
    }

    pub fn subclasses(&self, name: &FQName) -> Vec<&ClassInfo> {
        self.related(name, RelType::Subclass)
    }

    pub fn superclass(&self, name: &FQName) -> Option<&ClassInfo> {
        self.related(name, RelType::Superclass).into_iter().next()
    }

    pub fn interfaces(&self, name: &FQName) -> Vec<&ClassInfo> {
        self.related(name, RelType::Interface)
    }

    /// Classes carrying `name` directly or transitively through a chain of
    /// meta-annotations (an annotation class itself annotated with `name`,
    /// and so on), extended by the subclasses of each hit when `name` itself
    /// is meta-annotated `java.lang.annotation.Inherited` (§4.8 "Inherited
    /// annotation" semantics).
    pub fn classes_with_annotation(&self, name: &FQName) -> Vec<&ClassInfo> {
        let hits = self
            .reachable(name, RelType::AnnotatedClass, ClassTypeMask::All, false)
            .unwrap_or_default();
        if self.is_inherited_annotation(name) {
            self.with_inherited_annotation_propagation(hits)
        } else {
            hits
        }
    }

    fn is_inherited_annotation(&self, name: &FQName) -> bool {
        self.classes
            .get(name)
            .map(|info| {
                info.class_annotations
                    .iter()
                    .any(|a| FQNameBuf::from(a.type_name.clone()).as_str() == "java/lang/annotation/Inherited")
            })
            .unwrap_or(false)
    }

    pub(crate) fn get_or_create(&mut self, name: &FQName) -> &mut ClassInfo {
        self.classes
            .entry(name.to_owned_buf())
            .or_insert_with(|| ClassInfo::new(name.to_owned_buf()))
    }

    pub(crate) fn mark_scanned(&mut self, name: &FQName, kind: AuxKind) {
        self.get_or_create(name).mark_scanned(kind);
    }

    /// Adds `rel` from `from` to `to`, plus the inverse edge back. Creates
    /// either endpoint's Class Info (as an external node) if absent.
    pub(crate) fn add_bidirectional_edge(&mut self, from: &FQName, rel: RelType, to: &FQName) {
        self.get_or_create(from).add_edge(rel, to);
        self.get_or_create(to).add_edge(rel.inverse(), from);
    }

    /// Closure query: BFS over `rel` edges starting at `from`'s
    /// direct neighbors, switching to `class-annotations`/`annotated-class`
    /// once the frontier lands on an annotation node while following one of
    /// the method/field annotation relations (so meta-annotations on a
    /// method/field annotation are discovered too). Visited-set breaks
    /// cycles; result excludes `from` itself.
    pub fn reachable(
        &self,
        from: &FQName,
        rel: RelType,
        type_mask: ClassTypeMask,
        hide_external: bool,
    ) -> Result<Vec<&ClassInfo>, Error> {
        if !self.classes.contains_key(from) {
            return Ok(Vec::new());
        }

        let mut visited: HashSet<FQNameBuf> = HashSet::new();
        visited.insert(from.to_owned_buf());
        let mut queue: VecDeque<(FQNameBuf, RelType)> = VecDeque::new();
        queue.push_back((from.to_owned_buf(), rel));

        let mut out = Vec::new();
        while let Some((current, current_rel)) = queue.pop_front() {
            let Some(current_info) = self.classes.get(&current) else { continue };

            let effective_rel = if current_rel.is_member_annotation_rel() && current_info.is_annotation {
                RelType::AnnotatedClass
            } else {
                current_rel
            };

            for neighbor_name in current_info.related(effective_rel) {
                if !visited.insert(neighbor_name.clone()) {
                    continue;
                }
                if let Some(neighbor) = self.classes.get(neighbor_name) {
                    if type_mask.accepts(neighbor) && !(hide_external && neighbor.is_external()) {
                        out.push(neighbor);
                    }
                }
                queue.push_back((neighbor_name.clone(), rel));
            }
        }

        Ok(out)
    }

    /// Extends a `classes_with_annotation` hit set with the subclasses of
    /// every direct hit, per "Inherited annotation" semantics.
    pub fn with_inherited_annotation_propagation<'a>(
        &'a self,
        direct_hits: Vec<&'a ClassInfo>,
    ) -> Vec<&'a ClassInfo> {
        let mut seen: HashSet<FQNameBuf> = direct_hits.iter().map(|c| c.name.clone()).collect();
        let mut out = direct_hits;
        let mut frontier: Vec<FQNameBuf> = out.iter().map(|c| c.name.clone()).collect();
        while let Some(name) = frontier.pop() {
            let Some(info) = self.classes.get(&name) else { continue };
            for sub in info.related(RelType::Subclass) {
                if seen.insert(sub.clone()) {
                    if let Some(sub_info) = self.classes.get(sub) {
                        out.push(sub_info);
                        frontier.push(sub.clone());
                    }
                }
            }
        }
        out
    }
}

pub(crate) fn require_indexed(enabled: bool, axis: &'static str) -> Result<(), Error> {
    if enabled {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::IndexingNotEnabled(axis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> FQNameBuf {
        FQNameBuf::from(s.to_string())
    }

    #[test]
    fn bidirectional_edge_adds_both_directions() {
        let mut graph = ClassGraph::new();
        graph.mark_scanned(FQName::new("a/A"), AuxKind::Base);
        graph.mark_scanned(FQName::new("a/B"), AuxKind::Base);
        graph.add_bidirectional_edge(FQName::new("a/A"), RelType::Superclass, FQName::new("a/B"));

        let a = graph.get(FQName::new("a/A")).unwrap();
        let b = graph.get(FQName::new("a/B")).unwrap();
        assert_eq!(a.related(RelType::Superclass), &[name("a/B")]);
        assert_eq!(b.related(RelType::Subclass), &[name("a/A")]);
    }

    #[test]
    fn reachable_excludes_origin_and_breaks_cycles() {
        let mut graph = ClassGraph::new();
        for n in ["a/A", "a/B", "a/C"] {
            graph.mark_scanned(FQName::new(n), AuxKind::Base);
        }
        graph.add_bidirectional_edge(FQName::new("a/A"), RelType::Superclass, FQName::new("a/B"));
        graph.add_bidirectional_edge(FQName::new("a/B"), RelType::Superclass, FQName::new("a/C"));
        // cycle back to A
        graph.add_bidirectional_edge(FQName::new("a/C"), RelType::Superclass, FQName::new("a/A"));

        let result = graph
            .reachable(FQName::new("a/A"), RelType::Superclass, ClassTypeMask::All, false)
            .unwrap();
        let names: HashSet<_> = result.iter().map(|c| c.name.as_str().to_string()).collect();
        assert_eq!(names, HashSet::from(["a/B".to_string(), "a/C".to_string()]));
    }

    #[test]
    fn inherited_annotation_propagates_to_subclasses() {
        let mut graph = ClassGraph::new();
        for n in ["p/Marker", "p/Parent", "p/Child"] {
            graph.mark_scanned(FQName::new(n), AuxKind::Base);
        }
        graph.get_or_create(FQName::new("p/Marker")).class_annotations.push(Annotation {
            type_name: "java.lang.annotation.Inherited".to_string(),
            elements: Vec::new(),
        });
        graph.add_bidirectional_edge(FQName::new("p/Parent"), RelType::ClassAnnotation, FQName::new("p/Marker"));
        graph.add_bidirectional_edge(FQName::new("p/Child"), RelType::Superclass, FQName::new("p/Parent"));

        let hits: HashSet<_> = graph
            .classes_with_annotation(FQName::new("p/Marker"))
            .into_iter()
            .map(|c| c.name.as_str().to_string())
            .collect();
        assert_eq!(hits, HashSet::from(["p/Parent".to_string(), "p/Child".to_string()]));
    }

    #[test]
    fn non_inherited_annotation_does_not_propagate() {
        let mut graph = ClassGraph::new();
        for n in ["p/Marker", "p/Parent", "p/Child"] {
            graph.mark_scanned(FQName::new(n), AuxKind::Base);
        }
        graph.add_bidirectional_edge(FQName::new("p/Parent"), RelType::ClassAnnotation, FQName::new("p/Marker"));
        graph.add_bidirectional_edge(FQName::new("p/Child"), RelType::Superclass, FQName::new("p/Parent"));

        let hits: Vec<_> = graph
            .classes_with_annotation(FQName::new("p/Marker"))
            .into_iter()
            .map(|c| c.name.as_str().to_string())
            .collect();
        assert_eq!(hits, vec!["p/Parent".to_string()]);
    }

    #[test]
    fn classes_with_annotation_follows_meta_annotation_chain() {
        // p/Outer @p/Mid, and p/Mid is itself annotated @p/Inner: querying
        // classes_with_annotation(p/Inner) must reach p/Outer transitively,
        // not just the directly-annotated p/Mid.
        let mut graph = ClassGraph::new();
        for n in ["p/Inner", "p/Mid", "p/Outer"] {
            graph.mark_scanned(FQName::new(n), AuxKind::Base);
        }
        graph.add_bidirectional_edge(FQName::new("p/Mid"), RelType::ClassAnnotation, FQName::new("p/Inner"));
        graph.add_bidirectional_edge(FQName::new("p/Outer"), RelType::ClassAnnotation, FQName::new("p/Mid"));

        let hits: HashSet<_> = graph
            .classes_with_annotation(FQName::new("p/Inner"))
            .into_iter()
            .map(|c| c.name.as_str().to_string())
            .collect();
        assert_eq!(hits, HashSet::from(["p/Mid".to_string(), "p/Outer".to_string()]));
    }

    #[test]
    fn external_nodes_hidden_when_requested() {
        let mut graph = ClassGraph::new();
        graph.mark_scanned(FQName::new("a/A"), AuxKind::Base);
        // a/B is referenced but never scanned: external.
        graph.add_bidirectional_edge(FQName::new("a/A"), RelType::Superclass, FQName::new("a/B"));

        let visible = graph
            .reachable(FQName::new("a/A"), RelType::Superclass, ClassTypeMask::All, true)
            .unwrap();
        assert!(visible.is_empty());

        let all = graph
            .reachable(FQName::new("a/A"), RelType::Superclass, ClassTypeMask::All, false)
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
