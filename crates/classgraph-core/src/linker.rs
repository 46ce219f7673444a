//! Merges Unlinked Class Records into the canonical [`ClassGraph`].
//! Runs single-threaded after every parser worker has drained its output.

use std::collections::HashMap;

use classgraph_classfile::annotation::AnnotationValue;
use classgraph_classfile::fully_qualified_name::{FQName, FQNameBuf};
use classgraph_classfile::record::UnlinkedClassRecord;

use crate::error::Error;
use crate::graph::{AuxKind, ClassGraph, RelType};
use crate::path_resolver::ClasspathIdentity;

/// One parsed classfile plus the provenance the linker needs to populate
/// `ClassInfo::origins`/`class_loaders`, since the parser itself is
/// provenance-agnostic: that provenance lives here, not on the record.
pub struct LinkInput {
    pub record: UnlinkedClassRecord,
    pub origin: ClasspathIdentity,
    pub class_loaders: Vec<String>,
}

/// Strips a Scala auxiliary-class suffix, returning the base node identity
/// and which aux form it was.
fn aux_base_name(name: &FQName) -> (FQNameBuf, AuxKind) {
    let s = name.as_str();
    if let Some(base) = s.strip_suffix("$class") {
        (FQNameBuf::from(base.to_string()), AuxKind::DollarClass)
    } else if let Some(base) = s.strip_suffix('$') {
        (FQNameBuf::from(base.to_string()), AuxKind::Dollar)
    } else {
        (name.to_owned_buf(), AuxKind::Base)
    }
}

/// Links every record into one [`ClassGraph`]. The two-pass order (defaults
/// first) guarantees that by the time any class/method/field annotation use
/// is linked, the annotation class's default parameter values are already
/// known, so defaults can be merged into the reference even when the
/// defaults-bearing record is linked later in file order.
pub fn link(inputs: Vec<LinkInput>) -> Result<ClassGraph, Error> {
    let mut graph = ClassGraph::new();

    // Pass 1: harvest annotation-default parameter maps, keyed by the
    // (aux-stripped) class name that declares them.
    let mut defaults_by_class: HashMap<FQNameBuf, HashMap<String, AnnotationValue>> = HashMap::new();
    for input in &inputs {
        if input.record.carries_annotation_defaults() {
            let (base_name, _) = aux_base_name(&input.record.class_name);
            let info = graph.get_or_create(&base_name);
            info.is_annotation = true;
            if let Some(defaults) = &input.record.annotation_default {
                info.annotation_default_params
                    .get_or_insert_with(HashMap::new)
                    .extend(defaults.clone());
                defaults_by_class
                    .entry(base_name)
                    .or_default()
                    .extend(defaults.clone());
            }
        }
    }

    // Pass 2: full linking for every record, annotation-bearing ones
    // included (get_or_create is idempotent, per the design notes).
    for input in inputs {
        link_one(&mut graph, &defaults_by_class, input);
    }

    Ok(graph)
}

fn link_one(
    graph: &mut ClassGraph,
    defaults_by_class: &HashMap<FQNameBuf, HashMap<String, AnnotationValue>>,
    input: LinkInput,
) {
    let LinkInput { record, origin, class_loaders } = input;
    let (base_name, aux_kind) = aux_base_name(&record.class_name);

    graph.mark_scanned(&base_name, aux_kind);
    let info = graph.get_or_create(&base_name);
    info.modifier_flags |= record.access_flags;
    info.is_interface |= record.is_interface;
    info.is_annotation |= record.is_annotation;
    if info.containing_method.is_none() {
        info.containing_method = record.containing_method.clone();
    }
    if !info.origins.contains(&origin) {
        info.origins.push(origin);
    }
    for loader in class_loaders {
        if !info.class_loaders.contains(&loader) {
            info.class_loaders.push(loader);
        }
    }
    info.fields.extend(record.fields.clone());
    info.methods.extend(record.methods.clone());
    for (field_name, value) in &record.static_final_values {
        info.static_final_values.insert(field_name.clone(), value.clone());
    }

    let class_annotations = merge_defaults_into_annotations(&record.class_annotations, defaults_by_class);
    for annotation in &class_annotations {
        let annotation_name = FQNameBuf::from(annotation.type_name.clone());
        graph.add_bidirectional_edge(&base_name, RelType::ClassAnnotation, &annotation_name);
    }
    graph.get_or_create(&base_name).class_annotations = class_annotations;

    if let Some(superclass) = &record.superclass_name {
        graph.add_bidirectional_edge(&base_name, RelType::Superclass, superclass);
    }
    for interface in &record.interface_names {
        graph.add_bidirectional_edge(&base_name, RelType::Interface, interface);
    }
    for field_type in &record.field_type_references {
        graph.add_bidirectional_edge(&base_name, RelType::FieldTypeReference, field_type);
    }
    for field in &record.fields {
        for annotation in &field.annotations {
            let annotation_name = FQNameBuf::from(annotation.type_name.clone());
            graph.add_bidirectional_edge(&base_name, RelType::FieldAnnotation, &annotation_name);
        }
    }
    for method in &record.methods {
        for annotation in &method.annotations {
            let annotation_name = FQNameBuf::from(annotation.type_name.clone());
            graph.add_bidirectional_edge(&base_name, RelType::MethodAnnotation, &annotation_name);
        }
    }
    for pair in &record.inner_outer_pairs {
        let inner = FQNameBuf::from(pair.inner_name.clone());
        if let Some(outer_name) = &pair.outer_name {
            let outer = FQNameBuf::from(outer_name.clone());
            graph.add_bidirectional_edge(&inner, RelType::InnerClassOf, &outer);
        }
    }
}

/// Fills in any annotation-parameter key missing an explicit value with the
/// annotation class's recorded default, if one was harvested in pass 1.
fn merge_defaults_into_annotations(
    annotations: &[classgraph_classfile::annotation::Annotation],
    defaults_by_class: &HashMap<FQNameBuf, HashMap<String, AnnotationValue>>,
) -> Vec<classgraph_classfile::annotation::Annotation> {
    annotations
        .iter()
        .cloned()
        .map(|mut annotation| {
            let annotation_class = FQNameBuf::from(annotation.type_name.clone());
            if let Some(defaults) = defaults_by_class.get(&annotation_class) {
                for (param_name, default_value) in defaults {
                    if !annotation.elements.iter().any(|(name, _)| name == param_name) {
                        annotation.elements.push((param_name.clone(), default_value.clone()));
                    }
                }
            }
            annotation
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use classgraph_classfile::record::UnlinkedClassRecord;
    use std::collections::HashMap as Map;

    fn bare_record(name: &str) -> UnlinkedClassRecord {
        UnlinkedClassRecord {
            class_name: FQNameBuf::from(name.to_string()),
            access_flags: 0,
            is_interface: false,
            is_annotation: false,
            containing_method: None,
            class_annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotation_default: None,
            field_type_references: Vec::new(),
            static_final_values: Map::new(),
            superclass_name: None,
            interface_names: Vec::new(),
            inner_outer_pairs: Vec::new(),
        }
    }

    fn origin() -> ClasspathIdentity {
        ClasspathIdentity::new(std::path::PathBuf::from("/tmp/classes"), "")
    }

    #[test]
    fn superclass_edge_is_bidirectional_after_linking() {
        let mut child = bare_record("a/Child");
        child.superclass_name = Some(FQNameBuf::from("a/Base".to_string()));
        let inputs = vec![LinkInput { record: child, origin: origin(), class_loaders: Vec::new() }];

        let graph = link(inputs).unwrap();
        let child_info = graph.get(FQName::new("a/Child")).unwrap();
        assert!(child_info
            .related_names(RelType::Superclass)
            .iter()
            .any(|n| n.as_str() == "a/Base"));
        let base_info = graph.get(FQName::new("a/Base")).unwrap();
        assert!(base_info.is_external());
    }

    #[test]
    fn scala_aux_classes_merge_into_base_with_or_combined_flags() {
        let mut base = bare_record("a/Trait");
        base.access_flags = 0x0001; // public
        let mut aux = bare_record("a/Trait$class");
        aux.access_flags = 0x0400; // abstract
        aux.is_interface = true;

        let inputs = vec![
            LinkInput { record: base, origin: origin(), class_loaders: Vec::new() },
            LinkInput { record: aux, origin: origin(), class_loaders: Vec::new() },
        ];
        let graph = link(inputs).unwrap();
        let info = graph.get(FQName::new("a/Trait")).unwrap();
        assert_eq!(info.modifier_flags, 0x0001 | 0x0400);
        assert!(info.is_interface);
    }

    #[test]
    fn annotation_default_fills_in_missing_parameter() {
        let mut defaults = Map::new();
        defaults.insert("value".to_string(), AnnotationValue::Int(7));
        let mut annotation_class = bare_record("a/MyAnnotation");
        annotation_class.is_annotation = true;
        annotation_class.annotation_default = Some(defaults);

        let mut user = bare_record("a/User");
        user.class_annotations.push(classgraph_classfile::annotation::Annotation {
            type_name: "a/MyAnnotation".to_string(),
            elements: Vec::new(),
        });

        let inputs = vec![
            LinkInput { record: user, origin: origin(), class_loaders: Vec::new() },
            LinkInput { record: annotation_class, origin: origin(), class_loaders: Vec::new() },
        ];
        let graph = link(inputs).unwrap();
        let user_info = graph.get(FQName::new("a/User")).unwrap();
        let annotation = &user_info.class_annotations[0];
        assert_eq!(annotation.elements, vec![("value".to_string(), AnnotationValue::Int(7))]);
    }
}
