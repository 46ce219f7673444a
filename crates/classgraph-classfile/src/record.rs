//! The Unlinked Class Record: the parser's output for one classfile, before
//! linking merges it into the class-relationship graph.

use std::collections::HashMap;

use classgraph_spec::ScanSpec;

use crate::annotation::{Annotation, AnnotationValue};
use crate::attributes::{self, Attribute, ConstantValue, InnerClassEntry};
use crate::constant_pool::ConstantPool;
use crate::fully_qualified_name::FQNameBuf;
use crate::raw_java_class::{RawFieldInfo, RawJavaClass, RawMethodInfo};
use crate::signature::Descriptor;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ANNOTATION: u16 = 0x2000;

/// One field, filtered and annotated per the scan spec.
#[derive(Debug, Clone)]
pub struct FieldRecord {
    pub name: String,
    pub descriptor: Descriptor,
    pub access_flags: u16,
    pub annotations: Vec<Annotation>,
}

/// One method, filtered and annotated per the scan spec.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    pub name: String,
    pub descriptor: Descriptor,
    pub access_flags: u16,
    pub annotations: Vec<Annotation>,
}

/// The parser's output for one classfile: unlinked, name-keyed references
/// to everything it depends on, ready for the graph linker to resolve.
#[derive(Debug, Clone)]
pub struct UnlinkedClassRecord {
    pub class_name: FQNameBuf,
    pub access_flags: u16,
    pub is_interface: bool,
    pub is_annotation: bool,
    pub containing_method: Option<String>,
    pub class_annotations: Vec<Annotation>,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
    pub annotation_default: Option<HashMap<String, AnnotationValue>>,
    pub field_type_references: Vec<FQNameBuf>,
    pub static_final_values: HashMap<String, ConstantValue>,
    pub superclass_name: Option<FQNameBuf>,
    pub interface_names: Vec<FQNameBuf>,
    pub inner_outer_pairs: Vec<InnerClassEntry>,
}

impl UnlinkedClassRecord {
    /// Whether this record itself came from an annotation-type classfile
    /// carrying at least one `AnnotationDefault` value, i.e. pass-1 material
    /// for the linker's two-pass ordering.
    pub fn carries_annotation_defaults(&self) -> bool {
        self.annotation_default
            .as_ref()
            .map(|m| !m.is_empty())
            .unwrap_or(false)
    }
}

/// Parses a raw classfile into an [`UnlinkedClassRecord`], applying every
/// spec-driven filter along the way. Returns `None` if the class is denied,
/// not allowed, or otherwise filtered out entirely.
pub fn build_record(raw: &RawJavaClass, spec: &ScanSpec) -> Option<UnlinkedClassRecord> {
    let pool = &raw.constant_pool;
    let class_name_str = pool.resolve_class_name(raw.this_class)?;
    let class_name = FQNameBuf::from(class_name_str.to_string());

    if !class_passes_filter(spec, &class_name) {
        return None;
    }

    let is_interface = raw.access_flags & ACC_INTERFACE != 0;
    let is_annotation = raw.access_flags & ACC_ANNOTATION != 0;

    let superclass_name = pool
        .resolve_class_name(raw.super_class)
        .map(|s| FQNameBuf::from(s.to_string()));

    let interface_names = raw
        .interfaces
        .iter()
        .filter_map(|&idx| pool.resolve_class_name(idx))
        .map(|s| FQNameBuf::from(s.to_string()))
        .collect();

    let mut class_annotations = Vec::new();
    let mut annotation_default: HashMap<String, AnnotationValue> = HashMap::new();
    let mut field_type_references = Vec::new();
    let mut inner_outer_pairs = Vec::new();
    let mut containing_method = None;

    for raw_attr in raw.attributes.iter() {
        match attributes::interpret(pool, raw_attr, None) {
            Attribute::RuntimeVisibleAnnotations(anns) => class_annotations.extend(anns),
            Attribute::RuntimeInvisibleAnnotations(anns)
                if spec.annotation_retention_includes_class() =>
            {
                class_annotations.extend(anns)
            }
            Attribute::Signature(descriptor) if spec.index_field_types() => {
                let mut names = Vec::new();
                descriptor.referenced_class_names(&mut names);
                field_type_references.extend(names.into_iter().map(FQNameBuf::from));
            }
            Attribute::InnerClasses(entries) => {
                inner_outer_pairs.extend(entries.into_iter().filter(|e| {
                    e.inner_name == class_name.as_str()
                        || e.outer_name.as_deref() == Some(class_name.as_str())
                }))
            }
            Attribute::EnclosingMethod { method_name, .. } => {
                containing_method = method_name;
            }
            _ => {}
        }
    }

    let fields = build_fields(pool, &raw.fields, spec, &mut field_type_references);
    let mut static_final_values = HashMap::new();
    collect_static_final_values(pool, &raw.fields, spec, &mut static_final_values);

    let methods = build_methods(pool, &raw.methods, spec);

    if is_annotation {
        for method in raw.methods.iter() {
            for raw_attr in method.attributes.iter() {
                if let Attribute::AnnotationDefault(value) = attributes::interpret(pool, raw_attr, None) {
                    if let Some(name) = pool.resolve_string(method.name_index) {
                        annotation_default.insert(name.to_string(), value);
                    }
                }
            }
        }
    }

    Some(UnlinkedClassRecord {
        class_name,
        access_flags: raw.access_flags,
        is_interface,
        is_annotation,
        containing_method,
        class_annotations,
        fields,
        methods,
        annotation_default: if annotation_default.is_empty() {
            None
        } else {
            Some(annotation_default)
        },
        field_type_references,
        static_final_values,
        superclass_name,
        interface_names,
        inner_outer_pairs,
    })
}

fn class_passes_filter(spec: &ScanSpec, class_name: &FQNameBuf) -> bool {
    if spec.class_is_denied(class_name.as_str()) {
        return false;
    }
    if spec.is_specifically_allowed_class(class_name.as_str()) {
        return true;
    }
    matches!(
        spec.path_match_status(class_name.package()),
        classgraph_spec::PathMatchStatus::WithinAllowed
            | classgraph_spec::PathMatchStatus::AtAllowedClassPackage
    )
}

fn build_fields(
    pool: &ConstantPool,
    raw_fields: &[RawFieldInfo],
    spec: &ScanSpec,
    field_type_references: &mut Vec<FQNameBuf>,
) -> Vec<FieldRecord> {
    if !spec.capture_field_info() {
        return Vec::new();
    }
    raw_fields
        .iter()
        .filter(|f| spec.ignore_visibility() || f.access_flags & ACC_PUBLIC != 0)
        .filter_map(|f| {
            let name = pool.resolve_string(f.name_index)?.to_string();
            let descriptor_str = pool.resolve_string(f.descriptor_index)?;
            let descriptor = Descriptor::parse(descriptor_str).ok()?;

            if spec.index_field_types() {
                let mut names = Vec::new();
                descriptor.referenced_class_names(&mut names);
                field_type_references.extend(names.into_iter().map(FQNameBuf::from));
            }

            let mut annotations = Vec::new();
            if spec.index_field_annotations() {
                for raw_attr in f.attributes.iter() {
                    match attributes::interpret(pool, raw_attr, Some(&descriptor)) {
                        Attribute::RuntimeVisibleAnnotations(anns) => annotations.extend(anns),
                        Attribute::RuntimeInvisibleAnnotations(anns)
                            if spec.annotation_retention_includes_class() =>
                        {
                            annotations.extend(anns)
                        }
                        Attribute::Signature(d) if spec.index_field_types() => {
                            let mut names = Vec::new();
                            d.referenced_class_names(&mut names);
                            field_type_references.extend(names.into_iter().map(FQNameBuf::from));
                        }
                        _ => {}
                    }
                }
            }

            Some(FieldRecord {
                name,
                descriptor,
                access_flags: f.access_flags,
                annotations,
            })
        })
        .collect()
}

fn collect_static_final_values(
    pool: &ConstantPool,
    raw_fields: &[RawFieldInfo],
    spec: &ScanSpec,
    out: &mut HashMap<String, ConstantValue>,
) {
    const ACC_STATIC: u16 = 0x0008;
    const ACC_FINAL: u16 = 0x0010;

    for f in raw_fields.iter() {
        if f.access_flags & (ACC_STATIC | ACC_FINAL) != (ACC_STATIC | ACC_FINAL) {
            continue;
        }
        if !(spec.ignore_visibility() || f.access_flags & ACC_PUBLIC != 0) {
            continue;
        }
        let Some(name) = pool.resolve_string(f.name_index) else { continue };
        let Some(descriptor_str) = pool.resolve_string(f.descriptor_index) else { continue };
        let Ok(descriptor) = Descriptor::parse(descriptor_str) else { continue };

        for raw_attr in f.attributes.iter() {
            if let Attribute::ConstantValue(value) =
                attributes::interpret(pool, raw_attr, Some(&descriptor))
            {
                out.insert(name.to_string(), value);
            }
        }
    }
}

fn build_methods(pool: &ConstantPool, raw_methods: &[RawMethodInfo], spec: &ScanSpec) -> Vec<MethodRecord> {
    if !spec.capture_method_info() {
        return Vec::new();
    }
    raw_methods
        .iter()
        .filter(|m| spec.ignore_visibility() || m.access_flags & ACC_PUBLIC != 0)
        .filter_map(|m| {
            let name = pool.resolve_string(m.name_index)?.to_string();
            let descriptor_str = pool.resolve_string(m.descriptor_index)?;
            let descriptor = Descriptor::parse(descriptor_str).ok()?;

            let mut annotations = Vec::new();
            if spec.index_method_annotations() {
                for raw_attr in m.attributes.iter() {
                    match attributes::interpret(pool, raw_attr, None) {
                        Attribute::RuntimeVisibleAnnotations(anns) => annotations.extend(anns),
                        Attribute::RuntimeInvisibleAnnotations(anns)
                            if spec.annotation_retention_includes_class() =>
                        {
                            annotations.extend(anns)
                        }
                        _ => {}
                    }
                }
            }

            Some(MethodRecord {
                name,
                descriptor,
                access_flags: m.access_flags,
                annotations,
            })
        })
        .collect()
}
