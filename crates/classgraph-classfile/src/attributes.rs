//! Interpretation of the attribute kinds this engine cares about (§4.7):
//! `ConstantValue`, `RuntimeVisibleAnnotations`, `RuntimeInvisibleAnnotations`,
//! `AnnotationDefault`, `Signature`, `InnerClasses`, `EnclosingMethod`.
//! Everything else is left as [`Attribute::Unknown`] — no bytecode-level
//! analysis is performed.

use byteorder::{BigEndian, ByteOrder};
use nom::number::complete::be_u16;
use nom::IResult;

use crate::annotation::{parse_annotation_default, parse_annotations, Annotation, AnnotationValue};
use crate::constant_pool::ConstantPool;
use crate::raw_java_class::RawAttributeInfo;
use crate::signature::Descriptor;

/// A literal value recorded from a `ConstantValue` attribute, widened per
/// the field's own descriptor (JVM spec §4.7.2).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

/// One inner/outer containment pair, as recorded by `InnerClasses`.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerClassEntry {
    pub inner_name: String,
    pub outer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    ConstantValue(ConstantValue),
    RuntimeVisibleAnnotations(Vec<Annotation>),
    RuntimeInvisibleAnnotations(Vec<Annotation>),
    AnnotationDefault(AnnotationValue),
    Signature(Descriptor),
    InnerClasses(Vec<InnerClassEntry>),
    EnclosingMethod { class_name: String, method_name: Option<String> },
    Unknown(String),
}

/// Interprets one raw attribute against the constant pool and a field's
/// descriptor (only needed to widen `ConstantValue`; pass `None` for
/// class-level and method-level attributes).
pub fn interpret(
    pool: &ConstantPool,
    raw: &RawAttributeInfo,
    field_descriptor: Option<&Descriptor>,
) -> Attribute {
    let name = pool
        .resolve_string(raw.attribute_name_index)
        .unwrap_or("")
        .to_string();

    match name.as_str() {
        "ConstantValue" => parse_constant_value(pool, &raw.info, field_descriptor)
            .map(Attribute::ConstantValue)
            .unwrap_or(Attribute::Unknown(name)),
        "RuntimeVisibleAnnotations" => {
            Attribute::RuntimeVisibleAnnotations(parse_annotations(pool, &raw.info))
        }
        "RuntimeInvisibleAnnotations" => {
            Attribute::RuntimeInvisibleAnnotations(parse_annotations(pool, &raw.info))
        }
        "AnnotationDefault" => parse_annotation_default(pool, &raw.info)
            .map(Attribute::AnnotationDefault)
            .unwrap_or(Attribute::Unknown(name)),
        "Signature" => parse_signature_attribute(pool, &raw.info)
            .map(Attribute::Signature)
            .unwrap_or(Attribute::Unknown(name)),
        "InnerClasses" => Attribute::InnerClasses(parse_inner_classes(pool, &raw.info)),
        "EnclosingMethod" => parse_enclosing_method(pool, &raw.info)
            .unwrap_or(Attribute::Unknown(name)),
        other => Attribute::Unknown(other.to_string()),
    }
}

fn parse_constant_value(
    pool: &ConstantPool,
    info: &[u8],
    field_descriptor: Option<&Descriptor>,
) -> Option<ConstantValue> {
    if info.len() < 2 {
        return None;
    }
    let index = BigEndian::read_u16(info);
    use crate::constant_pool::ConstantPoolInfo;
    match pool.get(index)? {
        ConstantPoolInfo::Integer(v) => match field_descriptor {
            Some(Descriptor::Boolean) => Some(ConstantValue::Int((v.bytes as i32) & 1)),
            Some(Descriptor::Byte) => Some(ConstantValue::Int((v.bytes as i32) as i8 as i32)),
            Some(Descriptor::Char) => Some(ConstantValue::Int((v.bytes as i32) as u16 as i32)),
            Some(Descriptor::Short) => Some(ConstantValue::Int((v.bytes as i32) as i16 as i32)),
            _ => Some(ConstantValue::Int(v.bytes as i32)),
        },
        ConstantPoolInfo::Long(v) => Some(ConstantValue::Long(v.value as i64)),
        ConstantPoolInfo::Float(v) => Some(ConstantValue::Float(v.value)),
        ConstantPoolInfo::Double(v) => Some(ConstantValue::Double(v.value)),
        ConstantPoolInfo::String(s) => {
            Some(ConstantValue::String(pool.resolve_string(s.string_index)?.to_string()))
        }
        _ => None,
    }
}

fn parse_signature_attribute(pool: &ConstantPool, info: &[u8]) -> Option<Descriptor> {
    if info.len() < 2 {
        return None;
    }
    let index = BigEndian::read_u16(info);
    let raw = pool.resolve_string(index)?;
    // Generic signatures share the field-descriptor grammar for the leading
    // type token closely enough for field-type reference extraction; type
    // parameter bounds beyond the first class reference are not modeled.
    Descriptor::parse(&strip_generic_suffix(raw)).ok()
}

fn strip_generic_suffix(signature: &str) -> String {
    match signature.find('<') {
        Some(idx) => {
            let closing = signature.rfind('>').unwrap_or(signature.len());
            if closing > idx {
                let before = &signature[..idx];
                let after = &signature[closing + 1..];
                format!("{before}{after}")
            } else {
                signature.to_string()
            }
        }
        None => signature.to_string(),
    }
}

fn parse_inner_classes(pool: &ConstantPool, info: &[u8]) -> Vec<InnerClassEntry> {
    fn parse(pool: &ConstantPool, bytes: &[u8]) -> IResult<&[u8], Vec<InnerClassEntry>> {
        use nom::multi::count;
        use nom::sequence::tuple;
        let (bytes, num) = be_u16(bytes)?;
        count(
            |b| {
                let (b, (inner_class_info_index, outer_class_info_index, _name_index, _flags)) =
                    tuple((be_u16, be_u16, be_u16, be_u16))(b)?;
                let inner_name = pool
                    .resolve_class_name(inner_class_info_index)
                    .unwrap_or("")
                    .to_string();
                let outer_name = pool
                    .resolve_class_name(outer_class_info_index)
                    .map(|s| s.to_string());
                Ok((b, InnerClassEntry { inner_name, outer_name }))
            },
            num as usize,
        )(bytes)
    }
    parse(pool, info).map(|(_, v)| v).unwrap_or_default()
}

fn parse_enclosing_method(pool: &ConstantPool, info: &[u8]) -> Option<Attribute> {
    if info.len() < 4 {
        return None;
    }
    let class_index = BigEndian::read_u16(&info[0..2]);
    let method_index = BigEndian::read_u16(&info[2..4]);
    let class_name = pool.resolve_class_name(class_index)?.to_string();
    let method_name = if method_index == 0 {
        None
    } else {
        match pool.get(method_index) {
            Some(crate::constant_pool::ConstantPoolInfo::NameAndType(nt)) => {
                pool.resolve_string(nt.name_index).map(|s| s.to_string())
            }
            _ => None,
        }
    };
    Some(Attribute::EnclosingMethod {
        class_name,
        method_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::values::{Integer, Utf8};
    use crate::constant_pool::ConstantPoolInfo;
    use crate::raw_java_class::RawAttributeInfo;

    fn utf8(s: &str) -> ConstantPoolInfo {
        ConstantPoolInfo::Utf8(Utf8 {
            bytes: s.as_bytes().to_vec().into_boxed_slice(),
        })
    }

    #[test]
    fn constant_value_widens_int_to_boolean() {
        // cp[1] = Utf8 "ConstantValue", cp[2] = Integer 1
        let pool = ConstantPool::new(vec![utf8("ConstantValue"), ConstantPoolInfo::Integer(Integer { bytes: 1 })]);
        let raw = RawAttributeInfo {
            attribute_name_index: 1,
            info: vec![0x00, 0x02].into_boxed_slice(),
        };
        let attr = interpret(&pool, &raw, Some(&Descriptor::Boolean));
        assert_eq!(attr, Attribute::ConstantValue(ConstantValue::Int(1)));
    }

    #[test]
    fn constant_value_resolves_string_constant() {
        let pool = ConstantPool::new(vec![
            utf8("ConstantValue"),
            ConstantPoolInfo::String(crate::constant_pool::values::StringValue { string_index: 4 }),
            utf8("unused"),
            utf8("hi"),
        ]);
        let raw = RawAttributeInfo {
            attribute_name_index: 1,
            info: vec![0x00, 0x02].into_boxed_slice(),
        };
        let attr = interpret(&pool, &raw, Some(&Descriptor::Class("java/lang/String".into())));
        assert_eq!(attr, Attribute::ConstantValue(ConstantValue::String("hi".to_string())));
    }

    #[test]
    fn unknown_attribute_falls_back() {
        let pool = ConstantPool::new(vec![utf8("Code")]);
        let raw = RawAttributeInfo {
            attribute_name_index: 1,
            info: Box::new([]),
        };
        let attr = interpret(&pool, &raw, None);
        assert_eq!(attr, Attribute::Unknown("Code".to_string()));
    }

    #[test]
    fn signature_erases_generic_type_args() {
        let pool = ConstantPool::new(vec![
            utf8("Signature"),
            utf8("Ljava/util/List<Ljava/lang/String;>;"),
        ]);
        let raw = RawAttributeInfo {
            attribute_name_index: 1,
            info: vec![0x00, 0x02].into_boxed_slice(),
        };
        let attr = interpret(&pool, &raw, None);
        assert_eq!(
            attr,
            Attribute::Signature(Descriptor::Class("java/util/List".to_string()))
        );
    }
}
