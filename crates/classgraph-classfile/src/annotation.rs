//! Decoding of `RuntimeVisibleAnnotations`/`RuntimeInvisibleAnnotations`/
//! `AnnotationDefault` attribute bodies (JVM spec §4.7.16-4.7.20).

use nom::multi::count;
use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u8};
use nom::IResult;

use crate::constant_pool::ConstantPool;

/// One decoded annotation: its type and its `(name, value)` parameter pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_name: String,
    pub elements: Vec<(String, AnnotationValue)>,
}

/// One element value from the JVM annotation-element grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Byte(i32),
    Char(i32),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i32),
    Boolean(bool),
    String(String),
    Enum { type_name: String, const_name: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

struct Cursor<'a> {
    pool: &'a ConstantPool,
}

impl<'a> Cursor<'a> {
    fn utf8(&self, index: u16) -> String {
        self.pool.resolve_string(index).unwrap_or_default().to_string()
    }

    fn parse_annotation<'b>(&self, bytes: &'b [u8]) -> IResult<&'b [u8], Annotation> {
        let (bytes, type_index) = be_u16(bytes)?;
        let (bytes, num_pairs) = be_u16(bytes)?;
        let (bytes, elements) =
            count(|b| self.parse_element_pair(b), num_pairs as usize)(bytes)?;
        Ok((
            bytes,
            Annotation {
                type_name: crate::signature::Descriptor::parse(&self.utf8(type_index))
                    .ok()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| self.utf8(type_index)),
                elements,
            },
        ))
    }

    fn parse_element_pair<'b>(&self, bytes: &'b [u8]) -> IResult<&'b [u8], (String, AnnotationValue)> {
        let (bytes, name_index) = be_u16(bytes)?;
        let (bytes, value) = self.parse_element_value(bytes)?;
        Ok((bytes, (self.utf8(name_index), value)))
    }

    fn parse_element_value<'b>(&self, bytes: &'b [u8]) -> IResult<&'b [u8], AnnotationValue> {
        let (bytes, tag) = be_u8(bytes)?;
        match tag {
            b'B' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Byte(self.resolve_int(idx))))
            }
            b'C' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Char(self.resolve_int(idx))))
            }
            b'D' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Double(self.resolve_double(idx))))
            }
            b'F' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Float(self.resolve_float(idx))))
            }
            b'I' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Int(self.resolve_int(idx))))
            }
            b'J' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Long(self.resolve_long(idx))))
            }
            b'S' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Short(self.resolve_int(idx))))
            }
            b'Z' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Boolean(self.resolve_int(idx) != 0)))
            }
            b's' => {
                let (bytes, idx) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::String(self.utf8(idx))))
            }
            b'e' => {
                let (bytes, (type_index, const_index)) =
                    nom::sequence::tuple((be_u16, be_u16))(bytes)?;
                Ok((
                    bytes,
                    AnnotationValue::Enum {
                        type_name: self.utf8(type_index),
                        const_name: self.utf8(const_index),
                    },
                ))
            }
            b'c' => {
                let (bytes, class_info_index) = be_u16(bytes)?;
                Ok((bytes, AnnotationValue::Class(self.utf8(class_info_index))))
            }
            b'@' => {
                let (bytes, nested) = self.parse_annotation(bytes)?;
                Ok((bytes, AnnotationValue::Annotation(nested)))
            }
            b'[' => {
                let (bytes, num_values) = be_u16(bytes)?;
                let (bytes, values) =
                    count(|b| self.parse_element_value(b), num_values as usize)(bytes)?;
                Ok((bytes, AnnotationValue::Array(values)))
            }
            _unknown_tag => Err(nom::Err::Failure(nom::error::Error::new(
                bytes,
                nom::error::ErrorKind::Tag,
            ))),
        }
    }

    fn resolve_int(&self, index: u16) -> i32 {
        match self.pool.get(index) {
            Some(crate::constant_pool::ConstantPoolInfo::Integer(v)) => v.bytes as i32,
            _ => 0,
        }
    }

    fn resolve_long(&self, index: u16) -> i64 {
        match self.pool.get(index) {
            Some(crate::constant_pool::ConstantPoolInfo::Long(v)) => v.value as i64,
            _ => 0,
        }
    }

    fn resolve_float(&self, index: u16) -> f32 {
        match self.pool.get(index) {
            Some(crate::constant_pool::ConstantPoolInfo::Float(v)) => v.value,
            _ => 0.0,
        }
    }

    fn resolve_double(&self, index: u16) -> f64 {
        match self.pool.get(index) {
            Some(crate::constant_pool::ConstantPoolInfo::Double(v)) => v.value,
            _ => 0.0,
        }
    }
}

/// Parses a `RuntimeVisibleAnnotations`/`RuntimeInvisibleAnnotations` body:
/// `u2 num_annotations` followed by that many annotation structures.
pub fn parse_annotations(pool: &ConstantPool, info: &[u8]) -> Vec<Annotation> {
    let cursor = Cursor { pool };
    let result: IResult<&[u8], Vec<Annotation>> = (|bytes: &[u8]| {
        let (bytes, num) = be_u16(bytes)?;
        count(|b| cursor.parse_annotation(b), num as usize)(bytes)
    })(info);
    result.map(|(_, v)| v).unwrap_or_default()
}

/// Parses an `AnnotationDefault` body: a single element value.
pub fn parse_annotation_default(pool: &ConstantPool, info: &[u8]) -> Option<AnnotationValue> {
    let cursor = Cursor { pool };
    cursor.parse_element_value(info).ok().map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::values::{Integer, Utf8};
    use crate::constant_pool::ConstantPoolInfo;

    fn pool_with(entries: Vec<ConstantPoolInfo>) -> ConstantPool {
        ConstantPool::new(entries)
    }

    fn utf8(s: &str) -> ConstantPoolInfo {
        ConstantPoolInfo::Utf8(Utf8 {
            bytes: s.as_bytes().to_vec().into_boxed_slice(),
        })
    }

    #[test]
    fn decodes_simple_annotation_with_int_param() {
        // cp[1] = Utf8 "Lp/Marker;" (annotation type descriptor)
        // cp[2] = Utf8 "value"
        // cp[3] = Integer 42
        let pool = pool_with(vec![
            utf8("Lp/Marker;"),
            utf8("value"),
            ConstantPoolInfo::Integer(Integer { bytes: 42 }),
        ]);

        // num_annotations=1, type_index=1, num_pairs=1, name_index=2, tag='I', idx=3
        let mut body = vec![0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x02, b'I', 0x00, 0x03];
        let annotations = parse_annotations(&pool, &mut body);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].type_name, "p.Marker");
        assert_eq!(
            annotations[0].elements,
            vec![("value".to_string(), AnnotationValue::Int(42))]
        );
    }

    #[test]
    fn decodes_nested_annotation_array() {
        // value is an array of one nested annotation with no params
        let pool = pool_with(vec![utf8("Lp/Outer;"), utf8("nested"), utf8("Lp/Inner;")]);
        let body: Vec<u8> = vec![
            0x00, 0x01, // num_annotations
            0x00, 0x01, // type_index -> "Lp/Outer;"
            0x00, 0x01, // num_pairs
            0x00, 0x02, // name_index -> "nested"
            b'[', 0x00, 0x01, // array of 1
            b'@', 0x00, 0x03, 0x00, 0x00, // nested annotation, type=3, 0 pairs
        ];
        let annotations = parse_annotations(&pool, &body);
        assert_eq!(annotations.len(), 1);
        match &annotations[0].elements[0].1 {
            AnnotationValue::Array(values) => {
                assert_eq!(values.len(), 1);
                assert!(matches!(values[0], AnnotationValue::Annotation(_)));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn annotation_default_decodes_single_value() {
        let pool = pool_with(vec![ConstantPoolInfo::Integer(Integer { bytes: 7 })]);
        let body = vec![b'I', 0x00, 0x01];
        let value = parse_annotation_default(&pool, &body);
        assert_eq!(value, Some(AnnotationValue::Int(7)));
    }
}
