//! The raw `ClassFile` structure, a direct translation of the JVM classfile
//! format (JVM spec §4.1). All members have public access: higher layers
//! (`crate::record`) interpret them against the constant pool.

use nom::combinator::eof;
use nom::multi::count;
use nom::number::complete::{be_u16, be_u32};
use nom::sequence::tuple;
use nom::IResult;

use crate::constant_pool::{parser, ConstantPool};
use crate::error::Error;

pub const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
pub struct RawJavaClass {
    pub magic: u32,
    pub major: u16,
    pub minor: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Box<[u16]>,
    pub fields: Box<[RawFieldInfo]>,
    pub methods: Box<[RawMethodInfo]>,
    pub attributes: Box<[RawAttributeInfo]>,
}

#[derive(Debug, Default, Clone)]
pub struct RawFieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Box<[RawAttributeInfo]>,
}

#[derive(Debug, Default, Clone)]
pub struct RawMethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Box<[RawAttributeInfo]>,
}

#[derive(Debug, Default, Clone)]
pub struct RawAttributeInfo {
    pub attribute_name_index: u16,
    pub info: Box<[u8]>,
}

/// Parses the entire byte array into a [`RawJavaClass`].
pub fn parse_class_file_bytes(bytes: &[u8]) -> Result<RawJavaClass, Error> {
    fn inner(bytes: &[u8]) -> IResult<&[u8], RawJavaClass> {
        let (bytes, (magic, minor, major, constant_pool_count)) =
            tuple((be_u32, be_u16, be_u16, be_u16))(bytes)?;

        // the constant pool holds `constant_pool_count - 1` entries
        let (bytes, constant_pool) =
            parser::parse_constant_pool(constant_pool_count.saturating_sub(1))(bytes)?;

        let (bytes, (access_flags, this_class, super_class, interfaces_count)) =
            tuple((be_u16, be_u16, be_u16, be_u16))(bytes)?;
        let (bytes, interfaces) = count(be_u16, interfaces_count as usize)(bytes)?;

        let (bytes, fields_count) = be_u16(bytes)?;
        let (bytes, fields) = count(parser::parse_field_info, fields_count as usize)(bytes)?;

        let (bytes, methods_count) = be_u16(bytes)?;
        let (bytes, methods) = count(parser::parse_method_info, methods_count as usize)(bytes)?;

        let (bytes, attributes_count) = be_u16(bytes)?;
        let (bytes, attributes) =
            count(parser::parse_attribute_info, attributes_count as usize)(bytes)?;

        let (bytes, _) = eof(bytes)?;

        Ok((
            bytes,
            RawJavaClass {
                magic,
                major,
                minor,
                constant_pool,
                access_flags,
                this_class,
                super_class,
                interfaces: interfaces.into_boxed_slice(),
                fields: fields.into_boxed_slice(),
                methods: methods.into_boxed_slice(),
                attributes: attributes.into_boxed_slice(),
            },
        ))
    }

    let (_, raw) = inner(bytes).map_err(|e: nom::Err<nom::error::Error<&[u8]>>| Error::from(e))?;
    if raw.magic != MAGIC {
        return Err(Error::new(crate::error::ErrorKind::BadMagic(raw.magic)));
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_classfile_bytes() -> Vec<u8> {
        // magic, minor, major, constant_pool_count=1 (no entries),
        // access_flags, this_class=0, super_class=0, interfaces_count=0,
        // fields_count=0, methods_count=0, attributes_count=0
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&[0x00, 0x00]); // minor
        bytes.extend_from_slice(&[0x00, 0x34]); // major = 52 (Java 8)
        bytes.extend_from_slice(&[0x00, 0x01]); // constant_pool_count
        bytes.extend_from_slice(&[0x00, 0x21]); // access_flags
        bytes.extend_from_slice(&[0x00, 0x00]); // this_class
        bytes.extend_from_slice(&[0x00, 0x00]); // super_class
        bytes.extend_from_slice(&[0x00, 0x00]); // interfaces_count
        bytes.extend_from_slice(&[0x00, 0x00]); // fields_count
        bytes.extend_from_slice(&[0x00, 0x00]); // methods_count
        bytes.extend_from_slice(&[0x00, 0x00]); // attributes_count
        bytes
    }

    #[test]
    fn parses_empty_classfile_skeleton() {
        let bytes = minimal_classfile_bytes();
        let raw = parse_class_file_bytes(&bytes).expect("should parse");
        assert_eq!(raw.magic, MAGIC);
        assert_eq!(raw.major, 52);
        assert!(raw.fields.is_empty());
        assert!(raw.methods.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_classfile_bytes();
        bytes[0] = 0x00;
        let err = parse_class_file_bytes(&bytes).unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::BadMagic(_)));
    }

    #[test]
    fn rejects_truncated_stream() {
        let bytes = minimal_classfile_bytes();
        let truncated = &bytes[..bytes.len() - 4];
        assert!(parse_class_file_bytes(truncated).is_err());
    }
}
