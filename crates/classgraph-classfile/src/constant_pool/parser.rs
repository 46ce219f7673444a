//! Byte-level decoding of a single `cp_info` entry and of whole tables of
//! fields/methods/attributes.

use nom::bytes::complete::take;
use nom::combinator::map;
use nom::multi::count;
use nom::number::complete::{be_f32, be_f64, be_u16, be_u32, be_u64, be_u8};
use nom::sequence::tuple;
use nom::IResult;

use super::values::{
    Class, Double, FieldRef, Float, Integer, InterfaceMethodRef, InvokeDynamic, Long,
    MethodHandle, MethodRef, MethodType, NameAndType, Utf8,
};
use super::{cfg, ConstantPool, ConstantPoolInfo};
use crate::raw_java_class::{RawAttributeInfo, RawFieldInfo, RawMethodInfo};

fn parse_member_info(bytes: &[u8]) -> IResult<&[u8], (u16, u16, u16, Box<[RawAttributeInfo]>)> {
    let (bytes, (access_flags, name_index, descriptor_index, attributes_count)) =
        tuple((be_u16, be_u16, be_u16, be_u16))(bytes)?;
    let (bytes, attributes) = count(parse_attribute_info, attributes_count as usize)(bytes)?;
    Ok((
        bytes,
        (
            access_flags,
            name_index,
            descriptor_index,
            attributes.into_boxed_slice(),
        ),
    ))
}

pub(crate) fn parse_field_info(bytes: &[u8]) -> IResult<&[u8], RawFieldInfo> {
    map(
        parse_member_info,
        |(access_flags, name_index, descriptor_index, attributes)| RawFieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        },
    )(bytes)
}

pub(crate) fn parse_method_info(bytes: &[u8]) -> IResult<&[u8], RawMethodInfo> {
    map(
        parse_member_info,
        |(access_flags, name_index, descriptor_index, attributes)| RawMethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        },
    )(bytes)
}

pub(crate) fn parse_attribute_info(bytes: &[u8]) -> IResult<&[u8], RawAttributeInfo> {
    let (bytes, (name_index, length)) = tuple((be_u16, be_u32))(bytes)?;
    let (bytes, info) = take(length)(bytes)?;
    Ok((
        bytes,
        RawAttributeInfo {
            attribute_name_index: name_index,
            info: info.to_vec().into_boxed_slice(),
        },
    ))
}

fn parse_ref(bytes: &[u8]) -> IResult<&[u8], (u16, u16)> {
    tuple((be_u16, be_u16))(bytes)
}

fn parse_one(bytes: &[u8]) -> IResult<&[u8], ConstantPoolInfo> {
    let (bytes, tag) = be_u8(bytes)?;
    match tag {
        cfg::CLASS_TAG => map(be_u16, |name_index| {
            ConstantPoolInfo::Class(Class { name_index })
        })(bytes),
        cfg::FIELD_REF_TAG => map(parse_ref, |(class_index, name_and_type_index)| {
            ConstantPoolInfo::FieldRef(FieldRef {
                class_index,
                name_and_type_index,
            })
        })(bytes),
        cfg::METHOD_REF_TAG => map(parse_ref, |(class_index, name_and_type_index)| {
            ConstantPoolInfo::MethodRef(MethodRef {
                class_index,
                name_and_type_index,
            })
        })(bytes),
        cfg::INTERFACE_METHOD_REF_TAG => map(parse_ref, |(class_index, name_and_type_index)| {
            ConstantPoolInfo::InterfaceMethodRef(InterfaceMethodRef {
                class_index,
                name_and_type_index,
            })
        })(bytes),
        cfg::STRING_TAG => map(be_u16, |string_index| {
            ConstantPoolInfo::String(super::values::StringValue { string_index })
        })(bytes),
        cfg::INTEGER_TAG => map(be_u32, |bytes| ConstantPoolInfo::Integer(Integer { bytes }))(bytes),
        cfg::FLOAT_TAG => map(be_f32, |value| ConstantPoolInfo::Float(Float { value }))(bytes),
        cfg::LONG_TAG => map(be_u64, |value| ConstantPoolInfo::Long(Long { value }))(bytes),
        cfg::DOUBLE_TAG => map(be_f64, |value| ConstantPoolInfo::Double(Double { value }))(bytes),
        cfg::NAME_AND_TYPE_TAG => map(parse_ref, |(name_index, descriptor_index)| {
            ConstantPoolInfo::NameAndType(NameAndType {
                name_index,
                descriptor_index,
            })
        })(bytes),
        cfg::UTF8_TAG => {
            let (bytes, length) = be_u16(bytes)?;
            let (bytes, raw) = take(length)(bytes)?;
            Ok((
                bytes,
                ConstantPoolInfo::Utf8(Utf8 {
                    bytes: raw.to_vec().into_boxed_slice(),
                }),
            ))
        }
        cfg::METHOD_HANDLE_TAG => map(
            tuple((be_u8, be_u16)),
            |(reference_kind, reference_index)| {
                ConstantPoolInfo::MethodHandle(MethodHandle {
                    reference_kind,
                    reference_index,
                })
            },
        )(bytes),
        cfg::METHOD_TYPE_TAG => map(be_u16, |descriptor_index| {
            ConstantPoolInfo::MethodType(MethodType { descriptor_index })
        })(bytes),
        cfg::INVOKE_DYNAMIC_TAG => map(
            parse_ref,
            |(bootstrap_method_attr_index, name_and_type_index)| {
                ConstantPoolInfo::InvokeDynamic(InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                })
            },
        )(bytes),
        _unknown => Err(nom::Err::Failure(nom::error::Error::new(
            bytes,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Parses an entire constant pool of `length` entries (`constant_pool_count - 1`).
///
/// `Long` and `Double` entries occupy two index slots: the following slot is
/// filled with an unusable placeholder so 1-based indexing stays correct.
pub fn parse_constant_pool(length: u16) -> impl FnMut(&[u8]) -> IResult<&[u8], ConstantPool> {
    move |mut bytes: &[u8]| {
        let mut pool = Vec::with_capacity(length as usize);
        let mut remaining = length;
        while remaining > 0 {
            let (rest, info) = parse_one(bytes)?;
            let occupies_two = matches!(
                info,
                ConstantPoolInfo::Long(_) | ConstantPoolInfo::Double(_)
            );
            pool.push(info);
            bytes = rest;
            remaining -= 1;
            if occupies_two {
                pool.push(ConstantPoolInfo::Unusable);
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
            }
        }
        Ok((bytes, ConstantPool::new(pool)))
    }
}
