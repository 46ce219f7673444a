//! The individual `cp_info` variants, one struct per JVM constant-pool tag.

use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy)]
pub struct Class {
    pub name_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct FieldRef {
    pub class_index: u16,
    pub name_and_type_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct MethodRef {
    pub class_index: u16,
    pub name_and_type_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct InterfaceMethodRef {
    pub class_index: u16,
    pub name_and_type_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct StringValue {
    pub string_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct Integer {
    pub bytes: u32,
}
#[derive(Debug, Clone, Copy)]
pub struct Float {
    pub value: f32,
}
#[derive(Debug, Clone, Copy)]
pub struct Long {
    pub value: u64,
}
#[derive(Debug, Clone, Copy)]
pub struct Double {
    pub value: f64,
}
#[derive(Debug, Clone, Copy)]
pub struct NameAndType {
    pub name_index: u16,
    pub descriptor_index: u16,
}
#[derive(Debug, Clone)]
pub struct Utf8 {
    pub bytes: Box<[u8]>,
}

impl AsRef<str> for Utf8 {
    fn as_ref(&self) -> &str {
        std::str::from_utf8(&self.bytes).expect("classfile UTF-8 constants are valid UTF-8")
    }
}

impl Display for Utf8 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MethodHandle {
    pub reference_kind: u8,
    pub reference_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct MethodType {
    pub descriptor_index: u16,
}
#[derive(Debug, Clone, Copy)]
pub struct InvokeDynamic {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}
