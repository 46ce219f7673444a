//! The JVM constant pool: tag-dispatched variable-body entries, 1-indexed.

pub mod parser;
pub mod values;

use values::{
    Class, Double, FieldRef, Float, Integer, InterfaceMethodRef, InvokeDynamic, Long,
    MethodHandle, MethodRef, MethodType, NameAndType, StringValue, Utf8,
};

/// Tag byte values, as defined by the JVM spec.
pub mod cfg {
    pub const CLASS_TAG: u8 = 7;
    pub const FIELD_REF_TAG: u8 = 9;
    pub const METHOD_REF_TAG: u8 = 10;
    pub const INTERFACE_METHOD_REF_TAG: u8 = 11;
    pub const STRING_TAG: u8 = 8;
    pub const INTEGER_TAG: u8 = 3;
    pub const FLOAT_TAG: u8 = 4;
    pub const LONG_TAG: u8 = 5;
    pub const DOUBLE_TAG: u8 = 6;
    pub const NAME_AND_TYPE_TAG: u8 = 12;
    pub const UTF8_TAG: u8 = 1;
    pub const METHOD_HANDLE_TAG: u8 = 15;
    pub const METHOD_TYPE_TAG: u8 = 16;
    pub const INVOKE_DYNAMIC_TAG: u8 = 18;
}

/// One `cp_info` entry.
#[derive(Debug, Clone)]
pub enum ConstantPoolInfo {
    Class(Class),
    FieldRef(FieldRef),
    MethodRef(MethodRef),
    InterfaceMethodRef(InterfaceMethodRef),
    String(StringValue),
    Integer(Integer),
    Float(Float),
    Long(Long),
    Double(Double),
    NameAndType(NameAndType),
    Utf8(Utf8),
    MethodHandle(MethodHandle),
    MethodType(MethodType),
    InvokeDynamic(InvokeDynamic),
    /// The second index slot consumed by a preceding `Long`/`Double` entry.
    /// Never returned to callers; present only to keep 1-based indexing correct.
    Unusable,
}

/// The constant pool, accessed with 1-based `u16` indices.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    pool: Vec<ConstantPoolInfo>,
}

impl ConstantPool {
    pub(crate) fn new(pool: Vec<ConstantPoolInfo>) -> Self {
        Self { pool }
    }

    /// Gets the entry at `index` (1-based). Returns `None` for index `0`,
    /// out-of-range indices, and the unusable slot after a Long/Double.
    pub fn get(&self, index: u16) -> Option<&ConstantPoolInfo> {
        if index == 0 {
            return None;
        }
        match self.pool.get(index as usize - 1) {
            Some(ConstantPoolInfo::Unusable) | None => None,
            Some(info) => Some(info),
        }
    }

    /// Resolves a UTF-8 entry to its string, following `String` indirection
    /// one hop (a `String` constant points at a `Utf8` constant).
    pub fn resolve_string(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            ConstantPoolInfo::String(StringValue { string_index }) => {
                self.resolve_string(*string_index)
            }
            ConstantPoolInfo::Utf8(utf8) => Some(utf8.as_ref()),
            _ => None,
        }
    }

    /// Resolves a `Class` entry to its internal-form name string.
    pub fn resolve_class_name(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            ConstantPoolInfo::Class(Class { name_index }) => self.resolve_string(*name_index),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
