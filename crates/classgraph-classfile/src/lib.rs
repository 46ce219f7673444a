//! Binary parser for JVM classfiles: decodes the constant pool, the
//! access-flags/this/super/interfaces/fields/methods/attributes header, and
//! the attribute kinds this engine indexes, into an [`UnlinkedClassRecord`]
//! ready for the graph linker.
//!
//! No bytecode method bodies are decoded and no classfile is ever mutated
//! or written back out; this crate only reads.

pub mod annotation;
pub mod attributes;
pub mod constant_pool;
pub mod error;
pub mod fully_qualified_name;
pub mod raw_java_class;
pub mod record;
pub mod signature;

pub use error::{Error, ErrorKind};
pub use fully_qualified_name::{FQName, FQNameBuf};
pub use record::UnlinkedClassRecord;

use classgraph_spec::ScanSpec;

/// Parses a classfile's raw bytes and applies every scan-spec filter,
/// returning `None` if the class was denied or not allowed rather than an
/// error: a filtered-out class is an expected, non-exceptional outcome.
pub fn parse_unlinked(bytes: &[u8], spec: &ScanSpec) -> Result<Option<UnlinkedClassRecord>, Error> {
    let raw = raw_java_class::parse_class_file_bytes(bytes)?;
    Ok(record::build_record(&raw, spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtered_out_class_yields_no_record_not_an_error() {
        let bytes = minimal_classfile_with_denied_name();
        let spec = ScanSpec::builder().token("-p").build();
        let result = parse_unlinked(&bytes, &spec).expect("well-formed classfile parses");
        assert!(result.is_none());
    }

    #[test]
    fn bad_magic_is_an_error() {
        let mut bytes = minimal_classfile_with_denied_name();
        bytes[0] = 0;
        let spec = ScanSpec::default();
        assert!(parse_unlinked(&bytes, &spec).is_err());
    }

    fn minimal_classfile_with_denied_name() -> Vec<u8> {
        // cp: 1=Utf8 "p/Secret", 2=Class->1, 3=Utf8 "java/lang/Object", 4=Class->3
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&[0x00, 0x00]); // minor
        bytes.extend_from_slice(&[0x00, 0x34]); // major
        bytes.extend_from_slice(&[0x00, 0x05]); // constant_pool_count = 5 (4 entries)

        push_utf8(&mut bytes, "p/Secret");
        push_class(&mut bytes, 1);
        push_utf8(&mut bytes, "java/lang/Object");
        push_class(&mut bytes, 3);

        bytes.extend_from_slice(&[0x00, 0x21]); // access_flags
        bytes.extend_from_slice(&[0x00, 0x02]); // this_class
        bytes.extend_from_slice(&[0x00, 0x04]); // super_class
        bytes.extend_from_slice(&[0x00, 0x00]); // interfaces_count
        bytes.extend_from_slice(&[0x00, 0x00]); // fields_count
        bytes.extend_from_slice(&[0x00, 0x00]); // methods_count
        bytes.extend_from_slice(&[0x00, 0x00]); // attributes_count
        bytes
    }

    fn push_utf8(bytes: &mut Vec<u8>, s: &str) {
        bytes.push(1); // UTF8_TAG
        bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        bytes.extend_from_slice(s.as_bytes());
    }

    fn push_class(bytes: &mut Vec<u8>, name_index: u16) {
        bytes.push(7); // CLASS_TAG
        bytes.extend_from_slice(&name_index.to_be_bytes());
    }
}
