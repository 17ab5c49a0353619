//! The two blob formats the crate decodes: `TypeSpec` signatures of generic instantiations and
//! custom attribute values with a single string argument.
//!
//! # References
//!
//! - [ECMA-335 II.23.2.14: TypeSpec](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
//! - [ECMA-335 II.23.3: Custom attributes](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::parser::Parser,
    metadata::tables::{CodedIndex, TableId},
    Error::NotSupported,
    Result,
};

/// `ELEMENT_TYPE_VALUETYPE`
pub const ELEMENT_TYPE_VALUETYPE: u8 = 0x11;
/// `ELEMENT_TYPE_CLASS`
pub const ELEMENT_TYPE_CLASS: u8 = 0x12;
/// `ELEMENT_TYPE_GENERICINST`
pub const ELEMENT_TYPE_GENERICINST: u8 = 0x15;

/// Prolog of every custom attribute value blob.
const ATTRIBUTE_PROLOG: u16 = 0x0001;

/// Decoded `TypeSpec` signature of a generic instantiation such as `IHandler<int>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericInstance {
    /// The generic type definition (`TypeDef` or `TypeRef`)
    pub definition: CodedIndex,
    /// Number of type arguments
    pub argument_count: u32,
}

/// Decode a `TypeDefOrRefOrSpecEncoded` value (ECMA-335 II.23.2.8).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an invalid tag.
pub fn decode_type_def_or_ref(encoded: u32) -> Result<CodedIndex> {
    let table = match encoded & 0x3 {
        0 => TableId::TypeDef,
        1 => TableId::TypeRef,
        2 => TableId::TypeSpec,
        tag => return Err(malformed_error!("Invalid TypeDefOrRefOrSpecEncoded tag - {}", tag)),
    };

    Ok(CodedIndex::new(table, encoded >> 2))
}

/// Decode a `TypeSpec` blob that instantiates a generic class or value type.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] for any other kind of `TypeSpec` (arrays, pointers,
/// generic parameters), and an error for truncated blobs.
pub fn parse_generic_instance(blob: &[u8]) -> Result<GenericInstance> {
    let mut parser = Parser::new(blob);
    if parser.read_le::<u8>()? != ELEMENT_TYPE_GENERICINST {
        return Err(NotSupported);
    }

    match parser.read_le::<u8>()? {
        ELEMENT_TYPE_CLASS | ELEMENT_TYPE_VALUETYPE => {}
        other => {
            return Err(malformed_error!(
                "Invalid generic instantiation kind - 0x{:02x}",
                other
            ))
        }
    }

    let definition = decode_type_def_or_ref(parser.read_compressed_uint()?)?;
    let argument_count = parser.read_compressed_uint()?;

    Ok(GenericInstance {
        definition,
        argument_count,
    })
}

/// Decode the first fixed argument of a custom attribute whose constructor takes one string.
///
/// # Errors
/// Returns an error for a missing prolog or a truncated string.
pub fn parse_string_attribute(blob: &[u8]) -> Result<Option<String>> {
    let mut parser = Parser::new(blob);
    let prolog = parser.read_le::<u16>()?;
    if prolog != ATTRIBUTE_PROLOG {
        return Err(malformed_error!("Invalid custom attribute prolog - {}", prolog));
    }

    parser.read_ser_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_instance() {
        // GENERICINST CLASS TypeRef(3) 1 I4
        let blob = [0x15, 0x12, (3 << 2) | 1, 0x01, 0x08];
        let instance = parse_generic_instance(&blob).unwrap();

        assert_eq!(instance.definition, CodedIndex::new(TableId::TypeRef, 3));
        assert_eq!(instance.argument_count, 1);
    }

    #[test]
    fn not_a_generic_instance() {
        // SZARRAY I4
        assert!(matches!(
            parse_generic_instance(&[0x1D, 0x08]),
            Err(NotSupported)
        ));
        assert!(parse_generic_instance(&[0x15, 0x08, 0x04, 0x01]).is_err());
        assert!(parse_generic_instance(&[0x15]).is_err());
    }

    #[test]
    fn type_def_or_ref() {
        assert_eq!(
            decode_type_def_or_ref(0x08).unwrap(),
            CodedIndex::new(TableId::TypeDef, 2)
        );
        assert_eq!(
            decode_type_def_or_ref(0x0A).unwrap(),
            CodedIndex::new(TableId::TypeSpec, 2)
        );
        assert!(decode_type_def_or_ref(0x03).is_err());
    }

    #[test]
    fn string_attribute() {
        let blob = [0x01, 0x00, 0x05, b'T', b'o', b'o', b'l', b's', 0x00, 0x00];
        assert_eq!(parse_string_attribute(&blob).unwrap().as_deref(), Some("Tools"));

        let null_string = [0x01, 0x00, 0xFF, 0x00, 0x00];
        assert_eq!(parse_string_attribute(&null_string).unwrap(), None);

        assert!(parse_string_attribute(&[0x02, 0x00, 0x00]).is_err());
    }
}
