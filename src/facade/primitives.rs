//! Well-known primitive types and their aliases.

use strum::{Display, EnumIter, IntoEnumIterator};

/// A primitive value type understood without consulting any module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Primitive {
    /// `System.Boolean`
    #[strum(serialize = "System.Boolean")]
    Bool,
    /// `System.Char`
    #[strum(serialize = "System.Char")]
    Char,
    /// `System.SByte`
    #[strum(serialize = "System.SByte")]
    I8,
    /// `System.Byte`
    #[strum(serialize = "System.Byte")]
    U8,
    /// `System.Int16`
    #[strum(serialize = "System.Int16")]
    I16,
    /// `System.UInt16`
    #[strum(serialize = "System.UInt16")]
    U16,
    /// `System.Int32`
    #[strum(serialize = "System.Int32")]
    I32,
    /// `System.UInt32`
    #[strum(serialize = "System.UInt32")]
    U32,
    /// `System.Int64`
    #[strum(serialize = "System.Int64")]
    I64,
    /// `System.UInt64`
    #[strum(serialize = "System.UInt64")]
    U64,
    /// `System.Single`
    #[strum(serialize = "System.Single")]
    F32,
    /// `System.Double`
    #[strum(serialize = "System.Double")]
    F64,
    /// `System.Decimal`
    #[strum(serialize = "System.Decimal")]
    Decimal,
    /// `System.String`
    #[strum(serialize = "System.String")]
    String,
    /// `System.DateTime`
    #[strum(serialize = "System.DateTime")]
    DateTime,
    /// `System.Object`, accepts any value
    #[strum(serialize = "System.Object")]
    Object,
}

impl Primitive {
    /// Keyword alias of the type, if the type has one.
    #[must_use]
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::I8 => "sbyte",
            Primitive::U8 => "byte",
            Primitive::I16 => "short",
            Primitive::U16 => "ushort",
            Primitive::I32 => "int",
            Primitive::U32 => "uint",
            Primitive::I64 => "long",
            Primitive::U64 => "ulong",
            Primitive::F32 => "float",
            Primitive::F64 => "double",
            Primitive::Decimal => "decimal",
            Primitive::String => "string",
            Primitive::Object => "object",
            Primitive::DateTime => return None,
        })
    }

    /// Look a primitive up by keyword (`int`), short name (`Int32`) or full name
    /// (`System.Int32`).
    #[must_use]
    pub fn from_alias(name: &str) -> Option<Primitive> {
        let name = name.trim();
        Primitive::iter().find(|primitive| {
            let full = primitive.to_string();
            full == name
                || full.strip_prefix("System.") == Some(name)
                || primitive.keyword() == Some(name)
        })
    }

    /// `true` for the integral types.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Primitive::I8
                | Primitive::U8
                | Primitive::I16
                | Primitive::U16
                | Primitive::I32
                | Primitive::U32
                | Primitive::I64
                | Primitive::U64
        )
    }

    /// Inclusive value range of an integral type.
    #[must_use]
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        Some(match self {
            Primitive::I8 => (i8::MIN.into(), i8::MAX.into()),
            Primitive::U8 => (0, u8::MAX.into()),
            Primitive::I16 => (i16::MIN.into(), i16::MAX.into()),
            Primitive::U16 => (0, u16::MAX.into()),
            Primitive::I32 => (i32::MIN.into(), i32::MAX.into()),
            Primitive::U32 => (0, u32::MAX.into()),
            Primitive::I64 => (i64::MIN.into(), i64::MAX.into()),
            Primitive::U64 => (0, u64::MAX.into()),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases() {
        assert_eq!(Primitive::from_alias("int"), Some(Primitive::I32));
        assert_eq!(Primitive::from_alias("Int32"), Some(Primitive::I32));
        assert_eq!(Primitive::from_alias("System.Int32"), Some(Primitive::I32));
        assert_eq!(Primitive::from_alias(" decimal "), Some(Primitive::Decimal));
        assert_eq!(Primitive::from_alias("DateTime"), Some(Primitive::DateTime));
        assert_eq!(Primitive::from_alias("Int"), None);
        assert_eq!(Primitive::from_alias("Demo.Color"), None);
        assert_eq!(Primitive::U16.to_string(), "System.UInt16");
    }

    #[test]
    fn ranges() {
        assert_eq!(Primitive::U8.integer_range(), Some((0, 255)));
        assert!(Primitive::U64.is_integer());
        assert!(Primitive::String.integer_range().is_none());
    }
}
