//! Decoded rows of the tables the crate interprets.
//!
//! Each struct mirrors the columns of its table (ECMA-335 II.22); heap references are kept
//! as raw indexes and resolved by [`crate::metadata::module`].

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfo},
    Result,
};

fn read_str(data: &[u8], offset: &mut usize, sizes: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.str_bytes() == 4)
}

fn read_blob(data: &[u8], offset: &mut usize, sizes: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.blob_bytes() == 4)
}

fn read_index(data: &[u8], offset: &mut usize, sizes: &TableInfo, table: TableId) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.table_index_bytes(table) == 4)
}

/// `Module` (0x00)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRaw {
    /// Row id
    pub rid: u32,
    /// `#Strings` index of the module file name
    pub name: u32,
}

impl RowReadable for ModuleRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let _generation = read_le_at::<u16>(data, offset)?;
        let name = read_str(data, offset, sizes)?;
        // Mvid, EncId, EncBaseId
        *offset += 3 * usize::from(sizes.guid_bytes());

        Ok(ModuleRaw { rid, name })
    }
}

/// `TypeRef` (0x01)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRaw {
    /// Row id
    pub rid: u32,
    /// `Module`, `ModuleRef`, `AssemblyRef` or enclosing `TypeRef`
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: CodedIndex::read(data, offset, sizes, CodedIndexType::ResolutionScope)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
        })
    }
}

/// `TypeDef` (0x02)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefRaw {
    /// Row id
    pub rid: u32,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type, null for interfaces and `System.Object`
    pub extends: CodedIndex,
    /// First row of the type's fields
    pub field_list: u32,
    /// First row of the type's methods
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
            extends: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_index(data, offset, sizes, TableId::Field)?,
            method_list: read_index(data, offset, sizes, TableId::MethodDef)?,
        })
    }
}

/// `InterfaceImpl` (0x09)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceImplRaw {
    /// Row id
    pub rid: u32,
    /// Implementing `TypeDef` row
    pub class: u32,
    /// Implemented interface
    pub interface: CodedIndex,
}

impl RowReadable for InterfaceImplRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(InterfaceImplRaw {
            rid,
            class: read_index(data, offset, sizes, TableId::TypeDef)?,
            interface: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

/// `MemberRef` (0x0A)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefRaw {
    /// Row id
    pub rid: u32,
    /// Declaring type or module
    pub class: CodedIndex,
    /// `#Strings` index of the member name
    pub name: u32,
    /// `#Blob` index of the signature
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            class: CodedIndex::read(data, offset, sizes, CodedIndexType::MemberRefParent)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}

/// `CustomAttribute` (0x0C)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttributeRaw {
    /// Row id
    pub rid: u32,
    /// The attributed entity
    pub parent: CodedIndex,
    /// The attribute constructor (`MethodDef` or `MemberRef`)
    pub constructor: CodedIndex,
    /// `#Blob` index of the serialized arguments
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(data, offset, sizes, CodedIndexType::CustomAttributeType)?,
            value: read_blob(data, offset, sizes)?,
        })
    }
}

/// `TypeSpec` (0x1B)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecRaw {
    /// Row id
    pub rid: u32,
    /// `#Blob` index of the type signature
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}

/// `Assembly` (0x20)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRaw {
    /// Row id
    pub rid: u32,
    /// Hash algorithm of the manifest
    pub hash_alg_id: u32,
    /// Version components
    pub version: [u16; 4],
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the public key
    pub public_key: u32,
    /// `#Strings` index of the simple name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            version: [
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
            ],
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_blob(data, offset, sizes)?,
            name: read_str(data, offset, sizes)?,
            culture: read_str(data, offset, sizes)?,
        })
    }
}

/// `AssemblyRef` (0x23)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRefRaw {
    /// Row id
    pub rid: u32,
    /// Version components
    pub version: [u16; 4],
    /// `AssemblyFlags`; bit 0 set means the blob holds a full public key
    pub flags: u32,
    /// `#Blob` index of the public key or token
    pub public_key_or_token: u32,
    /// `#Strings` index of the simple name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
    /// `#Blob` index of the hash value
    pub hash_value: u32,
}

impl RowReadable for AssemblyRefRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            version: [
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
            ],
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_blob(data, offset, sizes)?,
            name: read_str(data, offset, sizes)?,
            culture: read_str(data, offset, sizes)?,
            hash_value: read_blob(data, offset, sizes)?,
        })
    }
}

/// `NestedClass` (0x29)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedClassRaw {
    /// Row id
    pub rid: u32,
    /// `TypeDef` row of the nested type
    pub nested_class: u32,
    /// `TypeDef` row of the enclosing type
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: read_index(data, offset, sizes, TableId::TypeDef)?,
            enclosing_class: read_index(data, offset, sizes, TableId::TypeDef)?,
        })
    }
}

/// `GenericParam` (0x2A)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamRaw {
    /// Row id
    pub rid: u32,
    /// Position in the owner's parameter list
    pub number: u16,
    /// `GenericParamAttributes`
    pub flags: u16,
    /// Owning `TypeDef` or `MethodDef`
    pub owner: CodedIndex,
    /// `#Strings` index of the parameter name
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?,
            name: read_str(data, offset, sizes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_row() {
        let sizes = TableInfo::new_test(&[(TableId::TypeDef, 3), (TableId::TypeRef, 2)], false, false);

        #[rustfmt::skip]
        let data = [
            0xA1, 0x00, 0x10, 0x00, // flags
            0x10, 0x00,             // name
            0x20, 0x00,             // namespace
            0x09, 0x00,             // extends: TypeRef 2
            0x01, 0x00,             // field list
            0x03, 0x00,             // method list
        ];

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 2, &sizes).unwrap();
        assert_eq!(offset, data.len());
        assert_eq!(row.rid, 2);
        assert_eq!(row.flags, 0x0010_00A1);
        assert_eq!((row.type_name, row.type_namespace), (0x10, 0x20));
        assert_eq!(row.extends, CodedIndex::new(TableId::TypeRef, 2));
        assert_eq!(row.method_list, 3);
    }

    #[test]
    fn assembly_ref_row() {
        let sizes = TableInfo::new_test(&[(TableId::AssemblyRef, 1)], false, true);

        #[rustfmt::skip]
        let data = [
            0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 4.0.0.0
            0x00, 0x00, 0x00, 0x00,                         // flags
            0x05, 0x00, 0x00, 0x00,                         // token blob (4 byte index)
            0x30, 0x00,                                     // name
            0x00, 0x00,                                     // culture
            0x00, 0x00, 0x00, 0x00,                         // hash
        ];

        let mut offset = 0;
        let row = AssemblyRefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();
        assert_eq!(offset, data.len());
        assert_eq!(row.version, [4, 0, 0, 0]);
        assert_eq!(row.public_key_or_token, 5);
        assert_eq!(row.name, 0x30);
    }

    #[test]
    fn truncated_row() {
        let sizes = TableInfo::new_test(&[], false, false);
        let mut offset = 0;
        assert!(GenericParamRaw::row_read(&[0x00, 0x00, 0x00], &mut offset, 1, &sizes).is_err());
    }
}
