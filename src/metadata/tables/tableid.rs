//! Identifiers and column layouts of the ECMA-335 metadata tables.

use strum::{EnumCount, EnumIter};

use crate::metadata::{tables::CodedIndexType, token::Token};

/// The metadata tables of the `#~` stream, `0x00` to `0x2C`.
///
/// The discriminant is the table number used in tokens and in the `Valid` bit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// `0x00`
    Module = 0x00,
    /// `0x01`
    TypeRef = 0x01,
    /// `0x02`
    TypeDef = 0x02,
    /// `0x03`
    FieldPtr = 0x03,
    /// `0x04`
    Field = 0x04,
    /// `0x05`
    MethodPtr = 0x05,
    /// `0x06`
    MethodDef = 0x06,
    /// `0x07`
    ParamPtr = 0x07,
    /// `0x08`
    Param = 0x08,
    /// `0x09`
    InterfaceImpl = 0x09,
    /// `0x0A`
    MemberRef = 0x0A,
    /// `0x0B`
    Constant = 0x0B,
    /// `0x0C`
    CustomAttribute = 0x0C,
    /// `0x0D`
    FieldMarshal = 0x0D,
    /// `0x0E`
    DeclSecurity = 0x0E,
    /// `0x0F`
    ClassLayout = 0x0F,
    /// `0x10`
    FieldLayout = 0x10,
    /// `0x11`
    StandAloneSig = 0x11,
    /// `0x12`
    EventMap = 0x12,
    /// `0x13`
    EventPtr = 0x13,
    /// `0x14`
    Event = 0x14,
    /// `0x15`
    PropertyMap = 0x15,
    /// `0x16`
    PropertyPtr = 0x16,
    /// `0x17`
    Property = 0x17,
    /// `0x18`
    MethodSemantics = 0x18,
    /// `0x19`
    MethodImpl = 0x19,
    /// `0x1A`
    ModuleRef = 0x1A,
    /// `0x1B`
    TypeSpec = 0x1B,
    /// `0x1C`
    ImplMap = 0x1C,
    /// `0x1D`
    FieldRVA = 0x1D,
    /// `0x1E`
    EncLog = 0x1E,
    /// `0x1F`
    EncMap = 0x1F,
    /// `0x20`
    Assembly = 0x20,
    /// `0x21`
    AssemblyProcessor = 0x21,
    /// `0x22`
    AssemblyOS = 0x22,
    /// `0x23`
    AssemblyRef = 0x23,
    /// `0x24`
    AssemblyRefProcessor = 0x24,
    /// `0x25`
    AssemblyRefOS = 0x25,
    /// `0x26`
    File = 0x26,
    /// `0x27`
    ExportedType = 0x27,
    /// `0x28`
    ManifestResource = 0x28,
    /// `0x29`
    NestedClass = 0x29,
    /// `0x2A`
    GenericParam = 0x2A,
    /// `0x2B`
    MethodSpec = 0x2B,
    /// `0x2C`
    GenericParamConstraint = 0x2C,
}

/// One column of a table row, as far as its on-disk width is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// A constant of the given byte width
    Fixed(u8),
    /// Index into `#Strings`
    Str,
    /// Index into `#GUID`
    Guid,
    /// Index into `#Blob`
    Blob,
    /// Simple index into another table
    Table(TableId),
    /// Coded index
    Coded(CodedIndexType),
}

use Column::{Blob, Coded, Fixed, Guid, Str, Table};
use CodedIndexType as Ci;

impl TableId {
    /// The column layout of one row of this table (ECMA-335 II.22).
    #[must_use]
    pub fn columns(&self) -> &'static [Column] {
        match self {
            TableId::Module => &[Fixed(2), Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(Ci::ResolutionScope), Str, Str],
            TableId::TypeDef => &[
                Fixed(4),
                Str,
                Str,
                Coded(Ci::TypeDefOrRef),
                Table(TableId::Field),
                Table(TableId::MethodDef),
            ],
            TableId::FieldPtr => &[Table(TableId::Field)],
            TableId::Field => &[Fixed(2), Str, Blob],
            TableId::MethodPtr => &[Table(TableId::MethodDef)],
            TableId::MethodDef => &[Fixed(4), Fixed(2), Fixed(2), Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr => &[Table(TableId::Param)],
            TableId::Param => &[Fixed(2), Fixed(2), Str],
            TableId::InterfaceImpl => &[Table(TableId::TypeDef), Coded(Ci::TypeDefOrRef)],
            TableId::MemberRef => &[Coded(Ci::MemberRefParent), Str, Blob],
            TableId::Constant => &[Fixed(2), Coded(Ci::HasConstant), Blob],
            TableId::CustomAttribute => &[
                Coded(Ci::HasCustomAttribute),
                Coded(Ci::CustomAttributeType),
                Blob,
            ],
            TableId::FieldMarshal => &[Coded(Ci::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[Fixed(2), Coded(Ci::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[Fixed(2), Fixed(4), Table(TableId::TypeDef)],
            TableId::FieldLayout => &[Fixed(4), Table(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr => &[Table(TableId::Event)],
            TableId::Event => &[Fixed(2), Str, Coded(Ci::TypeDefOrRef)],
            TableId::PropertyMap => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr => &[Table(TableId::Property)],
            TableId::Property => &[Fixed(2), Str, Blob],
            TableId::MethodSemantics => &[
                Fixed(2),
                Table(TableId::MethodDef),
                Coded(Ci::HasSemantics),
            ],
            TableId::MethodImpl => &[
                Table(TableId::TypeDef),
                Coded(Ci::MethodDefOrRef),
                Coded(Ci::MethodDefOrRef),
            ],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[
                Fixed(2),
                Coded(Ci::MemberForwarded),
                Str,
                Table(TableId::ModuleRef),
            ],
            TableId::FieldRVA => &[Fixed(4), Table(TableId::Field)],
            TableId::EncLog => &[Fixed(4), Fixed(4)],
            TableId::EncMap => &[Fixed(4)],
            TableId::Assembly => &[
                Fixed(4),
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(4),
                Blob,
                Str,
                Str,
            ],
            TableId::AssemblyProcessor => &[Fixed(4)],
            TableId::AssemblyOS => &[Fixed(4), Fixed(4), Fixed(4)],
            TableId::AssemblyRef => &[
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(2),
                Fixed(4),
                Blob,
                Str,
                Str,
                Blob,
            ],
            TableId::AssemblyRefProcessor => &[Fixed(4), Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[
                Fixed(4),
                Fixed(4),
                Fixed(4),
                Table(TableId::AssemblyRef),
            ],
            TableId::File => &[Fixed(4), Str, Blob],
            TableId::ExportedType => &[Fixed(4), Fixed(4), Str, Str, Coded(Ci::Implementation)],
            TableId::ManifestResource => &[Fixed(4), Fixed(4), Str, Coded(Ci::Implementation)],
            TableId::NestedClass => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam => &[Fixed(2), Fixed(2), Coded(Ci::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(Ci::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => &[
                Table(TableId::GenericParam),
                Coded(Ci::TypeDefOrRef),
            ],
        }
    }

    /// The token of row `row` in this table.
    #[must_use]
    pub fn token(&self, row: u32) -> Token {
        Token::from_parts(*self as u8, row)
    }

    /// Map a table number back to its identifier.
    #[must_use]
    pub fn from_number(number: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        if usize::from(number) >= TableId::COUNT {
            return None;
        }

        TableId::iter().nth(usize::from(number))
    }
}
