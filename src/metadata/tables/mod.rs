//! Metadata tables of the `#~` stream.
//!
//! Row layouts are described once per table ([`TableId::columns`]); [`TableInfo`] turns them
//! into byte widths for a concrete module, and [`TablesHeader`] slices the stream into one
//! byte range per table. The rows the crate actually interprets are decoded into the `*Raw`
//! structs in [`rows`] through the [`RowReadable`] trait.
//!
//! # References
//!
//! - [ECMA-335 II.22: Metadata logical format: tables](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
//! - [ECMA-335 II.24.2.6: #~ stream](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod codedindex;
mod rows;
mod tableid;
mod tableinfo;
mod tablesheader;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use rows::{
    AssemblyRaw, AssemblyRefRaw, CustomAttributeRaw, GenericParamRaw, InterfaceImplRaw,
    MemberRefRaw, ModuleRaw, NestedClassRaw, TypeDefRaw, TypeRefRaw, TypeSpecRaw,
};
pub use tableid::{Column, TableId};
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};
pub use tablesheader::TablesHeader;

use std::marker::PhantomData;

use crate::{Error::OutOfBounds, Result};

/// A table row that can be decoded from its on-disk representation.
pub trait RowReadable: Sized {
    /// Decode the row with id `rid` at `offset`, advancing `offset` past it.
    ///
    /// # Errors
    /// Returns an error if the row is truncated or contains an invalid coded index.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;
}

/// Typed view over the rows of one table.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: TableInfoRef,
    _phantom: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Creates a view over `row_count` rows of `row_size` bytes each.
    #[must_use]
    pub fn new(data: &'a [u8], row_count: u32, row_size: u32, sizes: TableInfoRef) -> Self {
        MetadataTable {
            data,
            row_count,
            row_size,
            sizes,
            _phantom: PhantomData,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Size of one row in bytes.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Decode the row with the 1-based id `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for a rid outside the table, or the decode error.
    pub fn try_get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(OutOfBounds);
        }

        let mut offset = (rid as usize - 1) * self.row_size as usize;
        T::row_read(self.data, &mut offset, rid, &self.sizes)
    }

    /// Decode the row with the 1-based id `rid`, `None` if it does not exist or is invalid.
    #[must_use]
    pub fn get(&self, rid: u32) -> Option<T> {
        self.try_get(rid).ok()
    }

    /// Iterate over all rows; iteration stops at the first row that fails to decode.
    #[must_use]
    pub fn iter(&self) -> TableIterator<'_, 'a, T> {
        TableIterator {
            table: self,
            current_row: 0,
        }
    }
}

/// Sequential iterator over the rows of a [`MetadataTable`].
pub struct TableIterator<'t, 'a, T> {
    table: &'t MetadataTable<'a, T>,
    current_row: u32,
}

impl<T: RowReadable> Iterator for TableIterator<'_, '_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.table.row_count {
            return None;
        }

        match self.table.try_get(self.current_row + 1) {
            Ok(row) => {
                self.current_row += 1;
                Some(row)
            }
            Err(_) => {
                self.current_row = self.table.row_count;
                None
            }
        }
    }
}
