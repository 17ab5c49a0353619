//! Row counts and index widths of the metadata tables of one module.

use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::tables::{CodedIndexType, Column, TableId},
    Error::OutOfBounds,
    Result,
};

/// Row count of one table and the bits needed to index it.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to store a row index
    pub bits: u8,
    /// `true` if indexes into this table take 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates the info for a table with `rows` rows.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts, heap index widths and coded index widths of one module's tables.
#[derive(Clone, Default, Debug)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared reference to a [`TableInfo`].
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Builds the table info from the row counts (indexed by table number) and the
    /// `HeapSizes` byte of the tables header.
    #[must_use]
    pub fn new(row_counts: &[u32; TableId::COUNT], heap_sizes: u8) -> Self {
        let mut table_info = TableInfo {
            rows: row_counts.iter().map(|rows| TableRowInfo::new(*rows)).collect(),
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_sizes & 1 == 1,
            is_large_index_guid: heap_sizes & 2 == 2,
            is_large_index_blob: heap_sizes & 4 == 4,
        };

        table_info.calculate_coded_index_bits();
        table_info
    }

    #[cfg(test)]
    pub(crate) fn new_test(valid_tables: &[(TableId, u32)], large_str: bool, large_blob: bool) -> Self {
        let mut row_counts = [0u32; TableId::COUNT];
        for (table, rows) in valid_tables {
            row_counts[*table as usize] = *rows;
        }

        let mut heap_sizes = 0;
        if large_str {
            heap_sizes |= 1;
        }
        if large_blob {
            heap_sizes |= 4;
        }

        TableInfo::new(&row_counts, heap_sizes)
    }

    fn calculate_coded_index_bits(&mut self) {
        for ci_type in CodedIndexType::iter() {
            let max_bits = ci_type
                .tables()
                .iter()
                .map(|table| self.rows[*table as usize].bits)
                .max()
                .unwrap_or(1);

            self.coded_indexes[ci_type as usize] = max_bits + ci_type.tag_bits();
        }
    }

    /// Split a raw coded index into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the tag does not name a table.
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<(TableId, u32)> {
        let tables = coded_index_type.tables();
        let tag_bits = coded_index_type.tag_bits();
        let tag_mask = (1u32 << tag_bits) - 1;

        let tag = value & tag_mask;
        let index = value >> tag_bits;

        match tables.get(tag as usize) {
            Some(table) => Ok((*table, index)),
            None => Err(OutOfBounds),
        }
    }

    /// Row info of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Number of rows of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Byte width of `#Strings` indexes.
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Byte width of `#GUID` indexes.
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Byte width of `#Blob` indexes.
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Byte width of simple indexes into `table_id`.
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Bits needed for a coded index of `coded_index_type`.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Byte width of a coded index of `coded_index_type`.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_index_bits(coded_index_type) > 16 {
            4
        } else {
            2
        }
    }

    /// Byte width of one column.
    #[must_use]
    pub fn column_size(&self, column: Column) -> u8 {
        match column {
            Column::Fixed(width) => width,
            Column::Str => self.str_bytes(),
            Column::Guid => self.guid_bytes(),
            Column::Blob => self.blob_bytes(),
            Column::Table(table) => self.table_index_bytes(table),
            Column::Coded(ci_type) => self.coded_index_bytes(ci_type),
        }
    }

    /// Byte width of one row of `table`.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        table
            .columns()
            .iter()
            .map(|column| u32::from(self.column_size(*column)))
            .sum()
    }
}
