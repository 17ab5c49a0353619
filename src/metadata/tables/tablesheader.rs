//! The header of the `#~` (or `#-`) stream and the location of every table inside it.

use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// `HeapSizes` bit announcing 4 bytes of extra data after the row counts.
const EXTRA_DATA_FLAG: u8 = 0x40;

/// Parsed `#~` stream header with the byte range of each table.
pub struct TablesHeader<'a> {
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    info: TableInfoRef,
    tables: Vec<Option<&'a [u8]>>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables header and slice out each present table.
    ///
    /// Tables with numbers above `0x2C` (such as portable PDB tables) are counted so the
    /// row-count array is skipped correctly, but their rows are never addressed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is shorter than the declared tables.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;
        let mut offset = 24;
        let mut row_counts = [0u32; TableId::COUNT];
        for bit in 0..64 {
            if valid & (1u64 << bit) == 0 {
                continue;
            }

            let rows = read_le_at::<u32>(data, &mut offset)?;
            if bit < TableId::COUNT {
                row_counts[bit] = rows;
            }
        }

        if heap_sizes & EXTRA_DATA_FLAG != 0 {
            offset += 4;
        }

        let info = Arc::new(TableInfo::new(&row_counts, heap_sizes));
        let mut tables = vec![None; TableId::COUNT];
        for table_id in TableId::iter() {
            let rows = info.rows(table_id);
            if rows == 0 {
                continue;
            }

            let Some(size) = (rows as usize).checked_mul(info.row_size(table_id) as usize) else {
                return Err(OutOfBounds);
            };
            let end = offset.checked_add(size).ok_or(OutOfBounds)?;
            let Some(table_data) = data.get(offset..end) else {
                return Err(OutOfBounds);
            };

            tables[table_id as usize] = Some(table_data);
            offset = end;
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            tables,
        })
    }

    /// Row counts and index widths.
    #[must_use]
    pub fn info(&self) -> &TableInfoRef {
        &self.info
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn table_row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Typed access to the rows of `table`, `None` if the table is empty.
    #[must_use]
    pub fn table<T: RowReadable>(&self, table: TableId) -> Option<MetadataTable<'a, T>> {
        let data = self.tables[table as usize]?;
        Some(MetadataTable::new(
            data,
            self.info.rows(table),
            self.info.row_size(table),
            self.info.clone(),
        ))
    }
}
