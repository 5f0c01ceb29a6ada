//! The [`DataTable`]: an ordered list of equal-length columns.

use std::collections::BTreeMap;

use crate::{Column, ColumnData, Error, Result};

/// One row read into a name → value mapping.
pub type Row = BTreeMap<String, f32>;

/// Columnar table. All columns have the same length; the constructor and
/// `add_column` enforce this. Tables move; duplication is explicit via
/// [`DataTable::deep_clone`] / [`DataTable::clone_subset`].
#[derive(Debug, Default)]
pub struct DataTable {
    columns: Vec<Column>,
}

impl DataTable {
    pub fn new(columns: Vec<Column>) -> Result<DataTable> {
        let mut table = DataTable::default();
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn column_mut(&mut self, index: usize) -> &mut Column {
        &mut self.columns[index]
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn column_by_name_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Append a column. Its length must match the table's row count
    /// (any length is accepted for the first column).
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            let len = column.len();
            let rows = self.num_rows();
            return Err(Error::LengthMismatch {
                name: column.name,
                len,
                rows,
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove a column by name. Returns whether it existed.
    pub fn remove_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(i) => {
                self.columns.remove(i);
                true
            }
            None => false,
        }
    }

    /// Read row `index` into a name → f32 mapping.
    pub fn row(&self, index: usize) -> Result<Row> {
        if index >= self.num_rows() {
            return Err(Error::RowOutOfRange {
                index,
                rows: self.num_rows(),
            });
        }
        let mut row = Row::new();
        for column in &self.columns {
            row.insert(column.name.clone(), column.get::<f32>(index)?);
        }
        Ok(row)
    }

    /// Write the values of `row` into row `index`. Columns not present in
    /// the mapping are left untouched.
    pub fn set_row(&mut self, index: usize, row: &Row) -> Result<()> {
        if index >= self.num_rows() {
            return Err(Error::RowOutOfRange {
                index,
                rows: self.num_rows(),
            });
        }
        for column in &mut self.columns {
            if let Some(&value) = row.get(&column.name) {
                column.set(index, value)?;
            }
        }
        Ok(())
    }

    /// Deep copy of the whole table.
    pub fn deep_clone(&self) -> DataTable {
        DataTable {
            columns: self.columns.clone(),
        }
    }

    /// Deep copy of the named columns, in the given order.
    pub fn clone_subset(&self, names: &[&str]) -> Result<DataTable> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push(self.column_by_name(name)?.clone());
        }
        Ok(DataTable { columns })
    }

    /// New table whose row `i` equals this table's row `indices[i]`.
    /// Fresh storage is allocated for every column.
    pub fn permute_rows(&self, indices: &[u32]) -> Result<DataTable> {
        let rows = self.num_rows();
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= rows) {
            return Err(Error::BadPermutation { index: bad, rows });
        }
        Ok(DataTable {
            columns: self.columns.iter().map(|c| c.permuted(indices)).collect(),
        })
    }
}

/// Combine tables into one: columns are unioned by (name, type), rows are
/// concatenated, and columns missing from an input are zero-filled over its
/// row range.
pub fn combine(tables: Vec<DataTable>) -> Result<Option<DataTable>> {
    if tables.is_empty() {
        return Ok(None);
    }
    if tables.len() == 1 {
        return Ok(tables.into_iter().next());
    }

    let mut layout: Vec<(String, crate::ColumnType)> = Vec::new();
    for table in &tables {
        for column in table.columns() {
            let key = (column.name.clone(), column.ty());
            if !layout.contains(&key) {
                layout.push(key);
            }
        }
    }

    let total_rows: usize = tables.iter().map(DataTable::num_rows).sum();

    let mut result = Vec::with_capacity(layout.len());
    for (name, ty) in &layout {
        result.push(Column {
            name: name.clone(),
            data: ColumnData::zeros(*ty, total_rows),
        });
    }

    let mut offset = 0usize;
    for table in &tables {
        for column in table.columns() {
            let slot = layout
                .iter()
                .position(|(n, t)| n == &column.name && *t == column.ty())
                .expect("layout covers every input column");
            column.copy_into(&mut result[slot].data, offset);
        }
        offset += table.num_rows();
    }

    Ok(Some(DataTable { columns: result }))
}
