//! CSV export: a header of column names, one row per splat, values printed
//! in their native column type.

use std::io::Write;
use std::path::Path;

use gsplat_core::DataTable;

use crate::Result;

pub fn write_csv(path: &Path, table: &DataTable) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    writeln!(writer, "{}", table.column_names().join(","))?;

    let mut line = String::new();
    for row in 0..table.num_rows() {
        line.clear();
        for (c, column) in table.columns().iter().enumerate() {
            if c > 0 {
                line.push(',');
            }
            line.push_str(&column.value_string(row));
        }
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}
