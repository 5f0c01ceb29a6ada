//! Binary little-endian PLY reading and writing.
//!
//! The header is parsed byte-at-a-time up to a 128 KiB cap; element bodies
//! are streamed in 1024-row chunks. Property order maps one-to-one onto
//! table column order.

use std::io::{Read, Write};
use std::path::Path;

use gsplat_core::{Column, ColumnType, DataTable};

use crate::{IoError, Result};

const MAGIC: &[u8] = b"ply\n";
const END_HEADER: &[u8] = b"\nend_header\n";
const MAX_HEADER_SIZE: usize = 128 * 1024;
const ROW_CHUNK: usize = 1024;

/// One element's rows, decoded into a table.
pub struct PlyElementData {
    pub name: String,
    pub table: DataTable,
}

/// A full PLY file: comments plus one table per element.
pub struct PlyData {
    pub comments: Vec<String>,
    pub elements: Vec<PlyElementData>,
}

impl PlyData {
    pub fn element(&self, name: &str) -> Option<&PlyElementData> {
        self.elements.iter().find(|e| e.name == name)
    }
}

fn ply_type(name: &str) -> Result<ColumnType> {
    Ok(match name {
        "char" => ColumnType::I8,
        "uchar" => ColumnType::U8,
        "short" => ColumnType::I16,
        "ushort" => ColumnType::U16,
        "int" => ColumnType::I32,
        "uint" => ColumnType::U32,
        "float" | "float32" => ColumnType::F32,
        "double" | "float64" => ColumnType::F64,
        other => {
            return Err(IoError::Parse(format!("unsupported PLY data type: {other}")));
        }
    })
}

fn ply_type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::I8 => "char",
        ColumnType::U8 => "uchar",
        ColumnType::I16 => "short",
        ColumnType::U16 => "ushort",
        ColumnType::I32 => "int",
        ColumnType::U32 => "uint",
        ColumnType::F32 => "float",
        ColumnType::F64 => "double",
    }
}

struct ElementHeader {
    name: String,
    count: usize,
    properties: Vec<(String, ColumnType)>,
}

struct Header {
    comments: Vec<String>,
    elements: Vec<ElementHeader>,
}

fn parse_header(text: &str) -> Result<Header> {
    let mut header = Header {
        comments: Vec::new(),
        elements: Vec::new(),
    };

    // the first line is the magic
    for line in text.lines().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("format") | Some("end_header") | Some("ply") => {}
            Some("comment") => header
                .comments
                .push(line.strip_prefix("comment ").unwrap_or("").to_string()),
            Some("element") => {
                let name = words
                    .next()
                    .ok_or_else(|| IoError::Parse("element without a name".into()))?;
                let count: usize = words
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| IoError::Parse(format!("bad count for element '{name}'")))?;
                header.elements.push(ElementHeader {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = header
                    .elements
                    .last_mut()
                    .ok_or_else(|| IoError::Parse("property outside element".into()))?;
                let ty = words
                    .next()
                    .ok_or_else(|| IoError::Parse("property without a type".into()))?;
                if ty == "list" {
                    return Err(IoError::UnsupportedFormat(
                        "PLY list properties are not supported".into(),
                    ));
                }
                let name = words
                    .next()
                    .ok_or_else(|| IoError::Parse("property without a name".into()))?;
                element.properties.push((name.to_string(), ply_type(ty)?));
            }
            Some(other) => {
                return Err(IoError::Parse(format!(
                    "unrecognized header value '{other}'"
                )));
            }
            None => {}
        }
    }
    Ok(header)
}

/// Read a binary little-endian PLY file.
pub fn read_ply<R: Read>(mut reader: R) -> Result<PlyData> {
    let mut header_buf = vec![0u8; MAGIC.len()];
    reader.read_exact(&mut header_buf)?;
    if header_buf != MAGIC {
        return Err(IoError::Parse("invalid file header: missing 'ply'".into()));
    }

    // scan forward one byte at a time until the end_header marker
    loop {
        if header_buf.len() >= MAX_HEADER_SIZE {
            return Err(IoError::Parse(
                "PLY header too large or missing 'end_header'".into(),
            ));
        }
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).map_err(|_| {
            IoError::Parse("unexpected end of file inside PLY header".into())
        })?;
        header_buf.push(byte[0]);
        if header_buf.ends_with(END_HEADER) {
            break;
        }
    }

    let header_text = String::from_utf8_lossy(&header_buf).into_owned();
    let header = parse_header(&header_text)?;

    let mut elements = Vec::with_capacity(header.elements.len());
    for element in &header.elements {
        let mut columns: Vec<Column> = element
            .properties
            .iter()
            .map(|(name, ty)| Column::zeros(name.clone(), *ty, element.count))
            .collect();
        let sizes: Vec<usize> = columns.iter().map(Column::element_size).collect();
        let row_size: usize = sizes.iter().sum();

        let mut chunk = vec![0u8; row_size * ROW_CHUNK];
        let mut row = 0usize;
        while row < element.count {
            let rows = ROW_CHUNK.min(element.count - row);
            let bytes = &mut chunk[..rows * row_size];
            reader.read_exact(bytes).map_err(|_| {
                IoError::Parse(format!("truncated data for element '{}'", element.name))
            })?;

            let mut offset = 0usize;
            for r in 0..rows {
                for (column, size) in columns.iter_mut().zip(&sizes) {
                    column.read_le(row + r, &bytes[offset..offset + size]);
                    offset += size;
                }
            }
            row += rows;
        }

        elements.push(PlyElementData {
            name: element.name.clone(),
            table: DataTable::new(columns)?,
        });
    }

    Ok(PlyData {
        comments: header.comments,
        elements,
    })
}

/// Read a PLY file and return the canonical splat table, decompressing the
/// chunked variant when present.
pub fn read_ply_splats(path: &Path) -> Result<DataTable> {
    let file = std::fs::File::open(path)?;
    let ply = read_ply(std::io::BufReader::new(file))?;

    if crate::compressed_ply::is_compressed_ply(&ply) {
        return crate::compressed_ply::decompress_ply(&ply);
    }

    let vertex = ply
        .elements
        .into_iter()
        .find(|e| e.name == "vertex")
        .ok_or_else(|| IoError::InvalidData("PLY file has no vertex element".into()))?;
    Ok(vertex.table)
}

/// Write a binary little-endian PLY file.
pub fn write_ply<W: Write>(mut writer: W, ply: &PlyData) -> Result<()> {
    let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
    for comment in &ply.comments {
        header.push_str("comment ");
        header.push_str(comment);
        header.push('\n');
    }
    for element in &ply.elements {
        header.push_str(&format!(
            "element {} {}\n",
            element.name,
            element.table.num_rows()
        ));
        for column in element.table.columns() {
            header.push_str(&format!(
                "property {} {}\n",
                ply_type_name(column.ty()),
                column.name
            ));
        }
    }
    header.push_str("end_header\n");
    writer.write_all(header.as_bytes())?;

    for element in &ply.elements {
        let table = &element.table;
        let mut buffer = Vec::new();
        let mut row = 0usize;
        while row < table.num_rows() {
            let rows = ROW_CHUNK.min(table.num_rows() - row);
            buffer.clear();
            for r in row..row + rows {
                for column in table.columns() {
                    column.write_le(r, &mut buffer);
                }
            }
            writer.write_all(&buffer)?;
            row += rows;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write the splat table as a single-element PLY at `path`.
pub fn write_ply_file(path: &Path, table: &DataTable) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let ply = PlyData {
        comments: Vec::new(),
        elements: vec![PlyElementData {
            name: "vertex".to_string(),
            table: table.deep_clone(),
        }],
    };
    write_ply(std::io::BufWriter::new(file), &ply)
}
