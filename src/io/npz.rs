//! Minimal NumPy `.npy` / `.npz` support for little-endian `float64` arrays.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{CalibError, Result};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
/// Data starts on a multiple of this many bytes.
const NPY_ALIGN: usize = 64;

/// C-ordered `float64` array.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NpyArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<NpyArray> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CalibError::InvalidInput(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(NpyArray { shape, data })
    }
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({},)", n),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Serializes one array in `.npy` version 1.0 layout.
pub fn encode_npy(array: &NpyArray) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(&array.shape)
    );
    let prefix = NPY_MAGIC.len() + 2 + 2;
    let unpadded = prefix + header.len() + 1;
    let padded = unpadded.div_ceil(NPY_ALIGN) * NPY_ALIGN;
    header.push_str(&" ".repeat(padded - unpadded));
    header.push('\n');

    let mut bytes = Vec::with_capacity(padded + array.data.len() * 8);
    bytes.extend_from_slice(NPY_MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for v in &array.data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header.find(&format!("'{}'", key))? + key.len() + 2;
    let rest = header[start..].trim_start().strip_prefix(':')?.trim_start();
    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..=end])
    } else {
        let end = rest.find([',', '}'])?;
        Some(rest[..end].trim())
    }
}

pub fn decode_npy(name: &str, bytes: &[u8]) -> Result<NpyArray> {
    let err = |reason: &str| CalibError::Npy {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(err("missing magic"));
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(err("unsupported version")),
    };
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| err("truncated header"))?;

    let descr = header_value(header, "descr").ok_or_else(|| err("no descr"))?;
    if descr.trim_matches(|c| c == '\'' || c == '"') != "<f8" {
        return Err(err(&format!("unsupported dtype {}", descr)));
    }
    if header_value(header, "fortran_order") != Some("False") {
        return Err(err("fortran order is not supported"));
    }
    let shape_str = header_value(header, "shape").ok_or_else(|| err("no shape"))?;
    let shape = shape_str
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| err("bad shape")))
        .collect::<Result<Vec<_>>>()?;

    let count: usize = shape.iter().product();
    let payload = bytes
        .get(data_start..data_start + count * 8)
        .ok_or_else(|| err("truncated data"))?;
    let data = payload
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    Ok(NpyArray { shape, data })
}

/// Writes the arrays as an uncompressed `.npz` archive, one `<key>.npy`
/// member per entry, in the given order.
pub fn write_npz<W: Write + Seek>(writer: W, arrays: &[(&str, &NpyArray)]) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    for (key, array) in arrays {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(format!("{}.npy", key), options)?;
        zip.write_all(&encode_npy(array))?;
    }
    Ok(zip.finish()?)
}

pub fn save_npz(path: &Path, arrays: &[(&str, &NpyArray)]) -> Result<()> {
    let file = File::create(path)?;
    write_npz(file, arrays)?;
    Ok(())
}

/// Reads the array stored under `key` (without the `.npy` suffix).
pub fn read_npz_array<R: Read + Seek>(archive: &mut ZipArchive<R>, key: &str) -> Result<NpyArray> {
    let name = format!("{}.npy", key);
    let mut bytes = Vec::new();
    archive.by_name(&name)?.read_to_end(&mut bytes)?;
    decode_npy(&name, &bytes)
}

pub fn open_npz(path: &Path) -> Result<ZipArchive<File>> {
    Ok(ZipArchive::new(File::open(path)?)?)
}
