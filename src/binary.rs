//! Compact framed binary encoding.
//!
//! Layout: magic(4) + version(2) + width(4) + height(4) + length(4),
//! then the palette (count(2), then id(2) + text_len(2) + UTF-8 text per
//! entry), then the body (count(4), then x(4) + y(4) + z(4) + palette id(2)
//! per cell). All multi-byte integers are big-endian.
//!
//! Auxiliary data is not part of this format: a binary round-trip keeps the
//! cell set and dimensions but loses the side channel. Use the structured
//! JSON encoding when auxiliary data must survive.

use crate::schematic::{Coordinate, Schematic};
use log::warn;
use std::collections::HashMap;
use std::fmt;

pub const COMPACT_MAGIC: u32 = 0x1234_5678;
pub const COMPACT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryCodecError {
    BadMagic { found: u32 },
    UnsupportedVersion { version: u16 },
    Truncated,
    NegativeCellCount { count: i32 },
    CellCountOverflow { cells: usize },
    PaletteOverflow { distinct: usize },
    DescriptorTooLong { bytes: usize },
    InvalidDescriptorText { id: u16 },
    UnknownPaletteId { id: u16 },
}

impl fmt::Display for BinaryCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => {
                write!(f, "bad magic {found:#010x}, expected {COMPACT_MAGIC:#010x}")
            }
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported format version {version}")
            }
            Self::Truncated => write!(f, "byte stream ends mid-field"),
            Self::NegativeCellCount { count } => {
                write!(f, "negative cell count {count}")
            }
            Self::CellCountOverflow { cells } => {
                write!(f, "{cells} cells exceed the signed 32-bit body count")
            }
            Self::PaletteOverflow { distinct } => {
                write!(f, "{distinct} palette entries exceed the 2-byte count field")
            }
            Self::DescriptorTooLong { bytes } => {
                write!(f, "descriptor text of {bytes} bytes exceeds the 2-byte length field")
            }
            Self::InvalidDescriptorText { id } => {
                write!(f, "palette entry {id} is not valid UTF-8")
            }
            Self::UnknownPaletteId { id } => {
                write!(f, "body references palette id {id} absent from the palette")
            }
        }
    }
}

impl std::error::Error for BinaryCodecError {}

/// Policy for body entries whose palette id is absent from the palette.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownPaletteId {
    /// Drop the affected cell and count it (the historical behavior).
    #[default]
    Drop,
    /// Fail the whole decode with [`BinaryCodecError::UnknownPaletteId`].
    Fail,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    pub unknown_palette_id: UnknownPaletteId,
}

/// What a lenient decode left out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub dropped_cells: usize,
}

/// Encode a schematic to the compact framed format.
///
/// The palette is emitted in id order and the body sorted by coordinate, so
/// encoding the same schematic twice yields byte-identical output.
pub fn encode_compact<C>(schematic: &Schematic<C>) -> Result<Vec<u8>, BinaryCodecError> {
    let palette = schematic.palette();
    if palette.len() > usize::from(u16::MAX) {
        return Err(BinaryCodecError::PaletteOverflow {
            distinct: palette.len(),
        });
    }
    let cell_count = i32::try_from(schematic.compact_cells().len()).map_err(|_| {
        BinaryCodecError::CellCountOverflow {
            cells: schematic.compact_cells().len(),
        }
    })?;

    let mut out = Vec::new();
    out.extend_from_slice(&COMPACT_MAGIC.to_be_bytes());
    out.extend_from_slice(&COMPACT_FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&schematic.width().to_be_bytes());
    out.extend_from_slice(&schematic.height().to_be_bytes());
    out.extend_from_slice(&schematic.length().to_be_bytes());

    out.extend_from_slice(&(palette.len() as u16).to_be_bytes());
    for (id, descriptor) in palette.iter().enumerate() {
        let text = descriptor.as_bytes();
        let text_len = u16::try_from(text.len()).map_err(|_| {
            BinaryCodecError::DescriptorTooLong { bytes: text.len() }
        })?;
        out.extend_from_slice(&(id as u16).to_be_bytes());
        out.extend_from_slice(&text_len.to_be_bytes());
        out.extend_from_slice(text);
    }

    let mut body: Vec<(Coordinate, u16)> = schematic
        .compact_cells()
        .iter()
        .map(|(coord, id)| (*coord, *id))
        .collect();
    body.sort_unstable_by_key(|(coord, _)| *coord);

    out.extend_from_slice(&cell_count.to_be_bytes());
    for (coord, id) in body {
        out.extend_from_slice(&coord.x.to_be_bytes());
        out.extend_from_slice(&coord.y.to_be_bytes());
        out.extend_from_slice(&coord.z.to_be_bytes());
        out.extend_from_slice(&id.to_be_bytes());
    }
    Ok(out)
}

/// Decode with the default lenient policy; dropped cells are logged.
pub fn decode_compact<C>(bytes: &[u8]) -> Result<Schematic<C>, BinaryCodecError> {
    let (schematic, report) = decode_compact_with(bytes, DecodeOptions::default())?;
    if report.dropped_cells > 0 {
        warn!(
            "dropped {} cells referencing palette ids absent from the palette",
            report.dropped_cells
        );
    }
    Ok(schematic)
}

/// Decode a compact byte stream, reporting dropped cells.
///
/// The schematic is rebuilt through normal construction: its palette is
/// rederived from the decoded cell set, not reused id-for-id from the file.
pub fn decode_compact_with<C>(
    bytes: &[u8],
    options: DecodeOptions,
) -> Result<(Schematic<C>, DecodeReport), BinaryCodecError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.read_u32()?;
    if magic != COMPACT_MAGIC {
        return Err(BinaryCodecError::BadMagic { found: magic });
    }
    let version = reader.read_u16()?;
    if version != COMPACT_FORMAT_VERSION {
        return Err(BinaryCodecError::UnsupportedVersion { version });
    }

    let width = reader.read_i32()?;
    let height = reader.read_i32()?;
    let length = reader.read_i32()?;

    let palette_count = reader.read_u16()?;
    let mut palette = HashMap::<u16, String>::with_capacity(usize::from(palette_count));
    for _ in 0..palette_count {
        let id = reader.read_u16()?;
        let text_len = reader.read_u16()?;
        let text = reader.take(usize::from(text_len))?;
        let descriptor = String::from_utf8(text.to_vec())
            .map_err(|_| BinaryCodecError::InvalidDescriptorText { id })?;
        palette.insert(id, descriptor);
    }

    let cell_count = reader.read_i32()?;
    if cell_count < 0 {
        return Err(BinaryCodecError::NegativeCellCount { count: cell_count });
    }

    let mut cells = HashMap::<Coordinate, String>::with_capacity(cell_count as usize);
    let mut report = DecodeReport::default();
    for _ in 0..cell_count {
        let x = reader.read_i32()?;
        let y = reader.read_i32()?;
        let z = reader.read_i32()?;
        let id = reader.read_u16()?;
        match palette.get(&id) {
            Some(descriptor) => {
                cells.insert(Coordinate::new(x, y, z), descriptor.clone());
            }
            None => match options.unknown_palette_id {
                UnknownPaletteId::Drop => report.dropped_cells += 1,
                UnknownPaletteId::Fail => {
                    return Err(BinaryCodecError::UnknownPaletteId { id });
                }
            },
        }
    }

    let schematic = Schematic::new(cells, width, height, length)
        .map_err(|overflow| BinaryCodecError::PaletteOverflow {
            distinct: overflow.distinct,
        })?;
    Ok((schematic, report))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BinaryCodecError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(BinaryCodecError::Truncated)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, BinaryCodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, BinaryCodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, BinaryCodecError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schematic() -> Schematic {
        let mut cells = HashMap::new();
        cells.insert(Coordinate::new(0, 0, 0), "A".to_string());
        cells.insert(Coordinate::new(1, 0, 0), "B".to_string());
        cells.insert(Coordinate::new(0, 1, 0), "A".to_string());
        Schematic::new(cells, 2, 2, 1).expect("build")
    }

    #[test]
    fn roundtrip_preserves_cells_and_dimensions() {
        let schematic = sample_schematic();
        let bytes = encode_compact(&schematic).expect("encode");

        let decoded: Schematic = decode_compact(&bytes).expect("decode");
        assert_eq!(decoded.dimensions(), (2, 2, 1));
        assert_eq!(decoded.cells(), schematic.cells());
        assert_eq!(decoded.palette().len(), 2);
    }

    #[test]
    fn roundtrip_of_the_empty_schematic() {
        let schematic: Schematic =
            Schematic::new(HashMap::new(), 0, 0, 0).expect("build");
        let bytes = encode_compact(&schematic).expect("encode");

        let decoded: Schematic = decode_compact(&bytes).expect("decode");
        assert!(decoded.is_empty());
        assert!(decoded.palette().is_empty());
        assert_eq!(decoded.dimensions(), (0, 0, 0));
    }

    #[test]
    fn encode_is_deterministic() {
        let first = encode_compact(&sample_schematic()).expect("encode");
        let second = encode_compact(&sample_schematic()).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn corrupted_magic_is_a_format_error() {
        let mut bytes = encode_compact(&sample_schematic()).expect("encode");
        bytes[0] ^= 0xFF;
        let err = decode_compact::<()>(&bytes).expect_err("decode must fail");
        assert!(matches!(err, BinaryCodecError::BadMagic { .. }));
    }

    #[test]
    fn unknown_version_is_a_format_error() {
        let mut bytes = encode_compact(&sample_schematic()).expect("encode");
        bytes[4..6].copy_from_slice(&2u16.to_be_bytes());
        let err = decode_compact::<()>(&bytes).expect_err("decode must fail");
        assert_eq!(err, BinaryCodecError::UnsupportedVersion { version: 2 });
    }

    #[test]
    fn truncated_stream_is_a_format_error() {
        let bytes = encode_compact(&sample_schematic()).expect("encode");
        let err =
            decode_compact::<()>(&bytes[..bytes.len() - 3]).expect_err("decode must fail");
        assert_eq!(err, BinaryCodecError::Truncated);
    }

    #[test]
    fn unknown_palette_id_drops_or_fails_by_policy() {
        // The last two bytes of the stream are the final body entry's
        // palette id; point it at an id the palette does not define.
        let mut bytes = encode_compact(&sample_schematic()).expect("encode");
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&7u16.to_be_bytes());

        let (lenient, report) =
            decode_compact_with::<()>(&bytes, DecodeOptions::default()).expect("decode");
        assert_eq!(report.dropped_cells, 1);
        assert_eq!(lenient.cells().len(), 2);

        let strict = DecodeOptions {
            unknown_palette_id: UnknownPaletteId::Fail,
        };
        let err = decode_compact_with::<()>(&bytes, strict).expect_err("strict must fail");
        assert_eq!(err, BinaryCodecError::UnknownPaletteId { id: 7 });
    }

    #[test]
    fn binary_roundtrip_does_not_carry_aux_data() {
        let mut cells = HashMap::new();
        cells.insert(Coordinate::new(0, 0, 0), "A".to_string());
        let mut aux = HashMap::new();
        aux.insert(Coordinate::new(0, 0, 0), "nbt".to_string());
        let schematic: Schematic =
            Schematic::with_aux_data(cells, aux, 1, 1, 1).expect("build");

        let bytes = encode_compact(&schematic).expect("encode");
        let decoded: Schematic = decode_compact(&bytes).expect("decode");
        assert!(!decoded.has_aux_data());
        assert_eq!(decoded.cells().len(), 1);
    }
}
