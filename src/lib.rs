//! Sparse voxel schematic capture and persistence.
//!
//! A [`Schematic`] is a sparse mapping from integer block offsets to opaque,
//! host-defined descriptor strings, with a bounding box and an optional
//! per-coordinate auxiliary side channel. Construction derives a
//! deduplicated descriptor palette eagerly; host-level cell objects are
//! materialized lazily through a [`DescriptorCodec`].
//!
//! Two interchangeable encodings are provided: a compact, palette-indexed
//! binary format ([`binary`]) and a self-describing JSON format ([`json`])
//! whose decoder also accepts the historical `"x,y,z"`-keyed map shape.
//! [`store`] persists either to disk.

pub mod binary;
pub mod json;
pub mod schematic;
pub mod store;

pub use binary::{
    decode_compact, decode_compact_with, encode_compact, BinaryCodecError, DecodeOptions,
    DecodeReport, UnknownPaletteId,
};
pub use json::{from_json_str, from_json_value, to_json_string, JsonCodecError};
pub use schematic::{
    Coordinate, DescriptorCodec, OpaqueDescriptorCodec, PaletteOverflowError, Schematic,
};
pub use store::{
    detect_format, load_compact_file, load_file, load_json_file, save_compact_file,
    save_json_file, FileFormat,
};
