//! Structured-text (JSON) encoding.
//!
//! The emitted shape is always an object with `width`/`height`/`length`, a
//! `blocks` array of `{x, y, z, bd}` records, and an optional
//! `tile_entities` array of `{x, y, z, data}` records. The decoder also
//! accepts the historical shape where `blocks` is an object keyed by
//! `"x,y,z"` strings; both shapes decode to the same cell set. When `blocks`
//! is missing or neither shape, the cell set decodes as empty.

use crate::schematic::{Coordinate, PaletteOverflowError, Schematic};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

const FIELD_BLOCKS: &str = "blocks";
const FIELD_TILE_ENTITIES: &str = "tile_entities";
const FIELD_WIDTH: &str = "width";
const FIELD_HEIGHT: &str = "height";
const FIELD_LENGTH: &str = "length";

#[derive(Debug)]
pub enum JsonCodecError {
    Syntax(serde_json::Error),
    NotAnObject,
    MissingField(&'static str),
    InvalidField { field: &'static str },
    InvalidBlockRecord { index: usize },
    InvalidAuxRecord { index: usize },
    MalformedBlockKey { key: String },
    InvalidLegacyValue { key: String },
    Palette(PaletteOverflowError),
}

impl fmt::Display for JsonCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(error) => write!(f, "malformed json: {error}"),
            Self::NotAnObject => write!(f, "top-level value is not an object"),
            Self::MissingField(field) => write!(f, "missing required field '{field}'"),
            Self::InvalidField { field } => {
                write!(f, "field '{field}' is not a valid integer")
            }
            Self::InvalidBlockRecord { index } => {
                write!(f, "block record {index} is missing numeric x/y/z or text bd")
            }
            Self::InvalidAuxRecord { index } => {
                write!(f, "tile entity record {index} is missing numeric x/y/z or text data")
            }
            Self::MalformedBlockKey { key } => {
                write!(f, "block key '{key}' is not three comma-joined numbers")
            }
            Self::InvalidLegacyValue { key } => {
                write!(f, "block key '{key}' does not map to descriptor text")
            }
            Self::Palette(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for JsonCodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax(error) => Some(error),
            Self::Palette(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for JsonCodecError {
    fn from(error: serde_json::Error) -> Self {
        Self::Syntax(error)
    }
}

#[derive(Serialize)]
struct BlockRecord<'a> {
    x: i32,
    y: i32,
    z: i32,
    bd: &'a str,
}

#[derive(Serialize)]
struct AuxRecord<'a> {
    x: i32,
    y: i32,
    z: i32,
    data: &'a str,
}

#[derive(Serialize)]
struct SchematicDoc<'a> {
    blocks: Vec<BlockRecord<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tile_entities: Vec<AuxRecord<'a>>,
    width: i32,
    height: i32,
    length: i32,
}

/// Serialize to the current array-of-records shape, blocks sorted by
/// coordinate for reproducible output.
pub fn to_json_string<C>(schematic: &Schematic<C>) -> Result<String, JsonCodecError> {
    let mut blocks: Vec<(&Coordinate, &String)> = schematic.cells().iter().collect();
    blocks.sort_unstable_by_key(|(coord, _)| **coord);
    let mut tile_entities: Vec<(&Coordinate, &String)> =
        schematic.aux_data().iter().collect();
    tile_entities.sort_unstable_by_key(|(coord, _)| **coord);

    let doc = SchematicDoc {
        blocks: blocks
            .into_iter()
            .map(|(coord, bd)| BlockRecord {
                x: coord.x,
                y: coord.y,
                z: coord.z,
                bd,
            })
            .collect(),
        tile_entities: tile_entities
            .into_iter()
            .map(|(coord, data)| AuxRecord {
                x: coord.x,
                y: coord.y,
                z: coord.z,
                data,
            })
            .collect(),
        width: schematic.width(),
        height: schematic.height(),
        length: schematic.length(),
    };
    serde_json::to_string(&doc).map_err(JsonCodecError::Syntax)
}

pub fn from_json_str<C>(text: &str) -> Result<Schematic<C>, JsonCodecError> {
    from_json_value(serde_json::from_str(text)?)
}

/// Decode a parsed document, probing the block collection's shape.
pub fn from_json_value<C>(value: Value) -> Result<Schematic<C>, JsonCodecError> {
    let Value::Object(doc) = value else {
        return Err(JsonCodecError::NotAnObject);
    };

    let width = require_int(&doc, FIELD_WIDTH)?;
    let height = require_int(&doc, FIELD_HEIGHT)?;
    let length = require_int(&doc, FIELD_LENGTH)?;

    let cells = match doc.get(FIELD_BLOCKS) {
        Some(Value::Array(records)) => decode_block_records(records)?,
        Some(Value::Object(map)) => decode_legacy_block_map(map)?,
        // Neither shape present: the cell set decodes as empty.
        _ => HashMap::new(),
    };
    let aux_data = match doc.get(FIELD_TILE_ENTITIES) {
        Some(Value::Array(records)) => decode_aux_records(records)?,
        _ => HashMap::new(),
    };

    Schematic::with_aux_data(cells, aux_data, width, height, length)
        .map_err(JsonCodecError::Palette)
}

fn require_int(doc: &Map<String, Value>, field: &'static str) -> Result<i32, JsonCodecError> {
    let value = doc.get(field).ok_or(JsonCodecError::MissingField(field))?;
    let number = value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v.floor() as i64))
        .ok_or(JsonCodecError::InvalidField { field })?;
    i32::try_from(number).map_err(|_| JsonCodecError::InvalidField { field })
}

fn record_coordinate(record: &Map<String, Value>) -> Option<Coordinate> {
    let x = record.get("x")?.as_f64()?;
    let y = record.get("y")?.as_f64()?;
    let z = record.get("z")?.as_f64()?;
    Some(Coordinate::from_block_position(x, y, z))
}

fn decode_block_records(
    records: &[Value],
) -> Result<HashMap<Coordinate, String>, JsonCodecError> {
    let mut cells = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let entry = record
            .as_object()
            .and_then(|obj| Some((record_coordinate(obj)?, obj.get("bd")?.as_str()?)))
            .ok_or(JsonCodecError::InvalidBlockRecord { index })?;
        cells.insert(entry.0, entry.1.to_string());
    }
    Ok(cells)
}

fn decode_legacy_block_map(
    map: &Map<String, Value>,
) -> Result<HashMap<Coordinate, String>, JsonCodecError> {
    let mut cells = HashMap::with_capacity(map.len());
    for (key, value) in map {
        let parts: Vec<&str> = key.split(',').collect();
        if parts.len() != 3 {
            return Err(JsonCodecError::MalformedBlockKey { key: key.clone() });
        }
        let mut axes = [0.0f64; 3];
        for (axis, part) in axes.iter_mut().zip(&parts) {
            *axis = part
                .parse()
                .map_err(|_| JsonCodecError::MalformedBlockKey { key: key.clone() })?;
        }
        let descriptor = value
            .as_str()
            .ok_or_else(|| JsonCodecError::InvalidLegacyValue { key: key.clone() })?;
        cells.insert(
            Coordinate::from_block_position(axes[0], axes[1], axes[2]),
            descriptor.to_string(),
        );
    }
    Ok(cells)
}

fn decode_aux_records(
    records: &[Value],
) -> Result<HashMap<Coordinate, String>, JsonCodecError> {
    let mut aux = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let entry = record
            .as_object()
            .and_then(|obj| Some((record_coordinate(obj)?, obj.get("data")?.as_str()?)))
            .ok_or(JsonCodecError::InvalidAuxRecord { index })?;
        aux.insert(entry.0, entry.1.to_string());
    }
    Ok(aux)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schematic() -> Schematic {
        let mut cells = HashMap::new();
        cells.insert(Coordinate::new(0, 0, 0), "A".to_string());
        cells.insert(Coordinate::new(1, 0, 0), "B".to_string());
        cells.insert(Coordinate::new(0, 1, 0), "A".to_string());
        let mut aux = HashMap::new();
        aux.insert(Coordinate::new(1, 0, 0), "{items:[]}".to_string());
        Schematic::with_aux_data(cells, aux, 2, 2, 1).expect("build")
    }

    #[test]
    fn roundtrip_preserves_cells_aux_and_dimensions() {
        let schematic = sample_schematic();
        let text = to_json_string(&schematic).expect("encode");

        let decoded: Schematic = from_json_str(&text).expect("decode");
        assert_eq!(decoded.cells(), schematic.cells());
        assert_eq!(decoded.aux_data(), schematic.aux_data());
        assert_eq!(decoded.dimensions(), (2, 2, 1));
    }

    #[test]
    fn encode_emits_the_array_shape_only() {
        let text = to_json_string(&sample_schematic()).expect("encode");
        let value: Value = serde_json::from_str(&text).expect("parse");
        assert!(value["blocks"].is_array());

        let empty: Schematic = Schematic::new(HashMap::new(), 0, 0, 0).expect("build");
        let text = to_json_string(&empty).expect("encode");
        let value: Value = serde_json::from_str(&text).expect("parse");
        assert!(value.get("tile_entities").is_none());
    }

    #[test]
    fn legacy_keyed_map_decodes_to_the_same_cells_as_the_array_shape() {
        let current = r#"{
            "blocks": [
                {"x": 1, "y": 2, "z": 3, "bd": "A"},
                {"x": -4, "y": 0, "z": 9, "bd": "B"}
            ],
            "width": 6, "height": 3, "length": 7
        }"#;
        let legacy = r#"{
            "blocks": {"1,2,3": "A", "-4,0,9": "B"},
            "width": 6, "height": 3, "length": 7
        }"#;

        let from_current: Schematic = from_json_str(current).expect("decode current");
        let from_legacy: Schematic = from_json_str(legacy).expect("decode legacy");
        assert_eq!(from_current.cells(), from_legacy.cells());
        assert_eq!(from_current.dimensions(), from_legacy.dimensions());
    }

    #[test]
    fn legacy_single_cell_document() {
        let text = r#"{"blocks": {"1,2,3": "A"}, "width":1, "height":1, "length":1}"#;
        let decoded: Schematic = from_json_str(text).expect("decode");
        assert_eq!(decoded.cells().len(), 1);
        assert_eq!(decoded.cells()[&Coordinate::new(1, 2, 3)], "A");
    }

    #[test]
    fn malformed_legacy_keys_fail_decode() {
        let two_parts = r#"{"blocks": {"1,2": "A"}, "width":1, "height":1, "length":1}"#;
        assert!(matches!(
            from_json_str::<()>(two_parts),
            Err(JsonCodecError::MalformedBlockKey { .. })
        ));

        let non_numeric = r#"{"blocks": {"a,b,c": "A"}, "width":1, "height":1, "length":1}"#;
        assert!(matches!(
            from_json_str::<()>(non_numeric),
            Err(JsonCodecError::MalformedBlockKey { .. })
        ));
    }

    #[test]
    fn missing_dimension_fields_fail_decode() {
        let text = r#"{"blocks": [], "height":1, "length":1}"#;
        assert!(matches!(
            from_json_str::<()>(text),
            Err(JsonCodecError::MissingField("width"))
        ));
    }

    #[test]
    fn unrecognizable_block_collection_decodes_as_empty() {
        for text in [
            r#"{"width":1, "height":1, "length":1}"#,
            r#"{"blocks": null, "width":1, "height":1, "length":1}"#,
            r#"{"blocks": 5, "width":1, "height":1, "length":1}"#,
        ] {
            let decoded: Schematic = from_json_str(text).expect("decode");
            assert!(decoded.is_empty());
            assert_eq!(decoded.dimensions(), (1, 1, 1));
        }
    }

    #[test]
    fn fractional_coordinates_floor_to_block_coordinates() {
        let text = r#"{
            "blocks": [{"x": 1.9, "y": 0.0, "z": -1.5, "bd": "A"}],
            "width":1, "height":1, "length":1
        }"#;
        let decoded: Schematic = from_json_str(text).expect("decode");
        assert_eq!(decoded.cells()[&Coordinate::new(1, 0, -2)], "A");
    }

    #[test]
    fn top_level_non_object_fails_decode() {
        assert!(matches!(
            from_json_str::<()>("[1, 2, 3]"),
            Err(JsonCodecError::NotAnObject)
        ));
        assert!(matches!(
            from_json_str::<()>("not json at all"),
            Err(JsonCodecError::Syntax(_))
        ));
    }

    #[test]
    fn aux_records_without_a_base_cell_are_dropped() {
        let text = r#"{
            "blocks": [{"x": 0, "y": 0, "z": 0, "bd": "A"}],
            "tile_entities": [
                {"x": 0, "y": 0, "z": 0, "data": "kept"},
                {"x": 5, "y": 5, "z": 5, "data": "orphan"}
            ],
            "width":1, "height":1, "length":1
        }"#;
        let decoded: Schematic = from_json_str(text).expect("decode");
        assert_eq!(decoded.aux_data().len(), 1);
        assert_eq!(decoded.aux_data()[&Coordinate::new(0, 0, 0)], "kept");
    }
}
