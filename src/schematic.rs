use log::warn;
use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::fmt;

/// Relative block offset from a capture/paste origin.
///
/// Equality and hashing are structural; the derived `Ord` (x, then y, then z)
/// gives codecs a deterministic iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Narrow a fractional position to its block coordinate by flooring each
    /// component. `-1.5` lands in block `-2`, matching block-grid semantics.
    pub fn from_block_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: x.floor() as i32,
            y: y.floor() as i32,
            z: z.floor() as i32,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Host boundary for interpreting descriptor strings.
///
/// The library never looks inside a descriptor; a host that wants decoded
/// cell objects supplies this codec to [`Schematic::decoded_cells`].
pub trait DescriptorCodec {
    type Cell;
    type Error: std::error::Error;

    fn decode_descriptor(&self, text: &str) -> Result<Self::Cell, Self::Error>;
    fn encode_descriptor(&self, cell: &Self::Cell) -> String;
}

/// Passthrough codec: the decoded cell is the descriptor text itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpaqueDescriptorCodec;

impl DescriptorCodec for OpaqueDescriptorCodec {
    type Cell = String;
    type Error = Infallible;

    fn decode_descriptor(&self, text: &str) -> Result<String, Infallible> {
        Ok(text.to_string())
    }

    fn encode_descriptor(&self, cell: &String) -> String {
        cell.clone()
    }
}

/// More distinct descriptors than a 2-byte palette id can address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteOverflowError {
    pub distinct: usize,
}

impl fmt::Display for PaletteOverflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} distinct descriptors exceed the u16 palette id space",
            self.distinct
        )
    }
}

impl std::error::Error for PaletteOverflowError {}

/// A captured voxel region: sparse coordinate -> descriptor mapping with a
/// bounding box, an optional per-coordinate auxiliary side channel, and a
/// deduplicated palette derived at construction.
///
/// `C` is the host-level decoded cell type produced by a [`DescriptorCodec`];
/// hosts that never materialize can leave it at the default `()`.
///
/// Instances are immutable after construction. The palette and compact form
/// are derived eagerly; the decoded-cell cache is derived lazily on first
/// access and memoized for the instance's lifetime.
pub struct Schematic<C = ()> {
    cells: HashMap<Coordinate, String>,
    aux_data: HashMap<Coordinate, String>,
    width: i32,
    height: i32,
    length: i32,
    palette: Vec<String>,
    compact_cells: HashMap<Coordinate, u16>,
    decoded: OnceCell<HashMap<Coordinate, C>>,
}

impl<C> Schematic<C> {
    /// Build a schematic from a fully-populated cell map. An empty map is the
    /// valid degenerate schematic. Dimensions are the caller-supplied extents
    /// of the captured bounding box and are not re-derived from the cells.
    pub fn new(
        cells: HashMap<Coordinate, String>,
        width: i32,
        height: i32,
        length: i32,
    ) -> Result<Self, PaletteOverflowError> {
        Self::with_aux_data(cells, HashMap::new(), width, height, length)
    }

    /// As [`Schematic::new`], with per-coordinate auxiliary data. Auxiliary
    /// entries whose coordinate has no base cell are meaningless and are
    /// dropped with a warning.
    pub fn with_aux_data(
        cells: HashMap<Coordinate, String>,
        mut aux_data: HashMap<Coordinate, String>,
        width: i32,
        height: i32,
        length: i32,
    ) -> Result<Self, PaletteOverflowError> {
        let before = aux_data.len();
        aux_data.retain(|coord, _| cells.contains_key(coord));
        let dropped = before - aux_data.len();
        if dropped > 0 {
            warn!("dropped {dropped} auxiliary entries without a base cell");
        }

        let (palette, compact_cells) = build_palette(&cells)?;
        Ok(Self {
            cells,
            aux_data,
            width,
            height,
            length,
            palette,
            compact_cells,
            decoded: OnceCell::new(),
        })
    }

    /// Raw coordinate -> descriptor mapping (authoritative).
    pub fn cells(&self) -> &HashMap<Coordinate, String> {
        &self.cells
    }

    /// Auxiliary side-channel entries; always a subset of the cell coordinates.
    pub fn aux_data(&self) -> &HashMap<Coordinate, String> {
        &self.aux_data
    }

    pub fn has_aux_data(&self) -> bool {
        !self.aux_data.is_empty()
    }

    /// Distinct descriptors, indexed by palette id. Sorted by descriptor text
    /// so ids are deterministic for a given cell set, but they remain
    /// instance-local: never compare ids across schematics.
    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// Coordinate -> palette id restatement of [`Schematic::cells`].
    pub fn compact_cells(&self) -> &HashMap<Coordinate, u16> {
        &self.compact_cells
    }

    /// Palette id for a descriptor, if it occurs in this schematic.
    pub fn descriptor_id(&self, descriptor: &str) -> Option<u16> {
        self.palette
            .binary_search_by(|entry| entry.as_str().cmp(descriptor))
            .ok()
            .map(|idx| idx as u16)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    /// Bounding-box extents as (width, height, length).
    pub fn dimensions(&self) -> (i32, i32, i32) {
        (self.width, self.height, self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Decode every cell through the host codec, caching the result.
    ///
    /// The first successful call decodes all descriptors and publishes the
    /// map; every later call returns the same reference without decoding. A
    /// decode failure propagates and publishes nothing, so a retry starts
    /// from an empty cache.
    pub fn decoded_cells<D>(&self, codec: &D) -> Result<&HashMap<Coordinate, C>, D::Error>
    where
        D: DescriptorCodec<Cell = C>,
    {
        if let Some(decoded) = self.decoded.get() {
            return Ok(decoded);
        }
        let mut out = HashMap::with_capacity(self.cells.len());
        for (coord, text) in &self.cells {
            out.insert(*coord, codec.decode_descriptor(text)?);
        }
        Ok(self.decoded.get_or_init(|| out))
    }

    /// True once a [`Schematic::decoded_cells`] call has completed.
    pub fn is_materialized(&self) -> bool {
        self.decoded.get().is_some()
    }
}

impl<C> fmt::Debug for Schematic<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schematic")
            .field("cells", &self.cells.len())
            .field("aux_data", &self.aux_data.len())
            .field("palette", &self.palette.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("length", &self.length)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

/// Intern the distinct descriptors of `cells` and restate every cell as a
/// palette id. Ids are assigned in descriptor sort order starting at 0, so
/// the palette for a given cell set is stable across runs.
fn build_palette(
    cells: &HashMap<Coordinate, String>,
) -> Result<(Vec<String>, HashMap<Coordinate, u16>), PaletteOverflowError> {
    let distinct: BTreeSet<&str> = cells.values().map(String::as_str).collect();
    if distinct.len() > usize::from(u16::MAX) + 1 {
        return Err(PaletteOverflowError {
            distinct: distinct.len(),
        });
    }

    let mut palette = Vec::with_capacity(distinct.len());
    let mut lookup = HashMap::<&str, u16>::with_capacity(distinct.len());
    for (idx, descriptor) in distinct.into_iter().enumerate() {
        lookup.insert(descriptor, idx as u16);
        palette.push(descriptor.to_string());
    }

    let mut compact = HashMap::with_capacity(cells.len());
    for (coord, descriptor) in cells {
        // Every cell descriptor was interned above.
        if let Some(id) = lookup.get(descriptor.as_str()) {
            compact.insert(*coord, *id);
        }
    }
    Ok((palette, compact))
}
