//! Wire-level constants and small value types shared by the reader and
//! builder: field numbers, the geometry/value/structured-value tag enums,
//! and the index wrapper used by every dedup table.

/// Field numbers inside a `Tile` message.
pub(crate) mod pbf_tile {
    pub const LAYERS: u32 = 3;
}

/// Field numbers inside a `Layer` message.
pub(crate) mod pbf_layer {
    pub const NAME: u32 = 1;
    pub const FEATURES: u32 = 2;
    pub const KEYS: u32 = 3;
    pub const VALUES: u32 = 4;
    pub const EXTENT: u32 = 5;
    pub const STRING_VALUES: u32 = 6;
    pub const DOUBLE_VALUES: u32 = 7;
    pub const FLOAT_VALUES: u32 = 8;
    pub const INT_VALUES: u32 = 9;
    pub const ELEVATION_SCALING: u32 = 10;
    pub const ATTRIBUTE_SCALINGS: u32 = 11;
    pub const TILE_X: u32 = 12;
    pub const TILE_Y: u32 = 13;
    pub const TILE_ZOOM: u32 = 14;
    pub const VERSION: u32 = 15;
}

/// Field numbers inside a `Feature` message.
pub(crate) mod pbf_feature {
    pub const ID: u32 = 1;
    pub const TAGS: u32 = 2;
    pub const TYPE: u32 = 3;
    pub const GEOMETRY: u32 = 4;
    pub const STRING_ID: u32 = 5;
    pub const ATTRIBUTES: u32 = 6;
    pub const ELEVATIONS: u32 = 7;
    pub const GEOMETRIC_ATTRIBUTES: u32 = 8;
    pub const SPLINE_KNOTS: u32 = 9;
    pub const SPLINE_DEGREE: u32 = 10;
}

/// Field numbers inside a `Value` message.
pub(crate) mod pbf_value {
    pub const STRING_VALUE: u32 = 1;
    pub const FLOAT_VALUE: u32 = 2;
    pub const DOUBLE_VALUE: u32 = 3;
    pub const INT_VALUE: u32 = 4;
    pub const UINT_VALUE: u32 = 5;
    pub const SINT_VALUE: u32 = 6;
    pub const BOOL_VALUE: u32 = 7;
}

/// Field numbers inside a `Scaling` message.
pub(crate) mod pbf_scaling {
    pub const OFFSET: u32 = 1;
    pub const MULTIPLIER: u32 = 2;
    pub const BASE: u32 = 3;
}

/// Geometry command ids used in the packed command/parameter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandId {
    MoveTo,
    LineTo,
    ClosePath,
}

impl CommandId {
    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(CommandId::MoveTo),
            2 => Some(CommandId::LineTo),
            7 => Some(CommandId::ClosePath),
            _ => None,
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            CommandId::MoveTo => 1,
            CommandId::LineTo => 2,
            CommandId::ClosePath => 7,
        }
    }
}

pub(crate) const MAX_COMMAND_COUNT: u32 = (1 << 29) - 1;

#[inline]
pub(crate) fn command_integer(id: CommandId, count: u32) -> u32 {
    (id.raw() & 0x7) | (count << 3)
}

#[inline]
pub(crate) fn split_command_integer(raw: u32) -> (u32, u32) {
    (raw & 0x7, raw >> 3)
}

/// Geometry type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomType {
    Unknown,
    Point,
    LineString,
    Polygon,
    /// v3 only.
    Spline,
}

impl GeomType {
    pub(crate) fn from_raw(raw: u32) -> Self {
        match raw {
            1 => GeomType::Point,
            2 => GeomType::LineString,
            3 => GeomType::Polygon,
            4 => GeomType::Spline,
            _ => GeomType::Unknown,
        }
    }

    pub(crate) fn raw(self) -> u32 {
        match self {
            GeomType::Unknown => 0,
            GeomType::Point => 1,
            GeomType::LineString => 2,
            GeomType::Polygon => 3,
            GeomType::Spline => 4,
        }
    }
}

/// Classification of a polygon ring by the sign of its shoelace sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingType {
    Outer,
    Inner,
    Invalid,
}

/// A stable index into one of a layer's dedup tables.
///
/// `u32::MAX` is reserved as the "not set" sentinel so an `IndexValue` can
/// be stored inline without an `Option` wrapper in hot builder code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexValue(u32);

impl IndexValue {
    pub const INVALID: IndexValue = IndexValue(u32::MAX);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn valid(self) -> bool {
        self.0 != u32::MAX
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// One row of a layer's v1/v2 value table: exactly one of these is set,
/// selected by the inner field tag that was present on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue<'a> {
    String(&'a str),
    Float(f32),
    Double(f64),
    Int(i64),
    Uint(u64),
    Sint(i64),
    Bool(bool),
}

impl PropertyValue<'_> {
    pub fn as_string(&self) -> crate::error::Result<&str> {
        match self {
            PropertyValue::String(v) => Ok(v),
            _ => Err(crate::error::MvtError::type_mismatch(
                "property value is not a string",
            )),
        }
    }

    pub fn as_f64(&self) -> crate::error::Result<f64> {
        match *self {
            PropertyValue::Double(v) => Ok(v),
            PropertyValue::Float(v) => Ok(f64::from(v)),
            _ => Err(crate::error::MvtError::type_mismatch(
                "property value is not numeric",
            )),
        }
    }

    pub fn as_bool(&self) -> crate::error::Result<bool> {
        match *self {
            PropertyValue::Bool(v) => Ok(v),
            _ => Err(crate::error::MvtError::type_mismatch(
                "property value is not a bool",
            )),
        }
    }
}

/// The v3 structured-value type tag, stored in the low nibble of each
/// 64-bit attribute word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StructuredValueType {
    String = 0,
    Float = 1,
    Double = 2,
    Uint = 3,
    Sint = 4,
    InlineUint = 5,
    InlineSint = 6,
    BoolOrNull = 7,
    List = 8,
    Map = 9,
    NumberList = 10,
}

impl StructuredValueType {
    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::String),
            1 => Some(Self::Float),
            2 => Some(Self::Double),
            3 => Some(Self::Uint),
            4 => Some(Self::Sint),
            5 => Some(Self::InlineUint),
            6 => Some(Self::InlineSint),
            7 => Some(Self::BoolOrNull),
            8 => Some(Self::List),
            9 => Some(Self::Map),
            10 => Some(Self::NumberList),
            _ => None,
        }
    }

    pub(crate) fn is_reserved(raw: u64) -> bool {
        (11..=15).contains(&raw)
    }
}

#[inline]
pub(crate) fn create_structured_value(tag: StructuredValueType, param: u64) -> u64 {
    (tag as u64) | (param << 4)
}

#[inline]
pub(crate) fn split_structured_value(word: u64) -> (u64, u64) {
    (word & 0xf, word >> 4)
}

/// Marker for an explicit JSON-null-like value in the v3 attribute model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullType;
