//! The layer reader.

use std::cell::{Ref, RefCell};

use crate::error::{MvtError, Result};
use crate::pbf::{PbfReader, WireType};
use crate::read::feature::Feature;
use crate::scaling::Scaling;
use crate::types::{pbf_layer, pbf_scaling, pbf_value, PropertyValue};

/// A layer's optional tile address (v3 only): `zoom < 32`, `x, y < 2^zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAddress {
    pub x: u32,
    pub y: u32,
    pub zoom: u32,
}

const DEFAULT_EXTENT: u32 = 4096;
const DEFAULT_VERSION: u32 = 1;

/// A parsed layer, still a view over the tile's buffer.
///
/// Construction parses every top-level field once to extract metadata and
/// validate the layer's invariants; the key/value/string tables are
/// materialized lazily, on first access, and cached for the lifetime of
/// this `Layer`.
pub struct Layer<'a> {
    data: &'a [u8],
    index: usize,
    version: u32,
    name: &'a str,
    extent: u32,
    tile_address: Option<TileAddress>,
    key_count: usize,
    value_count: usize,
    string_count: usize,
    feature_count: usize,
    double_values: Option<&'a [u8]>,
    float_values: Option<&'a [u8]>,
    int_values: Option<&'a [u8]>,
    elevation_scaling: Scaling,
    attribute_scalings: Vec<Scaling>,
    key_cache: RefCell<Option<Vec<&'a str>>>,
    value_cache: RefCell<Option<Vec<PropertyValue<'a>>>>,
    string_cache: RefCell<Option<Vec<&'a str>>>,
}

struct RawFields<'a> {
    name: Option<&'a str>,
    version: Option<u32>,
    extent: Option<u32>,
    tile_x: Option<u32>,
    tile_y: Option<u32>,
    tile_zoom: Option<u32>,
    key_count: usize,
    value_count: usize,
    string_count: usize,
    feature_count: usize,
    double_values: Option<&'a [u8]>,
    float_values: Option<&'a [u8]>,
    int_values: Option<&'a [u8]>,
    elevation_scaling: Option<Scaling>,
    attribute_scalings: Vec<Scaling>,
}

fn parse_scaling(bytes: &[u8], layer: usize) -> Result<Scaling> {
    let mut reader = PbfReader::new(bytes, layer);
    let mut scaling = Scaling::default();
    while let Some((field, wire_type)) = reader.next_field()? {
        match field {
            pbf_scaling::OFFSET => scaling.offset = reader.read_sint64()?,
            pbf_scaling::MULTIPLIER => scaling.multiplier = reader.read_double()?,
            pbf_scaling::BASE => scaling.base = reader.read_double()?,
            _ => reader.skip(wire_type)?,
        }
    }
    Ok(scaling)
}

impl<'a> Layer<'a> {
    /// Parse a layer from its sub-message bytes.
    pub fn new(data: &'a [u8], index: usize) -> Result<Self> {
        let raw = Self::scan(data, index)?;

        let version = raw.version.unwrap_or(DEFAULT_VERSION);
        if !(1..=3).contains(&version) {
            return Err(MvtError::version(index, version));
        }

        let name = raw
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| MvtError::format(index, None, "layer has no name"))?;

        let has_v3_fields = raw.string_count > 0
            || raw.double_values.is_some()
            || raw.float_values.is_some()
            || raw.int_values.is_some()
            || raw.elevation_scaling.is_some()
            || !raw.attribute_scalings.is_empty()
            || raw.tile_x.is_some()
            || raw.tile_y.is_some()
            || raw.tile_zoom.is_some();

        if version < 3 && has_v3_fields {
            return Err(MvtError::format(
                index,
                None,
                "v3-only field present in a version 1/2 layer",
            ));
        }

        let tile_address = match (raw.tile_x, raw.tile_y, raw.tile_zoom) {
            (None, None, None) => None,
            (Some(x), Some(y), Some(zoom)) => {
                if zoom >= 32 || x >= (1u32 << zoom.min(31)) || y >= (1u32 << zoom.min(31)) {
                    return Err(MvtError::format(
                        index,
                        None,
                        "tile address out of range for its zoom level",
                    ));
                }
                Some(TileAddress { x, y, zoom })
            }
            _ => {
                return Err(MvtError::format(
                    index,
                    None,
                    "incomplete tile address: tile_x/tile_y/tile_zoom must all be present or absent",
                ))
            }
        };

        log::trace!("parsed layer {index} ({name}, version {version}, {} features)", raw.feature_count);

        Ok(Layer {
            data,
            index,
            version,
            name,
            extent: raw.extent.unwrap_or(DEFAULT_EXTENT),
            tile_address,
            key_count: raw.key_count,
            value_count: raw.value_count,
            string_count: raw.string_count,
            feature_count: raw.feature_count,
            double_values: raw.double_values,
            float_values: raw.float_values,
            int_values: raw.int_values,
            elevation_scaling: raw.elevation_scaling.unwrap_or_default(),
            attribute_scalings: raw.attribute_scalings,
            key_cache: RefCell::new(None),
            value_cache: RefCell::new(None),
            string_cache: RefCell::new(None),
        })
    }

    fn scan(data: &'a [u8], index: usize) -> Result<RawFields<'a>> {
        let mut raw = RawFields {
            name: None,
            version: None,
            extent: None,
            tile_x: None,
            tile_y: None,
            tile_zoom: None,
            key_count: 0,
            value_count: 0,
            string_count: 0,
            feature_count: 0,
            double_values: None,
            float_values: None,
            int_values: None,
            elevation_scaling: None,
            attribute_scalings: Vec::new(),
        };

        let mut reader = PbfReader::new(data, index);
        while let Some((field, wire_type)) = reader.next_field()? {
            match field {
                pbf_layer::NAME => {
                    if raw.name.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one name field"));
                    }
                    raw.name = Some(reader.read_string()?);
                }
                pbf_layer::VERSION => {
                    if raw.version.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one version field"));
                    }
                    raw.version = Some(reader.read_u32()?);
                }
                pbf_layer::EXTENT => {
                    if raw.extent.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one extent field"));
                    }
                    raw.extent = Some(reader.read_u32()?);
                }
                pbf_layer::TILE_X => raw.tile_x = Some(reader.read_u32()?),
                pbf_layer::TILE_Y => raw.tile_y = Some(reader.read_u32()?),
                pbf_layer::TILE_ZOOM => raw.tile_zoom = Some(reader.read_u32()?),
                pbf_layer::KEYS => {
                    reader.skip(wire_type)?;
                    raw.key_count += 1;
                }
                pbf_layer::VALUES => {
                    reader.skip(wire_type)?;
                    raw.value_count += 1;
                }
                pbf_layer::STRING_VALUES => {
                    reader.skip(wire_type)?;
                    raw.string_count += 1;
                }
                pbf_layer::FEATURES => {
                    reader.skip(wire_type)?;
                    raw.feature_count += 1;
                }
                pbf_layer::DOUBLE_VALUES => {
                    if raw.double_values.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one double table"));
                    }
                    raw.double_values = Some(reader.read_view()?);
                }
                pbf_layer::FLOAT_VALUES => {
                    if raw.float_values.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one float table"));
                    }
                    raw.float_values = Some(reader.read_view()?);
                }
                pbf_layer::INT_VALUES => {
                    if raw.int_values.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one int table"));
                    }
                    raw.int_values = Some(reader.read_view()?);
                }
                pbf_layer::ELEVATION_SCALING => {
                    if raw.elevation_scaling.is_some() {
                        return Err(MvtError::format(index, None, "layer has more than one elevation scaling"));
                    }
                    let bytes = reader.read_view()?;
                    raw.elevation_scaling = Some(parse_scaling(bytes, index)?);
                }
                pbf_layer::ATTRIBUTE_SCALINGS => {
                    let bytes = reader.read_view()?;
                    raw.attribute_scalings.push(parse_scaling(bytes, index)?);
                }
                _ => reader.skip(wire_type)?,
            }
        }

        Ok(raw)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    pub fn tile_address(&self) -> Option<TileAddress> {
        self.tile_address
    }

    pub fn elevation_scaling(&self) -> Scaling {
        self.elevation_scaling
    }

    pub fn attribute_scaling(&self, index: usize) -> Result<Scaling> {
        self.attribute_scalings
            .get(index)
            .copied()
            .ok_or_else(|| MvtError::out_of_range(self.index, index))
    }

    pub fn attribute_scalings(&self) -> &[Scaling] {
        &self.attribute_scalings
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn string_count(&self) -> usize {
        self.string_count
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn ensure_key_table(&self) -> Result<()> {
        if self.key_cache.borrow().is_some() {
            return Ok(());
        }
        log::trace!("layer {}: materializing key table ({} entries)", self.index, self.key_count);
        let mut table = Vec::with_capacity(self.key_count);
        let mut reader = PbfReader::new(self.data, self.index);
        while let Some((field, wire_type)) = reader.next_field()? {
            if field == pbf_layer::KEYS {
                table.push(reader.read_string()?);
            } else {
                reader.skip(wire_type)?;
            }
        }
        *self.key_cache.borrow_mut() = Some(table);
        Ok(())
    }

    fn ensure_string_table(&self) -> Result<()> {
        if self.string_cache.borrow().is_some() {
            return Ok(());
        }
        log::trace!("layer {}: materializing string table ({} entries)", self.index, self.string_count);
        let mut table = Vec::with_capacity(self.string_count);
        let mut reader = PbfReader::new(self.data, self.index);
        while let Some((field, wire_type)) = reader.next_field()? {
            if field == pbf_layer::STRING_VALUES {
                table.push(reader.read_string()?);
            } else {
                reader.skip(wire_type)?;
            }
        }
        *self.string_cache.borrow_mut() = Some(table);
        Ok(())
    }

    fn ensure_value_table(&self) -> Result<()> {
        if self.value_cache.borrow().is_some() {
            return Ok(());
        }
        log::trace!("layer {}: materializing value table ({} entries)", self.index, self.value_count);
        let mut table = Vec::with_capacity(self.value_count);
        let mut reader = PbfReader::new(self.data, self.index);
        while let Some((field, wire_type)) = reader.next_field()? {
            if field == pbf_layer::VALUES {
                let bytes = reader.read_view()?;
                table.push(parse_property_value(bytes, self.index)?);
            } else {
                reader.skip(wire_type)?;
            }
        }
        *self.value_cache.borrow_mut() = Some(table);
        Ok(())
    }

    pub fn key_table(&self) -> Result<Ref<'_, Vec<&'a str>>> {
        self.ensure_key_table()?;
        Ok(Ref::map(self.key_cache.borrow(), |o| o.as_ref().unwrap()))
    }

    pub fn value_table(&self) -> Result<Ref<'_, Vec<PropertyValue<'a>>>> {
        self.ensure_value_table()?;
        Ok(Ref::map(self.value_cache.borrow(), |o| o.as_ref().unwrap()))
    }

    pub fn string_table(&self) -> Result<Ref<'_, Vec<&'a str>>> {
        self.ensure_string_table()?;
        Ok(Ref::map(self.string_cache.borrow(), |o| o.as_ref().unwrap()))
    }

    pub fn key(&self, index: usize) -> Result<&'a str> {
        let table = self.key_table()?;
        table.get(index).copied().ok_or_else(|| MvtError::out_of_range(self.index, index))
    }

    pub fn value(&self, index: usize) -> Result<PropertyValue<'a>> {
        let table = self.value_table()?;
        table.get(index).cloned().ok_or_else(|| MvtError::out_of_range(self.index, index))
    }

    pub fn string(&self, index: usize) -> Result<&'a str> {
        let table = self.string_table()?;
        table.get(index).copied().ok_or_else(|| MvtError::out_of_range(self.index, index))
    }

    pub fn double_value(&self, index: usize) -> Result<f64> {
        let bytes = self.double_values.unwrap_or(&[]);
        let start = index * 8;
        let slice = bytes
            .get(start..start + 8)
            .ok_or_else(|| MvtError::out_of_range(self.index, index))?;
        Ok(f64::from_le_bytes(slice.try_into().unwrap()))
    }

    pub fn float_value(&self, index: usize) -> Result<f32> {
        let bytes = self.float_values.unwrap_or(&[]);
        let start = index * 4;
        let slice = bytes
            .get(start..start + 4)
            .ok_or_else(|| MvtError::out_of_range(self.index, index))?;
        Ok(f32::from_le_bytes(slice.try_into().unwrap()))
    }

    /// Raw `u64` stored in the int table; callers decide whether to
    /// interpret it as an unsigned value or zig-zag decode it, matching
    /// how the v3 attribute tags `uint`/`sint` both index this table.
    pub fn int_value_raw(&self, index: usize) -> Result<u64> {
        let bytes = self.int_values.unwrap_or(&[]);
        let start = index * 8;
        let slice = bytes
            .get(start..start + 8)
            .ok_or_else(|| MvtError::out_of_range(self.index, index))?;
        Ok(u64::from_le_bytes(slice.try_into().unwrap()))
    }

    /// Construct the feature at sub-message index `feature_num`, scanning
    /// from the start of the layer; prefer [`Layer::features`] to iterate
    /// all features in one forward pass.
    pub fn feature_at(&self, feature_num: usize) -> Result<Option<Feature<'a, '_>>> {
        for entry in self.features() {
            let feature = entry?;
            if feature.feature_num() == feature_num {
                return Ok(Some(feature));
            }
        }
        Ok(None)
    }

    /// Forward iterator over this layer's features.
    pub fn features(&self) -> Features<'a, '_> {
        Features { layer: self, reader: PbfReader::new(self.data, self.index), feature_num: 0 }
    }
}

/// Forward iterator over a layer's features, yielded in buffer order.
pub struct Features<'a, 'l> {
    layer: &'l Layer<'a>,
    reader: PbfReader<'a>,
    feature_num: usize,
}

impl<'a, 'l> Iterator for Features<'a, 'l> {
    type Item = Result<Feature<'a, 'l>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next_field() {
                Ok(Some((field, wire_type))) => {
                    if field == pbf_layer::FEATURES && wire_type == WireType::LengthDelimited {
                        let bytes = match self.reader.read_view() {
                            Ok(b) => b,
                            Err(e) => return Some(Err(e)),
                        };
                        let num = self.feature_num;
                        self.feature_num += 1;
                        return Some(Feature::new(self.layer, bytes, num));
                    }
                    if let Err(e) = self.reader.skip(wire_type) {
                        return Some(Err(e));
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn parse_property_value<'a>(bytes: &'a [u8], layer: usize) -> Result<PropertyValue<'a>> {
    let mut reader = PbfReader::new(bytes, layer);
    let mut result = None;
    while let Some((field, wire_type)) = reader.next_field()? {
        if result.is_some() {
            return Err(MvtError::format(layer, None, "value message has more than one inner tag"));
        }
        result = Some(match field {
            pbf_value::STRING_VALUE => PropertyValue::String(reader.read_string()?),
            pbf_value::FLOAT_VALUE => PropertyValue::Float(reader.read_float()?),
            pbf_value::DOUBLE_VALUE => PropertyValue::Double(reader.read_double()?),
            pbf_value::INT_VALUE => PropertyValue::Int(reader.read_varint()? as i64),
            pbf_value::UINT_VALUE => PropertyValue::Uint(reader.read_varint()?),
            pbf_value::SINT_VALUE => PropertyValue::Sint(reader.read_sint64()?),
            pbf_value::BOOL_VALUE => PropertyValue::Bool(reader.read_bool()?),
            _ => {
                reader.skip(wire_type)?;
                continue;
            }
        });
    }
    result.ok_or_else(|| MvtError::format(layer, None, "value message has no inner tag"))
}
