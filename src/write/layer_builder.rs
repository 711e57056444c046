//! Assembles one layer: its dedup tables, scalings, and the already-framed
//! feature bytes committed by its `FeatureBuilder`s.

use crate::error::Result;
use crate::pbf::PbfWriter;
use crate::read::layer::Layer;
use crate::scaling::Scaling;
use crate::types::{pbf_layer, pbf_value, IndexValue, PropertyValue};
use crate::write::dedup::DedupTable;
use crate::write::feature_builder::FeatureBuilder;

/// Builds one layer's wire bytes from scratch, or by copying an existing
/// layer's metadata (name, version, extent, tile address, scalings) while
/// starting with zero features.
pub struct LayerBuilder {
    name: String,
    version: u32,
    extent: u32,
    tile_address: Option<(u32, u32, u32)>,
    keys: DedupTable<String>,
    values: DedupTable<Vec<u8>>,
    strings: DedupTable<String>,
    doubles: DedupTable<u64>,
    floats: DedupTable<u32>,
    ints: DedupTable<u64>,
    elevation_scaling: Scaling,
    attribute_scalings: Vec<Scaling>,
    features: Vec<u8>,
    feature_count: usize,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>, version: u32, extent: u32) -> Self {
        Self {
            name: name.into(),
            version,
            extent,
            tile_address: None,
            keys: DedupTable::new(),
            values: DedupTable::new(),
            strings: DedupTable::new(),
            doubles: DedupTable::new(),
            floats: DedupTable::new(),
            ints: DedupTable::new(),
            elevation_scaling: Scaling::default(),
            attribute_scalings: Vec::new(),
            features: Vec::new(),
            feature_count: 0,
        }
    }

    /// Start a new layer that copies an existing layer's metadata but no
    /// features; used when re-assembling a tile from existing layers.
    pub fn from_layer(layer: &Layer<'_>) -> Self {
        let mut builder = Self::new(layer.name(), layer.version(), layer.extent());
        if let Some(addr) = layer.tile_address() {
            builder.tile_address = Some((addr.x, addr.y, addr.zoom));
        }
        builder.elevation_scaling = layer.elevation_scaling();
        builder.attribute_scalings = layer.attribute_scalings().to_vec();
        builder
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    pub fn set_tile_address(&mut self, x: u32, y: u32, zoom: u32) {
        self.tile_address = Some((x, y, zoom));
    }

    pub fn set_elevation_scaling(&mut self, scaling: Scaling) {
        self.elevation_scaling = scaling;
    }

    /// Register an attribute scaling and return its (append-only, never
    /// deduplicated) index - geometric attributes and number lists refer
    /// to scalings by position, so reusing an index for a different
    /// scaling would silently corrupt every earlier reference.
    pub fn add_attribute_scaling(&mut self, scaling: Scaling) -> IndexValue {
        let idx = self.attribute_scalings.len() as u32;
        self.attribute_scalings.push(scaling);
        IndexValue::new(idx)
    }

    pub fn add_key(&mut self, key: &str) -> IndexValue {
        self.keys.get_or_insert(key.to_string())
    }

    pub fn add_string(&mut self, value: &str) -> IndexValue {
        self.strings.get_or_insert(value.to_string())
    }

    pub fn add_double(&mut self, value: f64) -> IndexValue {
        self.doubles.get_or_insert(value.to_bits())
    }

    pub fn add_float(&mut self, value: f32) -> IndexValue {
        self.floats.get_or_insert(value.to_bits())
    }

    /// `raw` is stored as-is; callers decide whether it represents an
    /// unsigned value or zig-zagged signed value when they reference it.
    pub fn add_int(&mut self, raw: u64) -> IndexValue {
        self.ints.get_or_insert(raw)
    }

    /// v1/v2 value dedup: keyed on the value message's own encoded bytes,
    /// using the serialized `Value` submessage as its own hash/equality key.
    pub fn add_property_value(&mut self, value: &PropertyValue<'_>) -> IndexValue {
        let bytes = encode_value_message(value);
        self.values.get_or_insert(bytes)
    }

    /// Begin building a 2D feature of `geometry_type`.
    pub fn feature(&mut self, geometry_type: crate::types::GeomType) -> FeatureBuilder<'_> {
        FeatureBuilder::new(self, geometry_type, 2)
    }

    /// Begin building a 3D feature of `geometry_type` (v3 only; enforced
    /// at commit time against this layer's version).
    pub fn feature_3d(&mut self, geometry_type: crate::types::GeomType) -> FeatureBuilder<'_> {
        FeatureBuilder::new(self, geometry_type, 3)
    }

    pub(crate) fn append_feature_bytes(&mut self, bytes: &[u8]) {
        let mut writer = PbfWriter::new();
        writer.write_bytes_field(pbf_layer::FEATURES, bytes);
        self.features.extend_from_slice(writer.as_slice());
        self.feature_count += 1;
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn is_empty(&self) -> bool {
        self.feature_count == 0
    }

    /// Serialize this layer's `Layer` submessage body (without the
    /// enclosing `Tile.layers` framing, which [`TileBuilder`] adds).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = PbfWriter::new();
        w.write_uint32_field(pbf_layer::VERSION, self.version);
        w.write_string_field(pbf_layer::NAME, &self.name);
        w.append_raw(&self.features);

        for key in self.keys.entries() {
            w.write_string_field(pbf_layer::KEYS, key);
        }
        for value in self.values.entries() {
            w.write_bytes_field(pbf_layer::VALUES, value);
        }
        w.write_uint32_field(pbf_layer::EXTENT, self.extent);

        if self.version >= 3 {
            for s in self.strings.entries() {
                w.write_string_field(pbf_layer::STRING_VALUES, s);
            }
            if !self.doubles.is_empty() {
                let mut packed = Vec::with_capacity(self.doubles.len() * 8);
                for bits in self.doubles.entries() {
                    packed.extend_from_slice(&bits.to_le_bytes());
                }
                w.write_bytes_field(pbf_layer::DOUBLE_VALUES, &packed);
            }
            if !self.floats.is_empty() {
                let mut packed = Vec::with_capacity(self.floats.len() * 4);
                for bits in self.floats.entries() {
                    packed.extend_from_slice(&bits.to_le_bytes());
                }
                w.write_bytes_field(pbf_layer::FLOAT_VALUES, &packed);
            }
            if !self.ints.is_empty() {
                let mut packed = Vec::with_capacity(self.ints.len() * 8);
                for raw in self.ints.entries() {
                    packed.extend_from_slice(&raw.to_le_bytes());
                }
                w.write_bytes_field(pbf_layer::INT_VALUES, &packed);
            }
            if !self.elevation_scaling.is_default() {
                let mut s = PbfWriter::new();
                write_scaling(&mut s, &self.elevation_scaling);
                w.write_bytes_field(pbf_layer::ELEVATION_SCALING, s.as_slice());
            }
            for scaling in &self.attribute_scalings {
                let mut s = PbfWriter::new();
                write_scaling(&mut s, scaling);
                w.write_bytes_field(pbf_layer::ATTRIBUTE_SCALINGS, s.as_slice());
            }
            if let Some((x, y, zoom)) = self.tile_address {
                w.write_uint32_field(pbf_layer::TILE_X, x);
                w.write_uint32_field(pbf_layer::TILE_Y, y);
                w.write_uint32_field(pbf_layer::TILE_ZOOM, zoom);
            }
        }

        Ok(w.into_bytes())
    }
}

fn write_scaling(w: &mut PbfWriter, scaling: &Scaling) {
    w.write_sint64_field(crate::types::pbf_scaling::OFFSET, scaling.offset);
    w.write_double_field(crate::types::pbf_scaling::MULTIPLIER, scaling.multiplier);
    w.write_double_field(crate::types::pbf_scaling::BASE, scaling.base);
}

fn encode_value_message(value: &PropertyValue<'_>) -> Vec<u8> {
    let mut w = PbfWriter::new();
    match value {
        PropertyValue::String(s) => w.write_string_field(pbf_value::STRING_VALUE, s),
        PropertyValue::Float(v) => w.write_float_field(pbf_value::FLOAT_VALUE, *v),
        PropertyValue::Double(v) => w.write_double_field(pbf_value::DOUBLE_VALUE, *v),
        PropertyValue::Int(v) => w.write_uint64_field(pbf_value::INT_VALUE, *v as u64),
        PropertyValue::Uint(v) => w.write_uint64_field(pbf_value::UINT_VALUE, *v),
        PropertyValue::Sint(v) => w.write_sint64_field(pbf_value::SINT_VALUE, *v),
        PropertyValue::Bool(v) => w.write_bool_field(pbf_value::BOOL_VALUE, *v),
    }
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_layer_reports_no_features() {
        let layer = LayerBuilder::new("empty", 2, 4096);
        assert!(layer.is_empty());
    }

    #[test]
    fn repeated_keys_and_values_dedup_across_features() {
        let mut layer = LayerBuilder::new("places", 2, 4096);
        let k1 = layer.add_key("name");
        let k2 = layer.add_key("name");
        assert_eq!(k1, k2);
        let v1 = layer.add_property_value(&PropertyValue::String("a"));
        let v2 = layer.add_property_value(&PropertyValue::String("a"));
        assert_eq!(v1, v2);
    }
}
