//! Assembles a complete tile from its layers.

use crate::error::Result;
use crate::pbf::PbfWriter;
use crate::types::pbf_tile;
use crate::write::layer_builder::LayerBuilder;

/// Owns a tile's layers and serializes them in insertion order.
///
/// A layer with zero features is dropped from the output entirely rather
/// than serialized as an empty `Layer` submessage; an empty layer carries
/// no meaningful information for a consumer.
#[derive(Default)]
pub struct TileBuilder {
    layers: Vec<LayerBuilder>,
}

impl TileBuilder {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Start a new layer and return a handle to keep building it.
    pub fn add_layer(&mut self, name: impl Into<String>, version: u32, extent: u32) -> &mut LayerBuilder {
        self.layers.push(LayerBuilder::new(name, version, extent));
        self.layers.last_mut().expect("layer was just pushed")
    }

    /// Adopt an already-built layer (e.g. one built with `LayerBuilder::from_layer`).
    pub fn push_layer(&mut self, layer: LayerBuilder) {
        self.layers.push(layer);
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(LayerBuilder::is_empty)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut w = PbfWriter::new();
        for layer in &self.layers {
            if layer.is_empty() {
                continue;
            }
            // Serialization errors here would mean a builder invariant was
            // violated elsewhere (e.g. a dedup table overflowing `u32`);
            // there is no way to recover a useful tile at that point.
            let bytes = layer.serialize().expect("layer invariants hold at serialize time");
            w.write_bytes_field(pbf_tile::LAYERS, &bytes);
        }
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::tile::Tile;
    use crate::types::{GeomType, PropertyValue};

    #[test]
    fn empty_builder_produces_an_empty_tile() {
        let tile = TileBuilder::new();
        let bytes = tile.into_bytes();
        assert!(bytes.is_empty());
        assert_eq!(Tile::new(&bytes).count_layers().unwrap(), 0);
    }

    #[test]
    fn layer_with_zero_features_is_dropped_from_output() {
        let mut tile = TileBuilder::new();
        tile.add_layer("empty", 2, 4096);
        let bytes = tile.into_bytes();
        assert_eq!(Tile::new(&bytes).count_layers().unwrap(), 0);
    }

    #[test]
    fn single_point_feature_round_trips_through_the_reader() {
        let mut tile = TileBuilder::new();
        let layer = tile.add_layer("places", 2, 4096);
        let mut f = layer.feature(GeomType::Point);
        f.set_integer_id(1).unwrap();
        f.add_points(1).unwrap();
        f.add_point(100, 200).unwrap();
        f.add_property("name", PropertyValue::String("home")).unwrap();
        f.commit().unwrap();

        let bytes = tile.into_bytes();
        let parsed = Tile::new(&bytes);
        assert_eq!(parsed.count_layers().unwrap(), 1);
        let layer = parsed.layer_at(0).unwrap().unwrap();
        assert_eq!(layer.name(), "places");
        assert_eq!(layer.feature_count(), 1);
    }
}
