// Vector tile core library
// Zero-copy reader and allocating builder for Mapbox Vector Tiles (v1-v3)

pub mod error;
pub mod geom;
pub mod pbf;
pub mod read;
pub mod scaling;
pub mod types;
pub mod write;

pub use error::{MvtError, Result};
pub use geom::{GeometryPoint, Point2D, Point3D};
pub use read::{AttributeHandler, Feature, GeometryHandler, Layer, Tile, TileAddress};
pub use scaling::Scaling;
pub use types::{GeomType, IndexValue, NullType, PropertyValue, RingType};
pub use write::{FeatureBuilder, LayerBuilder, TileBuilder};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tile_round_trips_through_the_builder() {
        let tile = TileBuilder::new();
        let bytes = tile.into_bytes();
        assert!(bytes.is_empty());
        assert_eq!(Tile::new(&bytes).count_layers().unwrap(), 0);
    }
}
