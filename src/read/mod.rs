//! The reader half of the crate: zero-copy, forward-only views over an
//! externally-owned tile buffer.

pub mod attributes;
pub mod feature;
pub mod geometry;
pub mod handler;
pub mod layer;
pub mod tile;

pub use feature::Feature;
pub use geometry::GeometryDecoder;
pub use handler::{AttributeHandler, GeometryHandler};
pub use layer::{Layer, TileAddress};
pub use tile::Tile;
