//! Point types and the shared geometry constants used by both the
//! decoder (`read::geometry`) and the encoder (`write::geometry`).

mod point;

pub use point::{GeometryPoint, Point2D, Point3D};
