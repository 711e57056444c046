//! Handler traits the decoder dispatches events to.
//!
//! The source achieves "implement only what you need" via SFINAE-guarded
//! overloads resolved at compile time. This port uses ordinary trait
//! default methods instead: every method here defaults to a no-op that
//! returns `true` (keep going), so a handler struct only has to override
//! the events it cares about, and the decoder can call every method
//! unconditionally without any capability probing.

use crate::geom::GeometryPoint;
use crate::scaling::Scaling;
use crate::types::{IndexValue, PropertyValue, RingType};

/// Receives geometry events during `Feature::decode_geometry` and its
/// type-specific siblings.
///
/// `Point` fixes whether the decoder runs in 2D or 3D mode; `MAX_GEOMETRIC_ATTRIBUTES`
/// bounds how many geometric-attribute number-lists the decoder will track
/// per vertex (a handler that doesn't care about geometric attributes
/// leaves this at 0).
pub trait GeometryHandler {
    type Point: GeometryPoint;

    const MAX_GEOMETRIC_ATTRIBUTES: usize = 0;

    fn points_begin(&mut self, _count: u32) -> bool {
        true
    }
    fn points_point(&mut self, _point: Self::Point) -> bool {
        true
    }
    fn points_end(&mut self) -> bool {
        true
    }

    fn linestring_begin(&mut self, _count: u32) -> bool {
        true
    }
    fn linestring_point(&mut self, _point: Self::Point) -> bool {
        true
    }
    fn linestring_end(&mut self) -> bool {
        true
    }

    fn ring_begin(&mut self, _count: u32) -> bool {
        true
    }
    fn ring_point(&mut self, _point: Self::Point) -> bool {
        true
    }
    fn ring_end(&mut self, _kind: RingType) -> bool {
        true
    }

    fn controlpoints_begin(&mut self, _count: u32) -> bool {
        true
    }
    fn controlpoints_point(&mut self, _point: Self::Point) -> bool {
        true
    }
    fn controlpoints_end(&mut self) -> bool {
        true
    }

    fn knots_begin(&mut self, _count: u32) -> bool {
        true
    }
    /// Delivered already scaled through the spline's associated `Scaling`.
    fn knots_value(&mut self, _value: f64) -> bool {
        true
    }
    fn knots_end(&mut self) -> bool {
        true
    }

    /// One non-null geometric-attribute value for the vertex just emitted.
    fn points_attr(&mut self, _key: &str, _scaling: Scaling, _value: f64) -> bool {
        true
    }
    /// A present-but-null geometric-attribute value for the vertex just emitted.
    fn points_null_attr(&mut self, _key: &str) -> bool {
        true
    }
}

/// Receives key/value events during `Feature::decode_attributes`,
/// `decode_geometric_attributes`, and `decode_all_attributes`.
///
/// `depth` is 0 at the top level and increases by one per nested
/// list/map level.
pub trait AttributeHandler {
    fn attribute_key(&mut self, _key: &str, _depth: u32) -> bool {
        true
    }

    fn attribute_value(&mut self, _value: PropertyValue<'_>, _depth: u32) -> bool {
        true
    }

    fn attribute_null_value(&mut self, _depth: u32) -> bool {
        true
    }

    fn key_index(&mut self, _index: IndexValue, _depth: u32) -> bool {
        true
    }
    fn value_index(&mut self, _index: IndexValue, _depth: u32) -> bool {
        true
    }
    fn string_value_index(&mut self, _index: IndexValue, _depth: u32) -> bool {
        true
    }
    fn double_value_index(&mut self, _index: IndexValue, _depth: u32) -> bool {
        true
    }
    fn float_value_index(&mut self, _index: IndexValue, _depth: u32) -> bool {
        true
    }
    fn int_value_index(&mut self, _index: IndexValue, _depth: u32) -> bool {
        true
    }

    fn start_list_attribute(&mut self, _count: u32, _depth: u32) -> bool {
        true
    }
    fn end_list_attribute(&mut self, _depth: u32) -> bool {
        true
    }

    fn start_map_attribute(&mut self, _count: u32, _depth: u32) -> bool {
        true
    }
    fn end_map_attribute(&mut self, _depth: u32) -> bool {
        true
    }

    fn start_number_list(&mut self, _count: u32, _scaling: Scaling, _depth: u32) -> bool {
        true
    }
    fn number_list_value(&mut self, _value: f64, _depth: u32) -> bool {
        true
    }
    fn number_list_null_value(&mut self, _depth: u32) -> bool {
        true
    }
    fn end_number_list(&mut self, _depth: u32) -> bool {
        true
    }
}
