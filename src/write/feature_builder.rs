//! The feature builder state machine.
//!
//! Each feature is assembled into private scratch buffers; nothing is
//! visible in the owning [`LayerBuilder`] until [`FeatureBuilder::commit`]
//! appends the framed bytes in one shot. [`FeatureBuilder::rollback`] (or
//! simply dropping the builder) discards the scratch buffers untouched;
//! nothing here ever needs an in-place length patch or a buffer
//! truncation to undo a half-built feature.

use crate::error::{MvtError, Result};
use crate::geom::{GeometryPoint, Point2D, Point3D};
use crate::pbf::{encode_zigzag64, PbfWriter};
use crate::read::feature::Feature;
use crate::read::handler::{AttributeHandler, GeometryHandler};
use crate::scaling::Scaling;
use crate::types::{
    create_structured_value, pbf_feature, GeomType, IndexValue, PropertyValue, StructuredValueType, MAX_COMMAND_COUNT,
};
use crate::write::attributes as attr;
use crate::write::geometry::GeometryEncoder;
use crate::write::layer_builder::LayerBuilder;

/// A value small enough to inline into a structured-value word's 60-bit
/// parameter instead of indexing into the int table.
const INLINE_LIMIT: u64 = 1 << 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WantId,
    WantGeometry,
    InPart,
    WantAttrs,
}

pub struct FeatureBuilder<'l> {
    layer: &'l mut LayerBuilder,
    state: State,
    integer_id: Option<u64>,
    string_id: Option<IndexValue>,
    geometry_type: GeomType,
    dimensions: u8,
    encoder: GeometryEncoder,
    part_remaining: u32,
    first_point_of_part: bool,
    is_ring: bool,
    ring_first_point: Option<(i32, i32, i32)>,
    vertices_total: u64,
    copied_geometry: Option<Vec<u8>>,
    copied_elevations: Vec<u8>,
    tags: PbfWriter,
    attributes: PbfWriter,
    geometric_attributes: PbfWriter,
    used_tags: bool,
    used_attributes: bool,
    knots: Option<Vec<u8>>,
    spline_degree: u32,
}

impl<'l> FeatureBuilder<'l> {
    pub(crate) fn new(layer: &'l mut LayerBuilder, geometry_type: GeomType, dimensions: u8) -> Self {
        Self {
            layer,
            state: State::WantId,
            integer_id: None,
            string_id: None,
            geometry_type,
            dimensions,
            encoder: GeometryEncoder::new(),
            part_remaining: 0,
            first_point_of_part: false,
            is_ring: false,
            ring_first_point: None,
            vertices_total: 0,
            copied_geometry: None,
            copied_elevations: Vec::new(),
            tags: PbfWriter::new(),
            attributes: PbfWriter::new(),
            geometric_attributes: PbfWriter::new(),
            used_tags: false,
            used_attributes: false,
            knots: None,
            spline_degree: 2,
        }
    }

    fn err(&self, message: impl Into<String>) -> MvtError {
        MvtError::format(0, None, message)
    }

    pub fn set_integer_id(&mut self, id: u64) -> Result<()> {
        if self.state != State::WantId {
            return Err(self.err("feature id must be set before any geometry"));
        }
        self.integer_id = Some(id);
        Ok(())
    }

    pub fn set_string_id(&mut self, id: &str) -> Result<()> {
        if self.state != State::WantId {
            return Err(self.err("feature id must be set before any geometry"));
        }
        if self.layer.version() < 3 {
            return Err(self.err("string feature ids require a version 3 layer"));
        }
        self.string_id = Some(self.layer.add_string(id));
        Ok(())
    }

    fn begin_geometry(&mut self) {
        if self.state == State::WantId {
            self.state = State::WantGeometry;
        }
    }

    /// Multipoint geometry: `count` points follow via `add_point`/`add_point_3d`.
    /// Point features have exactly one part, so this may only be called once.
    pub fn add_points(&mut self, count: u32) -> Result<()> {
        self.begin_geometry();
        if self.geometry_type != GeomType::Point {
            return Err(self.err("add_points is only valid for point geometries"));
        }
        if self.state != State::WantGeometry || count == 0 || self.vertices_total > 0 {
            return Err(self.err("point geometry must declare count >= 1 exactly once"));
        }
        if count > MAX_COMMAND_COUNT {
            return Err(self.err("point count exceeds the maximum command count"));
        }
        self.encoder.move_to(count);
        self.part_remaining = count;
        self.state = State::InPart;
        self.is_ring = false;
        self.first_point_of_part = false;
        Ok(())
    }

    /// Open one linestring part of `count` vertices (`count >= 2`).
    pub fn add_linestring(&mut self, count: u32) -> Result<()> {
        self.begin_geometry();
        if self.geometry_type != GeomType::LineString && self.geometry_type != GeomType::Spline {
            return Err(self.err("add_linestring is only valid for linestring/spline geometries"));
        }
        if !matches!(self.state, State::WantGeometry) {
            return Err(self.err("cannot open a new linestring part while a part is still open"));
        }
        if count < 2 {
            return Err(self.err("linestring part needs at least 2 points"));
        }
        if count > MAX_COMMAND_COUNT {
            return Err(self.err("linestring point count exceeds the maximum command count"));
        }
        self.part_remaining = count;
        self.first_point_of_part = true;
        self.is_ring = false;
        self.state = State::InPart;
        Ok(())
    }

    /// Open one polygon ring. `count` is every point the caller will
    /// supply via `add_point`/`add_point_3d`, including the closing point
    /// that repeats the ring's first vertex (`count >= 4`): a triangle is
    /// 3 distinct vertices plus that repeat. The repeated point is never
    /// written to the wire - it is checked against the ring's first point
    /// and converted into the implicit `ClosePath` instead.
    pub fn add_ring(&mut self, count: u32) -> Result<()> {
        self.begin_geometry();
        if self.geometry_type != GeomType::Polygon {
            return Err(self.err("add_ring is only valid for polygon geometries"));
        }
        if !matches!(self.state, State::WantGeometry) {
            return Err(self.err("cannot open a new ring while a ring is still open"));
        }
        if count < 4 {
            return Err(self.err("polygon ring needs at least 3 distinct points plus the closing point"));
        }
        if count > MAX_COMMAND_COUNT {
            return Err(self.err("polygon ring point count exceeds the maximum command count"));
        }
        self.part_remaining = count;
        self.first_point_of_part = true;
        self.is_ring = true;
        self.ring_first_point = None;
        self.state = State::InPart;
        Ok(())
    }

    pub fn add_point(&mut self, x: i32, y: i32) -> Result<()> {
        if self.dimensions != 2 {
            return Err(self.err("this feature is 3D; use add_point_3d"));
        }
        self.place_point(x, y, 0)
    }

    pub fn add_point_3d(&mut self, x: i32, y: i32, z: i32) -> Result<()> {
        if self.dimensions != 3 {
            return Err(self.err("this feature is 2D; use add_point"));
        }
        self.place_point(x, y, z)
    }

    /// Places one vertex of the currently open part. For line/ring parts
    /// the `MoveTo(1)` and `LineTo(n)` command words are emitted around
    /// the first vertex, since their counts are already known from the
    /// `add_linestring`/`add_ring` call that opened the part.
    ///
    /// A ring's final call supplies the point that closes it back to the
    /// first vertex; it is checked against that first vertex instead of
    /// being encoded, and emits `ClosePath` in its place.
    fn place_point(&mut self, x: i32, y: i32, z: i32) -> Result<()> {
        if self.state != State::InPart {
            return Err(self.err("no open geometry part to place a point into"));
        }
        let multi_command_part = self.geometry_type != GeomType::Point;

        if self.is_ring && !self.first_point_of_part && self.part_remaining == 1 {
            let first = self.ring_first_point.expect("a ring's first point is recorded before its second");
            if (x, y, z) != first {
                return Err(self.err("polygon ring's closing point must equal its first point"));
            }
            self.encoder.close_path();
            self.part_remaining = 0;
            self.state = State::WantGeometry;
            return Ok(());
        }

        if multi_command_part && !self.first_point_of_part {
            let (cx, cy, cz) = self.encoder.cursor();
            let repeats_cursor = if self.dimensions == 3 { (x, y, z) == (cx, cy, cz) } else { (x, y) == (cx, cy) };
            if repeats_cursor {
                return Err(self.err("consecutive geometry points must not be identical"));
            }
        }

        if multi_command_part && self.first_point_of_part {
            self.encoder.move_to(1);
        }
        if self.dimensions == 3 {
            self.encoder.point_3d(x, y, z);
        } else {
            self.encoder.point_2d(x, y);
        }
        if multi_command_part && self.first_point_of_part {
            self.first_point_of_part = false;
            if self.is_ring {
                self.ring_first_point = Some((x, y, z));
            }
            let line_to_count = if self.is_ring { self.part_remaining - 2 } else { self.part_remaining - 1 };
            if line_to_count > 0 {
                self.encoder.line_to(line_to_count);
            }
        }

        self.vertices_total += 1;
        self.part_remaining -= 1;
        if self.part_remaining == 0 {
            self.state = State::WantGeometry;
        }
        Ok(())
    }

    pub fn set_spline_degree(&mut self, degree: u32) -> Result<()> {
        if degree != 2 && degree != 3 {
            return Err(self.err("spline degree must be 2 or 3"));
        }
        self.spline_degree = degree;
        Ok(())
    }

    /// Finish geometry and commit the spline's knot vector; only valid for
    /// spline features, once every control-point part has been closed.
    pub fn set_knots(&mut self, scaling_index: IndexValue, knots: &[f64], scaling: Scaling) -> Result<()> {
        if self.geometry_type != GeomType::Spline {
            return Err(self.err("set_knots is only valid for spline geometries"));
        }
        if self.state != State::WantGeometry {
            return Err(self.err("finish all spline parts before setting knots"));
        }
        let expected = self.vertices_total + u64::from(self.spline_degree) + 1;
        if knots.len() as u64 != expected {
            return Err(self.err(format!(
                "knot list has {} entries, expected {expected} (control points + degree + 1)",
                knots.len()
            )));
        }
        let mut w = PbfWriter::new();
        w.write_varint(create_structured_value(StructuredValueType::NumberList, knots.len() as u64));
        w.write_varint(u64::from(scaling_index.value()));
        let mut running = 0i64;
        for &v in knots {
            let encoded = scaling.encode(v);
            let delta = encoded - running;
            running = encoded;
            w.write_varint(encode_zigzag64(delta) + 1);
        }
        self.knots = Some(w.into_bytes());
        Ok(())
    }

    /// Copy a source feature's id, if it has one.
    pub fn copy_id(&mut self, feature: &Feature<'_, '_>) -> Result<()> {
        if feature.has_integer_id() {
            self.set_integer_id(feature.integer_id())
        } else if feature.has_string_id() {
            let id = feature.string_id().expect("has_string_id implies a string id is present");
            self.set_string_id(id)
        } else {
            Ok(())
        }
    }

    /// Copy a source feature's geometry - and, for splines, its knot
    /// vector - byte for byte. The geometry stream carries no table
    /// references, so unlike attributes it needs no re-resolution against
    /// this builder's layer. Must be called before any other geometry is
    /// added, and the source feature's geometry type and dimensionality
    /// must match this builder's.
    pub fn copy_geometry(&mut self, feature: &Feature<'_, '_>) -> Result<()> {
        if !matches!(self.state, State::WantId | State::WantGeometry) || self.vertices_total > 0 {
            return Err(self.err("copy_geometry can only be called before any other geometry is added"));
        }
        if feature.geometry_type() != self.geometry_type {
            return Err(self.err("copy_geometry's source feature has a different geometry type"));
        }
        if feature.has_3d_geometry() != (self.dimensions == 3) {
            return Err(self.err("copy_geometry's source feature has a different dimensionality"));
        }
        self.begin_geometry();
        self.vertices_total = count_vertices(feature, self.dimensions)?;
        self.copied_geometry = Some(feature.geometry_data().to_vec());
        self.copied_elevations = feature.elevations_data().to_vec();
        if self.geometry_type == GeomType::Spline {
            self.knots = Some(feature.knots_data().to_vec());
            self.spline_degree = feature.spline_degree();
        }
        self.state = State::WantGeometry;
        Ok(())
    }

    /// Copy a source feature's v1/v2 tags or v3 attributes, re-resolving
    /// every key and value through this builder's own layer rather than
    /// copying table indices raw - the destination layer's dedup tables
    /// may not mirror the source's. Geometric attributes are not copied;
    /// use [`Self::add_geometric_attribute`] for those.
    pub fn copy_attributes(&mut self, feature: &Feature<'_, '_>) -> Result<()> {
        if !feature.tags_data().is_empty() {
            let mut copier = TagCopier { builder: self, pending_key: None, error: None };
            feature.decode_attributes(&mut copier)?;
            if let Some(err) = copier.error {
                return Err(err);
            }
            Ok(())
        } else if !feature.attributes_data().is_empty() {
            self.enter_v3_attrs()?;
            let mut copier = AttrCopier { builder: self, pending_key: None, number_lists: Vec::new() };
            feature.decode_attributes(&mut copier)?;
            Ok(())
        } else {
            Ok(())
        }
    }

    fn enter_attrs(&mut self) -> Result<()> {
        if self.state == State::WantGeometry {
            self.state = State::WantAttrs;
        }
        if self.state != State::WantAttrs {
            return Err(self.err("attributes must be added after geometry is complete"));
        }
        Ok(())
    }

    /// v1/v2 tag: `(key_index, value_index)` into the layer's dedup tables.
    pub fn add_property(&mut self, key: &str, value: PropertyValue<'_>) -> Result<()> {
        self.enter_attrs()?;
        if self.used_attributes {
            return Err(self.err("feature cannot mix v1/v2 tags with v3 attributes"));
        }
        self.used_tags = true;
        let key_idx = self.layer.add_key(key);
        let value_idx = self.layer.add_property_value(&value);
        attr::write_tag(&mut self.tags, key_idx, value_idx);
        Ok(())
    }

    /// v3 scalar attribute; automatically chooses between an inline word
    /// and the relevant dedup table depending on magnitude.
    pub fn add_scalar_attribute(&mut self, key: &str, value: PropertyValue<'_>) -> Result<()> {
        self.enter_v3_attrs()?;
        let key_idx = self.layer.add_key(key);
        match value {
            PropertyValue::String(s) => {
                let idx = self.layer.add_string(s);
                attr::write_string_attr(&mut self.attributes, key_idx, idx);
            }
            PropertyValue::Float(v) => {
                let idx = self.layer.add_float(v);
                attr::write_float_attr(&mut self.attributes, key_idx, idx);
            }
            PropertyValue::Double(v) => {
                let idx = self.layer.add_double(v);
                attr::write_double_attr(&mut self.attributes, key_idx, idx);
            }
            PropertyValue::Uint(v) => {
                if v < INLINE_LIMIT {
                    attr::write_inline_uint_attr(&mut self.attributes, key_idx, v);
                } else {
                    let idx = self.layer.add_int(v);
                    attr::write_uint_table_attr(&mut self.attributes, key_idx, idx);
                }
            }
            PropertyValue::Sint(v) | PropertyValue::Int(v) => {
                if encode_zigzag64(v) < INLINE_LIMIT {
                    attr::write_inline_sint_attr(&mut self.attributes, key_idx, v);
                } else {
                    let idx = self.layer.add_int(encode_zigzag64(v));
                    attr::write_sint_table_attr(&mut self.attributes, key_idx, idx);
                }
            }
            PropertyValue::Bool(v) => attr::write_bool_attr(&mut self.attributes, key_idx, v),
        }
        Ok(())
    }

    pub fn add_null_attribute(&mut self, key: &str) -> Result<()> {
        self.enter_v3_attrs()?;
        let key_idx = self.layer.add_key(key);
        attr::write_null_attr(&mut self.attributes, key_idx);
        Ok(())
    }

    /// Write one bare (unkeyed) structured-value word for a list/map item,
    /// routing through the layer's dedup tables the same way
    /// `add_scalar_attribute` does for a top-level key.
    fn write_item(&mut self, value: Option<PropertyValue<'_>>) {
        let Some(value) = value else {
            attr::write_null_item(&mut self.attributes);
            return;
        };
        match value {
            PropertyValue::String(s) => {
                let idx = self.layer.add_string(s);
                attr::write_string_item(&mut self.attributes, idx);
            }
            PropertyValue::Float(v) => {
                let idx = self.layer.add_float(v);
                attr::write_float_item(&mut self.attributes, idx);
            }
            PropertyValue::Double(v) => {
                let idx = self.layer.add_double(v);
                attr::write_double_item(&mut self.attributes, idx);
            }
            PropertyValue::Uint(v) => {
                if v < INLINE_LIMIT {
                    attr::write_inline_uint_item(&mut self.attributes, v);
                } else {
                    let idx = self.layer.add_int(v);
                    attr::write_uint_table_item(&mut self.attributes, idx);
                }
            }
            PropertyValue::Sint(v) | PropertyValue::Int(v) => {
                if encode_zigzag64(v) < INLINE_LIMIT {
                    attr::write_inline_sint_item(&mut self.attributes, v);
                } else {
                    let idx = self.layer.add_int(encode_zigzag64(v));
                    attr::write_sint_table_item(&mut self.attributes, idx);
                }
            }
            PropertyValue::Bool(v) => attr::write_bool_item(&mut self.attributes, v),
        }
    }

    fn enter_v3_attrs(&mut self) -> Result<()> {
        self.enter_attrs()?;
        if self.used_tags {
            return Err(self.err("feature cannot mix v1/v2 tags with v3 attributes"));
        }
        if self.layer.version() < 3 {
            return Err(self.err("structured attributes require a version 3 layer"));
        }
        self.used_attributes = true;
        Ok(())
    }

    /// A flat list of scalar values, `None` entries written as null. One
    /// level deep only - arbitrary recursive nesting of lists/maps is left
    /// to direct use of `write::attributes` by callers that need it.
    pub fn add_list_attribute(&mut self, key: &str, items: &[Option<PropertyValue<'_>>]) -> Result<()> {
        self.enter_v3_attrs()?;
        let key_idx = self.layer.add_key(key);
        attr::write_list_attr(&mut self.attributes, key_idx, items.len() as u32);
        for item in items {
            self.write_item(item.clone());
        }
        Ok(())
    }

    /// A flat map of key/scalar-value pairs, `None` values written as
    /// null. One level deep only, same limitation as [`Self::add_list_attribute`].
    pub fn add_map_attribute(&mut self, key: &str, entries: &[(&str, Option<PropertyValue<'_>>)]) -> Result<()> {
        self.enter_v3_attrs()?;
        let key_idx = self.layer.add_key(key);
        attr::write_map_attr(&mut self.attributes, key_idx, entries.len() as u32);
        for (entry_key, value) in entries {
            let entry_key_idx = self.layer.add_key(entry_key);
            attr::write_key_item(&mut self.attributes, entry_key_idx);
            self.write_item(value.clone());
        }
        Ok(())
    }

    /// A per-vertex number-list geometric attribute: one value (or `None`
    /// for a present-but-null entry) per vertex already placed.
    pub fn add_geometric_attribute(
        &mut self,
        key: &str,
        scaling_index: IndexValue,
        scaling: Scaling,
        values: &[Option<f64>],
    ) -> Result<()> {
        if self.layer.version() < 3 {
            return Err(self.err("geometric attributes require a version 3 layer"));
        }
        if matches!(self.state, State::WantId | State::InPart) {
            return Err(self.err("geometry must be complete before adding geometric attributes"));
        }
        if values.len() as u64 != self.vertices_total {
            return Err(self.err("geometric attribute must supply exactly one value per vertex"));
        }
        let key_idx = self.layer.add_key(key);
        attr::write_number_list_attr(&mut self.geometric_attributes, key_idx, values.len() as u32, scaling_index);
        let mut running = 0i64;
        for v in values {
            match v {
                None => attr::write_number_list_value(&mut self.geometric_attributes, None),
                Some(value) => {
                    let encoded = scaling.encode(*value);
                    let delta = encoded - running;
                    running = encoded;
                    attr::write_number_list_value(&mut self.geometric_attributes, Some(delta));
                }
            }
        }
        Ok(())
    }

    /// Discard this feature's scratch buffers without touching the layer.
    pub fn rollback(self) {}

    pub fn commit(self) -> Result<()> {
        if self.state == State::InPart {
            return Err(self.err("feature has an unfinished geometry part"));
        }
        if self.integer_id.is_some() && self.string_id.is_some() {
            return Err(self.err("feature cannot have both an integer and a string id"));
        }
        if self.vertices_total == 0 {
            return Err(self.err("feature has no geometry"));
        }
        if self.geometry_type == GeomType::Spline && self.knots.is_none() {
            return Err(self.err("spline feature is missing its knot list"));
        }

        let (commands, elevations) = match self.copied_geometry {
            Some(bytes) => (bytes, self.copied_elevations),
            None => self.encoder.into_parts(),
        };
        let layer = self.layer;

        let mut w = PbfWriter::new();
        if let Some(id) = self.integer_id {
            w.write_uint64_field(pbf_feature::ID, id);
        }
        if let Some(idx) = self.string_id {
            w.write_uint32_field(pbf_feature::STRING_ID, idx.value());
        }
        w.write_uint32_field(pbf_feature::TYPE, self.geometry_type.raw());
        w.write_bytes_field(pbf_feature::GEOMETRY, &commands);
        if !elevations.is_empty() {
            w.write_bytes_field(pbf_feature::ELEVATIONS, &elevations);
        }
        if !self.tags.is_empty() {
            w.write_bytes_field(pbf_feature::TAGS, self.tags.as_slice());
        }
        if !self.attributes.is_empty() {
            w.write_bytes_field(pbf_feature::ATTRIBUTES, self.attributes.as_slice());
        }
        if !self.geometric_attributes.is_empty() {
            w.write_bytes_field(pbf_feature::GEOMETRIC_ATTRIBUTES, self.geometric_attributes.as_slice());
        }
        if let Some(knots) = &self.knots {
            w.write_bytes_field(pbf_feature::SPLINE_KNOTS, knots);
            w.write_uint32_field(pbf_feature::SPLINE_DEGREE, self.spline_degree);
        }

        layer.append_feature_bytes(w.as_slice());
        Ok(())
    }
}

/// Counts vertices a geometry decode would walk, without otherwise acting
/// on them - used by `copy_geometry` to recover `vertices_total` from a
/// raw byte copy, since that copy never passes through `place_point`.
#[derive(Default)]
struct VertexCounter<P> {
    count: u64,
    _marker: std::marker::PhantomData<P>,
}

impl<P: GeometryPoint> GeometryHandler for VertexCounter<P> {
    type Point = P;

    fn points_point(&mut self, _point: P) -> bool {
        self.count += 1;
        true
    }
    fn linestring_point(&mut self, _point: P) -> bool {
        self.count += 1;
        true
    }
    fn ring_point(&mut self, _point: P) -> bool {
        self.count += 1;
        true
    }
    fn controlpoints_point(&mut self, _point: P) -> bool {
        self.count += 1;
        true
    }
}

fn count_vertices(feature: &Feature<'_, '_>, dimensions: u8) -> Result<u64> {
    if dimensions == 3 {
        let mut counter = VertexCounter::<Point3D>::default();
        feature.decode_geometry(&mut counter)?;
        Ok(counter.count)
    } else {
        let mut counter = VertexCounter::<Point2D>::default();
        feature.decode_geometry(&mut counter)?;
        Ok(counter.count)
    }
}

/// Re-dispatches a source feature's v1/v2 tags through `add_property`,
/// which re-resolves the key and value into this builder's own layer.
struct TagCopier<'a, 'l> {
    builder: &'a mut FeatureBuilder<'l>,
    pending_key: Option<String>,
    error: Option<MvtError>,
}

impl AttributeHandler for TagCopier<'_, '_> {
    fn attribute_key(&mut self, key: &str, _depth: u32) -> bool {
        self.pending_key = Some(key.to_string());
        true
    }

    fn attribute_value(&mut self, value: PropertyValue<'_>, _depth: u32) -> bool {
        let key = self.pending_key.take().expect("a v1/v2 attribute value always follows its key");
        if let Err(err) = self.builder.add_property(&key, value) {
            self.error = Some(err);
            return false;
        }
        true
    }
}

/// Re-dispatches a source feature's v3 attributes word by word, writing a
/// key item just before the value/structure it introduces and re-resolving
/// every table reference (strings, numbers, scalings) through this
/// builder's own layer. List items never see `attribute_key`, so
/// `pending_key` is only ever set for a top-level or map-entry key.
struct AttrCopier<'a, 'l> {
    builder: &'a mut FeatureBuilder<'l>,
    pending_key: Option<IndexValue>,
    number_lists: Vec<(Scaling, i64)>,
}

impl AttrCopier<'_, '_> {
    fn flush_key(&mut self) {
        if let Some(key) = self.pending_key.take() {
            attr::write_key_item(&mut self.builder.attributes, key);
        }
    }
}

impl AttributeHandler for AttrCopier<'_, '_> {
    fn attribute_key(&mut self, key: &str, _depth: u32) -> bool {
        self.pending_key = Some(self.builder.layer.add_key(key));
        true
    }

    fn attribute_value(&mut self, value: PropertyValue<'_>, _depth: u32) -> bool {
        self.flush_key();
        self.builder.write_item(Some(value));
        true
    }

    fn attribute_null_value(&mut self, _depth: u32) -> bool {
        self.flush_key();
        self.builder.write_item(None);
        true
    }

    fn start_list_attribute(&mut self, count: u32, _depth: u32) -> bool {
        self.flush_key();
        attr::write_list_item(&mut self.builder.attributes, count);
        true
    }

    fn start_map_attribute(&mut self, count: u32, _depth: u32) -> bool {
        self.flush_key();
        attr::write_map_item(&mut self.builder.attributes, count);
        true
    }

    fn start_number_list(&mut self, count: u32, scaling: Scaling, _depth: u32) -> bool {
        self.flush_key();
        let scaling_index = self.builder.layer.add_attribute_scaling(scaling);
        attr::write_number_list_item(&mut self.builder.attributes, count, scaling_index);
        self.number_lists.push((scaling, 0));
        true
    }

    fn number_list_value(&mut self, value: f64, _depth: u32) -> bool {
        let (scaling, running) = self.number_lists.last_mut().expect("number_list_value fires within an open number list");
        let encoded = scaling.encode(value);
        let delta = encoded - *running;
        *running = encoded;
        attr::write_number_list_value(&mut self.builder.attributes, Some(delta));
        true
    }

    fn number_list_null_value(&mut self, _depth: u32) -> bool {
        attr::write_number_list_value(&mut self.builder.attributes, None);
        true
    }

    fn end_number_list(&mut self, _depth: u32) -> bool {
        self.number_lists.pop();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::layer::Layer;
    use crate::types::GeomType;

    #[test]
    fn point_feature_commits_with_an_integer_id() {
        let mut layer = LayerBuilder::new("places", 2, 4096);
        let mut f = layer.feature(GeomType::Point);
        f.set_integer_id(7).unwrap();
        f.add_points(1).unwrap();
        f.add_point(10, 20).unwrap();
        f.add_property("name", PropertyValue::String("x")).unwrap();
        f.commit().unwrap();
        assert_eq!(layer.feature_count(), 1);
    }

    #[test]
    fn linestring_feature_rejects_parts_shorter_than_two() {
        let mut layer = LayerBuilder::new("roads", 2, 4096);
        let mut f = layer.feature(GeomType::LineString);
        assert!(f.add_linestring(1).is_err());
    }

    #[test]
    fn polygon_ring_emits_close_path_once_full() {
        let mut layer = LayerBuilder::new("areas", 2, 4096);
        let mut f = layer.feature(GeomType::Polygon);
        f.add_ring(4).unwrap();
        f.add_point(0, 0).unwrap();
        f.add_point(10, 0).unwrap();
        f.add_point(0, 10).unwrap();
        f.add_point(0, 0).unwrap();
        f.commit().unwrap();
        assert_eq!(layer.feature_count(), 1);
    }

    #[test]
    fn polygon_ring_rejects_a_closing_point_that_differs_from_the_first() {
        let mut layer = LayerBuilder::new("areas", 2, 4096);
        let mut f = layer.feature(GeomType::Polygon);
        f.add_ring(4).unwrap();
        f.add_point(0, 0).unwrap();
        f.add_point(10, 0).unwrap();
        f.add_point(0, 10).unwrap();
        assert!(f.add_point(1, 1).is_err());
    }

    #[test]
    fn linestring_rejects_consecutive_identical_points() {
        let mut layer = LayerBuilder::new("roads", 2, 4096);
        let mut f = layer.feature(GeomType::LineString);
        f.add_linestring(3).unwrap();
        f.add_point(0, 0).unwrap();
        assert!(f.add_point(0, 0).is_err());
    }

    #[test]
    fn add_points_rejects_a_count_beyond_the_command_limit() {
        let mut layer = LayerBuilder::new("places", 2, 4096);
        let mut f = layer.feature(GeomType::Point);
        assert!(f.add_points(1 << 29).is_err());
    }

    #[test]
    fn rollback_leaves_the_layer_untouched() {
        let mut layer = LayerBuilder::new("places", 2, 4096);
        let mut f = layer.feature(GeomType::Point);
        f.add_points(1).unwrap();
        f.add_point(1, 1).unwrap();
        f.rollback();
        assert_eq!(layer.feature_count(), 0);
    }

    #[test]
    fn copy_id_copies_an_integer_id_from_a_source_feature() {
        let mut src_layer = LayerBuilder::new("src", 2, 4096);
        {
            let mut f = src_layer.feature(GeomType::Point);
            f.set_integer_id(42).unwrap();
            f.add_points(1).unwrap();
            f.add_point(1, 1).unwrap();
            f.commit().unwrap();
        }
        let src_bytes = src_layer.serialize().unwrap();
        let src = Layer::new(&src_bytes, 0).unwrap();
        let src_feature = src.feature_at(0).unwrap().unwrap();

        let mut dst_layer = LayerBuilder::new("dst", 2, 4096);
        let mut f = dst_layer.feature(GeomType::Point);
        f.copy_id(&src_feature).unwrap();
        f.add_points(1).unwrap();
        f.add_point(2, 2).unwrap();
        f.commit().unwrap();

        let dst_bytes = dst_layer.serialize().unwrap();
        let dst = Layer::new(&dst_bytes, 0).unwrap();
        let dst_feature = dst.feature_at(0).unwrap().unwrap();
        assert!(dst_feature.has_integer_id());
        assert_eq!(dst_feature.integer_id(), 42);
    }

    #[test]
    fn copy_geometry_reproduces_a_polygon_ring_byte_for_byte() {
        let mut src_layer = LayerBuilder::new("src", 2, 4096);
        {
            let mut f = src_layer.feature(GeomType::Polygon);
            f.add_ring(4).unwrap();
            for (x, y) in [(0, 0), (10, 0), (0, 10), (0, 0)] {
                f.add_point(x, y).unwrap();
            }
            f.commit().unwrap();
        }
        let src_bytes = src_layer.serialize().unwrap();
        let src = Layer::new(&src_bytes, 0).unwrap();
        let src_feature = src.feature_at(0).unwrap().unwrap();

        let mut dst_layer = LayerBuilder::new("dst", 2, 4096);
        let mut f = dst_layer.feature(GeomType::Polygon);
        f.copy_geometry(&src_feature).unwrap();
        f.commit().unwrap();

        let dst_bytes = dst_layer.serialize().unwrap();
        let dst = Layer::new(&dst_bytes, 0).unwrap();
        let dst_feature = dst.feature_at(0).unwrap().unwrap();
        assert_eq!(dst_feature.geometry_data(), src_feature.geometry_data());

        // A geometric attribute added after the copy needs vertices_total
        // recovered correctly from the raw bytes, not just a byte copy: the
        // ring has 3 distinct vertices (the closing point isn't one of them).
        let scaling_index = dst_layer.add_attribute_scaling(Scaling::default());
        let mut f = dst_layer.feature(GeomType::Polygon);
        f.copy_geometry(&src_feature).unwrap();
        f.add_geometric_attribute("h", scaling_index, Scaling::default(), &[Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();
    }

    #[test]
    fn copy_attributes_reencodes_v3_structured_attributes() {
        let mut src_layer = LayerBuilder::new("src", 3, 4096);
        {
            let mut f = src_layer.feature(GeomType::Point);
            f.add_points(1).unwrap();
            f.add_point(0, 0).unwrap();
            f.add_scalar_attribute("name", PropertyValue::String("a")).unwrap();
            f.add_list_attribute("tags", &[Some(PropertyValue::Uint(1)), None]).unwrap();
            f.commit().unwrap();
        }
        let src_bytes = src_layer.serialize().unwrap();
        let src = Layer::new(&src_bytes, 0).unwrap();
        let src_feature = src.feature_at(0).unwrap().unwrap();

        let mut dst_layer = LayerBuilder::new("dst", 3, 4096);
        let mut f = dst_layer.feature(GeomType::Point);
        f.add_points(1).unwrap();
        f.add_point(0, 0).unwrap();
        f.copy_attributes(&src_feature).unwrap();
        f.commit().unwrap();

        let dst_bytes = dst_layer.serialize().unwrap();
        let dst = Layer::new(&dst_bytes, 0).unwrap();
        let dst_feature = dst.feature_at(0).unwrap().unwrap();
        assert_eq!(dst_feature.attributes_data(), src_feature.attributes_data());
    }

    #[test]
    fn copy_attributes_reencodes_v1_tags() {
        let mut src_layer = LayerBuilder::new("src", 2, 4096);
        {
            let mut f = src_layer.feature(GeomType::Point);
            f.add_points(1).unwrap();
            f.add_point(0, 0).unwrap();
            f.add_property("name", PropertyValue::String("a")).unwrap();
            f.commit().unwrap();
        }
        let src_bytes = src_layer.serialize().unwrap();
        let src = Layer::new(&src_bytes, 0).unwrap();
        let src_feature = src.feature_at(0).unwrap().unwrap();

        let mut dst_layer = LayerBuilder::new("dst", 2, 4096);
        let mut f = dst_layer.feature(GeomType::Point);
        f.add_points(1).unwrap();
        f.add_point(0, 0).unwrap();
        f.copy_attributes(&src_feature).unwrap();
        f.commit().unwrap();

        let dst_bytes = dst_layer.serialize().unwrap();
        let dst = Layer::new(&dst_bytes, 0).unwrap();
        let dst_feature = dst.feature_at(0).unwrap().unwrap();
        assert_eq!(dst_feature.tags_data(), src_feature.tags_data());
    }
}
