//! The geometry decoder state machine.

use crate::error::{MvtError, Result};
use crate::geom::GeometryPoint;
use crate::pbf::{decode_zigzag64, PackedSint32Iter, PackedU32Iter, PackedU64Iter};
use crate::read::handler::GeometryHandler;
use crate::read::layer::Layer;
use crate::scaling::Scaling;
use crate::types::{split_command_integer, split_structured_value, CommandId, StructuredValueType};

struct GeomAttrEntry<'a> {
    key: &'a str,
    scaling: Scaling,
    running: i64,
    remaining: usize,
    values: PackedU64Iter<'a>,
}

/// Decodes one feature's geometry command stream, optionally alongside
/// its elevation channel, knot stream, and geometric attributes.
///
/// Generic over `P` so the same decoder logic serves 2D and 3D handlers;
/// `P::add_to_z`/`P::set_z` are no-ops for 2D points, so the elevation
/// bookkeeping below is unconditional but harmless when unused.
pub struct GeometryDecoder<'a, 'l, P: GeometryPoint> {
    layer: &'l Layer<'a>,
    feature_num: usize,
    commands: PackedU32Iter<'a>,
    elevations: PackedSint32Iter<'a>,
    knots_data: &'a [u8],
    geometric_attributes: &'a [u8],
    geom_attrs: Vec<GeomAttrEntry<'a>>,
    cursor: P,
}

impl<'a, 'l, P: GeometryPoint> GeometryDecoder<'a, 'l, P> {
    pub fn new(
        layer: &'l Layer<'a>,
        feature_num: usize,
        geometry: &'a [u8],
        elevations: &'a [u8],
        knots: &'a [u8],
        geometric_attributes: &'a [u8],
    ) -> Self {
        GeometryDecoder {
            layer,
            feature_num,
            commands: PackedU32Iter::new(geometry, layer.index()),
            elevations: PackedSint32Iter::new(elevations, layer.index()),
            knots_data: knots,
            geometric_attributes,
            geom_attrs: Vec::new(),
            cursor: P::default(),
        }
    }

    fn err(&self, message: impl Into<String>) -> MvtError {
        MvtError::geometry(self.layer.index(), Some(self.feature_num), message)
    }

    fn next_command(&mut self) -> Result<Option<(CommandId, u32)>> {
        match self.commands.next() {
            None => Ok(None),
            Some(raw) => {
                let raw = raw?;
                let (id_raw, count) = split_command_integer(raw);
                let id = CommandId::from_raw(id_raw).ok_or_else(|| self.err(format!("unknown command id {id_raw}")))?;
                Ok(Some((id, count)))
            }
        }
    }

    fn next_point(&mut self) -> Result<P> {
        let dx = self
            .commands
            .next()
            .ok_or_else(|| self.err("missing dx parameter"))?
            .map(crate::pbf::decode_zigzag32)?;
        let dy = self
            .commands
            .next()
            .ok_or_else(|| self.err("missing dy parameter"))?
            .map(crate::pbf::decode_zigzag32)?;
        let mut point = self.cursor.translated(dx, dy);
        if P::DIMENSIONS == 3 {
            let dz = self
                .elevations
                .next()
                .ok_or_else(|| self.err("missing elevation delta"))??;
            point.add_to_z(dz);
        }
        self.cursor = point;
        Ok(point)
    }

    fn collect_geometric_attrs<H: GeometryHandler<Point = P>>(&mut self, stream: &'a [u8]) -> Result<()> {
        let max = H::MAX_GEOMETRIC_ATTRIBUTES;
        if max == 0 || stream.is_empty() {
            return Ok(());
        }
        let layer_index = self.layer.index();
        let mut scanner = PackedU64Iter::new(stream, layer_index);
        while self.geom_attrs.len() < max {
            let key_idx = match scanner.next() {
                None => break,
                Some(v) => v?,
            };
            let key = self.layer.key(key_idx as usize)?;
            let header = scanner
                .next()
                .ok_or_else(|| self.err("geometric attribute stream ended before header word"))??;
            let (tag_raw, count) = split_structured_value(header);
            if StructuredValueType::from_raw(tag_raw) != Some(StructuredValueType::NumberList) {
                return Err(self.err("geometric attributes must be number lists"));
            }
            let scaling_idx = scanner
                .next()
                .ok_or_else(|| self.err("geometric attribute stream ended before scaling index"))??;
            let scaling = self.layer.attribute_scaling(scaling_idx as usize)?;
            let value_start = scanner.position();
            for _ in 0..count {
                scanner
                    .next()
                    .ok_or_else(|| self.err("geometric attribute value list shorter than declared"))??;
            }
            let value_end = scanner.position();
            let values = PackedU64Iter::new(&stream[value_start..value_end], layer_index);
            self.geom_attrs.push(GeomAttrEntry {
                key,
                scaling,
                running: 0,
                remaining: count as usize,
                values,
            });
        }
        Ok(())
    }

    /// Emit `points_attr`/`points_null_attr` for the vertex just produced.
    /// Returns `false` if a handler asked to stop.
    fn emit_geometric_attrs<H: GeometryHandler<Point = P>>(&mut self, handler: &mut H) -> Result<bool> {
        for entry in &mut self.geom_attrs {
            if entry.remaining == 0 {
                continue;
            }
            entry.remaining -= 1;
            let raw = entry
                .values
                .next()
                .ok_or_else(|| MvtError::geometry(self.layer.index(), Some(self.feature_num), "geometric attribute value stream ended early"))??;
            if raw == 0 {
                if !handler.points_null_attr(entry.key) {
                    return Ok(false);
                }
            } else {
                entry.running += decode_zigzag64(raw - 1);
                let value = entry.scaling.decode(entry.running);
                if !handler.points_attr(entry.key, entry.scaling, value) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub fn decode_point<H: GeometryHandler<Point = P>>(mut self, handler: &mut H) -> Result<()> {
        self.collect_geometric_attrs::<H>(self.geometric_attributes)?;

        let (id, count) = self
            .next_command()?
            .ok_or_else(|| self.err("point geometry has no command"))?;
        if id != CommandId::MoveTo {
            return Err(self.err("point geometry must start with MoveTo"));
        }
        if count == 0 {
            return Err(self.err("point geometry MoveTo has zero count"));
        }

        if !handler.points_begin(count) {
            return Ok(());
        }
        for _ in 0..count {
            let p = self.next_point()?;
            if !handler.points_point(p) {
                return Ok(());
            }
            if !self.emit_geometric_attrs(handler)? {
                return Ok(());
            }
        }
        if !handler.points_end() {
            return Ok(());
        }

        if self.next_command()?.is_some() {
            return Err(self.err("point geometry has trailing data"));
        }
        Ok(())
    }

    pub fn decode_linestring<H: GeometryHandler<Point = P>>(mut self, handler: &mut H) -> Result<()> {
        self.collect_geometric_attrs::<H>(self.geometric_attributes)?;

        while let Some((id, count)) = self.next_command()? {
            if id != CommandId::MoveTo || count != 1 {
                return Err(self.err("linestring must start each part with MoveTo(1)"));
            }
            let start = self.next_point()?;

            let (line_id, line_count) = self
                .next_command()?
                .ok_or_else(|| self.err("linestring is missing its LineTo command"))?;
            if line_id != CommandId::LineTo || line_count == 0 {
                return Err(self.err("linestring must follow MoveTo(1) with LineTo(n>=1)"));
            }
            let total = 1 + line_count;

            if !handler.linestring_begin(total) {
                return Ok(());
            }
            if !handler.linestring_point(start) {
                return Ok(());
            }
            if !self.emit_geometric_attrs(handler)? {
                return Ok(());
            }
            for _ in 0..line_count {
                let p = self.next_point()?;
                if !handler.linestring_point(p) {
                    return Ok(());
                }
                if !self.emit_geometric_attrs(handler)? {
                    return Ok(());
                }
            }
            if !handler.linestring_end() {
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn decode_polygon<H: GeometryHandler<Point = P>>(mut self, handler: &mut H) -> Result<()> {
        self.collect_geometric_attrs::<H>(self.geometric_attributes)?;

        while let Some((id, count)) = self.next_command()? {
            if id != CommandId::MoveTo || count != 1 {
                return Err(self.err("ring must start with MoveTo(1)"));
            }
            let start = self.next_point()?;

            let (line_id, line_count) = self
                .next_command()?
                .ok_or_else(|| self.err("ring is missing its LineTo command"))?;
            if line_id != CommandId::LineTo {
                return Err(self.err("ring must follow MoveTo(1) with LineTo(n>=0)"));
            }
            let total = 1 + line_count;

            if !handler.ring_begin(total) {
                return Ok(());
            }

            let mut prev = start;
            let mut shoelace: i64 = 0;
            if !handler.ring_point(start) {
                return Ok(());
            }
            if !self.emit_geometric_attrs(handler)? {
                return Ok(());
            }
            for _ in 0..line_count {
                let p = self.next_point()?;
                shoelace += cross(prev, p);
                prev = p;
                if !handler.ring_point(p) {
                    return Ok(());
                }
                if !self.emit_geometric_attrs(handler)? {
                    return Ok(());
                }
            }
            shoelace += cross(prev, start);

            let (close_id, close_count) = self
                .next_command()?
                .ok_or_else(|| self.err("ring is missing its ClosePath command"))?;
            if close_id != CommandId::ClosePath || close_count != 1 {
                return Err(self.err("ring must end with ClosePath(1)"));
            }

            let kind = if shoelace > 0 {
                crate::types::RingType::Outer
            } else if shoelace < 0 {
                crate::types::RingType::Inner
            } else {
                crate::types::RingType::Invalid
            };
            if !handler.ring_end(kind) {
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn decode_spline<H: GeometryHandler<Point = P>>(mut self, handler: &mut H, degree: u32) -> Result<()> {
        self.collect_geometric_attrs::<H>(self.geometric_attributes)?;

        let mut total_vertices: u64 = 0;
        while let Some((id, count)) = self.next_command()? {
            if id != CommandId::MoveTo || count != 1 {
                return Err(self.err("spline must start each part with MoveTo(1)"));
            }
            let start = self.next_point()?;

            let (line_id, line_count) = self
                .next_command()?
                .ok_or_else(|| self.err("spline is missing its LineTo command"))?;
            if line_id != CommandId::LineTo || line_count == 0 {
                return Err(self.err("spline must follow MoveTo(1) with LineTo(n>=1)"));
            }
            let total = 1 + line_count;
            total_vertices += u64::from(total);

            if !handler.controlpoints_begin(total) {
                return Ok(());
            }
            if !handler.controlpoints_point(start) {
                return Ok(());
            }
            if !self.emit_geometric_attrs(handler)? {
                return Ok(());
            }
            for _ in 0..line_count {
                let p = self.next_point()?;
                if !handler.controlpoints_point(p) {
                    return Ok(());
                }
                if !self.emit_geometric_attrs(handler)? {
                    return Ok(());
                }
            }
            if !handler.controlpoints_end() {
                return Ok(());
            }
        }

        self.decode_knots(handler, total_vertices, degree)
    }

    fn decode_knots<H: GeometryHandler<Point = P>>(&self, handler: &mut H, total_vertices: u64, degree: u32) -> Result<()> {
        if self.knots_data.is_empty() {
            return Err(self.err("spline feature is missing its knot list"));
        }
        let mut iter = PackedU64Iter::new(self.knots_data, self.layer.index());
        let header = iter
            .next()
            .ok_or_else(|| self.err("knot stream is missing its header word"))??;
        let (tag_raw, count) = split_structured_value(header);
        if StructuredValueType::from_raw(tag_raw) != Some(StructuredValueType::NumberList) {
            return Err(self.err("knot list must be encoded as a number list"));
        }
        let expected = total_vertices + u64::from(degree) + 1;
        if count != expected {
            return Err(self.err(format!(
                "knot list has {count} entries, expected {expected} (control points + degree + 1)"
            )));
        }
        let scaling_idx = iter
            .next()
            .ok_or_else(|| self.err("knot stream is missing its scaling index"))??;
        let scaling = self.layer.attribute_scaling(scaling_idx as usize)?;

        if !handler.knots_begin(count as u32) {
            return Ok(());
        }
        let mut running: i64 = 0;
        for _ in 0..count {
            let raw = iter
                .next()
                .ok_or_else(|| self.err("knot list shorter than its declared length"))??;
            if raw == 0 {
                return Err(self.err("knot value must not be null"));
            }
            running += decode_zigzag64(raw - 1);
            if !handler.knots_value(scaling.decode(running)) {
                return Ok(());
            }
        }
        if !handler.knots_end() {
            return Ok(());
        }
        Ok(())
    }
}

#[inline]
fn cross<P: GeometryPoint>(a: P, b: P) -> i64 {
    i64::from(a.x()) * i64::from(b.y()) - i64::from(b.x()) * i64::from(a.y())
}
