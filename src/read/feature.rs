//! The feature reader, parsed relative to its owning layer.

use crate::error::{MvtError, Result};
use crate::geom::GeometryPoint;
use crate::pbf::PbfReader;
use crate::read::attributes::{decode_structured_attributes, decode_tags};
use crate::read::geometry::GeometryDecoder;
use crate::read::handler::{AttributeHandler, GeometryHandler};
use crate::read::layer::Layer;
use crate::types::{pbf_feature, GeomType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdKind {
    None,
    Integer,
    String,
}

/// A feature, still a view over its layer's buffer; borrows the layer it
/// came from so geometry/attribute decode can resolve table indices.
pub struct Feature<'a, 'l> {
    layer: &'l Layer<'a>,
    feature_num: usize,
    id_kind: IdKind,
    integer_id: u64,
    string_id: Option<&'a str>,
    geometry_type: GeomType,
    geometry: &'a [u8],
    elevations: &'a [u8],
    knots: &'a [u8],
    tags: &'a [u8],
    attributes: &'a [u8],
    geometric_attributes: &'a [u8],
    spline_degree: u32,
}

impl<'a, 'l> Feature<'a, 'l> {
    pub(crate) fn new(layer: &'l Layer<'a>, data: &'a [u8], feature_num: usize) -> Result<Self> {
        let index = layer.index();
        let mut reader = PbfReader::new(data, index);

        let mut integer_id: Option<u64> = None;
        let mut string_id: Option<&'a str> = None;
        let mut type_raw: Option<u32> = None;
        let mut geometry: Option<&'a [u8]> = None;
        let mut elevations: &'a [u8] = &[];
        let mut knots: &'a [u8] = &[];
        let mut tags: &'a [u8] = &[];
        let mut attributes: &'a [u8] = &[];
        let mut geometric_attributes: &'a [u8] = &[];
        let mut spline_degree: Option<u32> = None;

        while let Some((field, wire_type)) = reader.next_field()? {
            match field {
                pbf_feature::ID => integer_id = Some(reader.read_varint()?),
                pbf_feature::STRING_ID => string_id = Some(reader.read_string()?),
                pbf_feature::TYPE => type_raw = Some(reader.read_u32()?),
                pbf_feature::GEOMETRY => geometry = Some(reader.read_view()?),
                pbf_feature::ELEVATIONS => elevations = reader.read_view()?,
                pbf_feature::SPLINE_KNOTS => knots = reader.read_view()?,
                pbf_feature::TAGS => tags = reader.read_view()?,
                pbf_feature::ATTRIBUTES => attributes = reader.read_view()?,
                pbf_feature::GEOMETRIC_ATTRIBUTES => geometric_attributes = reader.read_view()?,
                pbf_feature::SPLINE_DEGREE => spline_degree = Some(reader.read_u32()?),
                _ => reader.skip(wire_type)?,
            }
        }

        if integer_id.is_some() && string_id.is_some() {
            return Err(MvtError::format(index, Some(feature_num), "feature has both an integer and a string id"));
        }

        let version = layer.version();
        let has_v3_fields = string_id.is_some()
            || !elevations.is_empty()
            || !knots.is_empty()
            || !attributes.is_empty()
            || !geometric_attributes.is_empty()
            || spline_degree.is_some();
        if version < 3 && has_v3_fields {
            return Err(MvtError::format(index, Some(feature_num), "v3-only field present on a feature in a version 1/2 layer"));
        }

        if !tags.is_empty() && !attributes.is_empty() {
            return Err(MvtError::format(index, Some(feature_num), "feature has both tags and attributes"));
        }

        let geometry = geometry.ok_or_else(|| MvtError::format(index, Some(feature_num), "feature has no geometry"))?;
        let geometry_type = GeomType::from_raw(type_raw.unwrap_or(0));

        if geometry_type == GeomType::Spline && version < 3 {
            return Err(MvtError::format(index, Some(feature_num), "spline geometry in a version 1/2 layer"));
        }

        let spline_degree = spline_degree.unwrap_or(2);
        if geometry_type == GeomType::Spline && spline_degree != 2 && spline_degree != 3 {
            return Err(MvtError::format(index, Some(feature_num), "spline degree must be 2 or 3"));
        }

        let id_kind = if integer_id.is_some() {
            IdKind::Integer
        } else if string_id.is_some() {
            IdKind::String
        } else {
            IdKind::None
        };

        Ok(Feature {
            layer,
            feature_num,
            id_kind,
            integer_id: integer_id.unwrap_or(0),
            string_id,
            geometry_type,
            geometry,
            elevations,
            knots,
            tags,
            attributes,
            geometric_attributes,
            spline_degree,
        })
    }

    pub fn layer(&self) -> &'l Layer<'a> {
        self.layer
    }

    pub fn feature_num(&self) -> usize {
        self.feature_num
    }

    pub fn has_id(&self) -> bool {
        self.id_kind != IdKind::None
    }

    pub fn has_integer_id(&self) -> bool {
        self.id_kind == IdKind::Integer
    }

    pub fn has_string_id(&self) -> bool {
        self.id_kind == IdKind::String
    }

    pub fn integer_id(&self) -> u64 {
        self.integer_id
    }

    pub fn string_id(&self) -> Option<&'a str> {
        self.string_id
    }

    pub fn geometry_type(&self) -> GeomType {
        self.geometry_type
    }

    pub fn has_3d_geometry(&self) -> bool {
        !self.elevations.is_empty()
    }

    pub fn spline_degree(&self) -> u32 {
        self.spline_degree
    }

    pub fn geometry_data(&self) -> &'a [u8] {
        self.geometry
    }

    pub fn elevations_data(&self) -> &'a [u8] {
        self.elevations
    }

    pub fn knots_data(&self) -> &'a [u8] {
        self.knots
    }

    pub fn has_attributes(&self) -> bool {
        !self.tags.is_empty() || !self.attributes.is_empty() || !self.geometric_attributes.is_empty()
    }

    pub fn tags_data(&self) -> &'a [u8] {
        self.tags
    }

    pub fn attributes_data(&self) -> &'a [u8] {
        self.attributes
    }

    pub fn geometric_attributes_data(&self) -> &'a [u8] {
        self.geometric_attributes
    }

    fn decoder<H: GeometryHandler>(&self) -> GeometryDecoder<'a, '_, H::Point> {
        GeometryDecoder::new(
            self.layer,
            self.feature_num,
            self.geometry,
            self.elevations,
            self.knots,
            self.geometric_attributes,
        )
    }

    pub fn decode_point_geometry<H: GeometryHandler>(&self, handler: &mut H) -> Result<()> {
        if self.geometry_type != GeomType::Point {
            return Err(MvtError::geometry(self.layer.index(), Some(self.feature_num), "not a point geometry"));
        }
        self.decoder::<H>().decode_point(handler)
    }

    pub fn decode_linestring_geometry<H: GeometryHandler>(&self, handler: &mut H) -> Result<()> {
        if self.geometry_type != GeomType::LineString {
            return Err(MvtError::geometry(self.layer.index(), Some(self.feature_num), "not a linestring geometry"));
        }
        self.decoder::<H>().decode_linestring(handler)
    }

    pub fn decode_polygon_geometry<H: GeometryHandler>(&self, handler: &mut H) -> Result<()> {
        if self.geometry_type != GeomType::Polygon {
            return Err(MvtError::geometry(self.layer.index(), Some(self.feature_num), "not a polygon geometry"));
        }
        self.decoder::<H>().decode_polygon(handler)
    }

    pub fn decode_spline_geometry<H: GeometryHandler>(&self, handler: &mut H) -> Result<()> {
        if self.geometry_type != GeomType::Spline {
            return Err(MvtError::geometry(self.layer.index(), Some(self.feature_num), "not a spline geometry"));
        }
        self.decoder::<H>().decode_spline(handler, self.spline_degree)
    }

    /// Dispatch on this feature's geometry type.
    pub fn decode_geometry<H: GeometryHandler>(&self, handler: &mut H) -> Result<()> {
        match self.geometry_type {
            GeomType::Point => self.decoder::<H>().decode_point(handler),
            GeomType::LineString => self.decoder::<H>().decode_linestring(handler),
            GeomType::Polygon => self.decoder::<H>().decode_polygon(handler),
            GeomType::Spline => self.decoder::<H>().decode_spline(handler, self.spline_degree),
            GeomType::Unknown => Err(MvtError::geometry(
                self.layer.index(),
                Some(self.feature_num),
                "unknown geometry type in feature",
            )),
        }
    }

    /// Decode the v1/v2 tags stream or the v3 attributes stream, whichever
    /// this feature carries.
    pub fn decode_attributes<H: AttributeHandler>(&self, handler: &mut H) -> Result<()> {
        if !self.tags.is_empty() {
            decode_tags(self.layer, self.feature_num, self.tags, handler)
        } else if !self.attributes.is_empty() {
            decode_structured_attributes(self.layer, self.feature_num, self.attributes, handler)
        } else {
            Ok(())
        }
    }

    pub fn decode_geometric_attributes<H: AttributeHandler>(&self, handler: &mut H) -> Result<()> {
        if self.geometric_attributes.is_empty() {
            return Ok(());
        }
        decode_structured_attributes(self.layer, self.feature_num, self.geometric_attributes, handler)
    }

    pub fn decode_all_attributes<H: AttributeHandler>(&self, handler: &mut H) -> Result<()> {
        self.decode_attributes(handler)?;
        self.decode_geometric_attributes(handler)
    }
}
