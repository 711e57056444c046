//! End-to-end scenarios exercising the builder and reader together,
//! mirroring the concrete walkthroughs used to validate the format.

use vector_tile_core::{
    AttributeHandler, GeomType, GeometryHandler, Point2D, Point3D, PropertyValue, RingType,
    Scaling, Tile, TileBuilder,
};

#[derive(Default)]
struct EventLog {
    events: Vec<String>,
}

impl EventLog {
    fn push(&mut self, s: impl Into<String>) {
        self.events.push(s.into());
    }
}

#[derive(Default)]
struct GeomDump<P> {
    log: EventLog,
    _marker: std::marker::PhantomData<P>,
}

impl GeometryHandler for GeomDump<Point2D> {
    type Point = Point2D;

    fn points_begin(&mut self, count: u32) -> bool {
        self.log.push(format!("points_begin({count})"));
        true
    }
    fn points_point(&mut self, p: Point2D) -> bool {
        self.log.push(format!("points_point(({},{}))", p.x, p.y));
        true
    }
    fn points_end(&mut self) -> bool {
        self.log.push("points_end()");
        true
    }

    fn ring_begin(&mut self, count: u32) -> bool {
        self.log.push(format!("ring_begin({count})"));
        true
    }
    fn ring_point(&mut self, p: Point2D) -> bool {
        self.log.push(format!("ring_point(({},{}))", p.x, p.y));
        true
    }
    fn ring_end(&mut self, kind: RingType) -> bool {
        self.log.push(format!("ring_end({kind:?})"));
        true
    }

    fn controlpoints_begin(&mut self, count: u32) -> bool {
        self.log.push(format!("controlpoints_begin({count})"));
        true
    }
    fn controlpoints_point(&mut self, p: Point2D) -> bool {
        self.log.push(format!("controlpoints_point(({},{}))", p.x, p.y));
        true
    }
    fn controlpoints_end(&mut self) -> bool {
        self.log.push("controlpoints_end()");
        true
    }

    fn knots_begin(&mut self, count: u32) -> bool {
        self.log.push(format!("knots_begin({count})"));
        true
    }
    fn knots_value(&mut self, value: f64) -> bool {
        self.log.push(format!("knots_value({value})"));
        true
    }
    fn knots_end(&mut self) -> bool {
        self.log.push("knots_end()");
        true
    }
}

impl GeometryHandler for GeomDump<Point3D> {
    type Point = Point3D;

    fn points_begin(&mut self, count: u32) -> bool {
        self.log.push(format!("points_begin({count})"));
        true
    }
    fn points_point(&mut self, p: Point3D) -> bool {
        self.log.push(format!("points_point(({},{},{}))", p.x, p.y, p.z));
        true
    }
    fn points_end(&mut self) -> bool {
        self.log.push("points_end()");
        true
    }
}

#[derive(Default)]
struct AttrDump {
    log: EventLog,
}

impl AttributeHandler for AttrDump {
    fn attribute_key(&mut self, key: &str, depth: u32) -> bool {
        self.log.push(format!("{}key({key})", "  ".repeat(depth as usize)));
        true
    }
    fn attribute_value(&mut self, value: PropertyValue<'_>, depth: u32) -> bool {
        self.log.push(format!("{}value({value:?})", "  ".repeat(depth as usize)));
        true
    }
    fn attribute_null_value(&mut self, depth: u32) -> bool {
        self.log.push(format!("{}value(null)", "  ".repeat(depth as usize)));
        true
    }
    fn start_list_attribute(&mut self, count: u32, depth: u32) -> bool {
        self.log.push(format!("{}list_begin({count})", "  ".repeat(depth as usize)));
        true
    }
    fn end_list_attribute(&mut self, depth: u32) -> bool {
        self.log.push(format!("{}list_end()", "  ".repeat(depth as usize)));
        true
    }
    fn start_map_attribute(&mut self, count: u32, depth: u32) -> bool {
        self.log.push(format!("{}map_begin({count})", "  ".repeat(depth as usize)));
        true
    }
    fn end_map_attribute(&mut self, depth: u32) -> bool {
        self.log.push(format!("{}map_end()", "  ".repeat(depth as usize)));
        true
    }
}

#[test]
fn empty_tile_has_zero_layers() {
    let tile = Tile::new(&[]);
    assert_eq!(tile.count_layers().unwrap(), 0);
}

#[test]
fn single_point_feature_round_trips() {
    let mut builder = TileBuilder::new();
    {
        let layer = builder.add_layer("hello", 2, 4096);
        let mut f = layer.feature(GeomType::Point);
        f.set_integer_id(1).unwrap();
        f.add_points(1).unwrap();
        f.add_point(25, 17).unwrap();
        f.add_property("hello", PropertyValue::String("world")).unwrap();
        f.commit().unwrap();
    }
    let bytes = builder.into_bytes();

    let tile = Tile::new(&bytes);
    assert_eq!(tile.count_layers().unwrap(), 1);
    let layer = tile.layer_at(0).unwrap().unwrap();
    assert_eq!(layer.feature_count(), 1);

    let feature = layer.feature_at(0).unwrap().unwrap();
    assert_eq!(feature.geometry_type(), GeomType::Point);
    assert!(feature.has_integer_id());
    assert_eq!(feature.integer_id(), 1);

    let mut dump = GeomDump::<Point2D>::default();
    feature.decode_point_geometry(&mut dump).unwrap();
    assert_eq!(
        dump.log.events,
        vec!["points_begin(1)", "points_point((25,17))", "points_end()"]
    );

    let mut attrs = AttrDump::default();
    feature.decode_attributes(&mut attrs).unwrap();
    assert_eq!(attrs.log.events, vec!["key(hello)", "value(String(\"world\"))"]);
}

#[test]
fn multipolygon_classifies_outer_and_inner_rings() {
    let mut builder = TileBuilder::new();
    {
        let layer = builder.add_layer("areas", 2, 4096);
        let mut f = layer.feature(GeomType::Polygon);
        f.set_integer_id(1).unwrap();

        // Rings are supplied closed, GeoJSON-style: the last point repeats
        // the first. The builder checks that and emits ClosePath in its
        // place rather than writing it to the wire.
        f.add_ring(5).unwrap();
        for (x, y) in [(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)] {
            f.add_point(x, y).unwrap();
        }
        f.add_ring(5).unwrap();
        for (x, y) in [(3, 3), (3, 7), (7, 7), (7, 3), (3, 3)] {
            f.add_point(x, y).unwrap();
        }
        f.add_ring(5).unwrap();
        for (x, y) in [(4, 4), (4, 6), (6, 6), (6, 4), (4, 4)] {
            f.add_point(x, y).unwrap();
        }
        f.commit().unwrap();
    }
    let bytes = builder.into_bytes();

    let tile = Tile::new(&bytes);
    let layer = tile.layer_at(0).unwrap().unwrap();
    let feature = layer.feature_at(0).unwrap().unwrap();

    let mut dump = GeomDump::<Point2D>::default();
    feature.decode_polygon_geometry(&mut dump).unwrap();

    let ring_ends: Vec<&String> = dump.log.events.iter().filter(|e| e.starts_with("ring_end")).collect();
    assert_eq!(
        ring_ends,
        vec!["ring_end(Outer)", "ring_end(Inner)", "ring_end(Inner)"]
    );
}

#[test]
fn structured_map_attribute_decodes_in_order() {
    let mut builder = TileBuilder::new();
    {
        let layer = builder.add_layer("places", 3, 4096);
        let mut f = layer.feature(GeomType::Point);
        f.set_integer_id(1).unwrap();
        f.add_points(1).unwrap();
        f.add_point(0, 0).unwrap();

        f.add_scalar_attribute("some_int", PropertyValue::Uint(111)).unwrap();
        f.add_list_attribute(
            "list",
            &[
                Some(PropertyValue::String("foo")),
                Some(PropertyValue::Uint(17)),
                Some(PropertyValue::Sint(-22)),
                Some(PropertyValue::Bool(true)),
                Some(PropertyValue::Bool(false)),
                None,
                Some(PropertyValue::String("bar")),
                Some(PropertyValue::String("baz")),
            ],
        )
        .unwrap();
        f.add_map_attribute(
            "map",
            &[("x", Some(PropertyValue::Uint(3))), ("y", Some(PropertyValue::Uint(5)))],
        )
        .unwrap();
        f.commit().unwrap();
    }
    let bytes = builder.into_bytes();

    let tile = Tile::new(&bytes);
    let layer = tile.layer_at(0).unwrap().unwrap();
    let feature = layer.feature_at(0).unwrap().unwrap();

    let mut attrs = AttrDump::default();
    feature.decode_attributes(&mut attrs).unwrap();

    assert_eq!(
        attrs.log.events,
        vec![
            "key(some_int)",
            "value(Uint(111))",
            "key(list)",
            "list_begin(8)",
            "  value(String(\"foo\"))",
            "  value(Uint(17))",
            "  value(Sint(-22))",
            "  value(Bool(true))",
            "  value(Bool(false))",
            "  value(null)",
            "  value(String(\"bar\"))",
            "  value(String(\"baz\"))",
            "list_end()",
            "key(map)",
            "map_begin(2)",
            "  key(x)",
            "  value(Uint(3))",
            "  key(y)",
            "  value(Uint(5))",
            "map_end()",
        ]
    );
}

#[test]
fn elevated_point_round_trips_through_scaling() {
    let scaling = Scaling::new(0, 1.0, 3.0);
    let mut builder = TileBuilder::new();
    {
        let layer = builder.add_layer("peaks", 3, 4096);
        layer.set_elevation_scaling(scaling);
        let mut f = layer.feature_3d(GeomType::Point);
        f.set_integer_id(1).unwrap();
        f.add_points(1).unwrap();
        f.add_point_3d(10, 20, scaling.encode(30.0) as i32).unwrap();
        f.commit().unwrap();
    }
    let bytes = builder.into_bytes();

    let tile = Tile::new(&bytes);
    let layer = tile.layer_at(0).unwrap().unwrap();
    assert_eq!(layer.elevation_scaling(), scaling);
    let feature = layer.feature_at(0).unwrap().unwrap();
    assert!(feature.has_3d_geometry());

    // The geometry decoder yields the raw encoded z; applying the layer's
    // elevation scaling to turn it back into a logical coordinate is left
    // to the caller, the same way it is for number-list attribute values.
    let mut dump = GeomDump::<Point3D>::default();
    feature.decode_point_geometry(&mut dump).unwrap();
    assert_eq!(dump.log.events, vec!["points_begin(1)", "points_point((10,20,27))"]);
    assert!((scaling.decode(27) - 30.0).abs() < 1e-9);
}

#[test]
fn degree_two_spline_round_trips_control_points_and_knots() {
    let mut builder = TileBuilder::new();
    let scaling_index;
    {
        let layer = builder.add_layer("curves", 3, 4096);
        scaling_index = layer.add_attribute_scaling(Scaling::default());

        let mut f = layer.feature(GeomType::Spline);
        f.set_integer_id(1).unwrap();
        f.add_linestring(3).unwrap();
        for (x, y) in [(2, 2), (2, 10), (10, 10)] {
            f.add_point(x, y).unwrap();
        }
        f.set_knots(scaling_index, &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0], Scaling::default())
            .unwrap();
        f.commit().unwrap();
    }
    let bytes = builder.into_bytes();

    let tile = Tile::new(&bytes);
    let layer = tile.layer_at(0).unwrap().unwrap();
    let feature = layer.feature_at(0).unwrap().unwrap();
    assert_eq!(feature.spline_degree(), 2);

    let mut dump = GeomDump::<Point2D>::default();
    feature.decode_spline_geometry(&mut dump).unwrap();
    assert_eq!(
        dump.log.events,
        vec![
            "controlpoints_begin(3)",
            "controlpoints_point((2,2))",
            "controlpoints_point((2,10))",
            "controlpoints_point((10,10))",
            "controlpoints_end()",
            "knots_begin(6)",
            "knots_value(0)",
            "knots_value(0)",
            "knots_value(0)",
            "knots_value(0)",
            "knots_value(0)",
            "knots_value(0)",
        ]
    );
}
