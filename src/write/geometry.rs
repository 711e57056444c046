//! Encodes geometry commands and the parallel elevation channel into the
//! packed command/parameter streams the format expects.

use crate::pbf::{encode_zigzag32, PbfWriter};
use crate::types::{command_integer, CommandId};

/// Accumulates one feature's geometry command stream and (for 3D
/// features) its parallel elevation delta stream.
///
/// Deltas are computed by widening both operands to `i64` before
/// subtracting and truncating back, mirroring the decoder's
/// widen-then-truncate cursor arithmetic so encode/decode stay inverse
/// operations even near `i32` boundaries.
pub(crate) struct GeometryEncoder {
    commands: PbfWriter,
    elevations: PbfWriter,
    cx: i32,
    cy: i32,
    cz: i32,
}

impl GeometryEncoder {
    pub fn new() -> Self {
        Self { commands: PbfWriter::new(), elevations: PbfWriter::new(), cx: 0, cy: 0, cz: 0 }
    }

    pub fn command(&mut self, id: CommandId, count: u32) {
        self.commands.write_varint(u64::from(command_integer(id, count)));
    }

    pub fn move_to(&mut self, count: u32) {
        self.command(CommandId::MoveTo, count);
    }

    pub fn line_to(&mut self, count: u32) {
        self.command(CommandId::LineTo, count);
    }

    pub fn close_path(&mut self) {
        self.command(CommandId::ClosePath, 1);
    }

    /// The last point placed via `point_2d`/`point_3d`, or the origin if
    /// none has been placed yet.
    pub fn cursor(&self) -> (i32, i32, i32) {
        (self.cx, self.cy, self.cz)
    }

    pub fn point_2d(&mut self, x: i32, y: i32) {
        let dx = (i64::from(x) - i64::from(self.cx)) as i32;
        let dy = (i64::from(y) - i64::from(self.cy)) as i32;
        self.commands.write_varint(u64::from(encode_zigzag32(dx)));
        self.commands.write_varint(u64::from(encode_zigzag32(dy)));
        self.cx = x;
        self.cy = y;
    }

    pub fn point_3d(&mut self, x: i32, y: i32, z: i32) {
        self.point_2d(x, y);
        let dz = (i64::from(z) - i64::from(self.cz)) as i32;
        self.elevations.write_varint(u64::from(encode_zigzag32(dz)));
        self.cz = z;
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.commands.into_bytes(), self.elevations.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pbf::{decode_zigzag32, PackedU32Iter};

    #[test]
    fn point_geometry_round_trips_through_zigzag() {
        let mut enc = GeometryEncoder::new();
        enc.move_to(1);
        enc.point_2d(25, -17);
        let (commands, elevations) = enc.into_parts();
        assert!(elevations.is_empty());

        let mut iter = PackedU32Iter::new(&commands, 0);
        let cmd = iter.next().unwrap().unwrap();
        assert_eq!(cmd, command_integer(CommandId::MoveTo, 1));
        let dx = decode_zigzag32(iter.next().unwrap().unwrap());
        let dy = decode_zigzag32(iter.next().unwrap().unwrap());
        assert_eq!((dx, dy), (25, -17));
    }
}
