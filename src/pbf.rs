//! Minimal hand-rolled Protocol Buffers wire-format primitives.
//!
//! This is not a general-purpose protobuf implementation: it knows only the
//! handful of wire shapes the tile format uses (varint, two fixed-width
//! scalars, and length-delimited byte runs) and is written against the
//! field layout fixed in `types.rs`, not a `.proto` schema.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{MvtError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_raw(raw: u64, layer: usize) -> Result<Self> {
        match raw {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(MvtError::format(
                layer,
                None,
                format!("unsupported wire type {other}"),
            )),
        }
    }
}

/// Zig-zag decode a 32-bit value.
#[inline]
pub fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Zig-zag encode a 32-bit value.
#[inline]
pub fn encode_zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Zig-zag decode a 64-bit value.
#[inline]
pub fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Zig-zag encode a 64-bit value.
#[inline]
pub fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn read_varint_u64(data: &[u8], pos: &mut usize, layer: usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data.get(*pos).ok_or_else(|| {
            MvtError::format(layer, None, "unexpected end of buffer while reading varint")
        })?;
        *pos += 1;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(MvtError::format(layer, None, "varint too long"));
        }
    }
}

/// Forward-only reader over a byte view, yielding `(field, wire_type)` pairs.
///
/// Mirrors a minimal `pbf_message`/`pbf_reader` pair: it does not own the
/// buffer, only tracks a cursor into it.
pub struct PbfReader<'a> {
    data: &'a [u8],
    pos: usize,
    layer: usize,
}

impl<'a> PbfReader<'a> {
    pub fn new(data: &'a [u8], layer: usize) -> Self {
        Self { data, pos: 0, layer }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read the next field tag, or `None` at the end of the buffer.
    pub fn next_field(&mut self) -> Result<Option<(u32, WireType)>> {
        if self.is_empty() {
            return Ok(None);
        }
        let raw = read_varint_u64(self.data, &mut self.pos, self.layer)?;
        let field = (raw >> 3) as u32;
        let wire_type = WireType::from_raw(raw & 0x7, self.layer)?;
        Ok(Some((field, wire_type)))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        read_varint_u64(self.data, &mut self.pos, self.layer)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_varint()? as u32)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_varint()? != 0)
    }

    pub fn read_sint32(&mut self) -> Result<i32> {
        Ok(decode_zigzag32(self.read_u32()?))
    }

    pub fn read_sint64(&mut self) -> Result<i64> {
        Ok(decode_zigzag64(self.read_varint()?))
    }

    pub fn read_fixed64_bits(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_fixed32_bits(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_fixed64_bits()?))
    }

    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_fixed32_bits()?))
    }

    /// Read a length-delimited run of bytes, advancing past it.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            MvtError::format(self.layer, None, "length-delimited field length overflowed")
        })?;
        let slice = self.data.get(self.pos..end).ok_or_else(|| {
            MvtError::format(self.layer, None, "length-delimited field runs past end of buffer")
        })?;
        self.pos = end;
        Ok(slice)
    }

    /// Read a length-delimited field's contents (the length prefix plus payload).
    pub fn read_view(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> Result<&'a str> {
        let bytes = self.read_view()?;
        std::str::from_utf8(bytes)
            .map_err(|_| MvtError::format(self.layer, None, "field is not valid UTF-8"))
    }

    /// Skip a field's value given its wire type, without interpreting it.
    pub fn skip(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.read_bytes(8)?;
            }
            WireType::Fixed32 => {
                self.read_bytes(4)?;
            }
            WireType::LengthDelimited => {
                self.read_view()?;
            }
        }
        Ok(())
    }
}

/// Forward iterator over a packed run of varint-encoded `u32`s.
pub struct PackedU32Iter<'a> {
    data: &'a [u8],
    pos: usize,
    layer: usize,
}

impl<'a> PackedU32Iter<'a> {
    pub fn new(data: &'a [u8], layer: usize) -> Self {
        Self { data, pos: 0, layer }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for PackedU32Iter<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        Some(read_varint_u64(self.data, &mut self.pos, self.layer).map(|v| v as u32))
    }
}

/// Forward iterator over a packed run of varint-encoded `u64`s.
pub struct PackedU64Iter<'a> {
    data: &'a [u8],
    pos: usize,
    layer: usize,
}

impl<'a> PackedU64Iter<'a> {
    pub fn new(data: &'a [u8], layer: usize) -> Self {
        Self { data, pos: 0, layer }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for PackedU64Iter<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        Some(read_varint_u64(self.data, &mut self.pos, self.layer))
    }
}

/// Forward iterator over a packed run of zig-zagged signed 32-bit ints
/// (used for the elevations stream).
pub struct PackedSint32Iter<'a>(PackedU32Iter<'a>);

impl<'a> PackedSint32Iter<'a> {
    pub fn new(data: &'a [u8], layer: usize) -> Self {
        Self(PackedU32Iter::new(data, layer))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Iterator for PackedSint32Iter<'_> {
    type Item = Result<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|r| r.map(decode_zigzag32))
    }
}

/// Appends protobuf-framed values to an owned byte buffer.
///
/// Used both for top-level message assembly and for packed repeated
/// fields, which in this crate are always built into a private scratch
/// buffer first and then framed as one length-delimited field (see the
/// module docs in `write::feature_builder` for why this departs from the
/// reservation/backpatch scheme used by some C++ protobuf writers).
#[derive(Debug, Default, Clone)]
pub struct PbfWriter {
    buf: Vec<u8>,
}

impl PbfWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn append_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                break;
            }
            self.buf.push(byte | 0x80);
        }
    }

    fn write_tag(&mut self, field: u32, wire_type: WireType) {
        let wt = match wire_type {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        };
        self.write_varint((u64::from(field) << 3) | wt);
    }

    pub fn write_uint64_field(&mut self, field: u32, value: u64) {
        self.write_tag(field, WireType::Varint);
        self.write_varint(value);
    }

    pub fn write_uint32_field(&mut self, field: u32, value: u32) {
        self.write_uint64_field(field, u64::from(value));
    }

    pub fn write_sint32_field(&mut self, field: u32, value: i32) {
        self.write_uint64_field(field, u64::from(encode_zigzag32(value)));
    }

    pub fn write_sint64_field(&mut self, field: u32, value: i64) {
        self.write_uint64_field(field, encode_zigzag64(value));
    }

    pub fn write_bool_field(&mut self, field: u32, value: bool) {
        self.write_uint64_field(field, u64::from(value));
    }

    pub fn write_double_field(&mut self, field: u32, value: f64) {
        self.write_tag(field, WireType::Fixed64);
        let mut bytes = [0u8; 8];
        LittleEndian::write_f64(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_float_field(&mut self, field: u32, value: f32) {
        self.write_tag(field, WireType::Fixed32);
        let mut bytes = [0u8; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_bytes_field(&mut self, field: u32, bytes: &[u8]) {
        self.write_tag(field, WireType::LengthDelimited);
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string_field(&mut self, field: u32, value: &str) {
        self.write_bytes_field(field, value.as_bytes());
    }

    /// Write a packed varint field whose elements were already varint-encoded
    /// into `packed`.
    pub fn write_packed_field(&mut self, field: u32, packed: &[u8]) {
        self.write_bytes_field(field, packed);
    }
}
