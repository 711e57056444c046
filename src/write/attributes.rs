//! Low-level word writers for the v1/v2 tags stream and the v3
//! structured-value stream.
//!
//! These only emit words into an already-open scratch buffer; nesting
//! discipline (matching every `start_list`/`start_map` with the right
//! number of child values) is the caller's responsibility.

use crate::pbf::{encode_zigzag64, PbfWriter};
use crate::types::{create_structured_value, IndexValue, StructuredValueType};

/// One packed `(key_index, value_index)` pair in a v1/v2 tags stream.
pub(crate) fn write_tag(tags: &mut PbfWriter, key: IndexValue, value: IndexValue) {
    tags.write_varint(u64::from(key.value()));
    tags.write_varint(u64::from(value.value()));
}

fn write_key(buf: &mut PbfWriter, key: IndexValue) {
    buf.write_varint(u64::from(key.value()));
}

/// A map entry's key word, written before its paired value item.
pub(crate) fn write_key_item(buf: &mut PbfWriter, key: IndexValue) {
    write_key(buf, key);
}

fn write_header(buf: &mut PbfWriter, tag: StructuredValueType, param: u64) {
    buf.write_varint(create_structured_value(tag, param));
}

pub(crate) fn write_string_attr(buf: &mut PbfWriter, key: IndexValue, string_index: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::String, u64::from(string_index.value()));
}

pub(crate) fn write_float_attr(buf: &mut PbfWriter, key: IndexValue, float_index: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::Float, u64::from(float_index.value()));
}

pub(crate) fn write_double_attr(buf: &mut PbfWriter, key: IndexValue, double_index: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::Double, u64::from(double_index.value()));
}

pub(crate) fn write_uint_table_attr(buf: &mut PbfWriter, key: IndexValue, int_index: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::Uint, u64::from(int_index.value()));
}

pub(crate) fn write_sint_table_attr(buf: &mut PbfWriter, key: IndexValue, int_index: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::Sint, u64::from(int_index.value()));
}

/// The inline encoding is only valid for values that fit in 60 bits;
/// callers route anything larger through the int table instead.
pub(crate) fn write_inline_uint_attr(buf: &mut PbfWriter, key: IndexValue, value: u64) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::InlineUint, value);
}

pub(crate) fn write_inline_sint_attr(buf: &mut PbfWriter, key: IndexValue, value: i64) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::InlineSint, encode_zigzag64(value));
}

pub(crate) fn write_bool_attr(buf: &mut PbfWriter, key: IndexValue, value: bool) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::BoolOrNull, if value { 2 } else { 1 });
}

pub(crate) fn write_null_attr(buf: &mut PbfWriter, key: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::BoolOrNull, 0);
}

pub(crate) fn write_list_attr(buf: &mut PbfWriter, key: IndexValue, count: u32) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::List, u64::from(count));
}

pub(crate) fn write_map_attr(buf: &mut PbfWriter, key: IndexValue, count: u32) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::Map, u64::from(count));
}

pub(crate) fn write_number_list_attr(buf: &mut PbfWriter, key: IndexValue, count: u32, scaling_index: IndexValue) {
    write_key(buf, key);
    write_header(buf, StructuredValueType::NumberList, u64::from(count));
    buf.write_varint(u64::from(scaling_index.value()));
}

/// One delta-encoded value inside an open number list; `None` writes the
/// null sentinel.
pub(crate) fn write_number_list_value(buf: &mut PbfWriter, running_delta: Option<i64>) {
    match running_delta {
        None => buf.write_varint(0),
        Some(delta) => buf.write_varint(encode_zigzag64(delta) + 1),
    }
}

/// Bare (unkeyed) structured values, for items nested inside a list -
/// lists carry their element count in the list header, not a key per item.
pub(crate) fn write_string_item(buf: &mut PbfWriter, string_index: IndexValue) {
    write_header(buf, StructuredValueType::String, u64::from(string_index.value()));
}

pub(crate) fn write_bool_item(buf: &mut PbfWriter, value: bool) {
    write_header(buf, StructuredValueType::BoolOrNull, if value { 2 } else { 1 });
}

pub(crate) fn write_null_item(buf: &mut PbfWriter) {
    write_header(buf, StructuredValueType::BoolOrNull, 0);
}

pub(crate) fn write_float_item(buf: &mut PbfWriter, float_index: IndexValue) {
    write_header(buf, StructuredValueType::Float, u64::from(float_index.value()));
}

pub(crate) fn write_double_item(buf: &mut PbfWriter, double_index: IndexValue) {
    write_header(buf, StructuredValueType::Double, u64::from(double_index.value()));
}

pub(crate) fn write_uint_table_item(buf: &mut PbfWriter, int_index: IndexValue) {
    write_header(buf, StructuredValueType::Uint, u64::from(int_index.value()));
}

pub(crate) fn write_sint_table_item(buf: &mut PbfWriter, int_index: IndexValue) {
    write_header(buf, StructuredValueType::Sint, u64::from(int_index.value()));
}

pub(crate) fn write_inline_uint_item(buf: &mut PbfWriter, value: u64) {
    write_header(buf, StructuredValueType::InlineUint, value);
}

pub(crate) fn write_inline_sint_item(buf: &mut PbfWriter, value: i64) {
    write_header(buf, StructuredValueType::InlineSint, encode_zigzag64(value));
}

pub(crate) fn write_list_item(buf: &mut PbfWriter, count: u32) {
    write_header(buf, StructuredValueType::List, u64::from(count));
}

pub(crate) fn write_map_item(buf: &mut PbfWriter, count: u32) {
    write_header(buf, StructuredValueType::Map, u64::from(count));
}

pub(crate) fn write_number_list_item(buf: &mut PbfWriter, count: u32, scaling_index: IndexValue) {
    write_header(buf, StructuredValueType::NumberList, u64::from(count));
    buf.write_varint(u64::from(scaling_index.value()));
}
