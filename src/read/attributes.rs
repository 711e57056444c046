//! Attribute stream decoders: the v1/v2 packed tags array and the v3
//! recursive structured-value grammar.

use crate::error::{MvtError, Result};
use crate::pbf::{decode_zigzag64, PackedU32Iter, PackedU64Iter};
use crate::read::handler::AttributeHandler;
use crate::read::layer::Layer;
use crate::types::{split_structured_value, IndexValue, PropertyValue, StructuredValueType};

/// Decode a v1/v2 `tags` array: packed `(key_index, value_index)` pairs.
///
/// Unlike the v3 grammar, there is no per-entry skip here: a `false`
/// return from any event halts the whole stream immediately, the same
/// way a `false` at a v3 key only skips its paired value but a v1/v2
/// stream has no paired-value-only unit to fall back to.
pub(crate) fn decode_tags<H: AttributeHandler>(
    layer: &Layer,
    feature_num: usize,
    tags: &[u8],
    handler: &mut H,
) -> Result<()> {
    let mut iter = PackedU32Iter::new(tags, layer.index());
    loop {
        let key_idx = match iter.next() {
            None => break,
            Some(v) => v?,
        };
        let value_idx = iter
            .next()
            .ok_or_else(|| MvtError::format(layer.index(), Some(feature_num), "tags array has odd length"))??;

        let key = layer.key(key_idx as usize)?;
        if !handler.key_index(IndexValue::new(key_idx), 0) {
            return Ok(());
        }
        if !handler.attribute_key(key, 0) {
            return Ok(());
        }

        let value = layer.value(value_idx as usize)?;
        if !handler.value_index(IndexValue::new(value_idx), 0) {
            return Ok(());
        }
        if !handler.attribute_value(value, 0) {
            return Ok(());
        }
    }
    Ok(())
}

/// Decode a v3 `attributes` (or `geometric_attributes`) stream: a
/// sequence of top-level `(key_index, structured_value)` pairs.
///
/// A `false` from the key event skips only the paired value - not the
/// rest of the stream - by recursing into it with `active = false`,
/// which consumes its words without invoking any further handler calls.
pub(crate) fn decode_structured_attributes<H: AttributeHandler>(
    layer: &Layer,
    feature_num: usize,
    bytes: &[u8],
    handler: &mut H,
) -> Result<()> {
    let mut iter = PackedU64Iter::new(bytes, layer.index());
    loop {
        let key_word = match iter.next() {
            None => break,
            Some(v) => v?,
        };
        let key = layer.key(key_word as usize)?;
        let value_word = iter.next().ok_or_else(|| {
            MvtError::format(layer.index(), Some(feature_num), "attribute stream ended after a key with no paired value")
        })??;

        let active = handler.key_index(IndexValue::new(key_word as u32), 0) && handler.attribute_key(key, 0);
        decode_value(&mut iter, layer, feature_num, handler, value_word, 0, active)?;
    }
    Ok(())
}

/// Decode (or, if `active` is false, silently consume) one structured
/// value word and whatever nested payload it introduces.
fn decode_value<H: AttributeHandler>(
    iter: &mut PackedU64Iter,
    layer: &Layer,
    feature_num: usize,
    handler: &mut H,
    word: u64,
    depth: u32,
    active: bool,
) -> Result<()> {
    let (tag_raw, param) = split_structured_value(word);
    if StructuredValueType::is_reserved(tag_raw) {
        return Ok(());
    }
    let tag = StructuredValueType::from_raw(tag_raw)
        .ok_or_else(|| MvtError::format(layer.index(), Some(feature_num), format!("unknown structured value tag {tag_raw}")))?;

    match tag {
        StructuredValueType::String => {
            if active {
                let s = layer.string(param as usize)?;
                handler.attribute_value(PropertyValue::String(s), depth);
            }
            Ok(())
        }
        StructuredValueType::Float => {
            if active {
                let v = layer.float_value(param as usize)?;
                handler.attribute_value(PropertyValue::Float(v), depth);
            }
            Ok(())
        }
        StructuredValueType::Double => {
            if active {
                let v = layer.double_value(param as usize)?;
                handler.attribute_value(PropertyValue::Double(v), depth);
            }
            Ok(())
        }
        StructuredValueType::Uint => {
            if active {
                let raw = layer.int_value_raw(param as usize)?;
                handler.attribute_value(PropertyValue::Uint(raw), depth);
            }
            Ok(())
        }
        StructuredValueType::Sint => {
            if active {
                let raw = layer.int_value_raw(param as usize)?;
                handler.attribute_value(PropertyValue::Sint(decode_zigzag64(raw)), depth);
            }
            Ok(())
        }
        StructuredValueType::InlineUint => {
            if active {
                handler.attribute_value(PropertyValue::Uint(param), depth);
            }
            Ok(())
        }
        StructuredValueType::InlineSint => {
            if active {
                handler.attribute_value(PropertyValue::Sint(decode_zigzag64(param)), depth);
            }
            Ok(())
        }
        StructuredValueType::BoolOrNull => {
            if active {
                match param {
                    0 => {
                        handler.attribute_null_value(depth);
                    }
                    1 => {
                        handler.attribute_value(PropertyValue::Bool(false), depth);
                    }
                    2 => {
                        handler.attribute_value(PropertyValue::Bool(true), depth);
                    }
                    other => {
                        return Err(MvtError::format(
                            layer.index(),
                            Some(feature_num),
                            format!("invalid bool/null parameter {other}"),
                        ))
                    }
                }
            } else if param > 2 {
                return Err(MvtError::format(
                    layer.index(),
                    Some(feature_num),
                    format!("invalid bool/null parameter {param}"),
                ));
            }
            Ok(())
        }
        StructuredValueType::List => decode_list(iter, layer, feature_num, handler, param, depth, active),
        StructuredValueType::Map => decode_map(iter, layer, feature_num, handler, param, depth, active),
        StructuredValueType::NumberList => decode_number_list(iter, layer, feature_num, handler, param, depth, active),
    }
}

fn decode_list<H: AttributeHandler>(
    iter: &mut PackedU64Iter,
    layer: &Layer,
    feature_num: usize,
    handler: &mut H,
    count: u64,
    depth: u32,
    active: bool,
) -> Result<()> {
    let still_active = active && handler.start_list_attribute(count as u32, depth);
    for _ in 0..count {
        let w = iter
            .next()
            .ok_or_else(|| MvtError::format(layer.index(), Some(feature_num), "list attribute shorter than declared"))??;
        decode_value(iter, layer, feature_num, handler, w, depth + 1, still_active)?;
    }
    if still_active {
        handler.end_list_attribute(depth);
    }
    Ok(())
}

fn decode_map<H: AttributeHandler>(
    iter: &mut PackedU64Iter,
    layer: &Layer,
    feature_num: usize,
    handler: &mut H,
    count: u64,
    depth: u32,
    active: bool,
) -> Result<()> {
    let still_active = active && handler.start_map_attribute(count as u32, depth);
    for _ in 0..count {
        let key_word = iter
            .next()
            .ok_or_else(|| MvtError::format(layer.index(), Some(feature_num), "map attribute shorter than declared"))??;
        let value_word = iter.next().ok_or_else(|| {
            MvtError::format(layer.index(), Some(feature_num), "map attribute key with no paired value")
        })??;

        let pair_active = if still_active {
            let key = layer.key(key_word as usize)?;
            handler.key_index(IndexValue::new(key_word as u32), depth + 1) && handler.attribute_key(key, depth + 1)
        } else {
            false
        };
        decode_value(iter, layer, feature_num, handler, value_word, depth + 1, pair_active)?;
    }
    if still_active {
        handler.end_map_attribute(depth);
    }
    Ok(())
}

fn decode_number_list<H: AttributeHandler>(
    iter: &mut PackedU64Iter,
    layer: &Layer,
    feature_num: usize,
    handler: &mut H,
    count: u64,
    depth: u32,
    active: bool,
) -> Result<()> {
    let scaling_idx = iter
        .next()
        .ok_or_else(|| MvtError::format(layer.index(), Some(feature_num), "number list is missing its scaling index"))??;
    let scaling = layer.attribute_scaling(scaling_idx as usize)?;

    let still_active = active && handler.start_number_list(count as u32, scaling, depth);
    let mut running: i64 = 0;
    let mut emitting = still_active;
    for _ in 0..count {
        let raw = iter
            .next()
            .ok_or_else(|| MvtError::format(layer.index(), Some(feature_num), "number list shorter than declared"))??;
        if !emitting {
            continue;
        }
        if raw == 0 {
            if !handler.number_list_null_value(depth) {
                emitting = false;
            }
        } else {
            running += decode_zigzag64(raw - 1);
            let value = scaling.decode(running);
            if !handler.number_list_value(value, depth) {
                emitting = false;
            }
        }
    }
    if still_active {
        handler.end_number_list(depth);
    }
    Ok(())
}
