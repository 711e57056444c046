//! The tile reader: a lazy forward sequence of layers over an
//! externally-owned byte buffer.

use crate::error::Result;
use crate::pbf::{PbfReader, WireType};
use crate::read::layer::Layer;
use crate::types::pbf_tile;

/// A non-owning view over a complete MVT tile.
///
/// `Tile` itself parses nothing eagerly; every method re-scans the buffer.
/// Nothing is decoded beyond field boundaries until the caller inspects a
/// layer, which keeps a `Tile` free to construct (just a slice, no
/// allocation).
#[derive(Debug, Clone, Copy)]
pub struct Tile<'a> {
    data: &'a [u8],
}

impl<'a> Tile<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Iterate over the raw `(index, bytes)` of each layer's sub-message,
    /// without constructing a `Layer`.
    fn layer_views(&self) -> LayerViews<'a> {
        LayerViews { reader: PbfReader::new(self.data, 0), index: 0 }
    }

    /// Parse and return the layer at `index`, or `None` if the tile has
    /// fewer than `index + 1` layers.
    pub fn layer_at(&self, index: usize) -> Result<Option<Layer<'a>>> {
        for entry in self.layer_views() {
            let (i, bytes) = entry?;
            if i == index {
                return Ok(Some(Layer::new(bytes, index)?));
            }
        }
        Ok(None)
    }

    /// Parse layers in order until one matches `name`.
    pub fn layer_by_name(&self, name: &str) -> Result<Option<Layer<'a>>> {
        for entry in self.layer_views() {
            let (i, bytes) = entry?;
            let layer = Layer::new(bytes, i)?;
            if layer.name() == name {
                return Ok(Some(layer));
            }
        }
        Ok(None)
    }

    /// Count layers without parsing any of them.
    pub fn count_layers(&self) -> Result<usize> {
        let mut count = 0;
        for entry in self.layer_views() {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Iterate over all layers, parsing each as it is visited.
    pub fn iter(&self) -> Layers<'a> {
        Layers { views: self.layer_views() }
    }
}

impl<'a> IntoIterator for Tile<'a> {
    type Item = Result<Layer<'a>>;
    type IntoIter = Layers<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct LayerViews<'a> {
    reader: PbfReader<'a>,
    index: usize,
}

impl<'a> Iterator for LayerViews<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next_field() {
                Ok(Some((field, wire_type))) => {
                    if field == pbf_tile::LAYERS && wire_type == WireType::LengthDelimited {
                        let bytes = match self.reader.read_view() {
                            Ok(b) => b,
                            Err(e) => return Some(Err(e)),
                        };
                        let index = self.index;
                        self.index += 1;
                        return Some(Ok((index, bytes)));
                    }
                    if let Err(e) = self.reader.skip(wire_type) {
                        return Some(Err(e));
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Forward iterator over parsed layers, yielded in buffer order.
pub struct Layers<'a> {
    views: LayerViews<'a>,
}

impl<'a> Iterator for Layers<'a> {
    type Item = Result<Layer<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, bytes) = match self.views.next()? {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        };
        Some(Layer::new(bytes, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tile_has_no_layers() {
        let tile = Tile::new(&[]);
        assert_eq!(tile.count_layers().unwrap(), 0);
        assert!(tile.iter().next().is_none());
    }
}
