//! Error types returned by the reader and builder.

use thiserror::Error;

/// A field was malformed for the layer's declared version, or the wire
/// structure didn't match what the format requires at this point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("format error in layer {layer}{}: {message}", feature.map(|f| format!(", feature {f}")).unwrap_or_default())]
pub struct FormatError {
    pub message: String,
    pub layer: usize,
    pub feature: Option<usize>,
}

/// A layer declared a version this crate does not understand.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("layer {layer} has unknown version {version}")]
pub struct VersionError {
    pub layer: usize,
    pub version: u32,
}

/// A table lookup index was beyond the end of the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("index {index} out of range in layer {layer}")]
pub struct OutOfRangeError {
    pub layer: usize,
    pub index: usize,
}

/// The geometry payload violated the command grammar or a geometric
/// constraint such as ring closure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("geometry error in layer {layer}{}: {message}", feature.map(|f| format!(", feature {f}")).unwrap_or_default())]
pub struct GeometryError {
    pub message: String,
    pub layer: usize,
    pub feature: Option<usize>,
}

/// A value was read back as a type other than the one it was stored as.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TypeError(pub String);

/// Unified error type for every fallible operation in this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MvtError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    OutOfRange(#[from] OutOfRangeError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl MvtError {
    pub fn format(layer: usize, feature: Option<usize>, message: impl Into<String>) -> Self {
        FormatError { message: message.into(), layer, feature }.into()
    }

    pub fn version(layer: usize, version: u32) -> Self {
        VersionError { layer, version }.into()
    }

    pub fn out_of_range(layer: usize, index: usize) -> Self {
        OutOfRangeError { layer, index }.into()
    }

    pub fn geometry(layer: usize, feature: Option<usize>, message: impl Into<String>) -> Self {
        GeometryError { message: message.into(), layer, feature }.into()
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        TypeError(message.into()).into()
    }
}

pub type Result<T> = std::result::Result<T, MvtError>;
