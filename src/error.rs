//! Contains the crate's error type.

use thiserror::Error;

/// The error type for tile quantization.
///
/// Every error is terminal for the current invocation:
/// no partially processed image is ever produced.
#[derive(Debug, Error)]
pub enum TileQuantError {
    /// The image dimensions are not an exact multiple of the tile size.
    #[error(
        "image size {width}x{height} is not a multiple of the tile size {tile_width}x{tile_height}"
    )]
    TileSizeMismatch {
        /// The image width.
        width: u32,
        /// The image height.
        height: u32,
        /// The tile width.
        tile_width: u32,
        /// The tile height.
        tile_height: u32,
    },

    /// A tile width or height of zero was given.
    #[error("tile dimensions cannot be zero")]
    ZeroTileSize,

    /// The palette layout does not fit in 256 colors or reserves every slot.
    #[error("invalid palette layout: {groups} palettes of {size} colors with {reserved} reserved")]
    InvalidLayout {
        /// The number of palette groups.
        groups: u16,
        /// The number of colors per palette group.
        size: u16,
        /// The number of reserved colors per palette group.
        reserved: u16,
    },

    /// A pixel buffer does not match the given image dimensions.
    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        /// The length of the pixel buffer.
        len: usize,
        /// The image width.
        width: u32,
        /// The image height.
        height: u32,
    },

    /// A palette was given the wrong number of entries for its layout.
    #[error("palette has {len} entries but its layout needs {expected}")]
    PaletteLengthMismatch {
        /// The number of entries given.
        len: usize,
        /// The number of entries the layout needs.
        expected: usize,
    },

    /// An indexed image refers to a palette entry that does not exist.
    #[error("pixel index {index} is out of range for a palette of {len} colors")]
    IndexOutOfRange {
        /// The offending index.
        index: u8,
        /// The palette length.
        len: usize,
    },

    /// A bit depth could not be parsed or has more than 8 bits in a channel.
    #[error("invalid bit depth {0:?}, expected four digits between 0 and 8 (e.g., 5551)")]
    InvalidBitDepth(String),

    /// A dither mode could not be parsed.
    #[error("invalid dither mode {0:?}")]
    InvalidDitherMode(String),

    /// The image could not be read, written, or converted.
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
