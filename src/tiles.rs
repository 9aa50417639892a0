//! Splits an image into tiles and builds one palette per group of similar tiles.

use crate::{binsplit::Codebook, Image, Palette, PaletteLayout, Rgbaf, TileQuantError};
use tracing::debug;

/// The number of refinement passes used when grouping tiles into palettes.
pub const TILE_GROUPING_PASSES: u32 = 32;

/// The number of refinement passes used when building the colors of a palette.
pub const PALETTE_PASSES: u32 = 32;

/// An image split into a grid of equally sized tiles.
///
/// Holds the YCoCg pixel colors of every tile, a representative color for each tile,
/// and (after [`TileSet::quantize_palettes`]) the palette group of each tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSet {
    /// The width of a tile in pixels.
    tile_width: u32,
    /// The height of a tile in pixels.
    tile_height: u32,
    /// The number of tiles in each row.
    tiles_x: u32,
    /// The number of tiles in each column.
    tiles_y: u32,
    /// The YCoCg pixel colors, stored tile by tile with each tile in raster order.
    pixels: Vec<Rgbaf>,
    /// The representative color of each tile.
    values: Vec<Rgbaf>,
    /// The palette group of each tile.
    palette_indices: Vec<u32>,
}

/// Computes the representative color of a tile's pixels.
///
/// Starting from the plain sum of the pixels, each pixel is added again scaled by
/// its per-channel weight `|pixel - mean| - 1`, and the total is divided by the sum of weights.
/// Pixels far from the mean dominate the result, so a tile with a few distinctive pixels
/// does not look like a flat tile of its dominant color.
/// For perfectly flat tiles every weight is `-1` and the value collapses to zero.
#[allow(clippy::cast_precision_loss)]
fn representative(pixels: &[Rgbaf]) -> Rgbaf {
    let mut sum = Rgbaf::ZERO;
    for &px in pixels {
        sum += px;
    }
    let mean = sum / pixels.len() as f32;

    let mut weights = Rgbaf::ZERO;
    for &px in pixels {
        let w = (px - mean).abs() - Rgbaf::splat(1.0);
        sum += px * w;
        weights += w;
    }

    sum / weights
}

impl TileSet {
    /// Splits `image` into tiles of `tile_width` by `tile_height` pixels.
    ///
    /// # Errors
    /// Returns [`TileQuantError::ZeroTileSize`] if either tile dimension is zero or
    /// [`TileQuantError::TileSizeMismatch`] if the image dimensions
    /// are not a multiple of the tile size.
    pub fn new(image: &Image, tile_width: u32, tile_height: u32) -> Result<Self, TileQuantError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(TileQuantError::ZeroTileSize);
        }

        let (width, height) = (image.width(), image.height());
        if width % tile_width != 0 || height % tile_height != 0 {
            return Err(TileQuantError::TileSizeMismatch {
                width,
                height,
                tile_width,
                tile_height,
            });
        }

        let tiles_x = width / tile_width;
        let tiles_y = height / tile_height;
        let num_tiles = tiles_x as usize * tiles_y as usize;
        let tile_len = tile_width as usize * tile_height as usize;

        let colors = image.colors();
        let mut pixels = Vec::with_capacity(image.num_pixels());
        let mut values = Vec::with_capacity(num_tiles);

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let start = pixels.len();
                for py in 0..tile_height {
                    let row = (ty * tile_height + py) as usize * width as usize;
                    let x = (tx * tile_width) as usize;
                    pixels.extend(
                        colors[(row + x)..(row + x + tile_width as usize)]
                            .iter()
                            .map(|&c| Rgbaf::from_srgba8(c).to_ycocg()),
                    );
                }
                values.push(representative(&pixels[start..(start + tile_len)]));
            }
        }

        debug!(tiles_x, tiles_y, tile_width, tile_height, "split image into tiles");

        Ok(Self {
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            pixels,
            values,
            palette_indices: vec![0; num_tiles],
        })
    }

    /// The width of a tile in pixels.
    #[must_use]
    pub const fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// The height of a tile in pixels.
    #[must_use]
    pub const fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// The number of tiles in each row.
    #[must_use]
    pub const fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    /// The number of tiles in each column.
    #[must_use]
    pub const fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    /// The total number of tiles.
    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.values.len()
    }

    /// The number of pixels in a tile.
    fn tile_len(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize
    }

    /// The YCoCg pixel colors of tile `tile` in raster order.
    #[must_use]
    pub fn tile_pixels(&self, tile: usize) -> &[Rgbaf] {
        let len = self.tile_len();
        &self.pixels[(tile * len)..((tile + 1) * len)]
    }

    /// The representative color of each tile.
    #[must_use]
    pub fn values(&self) -> &[Rgbaf] {
        &self.values
    }

    /// The palette group of each tile.
    #[must_use]
    pub fn palette_indices(&self) -> &[u32] {
        &self.palette_indices
    }

    /// The palette group of the tile containing pixel `(x, y)`.
    #[must_use]
    pub fn palette_index_at(&self, x: u32, y: u32) -> usize {
        let tile = (y / self.tile_height) as usize * self.tiles_x as usize
            + (x / self.tile_width) as usize;
        self.palette_indices[tile] as usize
    }

    /// Groups the tiles into `layout.groups()` palette groups and builds each group's palette.
    ///
    /// Tiles are grouped by clustering their representative colors.
    /// Then, for each group, the pixels of all its tiles are clustered into
    /// `layout.usable()` colors which fill the slots after the reserved ones.
    /// The reserved slots of each group receive [`Palette::sentinel`].
    ///
    /// A group that receives no tiles is left zeroed and marked as not populated.
    /// If a group has fewer distinct colors than usable slots, the extra slots are also zero.
    pub fn quantize_palettes(&mut self, layout: PaletteLayout) -> Palette {
        let groups = usize::from(layout.groups());
        let usable = usize::from(layout.usable());
        let tile_len = self.tile_len();

        let (grouping, palette_indices) =
            Codebook::build(&self.values, groups, TILE_GROUPING_PASSES);
        self.palette_indices = palette_indices;

        let largest = grouping.counts().max().unwrap_or(0) as usize;
        let mut scratch = Vec::with_capacity(largest * tile_len);

        let mut palette = Palette::new(layout);
        for group in 0..groups {
            scratch.clear();
            for (tile, &index) in self.palette_indices.iter().enumerate() {
                if index as usize == group {
                    scratch.extend_from_slice(self.tile_pixels(tile));
                }
            }

            if scratch.is_empty() {
                debug!(group, "palette group has no tiles");
                continue;
            }

            let (codebook, _) = Codebook::build(&scratch, usable, PALETTE_PASSES);
            let colors = codebook.centroids().collect::<Vec<_>>();
            palette.set_group(group, &colors);

            debug!(
                group,
                tiles = scratch.len() / tile_len,
                colors = codebook.active(),
                "built palette group"
            );
        }

        palette
    }
}
