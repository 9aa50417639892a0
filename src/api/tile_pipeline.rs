//! Contains the [`TilePipeline`] builder struct for the high level API.

use crate::{
    remap, BitDepth, DitherMode, Image, Palette, PaletteLayout, RemapOptions, Remapped, Rmse,
    TileQuantError, TileSet,
};
use tracing::info;

/// A builder struct to specify options for converting an image
/// to a tiled, multi-palette indexed image.
///
/// # Examples
/// Create a [`TilePipeline`] and change any options that differ from the defaults:
/// ```
/// # use tilequant::{BitDepth, DitherMode, TilePipeline};
/// let mut pipeline = TilePipeline::new();
/// pipeline
///     .palettes(8)
///     .colors_per_palette(16)
///     .reserved_per_palette(1)
///     .tile_size(8, 8)
///     .bit_depth(BitDepth::RGBA5551)
///     .dither(DitherMode::Ordered { log2_size: 2, level: 0.5 })
///     .order_colors(true);
/// ```
///
/// Then, run the pipeline on an image, replacing it with the indexed result:
/// ```no_run
/// # use tilequant::{Image, TilePipeline};
/// # fn main() -> Result<(), tilequant::TileQuantError> {
/// let mut image = Image::open("some image.png")?;
/// let rmse = TilePipeline::new().run(&mut image)?;
/// println!("{rmse}");
/// # Ok(())
/// # }
/// ```
///
/// Or, get the indices and palette without modifying the image:
/// ```no_run
/// # use tilequant::{Image, TilePipeline};
/// # fn main() -> Result<(), tilequant::TileQuantError> {
/// # let image = Image::open("some image.png")?;
/// let remapped = TilePipeline::new().remapped(&image)?;
/// let (indices, palette) = (remapped.indices, remapped.palette);
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePipeline {
    /// The number of palette groups.
    palettes: u16,
    /// The number of colors in each palette group, including reserved ones.
    colors_per_palette: u16,
    /// The number of reserved colors at the start of each palette group.
    reserved_per_palette: u16,
    /// The tile width and height in pixels.
    tile_size: (u32, u32),
    /// The options for the final remapping pass.
    options: RemapOptions,
}

impl TilePipeline {
    /// Creates a new [`TilePipeline`] with default options.
    ///
    /// The defaults are 16 palettes of 16 colors with 1 reserved color each, 8x8 tiles,
    /// a bit depth of [`BitDepth::RGBA5551`], and Floyd–Steinberg dithering at full level.
    pub fn new() -> Self {
        let layout = PaletteLayout::default();
        Self {
            palettes: layout.groups(),
            colors_per_palette: layout.size(),
            reserved_per_palette: layout.reserved(),
            tile_size: (8, 8),
            options: RemapOptions::new(),
        }
    }

    /// Sets the number of palettes (palette groups).
    pub fn palettes(&mut self, palettes: u16) -> &mut Self {
        self.palettes = palettes;
        self
    }

    /// Sets the number of colors in each palette, including reserved colors.
    pub fn colors_per_palette(&mut self, colors: u16) -> &mut Self {
        self.colors_per_palette = colors;
        self
    }

    /// Sets the number of reserved colors at the start of each palette.
    ///
    /// Reserved colors are never assigned to a pixel.
    pub fn reserved_per_palette(&mut self, reserved: u16) -> &mut Self {
        self.reserved_per_palette = reserved;
        self
    }

    /// Sets the tile width and height.
    ///
    /// The image dimensions must be a multiple of the tile size.
    pub fn tile_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.tile_size = (width, height);
        self
    }

    /// Sets the bit depth the palette is rounded to.
    pub fn bit_depth(&mut self, bit_depth: BitDepth) -> &mut Self {
        self.options.bit_depth = bit_depth;
        self
    }

    /// Sets the dither mode.
    pub fn dither(&mut self, dither: DitherMode) -> &mut Self {
        self.options.dither = dither;
        self
    }

    /// Sets whether to sort the colors of each palette by increasing brightness.
    pub fn order_colors(&mut self, order: bool) -> &mut Self {
        self.options.order_colors = order;
        self
    }

    /// The options used for the final remapping pass.
    #[must_use]
    pub const fn remap_options(&self) -> RemapOptions {
        self.options
    }

    /// Returns the validated palette layout.
    ///
    /// # Errors
    /// Returns [`TileQuantError::InvalidLayout`] if the palette options do not fit
    /// in [`MAX_COLORS`](crate::MAX_COLORS) colors or reserve every color.
    pub fn layout(&self) -> Result<PaletteLayout, TileQuantError> {
        PaletteLayout::new(
            self.palettes,
            self.colors_per_palette,
            self.reserved_per_palette,
        )
    }

    /// Splits `image` into tiles and builds the working palette.
    ///
    /// # Errors
    /// Returns an error if the palette layout is invalid
    /// or the image dimensions are not a multiple of the tile size.
    pub fn palette(&self, image: &Image) -> Result<(TileSet, Palette), TileQuantError> {
        let layout = self.layout()?;
        let (tile_width, tile_height) = self.tile_size;
        let mut tiles = TileSet::new(image, tile_width, tile_height)?;
        let palette = tiles.quantize_palettes(layout);

        let populated = (0..usize::from(layout.groups()))
            .filter(|&g| palette.is_populated(g))
            .count();

        info!(
            tiles = tiles.num_tiles(),
            populated,
            palettes = layout.groups(),
            "built palettes"
        );

        Ok((tiles, palette))
    }

    /// Runs the pipeline, returning the indexed result without modifying `image`.
    ///
    /// # Errors
    /// Returns an error if the palette layout is invalid
    /// or the image dimensions are not a multiple of the tile size.
    pub fn remapped(&self, image: &Image) -> Result<Remapped, TileQuantError> {
        let (tiles, palette) = self.palette(image)?;
        let remapped = remap(image, &tiles, palette, &self.options)?;
        info!(dither = %self.options.dither, "remapped pixels");
        Ok(remapped)
    }

    /// Runs the pipeline and replaces the storage of `image` with the indexed result.
    ///
    /// Returns the per-channel error of the result. On error, `image` is left unchanged.
    ///
    /// # Errors
    /// Returns an error if the palette layout is invalid
    /// or the image dimensions are not a multiple of the tile size.
    pub fn run(&self, image: &mut Image) -> Result<Rmse, TileQuantError> {
        self.remapped(image)?.install(image)
    }
}

impl Default for TilePipeline {
    fn default() -> Self {
        Self::new()
    }
}
