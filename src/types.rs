//! Contains various types needed across the crate.

use crate::{Rgbaf, TileQuantError, MAX_COLORS};
use palette::Srgba;
use std::{borrow::Cow, fmt::Display, ops::Range};
#[cfg(feature = "image")]
use {
    image::{codecs::bmp::BmpEncoder, ExtendedColorType, ImageError, RgbaImage},
    palette::cast::{self, ComponentsAs, IntoComponents},
    std::{fs::File, io::BufWriter, path::Path},
};

/// The backing storage of an [`Image`].
///
/// An image is either a flat list of direct colors
/// or a list of indices into a palette of at most [`MAX_COLORS`] colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pixels {
    /// One color per pixel in raster order.
    Direct(Vec<Srgba<u8>>),
    /// One palette index per pixel in raster order.
    Indexed {
        /// The palette colors.
        palette: Vec<Srgba<u8>>,
        /// The palette index of each pixel.
        indices: Vec<u8>,
    },
}

/// A fully materialized raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// The width of the image in pixels.
    width: u32,
    /// The height of the image in pixels.
    height: u32,
    /// The pixel data.
    pixels: Pixels,
}

impl Image {
    /// Checks that a buffer of `len` pixels matches the dimensions.
    fn check_len(len: usize, width: u32, height: u32) -> Result<(), TileQuantError> {
        if len == width as usize * height as usize {
            Ok(())
        } else {
            Err(TileQuantError::DimensionMismatch { len, width, height })
        }
    }

    /// Creates a direct color image.
    ///
    /// # Errors
    /// Returns [`TileQuantError::DimensionMismatch`] if `pixels.len() != width * height`.
    pub fn from_direct(
        width: u32,
        height: u32,
        pixels: Vec<Srgba<u8>>,
    ) -> Result<Self, TileQuantError> {
        Self::check_len(pixels.len(), width, height)?;
        Ok(Self { width, height, pixels: Pixels::Direct(pixels) })
    }

    /// Creates an indexed color image.
    ///
    /// # Errors
    /// Returns an error if `indices.len() != width * height`
    /// or if an index is out of range for `palette`.
    pub fn from_indexed(
        width: u32,
        height: u32,
        palette: Vec<Srgba<u8>>,
        indices: Vec<u8>,
    ) -> Result<Self, TileQuantError> {
        Self::check_len(indices.len(), width, height)?;
        if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= palette.len()) {
            return Err(TileQuantError::IndexOutOfRange { index, len: palette.len() });
        }
        Ok(Self {
            width,
            height,
            pixels: Pixels::Indexed { palette, indices },
        })
    }

    /// The width of the image in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The height of the image in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The total number of pixels.
    #[must_use]
    pub const fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns the backing pixel storage.
    #[must_use]
    pub const fn pixels(&self) -> &Pixels {
        &self.pixels
    }

    /// Consumes the image, returning its backing pixel storage.
    #[must_use]
    pub fn into_pixels(self) -> Pixels {
        self.pixels
    }

    /// Whether the image is stored as palette indices.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        matches!(self.pixels, Pixels::Indexed { .. })
    }

    /// Returns the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Srgba<u8> {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let i = y as usize * self.width as usize + x as usize;
        match &self.pixels {
            Pixels::Direct(colors) => colors[i],
            Pixels::Indexed { palette, indices } => palette[usize::from(indices[i])],
        }
    }

    /// Returns every pixel's color in raster order.
    #[must_use]
    pub fn to_colors(&self) -> Vec<Srgba<u8>> {
        match &self.pixels {
            Pixels::Direct(colors) => colors.clone(),
            Pixels::Indexed { palette, indices } => {
                indices.iter().map(|&i| palette[usize::from(i)]).collect()
            }
        }
    }

    /// Returns every pixel's color in raster order, borrowing direct color storage.
    pub(crate) fn colors(&self) -> Cow<'_, [Srgba<u8>]> {
        match &self.pixels {
            Pixels::Direct(colors) => Cow::Borrowed(colors),
            Pixels::Indexed { .. } => Cow::Owned(self.to_colors()),
        }
    }

    /// Installs new indexed storage, returning the previous storage.
    ///
    /// The dimensions stay the same, so `indices` must hold one entry per pixel.
    pub(crate) fn replace_with_indexed(
        &mut self,
        palette: Vec<Srgba<u8>>,
        indices: Vec<u8>,
    ) -> Pixels {
        debug_assert_eq!(indices.len(), self.num_pixels());
        std::mem::replace(&mut self.pixels, Pixels::Indexed { palette, indices })
    }
}

#[cfg(feature = "image")]
impl TryFrom<&RgbaImage> for Image {
    type Error = TileQuantError;

    fn try_from(image: &RgbaImage) -> Result<Self, Self::Error> {
        let pixels: &[Srgba<u8>] = image.as_raw().as_slice().components_as();
        Self::from_direct(image.width(), image.height(), pixels.to_vec())
    }
}

#[cfg(feature = "image")]
impl Image {
    /// Reads an image file, decoding it to direct color.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TileQuantError> {
        let image = image::open(path)?.into_rgba8();
        Self::try_from(&image)
    }

    /// Converts the image into an [`RgbaImage`], expanding palette indices.
    ///
    /// # Errors
    /// Returns [`TileQuantError::DimensionMismatch`] if the image buffer is inconsistent.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, TileQuantError> {
        let buf: Vec<u8> = self.to_colors().into_components();
        let len = buf.len() / 4;
        RgbaImage::from_vec(self.width, self.height, buf).ok_or(
            TileQuantError::DimensionMismatch { len, width: self.width, height: self.height },
        )
    }

    /// Writes the image to a file.
    ///
    /// Indexed images written to a `.bmp` path are saved as 8-bit paletted bitmaps.
    /// Every other combination is saved as RGBA in the format implied by the file extension.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or encoded.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TileQuantError> {
        let path = path.as_ref();
        let is_bmp = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bmp"));

        match &self.pixels {
            Pixels::Indexed { palette, indices } if is_bmp => {
                let rgb = palette
                    .iter()
                    .map(|&c| {
                        let [r, g, b, _]: [u8; 4] = cast::into_array(c);
                        [r, g, b]
                    })
                    .collect::<Vec<_>>();

                let file = File::create(path).map_err(ImageError::IoError)?;
                let mut writer = BufWriter::new(file);
                BmpEncoder::new(&mut writer).encode_with_palette(
                    indices,
                    self.width,
                    self.height,
                    ExtendedColorType::L8,
                    Some(rgb.as_slice()),
                )?;
                Ok(())
            }
            _ => Ok(self.to_rgba_image()?.save(path)?),
        }
    }
}

/// Describes how the flat output palette is split into per-tile palettes ("palette groups").
///
/// The output palette holds `groups * size` colors, which must not exceed [`MAX_COLORS`].
/// The first `reserved` slots of every group are never assigned to a pixel
/// (e.g., index `0` is commonly the transparent backdrop color on tile hardware).
///
/// # Examples
/// ```
/// # use tilequant::PaletteLayout;
/// # fn main() -> Result<(), tilequant::TileQuantError> {
/// let layout = PaletteLayout::new(16, 16, 1)?;
/// assert_eq!(layout.len(), 256);
/// assert_eq!(layout.usable(), 15);
/// assert!(PaletteLayout::new(32, 16, 1).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaletteLayout {
    /// The number of palette groups.
    groups: u16,
    /// The number of slots in each group.
    size: u16,
    /// The number of leading slots in each group that are never assigned.
    reserved: u16,
}

impl PaletteLayout {
    /// Creates a new [`PaletteLayout`].
    ///
    /// # Errors
    /// Returns [`TileQuantError::InvalidLayout`] if `groups` or `size` is zero,
    /// `groups * size` exceeds [`MAX_COLORS`], or every slot is reserved.
    pub fn new(groups: u16, size: u16, reserved: u16) -> Result<Self, TileQuantError> {
        let total = u32::from(groups) * u32::from(size);
        if groups == 0 || size == 0 || reserved >= size || total > u32::from(MAX_COLORS) {
            Err(TileQuantError::InvalidLayout { groups, size, reserved })
        } else {
            Ok(Self { groups, size, reserved })
        }
    }

    /// The number of palette groups.
    #[must_use]
    pub const fn groups(self) -> u16 {
        self.groups
    }

    /// The number of slots in each palette group.
    #[must_use]
    pub const fn size(self) -> u16 {
        self.size
    }

    /// The number of reserved slots at the start of each palette group.
    #[must_use]
    pub const fn reserved(self) -> u16 {
        self.reserved
    }

    /// The number of slots per group that pixels can be assigned to.
    #[must_use]
    pub const fn usable(self) -> u16 {
        self.size - self.reserved
    }

    /// The total number of palette slots.
    #[must_use]
    pub const fn len(self) -> usize {
        self.groups as usize * self.size as usize
    }

    /// Always `false`, since a valid layout has at least one slot.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }

    /// The flat slot range of palette group `group`.
    pub(crate) fn group_range(self, group: usize) -> Range<usize> {
        let size = usize::from(self.size);
        (group * size)..((group + 1) * size)
    }
}

impl Default for PaletteLayout {
    fn default() -> Self {
        Self { groups: 16, size: 16, reserved: 1 }
    }
}

/// A working precision palette: `groups * size` colors in the YCoCg encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    /// The group layout of `entries`.
    layout: PaletteLayout,
    /// The palette colors.
    entries: Vec<Rgbaf>,
    /// Whether each group was assigned at least one tile.
    populated: Vec<bool>,
}

impl Palette {
    /// The color written into reserved slots: a near-black gray with zero alpha.
    ///
    /// At [`BitDepth::RGBA5551`](crate::BitDepth::RGBA5551) this rounds to transparent black.
    #[must_use]
    pub fn sentinel() -> Rgbaf {
        Rgbaf::new(1.0, 1.0, 1.0, 0.0).to_ycocg()
    }

    /// Creates a palette with all entries zeroed and no populated groups.
    #[must_use]
    pub fn new(layout: PaletteLayout) -> Self {
        Self {
            layout,
            entries: vec![Rgbaf::ZERO; layout.len()],
            populated: vec![false; usize::from(layout.groups)],
        }
    }

    /// Creates a palette from YCoCg entries, marking every group as populated.
    ///
    /// # Errors
    /// Returns [`TileQuantError::PaletteLengthMismatch`] if `entries.len()` is not `layout.len()`.
    pub fn from_entries(
        layout: PaletteLayout,
        entries: Vec<Rgbaf>,
    ) -> Result<Self, TileQuantError> {
        if entries.len() == layout.len() {
            Ok(Self {
                layout,
                entries,
                populated: vec![true; usize::from(layout.groups)],
            })
        } else {
            Err(TileQuantError::PaletteLengthMismatch {
                len: entries.len(),
                expected: layout.len(),
            })
        }
    }

    /// The group layout of this palette.
    #[must_use]
    pub const fn layout(&self) -> PaletteLayout {
        self.layout
    }

    /// All entries of all groups, in group order.
    #[must_use]
    pub fn entries(&self) -> &[Rgbaf] {
        &self.entries
    }

    /// The entries of palette group `group`.
    #[must_use]
    pub fn group(&self, group: usize) -> &[Rgbaf] {
        &self.entries[self.layout.group_range(group)]
    }

    /// Whether palette group `group` had any tiles assigned to it.
    #[must_use]
    pub fn is_populated(&self, group: usize) -> bool {
        self.populated[group]
    }

    /// Overwrites palette group `group` with the reserved sentinels followed by `colors`.
    ///
    /// `colors` must hold exactly `layout.usable()` colors.
    pub(crate) fn set_group(&mut self, group: usize, colors: &[Rgbaf]) {
        let reserved = usize::from(self.layout.reserved);
        let slots = &mut self.entries[self.layout.group_range(group)];
        slots[..reserved].fill(Self::sentinel());
        slots[reserved..].copy_from_slice(colors);
        self.populated[group] = true;
    }

    /// Mutable access to all entries.
    pub(crate) fn entries_mut(&mut self) -> &mut [Rgbaf] {
        &mut self.entries
    }
}

/// The per-channel root-mean-square error of a remapped image, in direct RGBA.
///
/// Channels are on the `0.0..=255.0` scale.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rmse(pub [f32; 4]);

impl Rmse {
    /// The peak signal-to-noise ratio in decibels for each channel.
    ///
    /// A channel with zero error has an infinite PSNR.
    #[must_use]
    pub fn psnr(self) -> [f32; 4] {
        self.0.map(|e| -20.0 * (e / 255.0).log10())
    }

    /// Whether every channel was reconstructed perfectly.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.iter().all(|&e| e == 0.0)
    }
}

impl Display for Rmse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.psnr();
        write!(f, "PSNR = {{{r:.3}dB, {g:.3}dB, {b:.3}dB, {a:.3}dB}}")
    }
}
