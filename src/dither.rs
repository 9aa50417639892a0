//! Assigns every pixel a color from its tile's palette, with optional dithering.

use crate::{
    BitDepth, Image, Palette, PaletteLayout, Rgbaf, Rmse, TileQuantError, TileSet, MAX_K,
};
use ordered_float::OrderedFloat;
use palette::Srgba;
use std::{fmt::Display, str::FromStr};
use tracing::debug;

/// The dithering applied before each pixel is matched to a palette entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DitherMode {
    /// No dithering; every pixel gets its nearest palette entry.
    None,
    /// Floyd–Steinberg error diffusion.
    ///
    /// The accumulated error of a pixel is scaled by the given level before it is applied.
    FloydSteinberg(f32),
    /// Ordered dithering with a `2^log2_size` by `2^log2_size` threshold pattern.
    ///
    /// The threshold is scaled by the color spread of each palette group and by `level`.
    Ordered {
        /// The base 2 logarithm of the pattern size, in `1..=6`.
        log2_size: u8,
        /// The dither level.
        level: f32,
    },
}

impl DitherMode {
    /// The default level for [`DitherMode::FloydSteinberg`].
    pub const DEFAULT_DIFFUSION_LEVEL: f32 = 1.0;

    /// The default level for [`DitherMode::Ordered`].
    pub const DEFAULT_ORDERED_LEVEL: f32 = 0.5;

    /// The largest supported ordered dither pattern is `64x64`.
    pub const MAX_ORDERED_LOG2_SIZE: u8 = 6;

    /// Creates a [`DitherMode::Ordered`] for a `size` by `size` pattern.
    ///
    /// Returns `None` if `size` is not a power of two in `2..=64`.
    #[must_use]
    pub fn ordered(size: u32, level: f32) -> Option<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let log2_size = size.trailing_zeros() as u8;
        if size.is_power_of_two() && (1..=Self::MAX_ORDERED_LOG2_SIZE).contains(&log2_size) {
            Some(Self::Ordered { log2_size, level })
        } else {
            None
        }
    }
}

impl Default for DitherMode {
    fn default() -> Self {
        Self::FloydSteinberg(Self::DEFAULT_DIFFUSION_LEVEL)
    }
}

impl Display for DitherMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::None => write!(f, "none"),
            Self::FloydSteinberg(level) => write!(f, "floyd,{level}"),
            Self::Ordered { log2_size, level } => write!(f, "ord{},{level}", 1u32 << log2_size),
        }
    }
}

impl FromStr for DitherMode {
    type Err = TileQuantError;

    /// Parses `none`, `floyd[,LEVEL]`, or `ordN[,LEVEL]` where `N` is one of 2, 4, 8, 16, 32, 64.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TileQuantError::InvalidDitherMode(s.to_owned());

        let (name, level) = match s.split_once(',') {
            Some((name, level)) => {
                let level = level.trim().parse::<f32>().map_err(|_| invalid())?;
                (name, Some(level))
            }
            None => (s, None),
        };

        match name.trim() {
            "none" => Ok(Self::None),
            "floyd" => Ok(Self::FloydSteinberg(
                level.unwrap_or(Self::DEFAULT_DIFFUSION_LEVEL),
            )),
            name => name
                .strip_prefix("ord")
                .and_then(|size| size.parse().ok())
                .and_then(|size| Self::ordered(size, level.unwrap_or(Self::DEFAULT_ORDERED_LEVEL)))
                .ok_or_else(invalid),
        }
    }
}

/// Options for [`remap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemapOptions {
    /// The bit depth the palette is rounded to.
    pub bit_depth: BitDepth,
    /// The dithering applied to each pixel.
    pub dither: DitherMode,
    /// Whether to sort each palette group by increasing brightness.
    pub order_colors: bool,
}

impl RemapOptions {
    /// Creates a new [`RemapOptions`] with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bit_depth: BitDepth::default(),
            dither: DitherMode::default(),
            order_colors: false,
        }
    }
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The output of [`remap`].
#[derive(Debug, Clone, PartialEq)]
pub struct Remapped {
    /// The flat palette index of each pixel in raster order.
    pub indices: Vec<u8>,
    /// The final palette. Always has [`MAX_COLORS`](crate::MAX_COLORS) entries,
    /// with any entries past the palette layout set to zero.
    pub palette: Vec<Srgba<u8>>,
    /// The per-channel error between the source image and the remapped image.
    pub rmse: Rmse,
}

impl Remapped {
    /// Replaces the storage of `image` with the indexed result, releasing the previous storage.
    ///
    /// `image` should be the image that was remapped. Returns the error of the remapped image.
    ///
    /// # Errors
    /// Returns [`TileQuantError::DimensionMismatch`] if `image` has a different number of pixels.
    pub fn install(self, image: &mut Image) -> Result<Rmse, TileQuantError> {
        if self.indices.len() == image.num_pixels() {
            drop(image.replace_with_indexed(self.palette, self.indices));
            Ok(self.rmse)
        } else {
            Err(TileQuantError::DimensionMismatch {
                len: self.indices.len(),
                width: image.width(),
                height: image.height(),
            })
        }
    }
}

/// Rounds every palette entry to the given bit depth.
///
/// Every other entry is nudged by a quarter step first,
/// so that neighboring entries do not all round the same way.
fn requantize(entries: &mut [Rgbaf], bit_depth: BitDepth) {
    let offset = bit_depth.from_fixed([1, 1, 1, 0]) * 0.25;
    for (i, entry) in entries.iter_mut().enumerate() {
        let mut color = entry.from_ycocg();
        if i % 2 == 1 {
            color = color + offset;
        }
        *entry = bit_depth.requantize(color).to_ycocg();
    }
}

/// Sorts the assignable entries of each palette group by increasing brightness.
fn order_colors(palette: &mut Palette) {
    let layout = palette.layout();
    let reserved = usize::from(layout.reserved());
    let brightness = Rgbaf::new(0.33, 0.33, 0.33, 0.0);
    for group in 0..usize::from(layout.groups()) {
        let range = layout.group_range(group);
        palette.entries_mut()[range][reserved..]
            .sort_by_key(|&c| OrderedFloat(c.from_ycocg().dot(brightness)));
    }
}

/// Computes the ordered dither amplitude of each palette group.
///
/// This is a weighted average of the absolute deviation of the group's assignable entries
/// from their mean, where larger deviations get more weight. Alpha is never dithered.
#[allow(clippy::cast_precision_loss)]
fn spreads(palette: &Palette, level: f32) -> Vec<Rgbaf> {
    let layout = palette.layout();
    let reserved = usize::from(layout.reserved());
    (0..usize::from(layout.groups()))
        .map(|group| {
            let entries = &palette.group(group)[reserved..];

            let mut mean = Rgbaf::ZERO;
            for &entry in entries {
                mean += entry;
            }
            let mean = mean / entries.len() as f32;

            let mut spread = Rgbaf::ZERO;
            let mut weights = Rgbaf::ZERO;
            for &entry in entries {
                let d = (entry - mean).abs();
                let w = d.sqrt();
                spread += d * w;
                weights += w;
            }

            spread.div_safe(weights, Rgbaf::ZERO).with_alpha(0.0) * level
        })
        .collect()
}

/// The position of pixel `(x, y)` in a `2^log2_size` by `2^log2_size` ordered dither pattern.
///
/// The result is in `0..4^log2_size`, and each value occurs exactly once in each aligned block.
fn threshold_index(x: u32, y: u32, log2_size: u8) -> u32 {
    let mut index = 0;
    let mut x_key = x;
    let mut y_key = x ^ y;
    for _ in 0..log2_size {
        index = index * 2 + (y_key & 1);
        y_key >>= 1;
        index = index * 2 + (x_key & 1);
        x_key >>= 1;
    }
    index
}

/// The ordered dither threshold of pixel `(x, y)`, in `-0.5..0.5`.
#[allow(clippy::cast_precision_loss)]
fn threshold(x: u32, y: u32, log2_size: u8) -> f32 {
    let cells = 1u32 << (2 * u32::from(log2_size));
    threshold_index(x, y, log2_size) as f32 / cells as f32 - 0.5
}

/// Returns the index of the entry in `entries` nearest to `color`.
///
/// Ties go to the lower index.
#[inline]
fn nearest(entries: &[Rgbaf], color: Rgbaf) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, &entry) in entries.iter().enumerate() {
        let dist = color.distance(entry);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Propagates, stores, and applies the diffused error to the pixels.
///
/// Holds the error for the current and the next row of pixels,
/// each padded with one cell on both sides to absorb error diffused past the image edge.
struct ErrorBuf {
    /// The width of a row of pixels.
    width: usize,
    /// The propagated error for the current row of pixels.
    this_err: Vec<Rgbaf>,
    /// The propagated error for the next row of pixels.
    next_err: Vec<Rgbaf>,
}

impl ErrorBuf {
    /// Creates a new `ErrorBuf` with no error.
    fn new(width: usize) -> Self {
        Self {
            width,
            this_err: vec![Rgbaf::ZERO; width + 2],
            next_err: vec![Rgbaf::ZERO; width + 2],
        }
    }

    /// Propagate error using floyd steinberg dithering, going from left to right.
    #[inline]
    fn propagate(&mut self, x: usize, err: Rgbaf) {
        self.this_err[x + 2] += err * (7.0 / 16.0);
        self.next_err[x] += err * (3.0 / 16.0);
        self.next_err[x + 1] += err * (5.0 / 16.0);
        self.next_err[x + 2] = err * (1.0 / 16.0);
    }

    /// The accumulated error at column `x` of the current row.
    #[inline]
    fn get(&self, x: usize) -> Rgbaf {
        self.this_err[x + 1]
    }

    /// Reset and swap the error buffers for the next row of pixels.
    #[inline]
    fn next_row(&mut self) {
        std::mem::swap(&mut self.this_err, &mut self.next_err);
        self.next_err[0] = Rgbaf::ZERO;
        self.next_err[1] = Rgbaf::ZERO;
    }

    /// The error that landed inside the image on the current row.
    #[cfg(test)]
    fn this_row(&self) -> &[Rgbaf] {
        &self.this_err[1..=self.width]
    }

    /// The error that landed inside the image on the next row.
    #[cfg(test)]
    fn next_row_errors(&self) -> &[Rgbaf] {
        &self.next_err[1..=self.width]
    }
}

/// Checks that `tiles` and `palette` can be used to remap `image`.
fn check_inputs(
    image: &Image,
    tiles: &TileSet,
    layout: PaletteLayout,
) -> Result<(), TileQuantError> {
    if tiles.tiles_x() * tiles.tile_width() != image.width()
        || tiles.tiles_y() * tiles.tile_height() != image.height()
    {
        return Err(TileQuantError::TileSizeMismatch {
            width: image.width(),
            height: image.height(),
            tile_width: tiles.tile_width(),
            tile_height: tiles.tile_height(),
        });
    }

    if tiles
        .palette_indices()
        .iter()
        .any(|&group| group >= u32::from(layout.groups()))
    {
        return Err(TileQuantError::InvalidLayout {
            groups: layout.groups(),
            size: layout.size(),
            reserved: layout.reserved(),
        });
    }

    Ok(())
}

/// Assigns each pixel of `image` the nearest color of its tile's palette group.
///
/// First, `palette` is rounded to `options.bit_depth` and optionally sorted.
/// Then, pixels are visited in raster order and perturbed according to `options.dither`
/// before being matched against the assignable (non-reserved) entries of their group.
/// The error of each pixel is measured against the unperturbed source color.
///
/// `tiles` must have been built from `image`, and `palette` from `tiles`.
/// The image itself is not modified; see [`Remapped::install`].
///
/// # Errors
/// Returns an error if `tiles` does not match the dimensions of `image`
/// or refers to palette groups that `palette` does not have.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn remap(
    image: &Image,
    tiles: &TileSet,
    mut palette: Palette,
    options: &RemapOptions,
) -> Result<Remapped, TileQuantError> {
    let layout = palette.layout();
    check_inputs(image, tiles, layout)?;

    let (width, height) = (image.width(), image.height());
    let size = usize::from(layout.size());
    let reserved = usize::from(layout.reserved());

    requantize(palette.entries_mut(), options.bit_depth);

    let spreads = match options.dither {
        DitherMode::Ordered { level, .. } => spreads(&palette, level),
        DitherMode::None | DitherMode::FloydSteinberg(_) => Vec::new(),
    };

    if options.order_colors {
        order_colors(&mut palette);
    }

    let colors = image.colors();
    let entries = palette.entries();
    let mut error = ErrorBuf::new(width as usize);
    let mut indices = Vec::with_capacity(image.num_pixels());
    let mut sum_sq = Rgbaf::ZERO;

    for (y, row) in (0..height).zip(colors.chunks_exact(width.max(1) as usize)) {
        for (x, &color) in (0..width).zip(row) {
            let group = tiles.palette_index_at(x, y);
            let original = Rgbaf::from_srgba8(color).to_ycocg();

            let point = match options.dither {
                DitherMode::None => original,
                DitherMode::FloydSteinberg(level) => {
                    original + error.get(x as usize).with_alpha(0.0) * level
                }
                DitherMode::Ordered { log2_size, .. } => {
                    original + spreads[group] * threshold(x, y, log2_size)
                }
            };

            let start = group * size;
            let slot = reserved + nearest(&entries[(start + reserved)..(start + size)], point);
            let index = start + slot;
            indices.push(index as u8);

            let err = original - entries[index];
            if let DitherMode::FloydSteinberg(_) = options.dither {
                error.propagate(x as usize, err);
            }

            let err = err.from_ycocg();
            sum_sq += err * err;
        }
        error.next_row();
    }

    let rmse = if indices.is_empty() {
        Rmse::default()
    } else {
        Rmse((sum_sq / indices.len() as f32).sqrt().to_array())
    };

    let mut output = entries
        .iter()
        .map(|c| c.from_ycocg().to_srgba8())
        .collect::<Vec<_>>();
    output.resize(MAX_K, Srgba::new(0, 0, 0, 0));

    debug!(width, height, dither = %options.dither, %rmse, "remapped image");

    Ok(Remapped { indices, palette: output, rmse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn assert_close(a: Rgbaf, b: Rgbaf) {
        for (x, y) in a.to_array().into_iter().zip(b.to_array()) {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    fn sum(errors: &[Rgbaf]) -> Rgbaf {
        errors.iter().fold(Rgbaf::ZERO, |acc, &e| acc + e)
    }

    #[test]
    fn parse_dither_mode() {
        assert_eq!("none".parse::<DitherMode>().ok(), Some(DitherMode::None));
        assert_eq!(
            "floyd".parse::<DitherMode>().ok(),
            Some(DitherMode::FloydSteinberg(1.0))
        );
        assert_eq!(
            "floyd,0.75".parse::<DitherMode>().ok(),
            Some(DitherMode::FloydSteinberg(0.75))
        );
        assert_eq!(
            "ord8".parse::<DitherMode>().ok(),
            Some(DitherMode::Ordered { log2_size: 3, level: 0.5 })
        );
        assert_eq!(
            "ord64,0.25".parse::<DitherMode>().ok(),
            Some(DitherMode::Ordered { log2_size: 6, level: 0.25 })
        );
        for bad in ["", "floyd,", "floyd,x", "ord", "ord1", "ord3", "ord128", "bayer"] {
            assert!(bad.parse::<DitherMode>().is_err(), "{bad}");
        }
    }

    #[test]
    fn display_round_trips() {
        for mode in [
            DitherMode::None,
            DitherMode::FloydSteinberg(0.5),
            DitherMode::Ordered { log2_size: 4, level: 0.5 },
        ] {
            assert_eq!(mode.to_string().parse::<DitherMode>().ok(), Some(mode));
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn threshold_values() {
        assert_eq!(threshold(0, 0, 1), -0.5);
        assert_eq!(threshold(1, 0, 1), 0.25);
        assert_eq!(threshold(0, 1, 1), 0.0);
        assert_eq!(threshold(1, 1, 1), -0.25);

        for log2_size in 1..=DitherMode::MAX_ORDERED_LOG2_SIZE {
            let n = 1u32 << log2_size;
            let mut seen = vec![false; (n * n) as usize];
            for y in 0..n {
                for x in 0..n {
                    let i = threshold_index(x + 3 * n, y + n, log2_size);
                    assert!(!seen[i as usize]);
                    seen[i as usize] = true;
                    assert!((-0.5..0.5).contains(&threshold(x, y, log2_size)));
                }
            }
            assert!(seen.into_iter().all(|s| s));
        }
    }

    #[test]
    fn diffusion_conserves_interior_error() {
        let err = Rgbaf::new(16.0, -32.0, 8.0, 0.0);
        let mut buf = ErrorBuf::new(5);
        buf.propagate(2, err);
        assert_close(sum(buf.this_row()) + sum(buf.next_row_errors()), err);
        assert_close(buf.this_row()[3], err * (7.0 / 16.0));
        assert_close(buf.next_row_errors()[1], err * (3.0 / 16.0));
        assert_close(buf.next_row_errors()[2], err * (5.0 / 16.0));
        assert_close(buf.next_row_errors()[3], err * (1.0 / 16.0));
    }

    #[test]
    fn diffusion_drops_error_past_edges() {
        let err = Rgbaf::splat(16.0);

        let mut left = ErrorBuf::new(5);
        left.propagate(0, err);
        assert_close(sum(left.this_row()) + sum(left.next_row_errors()), err * (13.0 / 16.0));

        let mut right = ErrorBuf::new(5);
        right.propagate(4, err);
        assert_close(sum(right.this_row()) + sum(right.next_row_errors()), err * (8.0 / 16.0));

        // a single row image only keeps the error sent to the right
        let mut single_row = ErrorBuf::new(5);
        single_row.propagate(2, err);
        assert_close(sum(single_row.this_row()), err * (7.0 / 16.0));
    }

    #[test]
    fn diffusion_moves_to_next_row() {
        let err = Rgbaf::splat(16.0);
        let mut buf = ErrorBuf::new(3);
        buf.propagate(1, err);
        buf.next_row();
        assert_close(buf.get(0), err * (3.0 / 16.0));
        assert_close(buf.get(1), err * (5.0 / 16.0));
        assert_close(buf.get(2), err * (1.0 / 16.0));
    }

    #[test]
    fn exact_matches_have_zero_error() {
        let colors = [
            Srgba::new(255, 0, 0, 255),
            Srgba::new(0, 255, 0, 255),
            Srgba::new(0, 0, 255, 255),
            Srgba::new(255, 255, 255, 255),
        ];
        let image = block_image(2, 2, 4, &colors);
        let tiles = TileSet::new(&image, 4, 4).unwrap();

        let layout = PaletteLayout::new(1, 5, 1).unwrap();
        let mut entries = vec![Palette::sentinel()];
        entries.extend(colors.iter().rev().map(|&c| Rgbaf::from_srgba8(c).to_ycocg()));
        let palette = Palette::from_entries(layout, entries).unwrap();

        let options = RemapOptions {
            bit_depth: BitDepth::RGBA8888,
            dither: DitherMode::None,
            order_colors: false,
        };
        let remapped = remap(&image, &tiles, palette, &options).unwrap();

        assert!(remapped.rmse.is_zero());
        assert_eq!(remapped.palette.len(), MAX_K);
        assert!(remapped.palette[5..].iter().all(|&c| c == Srgba::new(0, 0, 0, 0)));
        for (&index, color) in remapped.indices.iter().zip(image.to_colors()) {
            assert_ne!(index, 0);
            assert_eq!(remapped.palette[usize::from(index)], color);
        }
    }

    #[test]
    fn reserved_entries_are_never_used() {
        let image = test_image(32, 32);
        let mut tiles = TileSet::new(&image, 8, 8).unwrap();
        let layout = PaletteLayout::new(4, 8, 3).unwrap();
        let palette = tiles.quantize_palettes(layout);

        for dither in [
            DitherMode::None,
            DitherMode::FloydSteinberg(1.0),
            DitherMode::Ordered { log2_size: 2, level: 0.5 },
        ] {
            let options = RemapOptions { dither, ..RemapOptions::new() };
            let remapped = remap(&image, &tiles, palette.clone(), &options).unwrap();
            assert_eq!(remapped.indices.len(), 32 * 32);
            for (i, &index) in remapped.indices.iter().enumerate() {
                let (x, y) = ((i % 32) as u32, (i / 32) as u32);
                let index = usize::from(index);
                assert_eq!(index / 8, tiles.palette_index_at(x, y));
                assert!(index % 8 >= 3);
            }
        }
    }

    #[test]
    fn reserved_entries_are_transparent_black() {
        let image = test_image(16, 16);
        let mut tiles = TileSet::new(&image, 8, 8).unwrap();
        let layout = PaletteLayout::new(2, 4, 2).unwrap();
        let palette = tiles.quantize_palettes(layout);

        let remapped = remap(&image, &tiles, palette.clone(), &RemapOptions::new()).unwrap();
        let options = RemapOptions { bit_depth: BitDepth::RGBA8888, ..RemapOptions::new() };
        let full_depth = remap(&image, &tiles, palette.clone(), &options).unwrap();

        let mut populated = 0;
        for group in (0..2).filter(|&g| palette.is_populated(g)) {
            populated += 1;
            for slot in 0..2 {
                let index = group * 4 + slot;
                assert_eq!(remapped.palette[index], Srgba::new(0, 0, 0, 0));
                assert_eq!(full_depth.palette[index], Srgba::new(1, 1, 1, 0));
            }
        }
        assert!(populated > 0);
    }

    fn black_and_white() -> Palette {
        let entries = [Srgba::new(0, 0, 0, 255), Srgba::new(255, 255, 255, 255)]
            .map(|c| Rgbaf::from_srgba8(c).to_ycocg())
            .to_vec();
        Palette::from_entries(PaletteLayout::new(1, 2, 0).unwrap(), entries).unwrap()
    }

    fn remap_gray_tile(dither: DitherMode) -> Vec<u8> {
        let image = block_image(1, 1, 8, &[Srgba::new(128, 128, 128, 255)]);
        let tiles = TileSet::new(&image, 8, 8).unwrap();
        let options = RemapOptions {
            bit_depth: BitDepth::RGBA8888,
            dither,
            order_colors: false,
        };
        remap(&image, &tiles, black_and_white(), &options).unwrap().indices
    }

    #[test]
    fn dithering_mixes_colors() {
        let white = |indices: Vec<u8>| indices.into_iter().filter(|&i| i == 1).count();

        assert_eq!(white(remap_gray_tile(DitherMode::None)), 64);
        assert_eq!(white(remap_gray_tile(DitherMode::FloydSteinberg(1.0))), 32);
        assert_eq!(
            white(remap_gray_tile(DitherMode::Ordered { log2_size: 2, level: 0.5 })),
            32
        );
    }

    #[test]
    fn zero_diffusion_level_is_undithered() {
        assert_eq!(
            remap_gray_tile(DitherMode::FloydSteinberg(0.0)),
            remap_gray_tile(DitherMode::None)
        );
    }

    #[test]
    fn spread_of_black_and_white() {
        let spreads = spreads(&black_and_white(), 0.5);
        assert_eq!(spreads.len(), 1);
        assert_close(spreads[0], Rgbaf::new(63.75, 0.0, 0.0, 0.0));
    }

    #[test]
    fn ordered_colors_are_sorted_by_brightness() {
        let image = test_image(16, 16);
        let mut tiles = TileSet::new(&image, 8, 8).unwrap();
        let layout = PaletteLayout::new(2, 8, 1).unwrap();
        let palette = tiles.quantize_palettes(layout);
        let options = RemapOptions {
            bit_depth: BitDepth::RGBA8888,
            order_colors: true,
            ..RemapOptions::new()
        };
        let remapped = remap(&image, &tiles, palette, &options).unwrap();

        for group in remapped.palette[..16].chunks_exact(8) {
            let brightness = group[1..]
                .iter()
                .map(|c| {
                    let [r, g, b, _] = [c.red, c.green, c.blue, c.alpha].map(u32::from);
                    r + g + b
                })
                .collect::<Vec<_>>();
            assert!(brightness.windows(2).all(|w| w[0] <= w[1]), "{brightness:?}");
        }
    }

    #[test]
    fn requantize_alternates_offset() {
        let depth = BitDepth::new([2, 2, 2, 1]).unwrap();
        // 0.3 steps above level 1, which only rounds up with the offset
        let step = 255.0 / 3.0;
        let color = Rgbaf::new(step * 1.3, step * 1.3, step * 1.3, 255.0).to_ycocg();
        let mut entries = vec![color; 2];
        requantize(&mut entries, depth);

        assert_close(entries[0].from_ycocg(), Rgbaf::new(step, step, step, 255.0));
        assert_close(
            entries[1].from_ycocg(),
            Rgbaf::new(2.0 * step, 2.0 * step, 2.0 * step, 255.0),
        );
    }

    #[test]
    fn rejects_mismatched_tiles() {
        let image = test_image(16, 16);
        let other = test_image(16, 8);
        let mut tiles = TileSet::new(&other, 8, 8).unwrap();
        let palette = tiles.quantize_palettes(PaletteLayout::default());
        assert!(remap(&image, &tiles, palette, &RemapOptions::new()).is_err());
    }
}
