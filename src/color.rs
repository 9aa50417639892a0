//! Contains the float color vector and fixed-point bit depth conversions.

use crate::TileQuantError;
use num_traits::Zero;
use palette::{cast, Srgba};
use std::{
    array,
    fmt::{Debug, Display},
    ops::{Add, AddAssign, Div, Mul, Sub},
    str::FromStr,
};
use wide::f32x4;

/// A color with 4 float channels on a `0.0..=255.0` scale.
///
/// Depending on context, the channels hold either direct RGBA
/// or the decorrelated YCoCg + alpha encoding returned by [`Rgbaf::to_ycocg`].
/// The type does not track which of the two it holds, so conversions must be done explicitly.
/// All clustering and dithering is performed on the YCoCg encoding.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Rgbaf(f32x4);

impl Rgbaf {
    /// All channels set to zero.
    pub const ZERO: Self = Self(f32x4::ZERO);

    /// Creates a new [`Rgbaf`] from its four channels.
    #[must_use]
    pub fn new(c0: f32, c1: f32, c2: f32, c3: f32) -> Self {
        Self(f32x4::new([c0, c1, c2, c3]))
    }

    /// Creates a new [`Rgbaf`] with every channel set to `value`.
    #[must_use]
    pub fn splat(value: f32) -> Self {
        Self(f32x4::splat(value))
    }

    /// Creates a new [`Rgbaf`] from an array of channels.
    #[must_use]
    pub fn from_array(channels: [f32; 4]) -> Self {
        Self(f32x4::new(channels))
    }

    /// Returns the channels as an array.
    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        self.0.to_array()
    }

    /// Converts an 8-bit color to float without changing its scale.
    #[must_use]
    pub fn from_srgba8(color: Srgba<u8>) -> Self {
        let [r, g, b, a]: [u8; 4] = cast::into_array(color);
        Self::new(r.into(), g.into(), b.into(), a.into())
    }

    /// Rounds and clamps each channel back to an 8-bit color.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_srgba8(self) -> Srgba<u8> {
        let [r, g, b, a] = self.to_array().map(|c| c.clamp(0.0, 255.0).round() as u8);
        Srgba::new(r, g, b, a)
    }

    /// Converts direct RGBA to YCoCg, leaving alpha untouched.
    #[must_use]
    pub fn to_ycocg(self) -> Self {
        let [r, g, b, a] = self.to_array();
        Self::new(
            (r + 2.0 * g + b) * 0.25,
            (r - b) * 0.5,
            (2.0 * g - r - b) * 0.25,
            a,
        )
    }

    /// Converts YCoCg back to direct RGBA, leaving alpha untouched.
    #[must_use]
    pub fn from_ycocg(self) -> Self {
        let [y, co, cg, a] = self.to_array();
        let t = y - cg;
        Self::new(t + co, y + cg, t - co, a)
    }

    /// Component-wise absolute value.
    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Component-wise square root.
    #[must_use]
    pub fn sqrt(self) -> Self {
        Self(self.0.sqrt())
    }

    /// Dot product of two colors.
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        let mut sum = 0.0;
        for c in (self * other).to_array() {
            sum += c;
        }
        sum
    }

    /// Squared magnitude.
    #[must_use]
    pub fn len2(self) -> f32 {
        self.dot(self)
    }

    /// The color distance metric: squared euclidean distance over all four channels.
    ///
    /// The same metric is used for clustering and for nearest palette entry lookups.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).len2()
    }

    /// Component-wise division that substitutes the matching channel of `fallback`
    /// wherever the divisor channel is zero.
    #[must_use]
    pub fn div_safe(self, divisor: Self, fallback: Self) -> Self {
        let (x, d, f) = (self.to_array(), divisor.to_array(), fallback.to_array());
        Self::from_array(array::from_fn(|i| if d[i] == 0.0 { f[i] } else { x[i] / d[i] }))
    }

    /// Replaces the alpha channel.
    #[must_use]
    pub fn with_alpha(self, alpha: f32) -> Self {
        let [c0, c1, c2, _] = self.to_array();
        Self::new(c0, c1, c2, alpha)
    }
}

impl Default for Rgbaf {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Debug for Rgbaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rgbaf").field(&self.to_array()).finish()
    }
}

impl PartialEq for Rgbaf {
    fn eq(&self, other: &Self) -> bool {
        self.to_array() == other.to_array()
    }
}

impl Add for Rgbaf {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Rgbaf {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0 + rhs.0;
    }
}

impl Sub for Rgbaf {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul for Rgbaf {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl Mul<f32> for Rgbaf {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * f32x4::splat(rhs))
    }
}

impl Div for Rgbaf {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0 / rhs.0)
    }
}

impl Div<f32> for Rgbaf {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f32) -> Self::Output {
        Self(self.0 / f32x4::splat(rhs))
    }
}

impl Zero for Rgbaf {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&c| c == 0.0)
    }
}

/// The number of bits per channel of the target hardware color format.
///
/// Palette colors are requantized to this bit depth before pixels are assigned,
/// so that the reported error reflects what the hardware can actually display.
///
/// # Examples
/// ```
/// # use tilequant::BitDepth;
/// # fn main() -> Result<(), tilequant::TileQuantError> {
/// let depth: BitDepth = "5551".parse()?;
/// assert_eq!(depth, BitDepth::RGBA5551);
/// assert_eq!(depth.masks(), [31, 31, 31, 1]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitDepth([u8; 4]);

impl BitDepth {
    /// 5 bits for each color channel and 1 bit of alpha (the default).
    pub const RGBA5551: Self = Self([5, 5, 5, 1]);

    /// Full 8-bit precision for every channel.
    pub const RGBA8888: Self = Self([8, 8, 8, 8]);

    /// Creates a new [`BitDepth`] from the number of bits for each of the RGBA channels.
    ///
    /// # Errors
    /// Returns [`TileQuantError::InvalidBitDepth`] if any channel has more than 8 bits.
    pub fn new(bits: [u8; 4]) -> Result<Self, TileQuantError> {
        if bits.iter().all(|&b| b <= 8) {
            Ok(Self(bits))
        } else {
            Err(TileQuantError::InvalidBitDepth(format!("{bits:?}")))
        }
    }

    /// Returns the number of bits for each channel.
    #[must_use]
    pub const fn bits(self) -> [u8; 4] {
        self.0
    }

    /// Returns the largest fixed-point value for each channel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn masks(self) -> [u8; 4] {
        self.0.map(|b| ((1u16 << b) - 1) as u8)
    }

    /// Converts a direct color to the fixed-point representation, rounding to nearest.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_fixed(self, color: Rgbaf) -> [u8; 4] {
        let masks = self.masks();
        let color = color.to_array();
        array::from_fn(|i| {
            (color[i].clamp(0.0, 255.0) * f32::from(masks[i]) / 255.0).round() as u8
        })
    }

    /// Converts a fixed-point color back to a direct color on the `0.0..=255.0` scale.
    #[must_use]
    pub fn from_fixed(self, fixed: [u8; 4]) -> Rgbaf {
        let masks = self.masks();
        Rgbaf::from_array(array::from_fn(|i| {
            if masks[i] == 0 {
                0.0
            } else {
                f32::from(fixed[i]) * 255.0 / f32::from(masks[i])
            }
        }))
    }

    /// Rounds a direct color to the nearest color representable at this bit depth.
    #[must_use]
    pub fn requantize(self, color: Rgbaf) -> Rgbaf {
        self.from_fixed(self.to_fixed(color))
    }
}

impl Default for BitDepth {
    fn default() -> Self {
        Self::RGBA5551
    }
}

impl Display for BitDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "{r}{g}{b}{a}")
    }
}

impl FromStr for BitDepth {
    type Err = TileQuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TileQuantError::InvalidBitDepth(s.to_owned());

        let digits = s
            .chars()
            .map(|c| c.to_digit(10).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;

        match digits.as_slice() {
            #[allow(clippy::cast_possible_truncation)]
            &[r, g, b, a] => Self::new([r, g, b, a].map(|d| d as u8)).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ycocg_round_trip() {
        let colors = [
            Rgbaf::new(0.0, 0.0, 0.0, 255.0),
            Rgbaf::new(255.0, 255.0, 255.0, 0.0),
            Rgbaf::new(255.0, 0.0, 0.0, 255.0),
            Rgbaf::new(12.0, 200.0, 97.0, 128.0),
        ];

        for color in colors {
            let back = color.to_ycocg().from_ycocg();
            for (a, b) in color.to_array().into_iter().zip(back.to_array()) {
                assert!((a - b).abs() < 1e-4, "{color:?} != {back:?}");
            }
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn grays_have_no_chroma() {
        let [y, co, cg, a] = Rgbaf::new(100.0, 100.0, 100.0, 255.0).to_ycocg().to_array();
        assert_eq!(y, 100.0);
        assert_eq!(co, 0.0);
        assert_eq!(cg, 0.0);
        assert_eq!(a, 255.0);
    }

    #[test]
    fn div_safe_uses_fallback_on_zero() {
        let x = Rgbaf::new(4.0, 9.0, 1.0, 2.0);
        let d = Rgbaf::new(2.0, 0.0, 0.5, 0.0);
        let fallback = Rgbaf::new(-1.0, -2.0, -3.0, -4.0);
        assert_eq!(x.div_safe(d, fallback), Rgbaf::new(2.0, -2.0, 2.0, -4.0));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn distance_is_squared_euclidean() {
        let a = Rgbaf::new(1.0, 2.0, 3.0, 4.0);
        let b = Rgbaf::new(2.0, 4.0, 6.0, 8.0);
        assert_eq!(a.distance(b), 1.0 + 4.0 + 9.0 + 16.0);
        assert_eq!(a.distance(a), 0.0);
    }

    #[test]
    fn parse_bit_depth() {
        assert_eq!("5551".parse::<BitDepth>().ok(), Some(BitDepth::RGBA5551));
        assert_eq!("8888".parse::<BitDepth>().ok(), Some(BitDepth::RGBA8888));
        assert_eq!(BitDepth::RGBA5551.to_string(), "5551");
        assert!("555".parse::<BitDepth>().is_err());
        assert!("5559".parse::<BitDepth>().is_err());
        assert!("55a1".parse::<BitDepth>().is_err());
    }

    #[test]
    fn eight_bit_requantize_is_identity() {
        let depth = BitDepth::RGBA8888;
        for v in [0u8, 1, 17, 128, 254, 255] {
            let color = Rgbaf::from_srgba8(Srgba::new(v, v, v, v));
            assert_eq!(depth.requantize(color), color);
        }
    }

    #[test]
    fn five_bit_requantize_snaps_to_levels() {
        let depth = BitDepth::RGBA5551;
        let color = Rgbaf::new(130.0, 0.0, 255.0, 200.0);
        assert_eq!(depth.to_fixed(color), [16, 0, 31, 1]);
        let snapped = depth.requantize(color).to_array();
        assert!((snapped[0] - 16.0 * 255.0 / 31.0).abs() < 1e-4);
        assert!((snapped[3] - 255.0).abs() < 1e-4);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn zero_bit_channel_is_zero() {
        let depth = BitDepth::new([8, 8, 8, 0]).unwrap();
        assert_eq!(depth.masks()[3], 0);
        assert_eq!(depth.from_fixed([1, 2, 3, 0]).to_array()[3], 0.0);
    }
}
