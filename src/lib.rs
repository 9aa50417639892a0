//! A library for reducing full-color images to tile-partitioned, multi-palette indexed images.
//!
//! Tile based graphics hardware (e.g., classic consoles and handhelds) restricts each tile
//! of an image to one of a small number of palettes. `tilequant` groups tiles with similar colors
//! into shared palettes, builds each palette from the pixels of its tiles,
//! and then assigns every pixel a color from its tile's palette with optional dithering.
//!
//! All clustering and dithering is done in the YCoCg color space
//! (see [`Rgbaf::to_ycocg`]) using a deterministic binary splitting quantizer
//! (see the [`binsplit`] module), so the same input always gives the same output.
//!
//! # Features
//! To reduce dependencies and compile times, `tilequant` has several `cargo` features
//! that can be turned off or on:
//! - `image`: enables integration with the [`image`] crate for reading and writing files.
//! - `cli`: builds the `tilequant` command-line tool.
//!
//! # High-Level API
//! To get started with the high-level API, see [`TilePipeline`].
//! ```no_run
//! # use tilequant::{DitherMode, Image, TilePipeline};
//! # fn main() -> Result<(), tilequant::TileQuantError> {
//! let mut image = Image::open("some image.png")?;
//!
//! let rmse = TilePipeline::new()
//!     .palettes(16) // the number of palettes
//!     .colors_per_palette(16) // the number of colors in each palette
//!     .tile_size(8, 8)
//!     .dither(DitherMode::FloydSteinberg(1.0))
//!     .run(&mut image)?;
//!
//! println!("{rmse}");
//! image.save("some image.bmp")?;
//! # Ok(())
//! # }
//! ```
//!
//! The individual stages are also exposed:
//! [`TileSet::new`] splits an image into tiles,
//! [`TileSet::quantize_palettes`] builds the palettes,
//! and [`remap`] assigns palette indices to each pixel.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod api;
mod color;
mod error;
mod tiles;
mod types;

pub mod binsplit;
pub mod dither;

pub use api::*;
pub use color::*;
pub use dither::{remap, DitherMode, RemapOptions, Remapped};
pub use error::TileQuantError;
pub use tiles::*;
pub use types::*;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// `MAX_COLORS` as a `usize` for array and `Vec` lengths.
pub(crate) const MAX_K: usize = MAX_COLORS as usize;
