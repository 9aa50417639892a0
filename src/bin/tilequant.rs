#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use tilequant::{remap, BitDepth, DitherMode, Image, TilePipeline};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Converts an image into tiles that each use one of a few small palettes.
#[derive(Parser)]
#[command(version, about)]
pub struct Options {
    /// The image to read.
    input: PathBuf,

    /// Where to write the result. A `.bmp` path gets an 8-bit indexed bitmap.
    output: PathBuf,

    /// Number of palettes available.
    #[arg(long, default_value_t = 16)]
    palettes: u16,

    /// Number of colors per palette, including reserved colors.
    #[arg(long, default_value_t = 16)]
    colors: u16,

    /// Number of reserved colors at the start of each palette.
    #[arg(long, default_value_t = 1)]
    reserved: u16,

    /// Tile width in pixels.
    #[arg(long, default_value_t = 8)]
    tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = 8)]
    tile_height: u32,

    /// RGBA bit depth of the palette colors.
    #[arg(long, default_value_t = BitDepth::RGBA5551)]
    bit_depth: BitDepth,

    /// Dither mode and level: none, floyd[,LEVEL], or ord{2,4,8,16,32,64}[,LEVEL].
    #[arg(long, default_value_t = DitherMode::default())]
    dither: DitherMode,

    /// Sort the colors of each palette by brightness.
    #[arg(long)]
    order: bool,

    /// Log the time taken by each step and other details.
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let Options {
        input,
        output,
        palettes,
        colors,
        reserved,
        tile_width,
        tile_height,
        bit_depth,
        dither,
        order,
        verbose,
    } = Options::parse();

    let default_filter = if verbose { "tilequant=debug" } else { "tilequant=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    macro_rules! log {
        ($name: literal, $val: expr) => {{
            let time = Instant::now();
            let value = $val;
            info!("{} took {}ms", $name, time.elapsed().as_millis());
            value
        }};
    }

    let mut image = log!(
        "read image",
        Image::open(&input).with_context(|| format!("unable to read {}", input.display()))?
    );

    let mut pipeline = TilePipeline::new();
    pipeline
        .palettes(palettes)
        .colors_per_palette(colors)
        .reserved_per_palette(reserved)
        .tile_size(tile_width, tile_height)
        .bit_depth(bit_depth)
        .dither(dither)
        .order_colors(order);

    let (tiles, palette) = log!("palette generation", pipeline.palette(&image)?);

    let options = pipeline.remap_options();
    let remapped = log!("remapping", remap(&image, &tiles, palette, &options)?);
    let rmse = remapped.install(&mut image)?;

    println!("{rmse}");

    log!(
        "write image",
        image
            .save(&output)
            .with_context(|| format!("unable to write {}", output.display()))?
    );

    Ok(())
}
