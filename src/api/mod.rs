//! Contains the types and functions for the high level pipeline builder API.

mod tile_pipeline;

pub use tile_pipeline::TilePipeline;
