//! # Pixelsmith
//!
//! A single-pass raster image toolkit: compress, resize, crop, watermark,
//! convert, change print DPI, make passport photos, finish matted cut-outs,
//! and export selected pages. Every tool is the same three-step job over one
//! file at a time.
//!
//! # Architecture: Decode → Compose → Encode
//!
//! ```text
//! SourceAsset ──decode──▶ RasterSurface ──steps──▶ RasterSurface ──encode──▶ OutputAsset
//!  (bytes+MIME)            (RGBA, natural size)    geometry → alpha →          (bytes, name,
//!                                                  fill → overlay → layout     sha256)
//! ```
//!
//! - **Decode** validates the upload and reads it into an RGBA surface at
//!   its natural resolution.
//! - **Compose** translates a tool request into an ordered list of steps in
//!   source coordinates and applies them, each step consuming the previous
//!   surface.
//! - **Encode** writes the final surface in the requested format. An encoder
//!   that produces nothing falls back to the original bytes.
//!
//! A batch runs jobs strictly one after another; a failing file is reported
//! and the batch carries on.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Raster core: surfaces, codec seam, geometry, transform steps, bitmap text |
//! | [`pipeline`] | Tool recipes → ordered transform steps; display → source coordinates |
//! | [`job`] | Per-file lifecycle, progress events, batches, target-size search, encode fallback |
//! | [`naming`] | Output file names `<base>_<suffix>.<ext>` |
//! | [`pages`] | Page selectors (`all`, `3-7`, `1,3,5-9`) |
//! | [`config`] | `pixelsmith.toml` loading, merging and validation |
//! | [`analytics`] | Capped local history of batches |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Codecs
//!
//! Decoding and encoding go through the `image` crate only, behind the
//! [`imaging::ImageCodec`] trait. Tests swap in a recording mock so pipeline
//! and batch logic run without touching real codecs.
//!
//! ## Source Coordinates Everywhere
//!
//! Users draw crop boxes on scaled previews. [`pipeline::plan`] converts such
//! rectangles to source pixels once, up front, so every step works on the
//! full-resolution surface and never on a preview.
//!
//! ## Built-In Glyphs
//!
//! Watermark text is drawn from an embedded 8×8 bitmap face, scaled to the
//! requested size. There are no font files to find or ship.

pub mod analytics;
pub mod config;
pub mod imaging;
pub mod job;
pub mod naming;
pub mod output;
pub mod pages;
pub mod pipeline;
