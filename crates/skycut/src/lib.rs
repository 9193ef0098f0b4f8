//! Image-archive access gateway core.
//!
//! Given a request for a file under a data root, either stream the whole
//! file or stream a rectangular cutout of a multi-extension FITS image:
//! parse the cutout geometry with [`coords::parse_coords`], resolve the sky
//! or pixel center to a pixel bounding box against the image WCS
//! ([`cutout::cutout_pixel_box`]), and emit a byte-exact multi-HDU FITS
//! stream with rewritten header cards via [`stream::stream_subimage`] or
//! the [`service`] entry points. Tile-compressed images (RICE_1 / GZIP_1)
//! are decompressed transparently through the [`tiled`] module.
#![warn(missing_docs)]

/// FITS 2880-byte block utilities and constants.
pub mod block;
/// Request coordinate parsing: units, degree conversion, sky normalization.
pub mod coords;
/// Pixel-box solving against an image WCS.
pub mod cutout;
/// Big-endian byte conversion helpers for FITS data types.
pub mod endian;
/// Error types used throughout the crate.
pub mod error;
/// HDU discovery and metadata extraction.
pub mod hdu;
/// Header card parsing and serialization.
pub mod header;
/// Top-level request handling and sinks.
pub mod service;
/// Multi-HDU sub-image streaming.
pub mod stream;
/// Tile-compressed image decompression (RICE_1, GZIP_1).
pub mod tiled;
/// FITS header value representation (integer, float, string, logical).
pub mod value;
/// Thin adapter over the chosen WCS library.
pub mod wcs;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use coords::{parse_coords, parse_gzip_flag, Coords, Units};
pub use cutout::PixelBox;
pub use error::{Error, Result};
pub use service::{stream_cutout, stream_file};
