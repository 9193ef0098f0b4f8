//! Top-level request handling: file reads, the optional gzip sink, and
//! whole-file passthrough.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::coords::Coords;
use crate::error::Result;
use crate::stream::stream_subimage;

/// Stream a FITS cutout of the file at `path` to `sink`.
///
/// When `gzip` is set the whole FITS stream becomes the input of a single
/// gzip member. Errors raised before the first byte reaches `sink` may be
/// turned into an HTTP error document by the caller; errors raised after
/// must terminate the connection.
pub fn stream_cutout<W: Write>(
    path: &Path,
    center: &Coords,
    size: &Coords,
    gzip: bool,
    sink: &mut W,
) -> Result<()> {
    debug!(path = %path.display(), gzip, "streaming cutout");
    let src = read_source(path)?;
    if gzip {
        let mut encoder = GzEncoder::new(sink, Compression::default());
        stream_subimage(&src, center, size, &mut encoder)?;
        encoder.finish().map_err(crate::error::Error::Io)?;
    } else {
        stream_subimage(&src, center, size, sink)?;
    }
    Ok(())
}

/// Stream an entire file to `sink` unchanged (non-cutout requests).
/// Returns the number of bytes copied.
pub fn stream_file<W: Write>(path: &Path, sink: &mut W) -> Result<u64> {
    debug!(path = %path.display(), "streaming whole file");
    let mut file = File::open(path)?;
    Ok(io::copy(&mut file, sink)?)
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
