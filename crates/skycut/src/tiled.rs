//! Tile-compressed image decompression (RICE_1, GZIP_1).
//!
//! A tile-compressed image is a binary table whose rows hold compressed
//! pixel tiles in the heap. The cutout path decompresses the whole image
//! once (each tile is inflated a single time) and slices the requested
//! subregion out of the result.

use crate::endian::{read_f64_be, read_i32_be, read_i64_be};
use crate::error::{Error, Result};
use crate::hdu::{CompressedImage, Hdu, HduKind};
use crate::header::{card_string, Card};

/// Image pixel data reassembled from compressed tiles, typed by ZBITPIX,
/// in native endianness.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ImageData {
    fn empty(zbitpix: i64) -> Result<Self> {
        match zbitpix {
            8 => Ok(ImageData::U8(Vec::new())),
            16 => Ok(ImageData::I16(Vec::new())),
            32 => Ok(ImageData::I32(Vec::new())),
            64 => Ok(ImageData::I64(Vec::new())),
            -32 => Ok(ImageData::F32(Vec::new())),
            -64 => Ok(ImageData::F64(Vec::new())),
            other => Err(Error::InvalidBitpix(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

struct ColumnLayout {
    compressed_offset: usize,
    /// COMPRESSED_DATA descriptors are 64-bit Q descriptors, not 32-bit P.
    q_descriptors: bool,
    zscale_offset: Option<usize>,
    zzero_offset: Option<usize>,
}

/// Byte width of one binary-table element for a TFORM type code.
fn tform_element_width(code: char) -> Result<usize> {
    Ok(match code {
        'L' | 'B' | 'A' | 'X' => 1,
        'I' => 2,
        'J' | 'E' => 4,
        'K' | 'D' | 'C' | 'P' => 8,
        'M' | 'Q' => 16,
        _ => return Err(Error::InvalidHeader("unknown TFORM type code")),
    })
}

/// Total byte width of a binary-table column given its TFORM value.
fn tform_width(tform: &str) -> Result<(usize, char)> {
    let s = tform.trim();
    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let repeat: usize = if digits_end == 0 {
        1
    } else {
        s[..digits_end]
            .parse()
            .map_err(|_| Error::InvalidHeader("bad TFORM repeat count"))?
    };
    let code = s[digits_end..]
        .chars()
        .next()
        .ok_or(Error::InvalidHeader("empty TFORM type"))?;
    let width = match code {
        // Bit columns pack 8 bits per byte.
        'X' => repeat.div_ceil(8),
        _ => repeat * tform_element_width(code)?,
    };
    Ok((width, code))
}

/// Locate the COMPRESSED_DATA, ZSCALE, and ZZERO columns.
fn column_layout(cards: &[Card], tfields: usize) -> Result<ColumnLayout> {
    let mut compressed = None;
    let mut zscale = None;
    let mut zzero = None;

    let mut offset = 0usize;
    for i in 1..=tfields {
        let name = card_string(cards, &format!("TTYPE{i}")).unwrap_or_default();
        let tform = card_string(cards, &format!("TFORM{i}"))
            .ok_or(Error::MissingKeyword("TFORMn"))?;
        let (width, code) = tform_width(&tform)?;
        match name.as_str() {
            "COMPRESSED_DATA" => compressed = Some((offset, code == 'Q')),
            "ZSCALE" => zscale = Some(offset),
            "ZZERO" => zzero = Some(offset),
            _ => {}
        }
        offset += width;
    }

    let (compressed_offset, q_descriptors) =
        compressed.ok_or(Error::InvalidHeader("no COMPRESSED_DATA column"))?;

    Ok(ColumnLayout {
        compressed_offset,
        q_descriptors,
        zscale_offset: zscale,
        zzero_offset: zzero,
    })
}

// ---------------------------------------------------------------------------
// Heap access
// ---------------------------------------------------------------------------

/// Extract the compressed bytes for one tile row from the heap.
///
/// Returns `(data_slice, count)` where `count` is the number of compressed
/// bytes. For Rice decoding the slice extends beyond `count` so the
/// bit-stream reader can safely over-read by a few bytes.
fn extract_tile_bytes<'a>(
    fits_data: &'a [u8],
    data_start: usize,
    layout: &ColumnLayout,
    c: &CompressedImage,
    row: usize,
) -> Result<(&'a [u8], usize)> {
    let desc_pos = data_start + row * c.row_len + layout.compressed_offset;
    let (count, heap_offset) = if layout.q_descriptors {
        if desc_pos + 16 > fits_data.len() {
            return Err(Error::UnexpectedEof);
        }
        (
            read_i64_be(&fits_data[desc_pos..]) as u64 as usize,
            read_i64_be(&fits_data[desc_pos + 8..]) as u64 as usize,
        )
    } else {
        if desc_pos + 8 > fits_data.len() {
            return Err(Error::UnexpectedEof);
        }
        (
            read_i32_be(&fits_data[desc_pos..]) as u32 as usize,
            read_i32_be(&fits_data[desc_pos + 4..]) as u32 as usize,
        )
    };
    let heap_start = data_start + c.row_len * c.num_rows;
    let tile_start = heap_start + heap_offset;
    if tile_start + count > fits_data.len() {
        return Err(Error::UnexpectedEof);
    }
    Ok((&fits_data[tile_start..], count))
}

fn read_zscale_zzero(
    fits_data: &[u8],
    data_start: usize,
    row_len: usize,
    row: usize,
    zscale_offset: usize,
    zzero_offset: usize,
) -> (f64, f64) {
    let row_start = data_start + row * row_len;
    let scale = read_f64_be(&fits_data[row_start + zscale_offset..]);
    let zero = read_f64_be(&fits_data[row_start + zzero_offset..]);
    (scale, zero)
}

// ---------------------------------------------------------------------------
// Rice decoding
// ---------------------------------------------------------------------------

/// Position of the most significant 1-bit for each byte value 0..255.
const NONZERO_COUNT: [i32; 256] = [
    0, 1, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8,
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8,
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8,
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8,
];

struct RiceParams {
    fsbits: i32,
    fsmax: i32,
    bbits: i32,
    bytes_per_val: usize,
}

impl RiceParams {
    fn for_bytepix(rice_bytepix: usize) -> Result<Self> {
        match rice_bytepix {
            1 => Ok(RiceParams { fsbits: 3, fsmax: 6, bbits: 8, bytes_per_val: 1 }),
            2 => Ok(RiceParams { fsbits: 4, fsmax: 14, bbits: 16, bytes_per_val: 2 }),
            4 => Ok(RiceParams { fsbits: 5, fsmax: 25, bbits: 32, bytes_per_val: 4 }),
            _ => Err(Error::UnsupportedCompression),
        }
    }
}

/// Decompress Rice-encoded tile data into i32 pixel values.
fn rice_decompress(
    compressed: &[u8],
    num_pixels: usize,
    blocksize: usize,
    params: &RiceParams,
) -> Result<Vec<i32>> {
    if compressed.len() < params.bytes_per_val {
        return Err(Error::DecompressionError);
    }

    let mut output = Vec::with_capacity(num_pixels);
    let mut pos = 0usize;

    // First pixel is stored uncompressed, big-endian.
    let lastpix: i32 = match params.bytes_per_val {
        1 => compressed[0] as i8 as i32,
        2 => {
            let v = ((compressed[0] as u16) << 8) | (compressed[1] as u16);
            v as i16 as i32
        }
        4 => read_i32_be(compressed),
        _ => return Err(Error::DecompressionError),
    };
    pos += params.bytes_per_val;

    if num_pixels == 0 {
        return Ok(output);
    }
    if pos >= compressed.len() {
        output.resize(num_pixels, lastpix);
        return Ok(output);
    }

    let mut b: u32 = compressed[pos] as u32;
    pos += 1;
    let mut nbits: i32 = 8;
    let mut lastpix = lastpix;

    let nx = num_pixels as i32;
    let nblock = blocksize as i32;
    let mut pixel_idx: i32 = 0;

    while pixel_idx < nx {
        let imax = (pixel_idx + nblock).min(nx);

        // Read the FS value (fsbits bits).
        nbits -= params.fsbits;
        while nbits < 0 {
            if pos >= compressed.len() {
                b <<= 8;
            } else {
                b = (b << 8) | (compressed[pos] as u32);
                pos += 1;
            }
            nbits += 8;
        }
        let fs = ((b >> nbits) as i32) - 1;
        b &= (1u32 << nbits) - 1;

        if fs < 0 {
            // Low entropy: all differences are zero.
            while pixel_idx < imax {
                output.push(lastpix);
                pixel_idx += 1;
            }
        } else if fs == params.fsmax {
            // High entropy: uncompressed differences, bbits per pixel.
            while pixel_idx < imax {
                let mut k = params.bbits - nbits;
                let mut diff = (b as u64) << k;

                k -= 8;
                while k >= 0 {
                    if pos < compressed.len() {
                        b = compressed[pos] as u32;
                        pos += 1;
                    } else {
                        b = 0;
                    }
                    diff |= (b as u64) << k;
                    k -= 8;
                }

                if nbits > 0 {
                    if pos < compressed.len() {
                        b = compressed[pos] as u32;
                        pos += 1;
                    } else {
                        b = 0;
                    }
                    diff |= (b >> (-k)) as u64;
                    b &= (1u32 << nbits) - 1;
                } else {
                    b = 0;
                }

                let mut diff = diff as u32;
                // Zigzag decode.
                if (diff & 1) == 0 {
                    diff >>= 1;
                } else {
                    diff = !(diff >> 1);
                }
                lastpix = (diff as i32).wrapping_add(lastpix);
                output.push(lastpix);
                pixel_idx += 1;
            }
        } else {
            // Normal Rice encoding.
            while pixel_idx < imax {
                // Count leading zeros.
                while b == 0 {
                    nbits += 8;
                    if pos < compressed.len() {
                        b = compressed[pos] as u32;
                        pos += 1;
                    } else {
                        b = 0;
                        break;
                    }
                }
                let nzero = nbits - NONZERO_COUNT[b as usize & 0xFF];
                nbits -= nzero + 1;
                if !(0..=31).contains(&nbits) {
                    // Data exhausted mid-stream; fill the rest of the block.
                    while pixel_idx < imax {
                        output.push(lastpix);
                        pixel_idx += 1;
                    }
                    break;
                }
                b ^= 1u32 << nbits;

                // Read fs trailing bits.
                nbits -= fs;
                while nbits < 0 {
                    if pos < compressed.len() {
                        b = (b << 8) | (compressed[pos] as u32);
                        pos += 1;
                    } else {
                        b <<= 8;
                    }
                    nbits += 8;
                }

                let mut diff = ((nzero as u32) << fs) | (b >> nbits);
                b &= (1u32 << nbits) - 1;

                // Zigzag decode.
                if (diff & 1) == 0 {
                    diff >>= 1;
                } else {
                    diff = !(diff >> 1);
                }
                lastpix = (diff as i32).wrapping_add(lastpix);
                output.push(lastpix);
                pixel_idx += 1;
            }
        }
    }

    Ok(output)
}

// ---------------------------------------------------------------------------
// GZIP decoding
// ---------------------------------------------------------------------------

/// Strip the gzip header and trailer, returning the raw deflate payload.
fn strip_gzip_header(data: &[u8]) -> Result<&[u8]> {
    if data.len() < 18 || data[0] != 0x1f || data[1] != 0x8b || data[2] != 0x08 {
        return Err(Error::DecompressionError);
    }
    let flg = data[3];
    let mut pos = 10usize;
    if flg & 0x04 != 0 {
        // FEXTRA
        if pos + 2 > data.len() {
            return Err(Error::DecompressionError);
        }
        let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2 + xlen;
    }
    if flg & 0x08 != 0 {
        // FNAME: null-terminated string
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        pos += 1;
    }
    if flg & 0x10 != 0 {
        // FCOMMENT: null-terminated string
        while pos < data.len() && data[pos] != 0 {
            pos += 1;
        }
        pos += 1;
    }
    if flg & 0x02 != 0 {
        // FHCRC
        pos += 2;
    }
    if pos >= data.len() || data.len() < pos + 8 {
        return Err(Error::DecompressionError);
    }
    // Strip the 8-byte trailer (CRC32 + ISIZE).
    Ok(&data[pos..data.len() - 8])
}

/// Decompress a GZIP_1 tile. Accepts gzip, zlib, or raw deflate streams.
fn gzip_decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    if compressed.len() >= 2 && compressed[0] == 0x1f && compressed[1] == 0x8b {
        let deflate_payload = strip_gzip_header(compressed)?;
        return miniz_oxide::inflate::decompress_to_vec(deflate_payload)
            .map_err(|_| Error::DecompressionError);
    }
    miniz_oxide::inflate::decompress_to_vec_zlib(compressed)
        .or_else(|_| miniz_oxide::inflate::decompress_to_vec(compressed))
        .map_err(|_| Error::DecompressionError)
}

fn bytes_to_i16(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|c| i16::from_be_bytes([c[0], c[1]]))
        .collect()
}

fn bytes_to_i32(data: &[u8]) -> Vec<i32> {
    data.chunks_exact(4)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn bytes_to_i64(data: &[u8]) -> Vec<i64> {
    data.chunks_exact(8)
        .map(|c| i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

fn bytes_to_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn bytes_to_f64(data: &[u8]) -> Vec<f64> {
    data.chunks_exact(8)
        .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

// ---------------------------------------------------------------------------
// Top-level decompression
// ---------------------------------------------------------------------------

enum Codec {
    Rice(RiceParams),
    Gzip,
}

/// Integer tile values for an integer ZBITPIX, regardless of codec.
///
/// cfitsio sometimes gzip-encodes 8- and 16-bit tiles widened to i32; both
/// layouts are accepted, keyed off the decompressed byte count.
fn int_tile_values(
    codec: &Codec,
    compressed: &[u8],
    count: usize,
    tile_pixels: usize,
    blocksize: usize,
    zbitpix: i64,
) -> Result<Vec<i32>> {
    match codec {
        Codec::Rice(params) => rice_decompress(compressed, tile_pixels, blocksize, params),
        Codec::Gzip => {
            let raw = gzip_decompress(&compressed[..count])?;
            let vals = match zbitpix {
                8 if raw.len() != tile_pixels * 4 => raw.iter().map(|&b| b as i32).collect(),
                16 if raw.len() != tile_pixels * 4 => {
                    bytes_to_i16(&raw).iter().map(|&v| v as i32).collect()
                }
                _ => bytes_to_i32(&raw),
            };
            Ok(vals)
        }
    }
}

/// Read and decompress a tile-compressed FITS image into native-endian
/// pixel values, tile by tile, each tile inflated exactly once.
pub fn read_tiled_image(fits_data: &[u8], hdu: &Hdu) -> Result<ImageData> {
    let HduKind::CompressedImage(c) = &hdu.kind else {
        return Err(Error::InvalidHeader("not a tile-compressed image HDU"));
    };

    let total_pixels: usize = c.znaxes.iter().map(|&n| n.max(0) as usize).product();
    if c.znaxes.is_empty() || total_pixels == 0 {
        return ImageData::empty(c.zbitpix);
    }

    let layout = column_layout(&hdu.cards, c.tfields)?;
    let codec = if c.zcmptype.contains("RICE") {
        Codec::Rice(RiceParams::for_bytepix(c.rice_bytepix)?)
    } else if c.zcmptype.contains("GZIP") {
        Codec::Gzip
    } else {
        return Err(Error::UnsupportedCompression);
    };

    let tile_pixels: usize = c.ztile.iter().map(|&n| n.max(0) as usize).product();
    let quantized = (c.zbitpix == -32 || c.zbitpix == -64)
        && layout.zscale_offset.is_some()
        && layout.zzero_offset.is_some();

    // Quantized floats: integer codes scaled per tile by ZSCALE/ZZERO.
    if quantized {
        let mut output = Vec::with_capacity(total_pixels);
        for row in 0..c.num_rows {
            let (compressed, count) =
                extract_tile_bytes(fits_data, hdu.data_start, &layout, c, row)?;
            let pixels_in_tile = tile_pixels.min(total_pixels - output.len());
            let ints = int_tile_values(&codec, compressed, count, pixels_in_tile, c.blocksize, 32)?;
            let (scale, zero) = read_zscale_zzero(
                fits_data,
                hdu.data_start,
                c.row_len,
                row,
                layout.zscale_offset.unwrap(),
                layout.zzero_offset.unwrap(),
            );
            let n = ints.len().min(pixels_in_tile);
            for &iv in &ints[..n] {
                output.push(zero + scale * iv as f64);
            }
        }
        return Ok(match c.zbitpix {
            -32 => ImageData::F32(output.into_iter().map(|v| v as f32).collect()),
            _ => ImageData::F64(output),
        });
    }

    match c.zbitpix {
        8 | 16 | 32 => {
            let mut output = Vec::with_capacity(total_pixels);
            for row in 0..c.num_rows {
                let (compressed, count) =
                    extract_tile_bytes(fits_data, hdu.data_start, &layout, c, row)?;
                let pixels_in_tile = tile_pixels.min(total_pixels - output.len());
                let ints = int_tile_values(
                    &codec,
                    compressed,
                    count,
                    pixels_in_tile,
                    c.blocksize,
                    c.zbitpix,
                )?;
                let n = ints.len().min(pixels_in_tile);
                output.extend_from_slice(&ints[..n]);
            }
            Ok(match c.zbitpix {
                8 => ImageData::U8(output.into_iter().map(|v| v as u8).collect()),
                16 => ImageData::I16(output.into_iter().map(|v| v as i16).collect()),
                _ => ImageData::I32(output),
            })
        }
        64 => {
            let mut output = Vec::with_capacity(total_pixels);
            for row in 0..c.num_rows {
                let (compressed, count) =
                    extract_tile_bytes(fits_data, hdu.data_start, &layout, c, row)?;
                let pixels_in_tile = tile_pixels.min(total_pixels - output.len());
                match &codec {
                    Codec::Rice(params) => {
                        let vals =
                            rice_decompress(compressed, pixels_in_tile, c.blocksize, params)?;
                        output.extend(vals.iter().map(|&v| v as i64));
                    }
                    Codec::Gzip => {
                        let raw = gzip_decompress(&compressed[..count])?;
                        let vals = bytes_to_i64(&raw);
                        let n = vals.len().min(pixels_in_tile);
                        output.extend_from_slice(&vals[..n]);
                    }
                }
            }
            Ok(ImageData::I64(output))
        }
        -32 | -64 => {
            // Unquantized floats only round-trip through GZIP.
            let Codec::Gzip = codec else {
                return Err(Error::UnsupportedCompression);
            };
            if c.zbitpix == -32 {
                let mut output: Vec<f32> = Vec::with_capacity(total_pixels);
                for row in 0..c.num_rows {
                    let (compressed, count) =
                        extract_tile_bytes(fits_data, hdu.data_start, &layout, c, row)?;
                    let raw = gzip_decompress(&compressed[..count])?;
                    let vals = bytes_to_f32(&raw);
                    let n = vals
                        .len()
                        .min(tile_pixels)
                        .min(total_pixels - output.len());
                    output.extend_from_slice(&vals[..n]);
                }
                Ok(ImageData::F32(output))
            } else {
                let mut output: Vec<f64> = Vec::with_capacity(total_pixels);
                for row in 0..c.num_rows {
                    let (compressed, count) =
                        extract_tile_bytes(fits_data, hdu.data_start, &layout, c, row)?;
                    let raw = gzip_decompress(&compressed[..count])?;
                    let vals = bytes_to_f64(&raw);
                    let n = vals
                        .len()
                        .min(tile_pixels)
                        .min(total_pixels - output.len());
                    output.extend_from_slice(&vals[..n]);
                }
                Ok(ImageData::F64(output))
            }
        }
        other => Err(Error::InvalidBitpix(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rice_params_table() {
        let p8 = RiceParams::for_bytepix(1).unwrap();
        assert_eq!((p8.fsbits, p8.fsmax), (3, 6));
        let p16 = RiceParams::for_bytepix(2).unwrap();
        assert_eq!((p16.fsbits, p16.fsmax), (4, 14));
        let p32 = RiceParams::for_bytepix(4).unwrap();
        assert_eq!((p32.fsbits, p32.fsmax), (5, 25));
        assert!(RiceParams::for_bytepix(3).is_err());
    }

    #[test]
    fn nonzero_count_table() {
        assert_eq!(NONZERO_COUNT[0], 0);
        assert_eq!(NONZERO_COUNT[1], 1);
        assert_eq!(NONZERO_COUNT[2], 2);
        assert_eq!(NONZERO_COUNT[3], 2);
        assert_eq!(NONZERO_COUNT[128], 8);
        assert_eq!(NONZERO_COUNT[255], 8);
    }

    #[test]
    fn rice_low_entropy_run() {
        // First pixel = 42 (big-endian i16), then one all-zero-diff block
        // (fs = -1, encoded as fs+1 = 0 in 4 bits).
        let params = RiceParams::for_bytepix(2).unwrap();
        let data = vec![0u8, 42, 0x00];
        let result = rice_decompress(&data, 5, 4, &params).unwrap();
        assert_eq!(result, vec![42, 42, 42, 42, 42]);
    }

    #[test]
    fn rice_truncated_input_fails() {
        let params = RiceParams::for_bytepix(4).unwrap();
        assert!(rice_decompress(&[0u8, 1], 4, 32, &params).is_err());
    }

    #[test]
    fn tform_widths() {
        assert_eq!(tform_width("1PB(644)").unwrap(), (8, 'P'));
        assert_eq!(tform_width("1QB(644)").unwrap(), (16, 'Q'));
        assert_eq!(tform_width("1D").unwrap(), (8, 'D'));
        assert_eq!(tform_width("E").unwrap(), (4, 'E'));
        assert_eq!(tform_width("16X").unwrap(), (2, 'X'));
        assert_eq!(tform_width("3J").unwrap(), (12, 'J'));
        assert!(tform_width("1Z").is_err());
    }

    #[test]
    fn gzip_zlib_stream_roundtrip() {
        let payload: Vec<u8> = (0u16..256)
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&payload, 6);
        assert_eq!(gzip_decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn gzip_member_roundtrip() {
        use std::io::Write;

        let payload = vec![7u8; 100];
        let mut enc =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&payload).unwrap();
        let compressed = enc.finish().unwrap();
        assert_eq!(gzip_decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn byte_converters() {
        assert_eq!(bytes_to_i16(&[0xFF, 0xFE]), vec![-2]);
        assert_eq!(bytes_to_i32(&[0, 0, 0, 5]), vec![5]);
        assert_eq!(bytes_to_i64(&[0, 0, 0, 0, 0, 0, 0, 9]), vec![9]);
        assert_eq!(bytes_to_f32(&1.5f32.to_be_bytes()), vec![1.5]);
        assert_eq!(bytes_to_f64(&2.5f64.to_be_bytes()), vec![2.5]);
    }
}
