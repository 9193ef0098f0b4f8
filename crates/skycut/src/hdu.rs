//! Top-level FITS scanning: HDU discovery and metadata extraction.
//!
//! The streamer only needs to know, per HDU, whether it is an image that may
//! be cut out, a tile-compressed image, or anything else (passed through
//! verbatim), plus the byte extent of its header and data segments.

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::{card_bool, card_i64, card_string, header_byte_len, parse_header_blocks, Card};

/// Shape metadata of a tile-compressed image stored as a binary table
/// (ZIMAGE = T per the FITS tiled image compression convention).
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    /// Original image BITPIX before compression.
    pub zbitpix: i64,
    /// Original image dimensions (ZNAXISn).
    pub znaxes: Vec<i64>,
    /// Compression algorithm name (e.g. "RICE_1", "GZIP_1").
    pub zcmptype: String,
    /// Tile dimensions.
    pub ztile: Vec<i64>,
    /// Rice compression block size (ZVAL1).
    pub blocksize: usize,
    /// Rice bytes per pixel (ZVAL2).
    pub rice_bytepix: usize,
    /// Underlying binary table row width in bytes (NAXIS1).
    pub row_len: usize,
    /// Underlying binary table row count = number of tiles (NAXIS2).
    pub num_rows: usize,
    /// Number of columns in the underlying binary table (TFIELDS).
    pub tfields: usize,
}

/// What the streamer needs to know about an HDU's contents.
#[derive(Debug, Clone, PartialEq)]
pub enum HduKind {
    /// Primary HDU or IMAGE extension. Random-groups primaries land here
    /// too (NAXIS1 = 0) and are rejected downstream like any non-2-D image.
    Image {
        /// BITPIX value (8, 16, 32, 64, -32, -64).
        bitpix: i64,
        /// Axis dimensions (NAXIS1, NAXIS2, ...).
        naxes: Vec<i64>,
    },
    /// Tile-compressed image (binary table with ZIMAGE = T).
    CompressedImage(CompressedImage),
    /// Any other HDU: ASCII/binary tables, foreign extensions. Passed
    /// through verbatim.
    Other,
}

/// A single Header Data Unit located in a FITS byte stream.
#[derive(Debug, Clone)]
pub struct Hdu {
    /// Classification and shape of this HDU.
    pub kind: HduKind,
    /// Byte offset where the header begins.
    pub header_start: usize,
    /// Byte offset where the data segment begins.
    pub data_start: usize,
    /// Length of the data segment in bytes (unpadded).
    pub data_len: usize,
    /// All header cards parsed from this HDU.
    pub cards: Vec<Card>,
}

impl Hdu {
    /// Length of the header region in bytes (a multiple of the block size).
    pub fn header_len(&self) -> usize {
        self.data_start - self.header_start
    }
}

/// All HDUs of a FITS file, in file order.
#[derive(Debug, Clone)]
pub struct FitsData {
    /// The HDUs, with the primary HDU at index 0.
    pub hdus: Vec<Hdu>,
}

impl FitsData {
    /// Returns the primary (first) HDU.
    pub fn primary(&self) -> &Hdu {
        &self.hdus[0]
    }

    /// Returns the HDU at the given index, or `None` if out of bounds.
    pub fn get(&self, index: usize) -> Option<&Hdu> {
        self.hdus.get(index)
    }

    /// Returns the number of HDUs.
    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    /// Returns `true` if the file contains no HDUs.
    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }

    /// Iterates over all HDUs in order.
    pub fn iter(&self) -> impl Iterator<Item = &Hdu> {
        self.hdus.iter()
    }
}

fn read_naxes(cards: &[Card]) -> Result<Vec<i64>> {
    let naxis = card_i64(cards, "NAXIS").ok_or(Error::MissingKeyword("NAXIS"))?;
    if !(0..=999).contains(&naxis) {
        return Err(Error::InvalidHeader("NAXIS out of range"));
    }
    let mut naxes = Vec::with_capacity(naxis as usize);
    for i in 1..=naxis {
        let kw = format!("NAXIS{i}");
        let dim = card_i64(cards, &kw).ok_or(Error::MissingKeyword("NAXISn"))?;
        if dim < 0 {
            return Err(Error::InvalidHeader("negative NAXISn"));
        }
        naxes.push(dim);
    }
    Ok(naxes)
}

/// Compute the unpadded data segment length from the mandatory keywords.
///
/// Uses the standard formula `|BITPIX|/8 * GCOUNT * (PCOUNT + prod NAXISn)`,
/// with the random-groups variant when `NAXIS1 = 0` and `GROUPS = T`.
fn compute_data_byte_len(cards: &[Card], is_primary: bool) -> Result<usize> {
    let bitpix = card_i64(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?;
    let naxes = read_naxes(cards)?;

    if naxes.is_empty() {
        return Ok(0);
    }

    let bytes_per_value = (bitpix.unsigned_abs() as usize) / 8;

    // Random groups: primary HDU with NAXIS1 = 0 and GROUPS = T.
    // Nbytes = bytes_per_value * GCOUNT * (PCOUNT + NAXIS2 * ... * NAXISm)
    if is_primary && naxes[0] == 0 && card_bool(cards, "GROUPS") == Some(true) {
        let pcount = card_i64(cards, "PCOUNT").ok_or(Error::MissingKeyword("PCOUNT"))? as usize;
        let gcount = card_i64(cards, "GCOUNT").ok_or(Error::MissingKeyword("GCOUNT"))? as usize;

        let product: usize = naxes[1..]
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
            .ok_or(Error::InvalidHeader("random groups size overflow"))?;
        let group_size = pcount
            .checked_add(product)
            .ok_or(Error::InvalidHeader("random groups size overflow"))?;
        return bytes_per_value
            .checked_mul(gcount)
            .and_then(|n| n.checked_mul(group_size))
            .ok_or(Error::InvalidHeader("random groups size overflow"));
    }

    let total_pixels: usize = naxes
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
        .ok_or(Error::InvalidHeader("pixel count overflow"))?;

    let (pcount, gcount) = if is_primary {
        (0, 1)
    } else {
        let g = card_i64(cards, "GCOUNT").unwrap_or(1).max(1) as usize;
        (card_i64(cards, "PCOUNT").unwrap_or(0) as usize, g)
    };

    // Nbytes = |BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISm)
    pcount
        .checked_add(total_pixels)
        .and_then(|n| n.checked_mul(bytes_per_value))
        .and_then(|n| n.checked_mul(gcount))
        .ok_or(Error::InvalidHeader("data size overflow"))
}

fn parse_compressed_image(cards: &[Card]) -> Result<CompressedImage> {
    let zbitpix = card_i64(cards, "ZBITPIX").ok_or(Error::MissingKeyword("ZBITPIX"))?;
    let znaxis = card_i64(cards, "ZNAXIS").ok_or(Error::MissingKeyword("ZNAXIS"))?;
    let mut znaxes = Vec::with_capacity(znaxis as usize);
    for i in 1..=znaxis {
        let kw = format!("ZNAXIS{i}");
        znaxes.push(card_i64(cards, &kw).ok_or(Error::MissingKeyword("ZNAXISn"))?);
    }
    let zcmptype = card_string(cards, "ZCMPTYPE").ok_or(Error::MissingKeyword("ZCMPTYPE"))?;

    let mut ztile = Vec::with_capacity(znaxes.len());
    for i in 1..=znaxes.len() {
        // Default tiling is row by row: ZTILE1 = ZNAXIS1, all others 1.
        let default = if i == 1 { znaxes[0] } else { 1 };
        let kw = format!("ZTILE{i}");
        ztile.push(card_i64(cards, &kw).unwrap_or(default));
    }

    let mut blocksize = card_i64(cards, "ZVAL1").unwrap_or(32) as usize;
    let mut rice_bytepix = card_i64(cards, "ZVAL2").unwrap_or(4) as usize;
    // cfitsio compatibility: if blocksize < 16 and bytepix > 8, the two
    // values were written swapped.
    if blocksize < 16 && rice_bytepix > 8 {
        std::mem::swap(&mut blocksize, &mut rice_bytepix);
    }

    let row_len = card_i64(cards, "NAXIS1").ok_or(Error::MissingKeyword("NAXIS1"))? as usize;
    let num_rows = card_i64(cards, "NAXIS2").ok_or(Error::MissingKeyword("NAXIS2"))? as usize;
    let tfields = card_i64(cards, "TFIELDS").ok_or(Error::MissingKeyword("TFIELDS"))? as usize;

    Ok(CompressedImage {
        zbitpix,
        znaxes,
        zcmptype,
        ztile,
        blocksize,
        rice_bytepix,
        row_len,
        num_rows,
        tfields,
    })
}

fn classify(cards: &[Card], is_primary: bool) -> Result<HduKind> {
    if is_primary {
        let bitpix = card_i64(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?;
        let naxes = read_naxes(cards)?;
        return Ok(HduKind::Image { bitpix, naxes });
    }

    let xtension = card_string(cards, "XTENSION").ok_or(Error::MissingKeyword("XTENSION"))?;
    match xtension.as_str() {
        "IMAGE" => {
            let bitpix = card_i64(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?;
            let naxes = read_naxes(cards)?;
            Ok(HduKind::Image { bitpix, naxes })
        }
        "BINTABLE" if card_bool(cards, "ZIMAGE") == Some(true) => {
            Ok(HduKind::CompressedImage(parse_compressed_image(cards)?))
        }
        _ => Ok(HduKind::Other),
    }
}

/// Parse a complete FITS byte stream into a [`FitsData`] describing all HDUs.
pub fn parse_fits(data: &[u8]) -> Result<FitsData> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut hdus = Vec::new();
    let mut offset: usize = 0;

    while offset < data.len() {
        let remaining = &data[offset..];
        if remaining.len() < BLOCK_SIZE {
            // Trailing bytes shorter than a block: ignore, like cfitsio does
            // for files whose final padding was dropped.
            break;
        }

        let header_len = match header_byte_len(remaining) {
            Ok(len) => len,
            Err(_) if !hdus.is_empty() => break,
            Err(e) => return Err(e),
        };
        let cards = match parse_header_blocks(&remaining[..header_len]) {
            Ok(cards) => cards,
            Err(_) if !hdus.is_empty() => break,
            Err(e) => return Err(e),
        };

        let is_primary = hdus.is_empty();
        if is_primary && cards.first().map(|c| c.keyword_str()) != Some("SIMPLE") {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }

        let kind = match classify(&cards, is_primary) {
            Ok(kind) => kind,
            Err(_) if !hdus.is_empty() => break,
            Err(e) => return Err(e),
        };
        let data_len = match compute_data_byte_len(&cards, is_primary) {
            Ok(len) => len,
            Err(_) if !hdus.is_empty() => break,
            Err(e) => return Err(e),
        };
        let data_start = offset + header_len;

        // All actual data bytes must be present; only the trailing block
        // padding is allowed to be missing.
        if data_len > 0 && data_start + data_len > data.len() {
            return Err(Error::UnexpectedEof);
        }

        hdus.push(Hdu {
            kind,
            header_start: offset,
            data_start,
            data_len,
            cards,
        });

        offset = data_start + padded_byte_len(data_len);
    }

    if hdus.is_empty() {
        return Err(Error::InvalidHeader("no valid HDUs found"));
    }

    Ok(FitsData { hdus })
}
