//! Multi-HDU FITS sub-image streaming.
//!
//! Walks every HDU of a source FITS byte stream in order and emits a valid
//! FITS stream to a byte sink: tables and dataless image HDUs are copied
//! verbatim, 2-D image HDUs are replaced by the requested cutout with
//! rewritten header cards. Every emitted HDU ends on a 2880-byte boundary.

use std::io::Write;

use crate::block::{padded_byte_len, padding_len, BLOCK_SIZE, CARD_SIZE, DATA_PAD_BYTE, HEADER_PAD_BYTE};
use crate::coords::Coords;
use crate::cutout::{cutout_pixel_box, PixelBox};
use crate::endian::{f32_slice_to_be, f64_slice_to_be, i16_slice_to_be, i32_slice_to_be, i64_slice_to_be};
use crate::error::{Error, Result};
use crate::hdu::{parse_fits, CompressedImage, Hdu, HduKind};
use crate::header::{format_card, format_end_card, make_card, parse_card, Card};
use crate::tiled::{read_tiled_image, ImageData};
use crate::value::Value;

type CardImage = [u8; CARD_SIZE];

/// Byte sink wrapper tracking the running output length for block padding.
struct CountingSink<'a> {
    inner: &'a mut dyn Write,
    written: u64,
}

impl CountingSink<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    /// Pad with `pad` bytes up to the next 2880-byte boundary.
    fn pad_block(&mut self, pad: u8) -> Result<()> {
        let n = padding_len((self.written % BLOCK_SIZE as u64) as usize);
        if n > 0 {
            let block = [pad; BLOCK_SIZE];
            self.write(&block[..n])?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw-card helpers
// ---------------------------------------------------------------------------

/// The used cards of an HDU header as raw 80-byte images, END excluded.
///
/// Trailing blank cards before END are space reserved for additional
/// keywords, not content, and are dropped.
fn header_card_images(src: &[u8], hdu: &Hdu) -> Vec<CardImage> {
    let region = &src[hdu.header_start..hdu.data_start];
    let mut cards: Vec<CardImage> = Vec::new();
    for chunk in region.chunks_exact(CARD_SIZE) {
        if &chunk[..8] == b"END     " {
            break;
        }
        let mut image = [b' '; CARD_SIZE];
        image.copy_from_slice(chunk);
        cards.push(image);
    }
    while cards.last().is_some_and(|c| c.iter().all(|&b| b == b' ')) {
        cards.pop();
    }
    cards
}

/// `NAXIS1`/`NAXIS2` -> axis index 0/1.
fn naxis_axis(key: &[u8; 8]) -> Option<usize> {
    if &key[..5] == b"NAXIS" && (key[5] == b'1' || key[5] == b'2') && &key[6..] == b"  " {
        Some((key[5] - b'1') as usize)
    } else {
        None
    }
}

/// `LTV1`/`LTV2` -> axis index 0/1.
fn ltv_axis(key: &[u8; 8]) -> Option<usize> {
    if &key[..3] == b"LTV" && (key[3] == b'1' || key[3] == b'2') && &key[4..] == b"    " {
        Some((key[3] - b'1') as usize)
    } else {
        None
    }
}

/// `CRPIX1`/`CRPIX2` and the alternate-WCS forms `CRPIX{1,2}[A-Z]`.
fn crpix_axis(key: &[u8; 8]) -> Option<usize> {
    if &key[..5] == b"CRPIX" && (key[5] == b'1' || key[5] == b'2') && key[7] == b' ' {
        let alt = key[6];
        if alt == b' ' || alt.is_ascii_uppercase() {
            return Some((key[5] - b'1') as usize);
        }
    }
    None
}

/// `prefix` followed by one or more digits, space-padded.
fn numbered_keyword(key: &[u8; 8], prefix: &[u8]) -> bool {
    if !key.starts_with(prefix) {
        return false;
    }
    let rest = &key[prefix.len()..];
    let end = rest.iter().rposition(|&b| b != b' ').map(|i| i + 1).unwrap_or(0);
    end > 0 && rest[..end].iter().all(|b| b.is_ascii_digit())
}

/// Standard reference comments cfitsio plants in headers it synthesizes.
fn is_reference_comment(raw: &CardImage) -> bool {
    raw.starts_with(b"COMMENT   FITS (Flexible Image Transport System) format is")
        || raw.starts_with(b"COMMENT   and Astrophysics', volume 376, page 3")
}

/// Rebuild a card with its numeric value shifted by `delta`, preserving the
/// keyword (including any alternate-WCS suffix) and the comment.
fn shift_numeric_card(raw: &CardImage, delta: f64) -> Result<CardImage> {
    let card = parse_card(raw)?;
    let old = card
        .value
        .as_ref()
        .and_then(Value::as_f64)
        .ok_or(Error::InvalidHeader("non-numeric axis keyword"))?;
    let rebuilt = Card {
        keyword: card.keyword,
        value: Some(Value::Float(old + delta)),
        comment: card.comment,
    };
    Ok(format_card(&rebuilt))
}

/// Rebuild a card with a new integer value, preserving the comment.
fn replace_integer_card(raw: &CardImage, value: i64) -> Result<CardImage> {
    let card = parse_card(raw)?;
    let rebuilt = Card {
        keyword: card.keyword,
        value: Some(Value::Integer(value)),
        comment: card.comment,
    };
    Ok(format_card(&rebuilt))
}

// ---------------------------------------------------------------------------
// Verbatim copies
// ---------------------------------------------------------------------------

/// Emit the used header cards verbatim, then END and space padding. Any
/// reserved free space after the last used card is dropped.
fn copy_header(src: &[u8], hdu: &Hdu, out: &mut CountingSink<'_>) -> Result<()> {
    for raw in header_card_images(src, hdu) {
        out.write(&raw)?;
    }
    out.write(&format_end_card())?;
    out.pad_block(HEADER_PAD_BYTE)
}

/// Copy the raw data blocks of an HDU unchanged; missing trailing padding
/// in the source is re-created with zero bytes.
fn copy_data(src: &[u8], hdu: &Hdu, out: &mut CountingSink<'_>) -> Result<()> {
    let padded = padded_byte_len(hdu.data_len);
    let end = (hdu.data_start + padded).min(src.len());
    if hdu.data_start + hdu.data_len > src.len() {
        return Err(Error::UnexpectedEof);
    }
    out.write(&src[hdu.data_start..end])?;
    out.pad_block(DATA_PAD_BYTE)
}

// ---------------------------------------------------------------------------
// Cutout header rewrite
// ---------------------------------------------------------------------------

/// Emit a cutout image header from the source card images, rewriting the
/// axis-dependent keywords along the way.
///
/// `NAXIS1`/`NAXIS2` become the box extent, `LTV1`/`LTV2` shift by
/// `min - 1`, `CRPIX1`/`CRPIX2` (and alternate-WCS variants) shift by
/// `1 - min`. `CHECKSUM`/`DATASUM` are dropped as stale. For a
/// tile-compressed source the leading SIMPLE card becomes
/// `XTENSION= 'IMAGE   '` and `PCOUNT = 0`, `GCOUNT = 1` are inserted
/// directly after the rewritten `NAXIS2`.
fn emit_cutout_header(
    cards: &[CardImage],
    bx: &PixelBox,
    is_compressed: bool,
    out: &mut CountingSink<'_>,
) -> Result<()> {
    let mut start = 0;
    if is_compressed {
        let xtension = make_card(
            b"XTENSION",
            Some(Value::String(String::from("IMAGE"))),
            Some("IMAGE extension"),
        );
        out.write(&format_card(&xtension))?;
        start = 1; // replaces the SIMPLE card
    }

    for raw in &cards[start..] {
        let key: &[u8; 8] = raw[..8].try_into().expect("keyword is 8 bytes");

        if is_compressed {
            // EXTEND, reference comments, and any pre-existing PCOUNT and
            // GCOUNT do not survive the promotion to an IMAGE extension.
            if key == b"EXTEND  "
                || key == b"PCOUNT  "
                || key == b"GCOUNT  "
                || is_reference_comment(raw)
            {
                continue;
            }
        }
        // Checksums are stale for the sub-image.
        if key == b"CHECKSUM" || key == b"DATASUM " {
            continue;
        }

        if let Some(axis) = naxis_axis(key) {
            let extent = if axis == 0 { bx.width() } else { bx.height() };
            out.write(&replace_integer_card(raw, extent)?)?;
            if is_compressed && axis == 1 {
                let pcount = make_card(
                    b"PCOUNT",
                    Some(Value::Integer(0)),
                    Some("number of random group parameters"),
                );
                let gcount = make_card(
                    b"GCOUNT",
                    Some(Value::Integer(1)),
                    Some("number of random groups"),
                );
                out.write(&format_card(&pcount))?;
                out.write(&format_card(&gcount))?;
            }
        } else if let Some(axis) = ltv_axis(key) {
            out.write(&shift_numeric_card(raw, (bx.min(axis) - 1) as f64)?)?;
        } else if let Some(axis) = crpix_axis(key) {
            out.write(&shift_numeric_card(raw, (1 - bx.min(axis)) as f64)?)?;
        } else {
            out.write(raw)?;
        }
    }

    out.write(&format_end_card())?;
    out.pad_block(HEADER_PAD_BYTE)
}

// ---------------------------------------------------------------------------
// Compressed-header promotion
// ---------------------------------------------------------------------------

/// Table bookkeeping and compression keywords that must not survive the
/// promotion of a tile-compressed binary-table header to an image header.
fn is_compression_keyword(key: &[u8; 8]) -> bool {
    const EXACT: [&[u8; 8]; 16] = [
        b"XTENSION", b"BITPIX  ", b"NAXIS   ", b"PCOUNT  ", b"GCOUNT  ", b"TFIELDS ",
        b"THEAP   ", b"ZIMAGE  ", b"ZCMPTYPE", b"ZBITPIX ", b"ZSIMPLE ", b"ZTENSION",
        b"ZEXTEND ", b"ZBLOCKED", b"ZQUANTIZ", b"ZDITHER0",
    ];
    if EXACT.contains(&key) {
        return true;
    }
    // ZPCOUNT/ZGCOUNT, ZMASKCMP, ZHECKSUM/ZDATASUM, ZSCALE/ZZERO as header
    // keywords are compression bookkeeping as well.
    const EXACT2: [&[u8; 8]; 7] = [
        b"ZPCOUNT ", b"ZGCOUNT ", b"ZMASKCMP", b"ZHECKSUM", b"ZDATASUM", b"ZSCALE  ",
        b"ZZERO   ",
    ];
    if EXACT2.contains(&key) {
        return true;
    }
    for prefix in [
        b"NAXIS".as_slice(),
        b"ZNAXIS".as_slice(),
        b"ZTILE".as_slice(),
        b"ZNAME".as_slice(),
        b"ZVAL".as_slice(),
        b"TTYPE".as_slice(),
        b"TFORM".as_slice(),
        b"TUNIT".as_slice(),
        b"TSCAL".as_slice(),
        b"TZERO".as_slice(),
        b"TNULL".as_slice(),
        b"TDIM".as_slice(),
        b"TDISP".as_slice(),
    ] {
        if numbered_keyword(key, prefix) {
            return true;
        }
    }
    false
}

/// Promote the header of a tile-compressed binary table to the equivalent
/// image header: mandatory image keywords synthesized from the Z-keywords,
/// everything else kept in source order minus the compression bookkeeping.
///
/// The result is shaped like a primary header (SIMPLE first), matching what
/// cfitsio's header conversion produces; the cutout rewrite then turns the
/// SIMPLE card into an IMAGE extension card.
fn decompressed_image_cards(src: &[u8], hdu: &Hdu, c: &CompressedImage) -> Vec<CardImage> {
    let mut cards: Vec<CardImage> = Vec::new();
    cards.push(format_card(&make_card(
        b"SIMPLE",
        Some(Value::Logical(true)),
        Some("file does conform to FITS standard"),
    )));
    cards.push(format_card(&make_card(
        b"BITPIX",
        Some(Value::Integer(c.zbitpix)),
        Some("number of bits per data pixel"),
    )));
    cards.push(format_card(&make_card(
        b"NAXIS",
        Some(Value::Integer(c.znaxes.len() as i64)),
        Some("number of data axes"),
    )));
    for (i, &dim) in c.znaxes.iter().enumerate() {
        cards.push(format_card(&make_card(
            format!("NAXIS{}", i + 1).as_bytes(),
            Some(Value::Integer(dim)),
            Some("length of data axis"),
        )));
    }

    for raw in header_card_images(src, hdu) {
        let key: &[u8; 8] = raw[..8].try_into().expect("keyword is 8 bytes");
        if is_compression_keyword(key) {
            continue;
        }
        // The EXTNAME cfitsio stamps on compressed HDUs names the container,
        // not the image.
        if key == b"EXTNAME " {
            if let Ok(card) = parse_card(&raw) {
                if let Some(Value::String(s)) = &card.value {
                    if s.trim() == "COMPRESSED_IMAGE" {
                        continue;
                    }
                }
            }
        }
        cards.push(raw);
    }

    cards
}

// ---------------------------------------------------------------------------
// Pixel payloads
// ---------------------------------------------------------------------------

/// Bytes per pixel for a supported BITPIX, or the fatal error.
fn bytes_per_pixel(bitpix: i64) -> Result<usize> {
    match bitpix {
        8 => Ok(1),
        16 => Ok(2),
        32 | -32 => Ok(4),
        64 | -64 => Ok(8),
        other => Err(Error::InvalidBitpix(other)),
    }
}

/// Emit the cutout rows of an uncompressed image HDU.
///
/// Source pixels are already big-endian on disk, so rows are copied
/// byte-for-byte; BSCALE/BZERO never enter the picture.
fn emit_subimage_rows(
    src: &[u8],
    hdu: &Hdu,
    bitpix: i64,
    naxis1: i64,
    bx: &PixelBox,
    out: &mut CountingSink<'_>,
) -> Result<()> {
    let bpp = bytes_per_pixel(bitpix)?;
    let row_len = bx.width() as usize * bpp;
    let naxis1 = naxis1 as usize;

    for y in bx.ymin..=bx.ymax {
        // FITS linear pixel offset of the first cutout pixel in this row.
        let first_pix = (bx.xmin - 1) as usize + naxis1 * (y - 1) as usize;
        let start = hdu.data_start + first_pix * bpp;
        let end = start + row_len;
        if end > src.len() {
            return Err(Error::UnexpectedEof);
        }
        out.write(&src[start..end])?;
    }
    Ok(())
}

/// Emit the cutout rows of a tile-compressed image HDU.
///
/// The whole image is decompressed in one pass (a tile contributing to N
/// output rows would otherwise be inflated N times), then the subregion is
/// serialized back to big-endian.
fn emit_decompressed_rows(
    src: &[u8],
    hdu: &Hdu,
    c: &CompressedImage,
    bx: &PixelBox,
    out: &mut CountingSink<'_>,
) -> Result<()> {
    let img = read_tiled_image(src, hdu)?;
    let width = c.znaxes[0] as usize;
    let height = c.znaxes[1] as usize;

    let len = match &img {
        ImageData::U8(v) => v.len(),
        ImageData::I16(v) => v.len(),
        ImageData::I32(v) => v.len(),
        ImageData::I64(v) => v.len(),
        ImageData::F32(v) => v.len(),
        ImageData::F64(v) => v.len(),
    };
    if len < width * height {
        return Err(Error::DecompressionError);
    }

    let x0 = (bx.xmin - 1) as usize;
    let x1 = bx.xmax as usize;
    for y in bx.ymin..=bx.ymax {
        let row = (y - 1) as usize * width;
        match &img {
            ImageData::U8(v) => out.write(&v[row + x0..row + x1])?,
            ImageData::I16(v) => out.write(&i16_slice_to_be(&v[row + x0..row + x1]))?,
            ImageData::I32(v) => out.write(&i32_slice_to_be(&v[row + x0..row + x1]))?,
            ImageData::I64(v) => out.write(&i64_slice_to_be(&v[row + x0..row + x1]))?,
            ImageData::F32(v) => out.write(&f32_slice_to_be(&v[row + x0..row + x1]))?,
            ImageData::F64(v) => out.write(&f64_slice_to_be(&v[row + x0..row + x1]))?,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// HDU walk
// ---------------------------------------------------------------------------

const NAXIS_MSG: &str = "FITS file contains image HDU with NAXIS != 2";

/// Stream the sub-image of every HDU of `src` to the sink.
///
/// Table HDUs and image HDUs without data pass through verbatim; 2-D image
/// HDUs (plain or tile-compressed) are replaced by the cutout given by
/// `center` and `size`. Any other image dimensionality aborts the request.
pub fn stream_subimage<W: Write>(
    src: &[u8],
    center: &Coords,
    size: &Coords,
    sink: &mut W,
) -> Result<()> {
    let fits = parse_fits(src)?;
    let mut out = CountingSink { inner: sink, written: 0 };

    for hdu in fits.iter() {
        match &hdu.kind {
            // No image data: header passes through untouched.
            HduKind::Image { naxes, .. } if naxes.is_empty() => {
                copy_header(src, hdu, &mut out)?;
                copy_data(src, hdu, &mut out)?;
            }
            HduKind::Image { bitpix, naxes } => {
                if naxes.len() != 2 || naxes[0] <= 0 || naxes[1] <= 0 {
                    return Err(Error::UnsupportedImage(NAXIS_MSG));
                }
                let bx = cutout_pixel_box(center, size, &hdu.cards, naxes[0], naxes[1])?
                    .ok_or(Error::NoOverlap)?;
                let cards = header_card_images(src, hdu);
                emit_cutout_header(&cards, &bx, false, &mut out)?;
                emit_subimage_rows(src, hdu, *bitpix, naxes[0], &bx, &mut out)?;
                out.pad_block(DATA_PAD_BYTE)?;
            }
            HduKind::CompressedImage(c) => {
                if c.znaxes.len() != 2 || c.znaxes[0] <= 0 || c.znaxes[1] <= 0 {
                    return Err(Error::UnsupportedImage(NAXIS_MSG));
                }
                let cards = decompressed_image_cards(src, hdu, c);
                let parsed = cards
                    .iter()
                    .map(parse_card)
                    .collect::<Result<Vec<Card>>>()?;
                let bx = cutout_pixel_box(center, size, &parsed, c.znaxes[0], c.znaxes[1])?
                    .ok_or(Error::NoOverlap)?;
                emit_cutout_header(&cards, &bx, true, &mut out)?;
                emit_decompressed_rows(src, hdu, c, &bx, &mut out)?;
                out.pad_block(DATA_PAD_BYTE)?;
            }
            HduKind::Other => {
                copy_header(src, hdu, &mut out)?;
                copy_data(src, hdu, &mut out)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> CardImage {
        let mut buf = [b' '; CARD_SIZE];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    fn key(s: &str) -> [u8; 8] {
        let mut buf = [b' '; 8];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    #[test]
    fn naxis_keyword_matching() {
        assert_eq!(naxis_axis(&key("NAXIS1")), Some(0));
        assert_eq!(naxis_axis(&key("NAXIS2")), Some(1));
        assert_eq!(naxis_axis(&key("NAXIS")), None);
        assert_eq!(naxis_axis(&key("NAXIS3")), None);
        assert_eq!(naxis_axis(&key("NAXIS1A")), None);
    }

    #[test]
    fn ltv_keyword_matching() {
        assert_eq!(ltv_axis(&key("LTV1")), Some(0));
        assert_eq!(ltv_axis(&key("LTV2")), Some(1));
        assert_eq!(ltv_axis(&key("LTV3")), None);
        assert_eq!(ltv_axis(&key("LTV1A")), None);
        assert_eq!(ltv_axis(&key("LTM1_1")), None);
    }

    #[test]
    fn crpix_keyword_matching() {
        assert_eq!(crpix_axis(&key("CRPIX1")), Some(0));
        assert_eq!(crpix_axis(&key("CRPIX2")), Some(1));
        assert_eq!(crpix_axis(&key("CRPIX1A")), Some(0));
        assert_eq!(crpix_axis(&key("CRPIX2Z")), Some(1));
        assert_eq!(crpix_axis(&key("CRPIX3")), None);
        assert_eq!(crpix_axis(&key("CRPIX1a")), None);
        assert_eq!(crpix_axis(&key("CRVAL1")), None);
    }

    #[test]
    fn numbered_keyword_matching() {
        assert!(numbered_keyword(&key("TTYPE1"), b"TTYPE"));
        assert!(numbered_keyword(&key("ZNAXIS12"), b"ZNAXIS"));
        assert!(!numbered_keyword(&key("TTYPE"), b"TTYPE"));
        assert!(!numbered_keyword(&key("TTYPEX"), b"TTYPE"));
        assert!(!numbered_keyword(&key("ZNAXIS"), b"ZNAXIS"));
    }

    #[test]
    fn compression_keywords_filtered() {
        for k in [
            "XTENSION", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "PCOUNT", "GCOUNT", "TFIELDS",
            "TTYPE1", "TFORM1", "ZIMAGE", "ZBITPIX", "ZNAXIS", "ZNAXIS1", "ZTILE2", "ZCMPTYPE",
            "ZVAL1", "ZNAME1", "ZSIMPLE", "ZQUANTIZ",
        ] {
            assert!(is_compression_keyword(&key(k)), "{k} should be dropped");
        }
        for k in ["OBJECT", "CRPIX1", "CRVAL1", "CTYPE1", "DATE-OBS", "EXTNAME", "CHECKSUM"] {
            assert!(!is_compression_keyword(&key(k)), "{k} should be kept");
        }
    }

    #[test]
    fn shift_preserves_keyword_and_comment() {
        let image = raw("CRPIX1A =                 10.5 / alternate reference pixel");
        let shifted = shift_numeric_card(&image, -44.0).unwrap();
        let card = parse_card(&shifted).unwrap();
        assert_eq!(card.keyword_str(), "CRPIX1A");
        match card.value {
            Some(Value::Float(f)) => assert!((f + 33.5).abs() < 1e-12, "got {f}"),
            other => panic!("expected Float, got {other:?}"),
        }
        assert_eq!(card.comment, Some(String::from("alternate reference pixel")));
    }

    #[test]
    fn integer_replacement_preserves_comment() {
        let image = raw("NAXIS1  =                  100 / image width");
        let replaced = replace_integer_card(&image, 11).unwrap();
        let card = parse_card(&replaced).unwrap();
        assert_eq!(card.value, Some(Value::Integer(11)));
        assert_eq!(card.comment, Some(String::from("image width")));
    }

    #[test]
    fn reference_comments_recognized() {
        assert!(is_reference_comment(&raw(
            "COMMENT   FITS (Flexible Image Transport System) format is defined in 'Astro"
        )));
        assert!(is_reference_comment(&raw(
            "COMMENT   and Astrophysics', volume 376, page 359; bibcode: 2001A&A...376..359H"
        )));
        assert!(!is_reference_comment(&raw("COMMENT   some other comment")));
    }

    #[test]
    fn bytes_per_pixel_table() {
        assert_eq!(bytes_per_pixel(8).unwrap(), 1);
        assert_eq!(bytes_per_pixel(16).unwrap(), 2);
        assert_eq!(bytes_per_pixel(32).unwrap(), 4);
        assert_eq!(bytes_per_pixel(-32).unwrap(), 4);
        assert_eq!(bytes_per_pixel(64).unwrap(), 8);
        assert_eq!(bytes_per_pixel(-64).unwrap(), 8);
        assert!(matches!(bytes_per_pixel(12), Err(Error::InvalidBitpix(12))));
    }
}
