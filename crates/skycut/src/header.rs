//! FITS header card parsing and serialization.

use std::str;

use crate::block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, HEADER_PAD_BYTE};
use crate::error::{Error, Result};
use crate::value::{format_value, parse_value, Value};

/// A parsed FITS header card (one 80-byte keyword record).
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword name, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if this card has a value indicator (`= ` in bytes 8..10).
    pub value: Option<Value>,
    /// An optional comment string.
    pub comment: Option<String>,
}

impl Card {
    /// Return the keyword as a trimmed UTF-8 string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    /// Returns `true` if this card is the END keyword.
    pub fn is_end(&self) -> bool {
        &self.keyword == b"END     "
    }

    /// Returns `true` if this is a blank card (keyword is all spaces).
    pub fn is_blank(&self) -> bool {
        self.keyword.iter().all(|&b| b == b' ')
    }
}

/// Pad a short keyword name to 8 bytes with trailing ASCII spaces.
pub const fn kw(name: &[u8]) -> [u8; 8] {
    let mut buf = [b' '; 8];
    let mut i = 0;
    while i < name.len() && i < 8 {
        buf[i] = name[i];
        i += 1;
    }
    buf
}

/// Build a card from its parts.
pub fn make_card(keyword: &[u8], value: Option<Value>, comment: Option<&str>) -> Card {
    Card {
        keyword: kw(keyword),
        value,
        comment: comment.map(String::from),
    }
}

/// Keywords that never carry a value indicator; bytes 8..80 are free text.
const COMMENTARY_KEYWORDS: [&[u8; 8]; 3] = [b"COMMENT ", b"HISTORY ", b"        "];

/// Parse a single 80-byte FITS header card.
pub fn parse_card(card_bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&card_bytes[..8]);

    for &b in &keyword {
        match b {
            b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_' => {}
            _ => return Err(Error::InvalidKeyword),
        }
    }

    if &keyword == b"END     " {
        return Ok(Card {
            keyword,
            value: None,
            comment: None,
        });
    }

    if COMMENTARY_KEYWORDS.contains(&&keyword) || card_bytes[8] != b'=' || card_bytes[9] != b' ' {
        // Commentary or valueless card: the rest is free-form text.
        let text = str::from_utf8(&card_bytes[8..CARD_SIZE])
            .map_err(|_| Error::InvalidHeader("non-ASCII card text"))?
            .trim_end();
        return Ok(Card {
            keyword,
            value: None,
            comment: (!text.is_empty()).then(|| String::from(text)),
        });
    }

    let value_field = &card_bytes[10..CARD_SIZE];
    match parse_value(value_field) {
        Some((val, comment)) => Ok(Card {
            keyword,
            value: Some(val),
            comment: comment.map(String::from),
        }),
        None => {
            // Undefined value, possibly with a comment.
            let field_str = str::from_utf8(value_field)
                .map_err(|_| Error::InvalidHeader("non-ASCII card text"))?;
            let comment = field_str.find(" /").map(|idx| {
                let after = idx + 2;
                let start = if field_str.as_bytes().get(after) == Some(&b' ') {
                    after + 1
                } else {
                    after
                };
                String::from(field_str[start..].trim_end())
            });
            Ok(Card {
                keyword,
                value: None,
                comment: comment.filter(|c| !c.is_empty()),
            })
        }
    }
}

/// Parse consecutive 2880-byte header blocks until the END card is found.
///
/// Only complete blocks are scanned; trailing bytes shorter than a block are
/// ignored, which tolerates files whose total size is not block-aligned.
pub fn parse_header_blocks(data: &[u8]) -> Result<Vec<Card>> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut cards = Vec::new();
    let num_blocks = data.len() / BLOCK_SIZE;

    for block_idx in 0..num_blocks {
        let block_start = block_idx * BLOCK_SIZE;
        for card_idx in 0..CARDS_PER_BLOCK {
            let card_start = block_start + card_idx * CARD_SIZE;
            let card_bytes: &[u8; CARD_SIZE] = data[card_start..card_start + CARD_SIZE]
                .try_into()
                .expect("card slice is CARD_SIZE bytes");

            let card = parse_card(card_bytes)?;
            let is_end = card.is_end();
            cards.push(card);

            if is_end {
                return Ok(cards);
            }
        }
    }

    Err(Error::UnexpectedEof)
}

/// Return the number of bytes consumed by the header (always a multiple of
/// [`BLOCK_SIZE`]), scanning for the END card.
pub fn header_byte_len(data: &[u8]) -> Result<usize> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let num_blocks = data.len() / BLOCK_SIZE;

    for block_idx in 0..num_blocks {
        let block_start = block_idx * BLOCK_SIZE;
        for card_idx in 0..CARDS_PER_BLOCK {
            let card_start = block_start + card_idx * CARD_SIZE;
            if &data[card_start..card_start + 8] == b"END     " {
                return Ok((block_idx + 1) * BLOCK_SIZE);
            }
        }
    }

    Err(Error::UnexpectedEof)
}

/// Serialize a [`Card`] into an 80-byte FITS card image.
pub fn format_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..8].copy_from_slice(&card.keyword);

    if let Some(ref value) = card.value {
        buf[8] = b'=';
        buf[9] = b' ';

        let mut field = format_value(value);
        if let Some(ref comment) = card.comment {
            insert_comment(&mut field, comment);
        }
        buf[10..80].copy_from_slice(&field);
    } else if !card.is_blank() {
        if let Some(ref comment) = card.comment {
            let bytes = comment.as_bytes();
            let len = bytes.len().min(72);
            buf[8..8 + len].copy_from_slice(&bytes[..len]);
        }
    }

    buf
}

/// Insert a ` / comment` string into a 70-byte value field.
fn insert_comment(field: &mut [u8; 70], comment: &str) {
    let content_end = if field[0] == b'\'' {
        let mut i = 1;
        loop {
            if i >= 70 {
                break i;
            }
            if field[i] == b'\'' {
                if i + 1 < 70 && field[i + 1] == b'\'' {
                    i += 2;
                } else {
                    break i + 1;
                }
            } else {
                i += 1;
            }
        }
    } else {
        20
    };

    let sep_start = content_end + 1;
    if sep_start + 3 >= 70 {
        return;
    }

    field[sep_start] = b'/';
    field[sep_start + 1] = b' ';

    let comment_start = sep_start + 2;
    let comment_bytes = comment.as_bytes();
    let max_len = 70 - comment_start;
    let len = comment_bytes.len().min(max_len);
    field[comment_start..comment_start + len].copy_from_slice(&comment_bytes[..len]);
}

/// Create the standard FITS END card.
pub fn format_end_card() -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..3].copy_from_slice(b"END");
    buf
}

/// Serialize a sequence of header cards into complete FITS header blocks.
///
/// Appends the END card and pads the final block with blank cards. The
/// returned length is always a multiple of [`BLOCK_SIZE`].
pub fn serialize_header(cards: &[Card]) -> Vec<u8> {
    let total_cards = cards.len() + 1; // +1 for END
    let total_blocks = total_cards.div_ceil(CARDS_PER_BLOCK);
    let total_bytes = total_blocks * BLOCK_SIZE;

    let mut buf = vec![HEADER_PAD_BYTE; total_bytes];

    for (i, card) in cards.iter().enumerate() {
        let offset = i * CARD_SIZE;
        buf[offset..offset + CARD_SIZE].copy_from_slice(&format_card(card));
    }

    let end_offset = cards.len() * CARD_SIZE;
    buf[end_offset..end_offset + CARD_SIZE].copy_from_slice(&format_end_card());

    buf
}

/// Find an integer-valued keyword in a card list.
pub fn card_i64(cards: &[Card], keyword: &str) -> Option<i64> {
    cards
        .iter()
        .find(|c| c.keyword_str() == keyword)
        .and_then(|c| c.value.as_ref())
        .and_then(Value::as_i64)
}

/// Find a numeric keyword in a card list, promoting integers to `f64`.
pub fn card_f64(cards: &[Card], keyword: &str) -> Option<f64> {
    cards
        .iter()
        .find(|c| c.keyword_str() == keyword)
        .and_then(|c| c.value.as_ref())
        .and_then(Value::as_f64)
}

/// Find a string-valued keyword in a card list, trimmed.
pub fn card_string(cards: &[Card], keyword: &str) -> Option<String> {
    cards.iter().find(|c| c.keyword_str() == keyword).and_then(|c| match &c.value {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        _ => None,
    })
}

/// Find a logical-valued keyword in a card list.
pub fn card_bool(cards: &[Card], keyword: &str) -> Option<bool> {
    cards.iter().find(|c| c.keyword_str() == keyword).and_then(|c| match &c.value {
        Some(Value::Logical(b)) => Some(*b),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_image(s: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        let bytes = s.as_bytes();
        let len = bytes.len().min(CARD_SIZE);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    fn make_header_block(cards: &[[u8; CARD_SIZE]]) -> Vec<u8> {
        assert!(cards.len() <= CARDS_PER_BLOCK);
        let mut block = vec![b' '; BLOCK_SIZE];
        for (i, card) in cards.iter().enumerate() {
            let start = i * CARD_SIZE;
            block[start..start + CARD_SIZE].copy_from_slice(card);
        }
        block
    }

    #[test]
    fn parse_card_string_value() {
        let card = make_image("TELESCOP= 'Hale 5m '           / telescope name");
        let c = parse_card(&card).unwrap();
        assert_eq!(c.keyword_str(), "TELESCOP");
        assert_eq!(c.value, Some(Value::String(String::from("Hale 5m"))));
        assert_eq!(c.comment, Some(String::from("telescope name")));
    }

    #[test]
    fn parse_card_integer_value() {
        let card = make_image("BITPIX  =                   16 / bits per pixel");
        let c = parse_card(&card).unwrap();
        assert_eq!(c.value, Some(Value::Integer(16)));
        assert_eq!(c.comment, Some(String::from("bits per pixel")));
    }

    #[test]
    fn parse_card_logical() {
        let c = parse_card(&make_image("SIMPLE  =                    T")).unwrap();
        assert_eq!(c.value, Some(Value::Logical(true)));
    }

    #[test]
    fn parse_card_comment_keyword() {
        let c = parse_card(&make_image("COMMENT This file is part of an archive.")).unwrap();
        assert_eq!(c.keyword_str(), "COMMENT");
        assert!(c.value.is_none());
        assert_eq!(c.comment, Some(String::from("This file is part of an archive.")));
    }

    #[test]
    fn parse_card_blank_keyword() {
        let c = parse_card(&[b' '; CARD_SIZE]).unwrap();
        assert!(c.is_blank());
        assert!(c.comment.is_none());
    }

    #[test]
    fn parse_card_end() {
        assert!(parse_card(&make_image("END")).unwrap().is_end());
    }

    #[test]
    fn parse_card_lowercase_keyword_rejected() {
        assert!(matches!(
            parse_card(&make_image("bitpix  =                   16")),
            Err(Error::InvalidKeyword)
        ));
    }

    #[test]
    fn parse_card_hyphen_keyword() {
        let c = parse_card(&make_image("DATE-OBS= '2024-01-15'")).unwrap();
        assert_eq!(c.keyword_str(), "DATE-OBS");
    }

    #[test]
    fn parse_card_undefined_value_with_comment() {
        let c = parse_card(&make_image("BLANK   =                      / undefined")).unwrap();
        assert!(c.value.is_none());
        assert_eq!(c.comment, Some(String::from("undefined")));
    }

    #[test]
    fn parse_header_finds_end() {
        let cards = [
            make_image("SIMPLE  =                    T"),
            make_image("BITPIX  =                   16"),
            make_image("NAXIS   =                    0"),
            make_image("END"),
        ];
        let block = make_header_block(&cards);
        let parsed = parse_header_blocks(&block).unwrap();
        assert_eq!(parsed.len(), 4);
        assert!(parsed[3].is_end());
        assert_eq!(header_byte_len(&block).unwrap(), BLOCK_SIZE);
    }

    #[test]
    fn parse_header_missing_end_fails() {
        let block = make_header_block(&[make_image("SIMPLE  =                    T")]);
        assert!(matches!(parse_header_blocks(&block), Err(Error::UnexpectedEof)));
        assert!(header_byte_len(&block).is_err());
    }

    #[test]
    fn parse_header_spanning_two_blocks() {
        let mut data = vec![b' '; 2 * BLOCK_SIZE];
        for i in 0..CARDS_PER_BLOCK {
            let card = make_image(&format!("KEY{i:<5}=                    {i}"));
            data[i * CARD_SIZE..(i + 1) * CARD_SIZE].copy_from_slice(&card);
        }
        data[BLOCK_SIZE..BLOCK_SIZE + CARD_SIZE].copy_from_slice(&make_image("END"));

        let parsed = parse_header_blocks(&data).unwrap();
        assert_eq!(parsed.len(), CARDS_PER_BLOCK + 1);
        assert_eq!(header_byte_len(&data).unwrap(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn format_card_roundtrip() {
        let card = make_card(b"CRPIX1", Some(Value::Float(-44.0)), Some("reference pixel"));
        let image = format_card(&card);
        assert_eq!(image.len(), 80);
        assert_eq!(&image[..8], b"CRPIX1  ");
        assert_eq!(&image[8..10], b"= ");

        let reparsed = parse_card(&image).unwrap();
        assert_eq!(reparsed.keyword_str(), "CRPIX1");
        match reparsed.value {
            Some(Value::Float(f)) => assert_eq!(f, -44.0),
            other => panic!("expected Float, got {other:?}"),
        }
        assert_eq!(reparsed.comment, Some(String::from("reference pixel")));
    }

    #[test]
    fn format_end_card_padded() {
        let buf = format_end_card();
        assert_eq!(&buf[..3], b"END");
        assert!(buf[3..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn serialize_header_block_aligned() {
        let cards = vec![make_card(b"SIMPLE", Some(Value::Logical(true)), None)];
        let header = serialize_header(&cards);
        assert_eq!(header.len(), BLOCK_SIZE);
        assert_eq!(&header[80..83], b"END");
        assert!(header[160..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn serialize_header_spills_to_two_blocks() {
        let cards: Vec<Card> = (0..36)
            .map(|i| make_card(format!("KEY{i:05}").as_bytes(), Some(Value::Integer(i)), None))
            .collect();
        assert_eq!(serialize_header(&cards).len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn card_lookups() {
        let cards = vec![
            make_card(b"NAXIS1", Some(Value::Integer(100)), None),
            make_card(b"CRPIX1", Some(Value::Float(50.5)), None),
            make_card(b"CTYPE1", Some(Value::String(String::from("RA---TAN"))), None),
            make_card(b"ZIMAGE", Some(Value::Logical(true)), None),
        ];
        assert_eq!(card_i64(&cards, "NAXIS1"), Some(100));
        assert_eq!(card_f64(&cards, "NAXIS1"), Some(100.0));
        assert_eq!(card_f64(&cards, "CRPIX1"), Some(50.5));
        assert_eq!(card_string(&cards, "CTYPE1"), Some(String::from("RA---TAN")));
        assert_eq!(card_bool(&cards, "ZIMAGE"), Some(true));
        assert_eq!(card_i64(&cards, "MISSING"), None);
    }
}
