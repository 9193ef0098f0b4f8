use std::str;

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
}

impl Value {
    /// Numeric value as `f64`, promoting integers. `None` for non-numeric
    /// values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer value, `None` for anything else.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

/// Split a value field at the comment separator.
///
/// Returns `(value_part, optional_comment)`. The comment does not include the
/// leading separator.
///
/// The FITS standard uses ` / ` (space-slash-space) but real-world files
/// produced by IDL and other tools omit the trailing space (e.g.
/// `BITPIX = -32 /No. of bits per pixel`), so a bare ` /` is accepted too.
fn split_comment(field: &[u8]) -> (&[u8], Option<&str>) {
    let len = field.len();
    let mut i = 0;
    while i + 1 < len {
        if field[i] == b' ' && field[i + 1] == b'/' {
            let value_part = &field[..i];
            // Skip the slash; also skip one optional space after it.
            let mut comment_start = i + 2;
            if comment_start < len && field[comment_start] == b' ' {
                comment_start += 1;
            }
            let comment = str::from_utf8(&field[comment_start..])
                .ok()
                .map(|s| s.trim_end());
            return (value_part, comment.filter(|s| !s.is_empty()));
        }
        i += 1;
    }
    (field, None)
}

/// Parse a FITS character-string value from the 70-byte value field.
///
/// String values begin with `'` at the first byte. The content continues
/// until the closing `'`; doubled quotes `''` inside represent a literal `'`.
fn parse_string(field: &[u8]) -> Option<(Value, Option<&str>)> {
    if field.is_empty() || field[0] != b'\'' {
        return None;
    }

    let mut value = String::new();
    let mut i = 1; // skip opening quote
    let len = field.len();

    loop {
        if i >= len {
            // Unterminated string; be lenient and accept what we have.
            break;
        }
        if field[i] == b'\'' {
            if i + 1 < len && field[i + 1] == b'\'' {
                value.push('\'');
                i += 2;
            } else {
                i += 1;
                break;
            }
        } else {
            value.push(field[i] as char);
            i += 1;
        }
    }

    // Trim trailing spaces (FITS pads string values to min 8 chars).
    let trimmed = value.trim_end().to_string();

    let remainder = &field[i..];
    let comment = find_comment_in_remainder(remainder);

    Some((Value::String(trimmed), comment))
}

/// Given the bytes after a closing string quote, find the comment if present.
fn find_comment_in_remainder(remainder: &[u8]) -> Option<&str> {
    let len = remainder.len();
    let mut i = 0;
    while i + 1 < len {
        if remainder[i] == b' ' && remainder[i + 1] == b'/' {
            let mut comment_start = i + 2;
            if comment_start < len && remainder[comment_start] == b' ' {
                comment_start += 1;
            }
            let comment = str::from_utf8(&remainder[comment_start..])
                .ok()
                .map(|s| s.trim_end());
            return comment.filter(|s| !s.is_empty());
        }
        i += 1;
    }
    None
}

/// Parse a float string, handling FITS `D` exponent notation.
fn parse_float_str(s: &str) -> Option<f64> {
    let normalized = s.replace('D', "E").replace('d', "e");
    normalized.parse::<f64>().ok()
}

/// Parse a FITS header value from the 70-byte value portion of an 80-byte
/// card (bytes 10..80).
///
/// Returns the parsed [`Value`] and an optional comment string. The caller
/// is responsible for checking that bytes 8..10 of the card are `= ` (the
/// value indicator) before calling this function.
pub fn parse_value(value_bytes: &[u8]) -> Option<(Value, Option<&str>)> {
    if value_bytes.is_empty() {
        return None;
    }

    // 1. String values: first byte is a single quote.
    if value_bytes[0] == b'\'' {
        return parse_string(value_bytes);
    }

    // For all other types, split off the comment first.
    let (val_part, comment) = split_comment(value_bytes);

    let val_text = str::from_utf8(val_part).ok()?.trim();
    if val_text.is_empty() {
        return None;
    }

    // 2. Logical: `T` or `F`.
    if val_text == "T" {
        return Some((Value::Logical(true), comment));
    }
    if val_text == "F" {
        return Some((Value::Logical(false), comment));
    }

    // 3. Integer: no decimal point or exponent characters.
    if !val_text.contains(['.', 'E', 'e', 'D', 'd']) {
        if let Ok(n) = val_text.parse::<i64>() {
            return Some((Value::Integer(n), comment));
        }
    }

    // 4. Float.
    if let Some(f) = parse_float_str(val_text) {
        return Some((Value::Float(f), comment));
    }

    None
}

/// Serialize a [`Value`] into a 70-byte field suitable for bytes 10..80 of
/// an 80-byte FITS card.
///
/// Numeric and logical values are right-justified in the first 20 bytes
/// (columns 11-30 of the card). String values start at byte 0 with a single
/// quote.
pub fn format_value(value: &Value) -> [u8; 70] {
    let mut buf = [b' '; 70];

    match value {
        Value::Logical(b) => {
            // Standard: logical value in column 30 = index 20 of value field.
            buf[19] = if *b { b'T' } else { b'F' };
        }
        Value::Integer(n) => {
            right_justify(format!("{n}").as_bytes(), &mut buf[..20]);
        }
        Value::Float(f) => {
            right_justify(format_float(*f).as_bytes(), &mut buf[..20]);
        }
        Value::String(s) => {
            write_string(s, &mut buf);
        }
    }

    buf
}

/// Right-justify `src` within `dest`, padding the left with spaces.
fn right_justify(src: &[u8], dest: &mut [u8]) {
    let len = src.len().min(dest.len());
    let start = dest.len() - len;
    for b in dest.iter_mut() {
        *b = b' ';
    }
    dest[start..start + len].copy_from_slice(&src[..len]);
}

/// Format a float in scientific notation, starting at 15 significant
/// decimals and reducing precision until the text fits in 20 bytes.
pub fn format_float(f: f64) -> String {
    if f == 0.0 {
        return String::from("0.0");
    }
    let mut precision = 15usize;
    loop {
        let s = format!("{f:.precision$E}");
        if s.len() <= 20 || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

fn write_string(s: &str, buf: &mut [u8; 70]) {
    let mut pos = 0;
    buf[pos] = b'\'';
    pos += 1;

    for ch in s.bytes() {
        if pos >= 69 {
            break; // Leave room for closing quote.
        }
        if ch == b'\'' {
            if pos + 1 >= 69 {
                break;
            }
            buf[pos] = b'\'';
            buf[pos + 1] = b'\'';
            pos += 2;
        } else {
            buf[pos] = ch;
            pos += 1;
        }
    }

    // Pad to minimum 8 characters between quotes.
    while pos < 9 {
        buf[pos] = b' ';
        pos += 1;
    }

    if pos < 70 {
        buf[pos] = b'\'';
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(s: &str) -> Vec<u8> {
        let mut buf = vec![b' '; 70];
        let bytes = s.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }

    #[test]
    fn parse_logical_true() {
        let buf = field("                   T / standard");
        let (v, c) = parse_value(&buf).unwrap();
        assert_eq!(v, Value::Logical(true));
        assert_eq!(c, Some("standard"));
    }

    #[test]
    fn parse_logical_false() {
        let (v, _) = parse_value(&field("                   F")).unwrap();
        assert_eq!(v, Value::Logical(false));
    }

    #[test]
    fn parse_integer() {
        let buf = field("                  16 / bits per pixel");
        let (v, c) = parse_value(&buf).unwrap();
        assert_eq!(v, Value::Integer(16));
        assert_eq!(c, Some("bits per pixel"));
    }

    #[test]
    fn parse_negative_integer() {
        let (v, _) = parse_value(&field("                 -32")).unwrap();
        assert_eq!(v, Value::Integer(-32));
    }

    #[test]
    fn parse_float_scientific() {
        let (v, _) = parse_value(&field("          2.7315E+02 / temperature")).unwrap();
        match v {
            Value::Float(f) => assert!((f - 273.15).abs() < 1e-9),
            other => panic!("expected Float, got {other:?}"),
        }
    }

    #[test]
    fn parse_float_d_exponent() {
        let (v, _) = parse_value(&field("         1.5D+01")).unwrap();
        match v {
            Value::Float(f) => assert!((f - 15.0).abs() < 1e-12),
            other => panic!("expected Float, got {other:?}"),
        }
    }

    #[test]
    fn parse_string_simple() {
        let buf = field("'Hubble  '           / telescope");
        let (v, c) = parse_value(&buf).unwrap();
        assert_eq!(v, Value::String(String::from("Hubble")));
        assert_eq!(c, Some("telescope"));
    }

    #[test]
    fn parse_string_embedded_quote() {
        let (v, _) = parse_value(&field("'it''s ok '")).unwrap();
        assert_eq!(v, Value::String(String::from("it's ok")));
    }

    #[test]
    fn parse_comment_without_trailing_space() {
        let buf = field("                 -32 /No. of bits");
        let (v, c) = parse_value(&buf).unwrap();
        assert_eq!(v, Value::Integer(-32));
        assert_eq!(c, Some("No. of bits"));
    }

    #[test]
    fn parse_empty_field_is_none() {
        assert!(parse_value(&field("")).is_none());
        assert!(parse_value(&field("                     / comment only")).is_none());
    }

    #[test]
    fn as_f64_promotes_integer() {
        assert_eq!(Value::Integer(7).as_f64(), Some(7.0));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Logical(true).as_f64(), None);
    }

    #[test]
    fn format_logical_in_column_30() {
        let buf = format_value(&Value::Logical(true));
        assert_eq!(buf[19], b'T');
    }

    #[test]
    fn format_integer_right_justified() {
        let buf = format_value(&Value::Integer(11));
        assert_eq!(&buf[..20], b"                  11");
    }

    #[test]
    fn format_float_fits_in_20_bytes() {
        let buf = format_value(&Value::Float(-44.0));
        let text = str::from_utf8(&buf[..20]).unwrap().trim_start();
        assert!(text.len() <= 20);
        let parsed: f64 = text.parse().unwrap();
        assert_eq!(parsed, -44.0);
    }

    #[test]
    fn format_string_min_width() {
        let buf = format_value(&Value::String(String::from("IMAGE")));
        assert_eq!(&buf[..10], b"'IMAGE   '");
    }

    #[test]
    fn float_roundtrip_full_precision() {
        for &f in &[1.0, -44.0, 0.5, 123456.789012345, -9.87654321e-7] {
            let buf = format_value(&Value::Float(f));
            let (v, _) = parse_value(&buf).unwrap();
            match v {
                Value::Float(g) => assert!((g - f).abs() <= f.abs() * 1e-14),
                other => panic!("expected Float, got {other:?}"),
            }
        }
    }

    #[test]
    fn format_zero_float() {
        assert_eq!(format_float(0.0), "0.0");
    }
}
