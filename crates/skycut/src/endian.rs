//! Big-endian byte conversion for FITS data.
//!
//! FITS stores all binary data most-significant byte first. Readers convert
//! to native order for typed access; the streamer converts decompressed
//! pixel values back to big-endian before they reach the output.

/// Read a big-endian `i16` from the first 2 bytes of the slice.
#[inline]
pub fn read_i16_be(buf: &[u8]) -> i16 {
    i16::from_be_bytes([buf[0], buf[1]])
}

/// Read a big-endian `i32` from the first 4 bytes of the slice.
#[inline]
pub fn read_i32_be(buf: &[u8]) -> i32 {
    i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a big-endian `i64` from the first 8 bytes of the slice.
#[inline]
pub fn read_i64_be(buf: &[u8]) -> i64 {
    i64::from_be_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Read a big-endian `f32` (IEEE 754) from the first 4 bytes of the slice.
#[inline]
pub fn read_f32_be(buf: &[u8]) -> f32 {
    f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a big-endian `f64` (IEEE 754) from the first 8 bytes of the slice.
#[inline]
pub fn read_f64_be(buf: &[u8]) -> f64 {
    f64::from_be_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

// --- Bulk serialization to big-endian ---

/// Serialize a native-endian `i16` slice to big-endian FITS bytes.
pub fn i16_slice_to_be(vals: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vals.len() * 2);
    for v in vals {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

/// Serialize a native-endian `i32` slice to big-endian FITS bytes.
pub fn i32_slice_to_be(vals: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vals.len() * 4);
    for v in vals {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

/// Serialize a native-endian `i64` slice to big-endian FITS bytes.
pub fn i64_slice_to_be(vals: &[i64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vals.len() * 8);
    for v in vals {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

/// Serialize a native-endian `f32` slice to big-endian FITS bytes.
pub fn f32_slice_to_be(vals: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vals.len() * 4);
    for v in vals {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

/// Serialize a native-endian `f64` slice to big-endian FITS bytes.
pub fn f64_slice_to_be(vals: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vals.len() * 8);
    for v in vals {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_single_values() {
        assert_eq!(read_i16_be(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_i32_be(&[0x01, 0x02, 0x03, 0x04]), 0x01020304);
        assert_eq!(
            read_i64_be(&[0, 0, 0, 0, 0x01, 0x02, 0x03, 0x04]),
            0x01020304
        );
        assert_eq!(read_f32_be(&1.5f32.to_be_bytes()), 1.5);
        assert_eq!(read_f64_be(&(-2.25f64).to_be_bytes()), -2.25);
    }

    #[test]
    fn read_negative_integers() {
        assert_eq!(read_i16_be(&[0xFF, 0xFE]), -2);
        assert_eq!(read_i32_be(&[0xFF, 0xFF, 0xFF, 0xFF]), -1);
    }

    #[test]
    fn i16_roundtrip() {
        let vals = [0i16, 1, -1, i16::MIN, i16::MAX, 1000];
        let bytes = i16_slice_to_be(&vals);
        assert_eq!(bytes.len(), vals.len() * 2);
        for (i, &v) in vals.iter().enumerate() {
            assert_eq!(read_i16_be(&bytes[i * 2..]), v);
        }
    }

    #[test]
    fn i32_roundtrip() {
        let vals = [0i32, 55055, -99000, i32::MIN, i32::MAX];
        let bytes = i32_slice_to_be(&vals);
        for (i, &v) in vals.iter().enumerate() {
            assert_eq!(read_i32_be(&bytes[i * 4..]), v);
        }
    }

    #[test]
    fn i64_roundtrip() {
        let vals = [0i64, 1, -1, i64::MIN, i64::MAX];
        let bytes = i64_slice_to_be(&vals);
        for (i, &v) in vals.iter().enumerate() {
            assert_eq!(read_i64_be(&bytes[i * 8..]), v);
        }
    }

    #[test]
    fn float_roundtrip() {
        let f32s = [0.0f32, 1.5, -3.25, f32::MAX];
        let bytes = f32_slice_to_be(&f32s);
        for (i, &v) in f32s.iter().enumerate() {
            assert_eq!(read_f32_be(&bytes[i * 4..]), v);
        }

        let f64s = [0.0f64, 1.5, -3.25, f64::MIN_POSITIVE];
        let bytes = f64_slice_to_be(&f64s);
        for (i, &v) in f64s.iter().enumerate() {
            assert_eq!(read_f64_be(&bytes[i * 8..]), v);
        }
    }

    #[test]
    fn big_endian_byte_order_on_disk() {
        // 0x0102 must serialize MSB first regardless of host order.
        assert_eq!(i16_slice_to_be(&[0x0102]), vec![0x01, 0x02]);
        assert_eq!(i32_slice_to_be(&[1]), vec![0, 0, 0, 1]);
    }
}
