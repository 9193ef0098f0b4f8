/// All errors that can occur while serving an archive request.
#[derive(Debug)]
pub enum Error {
    /// Malformed request parameter: bad coordinate syntax, unknown unit
    /// suffix, out-of-range declination, negative size, or coordinates the
    /// WCS reports as invalid.
    BadRequest(String),
    /// The requested cutout box does not intersect the image.
    NoOverlap,
    /// Image HDU the cutout path cannot handle (unexpected NAXIS).
    UnsupportedImage(&'static str),
    /// WCS initialization or coordinate conversion failure.
    Wcs(String),
    /// Malformed FITS header block.
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    InvalidBitpix(i64),
    /// Malformed keyword name in a header card.
    InvalidKeyword,
    /// A required keyword was not found in the header.
    MissingKeyword(&'static str),
    /// Tile compression algorithm this crate does not decode.
    UnsupportedCompression,
    /// Compressed tile data failed to decode.
    DecompressionError,
    /// An I/O error from the standard library.
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status the CGI collaborator should report for this error.
    ///
    /// Only request-parameter problems are the client's fault; everything
    /// else, including a cutout that misses the image, surfaces as 500.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,
            _ => 500,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadRequest(msg) => write!(f, "{msg}"),
            Error::NoOverlap => write!(f, "Cutout does not overlap image"),
            Error::UnsupportedImage(msg) => write!(f, "{msg}"),
            Error::Wcs(msg) => write!(f, "{msg}"),
            Error::InvalidHeader(msg) => write!(f, "invalid FITS header: {msg}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::InvalidBitpix(v) => write!(f, "invalid BITPIX value: {v}"),
            Error::InvalidKeyword => write!(f, "invalid keyword name"),
            Error::MissingKeyword(kw) => write!(f, "missing required keyword: {kw}"),
            Error::UnsupportedCompression => write!(f, "unsupported tile compression type"),
            Error::DecompressionError => write!(f, "failed to decompress tile data"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
