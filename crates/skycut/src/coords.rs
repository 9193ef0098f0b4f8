//! Request coordinate parsing: the units grammar, degree conversion, and
//! sky normalization, plus the boolean grammar of the gzip flag.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Radians per degree.
pub const RAD_PER_DEG: f64 = 0.0174532925199432957692369076849;
/// Degrees per radian.
pub const DEG_PER_RAD: f64 = 57.2957795130823208767981548141;
/// Radians per arcminute.
pub const RAD_PER_ARCMIN: f64 = 0.000290888208665721596153948461415;
/// Radians per arcsecond.
pub const RAD_PER_ARCSEC: f64 = 0.00000484813681109535993589914102357;

/// Units a coordinate pair can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// Image pixels (1-based FITS convention).
    Pixel,
    /// Seconds of arc.
    Arcsec,
    /// Minutes of arc.
    Arcmin,
    /// Degrees.
    Degree,
    /// Radians.
    Radian,
}

/// A coordinate pair with its units: a cutout center or a cutout size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    /// The two components, in request order.
    pub c: [f64; 2],
    /// Units both components are expressed in.
    pub units: Units,
}

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());
static PIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(p|px|pix(els?)?)$").unwrap());
static ARCSEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^("|a(rc)?-?sec(onds?)?)$"#).unwrap());
static ARCMIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^('|a(rc)?-?min(utes?)?)$").unwrap());
static DEG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(d|deg(rees?)?)$").unwrap());
static RAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^rad(ians?)?$").unwrap());
static TRUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(1|on?|y(es)?|t(rue)?)$").unwrap());
static FALSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(0|no?|o(ff?)?|f(alse)?)$").unwrap());

fn parse_units(text: &str) -> Option<Units> {
    if PIX_RE.is_match(text) {
        Some(Units::Pixel)
    } else if ARCSEC_RE.is_match(text) {
        Some(Units::Arcsec)
    } else if ARCMIN_RE.is_match(text) {
        Some(Units::Arcmin)
    } else if DEG_RE.is_match(text) {
        Some(Units::Degree)
    } else if RAD_RE.is_match(text) {
        Some(Units::Radian)
    } else {
        None
    }
}

/// Parse a request parameter of the form `v1[,v2][ unit]` into a [`Coords`].
///
/// A single value with `require_pair == false` is duplicated into both
/// components. A missing unit adopts `default_units`. `key` names the query
/// parameter for error messages.
pub fn parse_coords(
    value: &str,
    key: &str,
    default_units: Units,
    require_pair: bool,
) -> Result<Coords> {
    let bad = || {
        Error::BadRequest(format!(
            "Value of {key} parameter must consist of {} comma separated floating \
             point numbers, followed by an optional units specification.",
            if require_pair { "2" } else { "1 or 2" }
        ))
    };

    let comma = value.find(',');
    if comma.is_none() && require_pair {
        return Err(bad());
    }

    let text = value.trim_start();
    let m = NUMBER_RE.find(text).ok_or_else(bad)?;
    let c0: f64 = m.as_str().parse().map_err(|_| bad())?;
    let mut rest = text[m.end()..].trim_start();

    let c1 = if let Some(after) = rest.strip_prefix(',') {
        let after = after.trim_start();
        let m = NUMBER_RE.find(after).ok_or_else(bad)?;
        let v: f64 = m.as_str().parse().map_err(|_| bad())?;
        rest = after[m.end()..].trim_start();
        v
    } else if comma.is_some() {
        // A comma exists but does not directly follow the first number.
        return Err(bad());
    } else {
        c0
    };

    let unit_text = rest.trim_end();
    let units = if unit_text.is_empty() {
        default_units
    } else {
        parse_units(unit_text).ok_or_else(|| {
            Error::BadRequest(format!(
                "Value of {key} parameter has invalid trailing unit specification"
            ))
        })?
    };

    Ok(Coords { c: [c0, c1], units })
}

/// Convert an angular center to degrees and normalize it onto the sky.
///
/// The declination must lie in `[-90, 90]`; the longitude is wrapped into
/// `[0, 360)`. Pixel-unit coordinates pass through unchanged (callers
/// project them to the sky first).
pub fn sky_center_degrees(coords: &Coords) -> Result<[f64; 2]> {
    let mut c = coords.c;
    match coords.units {
        Units::Arcsec => {
            c[0] /= 3600.0;
            c[1] /= 3600.0;
        }
        Units::Arcmin => {
            c[0] /= 60.0;
            c[1] /= 60.0;
        }
        Units::Radian => {
            c[0] *= DEG_PER_RAD;
            c[1] *= DEG_PER_RAD;
        }
        Units::Degree | Units::Pixel => {}
    }
    if c[1] < -90.0 || c[1] > 90.0 {
        return Err(Error::BadRequest(String::from(
            "Center declination out of range [-90, 90] deg",
        )));
    }
    c[0] %= 360.0;
    if c[0] < 0.0 {
        c[0] += 360.0;
        if c[0] == 360.0 {
            c[0] = 0.0;
        }
    }
    Ok(c)
}

/// Convert an angular size to radians per axis.
pub fn size_radians(coords: &Coords) -> [f64; 2] {
    let mut c = coords.c;
    match coords.units {
        Units::Arcsec => {
            c[0] *= RAD_PER_ARCSEC;
            c[1] *= RAD_PER_ARCSEC;
        }
        Units::Arcmin => {
            c[0] *= RAD_PER_ARCMIN;
            c[1] *= RAD_PER_ARCMIN;
        }
        Units::Degree => {
            c[0] *= RAD_PER_DEG;
            c[1] *= RAD_PER_DEG;
        }
        Units::Radian | Units::Pixel => {}
    }
    c
}

/// Parse the boolean `gzip` request parameter.
///
/// `1|on|y|yes|t|true` enable compression, `0|n|no|o|of|off|f|false`
/// disable it (case-insensitive; the true grammar wins for the ambiguous
/// `o`). A missing parameter takes the default.
pub fn parse_gzip_flag(value: Option<&str>, default: bool) -> Result<bool> {
    let Some(v) = value else {
        return Ok(default);
    };
    let v = v.trim();
    if TRUE_RE.is_match(v) {
        Ok(true)
    } else if FALSE_RE.is_match(v) {
        Ok(false)
    } else {
        Err(Error::BadRequest(String::from(
            "Value of gzip parameter must be a boolean",
        )))
    }
}
