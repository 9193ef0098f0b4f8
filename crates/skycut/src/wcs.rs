//! Thin adapter over the `wcs` crate for one celestial WCS solution.
//!
//! Header cards are mapped into a [`WCSParams`] the same way the fitsrs
//! integration does it. The adapter converts between the library's
//! radian/`LonLat` world and the degree-space `(lng, lat)` pairs the cutout
//! solver works with, using 1-based FITS pixel coordinates throughout.

use wcs::{ImgXY, LonLat, WCSParams, WCS};

use crate::error::{Error, Result};
use crate::header::{card_f64, card_i64, card_string, Card};

/// One celestial WCS solution extracted from an image header.
#[derive(Debug)]
pub struct Wcs {
    proj: WCS,
}

fn wcs_fail() -> Error {
    Error::Wcs(String::from("Failed to extract WCS from FITS header"))
}

/// True if a CTYPE names the latitude axis (`DEC…` or `xLAT…`).
fn is_lat_axis(ctype: &str) -> bool {
    ctype.starts_with("DEC") || (ctype.len() >= 4 && &ctype[1..4] == "LAT")
}

/// True for keywords of the form `PVi_m`.
fn is_pv_keyword(keyword: &str) -> bool {
    let Some(rest) = keyword.strip_prefix("PV") else {
        return false;
    };
    let Some((i, m)) = rest.split_once('_') else {
        return false;
    };
    !i.is_empty()
        && !m.is_empty()
        && i.bytes().all(|b| b.is_ascii_digit())
        && m.bytes().all(|b| b.is_ascii_digit())
}

impl Wcs {
    /// Build a WCS from the header cards of a 2-D image HDU.
    ///
    /// Two header-sanitation policies are applied up front:
    ///
    /// * If every CTYPE carries a `-SIP` suffix and `PVi_m` cards are also
    ///   present, the PV parameters are dropped. SCAMP/SWARP-style PV
    ///   distortions conflict with the FITS standard's use of PV once the
    ///   SIP convention is in play.
    /// * If CTYPE1 names the latitude axis, the world-axis keyword pairs
    ///   are swapped so that callers always exchange `(lng, lat)`.
    pub fn from_cards(cards: &[Card]) -> Result<Self> {
        let ctype1_raw = card_string(cards, "CTYPE1").ok_or_else(wcs_fail)?;
        let ctype2_raw = card_string(cards, "CTYPE2");
        let naxis = card_i64(cards, "NAXIS").ok_or_else(wcs_fail)?;

        let all_sip = ctype1_raw.ends_with("-SIP")
            && ctype2_raw.as_deref().is_some_and(|c| c.ends_with("-SIP"));
        let has_pv = cards.iter().any(|c| is_pv_keyword(c.keyword_str()));
        let strip_pv = all_sip && has_pv;

        let swap = is_lat_axis(&ctype1_raw);

        // Keyword lookups honoring the world-axis swap: axis-1 keywords read
        // axis-2 cards (and vice versa) when the latitude axis leads.
        let fval = |key: &str| card_f64(cards, key);
        let ival = |key: &str| card_i64(cards, key);
        let sval = |key: &str| card_string(cards, key);
        let fsw = |a: &str, b: &str| if swap { card_f64(cards, b) } else { card_f64(cards, a) };
        let pv = |a: &str, b: &str| if strip_pv { None } else { fsw(a, b) };

        let ctype1 = if swap {
            ctype2_raw.clone().ok_or_else(wcs_fail)?
        } else {
            ctype1_raw.clone()
        };
        let ctype2 = if swap { Some(ctype1_raw) } else { ctype2_raw };

        // Swapping world axes exchanges the rows of the CD/PC matrix while
        // the pixel columns stay put. A CDELT-only header has an implicit
        // identity PC matrix, whose row swap is the permutation matrix.
        let has_matrix = ["CD1_1", "CD1_2", "CD2_1", "CD2_2", "PC1_1", "PC1_2", "PC2_1", "PC2_2"]
            .iter()
            .any(|&k| card_f64(cards, k).is_some());
        let (pc1_1, pc1_2, pc2_1, pc2_2) = if swap && !has_matrix {
            (Some(0.0), Some(1.0), Some(1.0), Some(0.0))
        } else {
            (
                fsw("PC1_1", "PC2_1"),
                fsw("PC1_2", "PC2_2"),
                fsw("PC2_1", "PC1_1"),
                fsw("PC2_2", "PC1_2"),
            )
        };

        let params = WCSParams {
            ctype1,
            naxis: Some(naxis),

            naxis1: ival("NAXIS1").ok_or_else(wcs_fail)?,
            naxis2: ival("NAXIS2").ok_or_else(wcs_fail)?,
            naxis3: ival("NAXIS3"),
            naxis4: ival("NAXIS4"),
            ctype2,
            ctype3: sval("CTYPE3"),
            a_order: ival("A_ORDER"),
            b_order: ival("B_ORDER"),
            ap_order: ival("AP_ORDER"),
            bp_order: ival("BP_ORDER"),
            crpix1: fval("CRPIX1"),
            crpix2: fval("CRPIX2"),
            crpix3: fval("CRPIX3"),
            crval1: fsw("CRVAL1", "CRVAL2"),
            crval2: fsw("CRVAL2", "CRVAL1"),
            crval3: fval("CRVAL3"),
            crota1: fsw("CROTA1", "CROTA2"),
            crota2: fsw("CROTA2", "CROTA1"),
            crota3: fval("CROTA3"),
            cdelt1: fsw("CDELT1", "CDELT2"),
            cdelt2: fsw("CDELT2", "CDELT1"),
            cdelt3: fval("CDELT3"),
            lonpole: fval("LONPOLE"),
            latpole: fval("LATPOLE"),
            equinox: fval("EQUINOX"),
            epoch: fval("EPOCH"),
            radesys: sval("RADESYS"),
            pv1_0: pv("PV1_0", "PV2_0"),
            pv1_1: pv("PV1_1", "PV2_1"),
            pv1_2: pv("PV1_2", "PV2_2"),
            pv2_0: pv("PV2_0", "PV1_0"),
            pv2_1: pv("PV2_1", "PV1_1"),
            pv2_2: pv("PV2_2", "PV1_2"),
            pv2_3: pv("PV2_3", "PV1_3"),
            pv2_4: pv("PV2_4", "PV1_4"),
            pv2_5: pv("PV2_5", "PV1_5"),
            pv2_6: pv("PV2_6", "PV1_6"),
            pv2_7: pv("PV2_7", "PV1_7"),
            pv2_8: pv("PV2_8", "PV1_8"),
            pv2_9: pv("PV2_9", "PV1_9"),
            pv2_10: pv("PV2_10", "PV1_10"),
            pv2_11: pv("PV2_11", "PV1_11"),
            pv2_12: pv("PV2_12", "PV1_12"),
            pv2_13: pv("PV2_13", "PV1_13"),
            pv2_14: pv("PV2_14", "PV1_14"),
            pv2_15: pv("PV2_15", "PV1_15"),
            pv2_16: pv("PV2_16", "PV1_16"),
            pv2_17: pv("PV2_17", "PV1_17"),
            pv2_18: pv("PV2_18", "PV1_18"),
            pv2_19: pv("PV2_19", "PV1_19"),
            pv2_20: pv("PV2_20", "PV1_20"),
            cd1_1: fsw("CD1_1", "CD2_1"),
            cd1_2: fsw("CD1_2", "CD2_2"),
            cd1_3: fval("CD1_3"),
            cd2_1: fsw("CD2_1", "CD1_1"),
            cd2_2: fsw("CD2_2", "CD1_2"),
            cd2_3: fval("CD2_3"),
            cd3_1: fval("CD3_1"),
            cd3_2: fval("CD3_2"),
            cd3_3: fval("CD3_3"),
            pc1_1,
            pc1_2,
            pc1_3: fval("PC1_3"),
            pc2_1,
            pc2_2,
            pc2_3: fval("PC2_3"),
            pc3_1: fval("PC3_1"),
            pc3_2: fval("PC3_2"),
            pc3_3: fval("PC3_3"),
            a_0_0: fval("A_0_0"),
            a_0_1: fval("A_0_1"),
            a_0_2: fval("A_0_2"),
            a_0_3: fval("A_0_3"),
            a_0_4: fval("A_0_4"),
            a_0_5: fval("A_0_5"),
            a_0_6: fval("A_0_6"),
            a_1_0: fval("A_1_0"),
            a_1_1: fval("A_1_1"),
            a_1_2: fval("A_1_2"),
            a_1_3: fval("A_1_3"),
            a_1_4: fval("A_1_4"),
            a_1_5: fval("A_1_5"),
            a_2_0: fval("A_2_0"),
            a_2_1: fval("A_2_1"),
            a_2_2: fval("A_2_2"),
            a_2_3: fval("A_2_3"),
            a_2_4: fval("A_2_4"),
            a_3_0: fval("A_3_0"),
            a_3_1: fval("A_3_1"),
            a_3_2: fval("A_3_2"),
            a_3_3: fval("A_3_3"),
            a_4_0: fval("A_4_0"),
            a_4_1: fval("A_4_1"),
            a_4_2: fval("A_4_2"),
            a_5_0: fval("A_5_0"),
            a_5_1: fval("A_5_1"),
            a_6_0: fval("A_6_0"),
            ap_0_0: fval("AP_0_0"),
            ap_0_1: fval("AP_0_1"),
            ap_0_2: fval("AP_0_2"),
            ap_0_3: fval("AP_0_3"),
            ap_0_4: fval("AP_0_4"),
            ap_0_5: fval("AP_0_5"),
            ap_0_6: fval("AP_0_6"),
            ap_1_0: fval("AP_1_0"),
            ap_1_1: fval("AP_1_1"),
            ap_1_2: fval("AP_1_2"),
            ap_1_3: fval("AP_1_3"),
            ap_1_4: fval("AP_1_4"),
            ap_1_5: fval("AP_1_5"),
            ap_2_0: fval("AP_2_0"),
            ap_2_1: fval("AP_2_1"),
            ap_2_2: fval("AP_2_2"),
            ap_2_3: fval("AP_2_3"),
            ap_2_4: fval("AP_2_4"),
            ap_3_0: fval("AP_3_0"),
            ap_3_1: fval("AP_3_1"),
            ap_3_2: fval("AP_3_2"),
            ap_3_3: fval("AP_3_3"),
            ap_4_0: fval("AP_4_0"),
            ap_4_1: fval("AP_4_1"),
            ap_4_2: fval("AP_4_2"),
            ap_5_0: fval("AP_5_0"),
            ap_5_1: fval("AP_5_1"),
            ap_6_0: fval("AP_6_0"),
            b_0_0: fval("B_0_0"),
            b_0_1: fval("B_0_1"),
            b_0_2: fval("B_0_2"),
            b_0_3: fval("B_0_3"),
            b_0_4: fval("B_0_4"),
            b_0_5: fval("B_0_5"),
            b_0_6: fval("B_0_6"),
            b_1_0: fval("B_1_0"),
            b_1_1: fval("B_1_1"),
            b_1_2: fval("B_1_2"),
            b_1_3: fval("B_1_3"),
            b_1_4: fval("B_1_4"),
            b_1_5: fval("B_1_5"),
            b_2_0: fval("B_2_0"),
            b_2_1: fval("B_2_1"),
            b_2_2: fval("B_2_2"),
            b_2_3: fval("B_2_3"),
            b_2_4: fval("B_2_4"),
            b_3_0: fval("B_3_0"),
            b_3_1: fval("B_3_1"),
            b_3_2: fval("B_3_2"),
            b_3_3: fval("B_3_3"),
            b_4_0: fval("B_4_0"),
            b_4_1: fval("B_4_1"),
            b_4_2: fval("B_4_2"),
            b_5_0: fval("B_5_0"),
            b_5_1: fval("B_5_1"),
            b_6_0: fval("B_6_0"),
            bp_0_0: fval("BP_0_0"),
            bp_0_1: fval("BP_0_1"),
            bp_0_2: fval("BP_0_2"),
            bp_0_3: fval("BP_0_3"),
            bp_0_4: fval("BP_0_4"),
            bp_0_5: fval("BP_0_5"),
            bp_0_6: fval("BP_0_6"),
            bp_1_0: fval("BP_1_0"),
            bp_1_1: fval("BP_1_1"),
            bp_1_2: fval("BP_1_2"),
            bp_1_3: fval("BP_1_3"),
            bp_1_4: fval("BP_1_4"),
            bp_1_5: fval("BP_1_5"),
            bp_2_0: fval("BP_2_0"),
            bp_2_1: fval("BP_2_1"),
            bp_2_2: fval("BP_2_2"),
            bp_2_3: fval("BP_2_3"),
            bp_2_4: fval("BP_2_4"),
            bp_3_0: fval("BP_3_0"),
            bp_3_1: fval("BP_3_1"),
            bp_3_2: fval("BP_3_2"),
            bp_3_3: fval("BP_3_3"),
            bp_4_0: fval("BP_4_0"),
            bp_4_1: fval("BP_4_1"),
            bp_4_2: fval("BP_4_2"),
            bp_5_0: fval("BP_5_0"),
            bp_5_1: fval("BP_5_1"),
            bp_6_0: fval("BP_6_0"),
        };

        let proj = WCS::new(&params).map_err(|_| wcs_fail())?;
        Ok(Wcs { proj })
    }

    /// Convert 1-based FITS pixel coordinates to `(lng, lat)` in degrees.
    pub fn pixel_to_sky(&self, pix: [f64; 2]) -> Result<[f64; 2]> {
        let xy = ImgXY::new(pix[0], pix[1]);
        let lonlat = self
            .proj
            .unproj(&xy)
            .ok_or_else(|| Error::BadRequest(String::from("Invalid pixel coordinates")))?;
        Ok([lonlat.lon().to_degrees(), lonlat.lat().to_degrees()])
    }

    /// Convert `(lng, lat)` in degrees to 1-based FITS pixel coordinates.
    pub fn sky_to_pixel(&self, sky: [f64; 2]) -> Result<[f64; 2]> {
        let lonlat = LonLat::new(sky[0].to_radians(), sky[1].to_radians());
        let xy = self
            .proj
            .proj(&lonlat)
            .ok_or_else(|| Error::BadRequest(String::from("Invalid sky coordinates")))?;
        Ok([xy.x(), xy.y()])
    }
}
