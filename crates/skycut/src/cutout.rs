//! Pixel-box solving: map a cutout center and size onto an integer pixel
//! bounding box against an image's WCS.

use nalgebra::Vector3;

use crate::coords::{size_radians, sky_center_degrees, Coords, Units};
use crate::error::{Error, Result};
use crate::header::Card;
use crate::wcs::Wcs;

/// Inclusive 1-based pixel bounding box of a cutout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    /// First column of the cutout.
    pub xmin: i64,
    /// First row of the cutout.
    pub ymin: i64,
    /// Last column of the cutout.
    pub xmax: i64,
    /// Last row of the cutout.
    pub ymax: i64,
}

impl PixelBox {
    /// Number of columns covered.
    pub fn width(&self) -> i64 {
        self.xmax - self.xmin + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> i64 {
        self.ymax - self.ymin + 1
    }

    /// Lower bound of the given axis (0 = x, 1 = y).
    pub fn min(&self, axis: usize) -> i64 {
        if axis == 0 {
            self.xmin
        } else {
            self.ymin
        }
    }
}

/// Return the center coordinate of the pixel containing `x`, FITS
/// conventions: pixel N has center coordinate N and spans [N - 0.5, N + 0.5).
pub fn pixcen(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Last pixel whose half-open extent intersects an interval ending at `x`.
///
/// Differs from [`pixcen`] only when `x` lands exactly on a pixel boundary:
/// the interval then touches the next pixel in a single point, which does
/// not put that pixel into the cutout. Keeps an odd-sized box symmetric
/// around an integer center.
fn pixcen_upper(x: f64) -> f64 {
    let p = (x + 0.5).floor();
    if x + 0.5 == p {
        p - 1.0
    } else {
        p
    }
}

/// Convert spherical coordinates (degrees) to a unit vector in R3.
fn unit_vector(sky: [f64; 2]) -> Vector3<f64> {
    let (lon, lat) = (sky[0].to_radians(), sky[1].to_radians());
    Vector3::new(lon.cos() * lat.cos(), lon.sin() * lat.cos(), lat.sin())
}

/// Angular separation in radians between two unit vectors, numerically
/// stable near 0 and pi.
fn angular_distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let cs = a.dot(b);
    let ss = a.cross(b).norm();
    if ss != 0.0 || cs != 0.0 {
        ss.atan2(cs)
    } else {
        0.0
    }
}

fn pixel_bounds(center: [f64; 2], size: [f64; 2]) -> (f64, f64, f64, f64) {
    (
        pixcen(center[0] - size[0] * 0.5),
        pixcen_upper(center[0] + size[0] * 0.5),
        pixcen(center[1] - size[1] * 0.5),
        pixcen_upper(center[1] + size[1] * 0.5),
    )
}

/// Find the closest x or y coordinate whose great-circle distance from the
/// sky center is at least `size` radians, walking outwards from the center
/// pixel along one axis.
///
/// The step grows geometrically until the distance overshoots, then the
/// walk bisects back; it stops once the step drops below one pixel or the
/// position stops being finite.
fn search(wcs: &Wcs, sky: [f64; 2], pix: [f64; 2], size: f64, dim: usize, dir: f64) -> Result<f64> {
    let cen = unit_vector(sky);
    let mut inc = dir;
    let mut p = [0.0f64; 2];
    p[1 - dim] = pix[1 - dim];
    p[dim] = pixcen(pix[dim]) + 0.5 * inc;
    let mut scale = 2.0;
    while inc.abs() >= 1.0 && p[0].is_finite() && p[1].is_finite() {
        let s = wcs.pixel_to_sky(p)?;
        let d = angular_distance(&cen, &unit_vector(s));
        if d < size {
            inc *= scale;
            p[dim] += inc;
        } else if d > size {
            scale = 0.5;
            inc *= 0.5;
            p[dim] -= inc;
        } else {
            break;
        }
    }
    Ok(pixcen(p[dim]))
}

/// Map the given center and size to a pixel-space box for a cutout.
///
/// Returns `Ok(None)` when the requested cutout does not overlap the
/// `naxis1` x `naxis2` image. The header cards are only consulted (for a
/// WCS solution) when center or size are not both in pixel units.
pub fn cutout_pixel_box(
    center: &Coords,
    size: &Coords,
    cards: &[Card],
    naxis1: i64,
    naxis2: i64,
) -> Result<Option<PixelBox>> {
    let (xmin, xmax, ymin, ymax) = if center.units == Units::Pixel && size.units == Units::Pixel {
        pixel_bounds(center.c, size.c)
    } else {
        // Map center and/or size through the image's WCS.
        let wcs = Wcs::from_cards(cards)?;
        let (sky, pc) = if center.units == Units::Pixel {
            (wcs.pixel_to_sky(center.c)?, center.c)
        } else {
            let sky = sky_center_degrees(center)?;
            (sky, wcs.sky_to_pixel(sky)?)
        };
        if size.c[0] < 0.0 || size.c[1] < 0.0 {
            return Err(Error::BadRequest(String::from("Negative cutout size")));
        }
        if size.units == Units::Pixel {
            pixel_bounds(pc, size.c)
        } else {
            let sz = size_radians(size);
            (
                search(&wcs, sky, pc, sz[0] * 0.5, 0, -1.0)?,
                search(&wcs, sky, pc, sz[0] * 0.5, 0, 1.0)?,
                search(&wcs, sky, pc, sz[1] * 0.5, 1, -1.0)?,
                search(&wcs, sky, pc, sz[1] * 0.5, 1, 1.0)?,
            )
        }
    };

    // The sub-image must overlap the image.
    if xmin > naxis1 as f64 || ymin > naxis2 as f64 || xmax < 1.0 || ymax < 1.0 {
        return Ok(None);
    }

    let clipped = PixelBox {
        xmin: xmin.max(1.0) as i64,
        ymin: ymin.max(1.0) as i64,
        xmax: xmax.min(naxis1 as f64) as i64,
        ymax: ymax.min(naxis2 as f64) as i64,
    };
    // A degenerate request (e.g. zero-ish size from a malformed search)
    // clips to an empty box.
    if clipped.xmin > clipped.xmax || clipped.ymin > clipped.ymax {
        return Ok(None);
    }
    Ok(Some(clipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::RAD_PER_DEG;
    use crate::wcs::tests::tan_cards;

    fn pix(c0: f64, c1: f64) -> Coords {
        Coords { c: [c0, c1], units: Units::Pixel }
    }

    #[test]
    fn pixcen_convention() {
        assert_eq!(pixcen(1.0), 1.0);
        assert_eq!(pixcen(1.49), 1.0);
        assert_eq!(pixcen(1.5), 2.0);
        assert_eq!(pixcen(0.99), 1.0);
        assert_eq!(pixcen(-0.6), -1.0);
        // pixcen(x) is the integer whose pixel interval contains x, so the
        // offset stays within half a pixel (the +0.5 edge belongs to the
        // next pixel).
        for &x in &[0.0, 0.25, 7.4, -3.49, 1e6 + 0.4] {
            let d = pixcen(x) - x;
            assert!((-0.5..0.5).contains(&d), "x = {x}, d = {d}");
        }
        assert_eq!(pixcen(7.5) - 7.5, 0.5);
    }

    #[test]
    fn upper_edge_excludes_zero_measure_overlap() {
        // An interval ending exactly on a pixel boundary does not include
        // the next pixel.
        assert_eq!(pixcen_upper(55.5), 55.0);
        assert_eq!(pixcen_upper(55.0), 55.0);
        assert_eq!(pixcen_upper(55.8), 56.0);
        assert_eq!(pixcen_upper(-44.5), -45.0);
    }

    #[test]
    fn angular_distance_basics() {
        let a = unit_vector([0.0, 0.0]);
        let b = unit_vector([90.0, 0.0]);
        assert!((angular_distance(&a, &b) - 90.0 * RAD_PER_DEG).abs() < 1e-12);
        assert_eq!(angular_distance(&a, &a), 0.0);

        let c = unit_vector([180.0, 0.0]);
        assert!((angular_distance(&a, &c) - 180.0 * RAD_PER_DEG).abs() < 1e-12);
    }

    #[test]
    fn pure_pixel_box_is_wcs_free() {
        // No WCS keywords at all; pixel-unit requests must not need them.
        let box_ = cutout_pixel_box(&pix(50.0, 50.0), &pix(11.0, 11.0), &[], 100, 100)
            .unwrap()
            .unwrap();
        assert_eq!(box_, PixelBox { xmin: 45, ymin: 45, xmax: 55, ymax: 55 });
        assert_eq!(box_.width(), 11);
        assert_eq!(box_.height(), 11);
    }

    #[test]
    fn odd_size_is_symmetric_around_integer_center() {
        let box_ = cutout_pixel_box(&pix(50.0, 50.0), &pix(5.0, 5.0), &[], 100, 100)
            .unwrap()
            .unwrap();
        assert_eq!(box_.xmin, 48);
        assert_eq!(box_.xmax, 52);
        assert_eq!(50 - box_.xmin, box_.xmax - 50);
    }

    #[test]
    fn pixel_box_clips_to_image() {
        let box_ = cutout_pixel_box(&pix(2.0, 99.0), &pix(10.0, 10.0), &[], 100, 100)
            .unwrap()
            .unwrap();
        assert_eq!(box_, PixelBox { xmin: 1, ymin: 94, xmax: 7, ymax: 100 });
    }

    #[test]
    fn disjoint_pixel_box_is_none() {
        assert!(cutout_pixel_box(&pix(-50.0, 50.0), &pix(11.0, 11.0), &[], 100, 100)
            .unwrap()
            .is_none());
        assert!(cutout_pixel_box(&pix(50.0, 500.0), &pix(11.0, 11.0), &[], 100, 100)
            .unwrap()
            .is_none());
    }

    #[test]
    fn sky_size_on_tan_projection() {
        // 1 arcsec/pixel TAN image; a 10 arcsec cutout at the reference
        // point covers the 10 central pixels, with up to one extra pixel
        // per edge because the boundary walk stops below a one-pixel step.
        let cards = tan_cards([150.0, 20.0]);
        let center = Coords { c: [150.0, 20.0], units: Units::Degree };
        let size = Coords { c: [10.0, 10.0], units: Units::Arcsec };
        let box_ = cutout_pixel_box(&center, &size, &cards, 100, 100)
            .unwrap()
            .unwrap();
        assert!((10..=12).contains(&box_.width()), "box {box_:?}");
        assert!((10..=12).contains(&box_.height()), "box {box_:?}");
        assert!(box_.xmin <= 46 && box_.xmax >= 55, "box {box_:?}");
        // Centered on the reference pixel.
        assert!((box_.xmin + box_.xmax - 101).abs() <= 1, "box {box_:?}");
        assert!((box_.ymin + box_.ymax - 101).abs() <= 1, "box {box_:?}");
    }

    #[test]
    fn pixel_center_with_sky_size() {
        let cards = tan_cards([150.0, 20.0]);
        let center = Coords { c: [50.5, 50.5], units: Units::Pixel };
        let size = Coords { c: [10.0, 10.0], units: Units::Arcsec };
        let box_ = cutout_pixel_box(&center, &size, &cards, 100, 100)
            .unwrap()
            .unwrap();
        assert!((10..=12).contains(&box_.width()), "box {box_:?}");
    }

    #[test]
    fn sky_center_ten_degrees_away_misses() {
        // Gnomonic projection at 1 arcsec/pixel: 10 degrees is 36000 pixels
        // off the 100x100 image.
        let cards = tan_cards([150.0, 20.0]);
        let center = Coords { c: [160.0, 20.0], units: Units::Degree };
        let size = Coords { c: [10.0, 10.0], units: Units::Arcsec };
        assert!(cutout_pixel_box(&center, &size, &cards, 100, 100)
            .unwrap()
            .is_none());
    }

    #[test]
    fn negative_sky_size_rejected() {
        let cards = tan_cards([150.0, 20.0]);
        let center = Coords { c: [150.0, 20.0], units: Units::Degree };
        let size = Coords { c: [-1.0, 1.0], units: Units::Arcsec };
        let err = cutout_pixel_box(&center, &size, &cards, 100, 100).unwrap_err();
        assert_eq!(err.to_string(), "Negative cutout size");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn out_of_range_declination_rejected() {
        let cards = tan_cards([150.0, 20.0]);
        let center = Coords { c: [150.0, 91.0], units: Units::Degree };
        let size = Coords { c: [10.0, 10.0], units: Units::Arcsec };
        let err = cutout_pixel_box(&center, &size, &cards, 100, 100).unwrap_err();
        assert!(err.to_string().contains("declination out of range"));
    }

    #[test]
    fn search_step_converges() {
        // The boundary search along +x from the reference pixel of a
        // 1 arcsec/pixel image: 5 arcsec must land ~5 pixels out.
        let wcs = Wcs::from_cards(&tan_cards([150.0, 0.0])).unwrap();
        let sky = [150.0, 0.0];
        let pc = wcs.sky_to_pixel(sky).unwrap();
        let x = search(&wcs, sky, pc, 5.0 * crate::coords::RAD_PER_ARCSEC, 0, -1.0).unwrap();
        assert!((x - (pc[0] - 5.0).round()).abs() <= 1.0, "x = {x}");
    }
}
