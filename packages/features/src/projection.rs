//! Universal Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Polygon areas must be measured in a projected, metric coordinate system:
//! an "area" computed from longitude/latitude degrees is meaningless. A
//! state's land-use polygons are projected into the UTM zone covering the
//! centre of their bounding box before their planar area is taken.

use crate::FeatureError;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone: a 6°-wide band of longitude plus a hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    /// Zone number, 1 through 60.
    pub number: u8,
    /// Whether the zone is in the northern hemisphere.
    pub north: bool,
}

impl UtmZone {
    /// Picks the zone containing the given WGS84 point.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Projection`] if the point is not finite or
    /// lies outside the latitudes UTM covers (80°S to 84°N).
    pub fn estimate(lon: f64, lat: f64) -> Result<Self, FeatureError> {
        if !lon.is_finite() || !lat.is_finite() || !(-80.0..=84.0).contains(&lat) {
            return Err(FeatureError::Projection { lon, lat });
        }

        let wrapped = (lon + 180.0).rem_euclid(360.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let number = ((wrapped / 6.0).floor() as u8).min(59) + 1;

        Ok(Self {
            number,
            north: lat >= 0.0,
        })
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    /// The EPSG code of this zone's WGS84 / UTM coordinate system.
    #[must_use]
    pub fn epsg(self) -> u32 {
        let base = if self.north { 32_600 } else { 32_700 };
        base + u32::from(self.number)
    }

    /// Projects a WGS84 point to `(easting, northing)` in metres.
    #[must_use]
    #[allow(clippy::many_single_char_names, clippy::suboptimal_flops)]
    pub fn project(self, lon: f64, lat: f64) -> (f64, f64) {
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let phi = lat.to_radians();
        let lambda = (lon - self.central_meridian()).to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = SEMI_MAJOR_AXIS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * lambda;

        let m = SEMI_MAJOR_AXIS
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let easting = SCALE_FACTOR
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
            + FALSE_EASTING;

        let mut northing = SCALE_FACTOR
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

        if !self.north {
            northing += FALSE_NORTHING_SOUTH;
        }

        (easting, northing)
    }
}
