//! WGS84 <-> UTM projection and planar pose geometry.
//!
//! Poses are kept projected so every distance in the engine is a plain
//! Euclidean distance in metres. Lat/lon only appears at the edges: trigger
//! targets written by operators and waypoints reported back to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// WGS84 semi-major axis in metres.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central meridian scale factor.
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const SOUTH_FALSE_NORTHING: f64 = 10_000_000.0;

/// A projected position in a UTM zone.
///
/// `zone == 0` marks a pose with no fix. Such poses are what the state store
/// hands out before the first GPS message arrives and are ignored by the
/// crumb graph.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UtmPose {
    pub easting: f64,
    pub northing: f64,
    pub zone: u8,
    /// Northern hemisphere.
    #[serde(default = "default_north")]
    pub north: bool,
}

fn default_north() -> bool {
    true
}

impl UtmPose {
    pub fn new(easting: f64, northing: f64, zone: u8, north: bool) -> Self {
        Self {
            easting,
            northing,
            zone,
            north,
        }
    }

    /// Whether this pose carries a real fix.
    pub fn is_fixed(&self) -> bool {
        (1..=60).contains(&self.zone) && self.easting.is_finite() && self.northing.is_finite()
    }

    /// Planar distance in metres.
    ///
    /// Zones are not reconciled; a vehicle is assumed to stay in one zone for
    /// a session.
    pub fn distance_to(&self, other: &UtmPose) -> f64 {
        (self.easting - other.easting).hypot(self.northing - other.northing)
    }

    /// Project a geodetic position onto its UTM zone.
    ///
    /// # Arguments
    ///
    /// * `lat`, `lon` - Position in degrees
    ///
    /// # Returns
    ///
    /// The projected pose. The zone is the standard 6° band; the Norway and
    /// Svalbard exceptions are not applied.
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        let lon = normalize_longitude(lon);
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        let lon0 = central_meridian(zone).to_radians();

        let phi = lat.to_radians();
        let lambda = lon.to_radians();
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * (lambda - lon0);
        let m = meridian_arc(phi, e2);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let easting = UTM_K0
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
            + FALSE_EASTING;

        let mut northing = UTM_K0
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

        let north = lat >= 0.0;
        if !north {
            northing += SOUTH_FALSE_NORTHING;
        }

        Self {
            easting,
            northing,
            zone,
            north,
        }
    }

    /// Inverse projection back to degrees.
    ///
    /// # Returns
    ///
    /// Tuple of (latitude, longitude) in degrees
    pub fn to_lat_lon(&self) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let x = self.easting - FALSE_EASTING;
        let y = if self.north {
            self.northing
        } else {
            self.northing - SOUTH_FALSE_NORTHING
        };

        let m = y / UTM_K0;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let sq = (1.0 - e2).sqrt();
        let e1 = (1.0 - sq) / (1.0 + sq);

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();
        let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
        let t1 = tan1 * tan1;
        let c1 = ep2 * cos1 * cos1;
        let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = x / (n1 * UTM_K0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let phi = phi1
            - (n1 * tan1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);

        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos1;

        let lon = central_meridian(self.zone) + lambda.to_degrees();
        (phi.to_degrees(), normalize_longitude(lon))
    }
}

impl fmt::Display for UtmPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}E {:.2}N zone {}{}",
            self.easting,
            self.northing,
            self.zone,
            if self.north { "N" } else { "S" }
        )
    }
}

/// Central meridian of a UTM zone, in degrees.
fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

/// Meridian arc length from the equator to latitude `phi` (radians).
fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Normalize longitude to the -180..180 range.
fn normalize_longitude(lon: f64) -> f64 {
    let mut normalized = lon % 360.0;
    if normalized >= 180.0 {
        normalized -= 360.0;
    } else if normalized < -180.0 {
        normalized += 360.0;
    }
    normalized
}
