//! Lambert Conformal Conic projection onto the KMA forecast grid.
//!
//! The village forecast API is keyed by an integer grid cell (`nx`, `ny`)
//! rather than by latitude/longitude. The grid is a 5 km Lambert conformal
//! conic projection with two standard parallels, anchored so that
//! 38°N 126°E falls on cell (43, 136).

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Whether the coordinate is something the projection can meaningfully map.
    ///
    /// The poles are excluded: `tan(π/2)` makes the cone radius degenerate.
    /// `project` never calls this; callers decide what to do with the answer.
    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude > -90.0
            && self.latitude < 90.0
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A forecast grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub nx: i32,
    pub ny: i32,
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.nx, self.ny)
    }
}

/// Projection parameters plus the cone constants derived from them.
#[derive(Debug, Clone)]
pub struct LambertGrid {
    /// Earth radius in grid units (km / grid spacing)
    re: f64,
    /// Origin longitude in radians
    olon: f64,
    /// Grid offset of the origin
    xo: f64,
    yo: f64,
    /// Cone constant
    sn: f64,
    /// Scale factor
    sf: f64,
    /// Cone radius at the origin latitude
    ro: f64,
}

impl LambertGrid {
    /// Build a grid from its defining parameters.
    ///
    /// # Arguments
    /// * `earth_radius_km` - Earth radius
    /// * `grid_km` - Grid spacing
    /// * `slat1_deg`, `slat2_deg` - Standard parallels
    /// * `olon_deg`, `olat_deg` - Projection origin
    /// * `xo`, `yo` - Grid coordinates of the origin
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        earth_radius_km: f64,
        grid_km: f64,
        slat1_deg: f64,
        slat2_deg: f64,
        olon_deg: f64,
        olat_deg: f64,
        xo: f64,
        yo: f64,
    ) -> Self {
        let re = earth_radius_km / grid_km;
        let slat1 = slat1_deg * DEG_TO_RAD;
        let slat2 = slat2_deg * DEG_TO_RAD;
        let olon = olon_deg * DEG_TO_RAD;
        let olat = olat_deg * DEG_TO_RAD;

        let sn = (slat1.cos() / slat2.cos()).ln()
            / ((PI * 0.25 + slat2 * 0.5).tan() / (PI * 0.25 + slat1 * 0.5).tan()).ln();
        let sf = (PI * 0.25 + slat1 * 0.5).tan().powf(sn) * slat1.cos() / sn;
        let ro = re * sf / (PI * 0.25 + olat * 0.5).tan().powf(sn);

        Self { re, olon, xo, yo, sn, sf, ro }
    }

    /// The grid used by the KMA short-term forecast service.
    pub fn kma() -> Self {
        Self::new(6371.00877, 5.0, 30.0, 60.0, 126.0, 38.0, 43.0, 136.0)
    }

    /// Fractional grid position of a coordinate, before truncation.
    pub fn position(&self, coord: GeoCoordinate) -> (f64, f64) {
        let ra = self.re * self.sf / (PI * 0.25 + coord.latitude * DEG_TO_RAD * 0.5).tan().powf(self.sn);

        // Single wrap into (-π, π]
        let mut theta = coord.longitude * DEG_TO_RAD - self.olon;
        if theta > PI {
            theta -= 2.0 * PI;
        }
        if theta < -PI {
            theta += 2.0 * PI;
        }
        theta *= self.sn;

        let x = ra * theta.sin() + self.xo;
        let y = self.ro - ra * theta.cos() + self.yo;
        (x, y)
    }

    /// Map a coordinate to its grid cell.
    ///
    /// Rounds by adding 0.5 and truncating toward zero, which is what the
    /// forecast service's own converter does. Negative positions therefore
    /// do not round symmetrically. Out-of-range input is not rejected; a pole
    /// yields a non-finite position which saturates through the cast.
    pub fn project(&self, coord: GeoCoordinate) -> GridCell {
        let (x, y) = self.position(coord);
        GridCell {
            nx: (x + 0.5) as i32,
            ny: (y + 0.5) as i32,
        }
    }

    /// Geographic coordinate of the centre of a grid cell.
    pub fn unproject(&self, cell: GridCell) -> GeoCoordinate {
        let xn = f64::from(cell.nx) - self.xo;
        let yn = self.ro - f64::from(cell.ny) + self.yo;

        let mut ra = (xn * xn + yn * yn).sqrt();
        if self.sn < 0.0 {
            ra = -ra;
        }
        let lat = 2.0 * (self.re * self.sf / ra).powf(1.0 / self.sn).atan() - PI * 0.5;

        let theta = if xn.abs() <= 0.0 {
            0.0
        } else if yn.abs() <= 0.0 {
            if xn < 0.0 { -PI * 0.5 } else { PI * 0.5 }
        } else {
            xn.atan2(yn)
        };
        let lon = theta / self.sn + self.olon;

        GeoCoordinate::new(lat * RAD_TO_DEG, lon * RAD_TO_DEG)
    }
}

impl Default for LambertGrid {
    fn default() -> Self {
        Self::kma()
    }
}

/// Project a coordinate onto the KMA forecast grid.
pub fn project(coord: GeoCoordinate) -> GridCell {
    LambertGrid::kma().project(coord)
}

/// Centre of a KMA forecast grid cell.
pub fn unproject(cell: GridCell) -> GeoCoordinate {
    LambertGrid::kma().unproject(cell)
}
