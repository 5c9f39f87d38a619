use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per second to knots
pub const MS_TO_KNOTS: f64 = 1.943_844;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Initial great-circle bearing towards `other`, degrees clockwise from North in [0, 360)
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        let start_lat = self.lat.to_radians();
        let end_lat = other.lat.to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let y = d_lon.sin() * end_lat.cos();
        let x = start_lat.cos() * end_lat.sin() - start_lat.sin() * end_lat.cos() * d_lon.cos();
        normalize_bearing(y.atan2(x).to_degrees())
    }

    /// Great-circle (haversine) distance in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let start_lat = self.lat.to_radians();
        let end_lat = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + start_lat.cos() * end_lat.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Position reached after travelling `distance_m` along the great circle starting at `bearing_deg`
    pub fn destination(&self, distance_m: f64, bearing_deg: f64) -> Coordinate {
        if distance_m == 0.0 {
            return *self;
        }
        let angular_dist = distance_m / EARTH_RADIUS_M;
        let bearing_rad = bearing_deg.to_radians();

        let start_lat = self.lat.to_radians();
        let start_lon = self.lon.to_radians();

        let end_lat = (start_lat.sin() * angular_dist.cos()
            + start_lat.cos() * angular_dist.sin() * bearing_rad.cos())
        .asin();

        let end_lon = start_lon
            + (bearing_rad.sin() * angular_dist.sin() * start_lat.cos())
                .atan2(angular_dist.cos() - start_lat.sin() * end_lat.sin());

        Coordinate {
            lat: end_lat.to_degrees(),
            lon: normalize_longitude(end_lon.to_degrees()),
        }
    }
}

/// Wraps a bearing into [0, 360)
pub fn normalize_bearing(deg: f64) -> f64 {
    let b = deg.rem_euclid(360.0);
    if b >= 360.0 { 0.0 } else { b }
}

/// Wraps a longitude into [-180, 180]
pub fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Wind vector at a point. `u` is eastward, `v` northward (m/s), so the
/// vector points where the air is going.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindData {
    pub u: f64,
    pub v: f64,
}

impl WindData {
    /// Builds a wind from a speed in knots and a meteorological direction (where it blows from)
    pub fn from_knots(speed_kts: f64, from_deg: f64) -> Self {
        let speed = speed_kts / MS_TO_KNOTS;
        let to = (from_deg + 180.0).to_radians();
        Self {
            u: speed * to.sin(),
            v: speed * to.cos(),
        }
    }

    pub fn speed(&self) -> f64 {
        (self.u.powi(2) + self.v.powi(2)).sqrt()
    }

    pub fn speed_knots(&self) -> f64 {
        self.speed() * MS_TO_KNOTS
    }

    /// Meteorological direction the wind blows from, degrees in [0, 360)
    pub fn direction(&self) -> f64 {
        let angle = self.v.atan2(self.u).to_degrees();
        normalize_bearing(270.0 - angle)
    }
}

/// Ocean current vector (m/s), `u` eastward and `v` northward
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurrentData {
    pub u: f64,
    pub v: f64,
}

impl CurrentData {
    pub fn speed(&self) -> f64 {
        (self.u.powi(2) + self.v.powi(2)).sqrt()
    }
}

/// Wind and current at one position and time, as returned by an environment field
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub wind: WindData,
    pub current: CurrentData,
}

impl EnvironmentSample {
    pub fn new(wind: WindData, current: CurrentData) -> Self {
        Self { wind, current }
    }

    pub fn calm() -> Self {
        Self::default()
    }
}

/// Side the wind comes over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tack {
    Port,
    Starboard,
}
