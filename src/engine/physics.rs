use crate::engine::models::{Coordinate, CurrentData, EnvironmentSample, MS_TO_KNOTS, Tack, normalize_bearing};
use crate::parsers::polars::PolarTable;

/// Boat motion for one heading under one environment sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoatVelocity {
    /// True wind angle off the bow, [0, 180]
    pub twa: f64,
    /// Speed through the water (knots)
    pub stw_kts: f64,
    /// Velocity through the water, East/North components (m/s)
    pub water_vx: f64,
    pub water_vy: f64,
    /// Speed over ground (m/s)
    pub sog: f64,
    /// Course over ground (degrees)
    pub cog: f64,
    /// Apparent wind speed felt on board (knots)
    pub aws_kts: f64,
    /// None when the wind is dead ahead, dead astern or calm
    pub tack: Option<Tack>,
}

/// Result of sailing one segment from a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub position: Coordinate,
    pub distance_m: f64,
    pub cog: f64,
}

pub struct PhysicsModel;

impl PhysicsModel {
    pub fn new() -> Self {
        Self
    }

    /// Calculates True Wind Angle (TWA) from True Wind Direction (TWD) and Boat Heading
    pub fn calculate_twa(twd: f64, heading: f64) -> f64 {
        Self::signed_wind_angle(twd, heading).abs()
    }

    /// Wind angle off the bow in (-180, 180]; positive when the wind comes over starboard
    pub fn signed_wind_angle(twd: f64, heading: f64) -> f64 {
        let a = (twd - heading).rem_euclid(360.0);
        if a > 180.0 { a - 360.0 } else { a }
    }

    pub fn tack_for(twd: f64, heading: f64, tws: f64) -> Option<Tack> {
        if tws <= f64::EPSILON {
            return None;
        }
        let angle = Self::signed_wind_angle(twd, heading);
        if angle > 0.0 && angle < 180.0 {
            Some(Tack::Starboard)
        } else if angle < 0.0 {
            Some(Tack::Port)
        } else {
            None
        }
    }

    /// Computes the boat velocity over ground and the apparent wind for a true heading
    pub fn compute_vector(
        &self,
        heading: f64,
        sample: &EnvironmentSample,
        polar: &PolarTable,
    ) -> BoatVelocity {
        let wind = &sample.wind;
        let current = &sample.current;

        let tws_ms = wind.speed();
        let twd = wind.direction();
        let twa = Self::calculate_twa(twd, heading);

        let stw_kts = polar.speed(tws_ms * MS_TO_KNOTS, twa);
        let stw = stw_kts / MS_TO_KNOTS;

        let heading_rad = heading.to_radians();
        let water_vx = stw * heading_rad.sin();
        let water_vy = stw * heading_rad.cos();

        let sog_x = water_vx + current.u;
        let sog_y = water_vy + current.v;
        let sog = (sog_x.powi(2) + sog_y.powi(2)).sqrt();
        let cog = normalize_bearing(sog_x.atan2(sog_y).to_degrees());

        // Apparent wind is the true wind minus the boat's own motion over ground
        let aw_x = wind.u - sog_x;
        let aw_y = wind.v - sog_y;
        let aws_kts = (aw_x.powi(2) + aw_y.powi(2)).sqrt() * MS_TO_KNOTS;

        BoatVelocity {
            twa,
            stw_kts,
            water_vx,
            water_vy,
            sog,
            cog,
            aws_kts,
            tack: Self::tack_for(twd, heading, tws_ms),
        }
    }

    /// Moves `from` by a boat velocity plus current drift. Sailing time can be
    /// shorter than drift time when a maneuver eats into the segment.
    pub fn displace(
        from: &Coordinate,
        velocity: BoatVelocity,
        current: &CurrentData,
        sailing_secs: f64,
        drift_secs: f64,
    ) -> Segment {
        let dx = velocity.water_vx * sailing_secs + current.u * drift_secs;
        let dy = velocity.water_vy * sailing_secs + current.v * drift_secs;
        let distance_m = (dx.powi(2) + dy.powi(2)).sqrt();
        let cog = if distance_m > 0.0 {
            normalize_bearing(dx.atan2(dy).to_degrees())
        } else {
            velocity.cog
        };

        Segment {
            position: from.destination(distance_m, cog),
            distance_m,
            cog,
        }
    }
}

impl Default for PhysicsModel {
    fn default() -> Self {
        Self::new()
    }
}
