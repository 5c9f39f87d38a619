use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::criteria::{Objectives, RiskModel};
use crate::engine::error::RoutingError;
use crate::engine::models::Coordinate;

/// What to route: endpoints, departure and the discretisation of the search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub start: Coordinate,
    pub destination: Coordinate,
    pub departure: DateTime<Utc>,
    /// Isochrone step in seconds
    pub time_step_secs: f64,
    /// Angle between two candidate headings, degrees
    pub heading_resolution_deg: f64,
    pub max_steps: u32,
    /// Arrival radius around the destination, meters
    pub tolerance_m: f64,
}

impl RoutingRequest {
    /// One hour steps, 5° headings, two weeks at most, one nautical mile arrival radius
    pub fn new(start: Coordinate, destination: Coordinate, departure: DateTime<Utc>) -> Self {
        Self {
            start,
            destination,
            departure,
            time_step_secs: 3600.0,
            heading_resolution_deg: 5.0,
            max_steps: 336,
            tolerance_m: 1852.0,
        }
    }

    pub fn validate(&self) -> Result<(), RoutingError> {
        if !self.start.is_valid() {
            return Err(RoutingError::config(format!("invalid start position {:?}", self.start)));
        }
        if !self.destination.is_valid() {
            return Err(RoutingError::config(format!("invalid destination {:?}", self.destination)));
        }
        if !(self.time_step_secs.is_finite() && self.time_step_secs > 0.0) {
            return Err(RoutingError::config(format!(
                "time step must be positive, got {}",
                self.time_step_secs
            )));
        }
        if !(self.heading_resolution_deg > 0.0 && self.heading_resolution_deg <= 180.0) {
            return Err(RoutingError::config(format!(
                "heading resolution must be within (0, 180] degrees, got {}",
                self.heading_resolution_deg
            )));
        }
        if self.max_steps == 0 {
            return Err(RoutingError::config("max_steps must be at least 1"));
        }
        if !(self.tolerance_m.is_finite() && self.tolerance_m >= 0.0) {
            return Err(RoutingError::config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance_m
            )));
        }
        if self.horizon().is_none() {
            return Err(RoutingError::config(format!(
                "{} steps of {}s from {} run past the representable time range",
                self.max_steps, self.time_step_secs, self.departure
            )));
        }
        Ok(())
    }

    /// Latest time the search can reach, None when it does not fit in a `DateTime<Utc>`
    pub fn horizon(&self) -> Option<DateTime<Utc>> {
        let total_ms = (self.time_step_secs * 1000.0).round() * self.max_steps as f64;
        if !(total_ms.is_finite() && total_ms < i64::MAX as f64) {
            return None;
        }
        let span = TimeDelta::try_milliseconds(total_ms as i64)?;
        self.departure.checked_add_signed(span)
    }

    /// Candidate heading count per frontier point
    pub fn heading_count(&self) -> usize {
        ((360.0 / self.heading_resolution_deg).round() as usize).max(1)
    }
}

/// Time lost when the wind changes side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManeuverPenalty {
    /// Bow through the wind (new TWA below 90°)
    pub tack_secs: f64,
    /// Stern through the wind
    pub gybe_secs: f64,
}

impl Default for ManeuverPenalty {
    fn default() -> Self {
        Self { tack_secs: 0.0, gybe_secs: 0.0 }
    }
}

/// How the frontier is pruned and compared.
///
/// The defaults trade exactness for a bounded frontier: `max_points_per_cell`
/// and `boundary_only` both discard candidates that nothing dominates. Set
/// them to `usize::MAX` and `false` to keep every non-dominated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Spatial bins per degree of latitude and longitude; only candidates
    /// sharing a bin are compared for dominance
    pub bin_cells_per_degree: f64,
    /// Survivors kept per bin after dominance filtering, closest to the
    /// destination first. Non-dominated candidates beyond the cap are dropped.
    pub max_points_per_cell: usize,
    /// Drop bins whose four neighbours are all occupied, whatever their
    /// candidates' criteria. Keeps only the outline of each isochrone.
    pub boundary_only: bool,
    /// Extra steps expanded after the first arrival to collect slower trade-offs
    pub arrival_window_steps: u32,
    pub objectives: Objectives,
    pub risk: RiskModel,
    pub maneuvers: ManeuverPenalty,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bin_cells_per_degree: 50.0,
            max_points_per_cell: 4,
            boundary_only: true,
            arrival_window_steps: 0,
            objectives: Objectives::default(),
            risk: RiskModel::default(),
            maneuvers: ManeuverPenalty::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), RoutingError> {
        if !(self.bin_cells_per_degree.is_finite() && self.bin_cells_per_degree > 0.0) {
            return Err(RoutingError::config("bin_cells_per_degree must be positive"));
        }
        if self.max_points_per_cell == 0 {
            return Err(RoutingError::config("max_points_per_cell must be at least 1"));
        }
        if !self.objectives.any() {
            return Err(RoutingError::config("at least one objective must be tracked"));
        }
        if !(self.risk.safe_wind_kts > 0.0 && self.risk.weight >= 0.0 && self.risk.exponent > 0.0) {
            return Err(RoutingError::config(format!("invalid risk model {:?}", self.risk)));
        }
        if !(self.maneuvers.tack_secs >= 0.0 && self.maneuvers.gybe_secs >= 0.0) {
            return Err(RoutingError::config("maneuver penalties must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RoutingRequest {
        RoutingRequest::new(Coordinate::new(45.0, -1.0), Coordinate::new(46.0, -1.0), Utc::now())
    }

    #[test]
    fn test_default_request_is_valid() {
        let req = request();
        assert!(req.validate().is_ok());
        assert_eq!(req.heading_count(), 72);
    }

    #[test]
    fn test_rejects_non_positive_time_step() {
        let mut req = request();
        req.time_step_secs = 0.0;
        assert!(matches!(req.validate(), Err(RoutingError::FatalConfiguration(_))));
        req.time_step_secs = f64::NAN;
        assert!(matches!(req.validate(), Err(RoutingError::FatalConfiguration(_))));
    }

    #[test]
    fn test_rejects_time_horizon_out_of_range() {
        let mut req = request();
        req.time_step_secs = 1e13;
        req.max_steps = 3;
        assert!(req.horizon().is_none());
        assert!(matches!(req.validate(), Err(RoutingError::FatalConfiguration(_))));

        req.time_step_secs = f64::MAX;
        assert!(matches!(req.validate(), Err(RoutingError::FatalConfiguration(_))));
    }

    #[test]
    fn test_horizon_spans_every_step() {
        let req = request();
        assert_eq!(req.horizon(), Some(req.departure + TimeDelta::hours(336)));
    }

    #[test]
    fn test_rejects_zero_heading_resolution() {
        let mut req = request();
        req.heading_resolution_deg = 0.0;
        assert!(matches!(req.validate(), Err(RoutingError::FatalConfiguration(_))));
    }

    #[test]
    fn test_rejects_invalid_positions() {
        let mut req = request();
        req.destination = Coordinate::new(95.0, 0.0);
        assert!(matches!(req.validate(), Err(RoutingError::FatalConfiguration(_))));
    }

    #[test]
    fn test_search_config_from_partial_json() {
        let cfg: SearchConfig = serde_json::from_str(
            r#"{ "bin_cells_per_degree": 20, "objectives": { "distance": false }, "maneuvers": { "tack_secs": 120 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.bin_cells_per_degree, 20.0);
        assert!(cfg.objectives.elapsed_time && !cfg.objectives.distance && cfg.objectives.risk);
        assert_eq!(cfg.maneuvers.tack_secs, 120.0);
        assert_eq!(cfg.maneuvers.gybe_secs, 0.0);
        assert_eq!(cfg.max_points_per_cell, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_search_config_requires_an_objective() {
        let cfg = SearchConfig {
            objectives: Objectives { elapsed_time: false, distance: false, risk: false },
            ..SearchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(RoutingError::FatalConfiguration(_))));
    }
}
