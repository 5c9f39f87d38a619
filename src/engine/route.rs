use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::criteria::CriteriaVector;
use crate::engine::history::{History, PointId};
use crate::engine::models::{Coordinate, Tack};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Coordinate,
    pub time: DateTime<Utc>,
    /// Heading steered on the leg that ends here; None for the departure point
    pub heading: Option<f64>,
    pub tack: Option<Tack>,
}

/// A concrete path through the isochrones, departure first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub waypoints: Vec<Waypoint>,
    pub criteria: CriteriaVector,
}

impl Route {
    /// Walks the predecessor links from `end` back to the departure point.
    /// The positions are exactly the ones visited during expansion.
    pub fn reconstruct(history: &History, end: PointId) -> Self {
        let mut waypoints: Vec<Waypoint> = history
            .ancestry(end)
            .map(|p| Waypoint {
                position: p.position,
                time: p.time,
                heading: p.heading,
                tack: p.tack,
            })
            .collect();
        waypoints.reverse();

        Self {
            waypoints,
            criteria: history.get(end).criteria,
        }
    }

    pub fn departure(&self) -> Option<&Waypoint> {
        self.waypoints.first()
    }

    pub fn arrival(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    pub fn legs(&self) -> usize {
        self.waypoints.len().saturating_sub(1)
    }

    /// Headings steered on each leg, in order
    pub fn headings(&self) -> impl Iterator<Item = f64> + '_ {
        self.waypoints.iter().filter_map(|w| w.heading)
    }

    /// Number of times the wind changed side
    pub fn maneuvers(&self) -> usize {
        self.waypoints
            .windows(2)
            .filter(|w| matches!((w[0].tack, w[1].tack), (Some(a), Some(b)) if a != b))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::history::IsochronePoint;
    use chrono::Duration;

    #[test]
    fn test_reconstruct_forward_order() {
        let t0 = Utc::now();
        let mut history = History::new();
        let mut id = history.push(IsochronePoint::origin(Coordinate::new(45.0, -1.0), t0));
        let tacks = [Tack::Port, Tack::Port, Tack::Starboard];
        for (i, tack) in tacks.iter().enumerate() {
            let step = i as u32 + 1;
            id = history.push(IsochronePoint {
                position: Coordinate::new(45.0 + 0.1 * step as f64, -1.0),
                time: t0 + Duration::hours(step as i64),
                step,
                criteria: CriteriaVector::new(3600.0 * step as f64, 11_000.0 * step as f64, 0.0),
                predecessor: Some(id),
                heading: Some(10.0 * step as f64),
                tack: Some(*tack),
            });
        }

        let route = Route::reconstruct(&history, id);
        assert_eq!(route.legs(), 3);
        assert_eq!(route.departure().unwrap().position, Coordinate::new(45.0, -1.0));
        assert_eq!(route.departure().unwrap().heading, None);
        assert!((route.arrival().unwrap().position.lat - 45.3).abs() < 1e-12);
        assert_eq!(route.headings().collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
        assert_eq!(route.criteria, CriteriaVector::new(10_800.0, 33_000.0, 0.0));
        assert_eq!(route.maneuvers(), 1);
        assert!(route.waypoints.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_reconstruct_origin_only() {
        let mut history = History::new();
        let id = history.push(IsochronePoint::origin(Coordinate::new(1.0, 2.0), Utc::now()));
        let route = Route::reconstruct(&history, id);
        assert_eq!(route.legs(), 0);
        assert_eq!(route.criteria, CriteriaVector::ZERO);
    }
}
