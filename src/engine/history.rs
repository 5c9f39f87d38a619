use chrono::{DateTime, Utc};

use crate::engine::criteria::CriteriaVector;
use crate::engine::models::{Coordinate, Tack};

/// Index of a point in the [`History`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointId(u32);

impl PointId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A reachable state: where the boat is, when, what it cost, and how it got there
#[derive(Debug, Clone, PartialEq)]
pub struct IsochronePoint {
    pub position: Coordinate,
    pub time: DateTime<Utc>,
    /// Isochrone index, 0 for the start
    pub step: u32,
    pub criteria: CriteriaVector,
    pub predecessor: Option<PointId>,
    /// Heading steered from the predecessor to reach this point
    pub heading: Option<f64>,
    pub tack: Option<Tack>,
}

impl IsochronePoint {
    pub fn origin(position: Coordinate, time: DateTime<Utc>) -> Self {
        Self {
            position,
            time,
            step: 0,
            criteria: CriteriaVector::ZERO,
            predecessor: None,
            heading: None,
            tack: None,
        }
    }
}

/// Append-only store of every point kept on any frontier.
///
/// Points never move once pushed, so a `PointId` stays valid for the whole
/// run and predecessor chains can be walked in O(1) per link.
#[derive(Debug, Default, Clone)]
pub struct History {
    points: Vec<IsochronePoint>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: IsochronePoint) -> PointId {
        let id = PointId(self.points.len() as u32);
        self.points.push(point);
        id
    }

    pub fn get(&self, id: PointId) -> &IsochronePoint {
        &self.points[id.index()]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates from `id` back to the start point
    pub fn ancestry(&self, id: PointId) -> impl Iterator<Item = &IsochronePoint> + '_ {
        std::iter::successors(Some(self.get(id)), move |p| p.predecessor.map(|pred| self.get(pred)))
    }
}

/// Points reachable at one isochrone step. Within a spatial bin no member is
/// dominated by another member that is at least as close to the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Frontier {
    pub step: u32,
    pub time: DateTime<Utc>,
    pub members: Vec<PointId>,
}

impl Frontier {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn points<'a>(&'a self, history: &'a History) -> impl Iterator<Item = &'a IsochronePoint> + 'a {
        self.members.iter().map(move |id| history.get(*id))
    }
}
