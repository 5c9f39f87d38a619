use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Duration;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::engine::config::{RoutingRequest, SearchConfig};
use crate::engine::criteria::{CriteriaVector, DominanceComparator};
use crate::engine::environment::{EnvironmentField, OutOfCoverage};
use crate::engine::error::RoutingError;
use crate::engine::history::{Frontier, History, IsochronePoint, PointId};
use crate::engine::mask::LandMask;
use crate::engine::models::{Coordinate, EnvironmentSample, normalize_bearing};
use crate::engine::physics::PhysicsModel;
use crate::engine::route::Route;
use crate::parsers::polars::PolarTable;

/// Cooperative stop signal, checked by the router between two steps
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point produced by expansion that has not been sealed into the history yet
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub point: IsochronePoint,
    /// Great-circle distance left to the destination
    pub remaining_m: f64,
    pub arrived: bool,
}

pub struct StepOutput {
    pub frontier: Frontier,
    pub arrivals: Vec<PointId>,
    /// Frontier points that could not be expanded because their own sample was out of coverage
    pub stalled: usize,
}

pub struct RoutingResult {
    /// Pareto front at the destination, fastest first
    pub routes: Vec<Route>,
    pub steps: u32,
    pub frontiers: Vec<Frontier>,
    pub history: History,
}

pub struct IsochroneRouter<'a> {
    pub request: RoutingRequest,
    pub config: SearchConfig,
    polar: &'a PolarTable,
    land_mask: Option<&'a LandMask>,
    physics: PhysicsModel,
    comparator: DominanceComparator,
}

impl<'a> IsochroneRouter<'a> {
    pub fn new(request: RoutingRequest, config: SearchConfig, polar: &'a PolarTable) -> Result<Self, RoutingError> {
        request.validate()?;
        config.validate()?;
        let comparator = DominanceComparator::new(&config.objectives);
        Ok(Self {
            request,
            config,
            polar,
            land_mask: None,
            physics: PhysicsModel::new(),
            comparator,
        })
    }

    pub fn with_land_mask(mut self, land_mask: &'a LandMask) -> Self {
        self.land_mask = Some(land_mask);
        self
    }

    pub fn comparator(&self) -> &DominanceComparator {
        &self.comparator
    }

    fn duration(secs: f64) -> Duration {
        Duration::milliseconds((secs * 1000.0).round() as i64)
    }

    /// Spatial bin used to decide which candidates compete with each other
    pub fn bin_of(&self, position: &Coordinate) -> (i64, i64) {
        let precision = self.config.bin_cells_per_degree;
        (
            (position.lon * precision).floor() as i64,
            (position.lat * precision).floor() as i64,
        )
    }

    /// Seeds the history with the departure point
    pub fn start<E: EnvironmentField + ?Sized>(&self, env: &E) -> Result<(History, Frontier), RoutingError> {
        let req = &self.request;
        env.sample(&req.start, req.departure)
            .map_err(|e| RoutingError::config(format!("start position is outside the environment: {}", e)))?;

        let mut history = History::new();
        let origin = history.push(IsochronePoint::origin(req.start, req.departure));
        Ok((
            history,
            Frontier { step: 0, time: req.departure, members: vec![origin] },
        ))
    }

    /// Distance along a straight leg at which it first enters the arrival disc, if it does
    fn disc_entry(&self, from: &Coordinate, cog: f64, length: f64) -> Option<f64> {
        if length <= 0.0 {
            return None;
        }
        let dest = &self.request.destination;
        let tol_sq = self.request.tolerance_m.powi(2);
        let d = from.distance_to(dest);
        let rel = (from.bearing_to(dest) - cog).to_radians();
        let along = d * rel.cos();
        let cross_sq = (d * rel.sin()).powi(2);
        if along <= 0.0 || cross_sq > tol_sq {
            return None;
        }
        let s = (along - (tol_sq - cross_sq).sqrt()).max(0.0);
        (s <= length).then_some(s)
    }

    /// Sails one step from `parent` on `heading`.
    ///
    /// A change of tack costs the configured maneuver time out of the sailing
    /// time; the current still acts for the whole step. A leg entering the
    /// arrival disc is cut at the entry point and only charged the time and
    /// exposure spent before it.
    pub fn sail_leg(&self, parent: &IsochronePoint, heading: f64, sample: &EnvironmentSample) -> Candidate {
        let dt = self.request.time_step_secs;
        let velocity = self.physics.compute_vector(heading, sample, self.polar);

        let penalty = match (parent.tack, velocity.tack) {
            (Some(from), Some(to)) if from != to => {
                if velocity.twa < 90.0 {
                    self.config.maneuvers.tack_secs
                } else {
                    self.config.maneuvers.gybe_secs
                }
            }
            _ => 0.0,
        };
        let sailing = (dt - penalty).max(0.0);
        let segment = PhysicsModel::displace(&parent.position, velocity, &sample.current, sailing, dt);

        let (position, distance, fraction, entered) =
            match self.disc_entry(&parent.position, segment.cog, segment.distance_m) {
                Some(s) => (parent.position.destination(s, segment.cog), s, s / segment.distance_m, true),
                None => (segment.position, segment.distance_m, 1.0, false),
            };

        let remaining_m = position.distance_to(&self.request.destination);
        let seconds = dt * fraction;
        let cost = CriteriaVector::new(seconds, distance, self.config.risk.segment_risk(velocity.aws_kts, seconds));

        Candidate {
            point: IsochronePoint {
                position,
                time: parent.time + Self::duration(seconds),
                step: parent.step + 1,
                criteria: parent.criteria + cost,
                predecessor: None,
                heading: Some(heading),
                tack: velocity.tack.or(parent.tack),
            },
            remaining_m,
            arrived: entered || remaining_m <= self.request.tolerance_m,
        }
    }

    fn candidate<E: EnvironmentField + ?Sized>(
        &self,
        env: &E,
        parent: &IsochronePoint,
        parent_id: PointId,
        sample: &EnvironmentSample,
        heading: f64,
    ) -> Option<Candidate> {
        let mut candidate = self.sail_leg(parent, heading, sample);
        let position = &candidate.point.position;

        if let Some(mask) = self.land_mask {
            if mask.is_land(position) || !mask.segment_is_clear(&parent.position, position) {
                return None;
            }
        }
        if env.sample(position, candidate.point.time).is_err() {
            return None;
        }
        candidate.point.predecessor = Some(parent_id);
        Some(candidate)
    }

    /// Expands every frontier point over the heading fan, in parallel.
    /// Output order follows frontier order, then heading order.
    pub fn expand<E: EnvironmentField + ?Sized>(
        &self,
        env: &E,
        history: &History,
        frontier: &Frontier,
    ) -> (Vec<Candidate>, usize) {
        let num_headings = self.request.heading_count();
        let spacing = 360.0 / num_headings as f64;

        let fans: Vec<Option<Vec<Candidate>>> = frontier
            .members
            .par_iter()
            .map(|&id| {
                let parent = history.get(id);
                let sample = env.sample(&parent.position, parent.time).ok()?;
                let direct_bearing = parent.position.bearing_to(&self.request.destination);

                Some(
                    (0..num_headings)
                        .filter_map(|i| {
                            let heading = normalize_bearing(direct_bearing + i as f64 * spacing);
                            self.candidate(env, parent, id, &sample, heading)
                        })
                        .collect(),
                )
            })
            .collect();

        let stalled = fans.iter().filter(|fan| fan.is_none()).count();
        (fans.into_iter().flatten().flatten().collect(), stalled)
    }

    /// Reduces the candidates of one step to the next frontier.
    ///
    /// Candidates only compete inside their spatial bin, and one never beats
    /// another that is closer to the destination. Each bin keeps at most
    /// `max_points_per_cell` survivors; with `boundary_only`, bins whose four
    /// neighbours are all occupied are dropped.
    pub fn filter(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut bins: BTreeMap<(i64, i64), Vec<Candidate>> = BTreeMap::new();
        for candidate in candidates {
            bins.entry(self.bin_of(&candidate.point.position)).or_default().push(candidate);
        }

        for cell in bins.values_mut() {
            let mut front = self
                .comparator
                .progress_filter(std::mem::take(cell), |c| (c.point.criteria, c.remaining_m));
            front.truncate(self.config.max_points_per_cell);
            *cell = front;
        }

        if self.config.boundary_only {
            let occupied: BTreeSet<(i64, i64)> = bins.keys().copied().collect();
            bins.retain(|&(x, y), _| {
                [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
                    .iter()
                    .any(|neighbour| !occupied.contains(neighbour))
            });
        }

        bins.into_values().flatten().collect()
    }

    /// Performs one step of the isochrone expansion and seals its result into the history
    pub fn step<E: EnvironmentField + ?Sized>(
        &self,
        env: &E,
        history: &mut History,
        frontier: &Frontier,
    ) -> StepOutput {
        let (candidates, stalled) = self.expand(env, history, frontier);
        if stalled > 0 {
            warn!(
                "{} of {} frontier points are outside the environment coverage at step {}",
                stalled,
                frontier.len(),
                frontier.step
            );
        }
        let produced = candidates.len();

        let (arrived, travelling): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(|c| c.arrived);
        let kept = self.filter(travelling);
        let arrived = self.comparator.pareto_filter(arrived, |c| c.point.criteria);

        let members: Vec<PointId> = kept.into_iter().map(|c| history.push(c.point)).collect();
        let arrivals: Vec<PointId> = arrived.into_iter().map(|c| history.push(c.point)).collect();

        debug!(
            "Step {}: {} candidates from {} points, {} kept, {} arrivals",
            frontier.step + 1,
            produced,
            frontier.len(),
            members.len(),
            arrivals.len()
        );

        StepOutput {
            frontier: Frontier {
                step: frontier.step + 1,
                time: frontier.time + Self::duration(self.request.time_step_secs),
                members,
            },
            arrivals,
            stalled,
        }
    }

    /// Runs the expansion until the destination is reached, the frontier dies
    /// out, the step budget is spent or `cancel` is raised.
    pub fn run<E: EnvironmentField + ?Sized>(
        &self,
        env: &E,
        cancel: &CancellationToken,
    ) -> Result<RoutingResult, RoutingError> {
        let req = &self.request;
        info!(
            "Routing from {:?} to {:?} ({:.1} km), step {}s, {} headings",
            req.start,
            req.destination,
            req.start.distance_to(&req.destination) / 1000.0,
            req.time_step_secs,
            req.heading_count()
        );

        let (mut history, origin) = self.start(env)?;
        let mut arrivals: Vec<PointId> = Vec::new();
        if req.start.distance_to(&req.destination) <= req.tolerance_m {
            arrivals.extend(&origin.members);
        }

        let mut frontiers = vec![origin];
        let mut first_arrival: Option<u32> = if arrivals.is_empty() { None } else { Some(0) };

        loop {
            let current = &frontiers[frontiers.len() - 1];
            if let Some(first) = first_arrival {
                if current.step >= first + self.config.arrival_window_steps {
                    break;
                }
            }
            if current.is_empty() || current.step >= req.max_steps {
                break;
            }
            if cancel.is_cancelled() {
                info!("Routing cancelled after {} steps", current.step);
                let best_partial = if arrivals.is_empty() {
                    self.partial_front(&history, current)
                } else {
                    self.terminal_front(&history, &arrivals)
                };
                return Err(RoutingError::Cancelled { steps: current.step, best_partial });
            }

            let out = self.step(env, &mut history, current);
            if !out.arrivals.is_empty() {
                first_arrival.get_or_insert(out.frontier.step);
                arrivals.extend(out.arrivals);
            }
            frontiers.push(out.frontier);
        }

        let steps = frontiers[frontiers.len() - 1].step;
        if arrivals.is_empty() {
            info!("Destination unreachable after {} steps", steps);
            return Err(RoutingError::DestinationUnreachable { steps });
        }

        let routes = self.terminal_front(&history, &arrivals);
        info!(
            "Destination reached: {} Pareto-optimal routes after {} steps ({} points explored)",
            routes.len(),
            steps,
            history.len()
        );
        Ok(RoutingResult { routes, steps, frontiers, history })
    }

    /// Non-dominated arrivals as routes, fastest first
    fn terminal_front(&self, history: &History, arrivals: &[PointId]) -> Vec<Route> {
        let mut ids = arrivals.to_vec();
        ids.sort_by(|a, b| {
            let (pa, pb) = (history.get(*a), history.get(*b));
            pa.criteria.elapsed.total_cmp(&pb.criteria.elapsed).then_with(|| {
                let dest = &self.request.destination;
                pa.position.distance_to(dest).total_cmp(&pb.position.distance_to(dest))
            })
        });

        let mut routes: Vec<Route> = self
            .comparator
            .pareto_filter(ids, |id| history.get(*id).criteria)
            .into_iter()
            .map(|id| Route::reconstruct(history, id))
            .collect();
        routes.sort_by(|a, b| {
            a.criteria.elapsed.total_cmp(&b.criteria.elapsed)
                .then(a.criteria.risk.total_cmp(&b.criteria.risk))
                .then(a.criteria.distance.total_cmp(&b.criteria.distance))
        });
        routes
    }

    /// Frontier members not beaten on (criteria, remaining distance), closest to the destination first
    fn partial_front(&self, history: &History, frontier: &Frontier) -> Vec<Route> {
        let dest = &self.request.destination;
        self.comparator
            .progress_filter(frontier.members.clone(), |id| {
                let p = history.get(*id);
                (p.criteria, p.position.distance_to(dest))
            })
            .into_iter()
            .map(|id| Route::reconstruct(history, id))
            .collect()
    }

    /// Sails the recorded headings of `route` again from its departure point
    pub fn replay<E: EnvironmentField + ?Sized>(&self, env: &E, route: &Route) -> Result<Vec<Coordinate>, OutOfCoverage> {
        let Some(departure) = route.departure() else {
            return Ok(Vec::new());
        };
        let mut point = IsochronePoint::origin(departure.position, departure.time);
        let mut positions = vec![point.position];
        for heading in route.headings() {
            let sample = env.sample(&point.position, point.time)?;
            point = self.sail_leg(&point, heading, &sample).point;
            positions.push(point.position);
        }
        Ok(positions)
    }
}
