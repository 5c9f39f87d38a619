//! Multi-criteria costs and the Pareto dominance order used to prune candidates.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

pub const CRITERIA_COUNT: usize = 3;

/// Costs accumulated along a route. Every component is "lower is better".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CriteriaVector {
    /// Seconds since departure
    pub elapsed: f64,
    /// Meters sailed over ground
    pub distance: f64,
    /// Dimensionless exposure, see [`RiskModel`]
    pub risk: f64,
}

impl CriteriaVector {
    pub const ZERO: Self = Self { elapsed: 0.0, distance: 0.0, risk: 0.0 };

    pub fn new(elapsed: f64, distance: f64, risk: f64) -> Self {
        Self { elapsed, distance, risk }
    }

    pub fn as_array(&self) -> [f64; CRITERIA_COUNT] {
        [self.elapsed, self.distance, self.risk]
    }
}

impl Add for CriteriaVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            elapsed: self.elapsed + rhs.elapsed,
            distance: self.distance + rhs.distance,
            risk: self.risk + rhs.risk,
        }
    }
}

impl AddAssign for CriteriaVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Which objectives take part in the dominance comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Objectives {
    pub elapsed_time: bool,
    pub distance: bool,
    pub risk: bool,
}

impl Default for Objectives {
    fn default() -> Self {
        Self { elapsed_time: true, distance: true, risk: true }
    }
}

impl Objectives {
    pub fn any(&self) -> bool {
        self.elapsed_time || self.distance || self.risk
    }
}

/// Dominance test fixed at the start of a run.
///
/// Disabled objectives get a zero weight, so the comparison loop is the same
/// for every configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominanceComparator {
    weights: [f64; CRITERIA_COUNT],
}

impl DominanceComparator {
    pub fn new(objectives: &Objectives) -> Self {
        let w = |on: bool| if on { 1.0 } else { 0.0 };
        Self {
            weights: [w(objectives.elapsed_time), w(objectives.distance), w(objectives.risk)],
        }
    }

    /// `a` dominates `b` iff it is no worse in every tracked objective and strictly better in one
    pub fn dominates(&self, a: &CriteriaVector, b: &CriteriaVector) -> bool {
        let (a, b) = (a.as_array(), b.as_array());
        let mut no_worse = true;
        let mut better = false;
        for i in 0..CRITERIA_COUNT {
            let (x, y) = (a[i] * self.weights[i], b[i] * self.weights[i]);
            no_worse &= x <= y;
            better |= x < y;
        }
        no_worse && better
    }

    /// Same value on every tracked objective
    pub fn equivalent(&self, a: &CriteriaVector, b: &CriteriaVector) -> bool {
        let (a, b) = (a.as_array(), b.as_array());
        (0..CRITERIA_COUNT).all(|i| a[i] * self.weights[i] == b[i] * self.weights[i])
    }

    /// Keeps the non-dominated items, preserving input order.
    ///
    /// Among items with equivalent criteria only the first one survives, so
    /// callers control tie-breaking through the order they pass in.
    pub fn pareto_filter<T>(&self, items: Vec<T>, criteria: impl Fn(&T) -> CriteriaVector) -> Vec<T> {
        let mut front: Vec<(CriteriaVector, T)> = Vec::with_capacity(items.len());
        for item in items {
            let c = criteria(&item);
            if front.iter().any(|(f, _)| self.dominates(f, &c) || self.equivalent(f, &c)) {
                continue;
            }
            front.retain(|(f, _)| !self.dominates(&c, f));
            front.push((c, item));
        }
        front.into_iter().map(|(_, item)| item).collect()
    }

    /// Pareto filter with remaining distance to the destination as an extra
    /// objective: an item is only beaten by one that is no farther from the
    /// goal. Output is sorted by remaining distance, input order breaking ties.
    pub fn progress_filter<T>(&self, items: Vec<T>, key: impl Fn(&T) -> (CriteriaVector, f64)) -> Vec<T> {
        let mut keyed: Vec<(CriteriaVector, f64, T)> = items
            .into_iter()
            .map(|item| {
                let (c, d) = key(&item);
                (c, d, item)
            })
            .collect();
        keyed.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut front: Vec<(CriteriaVector, f64, T)> = Vec::with_capacity(keyed.len());
        for (c, d, item) in keyed {
            if front
                .iter()
                .any(|(fc, fd, _)| *fd <= d && (self.dominates(fc, &c) || self.equivalent(fc, &c)))
            {
                continue;
            }
            // Only equally distant members can still be beaten after sorting
            front.retain(|(fc, fd, _)| !(d <= *fd && self.dominates(&c, fc)));
            front.push((c, d, item));
        }
        front.into_iter().map(|(_, _, item)| item).collect()
    }
}

/// Exposure cost of sailing in strong apparent wind.
///
/// A segment of `hours` in an apparent wind of `aws` knots costs
/// `hours * weight * (max(0, aws - safe) / safe) ^ exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskModel {
    pub safe_wind_kts: f64,
    pub weight: f64,
    pub exponent: f64,
}

impl Default for RiskModel {
    fn default() -> Self {
        Self { safe_wind_kts: 20.0, weight: 1.0, exponent: 2.0 }
    }
}

impl RiskModel {
    pub fn segment_risk(&self, aws_kts: f64, seconds: f64) -> f64 {
        let excess = (aws_kts - self.safe_wind_kts).max(0.0);
        if excess == 0.0 {
            return 0.0;
        }
        let hours = seconds / 3600.0;
        hours * self.weight * (excess / self.safe_wind_kts).powf(self.exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all() -> DominanceComparator {
        DominanceComparator::new(&Objectives::default())
    }

    #[test]
    fn test_dominance_rule() {
        let cmp = all();
        let a = CriteriaVector::new(10.0, 5.0, 1.0);
        let b = CriteriaVector::new(10.0, 6.0, 1.0);
        let c = CriteriaVector::new(9.0, 7.0, 1.0);

        assert!(cmp.dominates(&a, &b));
        assert!(!cmp.dominates(&b, &a));
        assert!(!cmp.dominates(&a, &a), "equal vectors do not dominate");
        assert!(!cmp.dominates(&a, &c) && !cmp.dominates(&c, &a), "genuine trade-off");
    }

    #[test]
    fn test_disabled_objective_is_ignored() {
        let cmp = DominanceComparator::new(&Objectives { elapsed_time: true, distance: false, risk: true });
        let a = CriteriaVector::new(10.0, 50.0, 1.0);
        let b = CriteriaVector::new(10.0, 5.0, 2.0);
        assert!(cmp.dominates(&a, &b));
    }

    #[test]
    fn test_pareto_filter_keeps_trade_offs_in_order() {
        let cmp = all();
        let items = vec![
            CriteriaVector::new(1.0, 9.0, 0.0),
            CriteriaVector::new(2.0, 9.0, 0.0), // dominated by the first
            CriteriaVector::new(9.0, 1.0, 0.0),
            CriteriaVector::new(1.0, 9.0, 0.0), // duplicate of the first
            CriteriaVector::new(5.0, 5.0, 0.0),
        ];
        let front = cmp.pareto_filter(items, |c| *c);
        assert_eq!(
            front,
            vec![
                CriteriaVector::new(1.0, 9.0, 0.0),
                CriteriaVector::new(9.0, 1.0, 0.0),
                CriteriaVector::new(5.0, 5.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_progress_filter_protects_advanced_points() {
        let cmp = all();
        // (criteria, remaining distance)
        let items = vec![
            (CriteriaVector::new(3600.0, 17_000.0, 0.0), 1_500.0), // sailed less, but behind
            (CriteriaVector::new(3600.0, 18_500.0, 0.0), 0.0),     // sailed more, furthest ahead
            (CriteriaVector::new(3600.0, 18_600.0, 0.0), 900.0),   // beaten by the leader
        ];
        let front = cmp.progress_filter(items, |(c, d)| (*c, *d));
        let remaining: Vec<f64> = front.iter().map(|(_, d)| *d).collect();
        assert_eq!(remaining, vec![0.0, 1_500.0]);
    }

    #[test]
    fn test_accumulation_is_componentwise() {
        let mut c = CriteriaVector::ZERO;
        c += CriteriaVector::new(3600.0, 1000.0, 0.5);
        c += CriteriaVector::new(3600.0, 500.0, 0.0);
        assert_eq!(c, CriteriaVector::new(7200.0, 1500.0, 0.5));
    }

    #[test]
    fn test_risk_model() {
        let risk = RiskModel::default();
        assert_eq!(risk.segment_risk(0.0, 3600.0), 0.0);
        assert_eq!(risk.segment_risk(20.0, 3600.0), 0.0);
        // 30 kts apparent for one hour: (10 / 20)^2
        assert!((risk.segment_risk(30.0, 3600.0) - 0.25).abs() < 1e-12);
        assert!(risk.segment_risk(40.0, 3600.0) > risk.segment_risk(30.0, 3600.0));
        assert!((risk.segment_risk(30.0, 7200.0) - 0.5).abs() < 1e-12);
    }

    fn criteria() -> impl Strategy<Value = CriteriaVector> {
        (0u8..6, 0u8..6, 0u8..6).prop_map(|(a, b, c)| CriteriaVector::new(a as f64, b as f64, c as f64))
    }

    proptest! {
        #[test]
        fn pareto_filter_output_is_mutually_non_dominated(items in prop::collection::vec(criteria(), 0..40)) {
            let cmp = all();
            let front = cmp.pareto_filter(items, |c| *c);
            for (i, a) in front.iter().enumerate() {
                for (j, b) in front.iter().enumerate() {
                    if i != j {
                        prop_assert!(!cmp.dominates(a, b));
                    }
                }
            }
        }

        #[test]
        fn pareto_filter_drops_only_dominated_or_duplicate(items in prop::collection::vec(criteria(), 0..40)) {
            let cmp = all();
            let front = cmp.pareto_filter(items.clone(), |c| *c);
            for item in &items {
                let covered = front.iter().any(|f| cmp.dominates(f, item) || cmp.equivalent(f, item));
                prop_assert!(covered);
            }
        }

        #[test]
        fn progress_filter_output_is_non_dominated_with_progress(
            items in prop::collection::vec((criteria(), 0u8..6), 0..40)
        ) {
            let cmp = all();
            let front = cmp.progress_filter(items, |(c, d)| (*c, *d as f64));
            for (i, (a, da)) in front.iter().enumerate() {
                for (j, (b, db)) in front.iter().enumerate() {
                    if i != j {
                        prop_assert!(!(da <= db && cmp.dominates(a, b)));
                    }
                }
            }
            prop_assert!(front.windows(2).all(|w| w[0].1 <= w[1].1));
        }

        #[test]
        fn dominance_is_irreflexive_and_antisymmetric(a in criteria(), b in criteria()) {
            let cmp = all();
            prop_assert!(!cmp.dominates(&a, &a));
            prop_assert!(!(cmp.dominates(&a, &b) && cmp.dominates(&b, &a)));
        }
    }
}
