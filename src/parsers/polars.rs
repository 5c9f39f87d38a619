use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::error::RoutingError;

/// Boat performance table.
///
/// Rows are true wind angles (degrees, ascending within [0, 180]), columns
/// are true wind speeds (knots, ascending), cells are boat speed through the
/// water in knots: `speeds[twa_idx][tws_idx]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarTable {
    /// True Wind Speeds (knots)
    tws: Vec<f64>,
    /// True Wind Angles (degrees)
    twa: Vec<f64>,
    speeds: Vec<Vec<f64>>,
}

/// Best velocity made good towards or away from the wind for one wind speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmgOptimum {
    pub twa: f64,
    pub boat_speed: f64,
    pub vmg: f64,
}

impl PolarTable {
    pub fn new(tws: Vec<f64>, twa: Vec<f64>, speeds: Vec<Vec<f64>>) -> Result<Self, RoutingError> {
        if tws.is_empty() || twa.is_empty() {
            return Err(RoutingError::polar("table has no wind speed or wind angle samples"));
        }
        if speeds.len() != twa.len() {
            return Err(RoutingError::polar(format!(
                "{} angle rows declared but {} speed rows supplied",
                twa.len(),
                speeds.len()
            )));
        }
        if let Some(w) = twa.windows(2).find(|w| !(w[0] < w[1])) {
            return Err(RoutingError::polar(format!(
                "wind angles must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        if twa.iter().any(|a| !(0.0..=180.0).contains(a)) {
            return Err(RoutingError::polar("wind angles must lie within [0, 180] degrees"));
        }
        if let Some(w) = tws.windows(2).find(|w| !(w[0] < w[1])) {
            return Err(RoutingError::polar(format!(
                "wind speeds must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        if tws.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(RoutingError::polar("wind speeds must be finite and non-negative"));
        }
        for (row, angle) in speeds.iter().zip(&twa) {
            if row.len() != tws.len() {
                return Err(RoutingError::polar(format!(
                    "row at {}° has {} values, expected {}",
                    angle,
                    row.len(),
                    tws.len()
                )));
            }
            if row.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(RoutingError::polar(format!(
                    "row at {}° contains a negative or non-finite boat speed",
                    angle
                )));
            }
        }
        Ok(Self { tws, twa, speeds })
    }

    /// Same boat speed for every wind speed and angle
    pub fn flat(boat_speed_kts: f64) -> Result<Self, RoutingError> {
        Self::new(
            vec![0.0, 60.0],
            vec![0.0, 180.0],
            vec![vec![boat_speed_kts; 2], vec![boat_speed_kts; 2]],
        )
    }

    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> Result<Self, RoutingError> {
        info!("Loading polar data from CSV: {:?}", path.as_ref());
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file))
    }

    /// Parses the `twa/tws,5,10,...` header followed by one row per wind angle
    pub fn from_csv_reader<R: Read>(reader: BufReader<R>) -> Result<Self, RoutingError> {
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| RoutingError::polar("empty polar CSV"))??;
        let tws = header
            .split(',')
            .skip(1)
            .map(parse_cell)
            .collect::<Result<Vec<f64>, _>>()?;

        let mut twa = Vec::new();
        let mut speeds = Vec::new();

        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut cells = line.split(',');
            let angle = parse_cell(cells.next().unwrap_or_default())?;
            twa.push(angle);
            speeds.push(cells.map(parse_cell).collect::<Result<Vec<f64>, _>>()?);
        }

        let table = Self::new(tws, twa, speeds)?;
        info!(
            "Polar loaded: {} TWA rows, {} TWS columns",
            table.twa.len(),
            table.tws.len()
        );
        Ok(table)
    }

    pub fn wind_speeds(&self) -> &[f64] {
        &self.tws
    }

    pub fn wind_angles(&self) -> &[f64] {
        &self.twa
    }

    pub fn row(&self, twa_idx: usize) -> &[f64] {
        &self.speeds[twa_idx]
    }

    pub fn max_speed(&self) -> f64 {
        self.speeds.iter().flatten().copied().fold(0.0, f64::max)
    }

    /// Bilinear interpolation of the boat speed (knots) for a wind speed
    /// (knots) and a wind angle relative to the heading (degrees, any sign).
    /// Queries outside the table are clamped to the nearest edge.
    pub fn speed(&self, target_tws: f64, target_twa: f64) -> f64 {
        let twa = normalize_wind_angle(target_twa);

        let (tws_idx0, tws_idx1, tws_frac) = bracket(&self.tws, target_tws);
        let (twa_idx0, twa_idx1, twa_frac) = bracket(&self.twa, twa);

        let val00 = self.speeds[twa_idx0][tws_idx0];
        let val01 = self.speeds[twa_idx0][tws_idx1];
        let val10 = self.speeds[twa_idx1][tws_idx0];
        let val11 = self.speeds[twa_idx1][tws_idx1];

        let val0 = val00 * (1.0 - tws_frac) + val01 * tws_frac;
        let val1 = val10 * (1.0 - tws_frac) + val11 * tws_frac;

        val0 * (1.0 - twa_frac) + val1 * twa_frac
    }

    /// Best upwind (`upwind = true`) or downwind VMG for a wind speed, scanned at 1° steps
    pub fn best_vmg(&self, tws: f64, upwind: bool) -> VmgOptimum {
        let mut best = VmgOptimum { twa: 0.0, boat_speed: 0.0, vmg: 0.0 };
        for deg in 0..=180 {
            let twa = deg as f64;
            let boat_speed = self.speed(tws, twa);
            let along = boat_speed * twa.to_radians().cos();
            let vmg = if upwind { along } else { -along };
            if vmg > best.vmg {
                best = VmgOptimum { twa, boat_speed, vmg };
            }
        }
        best
    }
}

fn parse_cell(cell: &str) -> Result<f64, RoutingError> {
    let cell = cell.trim();
    cell.parse()
        .map_err(|_| RoutingError::polar(format!("cannot parse {:?} as a number", cell)))
}

/// Folds any relative wind angle into [0, 180]; polars are symmetric port/starboard
pub fn normalize_wind_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    if a > 180.0 { 360.0 - a } else { a }
}

/// Lower/upper index and interpolation fraction of `x` on an ascending axis, clamped at the ends
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    let last = axis.len() - 1;
    if x.is_nan() || x <= axis[0] {
        return (0, 0, 0.0);
    }
    if x >= axis[last] {
        return (last, last, 0.0);
    }
    let upper = axis.partition_point(|v| *v <= x);
    let lower = upper - 1;
    let frac = (x - axis[lower]) / (axis[upper] - axis[lower]);
    (lower, upper, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_polar() -> PolarTable {
        PolarTable::new(
            vec![0.0, 10.0, 20.0],
            vec![0.0, 90.0, 180.0],
            vec![
                vec![0.0, 0.0, 0.0],
                vec![0.0, 8.0, 10.0],
                vec![0.0, 6.0, 9.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_grid_points() {
        let polar = sample_polar();
        assert_eq!(polar.speed(10.0, 90.0), 8.0);
        assert_eq!(polar.speed(20.0, 180.0), 9.0);
        assert_eq!(polar.speed(0.0, 90.0), 0.0);
    }

    #[test]
    fn test_bilinear_interpolation() {
        let polar = sample_polar();
        // halfway between 10 and 20 kts at 90°: (8 + 10) / 2
        assert!((polar.speed(15.0, 90.0) - 9.0).abs() < 1e-9);
        // halfway between 90° and 180° at 10 kts: (8 + 6) / 2
        assert!((polar.speed(10.0, 135.0) - 7.0).abs() < 1e-9);
        // centre of the upper-right cell
        let expected = (8.0 + 10.0 + 6.0 + 9.0) / 4.0;
        assert!((polar.speed(15.0, 135.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_clamps_instead_of_extrapolating() {
        let polar = sample_polar();
        assert_eq!(polar.speed(60.0, 90.0), 10.0);
        assert_eq!(polar.speed(-5.0, 90.0), 0.0);
    }

    #[test]
    fn test_angle_symmetry() {
        let polar = sample_polar();
        assert_eq!(polar.speed(10.0, -90.0), polar.speed(10.0, 90.0));
        assert_eq!(polar.speed(10.0, 270.0), polar.speed(10.0, 90.0));
        assert!((polar.speed(12.0, 225.0) - polar.speed(12.0, 135.0)).abs() < 1e-9);
    }

    #[test]
    fn test_partial_angle_coverage_clamps_to_edge_rows() {
        let polar = PolarTable::new(
            vec![5.0, 15.0],
            vec![40.0, 150.0],
            vec![vec![3.0, 5.0], vec![4.0, 7.0]],
        )
        .unwrap();
        assert_eq!(polar.speed(5.0, 10.0), 3.0);
        assert_eq!(polar.speed(15.0, 175.0), 7.0);
    }

    #[test]
    fn test_rejects_empty_table() {
        let err = PolarTable::new(vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPolarData(_)));
    }

    #[test]
    fn test_rejects_non_monotonic_angles() {
        let err = PolarTable::new(
            vec![0.0, 10.0],
            vec![90.0, 45.0],
            vec![vec![1.0, 2.0], vec![1.0, 2.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPolarData(_)));
    }

    #[test]
    fn test_rejects_negative_speed() {
        let err = PolarTable::new(
            vec![0.0, 10.0],
            vec![0.0, 180.0],
            vec![vec![1.0, -2.0], vec![1.0, 2.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPolarData(_)));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = PolarTable::new(
            vec![0.0, 10.0],
            vec![0.0, 180.0],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPolarData(_)));
    }

    #[test]
    fn test_parse_csv() {
        let csv = "twa/tws,6,12\n0,0,0\n90,5.5,7.5\n\n180,4,6.5\n";
        let polar = PolarTable::from_csv_reader(BufReader::new(csv.as_bytes())).unwrap();
        assert_eq!(polar.wind_speeds(), &[6.0, 12.0]);
        assert_eq!(polar.wind_angles(), &[0.0, 90.0, 180.0]);
        assert_eq!(polar.row(1), &[5.5, 7.5]);
        assert_eq!(polar.max_speed(), 7.5);
    }

    #[test]
    fn test_parse_csv_rejects_garbage() {
        let csv = "twa/tws,6,12\n90,fast,7\n";
        let err = PolarTable::from_csv_reader(BufReader::new(csv.as_bytes())).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidPolarData(_)));
    }

    #[test]
    fn test_load_bundled_polar() {
        let polar = PolarTable::load_from_csv("data/cruiser_40.csv").unwrap();
        assert!(polar.max_speed() > 5.0);
        assert_eq!(polar.speed(12.0, 0.0), 0.0, "no speed head to wind");
    }

    #[test]
    fn test_best_vmg() {
        let polar = sample_polar();
        let up = polar.best_vmg(10.0, true);
        assert!(up.twa > 0.0 && up.twa < 90.0);
        assert!(up.vmg > 0.0);
        let down = polar.best_vmg(20.0, false);
        assert!(down.twa > 90.0);
        assert!(down.vmg >= 9.0 - 1e-9, "dead downwind gives 9 kts VMG at least");
    }
}
