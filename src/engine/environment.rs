use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::engine::models::{Coordinate, CurrentData, EnvironmentSample, WindData};

/// The field has no data at the requested position or time
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("no environment data at ({lat:.4}, {lon:.4}) for {time}")]
pub struct OutOfCoverage {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
}

impl OutOfCoverage {
    pub fn at(position: &Coordinate, time: DateTime<Utc>) -> Self {
        Self { lat: position.lat, lon: position.lon, time }
    }
}

/// Read-only source of wind and current, sampled synchronously by the router
/// from many worker threads at once.
pub trait EnvironmentField: Sync {
    fn sample(&self, position: &Coordinate, time: DateTime<Utc>) -> Result<EnvironmentSample, OutOfCoverage>;
}

impl<F> EnvironmentField for F
where
    F: Fn(&Coordinate, DateTime<Utc>) -> Result<EnvironmentSample, OutOfCoverage> + Sync,
{
    fn sample(&self, position: &Coordinate, time: DateTime<Utc>) -> Result<EnvironmentSample, OutOfCoverage> {
        self(position, time)
    }
}

/// Latitude/longitude box, inclusive on every side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn contains(&self, coord: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coord.lat)
            && (self.min_lon..=self.max_lon).contains(&coord.lon)
    }
}

/// Same wind and current everywhere, optionally limited to a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    pub sample: EnvironmentSample,
    pub bounds: Option<Bounds>,
}

impl UniformField {
    pub fn new(wind: WindData, current: CurrentData) -> Self {
        Self { sample: EnvironmentSample::new(wind, current), bounds: None }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

impl EnvironmentField for UniformField {
    fn sample(&self, position: &Coordinate, time: DateTime<Utc>) -> Result<EnvironmentSample, OutOfCoverage> {
        match &self.bounds {
            Some(b) if !b.contains(position) => Err(OutOfCoverage::at(position, time)),
            _ => Ok(self.sample),
        }
    }
}

/// Scattered wind observations, looked up by nearest neighbour.
///
/// Points are bucketed in 1x1 degree chunks keyed by `(lon.floor(), lat.floor())`;
/// a query only searches its own chunk, so an empty chunk is out of coverage.
/// The field carries no current and does not vary in time.
#[derive(Default, Debug, Clone)]
pub struct ScatteredWindField {
    chunks: HashMap<(i32, i32), Vec<(Coordinate, WindData)>>,
}

impl ScatteredWindField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_point(&mut self, coord: Coordinate, wind: WindData) {
        self.chunks.entry(chunk_key(&coord)).or_default().push((coord, wind));
    }

    pub fn len(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get_bounds(&self) -> Option<Bounds> {
        let mut points = self.chunks.values().flatten().map(|(c, _)| c);
        let first = points.next()?;
        let init = Bounds {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        Some(points.fold(init, |b, c| Bounds {
            min_lat: b.min_lat.min(c.lat),
            max_lat: b.max_lat.max(c.lat),
            min_lon: b.min_lon.min(c.lon),
            max_lon: b.max_lon.max(c.lon),
        }))
    }

    /// Finds the nearest wind data point to the given coordinate
    pub fn get_wind_at(&self, coord: &Coordinate) -> Option<WindData> {
        let chunk = self.chunks.get(&chunk_key(coord))?;
        chunk
            .iter()
            .map(|(p, wind)| {
                let d_lat = p.lat - coord.lat;
                let d_lon = p.lon - coord.lon;
                (d_lat * d_lat + d_lon * d_lon, *wind)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, wind)| wind)
    }
}

fn chunk_key(coord: &Coordinate) -> (i32, i32) {
    (coord.lon.floor() as i32, coord.lat.floor() as i32)
}

impl EnvironmentField for ScatteredWindField {
    fn sample(&self, position: &Coordinate, time: DateTime<Utc>) -> Result<EnvironmentSample, OutOfCoverage> {
        self.get_wind_at(position)
            .map(|wind| EnvironmentSample::new(wind, CurrentData::default()))
            .ok_or_else(|| OutOfCoverage::at(position, time))
    }
}
