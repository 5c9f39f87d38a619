use chrono::{DateTime, Utc};

use crate::engine::environment::{Bounds, EnvironmentField, OutOfCoverage};
use crate::engine::error::RoutingError;
use crate::engine::models::{Coordinate, CurrentData, EnvironmentSample, WindData};

/// Evenly spaced axis: `start + i * step` for `i` in `0..count`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridAxis {
    pub start: f64,
    pub step: f64,
    pub count: usize,
}

impl GridAxis {
    pub fn new(start: f64, step: f64, count: usize) -> Self {
        Self { start, step, count }
    }

    pub fn stop(&self) -> f64 {
        self.start + self.step * (self.count - 1) as f64
    }

    /// Lower cell index and fraction towards the next one, None outside the axis
    fn locate(&self, x: f64) -> Option<(usize, f64)> {
        if !(self.start..=self.stop()).contains(&x) {
            return None;
        }
        if self.count == 1 {
            return Some((0, 0.0));
        }
        let pos = (x - self.start) / self.step;
        let idx = (pos.floor() as usize).min(self.count - 2);
        Some((idx, pos - idx as f64))
    }
}

/// One forecast time slice: row-major over latitude then longitude
#[derive(Debug, Clone)]
struct Frame {
    time: DateTime<Utc>,
    cells: Vec<EnvironmentSample>,
}

/// Regular latitude/longitude forecast grid with one or more time frames.
///
/// Wind and current components are interpolated bilinearly in space and
/// linearly between the two frames bracketing the query time. With a single
/// frame the field is constant in time.
#[derive(Debug, Clone)]
pub struct GriddedField {
    lat: GridAxis,
    lon: GridAxis,
    frames: Vec<Frame>,
}

impl GriddedField {
    pub fn builder(lat: GridAxis, lon: GridAxis) -> GriddedFieldBuilder {
        GriddedFieldBuilder { lat, lon, frames: Vec::new() }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_lat: self.lat.start,
            max_lat: self.lat.stop(),
            min_lon: self.lon.start,
            max_lon: self.lon.stop(),
        }
    }

    pub fn time_span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.frames[0].time, self.frames[self.frames.len() - 1].time)
    }

    fn cell(&self, frame: &Frame, i_lat: usize, i_lon: usize) -> EnvironmentSample {
        frame.cells[i_lat * self.lon.count + i_lon]
    }

    fn spatial(&self, frame: &Frame, (i_lat, f_lat): (usize, f64), (i_lon, f_lon): (usize, f64)) -> EnvironmentSample {
        let j_lat = (i_lat + 1).min(self.lat.count - 1);
        let j_lon = (i_lon + 1).min(self.lon.count - 1);

        let s00 = self.cell(frame, i_lat, i_lon);
        let s01 = self.cell(frame, i_lat, j_lon);
        let s10 = self.cell(frame, j_lat, i_lon);
        let s11 = self.cell(frame, j_lat, j_lon);

        let row0 = lerp_sample(&s00, &s01, f_lon);
        let row1 = lerp_sample(&s10, &s11, f_lon);
        lerp_sample(&row0, &row1, f_lat)
    }
}

impl EnvironmentField for GriddedField {
    fn sample(&self, position: &Coordinate, time: DateTime<Utc>) -> Result<EnvironmentSample, OutOfCoverage> {
        let out = || OutOfCoverage::at(position, time);
        let lat = self.lat.locate(position.lat).ok_or_else(out)?;
        let lon = self.lon.locate(position.lon).ok_or_else(out)?;

        if self.frames.len() == 1 {
            return Ok(self.spatial(&self.frames[0], lat, lon));
        }

        let (first, last) = self.time_span();
        if time < first || time > last {
            return Err(out());
        }
        // Index of the first frame strictly after `time`, clamped so the last frame pairs with its predecessor
        let upper = self.frames.partition_point(|f| f.time <= time).clamp(1, self.frames.len() - 1);
        let (f0, f1) = (&self.frames[upper - 1], &self.frames[upper]);

        let span = (f1.time - f0.time).num_milliseconds() as f64;
        let frac = ((time - f0.time).num_milliseconds() as f64 / span).clamp(0.0, 1.0);

        let s0 = self.spatial(f0, lat, lon);
        let s1 = self.spatial(f1, lat, lon);
        Ok(lerp_sample(&s0, &s1, frac))
    }
}

fn lerp_sample(a: &EnvironmentSample, b: &EnvironmentSample, t: f64) -> EnvironmentSample {
    let lerp = |x: f64, y: f64| x + (y - x) * t;
    EnvironmentSample {
        wind: WindData {
            u: lerp(a.wind.u, b.wind.u),
            v: lerp(a.wind.v, b.wind.v),
        },
        current: CurrentData {
            u: lerp(a.current.u, b.current.u),
            v: lerp(a.current.v, b.current.v),
        },
    }
}

pub struct GriddedFieldBuilder {
    lat: GridAxis,
    lon: GridAxis,
    frames: Vec<Frame>,
}

impl GriddedFieldBuilder {
    /// Adds the next time frame; `cells` is row-major, latitude outer
    pub fn add_frame(mut self, time: DateTime<Utc>, cells: Vec<EnvironmentSample>) -> Self {
        self.frames.push(Frame { time, cells });
        self
    }

    /// Adds a frame by evaluating `f` at every grid node
    pub fn add_frame_with(self, time: DateTime<Utc>, f: impl Fn(Coordinate) -> EnvironmentSample) -> Self {
        let mut cells = Vec::with_capacity(self.lat.count * self.lon.count);
        for i in 0..self.lat.count {
            for j in 0..self.lon.count {
                let lat = self.lat.start + self.lat.step * i as f64;
                let lon = self.lon.start + self.lon.step * j as f64;
                cells.push(f(Coordinate::new(lat, lon)));
            }
        }
        self.add_frame(time, cells)
    }

    pub fn build(self) -> Result<GriddedField, RoutingError> {
        for (name, axis) in [("latitude", &self.lat), ("longitude", &self.lon)] {
            if axis.count == 0 {
                return Err(RoutingError::config(format!("{} axis has no nodes", name)));
            }
            if !(axis.step.is_finite() && axis.step > 0.0) || !axis.start.is_finite() {
                return Err(RoutingError::config(format!("{} axis needs a positive spacing", name)));
            }
        }
        if self.frames.is_empty() {
            return Err(RoutingError::config("environment grid has no time frame"));
        }
        let expected = self.lat.count * self.lon.count;
        if let Some(frame) = self.frames.iter().find(|f| f.cells.len() != expected) {
            return Err(RoutingError::config(format!(
                "frame at {} has {} cells, grid needs {}",
                frame.time,
                frame.cells.len(),
                expected
            )));
        }
        if self.frames.windows(2).any(|w| w[0].time >= w[1].time) {
            return Err(RoutingError::config("environment frames must be strictly increasing in time"));
        }
        Ok(GriddedField { lat: self.lat, lon: self.lon, frames: self.frames })
    }
}
