use std::io::{BufReader, Read};
use std::path::Path;

use geo::{Contains, Intersects, Line, Point, Polygon};
use log::info;
use roaring::RoaringTreemap;
use xz2::read::XzDecoder;

use crate::engine::error::RoutingError;
use crate::engine::models::{Coordinate, normalize_longitude};

/// Raster resolution: cells per degree
pub const CELLS_PER_DEGREE: f64 = 240.0;
pub const NX: u64 = 86400;
pub const NY: u64 = 43200;

/// Forbidden area for the boat: a 1/240° land raster plus optional polygon zones
/// (traffic separation schemes, exclusion areas, hand-drawn coastline fixes).
#[derive(Debug, Clone, Default)]
pub struct LandMask {
    pub mask: RoaringTreemap,
    pub zones: Vec<Polygon<f64>>,
}

impl LandMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a serialized, xz-compressed roaring treemap (e.g. a GSHHG rasterisation)
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, RoutingError> {
        info!("Loading land mask from {:?}", path.as_ref());
        let file = std::fs::File::open(path)?;
        let mask = Self::from_compressed_reader(BufReader::new(file))?;
        info!("Land mask loaded successfully ({} land cells).", mask.mask.len());
        Ok(mask)
    }

    pub fn from_compressed_reader<R: Read>(reader: R) -> Result<Self, RoutingError> {
        let mask = RoaringTreemap::deserialize_from(XzDecoder::new(reader))?;
        Ok(Self { mask, zones: Vec::new() })
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty() && self.zones.is_empty()
    }

    fn coords_to_indices(lon: f64, lat: f64) -> (u64, u64) {
        // Affine transform: sa = 240, sc = 43200, se = 240, sf = 21600
        let x = (lon * CELLS_PER_DEGREE + 43200.0) as u64;
        let y = (lat * CELLS_PER_DEGREE + 21600.0) as u64;
        (x.clamp(0, NX - 1), y.clamp(0, NY - 1))
    }

    /// Marks a lat/lon box as land
    pub fn add_land_box(&mut self, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) {
        let (min_x, min_y) = Self::coords_to_indices(min_lon, min_lat);
        let (max_x, max_y) = Self::coords_to_indices(max_lon, max_lat);

        for y in min_y..=max_y {
            self.mask.insert_range(y * NX + min_x..=y * NX + max_x);
        }
    }

    pub fn add_zone(&mut self, zone: Polygon<f64>) {
        self.zones.push(zone);
    }

    /// Checks if a coordinate is over land or inside a forbidden zone
    pub fn is_land(&self, coord: &Coordinate) -> bool {
        let (x, y) = Self::coords_to_indices(coord.lon, coord.lat);
        if self.mask.contains(y * NX + x) {
            return true;
        }
        let p = Point::new(coord.lon, coord.lat);
        self.zones.iter().any(|z| z.contains(&p))
    }

    /// True when the straight lat/lon segment from `a` to `b` stays clear of land.
    /// The raster is sampled at half-cell spacing; zones are tested exactly.
    pub fn segment_is_clear(&self, a: &Coordinate, b: &Coordinate) -> bool {
        if self.is_empty() {
            return true;
        }
        let d_lat = b.lat - a.lat;
        let mut d_lon = b.lon - a.lon;
        if d_lon > 180.0 {
            d_lon -= 360.0;
        } else if d_lon < -180.0 {
            d_lon += 360.0;
        }

        if !self.mask.is_empty() {
            let n = ((d_lat.abs().max(d_lon.abs()) * CELLS_PER_DEGREE * 2.0).ceil() as usize).max(1);
            for i in 0..=n {
                let t = i as f64 / n as f64;
                let p = Coordinate::new(a.lat + d_lat * t, normalize_longitude(a.lon + d_lon * t));
                let (x, y) = Self::coords_to_indices(p.lon, p.lat);
                if self.mask.contains(y * NX + x) {
                    return false;
                }
            }
        }

        let line = Line::new((a.lon, a.lat), (a.lon + d_lon, b.lat));
        !self.zones.iter().any(|z| line.intersects(z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use std::io::Write;
    use xz2::write::XzEncoder;

    #[test]
    fn test_land_box_classification() {
        let mut mask = LandMask::new();
        mask.add_land_box(-1.6, -1.1, 50.55, 50.75);

        assert!(mask.is_land(&Coordinate::new(50.65, -1.35)));
        assert!(!mask.is_land(&Coordinate::new(50.5, -1.35)));
        assert!(!mask.is_land(&Coordinate::new(40.0, -30.0)));
    }

    #[test]
    fn test_segment_crossing_land() {
        let mut mask = LandMask::new();
        mask.add_land_box(-1.6, -1.1, 50.55, 50.75);

        let south = Coordinate::new(50.5, -1.35);
        let north = Coordinate::new(50.8, -1.35);
        assert!(!mask.is_land(&south) && !mask.is_land(&north));
        assert!(!mask.segment_is_clear(&south, &north));

        let west = Coordinate::new(50.5, -1.8);
        assert!(mask.segment_is_clear(&south, &west));
    }

    #[test]
    fn test_polygon_zone() {
        let mut mask = LandMask::new();
        mask.add_zone(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]);
        assert!(mask.is_land(&Coordinate::new(0.5, 0.5)));
        assert!(!mask.is_land(&Coordinate::new(1.5, 0.5)));
        assert!(!mask.segment_is_clear(&Coordinate::new(0.5, -0.5), &Coordinate::new(0.5, 1.5)));
        assert!(mask.segment_is_clear(&Coordinate::new(-0.5, -0.5), &Coordinate::new(-0.5, 1.5)));
    }

    #[test]
    fn test_load_compressed_treemap() {
        let mut source = LandMask::new();
        source.add_land_box(2.0, 2.5, 48.5, 49.0);

        let mut encoder = XzEncoder::new(Vec::new(), 6);
        let mut raw = Vec::new();
        source.mask.serialize_into(&mut raw).unwrap();
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let loaded = LandMask::from_compressed_reader(compressed.as_slice()).unwrap();
        assert_eq!(loaded.mask.len(), source.mask.len());
        assert!(loaded.is_land(&Coordinate::new(48.8566, 2.3522)));
    }
}
