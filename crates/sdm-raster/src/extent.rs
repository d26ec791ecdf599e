//! Geographic coordinates and bounding extents.

use crate::{RasterError, Result};

/// A point in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    /// Latitude (positive = north).
    pub lat: f64,
    /// Longitude (negative = west).
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Geographic bounds of a raster or a sampling region.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl Extent {
    /// Create an extent, checking that the bounds are finite and ordered.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let all_finite = [min_lat, max_lat, min_lon, max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(RasterError::InvalidExtent(format!(
                "non-finite bounds ({min_lat}, {max_lat}, {min_lon}, {max_lon})"
            )));
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(RasterError::InvalidExtent(format!(
                "min exceeds max (lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon})"
            )));
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Smallest extent covering every coordinate, or `None` for an empty set.
    pub fn from_coordinates<'a, I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        coords
            .into_iter()
            .filter(|c| c.is_finite())
            .fold(None, |acc: Option<Extent>, c| {
                Some(match acc {
                    None => Extent {
                        min_lat: c.lat,
                        max_lat: c.lat,
                        min_lon: c.lon,
                        max_lon: c.lon,
                    },
                    Some(e) => Extent {
                        min_lat: e.min_lat.min(c.lat),
                        max_lat: e.max_lat.max(c.lat),
                        min_lon: e.min_lon.min(c.lon),
                        max_lon: e.max_lon.max(c.lon),
                    },
                })
            })
    }

    /// Check if a coordinate is within the bounds (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Extent width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Extent height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Centre of the extent.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Grow (or shrink) the extent about its centre.
    ///
    /// A factor of 1.25 makes the extent 25% wider and 25% taller, which is
    /// how the sampling region is padded around the occurrence records.
    pub fn scale(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(RasterError::InvalidExtent(format!(
                "scale factor must be positive, got {factor}"
            )));
        }
        let center = self.center();
        let half_h = self.height() * factor / 2.0;
        let half_w = self.width() * factor / 2.0;
        Extent::new(
            center.lat - half_h,
            center.lat + half_h,
            center.lon - half_w,
            center.lon + half_w,
        )
    }

    /// Overlap of two extents, or `None` if they are disjoint.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let min_lat = self.min_lat.max(other.min_lat);
        let max_lat = self.max_lat.min(other.max_lat);
        let min_lon = self.min_lon.max(other.min_lon);
        let max_lon = self.max_lon.min(other.max_lon);
        if min_lat > max_lat || min_lon > max_lon {
            return None;
        }
        Some(Extent {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }
}
