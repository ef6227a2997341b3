//! Polygon geometries in GeoJSON layout.

use crate::error::GeometryError;
use serde::{Deserialize, Serialize};

pub type Position = [f64; 2];
pub type Ring = Vec<Position>;

/// Polygonal geometry. Serializes as a GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// Axis-aligned bounding extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Geometry {
    /// Closed rectangle polygon.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Geometry::Polygon(vec![vec![
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y],
        ]])
    }

    fn rings(&self) -> Box<dyn Iterator<Item = &Ring> + '_> {
        match self {
            Geometry::Polygon(rings) => Box::new(rings.iter()),
            Geometry::MultiPolygon(polys) => Box::new(polys.iter().flatten()),
        }
    }

    /// Check ring structure: at least one ring, each closed with four or more finite points.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let mut count = 0;
        for (i, ring) in self.rings().enumerate() {
            count += 1;
            if ring.len() < 4 {
                return Err(GeometryError::TooFewPoints {
                    ring: i,
                    points: ring.len(),
                });
            }
            if ring.iter().flatten().any(|c| !c.is_finite()) {
                return Err(GeometryError::NonFinite { ring: i });
            }
            if ring.first() != ring.last() {
                return Err(GeometryError::Unclosed { ring: i });
            }
        }
        if count == 0 {
            return Err(GeometryError::Empty);
        }
        Ok(())
    }

    /// Bounding extent. Fails on null-equivalent or malformed geometry.
    pub fn bounds(&self) -> Result<Bounds, GeometryError> {
        self.validate()?;
        let mut b = Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for [x, y] in self.rings().flatten() {
            b.min_x = b.min_x.min(*x);
            b.min_y = b.min_y.min(*y);
            b.max_x = b.max_x.max(*x);
            b.max_y = b.max_y.max(*y);
        }
        Ok(b)
    }

    /// Even-odd containment test; holes fall out of the parity rule.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Geometry::Polygon(rings) => polygon_contains(rings, x, y),
            Geometry::MultiPolygon(polys) => polys.iter().any(|p| polygon_contains(p, x, y)),
        }
    }
}

fn polygon_contains(rings: &[Ring], x: f64, y: f64) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = ring[i];
            let [xj, yj] = ring[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}
