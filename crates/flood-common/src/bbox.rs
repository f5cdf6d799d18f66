//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (EPSG:3857, Equi7, etc.), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse a "minx,miny,maxx,maxy" string.
    pub fn from_csv(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        Ok(Self::new(
            parse(parts[0])?,
            parse(parts[1])?,
            parse(parts[2])?,
            parse(parts[3])?,
        ))
    }

    /// Smallest box enclosing every point in `points`.
    ///
    /// Non-finite points are ignored; returns `None` when nothing finite remains.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let mut finite = points
            .iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite());
        let &(x0, y0) = finite.next()?;

        Some(finite.fold(Self::new(x0, y0, x0, y0), |acc, &(x, y)| Self {
            min_x: acc.min_x.min(x),
            min_y: acc.min_y.min(y),
            max_x: acc.max_x.max(x),
            max_y: acc.max_y.max(y),
        }))
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when the box encloses a strictly positive, finite area.
    pub fn has_area(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bbox format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_bbox() {
        let bbox = BoundingBox::from_csv("-10.0, 35.0,5.5,44.0").unwrap();
        assert_eq!(bbox.min_x, -10.0);
        assert_eq!(bbox.min_y, 35.0);
        assert_eq!(bbox.max_x, 5.5);
        assert_eq!(bbox.max_y, 44.0);

        assert!(BoundingBox::from_csv("1,2,3").is_err());
        assert!(BoundingBox::from_csv("1,2,x,4").is_err());
    }

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, BoundingBox::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_union_covers_both() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(5.0, -2.0, 6.0, 0.5);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, -2.0, 6.0, 1.0));
        assert_eq!(a.union(&b), b.union(&a));
    }

    #[test]
    fn test_from_points_skips_non_finite() {
        let bbox = BoundingBox::from_points(&[
            (f64::NAN, 1.0),
            (2.0, 3.0),
            (-1.0, f64::INFINITY),
            (4.0, -1.0),
        ])
        .unwrap();
        assert_eq!(bbox, BoundingBox::new(2.0, -1.0, 4.0, 3.0));
        assert!(BoundingBox::from_points(&[(f64::NAN, f64::NAN)]).is_none());
    }

    #[test]
    fn test_has_area() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).has_area());
        assert!(!BoundingBox::new(0.0, 0.0, 0.0, 1.0).has_area());
        assert!(!BoundingBox::new(0.0, 0.0, f64::NAN, 1.0).has_area());
    }
}
