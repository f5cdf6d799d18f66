//! Point and bounds transformation between two coordinate reference systems.

use flood_common::{BoundingBox, Crs};
use proj4rs::proj::Proj;

use crate::epsg::proj_definition;
use crate::error::{ProjectionError, Result};

/// Points sampled along each edge when transforming bounds.
///
/// Curved projections bulge between corners, so corners alone underestimate
/// the transformed envelope.
pub const EDGE_SAMPLES: usize = 21;

/// How a transformer moves points.
enum Strategy {
    /// Source and target are the same CRS.
    Identity,
    /// Generic proj4rs transform.
    Proj4rs { source: Box<Proj>, target: Box<Proj> },
}

/// Reusable coordinate transformer from one CRS to another.
///
/// Geographic coordinates are exchanged in degrees (x = longitude,
/// y = latitude); the radian conversion proj4rs expects happens inside.
pub struct CoordTransformer {
    from: Crs,
    to: Crs,
    strategy: Strategy,
}

impl std::fmt::Debug for CoordTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordTransformer")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("identity", &self.is_identity())
            .finish()
    }
}

impl CoordTransformer {
    /// Create a transformer between two reference systems.
    ///
    /// # Errors
    /// Returns an error if either EPSG code has no known definition or the
    /// definition fails to initialize.
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        if from == to {
            return Ok(Self {
                from,
                to,
                strategy: Strategy::Identity,
            });
        }

        let source = load_proj(from)?;
        let target = load_proj(to)?;

        tracing::debug!(%from, %to, "Initialized proj4rs transformer");

        Ok(Self {
            from,
            to,
            strategy: Strategy::Proj4rs {
                source: Box::new(source),
                target: Box::new(target),
            },
        })
    }

    pub fn from_crs(&self) -> Crs {
        self.from
    }

    pub fn to_crs(&self) -> Crs {
        self.to
    }

    /// True when no coordinate change happens.
    pub fn is_identity(&self) -> bool {
        matches!(self.strategy, Strategy::Identity)
    }

    /// Transform one point.
    ///
    /// # Errors
    /// Returns an error if proj4rs rejects the point (e.g. outside the
    /// projection's domain).
    #[inline]
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (source, target) = match &self.strategy {
            Strategy::Identity => return Ok((x, y)),
            Strategy::Proj4rs { source, target } => (source, target),
        };

        let (in_x, in_y) = if self.from.is_geographic() {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        let mut point = (in_x, in_y, 0.0);
        proj4rs::transform::transform(source, target, &mut point).map_err(|e| {
            ProjectionError::TransformFailed {
                from: self.from,
                to: self.to,
                x,
                y,
                message: format!("{e:?}"),
            }
        })?;

        let (out_x, out_y) = if self.to.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(ProjectionError::TransformFailed {
                from: self.from,
                to: self.to,
                x,
                y,
                message: "non-finite result".to_string(),
            });
        }

        Ok((out_x, out_y))
    }
}

fn load_proj(crs: Crs) -> Result<Proj> {
    let definition = proj_definition(crs).ok_or(ProjectionError::UnsupportedCrs(crs))?;
    Proj::from_proj_string(&definition).map_err(|e| ProjectionError::InvalidDefinition {
        crs,
        message: format!("{e:?}"),
    })
}

/// Transform a bounding box, returning the envelope of the densified edges.
///
/// Points that fail to transform are skipped; if none succeed the bounds are
/// reported as degenerate.
pub fn transform_bounds(transformer: &CoordTransformer, bbox: &BoundingBox) -> Result<BoundingBox> {
    if transformer.is_identity() {
        return Ok(*bbox);
    }

    let steps = (EDGE_SAMPLES - 1) as f64;
    let mut points = Vec::with_capacity(EDGE_SAMPLES * 4);

    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / steps;
        let x = bbox.min_x + t * bbox.width();
        let y = bbox.min_y + t * bbox.height();
        for (px, py) in [(x, bbox.min_y), (x, bbox.max_y), (bbox.min_x, y), (bbox.max_x, y)] {
            if let Ok(p) = transformer.transform(px, py) {
                points.push(p);
            }
        }
    }

    BoundingBox::from_points(&points).ok_or(ProjectionError::DegenerateBounds {
        from: transformer.from_crs(),
        to: transformer.to_crs(),
    })
}
