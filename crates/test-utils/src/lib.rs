//! Test support for the flood-depth-merge workspace: scratch directories,
//! synthetic depth grids, JRC-style tile names and GeoTIFF tile fixtures.
//!
//! Pulled in as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise comparison of two depth slices where NaN equals NaN.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_depths_eq;
///
/// assert_depths_eq!(&[1.0, f32::NAN], &[1.0, f32::NAN]);
/// ```
#[macro_export]
macro_rules! assert_depths_eq {
    ($left:expr, $right:expr) => {
        $crate::compare_depths($left, $right)
    };
}

/// Backs [`assert_depths_eq!`]; arguments live for the whole comparison.
#[doc(hidden)]
#[track_caller]
pub fn compare_depths(left: &[f32], right: &[f32]) {
    assert_eq!(left.len(), right.len(), "length mismatch");
    for (i, (l, r)) in left.iter().zip(right).enumerate() {
        let same = (l.is_nan() && r.is_nan()) || l == r;
        if !same {
            panic!(
                "assertion failed: depths differ at index {}\n  left: `{:?}`,\n right: `{:?}`",
                i, left, right
            );
        }
    }
}
