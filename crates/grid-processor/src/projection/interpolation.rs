//! Interpolation kernels for sampling a raster at fractional pixel positions.
//!
//! Positions are measured from the top-left corner of the top-left cell, so
//! the center of cell (i, j) sits at (i + 0.5, j + 0.5). Positions outside
//! `[0, width) x [0, height)` sample as NaN.

use crate::types::ResampleMethod;

/// Nearest neighbor interpolation.
///
/// Returns the value of the cell containing the position.
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !inside(width, height, x, y) {
        return f32::NAN;
    }
    let col = (x.floor() as usize).min(width - 1);
    let row = (y.floor() as usize).min(height - 1);
    data[row * width + col]
}

/// Bilinear interpolation.
///
/// Smoothly interpolates between the four nearest cell centers; near the edge
/// the outermost centers are reused. Any NaN corner yields NaN.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !inside(width, height, x, y) {
        return f32::NAN;
    }

    // Shift to center-based coordinates
    let cx = (x - 0.5).clamp(0.0, (width - 1) as f64);
    let cy = (y - 0.5).clamp(0.0, (height - 1) as f64);

    let x0 = cx.floor() as usize;
    let y0 = cy.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (cx - x0 as f64) as f32;
    let yf = (cy - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Dispatch to the kernel for `method`.
#[inline]
pub fn interpolate(
    method: ResampleMethod,
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
) -> f32 {
    match method {
        ResampleMethod::Nearest => nearest_interpolate(data, width, height, x, y),
        ResampleMethod::Bilinear => bilinear_interpolate(data, width, height, x, y),
    }
}

#[inline]
fn inside(width: usize, height: usize, x: f64, y: f64) -> bool {
    x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64
}
