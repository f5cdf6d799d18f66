//! Normalization of sentinels and non-physical depths to NaN.

use crate::types::RasterTile;

/// Replace the sentinel and every sample `<= 0` with NaN.
///
/// Zero and negative depths count as "no flood", not as a zero-depth
/// reading. The output carries no sentinel, so cleaning is idempotent.
pub fn clean(tile: &RasterTile) -> RasterTile {
    let sentinel = tile.nodata();
    tile.map_samples(|v| {
        if sentinel == Some(v) || v <= 0.0 {
            f32::NAN
        } else {
            v
        }
    })
}
