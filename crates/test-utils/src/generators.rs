//! Synthetic depth grids. All grids are row-major, `width * height` long.

/// Grid whose cell at (col, row) holds `col * 1000 + row`.
///
/// Any cell read back from disk identifies its own position.
///
/// ```
/// let grid = test_utils::create_test_grid(4, 3);
/// assert_eq!(grid[4 + 2], 2001.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    (0..height)
        .flat_map(|row| (0..width).map(move |col| (col * 1000 + row) as f32))
        .collect()
}

/// Flooded basin: `peak` metres in the middle, falling off linearly to a dry
/// (0.0) rim.
pub fn create_depth_grid(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = cx.min(cy).max(1.0);

    (0..height)
        .flat_map(|row| {
            (0..width).map(move |col| {
                let dx = col as f32 + 0.5 - cx;
                let dy = row as f32 + 0.5 - cy;
                (peak * (1.0 - dx.hypot(dy) / radius)).max(0.0)
            })
        })
        .collect()
}

/// Scattered wet cells (0 to 5 m, about a quarter of the grid), `sentinel`
/// in one cell of sixteen, dry elsewhere. Same `seed`, same grid.
pub fn create_speckled_depth_grid(width: usize, height: usize, seed: u32, sentinel: f32) -> Vec<f32> {
    (0..height)
        .flat_map(|row| {
            (0..width).map(move |col| {
                let h = mix(col as u32, row as u32, seed);
                match h % 16 {
                    0 => sentinel,
                    1..=4 => (h % 500) as f32 / 100.0,
                    _ => 0.0,
                }
            })
        })
        .collect()
}

// murmur3 finalizer over the cell position
fn mix(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed.wrapping_mul(31).wrapping_add(x).wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}
