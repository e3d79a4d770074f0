//! Linear interpolation of the integrated trajectory at the ADC acquisition
//! instants. Queries use the rounded grid times for bracket lookup, matching
//! the rounding applied while the grid was built, so an ADC sample that
//! coincides with a reset boundary lands on the post-reset side.

use crate::util::TACC;

/// One channel value at time `sec`, clamped to the first/last sample outside
/// the grid. `data` must be the unbroken trajectory (no NaN plot breaks).
pub(crate) fn sample(grid: &[f64], data: &[f64], sec: f64) -> f64 {
    if grid.is_empty() || data.is_empty() {
        return 0.0;
    }
    if grid.len() == 1 || data.len() == 1 {
        return data[0];
    }

    let idx1 = grid.partition_point(|&t| t < sec);
    if idx1 == 0 {
        return data[0];
    }
    if idx1 >= grid.len() {
        return data[data.len() - 1];
    }
    // Exact grid hits return the stored value, without interpolation drift
    if (grid[idx1] - sec).abs() <= TACC * 0.5 {
        return data[idx1];
    }

    let idx0 = idx1 - 1;
    let t0 = grid[idx0];
    let t1 = grid[idx1];
    if t1 <= t0 {
        return data[idx1];
    }
    let alpha = (sec - t0) / (t1 - t0);
    data[idx0] + (data[idx1] - data[idx0]) * alpha
}

pub(crate) fn sample_all(grid: &[f64], data: &[f64], times: &[f64]) -> Vec<f64> {
    times.iter().map(|&sec| sample(grid, data, sec)).collect()
}
