//! Midpoint-rule integration of the 3-axis gradient over the time grid,
//! with the spin-echo reset rules: an excitation restarts the trajectory at
//! the k-space origin, a refocusing pulse mirrors it about the origin.

use crate::types::Block;
use crate::util::{round_acc, TACC};
use crate::{gradient, GradientChannel};

/// Dense trajectory with all reset offsets applied. The channels are kept
/// unbroken here; plotting copies with NaN breaks are derived on demand so
/// the ADC sampler can interpolate the real values.
pub(crate) struct Integrated {
    pub kx: Vec<f64>,
    pub ky: Vec<f64>,
    pub kz: Vec<f64>,
    pub excitation_idx: Vec<usize>,
}

impl Integrated {
    /// Plotting copy of one channel: the sample immediately before each
    /// excitation index is NaN so a line plot shows a break instead of a
    /// jump back to the origin.
    pub fn plot_channel(&self, channel: GradientChannel) -> Vec<f64> {
        let mut data = match channel {
            GradientChannel::X => self.kx.clone(),
            GradientChannel::Y => self.ky.clone(),
            GradientChannel::Z => self.kz.clone(),
        };
        for &idx in &self.excitation_idx {
            if idx > 0 {
                data[idx - 1] = f64::NAN;
            }
        }
        data
    }
}

/// Exact-match lookup of a rounded time against the rounded grid. Returns
/// `None` when the time is not a grid point.
pub(crate) fn index_for_seconds(grid: &[f64], sec: f64) -> Option<usize> {
    let target = round_acc(sec);
    let mut idx = grid.partition_point(|&t| t < target - TACC * 0.5);
    while idx < grid.len() {
        if (grid[idx] - target).abs() <= TACC * 0.5 {
            return Some(idx);
        }
        if grid[idx] > target + TACC * 0.5 {
            break;
        }
        idx += 1;
    }
    None
}

/// The 3-axis gradient vector at an arbitrary time, evaluated on the block
/// containing it. Outside of the sequence there is no gradient.
fn gradient_at(blocks: &[Block], block_edges_sec: &[f64], sec: f64, grad_raster_us: f64) -> [f64; 3] {
    if block_edges_sec.len() < 2 {
        return [0.0; 3];
    }
    if sec < block_edges_sec[0] || sec >= block_edges_sec[block_edges_sec.len() - 1] {
        return [0.0; 3];
    }
    let idx = block_edges_sec.partition_point(|&edge| edge <= sec);
    if idx == 0 {
        return [0.0; 3];
    }
    let block_idx = idx - 1;
    let Some(block) = blocks.get(block_idx) else {
        return [0.0; 3];
    };
    gradient::vector(block, sec, block_edges_sec[block_idx], grad_raster_us)
}

/// Accumulate k-space over the grid and apply the reset rule at every
/// excitation/refocusing center that falls exactly on a grid point.
pub(crate) fn run(
    blocks: &[Block],
    block_edges_sec: &[f64],
    grid: &[f64],
    excitations_sec: &[f64],
    refocusings_sec: &[f64],
    grad_raster_us: f64,
) -> Integrated {
    let n = grid.len();
    let mut kx = vec![0.0; n];
    let mut ky = vec![0.0; n];
    let mut kz = vec![0.0; n];
    if n == 0 {
        return Integrated {
            kx,
            ky,
            kz,
            excitation_idx: Vec::new(),
        };
    }

    for i in 1..n {
        let dt = grid[i] - grid[i - 1];
        if dt <= 0.0 {
            // Duplicate grid points hold the previous value
            kx[i] = kx[i - 1];
            ky[i] = ky[i - 1];
            kz[i] = kz[i - 1];
            continue;
        }
        let mid = grid[i - 1] + 0.5 * dt;
        let g = gradient_at(blocks, block_edges_sec, mid, grad_raster_us);
        kx[i] = kx[i - 1] + g[0] * dt;
        ky[i] = ky[i - 1] + g[1] * dt;
        kz[i] = kz[i - 1] + g[2] * dt;
    }

    let mut excitation_idx: Vec<usize> = excitations_sec
        .iter()
        .filter_map(|&sec| index_for_seconds(grid, sec))
        .collect();
    excitation_idx.sort_unstable();
    excitation_idx.dedup();

    let mut refocus_idx: Vec<usize> = refocusings_sec
        .iter()
        .filter_map(|&sec| index_for_seconds(grid, sec))
        .collect();
    refocus_idx.sort_unstable();
    refocus_idx.dedup();

    let mut boundaries = vec![0, n - 1];
    boundaries.extend_from_slice(&excitation_idx);
    boundaries.extend_from_slice(&refocus_idx);
    boundaries.sort_unstable();
    boundaries.dedup();

    // Start with the integral already accumulated before the first point
    // subtracted, then rewrite the offset at every pulse boundary.
    let mut dk = [-kx[0], -ky[0], -kz[0]];
    let mut ptr_exc = 0;
    let mut ptr_ref = 0;
    for seg in 0..boundaries.len() - 1 {
        let start = boundaries[seg];
        let end = boundaries[seg + 1];

        if ptr_exc < excitation_idx.len() && excitation_idx[ptr_exc] == start {
            dk = [-kx[start], -ky[start], -kz[start]];
            ptr_exc += 1;
        } else if ptr_ref < refocus_idx.len() && refocus_idx[ptr_ref] == start {
            dk = [
                -2.0 * kx[start] - dk[0],
                -2.0 * ky[start] - dk[1],
                -2.0 * kz[start] - dk[2],
            ];
            ptr_ref += 1;
        }

        for idx in start..end {
            kx[idx] += dk[0];
            ky[idx] += dk[1];
            kz[idx] += dk[2];
        }
    }
    if let Some(&last) = boundaries.last() {
        kx[last] += dk[0];
        ky[last] += dk[1];
        kz[last] += dk[2];
    }

    Integrated {
        kx,
        ky,
        kz,
        excitation_idx,
    }
}
