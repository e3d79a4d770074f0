//! Construction of the irregular integration time axis. Only actual event
//! breakpoints become grid points; there is no dense resampling, so the grid
//! stays as coarse as the underlying events allow. Extra points right before
//! every pulse center guarantee that the integrator can reset exactly there.

use tracing::debug;

use crate::types::{Block, GradientChannel, GradientShape};
use crate::util::{clamp_non_negative, round_acc, TACC};

/// All waveform breakpoints of one channel of one block, as absolute times
/// in seconds. Trapezoids contribute their four vertices, arbitrary shapes
/// their raster ticks and extended trapezoids their explicit vertex times.
fn gradient_breakpoints(
    block: &Block,
    channel: GradientChannel,
    block_start_sec: f64,
    grad_raster_us: f64,
    out: &mut Vec<f64>,
) {
    let Some(grad) = block.gradient(channel) else {
        return;
    };
    let start = block_start_sec + grad.delay * 1e-6;

    match &grad.shape {
        &GradientShape::Trapezoid {
            ramp_up,
            flat,
            ramp_down,
        } => {
            out.push(start);
            out.push(start + ramp_up * 1e-6);
            out.push(start + (ramp_up + flat) * 1e-6);
            out.push(start + (ramp_up + flat + ramp_down) * 1e-6);
        }
        GradientShape::Arbitrary { samples } => {
            let raster_us = if grad_raster_us > 0.0 { grad_raster_us } else { 10.0 };
            let raster = raster_us * 1e-6;
            for i in 0..samples.len() {
                out.push(start + i as f64 * raster);
            }
            // A single sample still spans one raster period.
            if samples.len() == 1 {
                out.push(start + raster);
            }
        }
        GradientShape::ExtendedTrapezoid { times, .. } => {
            for &t in times {
                out.push(start + t * 1e-6);
            }
        }
    }
}

/// Merge every relevant breakpoint into one sorted, de-duplicated and
/// non-negative time axis. Excitation centers get two lead-in points and
/// refocusing centers one, spaced one RF raster apart.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build(
    blocks: &[Block],
    block_edges_sec: &[f64],
    total_duration_sec: f64,
    excitations_sec: &[f64],
    refocusings_sec: &[f64],
    adc_sec: &[f64],
    rf_raster_us: f64,
    grad_raster_us: f64,
) -> Vec<f64> {
    let mut candidates = Vec::new();
    let mut add = |sec: f64| {
        // Non-finite breakpoints are dropped, not propagated
        if sec.is_finite() {
            candidates.push(clamp_non_negative(round_acc(sec)));
        }
    };

    let mut breakpoints = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        let Some(&start) = block_edges_sec.get(i) else {
            break;
        };
        for channel in [GradientChannel::X, GradientChannel::Y, GradientChannel::Z] {
            gradient_breakpoints(block, channel, start, grad_raster_us, &mut breakpoints);
        }
    }
    for &sec in &breakpoints {
        add(sec);
    }

    add(0.0);
    add(total_duration_sec);

    let rf_raster_sec = if rf_raster_us > 0.0 {
        rf_raster_us * 1e-6
    } else {
        0.0
    };
    for &sec in excitations_sec {
        add(sec);
        if rf_raster_sec > 0.0 {
            add(sec - rf_raster_sec);
            add(sec - 2.0 * rf_raster_sec);
        }
    }
    for &sec in refocusings_sec {
        add(sec);
        if rf_raster_sec > 0.0 {
            add(sec - rf_raster_sec);
        }
    }
    for &sec in adc_sec {
        add(sec);
    }

    candidates.sort_by(|a, b| a.total_cmp(b));

    let mut grid: Vec<f64> = Vec::with_capacity(candidates.len());
    for sec in candidates {
        match grid.last() {
            Some(&last) if (sec - last).abs() <= TACC * 0.5 => {}
            _ => grid.push(sec),
        }
    }

    // The integrator needs at least one segment.
    if grid.len() < 2 {
        let extra = grid.last().map_or(TACC, |last| last + TACC);
        grid.push(extra);
    }

    debug!(points = grid.len(), "built integration time grid");
    grid
}
