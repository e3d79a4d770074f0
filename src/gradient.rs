//! Instantaneous gradient evaluation. One gradient event is a piecewise
//! linear waveform; outside of its local time window it contributes nothing.
//! Evaluation is total: malformed shape data degrades to 0 at that point so
//! a single corrupt event cannot abort the trajectory integration.

use crate::types::{Block, GradientChannel, GradientShape};
use crate::util::RotationMatrix;

/// Raster fallback for arbitrary waveforms when the sequence does not
/// define one. Unit: `us`
const FALLBACK_GRAD_RASTER: f64 = 10.0;

/// Amplitude of one channel at the absolute time `t_sec`.
/// Unit: `Hz / m`
pub(crate) fn value(
    block: &Block,
    channel: GradientChannel,
    t_sec: f64,
    block_start_sec: f64,
    grad_raster_us: f64,
) -> f64 {
    let Some(grad) = block.gradient(channel) else {
        return 0.0;
    };

    let local = t_sec - (block_start_sec + grad.delay * 1e-6);
    if local < 0.0 {
        return 0.0;
    }

    let value = match &grad.shape {
        &GradientShape::Trapezoid {
            ramp_up,
            flat,
            ramp_down,
        } => trapezoid(
            local,
            ramp_up * 1e-6,
            flat * 1e-6,
            ramp_down * 1e-6,
            grad.amplitude,
        ),
        GradientShape::Arbitrary { samples } => {
            arbitrary(local, samples, grad_raster_us, grad.amplitude)
        }
        GradientShape::ExtendedTrapezoid { times, samples } => {
            extended_trapezoid(local, times, samples, grad.amplitude)
        }
    };

    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Raw per-axis amplitudes at `t_sec`, with the block rotation applied.
pub(crate) fn vector(
    block: &Block,
    t_sec: f64,
    block_start_sec: f64,
    grad_raster_us: f64,
) -> [f64; 3] {
    let raw = [
        value(block, GradientChannel::X, t_sec, block_start_sec, grad_raster_us),
        value(block, GradientChannel::Y, t_sec, block_start_sec, grad_raster_us),
        value(block, GradientChannel::Z, t_sec, block_start_sec, grad_raster_us),
    ];

    match &block.rotation {
        Some(rotation) => RotationMatrix::from_quaternion(rotation).apply(raw),
        None => raw,
    }
}

fn trapezoid(t: f64, rise: f64, flat: f64, fall: f64, amp: f64) -> f64 {
    let total = rise + flat + fall;
    if t > total || total <= 0.0 {
        0.0
    } else if t <= rise && rise > 0.0 {
        amp * t / rise
    } else if t <= rise + flat {
        amp
    } else if fall > 0.0 {
        amp * (total - t) / fall
    } else {
        0.0
    }
}

fn arbitrary(t: f64, samples: &[f64], raster_us: f64, amp: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let raster_us = if raster_us > 0.0 {
        raster_us
    } else {
        FALLBACK_GRAD_RASTER
    };
    let raster = raster_us * 1e-6;

    // A single sample covers exactly one raster period.
    if samples.len() == 1 {
        return if t <= raster { amp * samples[0] } else { 0.0 };
    }

    let total = raster * (samples.len() - 1) as f64;
    if t > total {
        return 0.0;
    }
    let pos = t / raster;
    let idx = pos.floor() as usize;
    if idx >= samples.len() - 1 {
        return amp * samples[samples.len() - 1];
    }
    let frac = pos - idx as f64;
    amp * (samples[idx] + (samples[idx + 1] - samples[idx]) * frac)
}

fn extended_trapezoid(t: f64, times_us: &[f64], samples: &[f64], amp: f64) -> f64 {
    if times_us.is_empty() || samples.is_empty() || times_us.len() != samples.len() {
        return 0.0;
    }
    let t_us = t * 1e6;
    if t_us <= times_us[0] {
        return amp * samples[0];
    }
    if t_us >= times_us[times_us.len() - 1] {
        return amp * samples[samples.len() - 1];
    }

    let Some(idx1) = times_us.iter().position(|&vertex| t_us <= vertex) else {
        return amp * samples[0];
    };
    if idx1 == 0 {
        return amp * samples[0];
    }
    let idx0 = idx1 - 1;
    let span = times_us[idx1] - times_us[idx0];
    if span <= 0.0 {
        return amp * samples[idx1];
    }
    let alpha = ((t_us - times_us[idx0]) / span).clamp(0.0, 1.0);
    amp * (samples[idx0] + (samples[idx1] - samples[idx0]) * alpha)
}
