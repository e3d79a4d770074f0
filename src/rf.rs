//! RF pulse characterization: effective center time and physiological use.
//! Sequence formats older than the ones carrying an explicit use tag force
//! the engine to guess the use from the pulse physics; the guess is
//! best-effort and always surfaced as such in the result.

use tracing::warn;

use crate::types::{RfEvent, RfUse, Timing};

/// Flip angles below this count as excitation. Unit: `deg`
const EXCITATION_FLIP_LIMIT: f64 = 90.01;
/// Saturation pulses are long... Unit: `s`
const SATURATION_MIN_DURATION: f64 = 6e-3;
/// ...and sit near the fat resonance. Empirically tuned band, unit: `ppm`
const SATURATION_PPM_MIN: f64 = -4.5;
const SATURATION_PPM_MAX: f64 = -3.0;
/// Assumed field strength when the sequence does not define B0. Unit: `T`
const DEFAULT_B0: f64 = 3.0;
/// Samples this close to the peak magnitude belong to the plateau.
const PEAK_PLATEAU_FRACTION: f64 = 0.99999;

/// Per-invocation classification state; the B0 fallback warns at most once
/// per computation.
#[derive(Debug, Default)]
pub(crate) struct ClassifyContext {
    pub assumed_default_b0: bool,
}

/// Effective center of the pulse relative to its start. Explicit centers are
/// returned unchanged; otherwise the center is the midpoint of the peak
/// plateau of the magnitude envelope, which also handles flat-top pulses.
/// Unit: `us`
pub(crate) fn center(rf: &RfEvent) -> f64 {
    if let Some(center) = rf.center {
        if center >= 0.0 {
            return center;
        }
    }
    if rf.magnitude.is_empty() {
        return 0.0;
    }
    let dwell = if rf.dwell > 0.0 { rf.dwell } else { 1.0 };

    let peak = rf
        .magnitude
        .iter()
        .filter(|m| m.is_finite())
        .fold(0.0f64, |acc, &m| acc.max(m.abs()));

    let mut first = None;
    let mut last = None;
    for (i, m) in rf.magnitude.iter().enumerate() {
        if m.is_finite() && m.abs() >= peak * PEAK_PLATEAU_FRACTION {
            first.get_or_insert(i);
            last = Some(i);
        }
    }
    match (first, last) {
        (Some(first), Some(last)) => (first + last) as f64 * dwell / 2.0,
        _ => 0.0,
    }
}

/// Flip angle estimate from the left-Riemann integral of the complex
/// envelope. Only used for classification, not for display. Unit: `deg`
pub(crate) fn flip_angle(rf: &RfEvent) -> f64 {
    let len = rf.magnitude.len().min(rf.phase.len());
    if len <= 1 {
        return 0.0;
    }
    let dwell = if rf.dwell > 0.0 { rf.dwell } else { 1.0 };
    let dt = dwell * 1e-6;

    let mut re = 0.0;
    let mut im = 0.0;
    for i in 0..len - 1 {
        let mag = rf.magnitude[i];
        let phase = rf.phase[i];
        if !mag.is_finite() || !phase.is_finite() {
            continue;
        }
        let mag = mag * rf.amplitude;
        re += mag * phase.cos() * dt;
        im += mag * phase.sin() * dt;
    }
    (re * re + im * im).sqrt() * 360.0
}

/// Physiological use of the pulse. The second value reports whether the
/// heuristic ran, i.e. whether the format did not carry a usable tag.
pub(crate) fn classify(rf: &RfEvent, timing: &Timing, ctx: &mut ClassifyContext) -> (RfUse, bool) {
    if timing.has_rf_use {
        if let Some(tag) = rf.use_tag {
            if tag != RfUse::Unknown {
                return (tag, false);
            }
        }
    }

    if flip_angle(rf) < EXCITATION_FLIP_LIMIT {
        return (RfUse::Excitation, true);
    }

    let mut b0 = timing.b0;
    if b0 <= 0.0 {
        b0 = DEFAULT_B0;
        if !ctx.assumed_default_b0 {
            warn!("B0 not defined in sequence; assuming {DEFAULT_B0} T for RF use detection");
            ctx.assumed_default_b0 = true;
        }
    }

    let len = rf.magnitude.len();
    let duration = if len > 1 && rf.dwell > 0.0 {
        (len - 1) as f64 * rf.dwell * 1e-6
    } else {
        0.0
    };

    // Newer formats carry the ppm offset directly, older ones only the
    // absolute frequency offset.
    let mut ppm = rf.freq_ppm;
    if ppm.abs() < 1e-12 && timing.gamma.abs() > 0.0 {
        ppm = 1e6 * rf.freq_offset / (timing.gamma * b0);
    }

    if duration > SATURATION_MIN_DURATION && (SATURATION_PPM_MIN..=SATURATION_PPM_MAX).contains(&ppm)
    {
        return (RfUse::Saturation, true);
    }
    (RfUse::Refocusing, true)
}
