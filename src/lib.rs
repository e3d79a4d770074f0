//! This crate contains the whole k-space trajectory engine behind an
//! intentionally small API. The caller hands over a decoded sequence (timed
//! event blocks plus a few timing constants) as a [`SequenceView`] and gets
//! back a [`Trajectory`]: the dense k-space path over an irregular time grid
//! and the same path sampled at the ADC acquisition instants. Parsing the
//! on-disk sequence format, plotting and UI state are not part of this
//! crate; the engine is a pure function of its inputs and holds no state
//! across invocations.

use thiserror::Error;
use tracing::warn;

mod gradient;
mod grid;
mod integrate;
mod rf;
mod sampler;
mod types;
mod util;

pub use types::{
    AdcEvent, Block, GradientChannel, GradientEvent, GradientShape, RfEvent, RfUse, Rotation,
    Timing,
};

use util::{clamp_non_negative, internal_to_seconds, round_acc};

/// Structural problems in the caller-supplied sequence. Everything else
/// (malformed waveforms, missing events, degenerate grids) degrades to
/// empty or zero values instead of failing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("expected one more block edge than blocks ({blocks} blocks, {edges} edges)")]
    MismatchedBlockEdges { blocks: usize, edges: usize },
    #[error("block edges must be non-decreasing (edge {index} runs backwards)")]
    UnorderedBlockEdges { index: usize },
}

/// Borrowed view of one decoded sequence. Block edges and ADC sample times
/// are in internal units (microseconds times `Timing::t_factor`); the edge
/// list carries one trailing entry for the sequence end.
#[derive(Debug)]
pub struct SequenceView<'a> {
    blocks: &'a [Block],
    block_edges: &'a [f64],
    adc_times: &'a [f64],
    timing: Timing,
}

impl<'a> SequenceView<'a> {
    pub fn new(
        blocks: &'a [Block],
        block_edges: &'a [f64],
        adc_times: &'a [f64],
        timing: Timing,
    ) -> Result<Self, Error> {
        if !blocks.is_empty() && block_edges.len() != blocks.len() + 1 {
            return Err(Error::MismatchedBlockEdges {
                blocks: blocks.len(),
                edges: block_edges.len(),
            });
        }
        for (i, pair) in block_edges.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(Error::UnorderedBlockEdges { index: i + 1 });
            }
        }
        Ok(Self {
            blocks,
            block_edges,
            adc_times,
            timing,
        })
    }

    /// Reconstruct the k-space trajectory of the whole sequence. Runs to
    /// completion in one call; degenerate inputs produce an empty result,
    /// never an error.
    pub fn trajectory(&self) -> Trajectory {
        compute(self)
    }
}

/// The reconstructed trajectory plus the RF metadata it was derived from.
/// All k values are in `1/m`; the dense channels contain a NaN immediately
/// before each excitation so line plots show a break instead of a jump back
/// to the origin. `kx_adc`/`ky_adc`/`kz_adc` are unbroken.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// Unit: `s`
    pub t: Vec<f64>,
    pub kx: Vec<f64>,
    pub ky: Vec<f64>,
    pub kz: Vec<f64>,
    /// Unit: `s`
    pub t_adc: Vec<f64>,
    pub kx_adc: Vec<f64>,
    pub ky_adc: Vec<f64>,
    pub kz_adc: Vec<f64>,
    /// Pulse centers in internal units, for overlay display
    pub excitation_times: Vec<f64>,
    pub refocusing_times: Vec<f64>,
    /// Resolved RF use per block; `None` for blocks without an RF event
    pub rf_use: Vec<Option<RfUse>>,
    /// At least one RF use had to be guessed from pulse physics
    pub rf_use_guessed: bool,
    /// Human-readable note about the guess; empty when nothing was guessed
    pub warning: String,
    /// B0 was not defined and 3 T was assumed during classification
    pub assumed_default_b0: bool,
}

impl Trajectory {
    /// Times (seconds) at which the trajectory passes through kx = ky = 0,
    /// within `tolerance` (1/m). ADC samples are checked directly; dense
    /// segments are searched for zero crossings and, when ADC samples
    /// exist, only crossings close to one of them are kept.
    pub fn kxy_zero_times(&self, tolerance: f64) -> Vec<f64> {
        let mut candidates = Vec::new();

        for i in 0..self.t_adc.len().min(self.kx_adc.len()).min(self.ky_adc.len()) {
            let (kx, ky) = (self.kx_adc[i], self.ky_adc[i]);
            if kx.is_finite() && ky.is_finite() && kx.abs() <= tolerance && ky.abs() <= tolerance {
                candidates.push(self.t_adc[i]);
            }
        }

        let n = self.t.len().min(self.kx.len()).min(self.ky.len());
        let mut crossings = Vec::new();
        for i in 1..n {
            let (kx0, kx1) = (self.kx[i - 1], self.kx[i]);
            let (ky0, ky1) = (self.ky[i - 1], self.ky[i]);
            let (t0, t1) = (self.t[i - 1], self.t[i]);
            if !kx0.is_finite() || !kx1.is_finite() || !ky0.is_finite() || !ky1.is_finite() {
                continue;
            }

            let kx_crosses = kx0 * kx1 < 0.0 || kx0 == 0.0 || kx1 == 0.0;
            let ky_crosses = ky0 * ky1 < 0.0 || ky0 == 0.0 || ky1 == 0.0;
            if !kx_crosses && !ky_crosses {
                continue;
            }

            if kx0.abs() <= tolerance && ky0.abs() <= tolerance {
                crossings.push(t0);
                continue;
            }
            if kx1.abs() <= tolerance && ky1.abs() <= tolerance {
                crossings.push(t1);
                continue;
            }

            let at = |alpha: f64, v0: f64, v1: f64| v0 + alpha.clamp(0.0, 1.0) * (v1 - v0);
            let crossing_time = |v0: f64, v1: f64| -> Option<f64> {
                if v0 == v1 {
                    return None;
                }
                let alpha = -v0 / (v1 - v0);
                (0.0..=1.0).contains(&alpha).then(|| t0 + alpha * (t1 - t0))
            };
            let t_kx = kx_crosses.then(|| crossing_time(kx0, kx1)).flatten();
            let t_ky = ky_crosses.then(|| crossing_time(ky0, ky1)).flatten();

            match (t_kx, t_ky) {
                (Some(tx), Some(ty)) => {
                    // Both crossings must coincide within 1% of the segment
                    if (tx - ty).abs() <= (t1 - t0).abs() * 0.01 {
                        let t_zero = (tx + ty) * 0.5;
                        let alpha = if t1 > t0 { (t_zero - t0) / (t1 - t0) } else { 0.5 };
                        if at(alpha, kx0, kx1).abs() <= tolerance
                            && at(alpha, ky0, ky1).abs() <= tolerance
                        {
                            crossings.push(t_zero);
                        }
                    }
                }
                (Some(tx), None) => {
                    let alpha = if t1 > t0 { (tx - t0) / (t1 - t0) } else { 0.5 };
                    if at(alpha, ky0, ky1).abs() <= tolerance {
                        crossings.push(tx);
                    }
                }
                (None, Some(ty)) => {
                    let alpha = if t1 > t0 { (ty - t0) / (t1 - t0) } else { 0.5 };
                    if at(alpha, kx0, kx1).abs() <= tolerance {
                        crossings.push(ty);
                    }
                }
                (None, None) => {}
            }
        }

        // Without ADC data every dense crossing counts; otherwise only
        // crossings near an acquisition are kept.
        if self.t_adc.is_empty() {
            candidates.extend(crossings);
        } else {
            let mut adc_sorted = self.t_adc.clone();
            adc_sorted.sort_by(|a, b| a.total_cmp(b));
            let mut proximity = 50e-6;
            let min_interval = adc_sorted
                .windows(2)
                .map(|w| w[1] - w[0])
                .filter(|&dt| dt > 0.0)
                .fold(f64::INFINITY, f64::min);
            if min_interval.is_finite() {
                proximity = (min_interval * 0.3).min(proximity);
            }
            for t in crossings {
                let idx = adc_sorted.partition_point(|&a| a < t);
                let near = [idx.checked_sub(1), Some(idx)]
                    .into_iter()
                    .flatten()
                    .filter_map(|i| adc_sorted.get(i))
                    .any(|&a| (a - t).abs() <= proximity);
                if near {
                    candidates.push(t);
                }
            }
        }

        candidates.sort_by(|a, b| a.total_cmp(b));
        candidates.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
        candidates
    }
}

/// Absolute ADC sample instants (internal units) derived from the blocks:
/// each acquisition contributes `num_samples` points at the centers of its
/// dwell periods. Useful when the loader does not precompute them.
pub fn adc_sample_times(blocks: &[Block], block_edges: &[f64], t_factor: f64) -> Vec<f64> {
    // A zero factor means edges are plain seconds, one internal unit per us
    let factor = if t_factor == 0.0 { 1e-6 } else { t_factor };

    let mut times = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        let Some(adc) = &block.adc else {
            continue;
        };
        let Some(&edge) = block_edges.get(i) else {
            break;
        };
        if adc.num_samples == 0 || adc.dwell <= 0.0 {
            continue;
        }
        let dwell_internal = adc.dwell * 1e-3 * factor;
        let start = edge + adc.delay * factor + 0.5 * dwell_internal;
        for sample in 0..adc.num_samples {
            times.push(start + sample as f64 * dwell_internal);
        }
    }
    times
}

fn compute(seq: &SequenceView) -> Trajectory {
    let timing = seq.timing;
    if seq.blocks.is_empty() || seq.block_edges.len() < 2 {
        return Trajectory::default();
    }

    let to_sec_rounded =
        |internal: f64| clamp_non_negative(round_acc(internal_to_seconds(internal, timing.t_factor)));

    // Characterize every RF pulse and collect the reset markers
    let mut ctx = rf::ClassifyContext::default();
    let mut rf_use = vec![None; seq.blocks.len()];
    let mut guessed_any = false;
    let mut excitation_times = Vec::new();
    let mut refocusing_times = Vec::new();
    let mut excitations_sec = Vec::new();
    let mut refocusings_sec = Vec::new();

    for (i, block) in seq.blocks.iter().enumerate() {
        let Some(pulse) = &block.rf else {
            continue;
        };
        let (tag, guessed) = rf::classify(pulse, &timing, &mut ctx);
        guessed_any |= guessed;
        rf_use[i] = Some(tag);

        let center = rf::center(pulse);
        let internal = seq.block_edges[i] + (pulse.delay + center) * timing.t_factor;
        match tag {
            RfUse::Excitation => {
                excitation_times.push(internal);
                excitations_sec.push(to_sec_rounded(internal));
            }
            RfUse::Refocusing => {
                refocusing_times.push(internal);
                refocusings_sec.push(to_sec_rounded(internal));
            }
            _ => {}
        }
    }

    let warning = if guessed_any {
        warn!("sequence carries no RF use tags; guessing from pulse physics");
        String::from(
            "Sequence file carries no RF use information; \
             the RF use was guessed and the trajectory may not be accurate.",
        )
    } else {
        String::new()
    };

    let block_edges_sec: Vec<f64> = seq.block_edges.iter().map(|&e| to_sec_rounded(e)).collect();
    let total_duration_sec = *block_edges_sec.last().unwrap_or(&0.0);
    let adc_sec: Vec<f64> = seq.adc_times.iter().map(|&t| to_sec_rounded(t)).collect();

    let grid = grid::build(
        seq.blocks,
        &block_edges_sec,
        total_duration_sec,
        &excitations_sec,
        &refocusings_sec,
        &adc_sec,
        timing.rf_raster,
        timing.grad_raster,
    );

    let integrated = integrate::run(
        seq.blocks,
        &block_edges_sec,
        &grid,
        &excitations_sec,
        &refocusings_sec,
        timing.grad_raster,
    );

    let kx_adc = sampler::sample_all(&grid, &integrated.kx, &adc_sec);
    let ky_adc = sampler::sample_all(&grid, &integrated.ky, &adc_sec);
    let kz_adc = sampler::sample_all(&grid, &integrated.kz, &adc_sec);

    Trajectory {
        kx: integrated.plot_channel(GradientChannel::X),
        ky: integrated.plot_channel(GradientChannel::Y),
        kz: integrated.plot_channel(GradientChannel::Z),
        t: grid,
        t_adc: adc_sec,
        kx_adc,
        ky_adc,
        kz_adc,
        excitation_times,
        refocusing_times,
        rf_use,
        rf_use_guessed: guessed_any,
        warning,
        assumed_default_b0: ctx.assumed_default_b0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    fn rect_rf(amplitude: f64, samples: usize, dwell: f64) -> RfEvent {
        RfEvent {
            amplitude,
            delay: 0.0,
            center: None,
            magnitude: vec![1.0; samples],
            phase: vec![0.0; samples],
            dwell,
            freq_offset: 0.0,
            freq_ppm: 0.0,
            use_tag: None,
        }
    }

    fn flat_trap(amplitude: f64, flat_us: f64) -> GradientEvent {
        GradientEvent {
            amplitude,
            delay: 0.0,
            shape: GradientShape::Trapezoid {
                ramp_up: 0.0,
                flat: flat_us,
                ramp_down: 0.0,
            },
        }
    }

    #[test]
    fn mismatched_edges_are_rejected() {
        let blocks = vec![Block::default()];
        let edges = [0.0];
        let err = SequenceView::new(&blocks, &edges, &[], Timing::default()).unwrap_err();
        check!(err == Error::MismatchedBlockEdges { blocks: 1, edges: 1 });
    }

    #[test]
    fn backwards_edges_are_rejected() {
        let blocks = vec![Block::default(), Block::default()];
        let edges = [0.0, 2000.0, 1000.0];
        let err = SequenceView::new(&blocks, &edges, &[], Timing::default()).unwrap_err();
        check!(err == Error::UnorderedBlockEdges { index: 2 });
    }

    #[test]
    fn empty_sequence_yields_empty_result() {
        let seq = SequenceView::new(&[], &[], &[], Timing::default()).unwrap();
        let traj = seq.trajectory();
        check!(traj.t.is_empty());
        check!(traj.kx.is_empty());
        check!(!traj.rf_use_guessed);
        check!(traj.warning.is_empty());
    }

    #[test]
    fn excitation_then_gradient_end_to_end() {
        // One guessed 90-degree excitation followed by a 1 ms, 1000 Hz/m
        // flat gradient: kx must end at exactly 1.0 1/m with one plot break
        // right before the excitation center.
        let blocks = vec![
            Block {
                rf: Some(rect_rf(250.0, 100, 10.0)),
                ..Block::default()
            },
            Block {
                gx: Some(flat_trap(1000.0, 1000.0)),
                ..Block::default()
            },
        ];
        let edges = [0.0, 1000.0, 2000.0];
        let seq = SequenceView::new(&blocks, &edges, &[], Timing::default()).unwrap();
        let traj = seq.trajectory();

        check!(traj.rf_use == vec![Some(RfUse::Excitation), None]);
        check!(traj.rf_use_guessed);
        check!(!traj.warning.is_empty());
        check!(traj.excitation_times.len() == 1);
        // Rectangular envelope: center at half of the 99 dwell spans
        check!((traj.excitation_times[0] - 495.0).abs() < 1e-9);

        let last = *traj.kx.last().unwrap();
        check!((last - 1.0).abs() < 1e-9);

        let nan_count = traj.kx.iter().filter(|v| v.is_nan()).count();
        check!(nan_count == 1);
        let exc_idx = traj
            .t
            .iter()
            .position(|&t| (t - 495e-6).abs() < 1e-12)
            .unwrap();
        check!(traj.kx[exc_idx - 1].is_nan());
        check!(traj.ky[exc_idx - 1].is_nan());
        check!(traj.kz[exc_idx - 1].is_nan());
    }

    #[test]
    fn spin_echo_readout_crosses_center() {
        // 90 - dephase - 180 - readout: after the refocusing mirror the
        // readout passes through kx = 0 in the middle of the ADC window.
        let blocks = vec![
            Block {
                rf: Some(RfEvent {
                    use_tag: Some(RfUse::Excitation),
                    ..rect_rf(250.0, 100, 10.0)
                }),
                ..Block::default()
            },
            Block {
                gx: Some(flat_trap(1000.0, 1000.0)),
                ..Block::default()
            },
            Block {
                rf: Some(RfEvent {
                    use_tag: Some(RfUse::Refocusing),
                    ..rect_rf(500.0, 100, 10.0)
                }),
                ..Block::default()
            },
            Block {
                gx: Some(flat_trap(1000.0, 2000.0)),
                adc: Some(AdcEvent {
                    num_samples: 16,
                    dwell: 100_000.0,
                    delay: 50.0,
                    freq_offset: 0.0,
                    phase_offset: 0.0,
                }),
                ..Block::default()
            },
        ];
        let edges = [0.0, 1000.0, 2000.0, 3000.0, 5000.0];
        let timing = Timing {
            has_rf_use: true,
            ..Timing::default()
        };
        // 100 us dwell starting at 3050 us: centers at 3100, 3200, ..., 4600
        let adc_times = adc_sample_times(&blocks, &edges, timing.t_factor);
        check!(adc_times.len() == 16);
        check!((adc_times[0] - 3100.0).abs() < 1e-9);

        let seq = SequenceView::new(&blocks, &edges, &adc_times, timing).unwrap();
        let traj = seq.trajectory();

        check!(!traj.rf_use_guessed);
        check!(traj.warning.is_empty());
        check!(traj.excitation_times.len() == 1);
        check!(traj.refocusing_times.len() == 1);

        // Dephasing reaches +1.0, the mirror flips it to -1.0, and the
        // readout ramps from -1.0 back up to +1.0
        let last = *traj.kx.last().unwrap();
        check!((last - 1.0).abs() < 1e-9);

        // Readout samples walk from -0.9 through the echo up to +0.6
        check!(traj.kx_adc.len() == 16);
        check!((traj.kx_adc[0] + 0.9).abs() < 1e-9);
        check!((traj.kx_adc[9] - 0.0).abs() < 1e-9);
        check!((traj.kx_adc[15] - 0.6).abs() < 1e-9);

        // The echo at 4 ms coincides with the 10th readout sample
        let zeros = traj.kxy_zero_times(1e-3);
        check!(zeros.len() == 1);
        check!((zeros[0] - 4e-3).abs() < 1e-6);
    }

    #[test]
    fn adc_samples_on_reset_boundary_take_post_reset_value() {
        // An ADC sample exactly on the excitation center must see the reset
        // trajectory, not the pre-pulse one.
        let blocks = vec![
            Block {
                gx: Some(flat_trap(1000.0, 1000.0)),
                ..Block::default()
            },
            Block {
                rf: Some(RfEvent {
                    center: Some(0.0),
                    use_tag: Some(RfUse::Excitation),
                    ..rect_rf(250.0, 100, 10.0)
                }),
                ..Block::default()
            },
        ];
        let edges = [0.0, 1000.0, 2000.0];
        let timing = Timing {
            has_rf_use: true,
            ..Timing::default()
        };
        let adc_times = [1000.0];
        let seq = SequenceView::new(&blocks, &edges, &adc_times, timing).unwrap();
        let traj = seq.trajectory();
        check!(traj.kx_adc == vec![0.0]);
    }

    #[test]
    fn b0_assumption_is_reported() {
        let mut pulse = rect_rf(100.0, 700, 10.0);
        pulse.freq_offset = -440.0;
        let blocks = vec![Block {
            rf: Some(pulse),
            ..Block::default()
        }];
        let edges = [0.0, 8000.0];
        let timing = Timing {
            b0: 0.0,
            ..Timing::default()
        };
        let seq = SequenceView::new(&blocks, &edges, &[], timing).unwrap();
        let traj = seq.trajectory();
        check!(traj.assumed_default_b0);
        check!(traj.rf_use == vec![Some(RfUse::Saturation)]);
        // Saturation pulses do not reset the trajectory
        check!(traj.excitation_times.is_empty());
        check!(traj.refocusing_times.is_empty());
    }

    #[test]
    fn derived_adc_times_sit_at_dwell_centers() {
        let blocks = vec![Block {
            adc: Some(AdcEvent {
                num_samples: 3,
                dwell: 10_000.0,
                delay: 100.0,
                freq_offset: 0.0,
                phase_offset: 0.0,
            }),
            ..Block::default()
        }];
        // 10 us dwell: centers at delay + 5, 15, 25 us
        let times = adc_sample_times(&blocks, &[0.0, 1000.0], 1.0);
        check!(times.len() == 3);
        check!((times[0] - 105.0).abs() < 1e-9);
        check!((times[1] - 115.0).abs() < 1e-9);
        check!((times[2] - 125.0).abs() < 1e-9);
    }
}
