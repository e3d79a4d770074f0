//! Value-semantic event model for one decoded sequence. The loader (out of
//! scope for this crate) produces these blocks from whatever file format it
//! reads; the trajectory engine only ever borrows them.

/// Gradient waveform of a single channel inside one block.
#[derive(Debug, Clone, PartialEq)]
pub enum GradientShape {
    /// Linear ramp up, constant flat top, linear ramp down.
    Trapezoid {
        /// Unit: `us`
        ramp_up: f64,
        /// Unit: `us`
        flat: f64,
        /// Unit: `us`
        ramp_down: f64,
    },
    /// Normalized samples on the gradient raster, linearly interpolated.
    Arbitrary { samples: Vec<f64> },
    /// Explicit (time, normalized value) vertices, not necessarily on the
    /// raster. Both vectors must have the same length.
    ExtendedTrapezoid {
        /// Unit: `us`, relative to the event start
        times: Vec<f64>,
        samples: Vec<f64>,
    },
}

/// One gradient event. The shape samples are normalized; `amplitude` scales
/// them to physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientEvent {
    /// Unit: `Hz / m`
    pub amplitude: f64,
    /// Unit: `us`, relative to the block start
    pub delay: f64,
    pub shape: GradientShape,
}

/// Physiological role of an RF pulse. Newer sequence formats store this
/// explicitly; for older ones the engine infers it (see `rf` module).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfUse {
    Excitation,
    Refocusing,
    Saturation,
    Other,
    Unknown,
}

/// One RF pulse event. The complex envelope is given as parallel
/// magnitude/phase sample arrays with a uniform dwell time.
#[derive(Debug, Clone, PartialEq)]
pub struct RfEvent {
    /// Unit: `Hz`, scales the normalized magnitude samples
    pub amplitude: f64,
    /// Unit: `us`, relative to the block start
    pub delay: f64,
    /// Unit: `us`, relative to the pulse start. `None` means the center has
    /// to be derived from the envelope samples.
    pub center: Option<f64>,
    /// Normalized magnitude samples
    pub magnitude: Vec<f64>,
    /// Unit: `rad`
    pub phase: Vec<f64>,
    /// Unit: `us`, time step between envelope samples
    pub dwell: f64,
    /// Unit: `Hz`
    pub freq_offset: f64,
    /// Unit: `ppm` relative to B0; 0 when the format does not provide it
    pub freq_ppm: f64,
    /// Explicit use tag, if the format version carries one
    pub use_tag: Option<RfUse>,
}

/// One ADC acquisition window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcEvent {
    pub num_samples: u32,
    /// Unit: `ns`
    pub dwell: f64,
    /// Unit: `us`, relative to the block start
    pub delay: f64,
    /// Unit: `Hz`
    pub freq_offset: f64,
    /// Unit: `rad`
    pub phase_offset: f64,
}

/// Gradient rotation applied to the whole block, as a unit quaternion
/// `(w, x, y, z)`. Absent rotation means identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub quat: [f64; 4],
}

/// One timed segment of the sequence. Every sub-event is optional; an empty
/// block is just a delay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub gx: Option<GradientEvent>,
    pub gy: Option<GradientEvent>,
    pub gz: Option<GradientEvent>,
    pub rf: Option<RfEvent>,
    pub adc: Option<AdcEvent>,
    pub rotation: Option<Rotation>,
}

/// Used to address one of the three gradient axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientChannel {
    X,
    Y,
    Z,
}

impl Block {
    pub fn gradient(&self, channel: GradientChannel) -> Option<&GradientEvent> {
        match channel {
            GradientChannel::X => self.gx.as_ref(),
            GradientChannel::Y => self.gy.as_ref(),
            GradientChannel::Z => self.gz.as_ref(),
        }
    }
}

/// Timing constants of the sequence, taken from its definitions section.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Internal time units per microsecond. Block edges and ADC times are
    /// given in internal units; 0 disables the conversion (plain seconds).
    pub t_factor: f64,
    /// Format version supplies an explicit RF use tag
    pub has_rf_use: bool,
    /// Unit: `us`
    pub rf_raster: f64,
    /// Unit: `us`
    pub grad_raster: f64,
    /// Unit: `T`; 0 = not defined in the sequence
    pub b0: f64,
    /// Unit: `Hz / T`
    pub gamma: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            t_factor: 1.0,
            has_rf_use: false,
            rf_raster: 1.0,
            grad_raster: 10.0,
            b0: 0.0,
            gamma: 42.576e6,
        }
    }
}
