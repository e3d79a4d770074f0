use ktraj::{
    adc_sample_times, AdcEvent, Block, GradientEvent, GradientShape, RfEvent, SequenceView, Timing,
};

// Builds a tiny gradient-echo style sequence by hand and prints its
// reconstructed k-space trajectory.
fn main() {
    let excitation = RfEvent {
        amplitude: 250.0,
        delay: 100.0,
        center: None,
        magnitude: vec![1.0; 100],
        phase: vec![0.0; 100],
        dwell: 10.0,
        freq_offset: 0.0,
        freq_ppm: 0.0,
        use_tag: None,
    };
    let prephaser = GradientEvent {
        amplitude: -1000.0,
        delay: 0.0,
        shape: GradientShape::Trapezoid {
            ramp_up: 100.0,
            flat: 300.0,
            ramp_down: 100.0,
        },
    };
    let readout = GradientEvent {
        amplitude: 500.0,
        delay: 0.0,
        shape: GradientShape::Trapezoid {
            ramp_up: 100.0,
            flat: 1600.0,
            ramp_down: 100.0,
        },
    };
    let adc = AdcEvent {
        num_samples: 16,
        dwell: 100_000.0,
        delay: 100.0,
        freq_offset: 0.0,
        phase_offset: 0.0,
    };

    let blocks = vec![
        Block {
            rf: Some(excitation),
            ..Block::default()
        },
        Block {
            gx: Some(prephaser),
            ..Block::default()
        },
        Block {
            gx: Some(readout),
            adc: Some(adc),
            ..Block::default()
        },
    ];
    let block_edges = [0.0, 1200.0, 1700.0, 3500.0];

    let timing = Timing::default();
    let adc_times = adc_sample_times(&blocks, &block_edges, timing.t_factor);
    let seq = SequenceView::new(&blocks, &block_edges, &adc_times, timing).unwrap();
    let traj = seq.trajectory();

    if traj.rf_use_guessed {
        println!("note: {}", traj.warning);
    }

    println!("dense trajectory ({} points):", traj.t.len());
    for ((t, kx), ky) in traj.t.iter().zip(&traj.kx).zip(&traj.ky) {
        println!("  t = {:9.6} s   kx = {kx:8.4}   ky = {ky:8.4}", t);
    }

    println!("adc samples ({} points):", traj.t_adc.len());
    for (t, kx) in traj.t_adc.iter().zip(&traj.kx_adc) {
        println!("  t = {:9.6} s   kx = {kx:8.4}", t);
    }

    println!("echo centers: {:?}", traj.kxy_zero_times(1e-3));
}
