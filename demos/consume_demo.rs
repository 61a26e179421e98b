//! Basic demonstration of the erosion core.
//!
//! Builds a porous cuboid, consumes it to completion while printing progress
//! at each reporting increment, and dumps the surface-area series as CSV.
//!
//! Run with: cargo run --example consume_demo

use porosim::{CubeModel, Profiler, SimParams};

fn main() {
    println!("=== Porosim - Erosion Demo ===\n");

    let params = SimParams {
        xdim: 40,
        ydim: 40,
        zdim: 40,
        porosity: 0.3,
        pore_size: 3,
        record_samples: true,
        output_inc: 0.1,
        seed: Some(0xC0FFEE),
        ..Default::default()
    };
    let output_inc = params.output_inc;
    let output_end = params.output_end;
    let porosity = params.porosity;

    let mut model =
        CubeModel::with_sink(params, |msg| println!("[status] {msg}")).expect("valid parameters");

    let mut profiler = Profiler::new();

    // Carve pores first, finishing with fragment cleanup and replacement.
    if porosity > 0.0 {
        println!(
            "Removing {} cubes...",
            (model.initial_volume() as f64 * porosity).round() as u64
        );
        let mut threshold = 1.0;
        profiler.time_phase("pores", || {
            while model.produce_pores(&mut threshold).more {}
        });
        model.finish_pores();
    }

    println!(
        "\nConsuming {} cubes ({} exposed faces)...\n",
        model.initial_volume(),
        model.surface_area()
    );

    let mut threshold = output_inc;
    loop {
        let progress = profiler.time_phase("consume", || model.consume(&mut threshold));
        println!(
            "{:>3}% consumed - volume {} - surface {}",
            progress.percent,
            model.volume(),
            model.surface_area()
        );
        if !progress.more {
            break;
        }
        threshold += output_inc;
        if threshold >= output_end + output_inc {
            break;
        }
    }

    // The shell owns output formatting: one record per line.
    println!("\ncubes_removed,exposed_faces");
    let samples = model.take_samples();
    let step = (samples.len() / 10).max(1);
    for sample in samples.iter().step_by(step) {
        println!("{},{}", sample.cubes_removed, sample.exposed_faces);
    }

    profiler.print_summary();
}
