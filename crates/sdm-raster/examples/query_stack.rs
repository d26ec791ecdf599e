//! Example: Extract environmental values at a coordinate.
//!
//! Usage: cargo run --example query_stack -- <lat> <lon> [layer_dir]

use sdm_raster::RasterStack;
use std::env;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <lat> <lon> [layer_dir]", args[0]);
        eprintln!("Example: {} 32.2226 -110.9747 ./data/wc2.1_2.5m", args[0]);
        std::process::exit(1);
    }

    let lat: f64 = args[1].parse().expect("Invalid latitude");
    let lon: f64 = args[2].parse().expect("Invalid longitude");
    let layer_dir = args.get(3).map(|s| s.as_str()).unwrap_or("data/wc2.1_2.5m");

    println!("Loading raster layers from {}...", layer_dir);
    let start = Instant::now();

    let stack = RasterStack::from_directory(layer_dir).expect("Failed to load raster stack");

    println!(
        "Loaded {} bands in {:.3}s",
        stack.len(),
        start.elapsed().as_secs_f64()
    );

    let extent = stack.extent();
    println!(
        "Coverage: lat {:.2}° to {:.2}°, lon {:.2}° to {:.2}°",
        extent.min_lat, extent.max_lat, extent.min_lon, extent.max_lon
    );
    let (res_x, res_y) = stack.grid().resolution();
    println!("Resolution: {:.4}° x {:.4}°", res_x, res_y);

    println!("\nValues at ({}, {}):", lat, lon);
    match stack.extract(lat, lon) {
        Some(values) => {
            for (name, value) in stack.band_names().iter().zip(values) {
                println!("  {:<24} {:.2}", name, value);
            }
        }
        None => {
            eprintln!("No data: coordinate is outside the stack or on a missing cell");
            std::process::exit(1);
        }
    }
}
