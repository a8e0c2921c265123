// Checkpoint round trip — save a trained model, load it into a fresh one
//
// Trains a small model on a toy regression, writes its weights as JSON and
// as binary, and loads each file into a differently initialised model of
// the same topology. The loaded models reproduce the predictions exactly.

use axon::checkpoint::{self, CheckpointError};
use axon::prelude::*;

fn model(seed: u64) -> Result<Sequential> {
    let mut m = Sequential::with_seed(seed);
    m.add_layer(Input::new(3))?;
    m.add_layer(Dense::new(4, Tanh))?;
    m.add_layer(Dense::new(2, Sigmoid))?;
    Ok(m)
}

fn main() -> std::result::Result<(), CheckpointError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    println!("=== Axon — Checkpoint round trip ===");
    println!();

    let inputs = (0..16)
        .map(|i| {
            let t = i as f64 / 16.0;
            Tensor::from_slice(&[t, 1.0 - t, (t * 6.0).sin()], 3)
        })
        .collect::<Result<Vec<_>>>()?;
    let targets = inputs
        .iter()
        .map(|x| {
            let d = x.data();
            Tensor::from_slice(&[0.5 + 0.4 * d[2], d[0]], 2)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut trained = model(1)?;
    let cfg = TrainConfig::default().alpha(0.05).epochs(2000);
    let loss = trained.train(&inputs, &targets, l2, &cfg)?;
    println!("Trained, final mean |loss| {loss:.5}");

    let snapshot = trained.get_model_weights()?;
    let dir = std::env::temp_dir();
    let json_path = dir.join("axon_demo.json");
    let bin_path = dir.join("axon_demo.axws");
    checkpoint::save_json(&json_path, &snapshot)?;
    checkpoint::save_bin(&bin_path, &snapshot)?;
    println!(
        "Saved {} parameters to {} and {}",
        snapshot.num_parameters(),
        json_path.display(),
        bin_path.display()
    );

    let sample = &inputs[5];
    let expected = trained.predict(sample)?;
    for (label, loaded) in [
        ("json", checkpoint::load_json(&json_path)?),
        ("binary", checkpoint::load_bin(&bin_path)?),
    ] {
        let mut fresh = model(99)?;
        let before = fresh.predict(sample)?;
        fresh.set_model_weights(&loaded)?;
        let after = fresh.predict(sample)?;
        println!("  {label:<6} before {before}  after {after}  identical: {}", after == expected);
    }

    std::fs::remove_file(&json_path)?;
    std::fs::remove_file(&bin_path)?;
    Ok(())
}
