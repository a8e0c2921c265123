// XOR — the smallest problem that needs a hidden layer
//
// Architecture: Dense(2 -> 3, sigmoid) -> Dense(3 -> 1, sigmoid)
//
// Trained with plain momentum SGD on the L1 signal, one sample at a time.
// Run with RUST_LOG=debug to see every sample.

use axon::prelude::*;

fn main() -> axon::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Axon — XOR ===");
    println!();

    let xs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let ys = [0.0, 1.0, 1.0, 0.0];
    let inputs = xs
        .iter()
        .map(|x| Tensor::from_slice(x, 2))
        .collect::<Result<Vec<_>>>()?;
    let targets = ys
        .iter()
        .map(|&y| Tensor::from_slice(&[y], 1))
        .collect::<Result<Vec<_>>>()?;

    let mut model = Sequential::with_seed(42);
    model.add_layer(Dense::with_inputs(2, 3, Sigmoid))?;
    model.add_layer(Dense::new(1, Sigmoid))?;

    let before = model.get_model_weights()?.num_parameters();
    println!("Network: Dense(2→3) → Dense(3→1), {before} parameters");
    println!();

    let cfg = TrainConfig::default()
        .alpha(0.01)
        .momentum(0.5)
        .epochs(100_000)
        .shuffle(true)
        .seed(7);
    let loss = model.train(&inputs, &targets, l1, &cfg)?;
    println!("Final mean |loss|: {loss:.6}");
    println!();

    for (x, t) in inputs.iter().zip(&targets) {
        let y = model.predict(x)?;
        println!(
            "  ({}, {}) → {:.4}  (target {})",
            x.data()[0],
            x.data()[1],
            y.data()[0],
            t.data()[0]
        );
    }
    Ok(())
}
