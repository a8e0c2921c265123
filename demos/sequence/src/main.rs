// Sequence — next-value prediction with recurrent layers
//
// A sampled sine wave is fed one value at a time. The recurrent layers
// carry their previous output (and, for Recurrent2, a running average) from
// step to step; `full_reset` clears that state between passes over the
// sequence.
//
// Architecture: Input(1) → Recurrent(8, tanh) → Recurrent2(4, tanh) → Dense(1, tanh)

use axon::prelude::*;

const STEPS: usize = 60;
const EPOCHS: usize = 300;

fn main() -> axon::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Axon — Recurrent sequence ===");
    println!();

    let wave: Vec<f64> = (0..=STEPS).map(|i| 0.8 * (i as f64 * 0.3).sin()).collect();

    let mut model = Sequential::with_seed(5);
    model.add_layer(Input::new(1))?;
    model.add_layer(Recurrent::new(8, Tanh))?;
    model.add_layer(Recurrent2::new(4, Tanh))?;
    model.add_layer(Dense::new(1, Tanh))?;

    for epoch in 0..EPOCHS {
        model.full_reset()?;
        let mut total = 0.0;
        for t in 0..STEPS {
            let x = Tensor::from_slice(&wave[t..t + 1], 1)?;
            let y = Tensor::from_slice(&wave[t + 1..t + 2], 1)?;
            total += model.train_one(&x, &y, 0.01, 0.5, l1)?.abs().mean();
        }
        if epoch % 50 == 0 || epoch + 1 == EPOCHS {
            log::info!("epoch {}: mean |loss| {:.5}", epoch + 1, total / STEPS as f64);
        }
    }

    model.full_reset()?;
    println!("  t    actual   predicted");
    for t in 0..12 {
        let x = Tensor::from_slice(&wave[t..t + 1], 1)?;
        let y = model.predict(&x)?;
        println!("  {:<4} {:>7.3}  {:>8.3}", t + 1, wave[t + 1], y.data()[0]);
    }
    Ok(())
}
