// Convolution diagonals — tell "\" lines from "/" lines
//
// Each sample is a 10×10 gray image with one diagonal stroke, shifted
// across the image. Main diagonals are labelled +0.8, anti-diagonals -0.8.
//
// Architecture:
//   Input(10,10,1) → Conv2D(4 filters, 2×2, tanh) → MaxPool2D
//                  → Conv2D(4 filters, 2×2, tanh) → MaxPool2D
//                  → Flatten → Dense(1, tanh)

use axon::prelude::*;

const SIZE: usize = 10;

/// A stroke of `len` cells starting at (x0, y0) going down-right or up-right.
fn stroke(x0: usize, y0: usize, len: usize, main: bool) -> Result<Tensor> {
    let mut img = Tensor::zeros((SIZE, SIZE, 1))?;
    for k in 0..len {
        let x = x0 + k;
        let y = if main { y0 + k } else { y0 + len - 1 - k };
        if x < SIZE && y < SIZE {
            img.set(&[x, y, 0], 1.0)?;
        }
    }
    Ok(img)
}

fn main() -> axon::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Axon — Convolution diagonals ===");
    println!();

    let mut inputs = Vec::new();
    let mut targets = Vec::new();
    for x0 in 0..4 {
        for y0 in 0..4 {
            for main in [true, false] {
                inputs.push(stroke(x0, y0, 6, main)?);
                targets.push(Tensor::from_slice(&[if main { 0.8 } else { -0.8 }], 1)?);
            }
        }
    }
    println!("{} training images", inputs.len());

    let mut model = Sequential::with_seed(3);
    model.add_layer(Input::new((SIZE, SIZE, 1)))?;
    model.add_layer(Conv2D::new(4, 2, 2, 1, Tanh))?;
    model.add_layer(MaxPool2D::new())?;
    model.add_layer(Conv2D::new(4, 2, 2, 1, Tanh))?;
    model.add_layer(MaxPool2D::new())?;
    model.add_layer(Flatten::new())?;
    model.add_layer(Dense::new(1, Tanh))?;

    for &id in model.layers() {
        let layer = model.graph().layer(id)?;
        println!("  {:<10} → {}", layer.name(), layer.out_shape());
    }
    println!();

    let cfg = TrainConfig::default()
        .alpha(0.002)
        .momentum(0.5)
        .epochs(300)
        .shuffle(true)
        .seed(11)
        .verbosity(1);
    let loss = model.train(&inputs, &targets, l1, &cfg)?;
    println!("Final mean |loss|: {loss:.4}");

    let mut correct = 0;
    for (x, t) in inputs.iter().zip(&targets) {
        let y = model.predict(x)?.data()[0];
        if (y > 0.0) == (t.data()[0] > 0.0) {
            correct += 1;
        }
    }
    println!("Accuracy: {correct}/{}", inputs.len());

    let unseen = stroke(2, 1, 7, false)?;
    println!("Unseen anti-diagonal → {:.3}", model.predict(&unseen)?.data()[0]);
    Ok(())
}
