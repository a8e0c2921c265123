//! # Axon
//!
//! A small neural-network library built from scratch in Rust.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ```rust
//! use axon::prelude::*;
//!
//! # fn main() -> axon::Result<()> {
//! let mut model = Sequential::with_seed(0);
//! model.add_layer(Dense::with_inputs(2, 3, Sigmoid))?;
//! model.add_layer(Dense::new(1, Sigmoid))?;
//! let y = model.predict(&Tensor::from_slice(&[0.0, 1.0], 2)?)?;
//! assert_eq!(y.dims(), &[1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `axon-core` | Tensor, Shape, Error |
//! | `axon-nn` | Activations, layers, Graph, losses, Sequential |
//!
//! ## Modules
//!
//! - [`checkpoint`]: JSON and binary encodings of weight snapshots
//! - `image`: tensor <-> raster image conversion (feature `image`)

/// Re-export core types.
pub use axon_core::{sign, Error, Result, Shape, Tensor};

/// Re-export the layer graph and everything built on it.
pub mod nn {
    pub use axon_nn::*;
}

/// Save and load weight snapshots.
pub mod checkpoint;

/// Convert between tensors and images.
#[cfg(feature = "image")]
pub mod image;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::checkpoint::CheckpointError;
    pub use crate::nn::loss::{
        binary_cross_entropy, cross_entropy, kullback_leibler, l1, l2, l3, LossFn,
    };
    pub use crate::nn::{
        Activation, Concat, Conv2D, Deconv2D, Dense, Flatten, Graph, Input, Join, Layer, LayerId,
        LeakyRelu, Linear, MaxPool2D, Null, Recurrent, Recurrent2, Relu, Reshape, Sequential,
        Sigmoid, Sin, SubTensor, Tanh, TrainConfig, WeightSnapshot,
    };
    pub use crate::{Error, Result, Shape, Tensor};
}
