//! # axon-nn
//!
//! Layer graph, losses and training loop for Axon.
//!
//! 1. **Activation**: elementwise function plus derivative, chosen per layer
//! 2. **Layer**: the per-variant math of one graph node (Dense, Conv2D, ...)
//! 3. **Graph**: arena that owns the layers, memoizes each pass and runs
//!    backpropagation over the DAG
//! 4. **Losses**: per-element training signals injected at the sink
//! 5. **Sequential**: a chain of layers with `predict`/`train` and weight
//!    snapshots
//!
//! Gradients are hand-coded per layer; there is no expression tracing.

pub mod activation;
pub mod combine;
pub mod config;
pub mod conv;
pub mod dense;
pub mod flatten;
pub mod graph;
pub mod input;
pub mod layer;
pub mod loss;
pub mod rnn;
pub mod sequential;
pub mod snapshot;

pub use activation::{Activation, LeakyRelu, Linear, Null, Relu, Sigmoid, Sin, Tanh};
pub use combine::{Concat, Join, SubTensor};
pub use config::TrainConfig;
pub use conv::{Conv2D, Deconv2D, MaxPool2D};
pub use dense::Dense;
pub use flatten::{Flatten, Reshape};
pub use graph::{Graph, LayerId};
pub use input::Input;
pub use layer::Layer;
pub use loss::{binary_cross_entropy, cross_entropy, kullback_leibler, l1, l2, l3, LossFn};
pub use rnn::{Recurrent, Recurrent2};
pub use sequential::Sequential;
pub use snapshot::WeightSnapshot;
