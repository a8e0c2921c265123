//! # axon-core
//!
//! Tensor engine for Axon.
//!
//! - [`Tensor`]: dense, owned, row-major N-dimensional array of `f64`
//! - [`Shape`]: dimension extents plus row-major stride computation
//! - [`Error`] / [`Result`]: the error type shared by every Axon crate

pub mod error;
pub mod shape;
pub mod tensor;

pub use error::{Error, Result};
pub use shape::Shape;
pub use tensor::{sign, Tensor};
