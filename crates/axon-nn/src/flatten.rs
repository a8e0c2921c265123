// Flatten / Reshape — reinterpret the predecessor's output under a new shape
//
// Neither layer owns parameters. The data is unchanged, only the shape
// differs, so the derivative view and the backward pass are the same
// reshape applied to the predecessor's view and to the incoming gradient.
//
//   Flatten:  [w, h, c]  ->  [w*h*c]
//   Reshape:  any shape with the same element count

use axon_core::{Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::layer::{single, Layer};

/// Collapse the predecessor's output into a vector.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    input: Shape,
    output: Shape,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Flatten {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn out_shape(&self) -> Shape {
        self.output.clone()
    }

    fn connect(&mut self, inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        self.input = single(self.name(), inputs)?.clone();
        self.output = Shape::from(self.input.elem_count());
        Ok(())
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        single(self.name(), inputs)?.reshaped(&self.output)
    }

    fn forwards_derivative(&self) -> bool {
        true
    }

    fn derivative(&self, _pre: &Tensor, upstream: &[&Tensor]) -> Result<Tensor> {
        single(self.name(), upstream)?.reshaped(&self.output)
    }

    fn backward(&self, delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![delta.reshaped(&self.input)?])
    }
}

/// Give the predecessor's output an arbitrary shape of equal size.
#[derive(Debug, Clone)]
pub struct Reshape {
    input: Shape,
    output: Shape,
}

impl Reshape {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Reshape {
            input: Shape::default(),
            output: shape.into(),
        }
    }
}

impl Layer for Reshape {
    fn name(&self) -> &'static str {
        "Reshape"
    }

    fn out_shape(&self) -> Shape {
        self.output.clone()
    }

    fn connect(&mut self, inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        let input = single(self.name(), inputs)?;
        if input.elem_count() != self.output.elem_count() {
            return Err(Error::ReshapeElementMismatch {
                src: input.elem_count(),
                dst: self.output.elem_count(),
                dst_shape: self.output.clone(),
            });
        }
        self.input = input.clone();
        Ok(())
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        single(self.name(), inputs)?.reshaped(&self.output)
    }

    fn forwards_derivative(&self) -> bool {
        true
    }

    fn derivative(&self, _pre: &Tensor, upstream: &[&Tensor]) -> Result<Tensor> {
        single(self.name(), upstream)?.reshaped(&self.output)
    }

    fn backward(&self, delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![delta.reshaped(&self.input)?])
    }
}
