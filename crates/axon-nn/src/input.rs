// Input — graph root that validates and shapes the external input
//
// The external tensor may come in any shape as long as its element count
// matches; it is handed on reshaped to the declared shape. An input can
// only be a root, so `connect` is refused.

use axon_core::{bail, Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::layer::{single, Layer};

/// A root node of a fixed shape.
#[derive(Debug, Clone)]
pub struct Input {
    shape: Shape,
}

impl Input {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Input {
            shape: shape.into(),
        }
    }
}

impl Layer for Input {
    fn name(&self) -> &'static str {
        "Input"
    }

    fn out_shape(&self) -> Shape {
        self.shape.clone()
    }

    fn build(&mut self, _rng: &mut dyn RngCore) -> Result<()> {
        if self.shape.dims().iter().any(|&d| d == 0) {
            bail!("Input: invalid shape {}", self.shape);
        }
        Ok(())
    }

    fn connect(&mut self, _inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        Err(Error::misuse("Input cannot be used as a hidden layer"))
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        if input.elem_count() != self.shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape: self.shape.clone(),
                expected: self.shape.elem_count(),
                got: input.elem_count(),
            });
        }
        input.reshaped(&self.shape)
    }

    fn derivative(&self, pre: &Tensor, _upstream: &[&Tensor]) -> Result<Tensor> {
        Tensor::ones(pre.shape())
    }

    fn backward(&self, _delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_input_validates_size_and_reshapes() -> Result<()> {
        let mut input = Input::new((2, 2, 1));
        input.build(&mut StdRng::seed_from_u64(0))?;
        let x = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0], 4)?;
        let y = input.forward(&[&x])?;
        assert_eq!(y.dims(), &[2, 2, 1]);
        assert_eq!(y.data(), x.data());
        assert!(input.forward(&[&Tensor::zeros(3)?]).is_err());
        Ok(())
    }

    #[test]
    fn test_input_refuses_connect() {
        let mut input = Input::new(3);
        assert!(matches!(
            input.connect(&[Shape::from(3)], &mut StdRng::seed_from_u64(0)),
            Err(Error::StructuralMisuse(_))
        ));
    }
}
