// Structural combinators — Concat, Join, SubTensor
//
// These layers only move data around, so each one applies a single
// structural transform T in three places:
//
//   forward:     T(predecessor outputs)
//   derivative:  T(predecessor derivative views)
//   backward:    T^-1(delta)            one slice per predecessor
//
//   Concat    n inputs of shape S          -> [n, ...S]        (new axis)
//   Join      inputs [a_k, ...S]           -> [sum a_k, ...S]  (leading axis)
//   SubTensor input [n, ...S], index i     -> S
//
// They cannot be roots: `build` is refused.

use axon_core::{misuse, Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::layer::{expect_shape, single, Layer};

fn at_least_one(layer: &str, inputs: &[Shape]) -> Result<()> {
    if inputs.is_empty() {
        misuse!("{layer} needs at least one predecessor");
    }
    Ok(())
}

/// Stack equally shaped predecessors along a new leading axis.
#[derive(Debug, Clone, Default)]
pub struct Concat {
    input: Shape,
    count: usize,
}

impl Concat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Concat {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn out_shape(&self) -> Shape {
        self.input.prepend(self.count)
    }

    fn connect(&mut self, inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        at_least_one(self.name(), inputs)?;
        for shape in &inputs[1..] {
            expect_shape(&inputs[0], shape)?;
        }
        self.input = inputs[0].clone();
        self.count = inputs.len();
        Ok(())
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        for t in inputs {
            expect_shape(&self.input, t.shape())?;
        }
        Tensor::stack(inputs)
    }

    fn forwards_derivative(&self) -> bool {
        true
    }

    fn derivative(&self, _pre: &Tensor, upstream: &[&Tensor]) -> Result<Tensor> {
        let views = upstream
            .iter()
            .map(|v| v.reshaped(&self.input))
            .collect::<Result<Vec<_>>>()?;
        Tensor::stack(&views.iter().collect::<Vec<_>>())
    }

    fn backward(&self, delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        expect_shape(&self.out_shape(), delta.shape())?;
        (0..self.count).map(|k| delta.get_sub_tensor(k)).collect()
    }
}

/// Concatenate predecessors along their existing leading axis.
#[derive(Debug, Clone, Default)]
pub struct Join {
    trailing: Shape,
    extents: Vec<usize>,
}

impl Join {
    pub fn new() -> Self {
        Self::default()
    }

    fn input_shape(&self, extent: usize) -> Shape {
        self.trailing.prepend(extent)
    }
}

impl Layer for Join {
    fn name(&self) -> &'static str {
        "Join"
    }

    fn out_shape(&self) -> Shape {
        self.input_shape(self.extents.iter().sum())
    }

    fn connect(&mut self, inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        at_least_one(self.name(), inputs)?;
        let mut extents = Vec::with_capacity(inputs.len());
        for shape in inputs {
            if shape.rank() == 0 {
                return Err(Error::RankMismatch {
                    expected: 1,
                    got: 0,
                });
            }
            if shape.trailing() != inputs[0].trailing() {
                let expected = inputs[0].trailing().prepend(shape.leading());
                return Err(Error::shape_mismatch(&expected, shape));
            }
            extents.push(shape.leading());
        }
        self.trailing = inputs[0].trailing();
        self.extents = extents;
        Ok(())
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        if inputs.len() != self.extents.len() {
            misuse!(
                "Join connected to {} predecessors, got {} inputs",
                self.extents.len(),
                inputs.len()
            );
        }
        for (t, &extent) in inputs.iter().zip(&self.extents) {
            expect_shape(&self.input_shape(extent), t.shape())?;
        }
        Tensor::concat(0, inputs)
    }

    fn forwards_derivative(&self) -> bool {
        true
    }

    fn derivative(&self, _pre: &Tensor, upstream: &[&Tensor]) -> Result<Tensor> {
        let views = upstream
            .iter()
            .zip(&self.extents)
            .map(|(v, &extent)| v.reshaped(self.input_shape(extent)))
            .collect::<Result<Vec<_>>>()?;
        Tensor::concat(0, &views.iter().collect::<Vec<_>>())
    }

    fn backward(&self, delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        expect_shape(&self.out_shape(), delta.shape())?;
        let mut start = 0;
        let mut grads = Vec::with_capacity(self.extents.len());
        for &extent in &self.extents {
            grads.push(delta.narrow_leading(start, extent)?);
            start += extent;
        }
        Ok(grads)
    }
}

/// Select one slice of the predecessor's output along the leading axis.
#[derive(Debug, Clone)]
pub struct SubTensor {
    index: usize,
    input: Shape,
}

impl SubTensor {
    pub fn new(index: usize) -> Self {
        SubTensor {
            index,
            input: Shape::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Layer for SubTensor {
    fn name(&self) -> &'static str {
        "SubTensor"
    }

    fn out_shape(&self) -> Shape {
        self.input.trailing()
    }

    fn connect(&mut self, inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        let input = single(self.name(), inputs)?;
        if input.rank() == 0 {
            return Err(Error::RankMismatch {
                expected: 1,
                got: 0,
            });
        }
        if self.index >= input.leading() {
            return Err(Error::IndexOutOfRange {
                index: vec![self.index],
                shape: input.clone(),
            });
        }
        self.input = input.clone();
        Ok(())
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        expect_shape(&self.input, input.shape())?;
        input.get_sub_tensor(self.index)
    }

    fn forwards_derivative(&self) -> bool {
        true
    }

    fn derivative(&self, _pre: &Tensor, upstream: &[&Tensor]) -> Result<Tensor> {
        single(self.name(), upstream)?
            .reshaped(&self.input)?
            .get_sub_tensor(self.index)
    }

    fn backward(&self, delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        let slice = self.out_shape().elem_count();
        let d = delta.data();
        if d.len() != slice {
            return Err(Error::shape_mismatch(&self.out_shape(), delta.shape()));
        }
        let mut grad = Tensor::zeros(&self.input)?;
        let offset = self.index * slice;
        grad.data_mut()[offset..offset + slice].copy_from_slice(d);
        Ok(vec![grad])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    #[test]
    fn test_concat_stacks_and_splits() -> Result<()> {
        let mut c = Concat::new();
        c.connect(&[Shape::from(2), Shape::from(2)], &mut rng())?;
        assert_eq!(c.out_shape(), Shape::from((2, 2)));
        let a = Tensor::from_slice(&[1.0, 2.0], 2)?;
        let b = Tensor::from_slice(&[3.0, 4.0], 2)?;
        let y = c.forward(&[&a, &b])?;
        assert_eq!(y.data(), &[1.0, 2.0, 3.0, 4.0]);
        let g = c.backward(&y, &[])?;
        assert_eq!(g, vec![a, b]);
        Ok(())
    }

    #[test]
    fn test_concat_rejects_unequal_shapes() {
        let mut c = Concat::new();
        assert!(matches!(
            c.connect(&[Shape::from(2), Shape::from(3)], &mut rng()),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(c.connect(&[], &mut rng()).is_err());
        assert!(matches!(c.build(&mut rng()), Err(Error::StructuralMisuse(_))));
    }

    #[test]
    fn test_join_concatenates_leading_axis() -> Result<()> {
        let mut j = Join::new();
        j.connect(&[Shape::from((1, 2)), Shape::from((2, 2))], &mut rng())?;
        assert_eq!(j.out_shape(), Shape::from((3, 2)));
        let a = Tensor::from_slice(&[1.0, 2.0], (1, 2))?;
        let b = Tensor::from_slice(&[3.0, 4.0, 5.0, 6.0], (2, 2))?;
        let y = j.forward(&[&a, &b])?;
        assert_eq!(y.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(j.backward(&y, &[])?, vec![a, b]);
        assert_eq!(
            j.connect(&[Shape::from((1, 2)), Shape::from((1, 3))], &mut rng()),
            Err(Error::ShapeMismatch {
                expected: Shape::from((1, 2)),
                got: Shape::from((1, 3)),
            })
        );
        Ok(())
    }

    #[test]
    fn test_subtensor_scatter_offset() -> Result<()> {
        let mut s = SubTensor::new(2);
        s.connect(&[Shape::from((3, 2))], &mut rng())?;
        assert_eq!(s.out_shape(), Shape::from(2));
        let x = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (3, 2))?;
        assert_eq!(s.forward(&[&x])?.data(), &[5.0, 6.0]);
        let g = s.backward(&Tensor::from_slice(&[7.0, 8.0], 2)?, &[])?.remove(0);
        assert_eq!(g.data(), &[0.0, 0.0, 0.0, 0.0, 7.0, 8.0]);
        assert!(SubTensor::new(3)
            .connect(&[Shape::from((3, 2))], &mut rng())
            .is_err());
        Ok(())
    }

    #[test]
    fn test_derivative_views_follow_the_data() -> Result<()> {
        let mut s = SubTensor::new(1);
        s.connect(&[Shape::from((2, 2))], &mut rng())?;
        let view = Tensor::from_slice(&[0.1, 0.2, 0.3, 0.4], (2, 2))?;
        let pre = Tensor::zeros(2)?;
        assert_eq!(s.derivative(&pre, &[&view])?.data(), &[0.3, 0.4]);
        Ok(())
    }
}
