// Dense — Fully-connected layer
//
//   neta = bias + W · x
//
// where x is the predecessor's output flattened to a vector.
//
// PARAMETER SHAPES:
//
//   weights: [units, inputs]
//   bias:    [units]
//
// Both start from U(-1, 1); their momentum buffers start at zero.
//
// GRADIENTS (delta = dL/dneta, shape [units]):
//
//   dW[i, j]  = delta[i] * x[j]
//   db[i]     = delta[i]
//   dx[j]     = sum_i W[i, j] * delta[i]
//
// The affine core is shared with the recurrent layers, which run the same
// math on an input augmented with their own previous state.

use axon_core::{bail, Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::activation::Activation;
use crate::layer::{check_arity, expect_len, single, Layer, Param};

/// The affine map `bias + W · x` with its parameters and cached input.
#[derive(Debug, Clone)]
pub(crate) struct Affine {
    pub units: usize,
    pub inputs: usize,
    pub weights: Param,
    pub bias: Param,
    input: Vec<f64>,
}

impl Affine {
    pub fn new(rng: &mut dyn RngCore, inputs: usize, units: usize) -> Result<Self> {
        if inputs == 0 {
            bail!("dense: invalid input size 0");
        }
        if units == 0 {
            bail!("dense: invalid output size 0");
        }
        Ok(Affine {
            units,
            inputs,
            weights: Param::init(rng, (units, inputs))?,
            bias: Param::init(rng, units)?,
            input: vec![0.0; inputs],
        })
    }

    /// `bias + W · x`, caching `x` for the parameter update.
    pub fn forward(&mut self, x: Vec<f64>) -> Result<Tensor> {
        if x.len() != self.inputs {
            return Err(Error::ElementCountMismatch {
                shape: Shape::from(self.inputs),
                expected: self.inputs,
                got: x.len(),
            });
        }
        let w = self.weights.value.data();
        let mut out = self.bias.value.data().to_vec();
        for (i, o) in out.iter_mut().enumerate() {
            let row = &w[i * self.inputs..(i + 1) * self.inputs];
            *o += row.iter().zip(&x).map(|(a, b)| a * b).sum::<f64>();
        }
        self.input = x;
        Tensor::new(out, self.units)
    }

    /// `W^T · delta` over the whole input vector.
    pub fn input_gradient(&self, delta: &Tensor) -> Result<Vec<f64>> {
        let delta = expect_len(delta, self.units)?;
        let w = self.weights.value.data();
        let mut out = vec![0.0; self.inputs];
        for (i, &d) in delta.iter().enumerate() {
            let row = &w[i * self.inputs..(i + 1) * self.inputs];
            for (o, &wij) in out.iter_mut().zip(row) {
                *o += d * wij;
            }
        }
        Ok(out)
    }

    pub fn fit(&mut self, delta: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        let d = expect_len(delta, self.units)?;
        let mut grad = Vec::with_capacity(self.units * self.inputs);
        for &di in d {
            grad.extend(self.input.iter().map(|&xj| di * xj));
        }
        let grad = Tensor::new(grad, (self.units, self.inputs))?;
        self.weights.step(&grad, alpha, momentum)?;
        self.bias.step(delta, alpha, momentum)
    }

    pub fn parameters(&self) -> Vec<Vec<f64>> {
        vec![
            self.weights.value.data().to_vec(),
            self.bias.value.data().to_vec(),
        ]
    }

    pub fn set_parameters(&mut self, layer: &str, params: &[Vec<f64>]) -> Result<()> {
        check_arity(layer, params, 2)?;
        self.weights.load(&params[0])?;
        self.bias.load(&params[1])
    }
}

/// A fully-connected layer.
///
/// ```ignore
/// let mut g = Graph::with_seed(0);
/// let h = g.add_root(Dense::with_inputs(2, 3, Sigmoid))?;
/// let y = g.connect(Dense::new(1, Sigmoid), &[h])?;
/// ```
#[derive(Debug)]
pub struct Dense {
    units: usize,
    inputs: usize,
    activation: Box<dyn Activation>,
    core: Option<Affine>,
}

impl Dense {
    /// A dense layer whose input size comes from its predecessor.
    pub fn new(units: usize, activation: impl Activation + 'static) -> Self {
        Dense {
            units,
            inputs: 0,
            activation: Box::new(activation),
            core: None,
        }
    }

    /// A dense layer with a known input size, usable as a root.
    pub fn with_inputs(inputs: usize, units: usize, activation: impl Activation + 'static) -> Self {
        Dense {
            inputs,
            ..Dense::new(units, activation)
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    fn core(&self) -> Result<&Affine> {
        self.core
            .as_ref()
            .ok_or_else(|| Error::misuse("dense layer used before build/connect"))
    }

    fn core_mut(&mut self) -> Result<&mut Affine> {
        self.core
            .as_mut()
            .ok_or_else(|| Error::misuse("dense layer used before build/connect"))
    }
}

impl Layer for Dense {
    fn name(&self) -> &'static str {
        "Dense"
    }

    fn out_shape(&self) -> Shape {
        Shape::from(self.units)
    }

    fn build(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        self.core = Some(Affine::new(rng, self.inputs, self.units)?);
        Ok(())
    }

    fn connect(&mut self, inputs: &[Shape], rng: &mut dyn RngCore) -> Result<()> {
        self.inputs = single(self.name(), inputs)?.elem_count();
        self.build(rng)
    }

    fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let x = single(self.name(), inputs)?.data().to_vec();
        self.core_mut()?.forward(x)
    }

    fn backward(&self, delta: &Tensor, upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        let view = *single(self.name(), upstream)?;
        let core = self.core()?;
        let mut grad = core.input_gradient(delta)?;
        for (g, &d) in grad.iter_mut().zip(expect_len(view, core.inputs)?) {
            *g *= d;
        }
        Ok(vec![Tensor::new(grad, view.shape().clone())?])
    }

    fn fit(&mut self, delta: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        self.core_mut()?.fit(delta, alpha, momentum)
    }

    fn parameters(&self) -> Vec<Vec<f64>> {
        self.core.as_ref().map(Affine::parameters).unwrap_or_default()
    }

    fn set_parameters(&mut self, params: &[Vec<f64>]) -> Result<()> {
        let name = self.name();
        self.core_mut()?.set_parameters(name, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Linear, Tanh};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn built(inputs: usize, units: usize) -> Dense {
        let mut d = Dense::with_inputs(inputs, units, Linear);
        d.build(&mut StdRng::seed_from_u64(1)).unwrap();
        d
    }

    #[test]
    fn test_forward_known_weights() -> Result<()> {
        let mut d = built(2, 2);
        d.set_parameters(&[vec![1.0, 2.0, 3.0, 4.0], vec![0.5, -0.5]])?;
        let x = Tensor::from_slice(&[1.0, 1.0], 2)?;
        let y = d.forward(&[&x])?;
        assert_eq!(y.data(), &[3.5, 6.5]);
        Ok(())
    }

    #[test]
    fn test_zero_dense_gives_zero_tanh_output() -> Result<()> {
        let mut d = Dense::with_inputs(3, 4, Tanh);
        d.build(&mut StdRng::seed_from_u64(2))?;
        d.set_parameters(&[vec![0.0; 12], vec![0.0; 4]])?;
        let x = Tensor::from_slice(&[0.3, -2.0, 7.0], 3)?;
        let pre = d.forward(&[&x])?;
        assert!(pre.data().iter().all(|&v| v == 0.0));
        assert!(d.activation().activate(&pre).data().iter().all(|&v| v == 0.0));
        Ok(())
    }

    #[test]
    fn test_backward_and_fit() -> Result<()> {
        let mut d = built(2, 1);
        d.set_parameters(&[vec![2.0, -1.0], vec![0.0]])?;
        let x = Tensor::from_slice(&[1.0, 3.0], 2)?;
        d.forward(&[&x])?;
        let delta = Tensor::from_slice(&[0.5], 1)?;
        let view = Tensor::from_slice(&[1.0, 2.0], 2)?;
        let g = d.backward(&delta, &[&view])?;
        assert_eq!(g[0].data(), &[1.0, -1.0]);

        d.fit(&delta, 0.1, 0.0)?;
        let p = d.parameters();
        assert_abs_diff_eq!(p[0][0], 2.05, epsilon = 1e-12);
        assert_abs_diff_eq!(p[0][1], -0.85, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1][0], 0.05, epsilon = 1e-12);

        // Second step carries momentum * previous step.
        d.fit(&delta, 0.1, 0.5)?;
        let p = d.parameters();
        assert_abs_diff_eq!(p[1][0], 0.05 + 0.05 + 0.025, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_parameter_arity() {
        let mut d = built(2, 1);
        assert!(matches!(
            d.set_parameters(&[vec![0.0, 0.0]]),
            Err(Error::StructuralMisuse(_))
        ));
        assert!(d.set_parameters(&[vec![0.0], vec![0.0]]).is_err());
    }

    #[test]
    fn test_input_size_checked() {
        let mut d = built(3, 1);
        let x = Tensor::zeros(2).unwrap();
        assert!(d.forward(&[&x]).is_err());
    }
}
