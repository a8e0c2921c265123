// Recurrent layers
//
// Both variants are a Dense layer run on an augmented input: the raw input
// (flattened) followed by state the layer carries from its previous output.
//
//   Recurrent:   x_aug = [ raw | prev_output ]
//   Recurrent2:  x_aug = [ raw | memo | prev_output ]
//
// State becomes zeros when there is none yet. Recurrent2's memo is a
// running average of its outputs:
//
//   first output:   memo = output
//   afterwards:     memo = (memo + output) / 2
//
// State survives `Graph::reset` (that only invalidates per-pass caches) and
// is cleared by `Graph::full_reset`, which is how a caller starts a new
// sequence.
//
// Backpropagation is truncated to the current step: only the raw-input
// part of the augmented input gradient is sent to the predecessor.

use axon_core::{bail, Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::activation::Activation;
use crate::dense::Affine;
use crate::layer::{expect_len, single, Layer};

fn state_or_zeros(state: &Option<Tensor>, units: usize) -> Vec<f64> {
    match state {
        Some(t) => t.data().to_vec(),
        None => vec![0.0; units],
    }
}

fn raw_gradient(core: &Affine, raw: usize, delta: &Tensor, view: &Tensor) -> Result<Tensor> {
    let full = core.input_gradient(delta)?;
    let d = expect_len(view, raw)?;
    let grad = full[..raw].iter().zip(d).map(|(g, v)| g * v).collect();
    Tensor::new(grad, view.shape().clone())
}

/// A recurrent layer fed with its own previous output.
#[derive(Debug)]
pub struct Recurrent {
    units: usize,
    raw: usize,
    activation: Box<dyn Activation>,
    core: Option<Affine>,
    previous: Option<Tensor>,
}

impl Recurrent {
    pub fn new(units: usize, activation: impl Activation + 'static) -> Self {
        Recurrent {
            units,
            raw: 0,
            activation: Box::new(activation),
            core: None,
            previous: None,
        }
    }

    /// A recurrent layer with a known raw input size, usable as a root.
    pub fn with_inputs(inputs: usize, units: usize, activation: impl Activation + 'static) -> Self {
        Recurrent {
            raw: inputs,
            ..Recurrent::new(units, activation)
        }
    }

    /// The last activated output, if any.
    pub fn state(&self) -> Option<&Tensor> {
        self.previous.as_ref()
    }

    fn core(&self) -> Result<&Affine> {
        self.core
            .as_ref()
            .ok_or_else(|| Error::misuse("recurrent layer used before build/connect"))
    }

    fn core_mut(&mut self) -> Result<&mut Affine> {
        self.core
            .as_mut()
            .ok_or_else(|| Error::misuse("recurrent layer used before build/connect"))
    }
}

impl Layer for Recurrent {
    fn name(&self) -> &'static str {
        "Recurrent"
    }

    fn out_shape(&self) -> Shape {
        Shape::from(self.units)
    }

    fn build(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        if self.raw == 0 {
            bail!("recurrent: invalid input size 0");
        }
        self.core = Some(Affine::new(rng, self.raw + self.units, self.units)?);
        self.previous = None;
        Ok(())
    }

    fn connect(&mut self, inputs: &[Shape], rng: &mut dyn RngCore) -> Result<()> {
        self.raw = single(self.name(), inputs)?.elem_count();
        self.build(rng)
    }

    fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        let mut x = expect_len(input, self.raw)?.to_vec();
        x.extend(state_or_zeros(&self.previous, self.units));
        self.core_mut()?.forward(x)
    }

    fn backward(&self, delta: &Tensor, upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        let view = *single(self.name(), upstream)?;
        Ok(vec![raw_gradient(self.core()?, self.raw, delta, view)?])
    }

    fn fit(&mut self, delta: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        self.core_mut()?.fit(delta, alpha, momentum)
    }

    fn after_output(&mut self, output: &Tensor) -> Result<()> {
        self.previous = Some(output.clone());
        Ok(())
    }

    fn full_reset(&mut self) {
        self.previous = None;
    }

    fn parameters(&self) -> Vec<Vec<f64>> {
        self.core.as_ref().map(Affine::parameters).unwrap_or_default()
    }

    fn set_parameters(&mut self, params: &[Vec<f64>]) -> Result<()> {
        let name = self.name();
        self.core_mut()?.set_parameters(name, params)
    }
}

/// A recurrent layer fed with its previous output and a running average
/// of all its outputs since the last full reset.
#[derive(Debug)]
pub struct Recurrent2 {
    units: usize,
    raw: usize,
    activation: Box<dyn Activation>,
    core: Option<Affine>,
    memo: Option<Tensor>,
    previous: Option<Tensor>,
}

impl Recurrent2 {
    pub fn new(units: usize, activation: impl Activation + 'static) -> Self {
        Recurrent2 {
            units,
            raw: 0,
            activation: Box::new(activation),
            core: None,
            memo: None,
            previous: None,
        }
    }

    pub fn with_inputs(inputs: usize, units: usize, activation: impl Activation + 'static) -> Self {
        Recurrent2 {
            raw: inputs,
            ..Recurrent2::new(units, activation)
        }
    }

    /// The running output average.
    pub fn memo(&self) -> Option<&Tensor> {
        self.memo.as_ref()
    }

    /// The last activated output, if any.
    pub fn state(&self) -> Option<&Tensor> {
        self.previous.as_ref()
    }

    fn core(&self) -> Result<&Affine> {
        self.core
            .as_ref()
            .ok_or_else(|| Error::misuse("recurrent layer used before build/connect"))
    }

    fn core_mut(&mut self) -> Result<&mut Affine> {
        self.core
            .as_mut()
            .ok_or_else(|| Error::misuse("recurrent layer used before build/connect"))
    }
}

impl Layer for Recurrent2 {
    fn name(&self) -> &'static str {
        "Recurrent2"
    }

    fn out_shape(&self) -> Shape {
        Shape::from(self.units)
    }

    fn build(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        if self.raw == 0 {
            bail!("recurrent2: invalid input size 0");
        }
        self.core = Some(Affine::new(rng, self.raw + 2 * self.units, self.units)?);
        // A freshly built layer averages against zeros; only a full reset
        // makes the next output the memo verbatim.
        self.memo = Some(Tensor::zeros(self.units)?);
        self.previous = None;
        Ok(())
    }

    fn connect(&mut self, inputs: &[Shape], rng: &mut dyn RngCore) -> Result<()> {
        self.raw = single(self.name(), inputs)?.elem_count();
        self.build(rng)
    }

    fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        let mut x = expect_len(input, self.raw)?.to_vec();
        x.extend(state_or_zeros(&self.memo, self.units));
        x.extend(state_or_zeros(&self.previous, self.units));
        self.core_mut()?.forward(x)
    }

    fn backward(&self, delta: &Tensor, upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        let view = *single(self.name(), upstream)?;
        Ok(vec![raw_gradient(self.core()?, self.raw, delta, view)?])
    }

    fn fit(&mut self, delta: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        self.core_mut()?.fit(delta, alpha, momentum)
    }

    fn after_output(&mut self, output: &Tensor) -> Result<()> {
        self.previous = Some(output.clone());
        let memo = match self.memo.take() {
            None => output.clone(),
            Some(mut memo) => {
                memo.add_tensor(output)?;
                memo.div_scalar(2.0)?;
                memo
            }
        };
        self.memo = Some(memo);
        Ok(())
    }

    fn full_reset(&mut self) {
        self.memo = None;
        self.previous = None;
    }

    fn parameters(&self) -> Vec<Vec<f64>> {
        self.core.as_ref().map(Affine::parameters).unwrap_or_default()
    }

    fn set_parameters(&mut self, params: &[Vec<f64>]) -> Result<()> {
        let name = self.name();
        self.core_mut()?.set_parameters(name, params)
    }
}
