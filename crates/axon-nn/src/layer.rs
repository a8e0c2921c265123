// Layer trait — local math of one node in the layer graph
//
// A network is a DAG of layers owned by a `Graph`. The graph handles the
// shared bookkeeping (memoization, fan-in accumulation, traversal order,
// snapshots); each `Layer` only supplies the math that is specific to its
// variant:
//
//   connect/build   infer shapes and allocate parameters
//   forward         predecessor outputs -> pre-activation ("neta")
//   derivative      derivative view handed to successors
//   backward        gradient w.r.t. own neta -> gradient per predecessor
//   fit             momentum-SGD step using the cached input
//
// GRADIENT CONVENTION:
//
// The gradient a node receives (its "delta") is taken w.r.t. its own
// pre-activation. A node turns it into a predecessor's delta by applying
// its local Jacobian transposed and multiplying by the predecessor's
// derivative view:
//
//   delta_pred = (J^T · delta) ⊙ derivative(pred)
//
// Parameterized layers and inputs report `activation'(neta)` as their
// derivative view. Structural layers (flatten, reshape, concat, join,
// sub-tensor, max-pool) have the identity activation, so they forward
// their predecessors' views through the same transform as the data and
// their backward pass is purely structural.

use axon_core::{misuse, Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::activation::{Activation, Null};

/// The per-variant contract of a graph node.
pub trait Layer: std::fmt::Debug {
    /// Short type name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Output shape. Only meaningful once built or connected.
    fn out_shape(&self) -> Shape;

    /// Initialise as a root node (no predecessors).
    fn build(&mut self, _rng: &mut dyn RngCore) -> Result<()> {
        Err(Error::misuse(format!(
            "{} cannot be a root layer; connect it to a predecessor",
            self.name()
        )))
    }

    /// Initialise from the output shapes of the predecessors.
    fn connect(&mut self, inputs: &[Shape], rng: &mut dyn RngCore) -> Result<()>;

    /// The activation applied to this layer's pre-activation.
    fn activation(&self) -> &dyn Activation {
        &Null
    }

    /// Compute the pre-activation from the (already activated) outputs of
    /// the predecessors, or from the external input for a root. The layer
    /// keeps whatever it needs for `backward` and `fit`.
    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor>;

    /// Whether `derivative` needs the predecessors' derivative views.
    fn forwards_derivative(&self) -> bool {
        false
    }

    /// Derivative view for successors. `upstream` holds the predecessors'
    /// views when `forwards_derivative` is true and is empty otherwise.
    fn derivative(&self, pre: &Tensor, _upstream: &[&Tensor]) -> Result<Tensor> {
        Ok(self.activation().derive(pre))
    }

    /// Gradients for every predecessor, in predecessor order.
    fn backward(&self, delta: &Tensor, upstream: &[&Tensor]) -> Result<Vec<Tensor>>;

    /// Apply one momentum-SGD step from the accumulated `delta`.
    fn fit(&mut self, _delta: &Tensor, _alpha: f64, _momentum: f64) -> Result<()> {
        Ok(())
    }

    /// Called once per pass with the activated output.
    fn after_output(&mut self, _output: &Tensor) -> Result<()> {
        Ok(())
    }

    /// Forget state that persists across passes (recurrent memory).
    fn full_reset(&mut self) {}

    /// Flat copies of every parameter tensor, in a fixed order.
    fn parameters(&self) -> Vec<Vec<f64>> {
        Vec::new()
    }

    /// Overwrite parameters from flat data in `parameters()` order.
    fn set_parameters(&mut self, params: &[Vec<f64>]) -> Result<()> {
        check_arity(self.name(), params, 0)
    }
}

/// A trainable tensor paired with the previous update step.
#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub value: Tensor,
    pub previous: Tensor,
}

impl Param {
    /// Uniform U(-1, 1) values with zero momentum.
    pub fn init(rng: &mut dyn RngCore, shape: impl Into<Shape>) -> Result<Self> {
        let value = Tensor::weights(rng, shape)?;
        let previous = value.zeros_like();
        Ok(Param { value, previous })
    }

    /// `step = alpha * grad; value += step + momentum * previous; previous = step`
    pub fn step(&mut self, grad: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        if grad.elem_count() != self.value.elem_count() {
            return Err(Error::shape_mismatch(self.value.shape(), grad.shape()));
        }
        let value = self.value.data_mut();
        let previous = self.previous.data_mut();
        for ((w, m), &g) in value.iter_mut().zip(previous.iter_mut()).zip(grad.data()) {
            let step = alpha * g;
            *w += step + *m * momentum;
            *m = step;
        }
        Ok(())
    }

    pub fn load(&mut self, data: &[f64]) -> Result<()> {
        self.value.set_data(data)
    }
}

/// Check that exactly `expected` parameter records were supplied.
pub(crate) fn check_arity(layer: &str, params: &[Vec<f64>], expected: usize) -> Result<()> {
    if params.len() != expected {
        misuse!(
            "{layer} expects {expected} parameter tensors, snapshot has {}",
            params.len()
        );
    }
    Ok(())
}

/// The single input of a one-predecessor layer.
pub(crate) fn single<'a, T>(layer: &str, items: &'a [T]) -> Result<&'a T> {
    match items {
        [one] => Ok(one),
        _ => Err(Error::misuse(format!(
            "{layer} takes exactly one input, got {}",
            items.len()
        ))),
    }
}

/// Fail unless `got` has exactly the `expected` shape.
pub(crate) fn expect_shape(expected: &Shape, got: &Shape) -> Result<()> {
    if expected != got {
        return Err(Error::shape_mismatch(expected, got));
    }
    Ok(())
}

/// Fail unless `t` has exactly `expected` elements; returns its flat data.
pub(crate) fn expect_len<'a>(t: &'a Tensor, expected: usize) -> Result<&'a [f64]> {
    if t.elem_count() != expected {
        return Err(Error::ElementCountMismatch {
            shape: t.shape().clone(),
            expected,
            got: t.elem_count(),
        });
    }
    Ok(t.data())
}
