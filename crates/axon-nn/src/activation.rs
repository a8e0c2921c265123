// Activation functions
//
// Every layer applies an elementwise activation to its pre-activation
// ("neta") to produce its output. Backpropagation needs the derivative of
// that activation evaluated at the same pre-activation, so each activation
// provides both:
//
//   activate(z) = f(z)
//   derive(z)   = f'(z)
//
// Activations are small value types. Layers hold them boxed so a network
// can mix them freely; pass-through layers report `Null`.

use axon_core::Tensor;

/// An elementwise activation function together with its derivative.
pub trait Activation: std::fmt::Debug {
    /// f(x) for a single element.
    fn apply(&self, x: f64) -> f64;

    /// f'(x) for a single element, evaluated at the pre-activation.
    fn slope(&self, x: f64) -> f64;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Apply the activation to every element of `pre`.
    fn activate(&self, pre: &Tensor) -> Tensor {
        pre.map(|v, _| self.apply(v))
    }

    /// The derivative at every element of `pre`.
    fn derive(&self, pre: &Tensor) -> Tensor {
        pre.map(|v, _| self.slope(v))
    }
}

/// Identity with unit derivative.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Activation for Linear {
    fn apply(&self, x: f64) -> f64 {
        x
    }
    fn slope(&self, _x: f64) -> f64 {
        1.0
    }
    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Identity whose derivative passes its argument through unchanged.
///
/// Reported by layers that have no activation of their own (inputs and
/// structural combinators), which never use the derivative directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Null;

impl Activation for Null {
    fn apply(&self, x: f64) -> f64 {
        x
    }
    fn slope(&self, x: f64) -> f64 {
        x
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

/// ReLU(x) = max(0, x)
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Activation for Relu {
    fn apply(&self, x: f64) -> f64 {
        if x > 0.0 {
            x
        } else {
            0.0
        }
    }
    fn slope(&self, x: f64) -> f64 {
        if x > 0.0 {
            1.0
        } else {
            0.0
        }
    }
    fn name(&self) -> &'static str {
        "relu"
    }
}

/// LeakyReLU(x) = x if x > 0, else scale * x
#[derive(Debug, Clone, Copy)]
pub struct LeakyRelu {
    pub scale: f64,
}

impl LeakyRelu {
    pub fn new(scale: f64) -> Self {
        LeakyRelu { scale }
    }
}

impl Default for LeakyRelu {
    fn default() -> Self {
        LeakyRelu { scale: 0.01 }
    }
}

impl Activation for LeakyRelu {
    fn apply(&self, x: f64) -> f64 {
        if x > 0.0 {
            x
        } else {
            x * self.scale
        }
    }
    fn slope(&self, x: f64) -> f64 {
        if x > 0.0 {
            1.0
        } else {
            self.scale
        }
    }
    fn name(&self) -> &'static str {
        "leaky_relu"
    }
}

/// σ(x) = 1 / (1 + e^(-x)), σ'(x) = σ(x)(1 - σ(x))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn apply(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
    fn slope(&self, x: f64) -> f64 {
        let a = self.apply(x);
        a * (1.0 - a)
    }
    fn name(&self) -> &'static str {
        "sigmoid"
    }
}

/// tanh(x), derivative 1 / cosh²(x)
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Activation for Tanh {
    fn apply(&self, x: f64) -> f64 {
        x.tanh()
    }
    fn slope(&self, x: f64) -> f64 {
        let c = x.cosh();
        1.0 / (c * c)
    }
    fn name(&self) -> &'static str {
        "tanh"
    }
}

/// sin(x), derivative cos(x)
#[derive(Debug, Clone, Copy, Default)]
pub struct Sin;

impl Activation for Sin {
    fn apply(&self, x: f64) -> f64 {
        x.sin()
    }
    fn slope(&self, x: f64) -> f64 {
        x.cos()
    }
    fn name(&self) -> &'static str {
        "sin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn numeric_slope(act: &dyn Activation, x: f64) -> f64 {
        let h = 1e-6;
        (act.apply(x + h) - act.apply(x - h)) / (2.0 * h)
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let acts: Vec<Box<dyn Activation>> = vec![
            Box::new(Linear),
            Box::new(Relu),
            Box::new(LeakyRelu::new(0.1)),
            Box::new(Sigmoid),
            Box::new(Tanh),
            Box::new(Sin),
        ];
        for act in &acts {
            for &x in &[-2.0, -0.3, 0.4, 1.7] {
                assert_abs_diff_eq!(act.slope(x), numeric_slope(act.as_ref(), x), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_tensor_helpers() {
        let z = Tensor::from_slice(&[-1.0, 0.0, 2.0], 3).unwrap();
        assert_eq!(Relu.activate(&z).data(), &[0.0, 0.0, 2.0]);
        assert_eq!(Relu.derive(&z).data(), &[0.0, 0.0, 1.0]);
        assert_eq!(Linear.derive(&z).data(), &[1.0, 1.0, 1.0]);
        assert_eq!(Null.derive(&z), z);
        assert_eq!(LeakyRelu::new(0.5).activate(&z).data(), &[-0.5, 0.0, 2.0]);
    }

    #[test]
    fn test_sigmoid_at_zero() {
        assert_abs_diff_eq!(Sigmoid.apply(0.0), 0.5);
        assert_abs_diff_eq!(Sigmoid.slope(0.0), 0.25);
        assert_abs_diff_eq!(Tanh.slope(0.0), 1.0);
    }
}
