// Convolution and pooling layers
//
// Images are rank-3 tensors laid out as [width, height, channels], so the
// flat offset of (x, y, c) is (x * height + y) * channels + c.
//
// Conv2D — cross-correlation without padding
//
//   out[x, y, f] = bias[x, y, f]
//                + sum_c sum_i sum_j W[f, c, i, j] * in[x*s + i, y*s + j, c]
//
//   out_w = (in_w - kw) / s + 1         out_h = (in_h - kh) / s + 1
//
// Deconv2D — the adjoint: every input cell scatters a weighted kernel patch
//
//   out[x*s + i, y*s + j, f] += W[f, c, i, j] * in[x, y, c]
//
//   out_w = (in_w - 1) * s + kw         out_h = (in_h - 1) * s + kh
//
// PARAMETER SHAPES (both):
//
//   weights: [filters, in_channels, kw, kh]
//   bias:    [out_w, out_h, filters]     one bias per output cell
//
// MaxPool2D — 2x2 windows with stride 2. Windows hanging over the right or
// bottom edge only look at the cells that exist, so
//
//   out_w = (in_w - 1) / 2 + 1          out_h = (in_h - 1) / 2 + 1
//
// The gradient of a window goes to the single cell that won it; ties go to
// the first cell in scan order (x, y), (x+1, y), (x, y+1), (x+1, y+1).

use axon_core::{bail, Error, Result, Shape, Tensor};
use rand::RngCore;

use crate::activation::Activation;
use crate::layer::{check_arity, expect_shape, single, Layer, Param};

/// Width, height and channel count of an image tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Grid {
    w: usize,
    h: usize,
    c: usize,
}

impl Grid {
    fn from_shape(layer: &str, shape: &Shape) -> Result<Self> {
        match shape.dims() {
            &[w, h, c] if w > 0 && h > 0 && c > 0 => Ok(Grid { w, h, c }),
            &[_, _, _] => Err(Error::msg(format!(
                "{layer}: input {shape} has an empty extent"
            ))),
            dims => Err(Error::RankMismatch {
                expected: 3,
                got: dims.len(),
            }),
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize, c: usize) -> usize {
        (x * self.h + y) * self.c + c
    }

    fn shape(&self) -> Shape {
        Shape::from((self.w, self.h, self.c))
    }
}

/// Kernel geometry shared by Conv2D and Deconv2D.
#[derive(Debug, Clone)]
struct Kernel {
    kw: usize,
    kh: usize,
    stride: usize,
    input: Grid,
    output: Grid,
    weights: Param,
    bias: Param,
}

impl Kernel {
    fn new(
        rng: &mut dyn RngCore,
        (kw, kh): (usize, usize),
        stride: usize,
        input: Grid,
        output: Grid,
    ) -> Result<Self> {
        Ok(Kernel {
            kw,
            kh,
            stride,
            input,
            output,
            weights: Param::init(rng, (output.c, input.c, kw, kh))?,
            bias: Param::init(rng, output.shape())?,
        })
    }

    #[inline]
    fn w(&self, f: usize, c: usize, i: usize, j: usize) -> usize {
        ((f * self.input.c + c) * self.kw + i) * self.kh + j
    }

    fn parameters(&self) -> Vec<Vec<f64>> {
        vec![
            self.weights.value.data().to_vec(),
            self.bias.value.data().to_vec(),
        ]
    }

    fn set_parameters(&mut self, layer: &str, params: &[Vec<f64>]) -> Result<()> {
        check_arity(layer, params, 2)?;
        self.weights.load(&params[0])?;
        self.bias.load(&params[1])
    }
}

fn check_geometry(layer: &str, filters: usize, kw: usize, kh: usize, stride: usize) -> Result<()> {
    if filters == 0 || kw == 0 || kh == 0 || stride == 0 {
        bail!(
            "{layer}: filters, kernel size and stride must be positive \
             (filters={filters}, kernel={kw}x{kh}, stride={stride})"
        );
    }
    Ok(())
}

/// Multiply a gradient by a derivative view of the same element count.
fn apply_view(mut grad: Vec<f64>, view: &Tensor) -> Result<Tensor> {
    if grad.len() != view.elem_count() {
        return Err(Error::ElementCountMismatch {
            shape: view.shape().clone(),
            expected: grad.len(),
            got: view.elem_count(),
        });
    }
    for (g, &d) in grad.iter_mut().zip(view.data()) {
        *g *= d;
    }
    Tensor::new(grad, view.shape().clone())
}

/// 2D convolution (cross-correlation) over a [width, height, channels] input.
#[derive(Debug)]
pub struct Conv2D {
    filters: usize,
    kernel: (usize, usize),
    stride: usize,
    input_shape: Option<Shape>,
    activation: Box<dyn Activation>,
    state: Option<Kernel>,
    input: Option<Tensor>,
}

impl Conv2D {
    /// `filters` output channels, a `kw x kh` kernel and integer `stride`.
    pub fn new(
        filters: usize,
        kw: usize,
        kh: usize,
        stride: usize,
        activation: impl Activation + 'static,
    ) -> Self {
        Conv2D {
            filters,
            kernel: (kw, kh),
            stride,
            input_shape: None,
            activation: Box::new(activation),
            state: None,
            input: None,
        }
    }

    /// A convolution with a known input shape, usable as a root.
    pub fn with_input_shape(
        input_shape: impl Into<Shape>,
        filters: usize,
        kw: usize,
        kh: usize,
        stride: usize,
        activation: impl Activation + 'static,
    ) -> Self {
        Conv2D {
            input_shape: Some(input_shape.into()),
            ..Conv2D::new(filters, kw, kh, stride, activation)
        }
    }

    fn kernel(&self) -> Result<&Kernel> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::misuse("Conv2D used before build/connect"))
    }

    fn cached_input(&self) -> Result<&Tensor> {
        self.input
            .as_ref()
            .ok_or_else(|| Error::misuse("Conv2D has no forward pass to learn from"))
    }
}

impl Layer for Conv2D {
    fn name(&self) -> &'static str {
        "Conv2D"
    }

    fn out_shape(&self) -> Shape {
        self.state
            .as_ref()
            .map(|k| k.output.shape())
            .unwrap_or_default()
    }

    fn build(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let shape = self
            .input_shape
            .clone()
            .ok_or_else(|| Error::msg("Conv2D: input shape unknown; connect it or give one"))?;
        let (kw, kh) = self.kernel;
        check_geometry(self.name(), self.filters, kw, kh, self.stride)?;
        let input = Grid::from_shape(self.name(), &shape)?;
        if kw > input.w || kh > input.h {
            // The smallest input this kernel fits.
            let fits = Shape::from((input.w.max(kw), input.h.max(kh), input.c));
            return Err(Error::shape_mismatch(&fits, &shape));
        }
        let output = Grid {
            w: (input.w - kw) / self.stride + 1,
            h: (input.h - kh) / self.stride + 1,
            c: self.filters,
        };
        self.state = Some(Kernel::new(rng, self.kernel, self.stride, input, output)?);
        Ok(())
    }

    fn connect(&mut self, inputs: &[Shape], rng: &mut dyn RngCore) -> Result<()> {
        self.input_shape = Some(single(self.name(), inputs)?.clone());
        self.build(rng)
    }

    fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        let k = self.kernel()?;
        expect_shape(&k.input.shape(), input.shape())?;
        let (inp, out) = (k.input, k.output);
        let x_in = input.data();
        let w = k.weights.value.data();
        let mut y = k.bias.value.data().to_vec();
        for x in 0..out.w {
            for yy in 0..out.h {
                for f in 0..out.c {
                    let mut acc = 0.0;
                    for c in 0..inp.c {
                        for i in 0..k.kw {
                            for j in 0..k.kh {
                                acc += w[k.w(f, c, i, j)]
                                    * x_in[inp.at(x * k.stride + i, yy * k.stride + j, c)];
                            }
                        }
                    }
                    y[out.at(x, yy, f)] += acc;
                }
            }
        }
        let y = Tensor::new(y, out.shape())?;
        self.input = Some(input.clone());
        Ok(y)
    }

    fn backward(&self, delta: &Tensor, upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        let view = *single(self.name(), upstream)?;
        let k = self.kernel()?;
        expect_shape(&k.output.shape(), delta.shape())?;
        let (inp, out) = (k.input, k.output);
        let d = delta.data();
        let w = k.weights.value.data();
        let mut grad = vec![0.0; inp.w * inp.h * inp.c];
        for x in 0..out.w {
            for y in 0..out.h {
                for f in 0..out.c {
                    let dv = d[out.at(x, y, f)];
                    for c in 0..inp.c {
                        for i in 0..k.kw {
                            for j in 0..k.kh {
                                grad[inp.at(x * k.stride + i, y * k.stride + j, c)] +=
                                    dv * w[k.w(f, c, i, j)];
                            }
                        }
                    }
                }
            }
        }
        Ok(vec![apply_view(grad, view)?])
    }

    fn fit(&mut self, delta: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        let input = self.cached_input()?.data().to_vec();
        let k = self
            .state
            .as_mut()
            .ok_or_else(|| Error::misuse("Conv2D used before build/connect"))?;
        expect_shape(&k.output.shape(), delta.shape())?;
        let (inp, out) = (k.input, k.output);
        let d = delta.data();
        let mut grad = vec![0.0; k.weights.value.elem_count()];
        for f in 0..out.c {
            for c in 0..inp.c {
                for i in 0..k.kw {
                    for j in 0..k.kh {
                        let mut acc = 0.0;
                        for x in 0..out.w {
                            for y in 0..out.h {
                                acc += input[inp.at(x * k.stride + i, y * k.stride + j, c)]
                                    * d[out.at(x, y, f)];
                            }
                        }
                        grad[k.w(f, c, i, j)] = acc;
                    }
                }
            }
        }
        let grad = Tensor::new(grad, k.weights.value.shape().clone())?;
        k.weights.step(&grad, alpha, momentum)?;
        k.bias.step(delta, alpha, momentum)
    }

    fn parameters(&self) -> Vec<Vec<f64>> {
        self.state.as_ref().map(Kernel::parameters).unwrap_or_default()
    }

    fn set_parameters(&mut self, params: &[Vec<f64>]) -> Result<()> {
        let name = self.name();
        match self.state.as_mut() {
            Some(k) => k.set_parameters(name, params),
            None => Err(Error::misuse("Conv2D used before build/connect")),
        }
    }
}

/// Transposed 2D convolution over a [width, height, channels] input.
#[derive(Debug)]
pub struct Deconv2D {
    filters: usize,
    kernel: (usize, usize),
    stride: usize,
    input_shape: Option<Shape>,
    activation: Box<dyn Activation>,
    state: Option<Kernel>,
    input: Option<Tensor>,
}

impl Deconv2D {
    pub fn new(
        filters: usize,
        kw: usize,
        kh: usize,
        stride: usize,
        activation: impl Activation + 'static,
    ) -> Self {
        Deconv2D {
            filters,
            kernel: (kw, kh),
            stride,
            input_shape: None,
            activation: Box::new(activation),
            state: None,
            input: None,
        }
    }

    /// A transposed convolution with a known input shape, usable as a root.
    pub fn with_input_shape(
        input_shape: impl Into<Shape>,
        filters: usize,
        kw: usize,
        kh: usize,
        stride: usize,
        activation: impl Activation + 'static,
    ) -> Self {
        Deconv2D {
            input_shape: Some(input_shape.into()),
            ..Deconv2D::new(filters, kw, kh, stride, activation)
        }
    }

    fn kernel(&self) -> Result<&Kernel> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::misuse("Deconv2D used before build/connect"))
    }
}

impl Layer for Deconv2D {
    fn name(&self) -> &'static str {
        "Deconv2D"
    }

    fn out_shape(&self) -> Shape {
        self.state
            .as_ref()
            .map(|k| k.output.shape())
            .unwrap_or_default()
    }

    fn build(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let shape = self
            .input_shape
            .clone()
            .ok_or_else(|| Error::msg("Deconv2D: input shape unknown; connect it or give one"))?;
        let (kw, kh) = self.kernel;
        check_geometry(self.name(), self.filters, kw, kh, self.stride)?;
        let input = Grid::from_shape(self.name(), &shape)?;
        let output = Grid {
            w: (input.w - 1) * self.stride + kw,
            h: (input.h - 1) * self.stride + kh,
            c: self.filters,
        };
        self.state = Some(Kernel::new(rng, self.kernel, self.stride, input, output)?);
        Ok(())
    }

    fn connect(&mut self, inputs: &[Shape], rng: &mut dyn RngCore) -> Result<()> {
        self.input_shape = Some(single(self.name(), inputs)?.clone());
        self.build(rng)
    }

    fn activation(&self) -> &dyn Activation {
        self.activation.as_ref()
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        let k = self.kernel()?;
        expect_shape(&k.input.shape(), input.shape())?;
        let (inp, out) = (k.input, k.output);
        let x_in = input.data();
        let w = k.weights.value.data();
        let mut y = k.bias.value.data().to_vec();
        for x in 0..inp.w {
            for yy in 0..inp.h {
                for c in 0..inp.c {
                    let v = x_in[inp.at(x, yy, c)];
                    for f in 0..out.c {
                        for i in 0..k.kw {
                            for j in 0..k.kh {
                                y[out.at(x * k.stride + i, yy * k.stride + j, f)] +=
                                    v * w[k.w(f, c, i, j)];
                            }
                        }
                    }
                }
            }
        }
        let y = Tensor::new(y, out.shape())?;
        self.input = Some(input.clone());
        Ok(y)
    }

    fn backward(&self, delta: &Tensor, upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        let view = *single(self.name(), upstream)?;
        let k = self.kernel()?;
        expect_shape(&k.output.shape(), delta.shape())?;
        let (inp, out) = (k.input, k.output);
        let d = delta.data();
        let w = k.weights.value.data();
        let mut grad = vec![0.0; inp.w * inp.h * inp.c];
        for x in 0..inp.w {
            for y in 0..inp.h {
                for c in 0..inp.c {
                    let mut acc = 0.0;
                    for f in 0..out.c {
                        for i in 0..k.kw {
                            for j in 0..k.kh {
                                acc += d[out.at(x * k.stride + i, y * k.stride + j, f)]
                                    * w[k.w(f, c, i, j)];
                            }
                        }
                    }
                    grad[inp.at(x, y, c)] = acc;
                }
            }
        }
        Ok(vec![apply_view(grad, view)?])
    }

    fn fit(&mut self, delta: &Tensor, alpha: f64, momentum: f64) -> Result<()> {
        let input = match self.input.as_ref() {
            Some(t) => t.data().to_vec(),
            None => return Err(Error::misuse("Deconv2D has no forward pass to learn from")),
        };
        let k = self
            .state
            .as_mut()
            .ok_or_else(|| Error::misuse("Deconv2D used before build/connect"))?;
        expect_shape(&k.output.shape(), delta.shape())?;
        let (inp, out) = (k.input, k.output);
        let d = delta.data();
        let mut grad = vec![0.0; k.weights.value.elem_count()];
        for f in 0..out.c {
            for c in 0..inp.c {
                for i in 0..k.kw {
                    for j in 0..k.kh {
                        let mut acc = 0.0;
                        for x in 0..inp.w {
                            for y in 0..inp.h {
                                acc += input[inp.at(x, y, c)]
                                    * d[out.at(x * k.stride + i, y * k.stride + j, f)];
                            }
                        }
                        grad[k.w(f, c, i, j)] = acc;
                    }
                }
            }
        }
        let grad = Tensor::new(grad, k.weights.value.shape().clone())?;
        k.weights.step(&grad, alpha, momentum)?;
        k.bias.step(delta, alpha, momentum)
    }

    fn parameters(&self) -> Vec<Vec<f64>> {
        self.state.as_ref().map(Kernel::parameters).unwrap_or_default()
    }

    fn set_parameters(&mut self, params: &[Vec<f64>]) -> Result<()> {
        let name = self.name();
        match self.state.as_mut() {
            Some(k) => k.set_parameters(name, params),
            None => Err(Error::misuse("Deconv2D used before build/connect")),
        }
    }
}

/// 2x2 max pooling with stride 2.
#[derive(Debug, Default)]
pub struct MaxPool2D {
    input: Grid,
    output: Grid,
    /// Flat input offset that won each output cell in the last pass.
    winners: Vec<usize>,
}

impl MaxPool2D {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input offsets chosen in the last forward pass, one per output cell.
    pub fn winners(&self) -> &[usize] {
        &self.winners
    }
}

impl Layer for MaxPool2D {
    fn name(&self) -> &'static str {
        "MaxPool2D"
    }

    fn out_shape(&self) -> Shape {
        self.output.shape()
    }

    fn connect(&mut self, inputs: &[Shape], _rng: &mut dyn RngCore) -> Result<()> {
        self.input = Grid::from_shape(self.name(), single(self.name(), inputs)?)?;
        self.output = Grid {
            w: (self.input.w - 1) / 2 + 1,
            h: (self.input.h - 1) / 2 + 1,
            c: self.input.c,
        };
        Ok(())
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Tensor> {
        let input = *single(self.name(), inputs)?;
        expect_shape(&self.input.shape(), input.shape())?;
        let (inp, out) = (self.input, self.output);
        let data = input.data();
        let mut winners = vec![0; out.w * out.h * out.c];
        let mut y = vec![0.0; winners.len()];
        for ox in 0..out.w {
            for oy in 0..out.h {
                let (x, yy) = (ox * 2, oy * 2);
                let window = [(x, yy), (x + 1, yy), (x, yy + 1), (x + 1, yy + 1)];
                for c in 0..out.c {
                    let mut best = inp.at(x, yy, c);
                    for &(wx, wy) in &window[1..] {
                        if wx < inp.w && wy < inp.h {
                            let idx = inp.at(wx, wy, c);
                            if data[best] < data[idx] {
                                best = idx;
                            }
                        }
                    }
                    let o = out.at(ox, oy, c);
                    winners[o] = best;
                    y[o] = data[best];
                }
            }
        }
        self.winners = winners;
        Tensor::new(y, out.shape())
    }

    fn forwards_derivative(&self) -> bool {
        true
    }

    fn derivative(&self, _pre: &Tensor, upstream: &[&Tensor]) -> Result<Tensor> {
        let view = *single(self.name(), upstream)?;
        let d = view.data();
        if d.len() != self.input.w * self.input.h * self.input.c {
            return Err(Error::shape_mismatch(&self.input.shape(), view.shape()));
        }
        let y = self.winners.iter().map(|&i| d[i]).collect();
        Tensor::new(y, self.output.shape())
    }

    fn backward(&self, delta: &Tensor, _upstream: &[&Tensor]) -> Result<Vec<Tensor>> {
        expect_shape(&self.output.shape(), delta.shape())?;
        let mut grad = Tensor::zeros(self.input.shape())?;
        let g = grad.data_mut();
        for (&i, &d) in self.winners.iter().zip(delta.data()) {
            g[i] += d;
        }
        Ok(vec![grad])
    }
}
