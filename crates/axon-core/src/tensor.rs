// Tensor — dense N-dimensional array of f64
//
// A Tensor owns a flat row-major buffer together with its Shape and the
// matching row-major strides. Element (i0, i1, ..., in) lives at
//
//   offset = i0*stride[0] + i1*stride[1] + ... + in*stride[n]
//
// with stride[last] = 1 and stride[i] = stride[i+1] * shape[i+1].
//
// Everything here is eager and owned: arithmetic mutates in place, slicing
// and concatenation copy. Callers that need to keep an old value clone it
// first. Layer code in axon-nn builds its forward and backward math out of
// these primitives plus direct access to the flat buffer.

use std::fmt;

use rand::Rng;

use crate::bail;
use crate::error::{Error, Result};
use crate::shape::Shape;

/// A dense, owned, row-major N-dimensional array of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f64>,
    shape: Shape,
    stride: Vec<usize>,
}

fn check_extents(shape: &Shape) -> Result<()> {
    if shape.dims().iter().any(|&d| d == 0) {
        bail!("tensor shape {shape} has a zero-sized dimension");
    }
    Ok(())
}

impl Tensor {
    // Creation

    /// Create a tensor from raw data. `data.len()` must equal the shape's
    /// element count.
    pub fn new(data: Vec<f64>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        check_extents(&shape)?;
        let expected = shape.elem_count();
        if data.len() != expected {
            return Err(Error::ElementCountMismatch {
                shape,
                expected,
                got: data.len(),
            });
        }
        let stride = shape.stride_contiguous();
        Ok(Tensor {
            data,
            shape,
            stride,
        })
    }

    /// Create a tensor from a slice of data.
    pub fn from_slice(data: &[f64], shape: impl Into<Shape>) -> Result<Self> {
        Self::new(data.to_vec(), shape)
    }

    /// A rank-0 tensor holding a single value.
    pub fn scalar(value: f64) -> Self {
        Tensor {
            data: vec![value],
            shape: Shape::from(()),
            stride: vec![],
        }
    }

    /// A tensor with every element set to `value`.
    pub fn full(shape: impl Into<Shape>, value: f64) -> Result<Self> {
        let shape = shape.into();
        check_extents(&shape)?;
        let n = shape.elem_count();
        Self::new(vec![value; n], shape)
    }

    /// A tensor filled with zeros.
    pub fn zeros(shape: impl Into<Shape>) -> Result<Self> {
        Self::full(shape, 0.0)
    }

    /// A tensor filled with ones.
    pub fn ones(shape: impl Into<Shape>) -> Result<Self> {
        Self::full(shape, 1.0)
    }

    /// A zero tensor with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Tensor {
            data: vec![0.0; self.data.len()],
            shape: self.shape.clone(),
            stride: self.stride.clone(),
        }
    }

    /// Uniform samples in `[min, max)` using the thread-local RNG.
    pub fn rand_uniform(min: f64, max: f64, shape: impl Into<Shape>) -> Result<Self> {
        Self::rand_uniform_with(&mut rand::thread_rng(), min, max, shape)
    }

    /// Uniform samples in `[min, max)` drawn from the supplied RNG.
    pub fn rand_uniform_with<R: Rng + ?Sized>(
        rng: &mut R,
        min: f64,
        max: f64,
        shape: impl Into<Shape>,
    ) -> Result<Self> {
        if !(min <= max) {
            bail!("rand_uniform: invalid range [{min}, {max})");
        }
        let shape = shape.into();
        check_extents(&shape)?;
        let span = max - min;
        let data = (0..shape.elem_count())
            .map(|_| min + rng.gen::<f64>() * span)
            .collect();
        Self::new(data, shape)
    }

    /// Initial parameter values: uniform in `[-1, 1)`.
    pub fn weights<R: Rng + ?Sized>(rng: &mut R, shape: impl Into<Shape>) -> Result<Self> {
        Self::rand_uniform_with(rng, -1.0, 1.0, shape)
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Number of elements; always equals the product of the extents.
    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    pub fn dim(&self, d: usize) -> Result<usize> {
        self.shape.dim(d)
    }

    pub fn stride(&self) -> &[usize] {
        &self.stride
    }

    /// The flat row-major buffer.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable access to the flat buffer. The length cannot change.
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Replace the contents with `values`, keeping the shape.
    pub fn set_data(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(Error::ElementCountMismatch {
                shape: self.shape.clone(),
                expected: self.data.len(),
                got: values.len(),
            });
        }
        self.data.copy_from_slice(values);
        Ok(())
    }

    // Element access

    /// Flat offset of a multi-index.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(Error::RankMismatch {
                expected: self.rank(),
                got: index.len(),
            });
        }
        let mut offset = 0;
        for ((&i, &extent), &s) in index.iter().zip(self.dims()).zip(&self.stride) {
            if i >= extent {
                return Err(Error::IndexOutOfRange {
                    index: index.to_vec(),
                    shape: self.shape.clone(),
                });
            }
            offset += i * s;
        }
        Ok(offset)
    }

    pub fn get(&self, index: &[usize]) -> Result<f64> {
        Ok(self.data[self.flat_index(index)?])
    }

    pub fn set(&mut self, index: &[usize], value: f64) -> Result<()> {
        let i = self.flat_index(index)?;
        self.data[i] = value;
        Ok(())
    }

    pub fn get_flat(&self, index: usize) -> Result<f64> {
        self.data
            .get(index)
            .copied()
            .ok_or(Error::FlatIndexOutOfRange {
                index,
                len: self.data.len(),
            })
    }

    pub fn set_flat(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or(Error::FlatIndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    // Elementwise maps

    /// Apply `f(value, flat_index)` to every element in place.
    pub fn map_inplace<F: FnMut(f64, usize) -> f64>(&mut self, mut f: F) {
        for (i, v) in self.data.iter_mut().enumerate() {
            *v = f(*v, i);
        }
    }

    /// Fallible variant of [`Tensor::map_inplace`]. On error the tensor is
    /// left unchanged.
    pub fn try_map_inplace<F: FnMut(f64, usize) -> Result<f64>>(&mut self, mut f: F) -> Result<()> {
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(i, &v)| f(v, i))
            .collect::<Result<Vec<_>>>()?;
        self.data = data;
        Ok(())
    }

    /// A new tensor with `f(value, flat_index)` applied to every element.
    pub fn map<F: FnMut(f64, usize) -> f64>(&self, f: F) -> Tensor {
        let mut out = self.clone();
        out.map_inplace(f);
        out
    }

    /// Combine two same-shaped tensors elementwise into a new tensor.
    pub fn zip_map<F: FnMut(f64, f64) -> f64>(&self, other: &Tensor, mut f: F) -> Result<Tensor> {
        self.same_shape(other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Tensor {
            data,
            shape: self.shape.clone(),
            stride: self.stride.clone(),
        })
    }

    fn same_shape(&self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }
        Ok(())
    }

    fn binary_inplace(&mut self, other: &Tensor, op: fn(f64, f64) -> Result<f64>) -> Result<()> {
        self.same_shape(other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| op(a, b))
            .collect::<Result<Vec<_>>>()?;
        self.data = data;
        Ok(())
    }

    fn scalar_inplace(&mut self, value: f64, op: fn(f64, f64) -> Result<f64>) -> Result<()> {
        self.try_map_inplace(|a, _| op(a, value))
    }

    fn at_inplace(&mut self, index: &[usize], value: f64, op: fn(f64, f64) -> Result<f64>) -> Result<()> {
        let i = self.flat_index(index)?;
        self.data[i] = op(self.data[i], value)?;
        Ok(())
    }

    // Arithmetic (in place)
    //
    // Three flavours per operator: against another tensor of identical
    // shape, against a scalar, and against a single element.

    pub fn add_tensor(&mut self, other: &Tensor) -> Result<()> {
        self.binary_inplace(other, op_add)
    }

    pub fn sub_tensor(&mut self, other: &Tensor) -> Result<()> {
        self.binary_inplace(other, op_sub)
    }

    pub fn mul_tensor(&mut self, other: &Tensor) -> Result<()> {
        self.binary_inplace(other, op_mul)
    }

    /// Fails with [`Error::DivisionByZero`] if any divisor is zero.
    pub fn div_tensor(&mut self, other: &Tensor) -> Result<()> {
        self.binary_inplace(other, op_div)
    }

    /// Integer remainder: both operands are truncated toward zero first.
    pub fn rem_tensor(&mut self, other: &Tensor) -> Result<()> {
        self.binary_inplace(other, op_rem)
    }

    pub fn pow_tensor(&mut self, other: &Tensor) -> Result<()> {
        self.binary_inplace(other, op_pow)
    }

    pub fn add_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar_inplace(value, op_add)
    }

    pub fn sub_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar_inplace(value, op_sub)
    }

    pub fn mul_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar_inplace(value, op_mul)
    }

    pub fn div_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar_inplace(value, op_div)
    }

    pub fn rem_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar_inplace(value, op_rem)
    }

    pub fn pow_scalar(&mut self, value: f64) -> Result<()> {
        self.scalar_inplace(value, op_pow)
    }

    pub fn add_at(&mut self, index: &[usize], value: f64) -> Result<()> {
        self.at_inplace(index, value, op_add)
    }

    pub fn sub_at(&mut self, index: &[usize], value: f64) -> Result<()> {
        self.at_inplace(index, value, op_sub)
    }

    pub fn mul_at(&mut self, index: &[usize], value: f64) -> Result<()> {
        self.at_inplace(index, value, op_mul)
    }

    pub fn div_at(&mut self, index: &[usize], value: f64) -> Result<()> {
        self.at_inplace(index, value, op_div)
    }

    pub fn rem_at(&mut self, index: &[usize], value: f64) -> Result<()> {
        self.at_inplace(index, value, op_rem)
    }

    pub fn pow_at(&mut self, index: &[usize], value: f64) -> Result<()> {
        self.at_inplace(index, value, op_pow)
    }

    /// Add one to every element.
    pub fn inc(&mut self) {
        self.map_inplace(|v, _| v + 1.0);
    }

    /// Subtract one from every element.
    pub fn dec(&mut self) {
        self.map_inplace(|v, _| v - 1.0);
    }

    // Unary (new tensors)

    pub fn abs(&self) -> Tensor {
        self.map(|v, _| v.abs())
    }

    /// +1 for non-negative elements (including zero), -1 otherwise.
    pub fn sign(&self) -> Tensor {
        self.map(|v, _| sign(v))
    }

    // Reductions
    //
    // Tensors are never empty: zero extents are rejected at construction,
    // so mean, max and min always have an element to look at.

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Arithmetic mean of all elements.
    pub fn mean(&self) -> f64 {
        self.sum() / self.data.len() as f64
    }

    /// Largest element. Scanning starts from the first element, so an
    /// all-negative tensor reports its true maximum.
    pub fn max(&self) -> f64 {
        self.data[self.max_index()]
    }

    /// Flat index of the first occurrence of the largest element.
    pub fn max_index(&self) -> usize {
        let mut best = 0;
        for (i, &v) in self.data.iter().enumerate().skip(1) {
            if v > self.data[best] {
                best = i;
            }
        }
        best
    }

    /// Smallest element; see [`Tensor::max`].
    pub fn min(&self) -> f64 {
        self.data[self.min_index()]
    }

    /// Flat index of the first occurrence of the smallest element.
    pub fn min_index(&self) -> usize {
        let mut best = 0;
        for (i, &v) in self.data.iter().enumerate().skip(1) {
            if v < self.data[best] {
                best = i;
            }
        }
        best
    }

    /// Flat inner product. Element counts must agree.
    pub fn dot(&self, other: &Tensor) -> Result<f64> {
        if self.data.len() != other.data.len() {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum())
    }

    // Slicing and concatenation

    /// Copy of the `index`-th slice along the leading axis.
    /// `(4, 2, 3).get_sub_tensor(1)` has shape `(2, 3)`.
    pub fn get_sub_tensor(&self, index: usize) -> Result<Tensor> {
        if self.rank() == 0 {
            return Err(Error::RankMismatch {
                expected: 1,
                got: 0,
            });
        }
        let rows = self.dims()[0];
        if index >= rows {
            return Err(Error::IndexOutOfRange {
                index: vec![index],
                shape: self.shape.clone(),
            });
        }
        let len = self.stride[0];
        let start = index * len;
        Tensor::new(self.data[start..start + len].to_vec(), self.shape.trailing())
    }

    /// Copy of `len` consecutive leading-axis slices starting at `start`.
    pub fn narrow_leading(&self, start: usize, len: usize) -> Result<Tensor> {
        if self.rank() == 0 {
            return Err(Error::RankMismatch {
                expected: 1,
                got: 0,
            });
        }
        let rows = self.dims()[0];
        if len == 0 || start + len > rows {
            bail!(
                "narrow_leading: start {start}, len {len} out of bounds for leading extent {rows}"
            );
        }
        let row = self.stride[0];
        let mut dims = self.dims().to_vec();
        dims[0] = len;
        Tensor::new(self.data[start * row..(start + len) * row].to_vec(), dims)
    }

    /// Concatenate tensors along dimension `dim`.
    ///
    /// All tensors must share rank and every extent except `dim`. The output
    /// extent along `dim` is the sum of the inputs'.
    pub fn concat(dim: usize, tensors: &[&Tensor]) -> Result<Tensor> {
        let first = match tensors.first() {
            Some(t) => *t,
            None => return Err(Error::msg("concat: empty tensor list")),
        };
        if tensors.len() == 1 {
            return Ok(first.clone());
        }
        let rank = first.rank();
        if dim >= rank {
            return Err(Error::DimOutOfRange { dim, rank });
        }
        for t in tensors.iter().skip(1) {
            if t.rank() != rank {
                return Err(Error::RankMismatch {
                    expected: rank,
                    got: t.rank(),
                });
            }
            let agrees = (0..rank).all(|d| d == dim || t.dims()[d] == first.dims()[d]);
            if !agrees {
                // Report the shape the tensor would need, keeping its own extent at `dim`.
                let mut expected = first.dims().to_vec();
                expected[dim] = t.dims()[dim];
                return Err(Error::shape_mismatch(&Shape::from(expected), &t.shape));
            }
        }

        // Everything before `dim` is an outer loop; each tensor contributes
        // one contiguous chunk of `dims[dim] * inner` values per outer step.
        let outer: usize = first.dims()[..dim].iter().product();
        let inner: usize = first.dims()[dim + 1..].iter().product();
        let total: usize = tensors.iter().map(|t| t.dims()[dim]).sum();
        let mut data = Vec::with_capacity(outer * total * inner);
        for o in 0..outer {
            for t in tensors {
                let chunk = t.dims()[dim] * inner;
                data.extend_from_slice(&t.data[o * chunk..(o + 1) * chunk]);
            }
        }
        let mut dims = first.dims().to_vec();
        dims[dim] = total;
        Tensor::new(data, dims)
    }

    /// Stack equally shaped tensors along a new leading axis.
    pub fn stack(tensors: &[&Tensor]) -> Result<Tensor> {
        let first = match tensors.first() {
            Some(t) => *t,
            None => return Err(Error::msg("stack: empty tensor list")),
        };
        let mut data = Vec::with_capacity(first.elem_count() * tensors.len());
        for t in tensors {
            first.same_shape(t)?;
            data.extend_from_slice(&t.data);
        }
        Tensor::new(data, first.shape.prepend(tensors.len()))
    }

    // Reshaping

    /// Reinterpret the data under a new shape with the same element count.
    pub fn reshape(&mut self, shape: impl Into<Shape>) -> Result<()> {
        let shape = shape.into();
        check_extents(&shape)?;
        if shape.elem_count() != self.data.len() {
            return Err(Error::ReshapeElementMismatch {
                src: self.data.len(),
                dst: shape.elem_count(),
                dst_shape: shape,
            });
        }
        self.stride = shape.stride_contiguous();
        self.shape = shape;
        Ok(())
    }

    /// Copying variant of [`Tensor::reshape`].
    pub fn reshaped(&self, shape: impl Into<Shape>) -> Result<Tensor> {
        let mut out = self.clone();
        out.reshape(shape)?;
        Ok(out)
    }

    /// Change the shape, truncating surplus data or zero-padding missing
    /// elements at the end of the flat buffer.
    pub fn resize(&mut self, shape: impl Into<Shape>) -> Result<()> {
        let shape = shape.into();
        check_extents(&shape)?;
        self.data.resize(shape.elem_count(), 0.0);
        self.stride = shape.stride_contiguous();
        self.shape = shape;
        Ok(())
    }
}

/// Sign with `sign(0) = 1`.
pub fn sign(v: f64) -> f64 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

fn op_add(a: f64, b: f64) -> Result<f64> {
    Ok(a + b)
}

fn op_sub(a: f64, b: f64) -> Result<f64> {
    Ok(a - b)
}

fn op_mul(a: f64, b: f64) -> Result<f64> {
    Ok(a * b)
}

fn op_div(a: f64, b: f64) -> Result<f64> {
    if b == 0.0 {
        return Err(Error::DivisionByZero);
    }
    Ok(a / b)
}

fn op_rem(a: f64, b: f64) -> Result<f64> {
    let b = b.trunc();
    if b == 0.0 {
        return Err(Error::DivisionByZero);
    }
    Ok(a.trunc() % b)
}

fn op_pow(a: f64, b: f64) -> Result<f64> {
    Ok(a.powf(b))
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_dim(
            f: &mut fmt::Formatter<'_>,
            data: &[f64],
            dims: &[usize],
            stride: &[usize],
        ) -> fmt::Result {
            match dims.split_first() {
                None => write!(f, "{}", data[0]),
                Some((&extent, rest)) => {
                    write!(f, "[")?;
                    for i in 0..extent {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write_dim(f, &data[i * stride[0]..], rest, &stride[1..])?;
                    }
                    write!(f, "]")
                }
            }
        }
        write_dim(f, &self.data, self.dims(), &self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn t(data: &[f64], shape: impl Into<Shape>) -> Tensor {
        Tensor::from_slice(data, shape).unwrap()
    }

    #[test]
    fn test_new_validates_length() {
        let err = Tensor::new(vec![1.0, 2.0, 3.0], (2, 2)).unwrap_err();
        assert!(matches!(
            err,
            Error::ElementCountMismatch {
                expected: 4,
                got: 3,
                ..
            }
        ));
        assert!(Tensor::zeros((2, 0)).is_err());
    }

    #[test]
    fn test_strides_and_size() {
        let x = Tensor::zeros((4, 3, 2)).unwrap();
        assert_eq!(x.elem_count(), 24);
        assert_eq!(x.stride(), &[6, 2, 1]);
        assert_eq!(Tensor::scalar(3.0).elem_count(), 1);
    }

    #[test]
    fn test_get_set_every_index() -> Result<()> {
        let mut x = Tensor::zeros((3, 2, 2))?;
        for a in 0..3 {
            for b in 0..2 {
                for c in 0..2 {
                    let v = (a * 100 + b * 10 + c) as f64;
                    x.set(&[a, b, c], v)?;
                    assert_eq!(x.get(&[a, b, c])?, v);
                }
            }
        }
        assert_eq!(x.get_flat(5)?, 101.0);
        Ok(())
    }

    #[test]
    fn test_index_errors() {
        let mut x = Tensor::zeros((2, 2)).unwrap();
        assert!(matches!(x.get(&[2, 0]), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(x.get(&[0]), Err(Error::RankMismatch { .. })));
        assert!(matches!(
            x.set_flat(4, 1.0),
            Err(Error::FlatIndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_inplace_arithmetic() -> Result<()> {
        let mut a = t(&[1.0, 2.0, 3.0, 4.0], 4);
        let b = t(&[4.0, 3.0, 2.0, 1.0], 4);
        a.add_tensor(&b)?;
        assert_eq!(a.data(), &[5.0, 5.0, 5.0, 5.0]);
        a.mul_scalar(2.0)?;
        a.sub_at(&[1], 4.0)?;
        assert_eq!(a.data(), &[10.0, 6.0, 10.0, 10.0]);
        a.pow_scalar(2.0)?;
        assert_eq!(a.get_flat(1)?, 36.0);
        a.dec();
        a.inc();
        assert_eq!(a.get_flat(0)?, 100.0);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() {
        let mut a = Tensor::zeros((2, 2)).unwrap();
        let b = Tensor::zeros(4).unwrap();
        assert!(matches!(a.add_tensor(&b), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_division_by_zero_leaves_tensor_intact() {
        let mut a = t(&[1.0, 2.0], 2);
        let b = t(&[1.0, 0.0], 2);
        assert_eq!(a.div_tensor(&b), Err(Error::DivisionByZero));
        assert_eq!(a.data(), &[1.0, 2.0]);
        assert_eq!(a.div_scalar(0.0), Err(Error::DivisionByZero));
        assert_eq!(a.rem_scalar(0.5), Err(Error::DivisionByZero));
    }

    #[test]
    fn test_integer_remainder() -> Result<()> {
        let mut a = t(&[7.9, -7.0, 5.0], 3);
        a.rem_scalar(3.2)?;
        assert_eq!(a.data(), &[1.0, -1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_reductions() {
        let a = t(&[-3.0, -1.0, -1.0, -7.0, -7.0], 5);
        assert_eq!(a.max(), -1.0);
        assert_eq!(a.max_index(), 1);
        assert_eq!(a.min(), -7.0);
        assert_eq!(a.min_index(), 3);
        assert_eq!(a.sum(), -19.0);
        assert_eq!(a.sign().data(), &[-1.0; 5]);
        assert_eq!(Tensor::zeros(2).unwrap().sign().data(), &[1.0, 1.0]);
        assert_eq!(a.abs().sum(), 19.0);
    }

    #[test]
    fn test_dot() -> Result<()> {
        let a = t(&[1.0, 2.0, 3.0, 4.0], (2, 2));
        let b = t(&[1.0, 0.5, 2.0, 0.25], 4);
        assert_abs_diff_eq!(a.dot(&b)?, 1.0 + 1.0 + 6.0 + 1.0);
        assert!(a.dot(&Tensor::zeros(3)?).is_err());
        Ok(())
    }

    #[test]
    fn test_sub_tensor_is_a_copy() -> Result<()> {
        let x = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (3, 2));
        let mut row = x.get_sub_tensor(1)?;
        assert_eq!(row.dims(), &[2]);
        assert_eq!(row.data(), &[3.0, 4.0]);
        row.set_flat(0, 0.0)?;
        assert_eq!(x.get(&[1, 0])?, 3.0);
        assert!(x.get_sub_tensor(3).is_err());
        Ok(())
    }

    #[test]
    fn test_concat_then_slice_recovers_inputs() -> Result<()> {
        let a = t(&[1.0, 2.0, 3.0, 4.0], (2, 2));
        let b = t(&[5.0, 6.0], (1, 2));
        let c = Tensor::concat(0, &[&a, &b])?;
        assert_eq!(c.dims(), &[3, 2]);
        assert_eq!(c.narrow_leading(0, 2)?, a);
        assert_eq!(c.narrow_leading(2, 1)?, b);

        let d = t(&[9.0, 8.0], (2, 1));
        let e = Tensor::concat(1, &[&a, &d])?;
        assert_eq!(e.data(), &[1.0, 2.0, 9.0, 3.0, 4.0, 8.0]);
        Ok(())
    }

    #[test]
    fn test_concat_validation() {
        let a = Tensor::zeros((2, 2)).unwrap();
        let b = Tensor::zeros((2, 3)).unwrap();
        assert!(matches!(
            Tensor::concat(0, &[&a, &b]),
            Err(Error::ShapeMismatch { .. })
        ));
        let v = Tensor::zeros(2).unwrap();
        assert!(matches!(
            Tensor::concat(0, &[&a, &v]),
            Err(Error::RankMismatch {
                expected: 2,
                got: 1
            })
        ));
        assert!(Tensor::concat(0, &[]).is_err());
        assert!(Tensor::concat(2, &[&a, &a]).is_err());
        assert_eq!(Tensor::concat(0, &[&a]).unwrap(), a);
    }

    #[test]
    fn test_stack() -> Result<()> {
        let a = t(&[1.0, 2.0], 2);
        let b = t(&[3.0, 4.0], 2);
        let s = Tensor::stack(&[&a, &b])?;
        assert_eq!(s.dims(), &[2, 2]);
        assert_eq!(s.get_sub_tensor(1)?, b);
        Ok(())
    }

    #[test]
    fn test_reshape_strict_and_resize() -> Result<()> {
        let mut x = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3));
        x.reshape((3, 2))?;
        assert_eq!(x.stride(), &[2, 1]);
        assert!(matches!(
            x.reshape(5),
            Err(Error::ReshapeElementMismatch { src: 6, dst: 5, .. })
        ));
        x.resize(8)?;
        assert_eq!(x.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0]);
        x.resize(2)?;
        assert_eq!(x.data(), &[1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_rand_uniform_range() -> Result<()> {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let w = Tensor::weights(&mut rng, (10, 10))?;
        assert!(w.data().iter().all(|&v| (-1.0..1.0).contains(&v)));
        assert!(Tensor::rand_uniform(1.0, 0.0, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_display_nested() {
        let x = t(&[1.0, 2.0, 3.0, 4.0], (2, 2));
        assert_eq!(x.to_string(), "[[1, 2], [3, 4]]");
        assert_eq!(Tensor::scalar(0.5).to_string(), "0.5");
    }
}
