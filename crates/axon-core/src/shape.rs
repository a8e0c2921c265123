use std::fmt;

// Shape — N-dimensional shape representation
//
// A Shape lists the extent of each dimension of a tensor:
//   - Scalar: Shape([])          0 dimensions, 1 element
//   - Vector: Shape([5])         1 dimension, 5 elements
//   - Image:  Shape([w, h, c])   width, height, channels
//   - Kernel: Shape([f, c, kw, kh])
//
// The shape fixes the element count (product of all dims) and the
// row-major strides used to turn a multi-index into a flat offset.

/// N-dimensional shape of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix, etc.).
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    /// A scalar shape [] has 1 element.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>().max(1)
    }

    /// Compute the contiguous (row-major / C-order) strides for this shape.
    ///
    /// For shape [2, 3, 4], strides are [12, 4, 1]: the last dimension is
    /// contiguous and each earlier one jumps over everything after it.
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.rank()];
        if self.rank() > 0 {
            strides[self.rank() - 1] = 1;
            for i in (0..self.rank() - 1).rev() {
                strides[i] = strides[i + 1] * self.0[i + 1];
            }
        }
        strides
    }

    /// Size of a specific dimension.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0.get(d).copied().ok_or(crate::Error::DimOutOfRange {
            dim: d,
            rank: self.rank(),
        })
    }

    /// The shape without its leading dimension (a scalar stays a scalar).
    pub fn trailing(&self) -> Shape {
        Shape(self.0.iter().skip(1).copied().collect())
    }

    /// A new shape with `extent` prepended as the leading dimension.
    pub fn prepend(&self, extent: usize) -> Shape {
        let mut dims = Vec::with_capacity(self.rank() + 1);
        dims.push(extent);
        dims.extend_from_slice(&self.0);
        Shape(dims)
    }

    /// Leading extent, treating a scalar as a single row.
    pub fn leading(&self) -> usize {
        self.0.first().copied().unwrap_or(1)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

// Convenient conversions so callers can write `Tensor::zeros((28, 28, 1))`
// instead of `Tensor::zeros(Shape::new(vec![28, 28, 1]))`.

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(d0: usize) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(v: &[usize]) -> Self {
        Shape(v.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::from(());
        assert_eq!(s.rank(), 0);
        assert_eq!(s.elem_count(), 1);
        assert_eq!(s.stride_contiguous(), Vec::<usize>::new());
        assert_eq!(s.leading(), 1);
    }

    #[test]
    fn test_image_shape() {
        let s = Shape::from((10, 8, 3));
        assert_eq!(s.elem_count(), 240);
        assert_eq!(s.stride_contiguous(), vec![24, 3, 1]);
        assert_eq!(s.to_string(), "[10, 8, 3]");
    }

    #[test]
    fn test_trailing_and_prepend() {
        let s = Shape::from((4, 2, 3));
        assert_eq!(s.trailing(), Shape::from((2, 3)));
        assert_eq!(s.trailing().prepend(4), s);
        assert_eq!(Shape::from(5).trailing(), Shape::from(()));
    }

    #[test]
    fn test_dim_out_of_range() {
        let s = Shape::from((2, 3));
        assert_eq!(s.dim(1).unwrap(), 3);
        assert!(matches!(
            s.dim(2),
            Err(crate::Error::DimOutOfRange { dim: 2, rank: 2 })
        ));
    }
}
