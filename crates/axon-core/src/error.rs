use crate::shape::Shape;

/// All errors that can occur within Axon.
///
/// Shape problems, indexing problems, arithmetic faults and misuse of the
/// layer graph all go through this one type so `?` works everywhere.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Two tensors were required to have identical shapes.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Operation requires a specific rank (number of dimensions).
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// Dimension index out of range for the tensor's rank.
    #[error("dimension out of range: dim {dim} for tensor with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// Element count mismatch when creating from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Cannot reshape because element counts differ.
    #[error(
        "cannot reshape: source has {src} elements, target shape {dst_shape} has {dst} elements"
    )]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// Multi-dimensional index outside the tensor's extents.
    #[error("index {index:?} out of range for shape {shape}")]
    IndexOutOfRange { index: Vec<usize>, shape: Shape },

    /// Flat (row-major) index past the end of the data.
    #[error("flat index {index} out of range for {len} elements")]
    FlatIndexOutOfRange { index: usize, len: usize },

    /// Division or remainder with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// The layer graph was used in a way its structure does not allow:
    /// building a combinator, connecting an input, asking for a gradient
    /// before a forward pass, or loading a snapshot of another topology.
    #[error("structural misuse: {0}")]
    StructuralMisuse(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Create a [`Error::StructuralMisuse`] from any string message.
    pub fn misuse(s: impl Into<String>) -> Self {
        Error::StructuralMisuse(s.into())
    }

    /// Shorthand for a [`Error::ShapeMismatch`] between two shapes.
    pub fn shape_mismatch(expected: &Shape, got: &Shape) -> Self {
        Error::ShapeMismatch {
            expected: expected.clone(),
            got: got.clone(),
        }
    }
}

/// Convenience Result type used throughout Axon.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

/// Early return with a [`Error::StructuralMisuse`].
#[macro_export]
macro_rules! misuse {
    ($($arg:tt)*) => {
        return Err($crate::Error::StructuralMisuse(format!($($arg)*)))
    };
}
