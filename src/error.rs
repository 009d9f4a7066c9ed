//! Error types for matrix arithmetic and the correlator kernels.

use thiserror::Error;

/// Error for an incompatible array shape in a provided argument.
///
/// Shape mismatches almost always indicate an upstream configuration problem
/// (wrong station count, wrong subband layout) rather than data corruption,
/// so the offending dimensions are spelled out in the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
pub struct BadArrayShape {
    /// The name of the argument with the incompatible shape
    pub argument: &'static str,
    /// The name of the function the argument was provided to
    pub function: &'static str,
    /// The expected shape
    pub expected: String,
    /// The shape that was received instead
    pub received: String,
}

/// Error for a value-domain violation in the matrix engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A real value was requested from a complex element whose imaginary
    /// part is nonzero.
    #[error("element ({x}, {y}) has nonzero imaginary part {im:e}, cannot be read as real")]
    NonZeroImaginary {
        /// Column of the offending element
        x: usize,
        /// Row of the offending element
        y: usize,
        /// The nonzero imaginary part
        im: f64,
    },
    /// An element was requested from a matrix with no value assigned.
    #[error("cannot read element ({x}, {y}) from a null matrix")]
    NullValue {
        /// Requested column
        x: usize,
        /// Requested row
        y: usize,
    },
    /// An element index was outside the matrix extents.
    #[error("element ({x}, {y}) is outside the matrix extents {nx}x{ny}")]
    OutOfBounds {
        /// Requested column
        x: usize,
        /// Requested row
        y: usize,
        /// Matrix column extent
        nx: usize,
        /// Matrix row extent
        ny: usize,
    },
}

/// Error for a correlator kernel method called in the wrong lifecycle state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{function} called in kernel state {found}, expected {expected}")]
pub struct BadKernelState {
    /// The method that was called
    pub function: &'static str,
    /// The state the method requires
    pub expected: &'static str,
    /// The state the kernel was actually in
    pub found: &'static str,
}

/// The umbrella error type for this crate.
#[derive(Error, Debug)]
pub enum DwingelooError {
    /// Error for bad array shape in provided argument
    #[error(transparent)]
    BadArrayShape(#[from] BadArrayShape),

    /// Error for a value-domain violation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Error for a kernel method called in the wrong state
    #[error(transparent)]
    BadKernelState(#[from] BadKernelState),
}
