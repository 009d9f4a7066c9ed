//! A polymorphic numeric matrix for expression evaluation.
//!
//! [`Matrix`] is a reference-counted handle over a tagged representation
//! ([`MatrixRepr`]) that is one of four kinds: real scalar, complex scalar,
//! real array or complex array. Binary arithmetic dispatches on the pair of
//! operand kinds, promoting real to complex and broadcasting scalars over
//! arrays.
//!
//! Handles share storage. An operand passed to an operator *by value* whose
//! storage is not aliased by any other handle is treated as a disposable
//! temporary and mutated in place, so a chain of operations on temporaries
//! performs O(1) allocations. Operands passed *by reference* (or aliased by
//! another handle) are never mutated; their storage is copied on write.
//!
//! ```rust
//! use dwingeloo::Matrix;
//! use ndarray::array;
//!
//! let a = Matrix::from(array![[1.0], [2.0], [5.0]]);
//! let b = Matrix::from(5.0) / &a;
//! assert_eq!(b.get_double(2, 0).unwrap(), 1.0);
//! // `a` was passed by reference: still intact.
//! assert_eq!(a.get_double(0, 0).unwrap(), 1.0);
//! ```

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use ndarray::Array2;
use num_complex::Complex;

use crate::error::{BadArrayShape, DomainError};

/// Complex double, the element type of complex representations.
pub type C64 = Complex<f64>;

/// The concrete storage behind a [`Matrix`] handle.
///
/// The element kind is fixed at construction; changing kind or extents means
/// installing a new representation. Array storage is always standard
/// (row-major) layout, with extents `(nx, ny)` indexed as `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixRepr {
    /// A single real value, extents 1x1.
    RealScalar(f64),
    /// A single complex value, extents 1x1.
    ComplexScalar(C64),
    /// An nx-by-ny grid of real values.
    RealArray(Array2<f64>),
    /// An nx-by-ny grid of complex values.
    ComplexArray(Array2<C64>),
}

impl MatrixRepr {
    /// Column extent.
    pub fn nx(&self) -> usize {
        match self {
            MatrixRepr::RealScalar(_) | MatrixRepr::ComplexScalar(_) => 1,
            MatrixRepr::RealArray(a) => a.dim().0,
            MatrixRepr::ComplexArray(a) => a.dim().0,
        }
    }

    /// Row extent.
    pub fn ny(&self) -> usize {
        match self {
            MatrixRepr::RealScalar(_) | MatrixRepr::ComplexScalar(_) => 1,
            MatrixRepr::RealArray(a) => a.dim().1,
            MatrixRepr::ComplexArray(a) => a.dim().1,
        }
    }

    /// Total element count, `nx * ny`.
    pub fn nelements(&self) -> usize {
        self.nx() * self.ny()
    }

    /// Whether the element kind is complex.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            MatrixRepr::ComplexScalar(_) | MatrixRepr::ComplexArray(_)
        )
    }

    /// Whether this is an array (as opposed to scalar) representation.
    pub fn is_array(&self) -> bool {
        matches!(self, MatrixRepr::RealArray(_) | MatrixRepr::ComplexArray(_))
    }

    fn kind(&self) -> ReprKind {
        match self {
            MatrixRepr::RealScalar(_) => ReprKind::RealScalar,
            MatrixRepr::ComplexScalar(_) => ReprKind::ComplexScalar,
            MatrixRepr::RealArray(_) => ReprKind::RealArray,
            MatrixRepr::ComplexArray(_) => ReprKind::ComplexArray,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReprKind {
    RealScalar,
    ComplexScalar,
    RealArray,
    ComplexArray,
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

fn apply_f64(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
    }
}

fn apply_c64(op: BinOp, a: C64, b: C64) -> C64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
    }
}

/// A binary operand together with its ownership status.
///
/// `Owned` means no other handle aliases the storage: the numeric loop may
/// consume it in place. `Shared` storage is copied before any mutation.
enum Operand {
    Owned(MatrixRepr),
    Shared(Rc<MatrixRepr>),
}

impl Operand {
    fn from_matrix(m: Matrix, function: &'static str) -> Self {
        let rc = m
            .0
            .unwrap_or_else(|| panic!("{function}: arithmetic on a null matrix"));
        match Rc::try_unwrap(rc) {
            Ok(repr) => Operand::Owned(repr),
            Err(rc) => Operand::Shared(rc),
        }
    }

    fn repr(&self) -> &MatrixRepr {
        match self {
            Operand::Owned(r) => r,
            Operand::Shared(rc) => rc,
        }
    }

    fn is_temp(&self) -> bool {
        matches!(self, Operand::Owned(_))
    }

    fn real_scalar(&self) -> f64 {
        match self.repr() {
            MatrixRepr::RealScalar(v) => *v,
            _ => unreachable!("kind checked by dispatch"),
        }
    }

    fn complex_scalar(&self) -> C64 {
        match self.repr() {
            MatrixRepr::ComplexScalar(v) => *v,
            _ => unreachable!("kind checked by dispatch"),
        }
    }

    fn real_slice(&self) -> &[f64] {
        match self.repr() {
            MatrixRepr::RealArray(a) => a.as_slice().expect("arrays are standard layout"),
            _ => unreachable!("kind checked by dispatch"),
        }
    }

    fn complex_slice(&self) -> &[C64] {
        match self.repr() {
            MatrixRepr::ComplexArray(a) => a.as_slice().expect("arrays are standard layout"),
            _ => unreachable!("kind checked by dispatch"),
        }
    }

    fn array_dim(&self) -> (usize, usize) {
        (self.repr().nx(), self.repr().ny())
    }

    /// Take the real array out of this operand, copying only if shared.
    fn into_real_array(self) -> Array2<f64> {
        match self {
            Operand::Owned(MatrixRepr::RealArray(a)) => a,
            Operand::Shared(rc) => match rc.as_ref() {
                MatrixRepr::RealArray(a) => a.clone(),
                _ => unreachable!("kind checked by dispatch"),
            },
            _ => unreachable!("kind checked by dispatch"),
        }
    }

    /// Take the complex array out of this operand, copying only if shared.
    fn into_complex_array(self) -> Array2<C64> {
        match self {
            Operand::Owned(MatrixRepr::ComplexArray(a)) => a,
            Operand::Shared(rc) => match rc.as_ref() {
                MatrixRepr::ComplexArray(a) => a.clone(),
                _ => unreachable!("kind checked by dispatch"),
            },
            _ => unreachable!("kind checked by dispatch"),
        }
    }
}

fn flat_mut<T>(a: &mut Array2<T>) -> &mut [T] {
    a.as_slice_mut().expect("arrays are standard layout")
}

fn reshape_to<T>(a: Array2<T>, dim: (usize, usize)) -> Array2<T> {
    if a.dim() == dim {
        a
    } else {
        a.into_shape_with_order(dim)
            .expect("element counts verified by shape check")
    }
}

/// One concrete numeric loop per (left kind, right kind) pair.
fn apply_binary(
    lhs: Operand,
    rhs: Operand,
    op: BinOp,
    function: &'static str,
) -> Result<MatrixRepr, BadArrayShape> {
    use ReprKind::*;

    // Two array operands must agree on element count. Extents themselves are
    // not compared; the result takes the left array operand's extents.
    if lhs.repr().is_array() && rhs.repr().is_array() {
        let (ln, rn) = (lhs.repr().nelements(), rhs.repr().nelements());
        if ln != rn {
            return Err(BadArrayShape {
                argument: "rhs",
                function,
                expected: format!("an array of {ln} elements"),
                received: format!(
                    "{}x{} = {} elements",
                    rhs.repr().nx(),
                    rhs.repr().ny(),
                    rn
                ),
            });
        }
    }

    let repr = match (lhs.repr().kind(), rhs.repr().kind()) {
        (RealScalar, RealScalar) => {
            MatrixRepr::RealScalar(apply_f64(op, lhs.real_scalar(), rhs.real_scalar()))
        }
        (RealScalar, ComplexScalar) => MatrixRepr::ComplexScalar(apply_c64(
            op,
            C64::from(lhs.real_scalar()),
            rhs.complex_scalar(),
        )),
        (ComplexScalar, RealScalar) => MatrixRepr::ComplexScalar(apply_c64(
            op,
            lhs.complex_scalar(),
            C64::from(rhs.real_scalar()),
        )),
        (ComplexScalar, ComplexScalar) => {
            MatrixRepr::ComplexScalar(apply_c64(op, lhs.complex_scalar(), rhs.complex_scalar()))
        }

        // scalar broadcast over an array of the same element kind: the array
        // side is taken over (copied only if shared) and mutated in place.
        (RealScalar, RealArray) => {
            let l = lhs.real_scalar();
            let mut a = rhs.into_real_array();
            for e in flat_mut(&mut a) {
                *e = apply_f64(op, l, *e);
            }
            MatrixRepr::RealArray(a)
        }
        (RealArray, RealScalar) => {
            let r = rhs.real_scalar();
            let mut a = lhs.into_real_array();
            for e in flat_mut(&mut a) {
                *e = apply_f64(op, *e, r);
            }
            MatrixRepr::RealArray(a)
        }
        (ComplexScalar, ComplexArray) => {
            let l = lhs.complex_scalar();
            let mut a = rhs.into_complex_array();
            for e in flat_mut(&mut a) {
                *e = apply_c64(op, l, *e);
            }
            MatrixRepr::ComplexArray(a)
        }
        (ComplexArray, ComplexScalar) => {
            let r = rhs.complex_scalar();
            let mut a = lhs.into_complex_array();
            for e in flat_mut(&mut a) {
                *e = apply_c64(op, *e, r);
            }
            MatrixRepr::ComplexArray(a)
        }
        (RealScalar, ComplexArray) => {
            let l = C64::from(lhs.real_scalar());
            let mut a = rhs.into_complex_array();
            for e in flat_mut(&mut a) {
                *e = apply_c64(op, l, *e);
            }
            MatrixRepr::ComplexArray(a)
        }
        (ComplexArray, RealScalar) => {
            let r = C64::from(rhs.real_scalar());
            let mut a = lhs.into_complex_array();
            for e in flat_mut(&mut a) {
                *e = apply_c64(op, *e, r);
            }
            MatrixRepr::ComplexArray(a)
        }

        // real array against complex scalar: the result kind differs from the
        // array operand, so a fresh complex array is unavoidable.
        (ComplexScalar, RealArray) => {
            let l = lhs.complex_scalar();
            let a = match rhs.repr() {
                MatrixRepr::RealArray(a) => a.mapv(|x| apply_c64(op, l, C64::from(x))),
                _ => unreachable!("kind checked by dispatch"),
            };
            MatrixRepr::ComplexArray(a)
        }
        (RealArray, ComplexScalar) => {
            let r = rhs.complex_scalar();
            let a = match lhs.repr() {
                MatrixRepr::RealArray(a) => a.mapv(|x| apply_c64(op, C64::from(x), r)),
                _ => unreachable!("kind checked by dispatch"),
            };
            MatrixRepr::ComplexArray(a)
        }

        // array against array, same element kind: reuse whichever side is a
        // temporary, preferring the left; both shared costs one copy.
        (RealArray, RealArray) => {
            if lhs.is_temp() || !rhs.is_temp() {
                let mut a = lhs.into_real_array();
                for (e, &b) in flat_mut(&mut a).iter_mut().zip(rhs.real_slice()) {
                    *e = apply_f64(op, *e, b);
                }
                MatrixRepr::RealArray(a)
            } else {
                let ldim = lhs.array_dim();
                let mut a = rhs.into_real_array();
                for (e, &b) in flat_mut(&mut a).iter_mut().zip(lhs.real_slice()) {
                    *e = apply_f64(op, b, *e);
                }
                MatrixRepr::RealArray(reshape_to(a, ldim))
            }
        }
        (ComplexArray, ComplexArray) => {
            if lhs.is_temp() || !rhs.is_temp() {
                let mut a = lhs.into_complex_array();
                for (e, &b) in flat_mut(&mut a).iter_mut().zip(rhs.complex_slice()) {
                    *e = apply_c64(op, *e, b);
                }
                MatrixRepr::ComplexArray(a)
            } else {
                let ldim = lhs.array_dim();
                let mut a = rhs.into_complex_array();
                for (e, &b) in flat_mut(&mut a).iter_mut().zip(lhs.complex_slice()) {
                    *e = apply_c64(op, b, *e);
                }
                MatrixRepr::ComplexArray(reshape_to(a, ldim))
            }
        }

        // mixed-kind arrays: the complex side's storage already has the
        // result kind, so that side is taken over.
        (RealArray, ComplexArray) => {
            let ldim = lhs.array_dim();
            let mut a = rhs.into_complex_array();
            for (e, &b) in flat_mut(&mut a).iter_mut().zip(lhs.real_slice()) {
                *e = apply_c64(op, C64::from(b), *e);
            }
            MatrixRepr::ComplexArray(reshape_to(a, ldim))
        }
        (ComplexArray, RealArray) => {
            let mut a = lhs.into_complex_array();
            for (e, &b) in flat_mut(&mut a).iter_mut().zip(rhs.real_slice()) {
                *e = apply_c64(op, *e, C64::from(b));
            }
            MatrixRepr::ComplexArray(a)
        }
    };
    Ok(repr)
}

/// A reference-counted handle to a [`MatrixRepr`].
///
/// A default-constructed handle is *null* ("no value assigned yet"); client
/// code checks [`Matrix::is_null`] before reading. Assignment and cloning
/// share storage; mutation copies on write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix(Option<Rc<MatrixRepr>>);

impl Matrix {
    /// A null handle, the "no cached value" sentinel.
    pub fn null() -> Self {
        Self(None)
    }

    fn from_repr(repr: MatrixRepr) -> Self {
        Self(Some(Rc::new(repr)))
    }

    /// Whether no value has been assigned.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The underlying representation, if any.
    pub fn repr(&self) -> Option<&MatrixRepr> {
        self.0.as_deref()
    }

    fn expect_repr(&self, function: &'static str) -> &MatrixRepr {
        self.0
            .as_deref()
            .unwrap_or_else(|| panic!("{function} on a null matrix"))
    }

    /// Column extent. Panics on a null matrix.
    pub fn nx(&self) -> usize {
        self.expect_repr("Matrix::nx").nx()
    }

    /// Row extent. Panics on a null matrix.
    pub fn ny(&self) -> usize {
        self.expect_repr("Matrix::ny").ny()
    }

    /// Total element count. Panics on a null matrix.
    pub fn nelements(&self) -> usize {
        self.expect_repr("Matrix::nelements").nelements()
    }

    /// Whether the element kind is complex. Panics on a null matrix.
    pub fn is_complex(&self) -> bool {
        self.expect_repr("Matrix::is_complex").is_complex()
    }

    /// Whether this is an array (as opposed to scalar) matrix. Panics on a
    /// null matrix.
    pub fn is_array(&self) -> bool {
        self.expect_repr("Matrix::is_array").is_array()
    }

    /// Coerce the handle to uniquely-owned real array storage of the given
    /// extents and return it for writing.
    ///
    /// If the current representation is already an unshared real array of
    /// the same extents it is returned as is, existing values intact;
    /// otherwise fresh zeroed storage is installed.
    pub fn set_real(&mut self, nx: usize, ny: usize) -> &mut Array2<f64> {
        let reusable = matches!(
            self.0.as_deref(),
            Some(MatrixRepr::RealArray(a)) if a.dim() == (nx, ny)
        ) && self.0.as_ref().map_or(false, |rc| Rc::strong_count(rc) == 1);
        if !reusable {
            self.0 = Some(Rc::new(MatrixRepr::RealArray(Array2::zeros((nx, ny)))));
        }
        match Rc::get_mut(self.0.as_mut().expect("storage installed above"))
            .expect("storage is uniquely owned")
        {
            MatrixRepr::RealArray(a) => a,
            _ => unreachable!("storage kind installed above"),
        }
    }

    /// Coerce the handle to uniquely-owned complex array storage of the
    /// given extents and return it for writing.
    ///
    /// Same reuse rule as [`Matrix::set_real`].
    pub fn set_complex(&mut self, nx: usize, ny: usize) -> &mut Array2<C64> {
        let reusable = matches!(
            self.0.as_deref(),
            Some(MatrixRepr::ComplexArray(a)) if a.dim() == (nx, ny)
        ) && self.0.as_ref().map_or(false, |rc| Rc::strong_count(rc) == 1);
        if !reusable {
            self.0 = Some(Rc::new(MatrixRepr::ComplexArray(Array2::zeros((nx, ny)))));
        }
        match Rc::get_mut(self.0.as_mut().expect("storage installed above"))
            .expect("storage is uniquely owned")
        {
            MatrixRepr::ComplexArray(a) => a,
            _ => unreachable!("storage kind installed above"),
        }
    }

    /// Read a real element.
    ///
    /// On a complex matrix this succeeds only when the imaginary part is
    /// exactly zero. This is the lenient entry point; [`Matrix::expect_double`]
    /// is the strict one.
    ///
    /// # Errors
    ///
    /// [`DomainError::NullValue`] on a null matrix, [`DomainError::OutOfBounds`]
    /// outside the extents, [`DomainError::NonZeroImaginary`] when the element
    /// has an imaginary component.
    pub fn get_double(&self, x: usize, y: usize) -> Result<f64, DomainError> {
        let repr = match self.0.as_deref() {
            Some(r) => r,
            None => return Err(DomainError::NullValue { x, y }),
        };
        let (nx, ny) = (repr.nx(), repr.ny());
        if x >= nx || y >= ny {
            return Err(DomainError::OutOfBounds { x, y, nx, ny });
        }
        match repr {
            MatrixRepr::RealScalar(v) => Ok(*v),
            MatrixRepr::RealArray(a) => Ok(a[(x, y)]),
            MatrixRepr::ComplexScalar(z) => {
                if z.im == 0.0 {
                    Ok(z.re)
                } else {
                    Err(DomainError::NonZeroImaginary { x, y, im: z.im })
                }
            }
            MatrixRepr::ComplexArray(a) => {
                let z = a[(x, y)];
                if z.im == 0.0 {
                    Ok(z.re)
                } else {
                    Err(DomainError::NonZeroImaginary { x, y, im: z.im })
                }
            }
        }
    }

    /// Read a real element, panicking on any domain violation.
    ///
    /// The strict counterpart of [`Matrix::get_double`] for debug and test
    /// builds where a violation should halt immediately.
    pub fn expect_double(&self, x: usize, y: usize) -> f64 {
        match self.get_double(x, y) {
            Ok(v) => v,
            Err(e) => panic!("Matrix::expect_double: {e}"),
        }
    }

    /// Read an element as complex, promoting a real element on the way out.
    ///
    /// # Errors
    ///
    /// [`DomainError::NullValue`] on a null matrix, [`DomainError::OutOfBounds`]
    /// outside the extents.
    pub fn get_complex(&self, x: usize, y: usize) -> Result<C64, DomainError> {
        let repr = match self.0.as_deref() {
            Some(r) => r,
            None => return Err(DomainError::NullValue { x, y }),
        };
        let (nx, ny) = (repr.nx(), repr.ny());
        if x >= nx || y >= ny {
            return Err(DomainError::OutOfBounds { x, y, nx, ny });
        }
        Ok(match repr {
            MatrixRepr::RealScalar(v) => C64::from(*v),
            MatrixRepr::RealArray(a) => C64::from(a[(x, y)]),
            MatrixRepr::ComplexScalar(z) => *z,
            MatrixRepr::ComplexArray(a) => a[(x, y)],
        })
    }

    /// The flat real element slice, if this is a real array.
    pub fn as_real_slice(&self) -> Option<&[f64]> {
        match self.0.as_deref() {
            Some(MatrixRepr::RealArray(a)) => a.as_slice(),
            _ => None,
        }
    }

    /// The flat complex element slice, if this is a complex array.
    pub fn as_complex_slice(&self) -> Option<&[C64]> {
        match self.0.as_deref() {
            Some(MatrixRepr::ComplexArray(a)) => a.as_slice(),
            _ => None,
        }
    }

    /// A complex copy of this matrix; real kinds gain a zero imaginary part.
    /// Panics on a null matrix.
    pub fn to_complex(&self) -> Matrix {
        match self.expect_repr("Matrix::to_complex") {
            MatrixRepr::RealScalar(v) => Matrix::from_repr(MatrixRepr::ComplexScalar(C64::from(*v))),
            MatrixRepr::RealArray(a) => {
                Matrix::from_repr(MatrixRepr::ComplexArray(a.mapv(C64::from)))
            }
            _ => self.clone(),
        }
    }

    /// Checked addition without in-place reuse.
    ///
    /// # Errors
    ///
    /// [`BadArrayShape`] when both operands are arrays of differing element
    /// counts.
    pub fn try_add(&self, rhs: &Matrix) -> Result<Matrix, BadArrayShape> {
        self.try_binary(rhs, BinOp::Add, "Matrix::try_add")
    }

    /// Checked subtraction without in-place reuse.
    ///
    /// # Errors
    ///
    /// [`BadArrayShape`] when both operands are arrays of differing element
    /// counts.
    pub fn try_sub(&self, rhs: &Matrix) -> Result<Matrix, BadArrayShape> {
        self.try_binary(rhs, BinOp::Sub, "Matrix::try_sub")
    }

    /// Checked multiplication without in-place reuse.
    ///
    /// # Errors
    ///
    /// [`BadArrayShape`] when both operands are arrays of differing element
    /// counts.
    pub fn try_mul(&self, rhs: &Matrix) -> Result<Matrix, BadArrayShape> {
        self.try_binary(rhs, BinOp::Mul, "Matrix::try_mul")
    }

    /// Checked division without in-place reuse.
    ///
    /// # Errors
    ///
    /// [`BadArrayShape`] when both operands are arrays of differing element
    /// counts.
    pub fn try_div(&self, rhs: &Matrix) -> Result<Matrix, BadArrayShape> {
        self.try_binary(rhs, BinOp::Div, "Matrix::try_div")
    }

    fn try_binary(
        &self,
        rhs: &Matrix,
        op: BinOp,
        function: &'static str,
    ) -> Result<Matrix, BadArrayShape> {
        let lhs = Operand::from_matrix(self.clone(), function);
        let rhs = Operand::from_matrix(rhs.clone(), function);
        Ok(Matrix::from_repr(apply_binary(lhs, rhs, op, function)?))
    }

    fn unary(self, function: &'static str, fr: fn(f64) -> f64, fc: fn(C64) -> C64) -> Matrix {
        let operand = Operand::from_matrix(self, function);
        let repr = match operand.repr().kind() {
            ReprKind::RealScalar => MatrixRepr::RealScalar(fr(operand.real_scalar())),
            ReprKind::ComplexScalar => MatrixRepr::ComplexScalar(fc(operand.complex_scalar())),
            ReprKind::RealArray => {
                let mut a = operand.into_real_array();
                a.mapv_inplace(fr);
                MatrixRepr::RealArray(a)
            }
            ReprKind::ComplexArray => {
                let mut a = operand.into_complex_array();
                a.mapv_inplace(fc);
                MatrixRepr::ComplexArray(a)
            }
        };
        Matrix::from_repr(repr)
    }

    /// Element-wise sine, in place when the storage is unshared.
    pub fn sin(self) -> Matrix {
        self.unary("Matrix::sin", f64::sin, C64::sin)
    }

    /// Element-wise cosine, in place when the storage is unshared.
    pub fn cos(self) -> Matrix {
        self.unary("Matrix::cos", f64::cos, C64::cos)
    }

    /// Element-wise exponential, in place when the storage is unshared.
    pub fn exp(self) -> Matrix {
        self.unary("Matrix::exp", f64::exp, C64::exp)
    }

    /// Element-wise square, in place when the storage is unshared.
    pub fn sqr(self) -> Matrix {
        self.unary("Matrix::sqr", |x| x * x, |z| z * z)
    }

    /// Element-wise square root, in place when the storage is unshared.
    ///
    /// Real kinds follow [`f64::sqrt`]: a negative element yields NaN rather
    /// than silently promoting to complex. Convert with
    /// [`Matrix::to_complex`] first for the complex branch.
    pub fn sqrt(self) -> Matrix {
        self.unary("Matrix::sqrt", f64::sqrt, C64::sqrt)
    }

    /// Element-wise complex conjugate. A real matrix is returned unchanged
    /// without copying.
    pub fn conj(self) -> Matrix {
        if self.expect_repr("Matrix::conj").is_complex() {
            self.unary("Matrix::conj", |x| x, |z| z.conj())
        } else {
            self
        }
    }

    /// Sum of all elements, as a scalar matrix of the same element kind.
    /// Panics on a null matrix.
    pub fn sum(&self) -> Matrix {
        match self.expect_repr("Matrix::sum") {
            MatrixRepr::RealScalar(v) => Matrix::from(*v),
            MatrixRepr::ComplexScalar(z) => Matrix::from(*z),
            MatrixRepr::RealArray(a) => Matrix::from(a.sum()),
            MatrixRepr::ComplexArray(a) => Matrix::from(a.sum()),
        }
    }

    /// Arithmetic mean of all elements, as a scalar matrix of the same
    /// element kind. Panics on a null matrix.
    pub fn mean(&self) -> Matrix {
        let n = self.nelements() as f64;
        match self.expect_repr("Matrix::mean") {
            MatrixRepr::RealScalar(v) => Matrix::from(*v),
            MatrixRepr::ComplexScalar(z) => Matrix::from(*z),
            MatrixRepr::RealArray(a) => Matrix::from(a.sum() / n),
            MatrixRepr::ComplexArray(a) => Matrix::from(a.sum() / n),
        }
    }

    /// Minimum element, as a scalar matrix of the same element kind.
    ///
    /// Complex elements compare by magnitude; ties keep the first occurrence
    /// in storage order. Panics on a null matrix.
    pub fn min(&self) -> Matrix {
        self.extremum("Matrix::min", |a, b| b < a, |a, b| b < a)
    }

    /// Maximum element, as a scalar matrix of the same element kind.
    ///
    /// Complex elements compare by magnitude; ties keep the first occurrence
    /// in storage order. Panics on a null matrix.
    pub fn max(&self) -> Matrix {
        self.extremum("Matrix::max", |a, b| b > a, |a, b| b > a)
    }

    /// Walk elements in storage order, replacing the champion only on a
    /// strict win so equal candidates keep the earlier occurrence.
    fn extremum(
        &self,
        function: &'static str,
        better_real: fn(f64, f64) -> bool,
        better_mag: fn(f64, f64) -> bool,
    ) -> Matrix {
        match self.expect_repr(function) {
            MatrixRepr::RealScalar(v) => Matrix::from(*v),
            MatrixRepr::ComplexScalar(z) => Matrix::from(*z),
            MatrixRepr::RealArray(a) => {
                let flat = a.as_slice().expect("arrays are standard layout");
                let mut best = flat[0];
                for &v in &flat[1..] {
                    if better_real(best, v) {
                        best = v;
                    }
                }
                Matrix::from(best)
            }
            MatrixRepr::ComplexArray(a) => {
                let flat = a.as_slice().expect("arrays are standard layout");
                let mut best = flat[0];
                let mut best_mag = best.norm_sqr();
                for &z in &flat[1..] {
                    let mag = z.norm_sqr();
                    if better_mag(best_mag, mag) {
                        best = z;
                        best_mag = mag;
                    }
                }
                Matrix::from(best)
            }
        }
    }
}

impl From<f64> for Matrix {
    fn from(v: f64) -> Self {
        Matrix::from_repr(MatrixRepr::RealScalar(v))
    }
}

impl From<C64> for Matrix {
    fn from(z: C64) -> Self {
        Matrix::from_repr(MatrixRepr::ComplexScalar(z))
    }
}

impl From<Array2<f64>> for Matrix {
    fn from(a: Array2<f64>) -> Self {
        let a = if a.is_standard_layout() {
            a
        } else {
            a.as_standard_layout().into_owned()
        };
        Matrix::from_repr(MatrixRepr::RealArray(a))
    }
}

impl From<Array2<C64>> for Matrix {
    fn from(a: Array2<C64>) -> Self {
        let a = if a.is_standard_layout() {
            a
        } else {
            a.as_standard_layout().into_owned()
        };
        Matrix::from_repr(MatrixRepr::ComplexArray(a))
    }
}

fn binary(lhs: Matrix, rhs: Matrix, op: BinOp, function: &'static str) -> Matrix {
    let lhs = Operand::from_matrix(lhs, function);
    let rhs = Operand::from_matrix(rhs, function);
    match apply_binary(lhs, rhs, op, function) {
        Ok(repr) => Matrix::from_repr(repr),
        Err(e) => panic!("{function}: {e}"),
    }
}

// Operators are implemented for every owned/borrowed combination: an owned
// operand with unshared storage is a disposable temporary and may be consumed
// in place, a borrowed operand never is. Shape violations panic; use the
// try_* methods where a recoverable error is wanted.
macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr, $function:literal) => {
        impl $trait for Matrix {
            type Output = Matrix;
            fn $method(self, rhs: Matrix) -> Matrix {
                binary(self, rhs, $op, $function)
            }
        }
        impl $trait<&Matrix> for Matrix {
            type Output = Matrix;
            fn $method(self, rhs: &Matrix) -> Matrix {
                binary(self, rhs.clone(), $op, $function)
            }
        }
        impl $trait<Matrix> for &Matrix {
            type Output = Matrix;
            fn $method(self, rhs: Matrix) -> Matrix {
                binary(self.clone(), rhs, $op, $function)
            }
        }
        impl $trait<&Matrix> for &Matrix {
            type Output = Matrix;
            fn $method(self, rhs: &Matrix) -> Matrix {
                binary(self.clone(), rhs.clone(), $op, $function)
            }
        }
    };
}

impl_binary_operator!(Add, add, BinOp::Add, "Matrix::add");
impl_binary_operator!(Sub, sub, BinOp::Sub, "Matrix::sub");
impl_binary_operator!(Mul, mul, BinOp::Mul, "Matrix::mul");
impl_binary_operator!(Div, div, BinOp::Div, "Matrix::div");

impl Neg for Matrix {
    type Output = Matrix;
    fn neg(self) -> Matrix {
        self.unary("Matrix::neg", |x| -x, |z| -z)
    }
}

impl Neg for &Matrix {
    type Output = Matrix;
    fn neg(self) -> Matrix {
        self.clone().unary("Matrix::neg", |x| -x, |z| -z)
    }
}

#[cfg(test)]
mod tests {
    use super::{Matrix, C64};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn real_array(values: &[f64]) -> Matrix {
        Matrix::from(Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap())
    }

    fn complex_array(values: &[C64]) -> Matrix {
        Matrix::from(Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap())
    }

    #[test]
    fn test_scalar_arithmetic() {
        let a = Matrix::from(6.0);
        let b = Matrix::from(4.0);
        assert_eq!((&a + &b).expect_double(0, 0), 10.0);
        assert_eq!((&a - &b).expect_double(0, 0), 2.0);
        assert_eq!((&a * &b).expect_double(0, 0), 24.0);
        assert_eq!((&a / &b).expect_double(0, 0), 1.5);
    }

    #[test]
    fn test_scalar_broadcast_preserves_shared_array() {
        // 5.0 / [1, 2, 5] with a live handle on the array: the array must
        // come through unmodified.
        let a = real_array(&[1.0, 2.0, 5.0]);
        let b = Matrix::from(5.0) / &a;
        assert_eq!(b.as_real_slice().unwrap(), &[5.0, 2.5, 1.0]);
        assert_eq!(a.as_real_slice().unwrap(), &[1.0, 2.0, 5.0]);
    }

    #[test]
    fn test_array_scalar_direction() {
        let a = real_array(&[2.0, 4.0]);
        let b = &a - &Matrix::from(1.0);
        assert_eq!(b.as_real_slice().unwrap(), &[1.0, 3.0]);
        let c = &Matrix::from(1.0) - &a;
        assert_eq!(c.as_real_slice().unwrap(), &[-1.0, -3.0]);
    }

    #[test]
    fn test_array_array_shape_invariant() {
        let a = real_array(&[1.0, 2.0, 3.0]);
        let b = real_array(&[10.0, 20.0, 30.0]);
        let c = a.try_add(&b).unwrap();
        assert_eq!(c.nelements(), a.nelements());
        assert_eq!(c.as_real_slice().unwrap(), &[11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_array_count_mismatch_is_error() {
        let a = real_array(&[1.0, 2.0, 3.0]);
        let b = real_array(&[1.0, 2.0]);
        let err = a.try_add(&b).unwrap_err();
        assert_eq!(err.function, "Matrix::try_add");
        assert!(err.expected.contains('3'));
    }

    #[test]
    #[should_panic(expected = "Matrix::add")]
    fn test_operator_panics_on_count_mismatch() {
        let a = real_array(&[1.0, 2.0, 3.0]);
        let b = real_array(&[1.0, 2.0]);
        let _ = &a + &b;
    }

    #[test]
    fn test_mismatched_extents_same_count_take_left_extents() {
        let a = Matrix::from(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let b = Matrix::from(array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        let c = &a + &b;
        assert_eq!((c.nx(), c.ny()), (2, 3));
        assert_eq!(c.as_real_slice().unwrap(), &[2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        // reversed operand order: the other extents win
        let d = &b + &a;
        assert_eq!((d.nx(), d.ny()), (3, 2));
    }

    #[test]
    fn test_promotion_commutes() {
        let r = real_array(&[1.0, 2.0]);
        let c = complex_array(&[C64::new(0.5, 1.0), C64::new(-1.0, 2.0)]);
        let rc = &r + &c;
        let cr = &c + &r;
        assert!(rc.is_complex());
        for (a, b) in rc
            .as_complex_slice()
            .unwrap()
            .iter()
            .zip(cr.as_complex_slice().unwrap())
        {
            assert_abs_diff_eq!(a, b);
        }
        assert_abs_diff_eq!(rc.as_complex_slice().unwrap()[0], C64::new(1.5, 1.0));
    }

    #[test]
    fn test_temporary_elision_matches_cow_result() {
        // x = x + y must equal the never-in-place computation for every
        // kind combination.
        let kinds: Vec<Matrix> = vec![
            Matrix::from(3.0),
            Matrix::from(C64::new(1.0, -2.0)),
            real_array(&[1.0, 2.0, 3.0]),
            complex_array(&[C64::new(1.0, 1.0), C64::new(2.0, -1.0), C64::new(0.0, 3.0)]),
        ];
        for x0 in &kinds {
            for y in &kinds {
                let expected = x0.try_add(y).unwrap();
                // an unshared copy of x0, so the x + y below takes the
                // in-place path
                let mut x = x0.try_add(&Matrix::from(0.0)).unwrap();
                x = x + y;
                assert_eq!(x, expected, "kind pair mismatch");
            }
        }
    }

    #[test]
    fn test_in_place_chain_is_semantically_transparent() {
        let y = real_array(&[1.0, 1.0]);
        let chained = real_array(&[1.0, 2.0]) + &y + &y + &y;
        assert_eq!(chained.as_real_slice().unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn test_set_real_reuses_matching_storage() {
        let mut m = Matrix::null();
        m.set_real(2, 2).fill(7.0);
        assert_eq!(m.expect_double(1, 1), 7.0);
        // same kind and extents: values survive the coercion
        let a = m.set_real(2, 2);
        assert_eq!(a[(0, 0)], 7.0);
        // different extents: fresh zeroed storage
        let b = m.set_real(3, 1);
        assert_eq!(b[(2, 0)], 0.0);
        assert_eq!(m.nelements(), 3);
    }

    #[test]
    fn test_set_complex_replaces_real_storage() {
        let mut m = Matrix::from(1.0);
        m.set_complex(2, 1)[(0, 0)] = C64::new(0.0, 1.0);
        assert!(m.is_complex());
        assert_eq!(m.get_complex(0, 0).unwrap(), C64::new(0.0, 1.0));
    }

    #[test]
    fn test_get_double_domain_error() {
        let m = Matrix::from(C64::new(1.0, 0.5));
        assert!(m.get_double(0, 0).is_err());
        let m = Matrix::from(C64::new(1.0, 0.0));
        assert_eq!(m.get_double(0, 0).unwrap(), 1.0);
    }

    #[test]
    #[should_panic(expected = "nonzero imaginary part")]
    fn test_expect_double_is_strict() {
        let m = Matrix::from(C64::new(1.0, 0.5));
        let _ = m.expect_double(0, 0);
    }

    #[test]
    fn test_get_double_out_of_bounds() {
        let m = real_array(&[1.0, 2.0]);
        assert!(m.get_double(2, 0).is_err());
        assert!(Matrix::null().get_double(0, 0).is_err());
    }

    #[test]
    fn test_unary_ops() {
        let m = real_array(&[0.0, std::f64::consts::FRAC_PI_2]);
        let s = m.clone().sin();
        assert_abs_diff_eq!(s.as_real_slice().unwrap()[0], 0.0);
        assert_abs_diff_eq!(s.as_real_slice().unwrap()[1], 1.0);

        let sq = real_array(&[3.0]).sqr();
        assert_eq!(sq.as_real_slice().unwrap(), &[9.0]);

        assert!(real_array(&[-4.0]).sqrt().as_real_slice().unwrap()[0].is_nan());
        let z = Matrix::from(C64::new(-4.0, 0.0)).sqrt();
        assert_abs_diff_eq!(z.get_complex(0, 0).unwrap(), C64::new(0.0, 2.0));

        let n = -real_array(&[1.0, -2.0]);
        assert_eq!(n.as_real_slice().unwrap(), &[-1.0, 2.0]);
    }

    #[test]
    fn test_conj() {
        let c = complex_array(&[C64::new(1.0, 2.0)]).conj();
        assert_eq!(c.get_complex(0, 0).unwrap(), C64::new(1.0, -2.0));
        let r = real_array(&[1.5]).conj();
        assert_eq!(r.expect_double(0, 0), 1.5);
    }

    #[test]
    fn test_reductions_real() {
        let m = real_array(&[3.0, -1.0, 2.0]);
        assert_eq!(m.sum().expect_double(0, 0), 4.0);
        assert_abs_diff_eq!(m.mean().expect_double(0, 0), 4.0 / 3.0);
        assert_eq!(m.min().expect_double(0, 0), -1.0);
        assert_eq!(m.max().expect_double(0, 0), 3.0);
    }

    #[test]
    fn test_reduction_magnitude_tie_break() {
        // equal magnitudes: the first occurrence in storage order wins,
        // consistently across calls
        let m = complex_array(&[C64::new(1.0, 0.0), C64::new(-1.0, 0.0)]);
        for _ in 0..3 {
            assert_eq!(m.max().get_complex(0, 0).unwrap(), C64::new(1.0, 0.0));
            assert_eq!(m.min().get_complex(0, 0).unwrap(), C64::new(1.0, 0.0));
        }
        let m = complex_array(&[C64::new(0.0, 2.0), C64::new(1.0, 0.0), C64::new(-2.0, 0.0)]);
        assert_eq!(m.max().get_complex(0, 0).unwrap(), C64::new(0.0, 2.0));
        assert_eq!(m.min().get_complex(0, 0).unwrap(), C64::new(1.0, 0.0));
    }

    #[test]
    fn test_null_handle() {
        let m = Matrix::null();
        assert!(m.is_null());
        assert!(Matrix::default().is_null());
        assert!(!Matrix::from(1.0).is_null());
    }

    #[test]
    #[should_panic(expected = "null matrix")]
    fn test_arithmetic_on_null_panics() {
        let _ = Matrix::null() + Matrix::from(1.0);
    }

    #[test]
    fn test_to_complex() {
        let m = real_array(&[1.0, 2.0]).to_complex();
        assert!(m.is_complex());
        assert_eq!(m.get_complex(1, 0).unwrap(), C64::new(2.0, 0.0));
    }
}
