#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! Dwingeloo is a library of the numeric kernels at the heart of a
//! phased-array radio telescope's real-time correlator pipeline: a
//! polymorphic matrix-expression engine with copy-on-write temporaries, a
//! cross-correlation accumulation kernel, and a delay/bandpass correction
//! kernel.
//!
//! All I/O stays at the boundary: sample blocks arrive as typed arrays (or
//! are decoded from raw transport buffers with
//! [`SampleBlock::from_le_i16_bytes`]), visibilities leave as a flat buffer
//! for whatever writer the pipeline uses. Internal arithmetic is
//! `Complex<f64>` throughout, whatever the input precision.
//!
//! # Examples
//!
//! Correct a block of station samples for geometric delay, then correlate
//! one integration interval:
//!
//! ```rust
//! use dwingeloo::{CorrelatorKernel, DelayTable, PreprocessContextBuilder, SampleBlock};
//! use ndarray::{array, Array4};
//! use num_complex::Complex;
//!
//! // two stations, one channel at 100 MHz, four time samples, one polarization
//! let mut samples = Array4::from_elem((2, 1, 4, 1), Complex::new(1.0, 0.0));
//! samples[(1, 0, 0, 0)] = Complex::new(0.0, 1.0);
//! let block = SampleBlock::new(samples);
//!
//! // compensate station 1's 5 ns geometric delay
//! let ctx = PreprocessContextBuilder::default()
//!     .chan_freqs_hz(vec![100.0e6])
//!     .num_stations(2)
//!     .correct_bandpass(false)
//!     .draw_progress(false)
//!     .build()
//!     .unwrap();
//! let delays = DelayTable::new(array![[0.0, 5.0e-9]]);
//! let corrected = ctx.preprocess(&delays, 0, &block).unwrap();
//!
//! // accumulate one integration interval
//! let mut correlator = CorrelatorKernel::new(2, 1, 1);
//! correlator.reset();
//! correlator.accumulate(&corrected).unwrap();
//! let vis = correlator.close().unwrap();
//! assert_eq!(vis.num_baselines(), 3);
//! ```
//!
//! Evaluate a matrix expression with scalar broadcasting and in-place
//! temporaries:
//!
//! ```rust
//! use dwingeloo::Matrix;
//! use ndarray::array;
//!
//! let amplitude = Matrix::from(array![[2.0], [4.0], [8.0]]);
//! let scaled = Matrix::from(16.0) / &amplitude;
//! assert_eq!(scaled.get_double(2, 0).unwrap(), 2.0);
//! ```

pub mod constants;
pub mod correlator;
pub mod corrections;
pub mod error;
pub mod matrix;
pub mod preprocessing;
pub mod types;
pub mod util;

pub use correlator::{num_baselines, CorrelatorKernel, KernelState, VisibilityBuffer};
pub use corrections::{split_delay, DelayBandpassKernel, DelayTable};
pub use error::{BadArrayShape, BadKernelState, DomainError, DwingelooError};
pub use matrix::{Matrix, MatrixRepr, C64};
pub use preprocessing::{PreprocessContext, PreprocessContextBuilder};
pub use types::{BlockDims, SampleBlock};

// Re-exports of the numeric foundations so that callers use the same
// versions this crate was built against.
pub use ndarray;
pub use num_complex;
pub use num_complex::Complex;
