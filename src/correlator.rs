//! Cross-correlation accumulation over station sample blocks.
//!
//! A [`CorrelatorKernel`] owns one visibility buffer and walks the lifecycle
//! `Idle -> Accumulating -> Ready`. [`CorrelatorKernel::reset`] zeroes the
//! buffer and opens an integration interval, repeated calls to
//! [`CorrelatorKernel::accumulate`] fold sample blocks into it, and
//! [`CorrelatorKernel::close`] ends the interval and hands the buffer out by
//! reference. A kernel instance serves one accumulation stream; concurrent
//! integrations (one per subband) each get their own instance.
//!
//! ```rust
//! use dwingeloo::{CorrelatorKernel, SampleBlock};
//! use ndarray::Array4;
//! use num_complex::Complex;
//!
//! // three stations, one channel, one time sample, one polarization
//! let mut samples = Array4::zeros((3, 1, 1, 1));
//! for (st, s) in [1.0, 2.0, 3.0].iter().enumerate() {
//!     samples[(st, 0, 0, 0)] = Complex::new(*s, 0.0);
//! }
//!
//! let mut kernel = CorrelatorKernel::new(3, 1, 1);
//! kernel.reset();
//! kernel.accumulate(&SampleBlock::new(samples)).unwrap();
//! let vis = kernel.close().unwrap();
//! assert_eq!(vis.num_baselines(), 6);
//! assert_eq!(vis.get(1, 2, 0, 0, 0), Complex::new(6.0, 0.0));
//! ```

use log::trace;
use ndarray::Array3;
use num_complex::Complex;
use num_traits::Zero;

use crate::error::{BadArrayShape, BadKernelState, DwingelooError};
use crate::types::SampleBlock;

/// Number of distinct baselines for a station count, autocorrelations
/// included.
pub fn num_baselines(num_stations: usize) -> usize {
    num_stations * (num_stations + 1) / 2
}

/// The lifecycle state of a [`CorrelatorKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    /// No integration interval is open.
    Idle,
    /// An integration interval is open and accepting sample blocks.
    Accumulating,
    /// The interval is closed; the buffer is readable and must not be
    /// mutated until the next `reset`.
    Ready,
}

impl KernelState {
    fn name(self) -> &'static str {
        match self {
            KernelState::Idle => "Idle",
            KernelState::Accumulating => "Accumulating",
            KernelState::Ready => "Ready",
        }
    }
}

/// Accumulated visibilities for one integration interval.
///
/// Storage is a flat `(baseline, channel, polarization pair)` grid of
/// `Complex<f64>` sums. Only baselines with `station1 <= station2` exist;
/// the reverse baseline is the conjugate and is never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityBuffer {
    num_stations: usize,
    num_pols: usize,
    vis: Array3<Complex<f64>>,
}

impl VisibilityBuffer {
    fn new(num_stations: usize, num_channels: usize, num_pols: usize) -> Self {
        Self {
            num_stations,
            num_pols,
            vis: Array3::zeros((num_baselines(num_stations), num_channels, num_pols * num_pols)),
        }
    }

    /// Number of stations correlated into this buffer.
    pub fn num_stations(&self) -> usize {
        self.num_stations
    }

    /// Number of frequency channels.
    pub fn num_channels(&self) -> usize {
        self.vis.dim().1
    }

    /// Number of polarizations per station.
    pub fn num_pols(&self) -> usize {
        self.num_pols
    }

    /// Number of stored baselines, `n (n + 1) / 2`.
    pub fn num_baselines(&self) -> usize {
        self.vis.dim().0
    }

    /// The storage row of baseline `(station1, station2)`.
    ///
    /// Baselines are ordered ascending in `station1`, then `station2`:
    /// (0,0), (0,1), .. (0,n-1), (1,1), (1,2), .. (n-1,n-1).
    ///
    /// # Panics
    ///
    /// When `station1 > station2` or either station is out of range.
    pub fn baseline_index(&self, station1: usize, station2: usize) -> usize {
        assert!(
            station1 <= station2 && station2 < self.num_stations,
            "baseline ({station1}, {station2}) out of range for {} stations",
            self.num_stations
        );
        station1 * self.num_stations - station1 * (station1 + 1) / 2 + station2
    }

    /// The accumulated visibility for one baseline, channel and polarization
    /// pair.
    pub fn get(
        &self,
        station1: usize,
        station2: usize,
        channel: usize,
        pol1: usize,
        pol2: usize,
    ) -> Complex<f64> {
        self.vis[(
            self.baseline_index(station1, station2),
            channel,
            pol1 * self.num_pols + pol2,
        )]
    }

    /// The full `(baseline, channel, polarization pair)` array.
    pub fn vis(&self) -> &Array3<Complex<f64>> {
        &self.vis
    }

    /// The flat visibility slice in storage order, for handoff to a writer.
    pub fn as_slice(&self) -> &[Complex<f64>] {
        self.vis.as_slice().expect("visibility storage is contiguous")
    }

    fn zero(&mut self) {
        self.vis.fill(Complex::zero());
    }
}

/// Accumulates station-pair outer products into a [`VisibilityBuffer`].
///
/// Accumulation runs in `Complex<f64>` regardless of input sample precision,
/// bounding rounding error over long integrations. Fixed-point input
/// conversion happens before this kernel (see
/// [`SampleBlock::from_le_i16_bytes`]).
#[derive(Debug, Clone)]
pub struct CorrelatorKernel {
    num_stations: usize,
    num_channels: usize,
    num_pols: usize,
    state: KernelState,
    buffer: VisibilityBuffer,
}

impl CorrelatorKernel {
    /// A kernel for the given extents, in the `Idle` state with a zeroed
    /// buffer. Call [`CorrelatorKernel::reset`] to open the first
    /// integration interval.
    pub fn new(num_stations: usize, num_channels: usize, num_pols: usize) -> Self {
        Self {
            num_stations,
            num_channels,
            num_pols,
            state: KernelState::Idle,
            buffer: VisibilityBuffer::new(num_stations, num_channels, num_pols),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> KernelState {
        self.state
    }

    /// Zero the visibility buffer and open an integration interval.
    ///
    /// Valid in any state; from `Accumulating` it abandons the partial
    /// integration.
    pub fn reset(&mut self) {
        self.buffer.zero();
        self.state = KernelState::Accumulating;
    }

    /// Fold one sample block into the open integration interval.
    ///
    /// For every station pair `(i, j)` with `i <= j`, channel, and
    /// polarization pair `(p, q)`, the products
    /// `sample[i][ch][t][p] * conj(sample[j][ch][t][q])` are summed over the
    /// block's time samples and added to the baseline's visibility. Repeated
    /// calls extend the temporal integration.
    ///
    /// The accumulation order is fixed: ascending `i`, then `j >= i`, then
    /// channel, then polarization pair, with time samples innermost. Results
    /// are bit-reproducible for a given sequence of blocks.
    ///
    /// # Errors
    ///
    /// [`DwingelooError::BadKernelState`] unless the kernel is
    /// `Accumulating`. [`DwingelooError::BadArrayShape`] when the block's
    /// station, channel or polarization extents disagree with the kernel's;
    /// the open integration should then be discarded with
    /// [`CorrelatorKernel::reset`].
    pub fn accumulate(&mut self, block: &SampleBlock) -> Result<(), DwingelooError> {
        if self.state != KernelState::Accumulating {
            return Err(BadKernelState {
                function: "CorrelatorKernel::accumulate",
                expected: KernelState::Accumulating.name(),
                found: self.state.name(),
            }
            .into());
        }

        let dims = block.dims();
        if dims.num_stations != self.num_stations
            || dims.num_channels != self.num_channels
            || dims.num_pols != self.num_pols
        {
            return Err(BadArrayShape {
                argument: "block",
                function: "CorrelatorKernel::accumulate",
                expected: format!(
                    "({}, {}, _, {})",
                    self.num_stations, self.num_channels, self.num_pols
                ),
                received: format!(
                    "({}, {}, {}, {})",
                    dims.num_stations, dims.num_channels, dims.num_samples, dims.num_pols
                ),
            }
            .into());
        }

        trace!("start accumulate, {} time samples", dims.num_samples);

        let data = block.data();
        for i in 0..self.num_stations {
            for j in i..self.num_stations {
                let baseline = self.buffer.baseline_index(i, j);
                for ch in 0..self.num_channels {
                    for p in 0..self.num_pols {
                        for q in 0..self.num_pols {
                            let mut sum = Complex::zero();
                            for t in 0..dims.num_samples {
                                sum += data[(i, ch, t, p)] * data[(j, ch, t, q)].conj();
                            }
                            self.buffer.vis[(baseline, ch, p * self.num_pols + q)] += sum;
                        }
                    }
                }
            }
        }

        trace!("end accumulate");
        Ok(())
    }

    /// Close the integration interval and hand out the accumulated buffer.
    ///
    /// The handoff is zero-copy; the buffer stays owned by the kernel and
    /// must be read (or cloned out) before the next
    /// [`CorrelatorKernel::reset`].
    ///
    /// # Errors
    ///
    /// [`BadKernelState`] unless the kernel is `Accumulating`.
    pub fn close(&mut self) -> Result<&VisibilityBuffer, BadKernelState> {
        if self.state != KernelState::Accumulating {
            return Err(BadKernelState {
                function: "CorrelatorKernel::close",
                expected: KernelState::Accumulating.name(),
                found: self.state.name(),
            });
        }
        self.state = KernelState::Ready;
        Ok(&self.buffer)
    }

    /// The closed buffer, readable while the kernel is `Ready`.
    ///
    /// # Errors
    ///
    /// [`BadKernelState`] unless [`CorrelatorKernel::close`] has been called
    /// since the last reset.
    pub fn visibilities(&self) -> Result<&VisibilityBuffer, BadKernelState> {
        if self.state != KernelState::Ready {
            return Err(BadKernelState {
                function: "CorrelatorKernel::visibilities",
                expected: KernelState::Ready.name(),
                found: self.state.name(),
            });
        }
        Ok(&self.buffer)
    }
}
