//! Sample block types shared by the correction and correlation kernels.
//!
//! A [`SampleBlock`] is one scheduling tick's worth of station samples,
//! arranged station-major: `(station, channel, time, polarization)`. Blocks
//! arrive from the transport layer either as already-typed complex arrays or
//! as raw little-endian 16-bit complex integer buffers in the same ordering;
//! [`SampleBlock::from_le_i16_bytes`] performs the latter decode. All
//! downstream arithmetic is `Complex<f64>` regardless of the input precision.

use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array4;
use num_complex::Complex;

use crate::error::BadArrayShape;

/// The dimensions of a [`SampleBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDims {
    /// Number of stations in the block
    pub num_stations: usize,
    /// Number of frequency channels in the block
    pub num_channels: usize,
    /// Number of time samples in the block
    pub num_samples: usize,
    /// Number of polarizations per station
    pub num_pols: usize,
}

impl BlockDims {
    /// Total number of complex samples described by these dimensions.
    pub fn num_elements(&self) -> usize {
        self.num_stations * self.num_channels * self.num_samples * self.num_pols
    }
}

/// One block of complex station samples, station-major.
///
/// Axis order is `(station, channel, time, polarization)`, matching the
/// externally-agreed transport buffer layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    data: Array4<Complex<f64>>,
}

impl SampleBlock {
    /// Wrap an existing sample array.
    pub fn new(data: Array4<Complex<f64>>) -> Self {
        Self { data }
    }

    /// A zero-filled block with the given dimensions.
    pub fn zeros(dims: BlockDims) -> Self {
        Self {
            data: Array4::zeros((
                dims.num_stations,
                dims.num_channels,
                dims.num_samples,
                dims.num_pols,
            )),
        }
    }

    /// Decode a raw little-endian 16-bit complex integer buffer into a block.
    ///
    /// The buffer layout is station-major, then channel, then time, then
    /// polarization, with each complex sample stored as two consecutive `i16`
    /// values (real, imaginary). Each component is multiplied by `scale` on
    /// the way in; the kernels never rescale, so the fixed-point conversion
    /// is decided here, by the caller, and nowhere else.
    ///
    /// # Errors
    ///
    /// Returns [`BadArrayShape`] if the buffer length does not match `dims`.
    pub fn from_le_i16_bytes(
        raw: &[u8],
        dims: BlockDims,
        scale: f64,
    ) -> Result<Self, BadArrayShape> {
        let expected_bytes = dims.num_elements() * 2 * std::mem::size_of::<i16>();
        if raw.len() != expected_bytes {
            return Err(BadArrayShape {
                argument: "raw",
                function: "SampleBlock::from_le_i16_bytes",
                expected: format!("{} bytes for dims {:?}", expected_bytes, dims),
                received: format!("{} bytes", raw.len()),
            });
        }

        let mut components = vec![0_i16; dims.num_elements() * 2];
        LittleEndian::read_i16_into(raw, &mut components);

        let samples = components
            .chunks_exact(2)
            .map(|pair| Complex::new(f64::from(pair[0]) * scale, f64::from(pair[1]) * scale))
            .collect::<Vec<_>>();

        let data = Array4::from_shape_vec(
            (
                dims.num_stations,
                dims.num_channels,
                dims.num_samples,
                dims.num_pols,
            ),
            samples,
        )
        .expect("length checked against dims above");

        Ok(Self { data })
    }

    /// The block's dimensions.
    pub fn dims(&self) -> BlockDims {
        let (num_stations, num_channels, num_samples, num_pols) = self.data.dim();
        BlockDims {
            num_stations,
            num_channels,
            num_samples,
            num_pols,
        }
    }

    /// The underlying sample array, `(station, channel, time, polarization)`.
    pub fn data(&self) -> &Array4<Complex<f64>> {
        &self.data
    }

    /// Mutable access to the underlying sample array.
    pub fn data_mut(&mut self) -> &mut Array4<Complex<f64>> {
        &mut self.data
    }

    /// Consume the block, returning the sample array.
    pub fn into_inner(self) -> Array4<Complex<f64>> {
        self.data
    }
}
