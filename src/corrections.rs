//! Corrections applied to station samples ahead of correlation.
//!
//! Two per-block corrections are supported: geometric delay compensation (a
//! per-station complex phase rotation, linear in channel frequency) and
//! bandpass correction (a per-channel real scale compensating the receiver's
//! non-flat frequency response). Either can be disabled; with both disabled
//! [`DelayBandpassKernel::apply`] degenerates to a copy, preserving the
//! immutable-input contract.
//!
//! NaN and Inf samples are not filtered here; they propagate for the
//! upstream flagging subsystem to catch.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::izip;
use log::trace;
use ndarray::{parallel::prelude::*, Array2, Axis};
use num_complex::Complex;
use std::f64::consts::PI;

use crate::error::BadArrayShape;
use crate::types::SampleBlock;

/// Per-station, per-time-block delay values in seconds.
///
/// Produced by an external delay-compensation collaborator and consumed
/// read-only here, one row per time block.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayTable {
    delays_s: Array2<f64>,
}

impl DelayTable {
    /// Wrap a `(time_block, station)` grid of delay seconds.
    pub fn new(delays_s: Array2<f64>) -> Self {
        let delays_s = if delays_s.is_standard_layout() {
            delays_s
        } else {
            delays_s.as_standard_layout().into_owned()
        };
        Self { delays_s }
    }

    /// Number of time blocks covered by the table.
    pub fn num_blocks(&self) -> usize {
        self.delays_s.dim().0
    }

    /// Number of stations covered by the table.
    pub fn num_stations(&self) -> usize {
        self.delays_s.dim().1
    }

    /// The per-station delays for one time block.
    ///
    /// # Panics
    ///
    /// When `block` is past the end of the table.
    pub fn block_delays(&self, block: usize) -> &[f64] {
        self.delays_s
            .row(block)
            .to_slice()
            .expect("rows of a standard-layout array are contiguous")
    }
}

/// Split a delay into its coarse whole-sample part and the sub-sample
/// remainder in seconds.
///
/// The whole-sample part is applied upstream by shifting the sample stream;
/// only the fractional remainder is compensated by phase rotation.
pub fn split_delay(delay_s: f64, sample_rate_hz: f64) -> (i64, f64) {
    let whole_samples = (delay_s * sample_rate_hz).round();
    let fraction_s = delay_s - whole_samples / sample_rate_hz;
    (whole_samples as i64, fraction_s)
}

/// Applies geometric delay compensation and bandpass correction to sample
/// blocks.
///
/// Construct once per subband with the channel frequencies, then
/// [`DelayBandpassKernel::configure`] per block with that block's delays and
/// weights, then [`DelayBandpassKernel::apply`].
#[derive(Debug, Clone)]
pub struct DelayBandpassKernel {
    chan_freqs_hz: Vec<f64>,
    num_stations: usize,
    delays_s: Vec<f64>,
    bandpass: Vec<f64>,
    correct_delays: bool,
    correct_bandpass: bool,
}

impl DelayBandpassKernel {
    /// A kernel for the given channel frequencies and station count, with
    /// zero delays and unit bandpass until configured.
    pub fn new(
        chan_freqs_hz: Vec<f64>,
        num_stations: usize,
        correct_delays: bool,
        correct_bandpass: bool,
    ) -> Self {
        let num_channels = chan_freqs_hz.len();
        Self {
            chan_freqs_hz,
            num_stations,
            delays_s: vec![0.0; num_stations],
            bandpass: vec![1.0; num_channels],
            correct_delays,
            correct_bandpass,
        }
    }

    /// Bind per-station delays and per-channel bandpass weights for one
    /// block. Pure configuration; no computation happens here.
    ///
    /// # Errors
    ///
    /// [`BadArrayShape`] when `delays_s` does not have one entry per station
    /// or `bandpass` one entry per channel.
    pub fn configure(&mut self, delays_s: &[f64], bandpass: &[f64]) -> Result<(), BadArrayShape> {
        if delays_s.len() != self.num_stations {
            return Err(BadArrayShape {
                argument: "delays_s",
                function: "DelayBandpassKernel::configure",
                expected: format!("one delay per station ({})", self.num_stations),
                received: format!("{}", delays_s.len()),
            });
        }
        if bandpass.len() != self.chan_freqs_hz.len() {
            return Err(BadArrayShape {
                argument: "bandpass",
                function: "DelayBandpassKernel::configure",
                expected: format!("one weight per channel ({})", self.chan_freqs_hz.len()),
                received: format!("{}", bandpass.len()),
            });
        }
        self.delays_s.copy_from_slice(delays_s);
        self.bandpass.copy_from_slice(bandpass);
        Ok(())
    }

    /// Apply the configured corrections to a block, returning a corrected
    /// copy. The input block is never modified.
    ///
    /// Each sample is multiplied by the phase factor
    /// `exp(i 2 pi f_channel delay_station)`, then by the channel's bandpass
    /// weight. A station with delay exactly `0.0` is not rotated at all: the
    /// factor is never computed, so the reference station's samples come
    /// through bit-identical instead of accumulating `sin_cos` rounding
    /// noise over an observation.
    ///
    /// # Errors
    ///
    /// [`BadArrayShape`] when the block's station or channel extents
    /// disagree with the kernel's.
    pub fn apply(
        &self,
        block: &SampleBlock,
        draw_progress: bool,
    ) -> Result<SampleBlock, BadArrayShape> {
        trace!("start delay/bandpass apply");

        let dims = block.dims();
        if dims.num_stations != self.num_stations {
            return Err(BadArrayShape {
                argument: "block",
                function: "DelayBandpassKernel::apply",
                expected: format!("{} stations", self.num_stations),
                received: format!("{}", dims.num_stations),
            });
        }
        if dims.num_channels != self.chan_freqs_hz.len() {
            return Err(BadArrayShape {
                argument: "block",
                function: "DelayBandpassKernel::apply",
                expected: format!("{} channels", self.chan_freqs_hz.len()),
                received: format!("{}", dims.num_channels),
            });
        }

        let mut corrected = block.clone();
        if !self.correct_delays && !self.correct_bandpass {
            trace!("end delay/bandpass apply (identity)");
            return Ok(corrected);
        }

        let draw_target = if draw_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let correction_progress =
            ProgressBar::with_draw_target(Some(dims.num_stations as u64), draw_target);
        correction_progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
                )
                .unwrap()
                .progress_chars("=> "),
        );
        correction_progress.set_message("delay/bandpass");

        corrected
            .data_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(&self.delays_s)
            .for_each(|(mut station_view, &delay_s)| {
                for (mut chan_view, &freq_hz, &gain) in izip!(
                    station_view.axis_iter_mut(Axis(0)),
                    self.chan_freqs_hz.iter(),
                    self.bandpass.iter()
                ) {
                    let phasor = if self.correct_delays && delay_s != 0.0 {
                        let angle = 2.0 * PI * freq_hz * delay_s;
                        let (sin_angle, cos_angle) = angle.sin_cos();
                        Some(Complex::new(cos_angle, sin_angle))
                    } else {
                        None
                    };

                    for sample in chan_view.iter_mut() {
                        if let Some(rotation) = phasor {
                            *sample *= rotation;
                        }
                        if self.correct_bandpass {
                            *sample *= gain;
                        }
                    }
                }
                correction_progress.inc(1);
            });

        correction_progress.finish();

        trace!("end delay/bandpass apply");
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::{split_delay, DelayBandpassKernel, DelayTable};
    use crate::types::{BlockDims, SampleBlock};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array4};
    use num_complex::Complex;
    use std::f64::consts::PI;

    fn test_block(num_stations: usize, num_channels: usize) -> SampleBlock {
        let mut data = Array4::zeros((num_stations, num_channels, 2, 1));
        for st in 0..num_stations {
            for ch in 0..num_channels {
                for t in 0..2 {
                    data[(st, ch, t, 0)] = Complex::new(
                        0.1 + st as f64 + ch as f64 / 3.0,
                        -0.7 + t as f64 / 7.0,
                    );
                }
            }
        }
        SampleBlock::new(data)
    }

    #[test]
    fn test_zero_delay_is_bit_identical() {
        let block = test_block(3, 4);
        let kernel = DelayBandpassKernel::new(vec![1.0e8, 1.1e8, 1.2e8, 1.3e8], 3, true, false);
        // all delays zero (the default): output must equal input exactly,
        // not merely approximately
        let out = kernel.apply(&block, false).unwrap();
        assert_eq!(out, block);
    }

    #[test]
    fn test_disabled_kernel_is_identity_copy() {
        let block = test_block(2, 2);
        let mut kernel = DelayBandpassKernel::new(vec![1.0e8, 1.1e8], 2, false, false);
        kernel.configure(&[1.0e-6, 2.0e-6], &[3.0, 4.0]).unwrap();
        // corrections configured but disabled: still the identity
        let out = kernel.apply(&block, false).unwrap();
        assert_eq!(out, block);
    }

    #[test]
    fn test_delay_rotation_matches_reference() {
        let block = test_block(2, 2);
        let freqs = vec![1.0e8, 1.5e8];
        let delay_s = 3.2e-9;
        let mut kernel = DelayBandpassKernel::new(freqs.clone(), 2, true, false);
        kernel.configure(&[0.0, delay_s], &[1.0, 1.0]).unwrap();
        let out = kernel.apply(&block, false).unwrap();

        // station 0 has zero delay: untouched
        for (a, b) in out
            .data()
            .index_axis(ndarray::Axis(0), 0)
            .iter()
            .zip(block.data().index_axis(ndarray::Axis(0), 0).iter())
        {
            assert_eq!(a, b);
        }

        // station 1 is rotated by exp(i 2 pi f tau) per channel
        for (ch, &freq_hz) in freqs.iter().enumerate() {
            let angle = 2.0 * PI * freq_hz * delay_s;
            let (sin_angle, cos_angle) = angle.sin_cos();
            let rotation = Complex::new(cos_angle, sin_angle);
            for t in 0..2 {
                let input = block.data()[(1, ch, t, 0)];
                assert_abs_diff_eq!(
                    out.data()[(1, ch, t, 0)],
                    input * rotation,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_bandpass_scales_per_channel() {
        let block = test_block(2, 2);
        let mut kernel = DelayBandpassKernel::new(vec![1.0e8, 1.1e8], 2, false, true);
        kernel.configure(&[0.0, 0.0], &[2.0, 0.5]).unwrap();
        let out = kernel.apply(&block, false).unwrap();
        for st in 0..2 {
            for t in 0..2 {
                assert_abs_diff_eq!(
                    out.data()[(st, 0, t, 0)],
                    block.data()[(st, 0, t, 0)] * 2.0
                );
                assert_abs_diff_eq!(
                    out.data()[(st, 1, t, 0)],
                    block.data()[(st, 1, t, 0)] * 0.5
                );
            }
        }
    }

    #[test]
    fn test_configure_rejects_bad_lengths() {
        let mut kernel = DelayBandpassKernel::new(vec![1.0e8, 1.1e8], 2, true, true);
        let err = kernel.configure(&[0.0], &[1.0, 1.0]).unwrap_err();
        assert_eq!(err.argument, "delays_s");
        let err = kernel.configure(&[0.0, 0.0], &[1.0]).unwrap_err();
        assert_eq!(err.argument, "bandpass");
    }

    #[test]
    fn test_apply_rejects_bad_block_shape() {
        let kernel = DelayBandpassKernel::new(vec![1.0e8], 2, true, true);
        let block = SampleBlock::zeros(BlockDims {
            num_stations: 3,
            num_channels: 1,
            num_samples: 1,
            num_pols: 1,
        });
        let err = kernel.apply(&block, false).unwrap_err();
        assert_eq!(err.function, "DelayBandpassKernel::apply");
    }

    #[test]
    fn test_nan_propagates() {
        let mut block = test_block(1, 1);
        block.data_mut()[(0, 0, 0, 0)] = Complex::new(f64::NAN, 0.0);
        let mut kernel = DelayBandpassKernel::new(vec![1.0e8], 1, true, true);
        kernel.configure(&[1.0e-9], &[2.0]).unwrap();
        let out = kernel.apply(&block, false).unwrap();
        assert!(out.data()[(0, 0, 0, 0)].re.is_nan());
    }

    #[test]
    fn test_delay_table_rows() {
        let table = DelayTable::new(array![[1.0e-9, 2.0e-9], [3.0e-9, 4.0e-9]]);
        assert_eq!(table.num_blocks(), 2);
        assert_eq!(table.num_stations(), 2);
        assert_eq!(table.block_delays(1), &[3.0e-9, 4.0e-9]);
    }

    #[test]
    fn test_split_delay() {
        let (whole, fraction) = split_delay(5.25, 1.0);
        assert_eq!(whole, 5);
        assert_abs_diff_eq!(fraction, 0.25);

        let (whole, fraction) = split_delay(-0.6, 1.0);
        assert_eq!(whole, -1);
        assert_abs_diff_eq!(fraction, 0.4);

        // 10.5 samples at 200 MHz; round-half-away gives 11 whole samples
        let rate = 200.0e6;
        let delay_s = 10.5 / rate;
        let (whole, fraction) = split_delay(delay_s, rate);
        assert_eq!(whole, 11);
        assert_abs_diff_eq!(fraction, -0.5 / rate, epsilon = 1e-18);
    }
}
