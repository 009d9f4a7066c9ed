//! Utility functions

use std::{cmp::min, fmt::Write};

use crate::correlator::VisibilityBuffer;
use crate::types::SampleBlock;

/// Peek into a sample block for debugging.
///
/// One line per station and channel, up to the given limits, each complex
/// sample rendered as `re+imj` in scientific notation.
pub fn dump_sample_block(
    block: &SampleBlock,
    station_limit: Option<usize>,
    chan_limit: Option<usize>,
    sample_limit: Option<usize>,
) -> String {
    let mut out = String::new();
    let dims = block.dims();
    let station_limit = min(station_limit.unwrap_or(dims.num_stations), dims.num_stations);
    let chan_limit = min(chan_limit.unwrap_or(dims.num_channels), dims.num_channels);
    let sample_limit = min(sample_limit.unwrap_or(dims.num_samples), dims.num_samples);
    for st in 0..station_limit {
        for ch in 0..chan_limit {
            write!(&mut out, "st {:03} ch {:03} | ", &st, &ch).unwrap();
            for t in 0..sample_limit {
                for pol in 0..dims.num_pols {
                    let s = block.data()[(st, ch, t, pol)];
                    write!(&mut out, "{:e}{:+e}j ", s.re, s.im).unwrap();
                }
            }
            writeln!(&mut out).unwrap();
        }
    }
    out
}

/// Peek into a visibility buffer for debugging.
///
/// One line per baseline, up to the given limits, listing each channel's
/// polarization-pair sums in storage order.
pub fn dump_visibilities(
    vis: &VisibilityBuffer,
    baseline_limit: Option<usize>,
    chan_limit: Option<usize>,
) -> String {
    let mut out = String::new();
    let baseline_limit = min(
        baseline_limit.unwrap_or(vis.num_baselines()),
        vis.num_baselines(),
    );
    let chan_limit = min(chan_limit.unwrap_or(vis.num_channels()), vis.num_channels());
    let num_stations = vis.num_stations();
    let mut baseline_idx = 0;
    'outer: for st1 in 0..num_stations {
        for st2 in st1..num_stations {
            if baseline_idx >= baseline_limit {
                break 'outer;
            }
            write!(&mut out, "bl {:04} ({}, {}) | ", &baseline_idx, &st1, &st2).unwrap();
            for ch in 0..chan_limit {
                for p in 0..vis.num_pols() {
                    for q in 0..vis.num_pols() {
                        let v = vis.get(st1, st2, ch, p, q);
                        write!(&mut out, "{:e}{:+e}j ", v.re, v.im).unwrap();
                    }
                }
            }
            writeln!(&mut out).unwrap();
            baseline_idx += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{dump_sample_block, dump_visibilities};
    use crate::correlator::CorrelatorKernel;
    use crate::types::{BlockDims, SampleBlock};
    use num_complex::Complex;

    fn small_block() -> SampleBlock {
        let mut block = SampleBlock::zeros(BlockDims {
            num_stations: 2,
            num_channels: 2,
            num_samples: 1,
            num_pols: 1,
        });
        block.data_mut()[(1, 0, 0, 0)] = Complex::new(1.0, -2.0);
        block
    }

    #[test]
    fn test_dump_sample_block() {
        let dump = dump_sample_block(&small_block(), Some(2), Some(1), None);
        assert!(dump.contains("st 001 ch 000"));
        assert!(dump.contains("1e0-2e0j"));
        // channel 1 excluded by the limit
        assert!(!dump.contains("ch 001"));
    }

    #[test]
    fn test_dump_visibilities() {
        let mut kernel = CorrelatorKernel::new(2, 2, 1);
        kernel.reset();
        kernel.accumulate(&small_block()).unwrap();
        let dump = dump_visibilities(kernel.close().unwrap(), None, None);
        assert!(dump.contains("bl 0000 (0, 0)"));
        assert!(dump.contains("bl 0002 (1, 1)"));
    }
}
