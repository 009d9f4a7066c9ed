//! Orchestration of the correction kernels for a chunk of correlator input.

use derive_builder::Builder;
use log::trace;
use std::fmt::Display;

use crate::corrections::{DelayBandpassKernel, DelayTable};
use crate::error::{BadArrayShape, DwingelooError};
use crate::types::SampleBlock;

/// Options for preprocessing sample blocks ahead of correlation.
#[derive(Builder, Debug, Clone)]
pub struct PreprocessContext {
    /// Fine-channel centre frequencies of the subband, in Hz
    pub chan_freqs_hz: Vec<f64>,
    /// Number of stations in each sample block
    pub num_stations: usize,

    /// Whether geometric delay compensation is enabled
    #[builder(default = "true")]
    pub correct_delays: bool,
    /// Whether bandpass correction is enabled
    #[builder(default = "true")]
    pub correct_bandpass: bool,
    /// Per-channel bandpass weights; unit weights when absent
    #[builder(default)]
    pub bandpass: Option<Vec<f64>>,

    /// Whether to draw progress bars
    #[builder(default = "true")]
    pub draw_progress: bool,
}

impl Display for PreprocessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} correct delays.",
            if self.correct_delays { "Will" } else { "Will not" }
        )?;
        writeln!(
            f,
            "{} correct bandpass.",
            if self.correct_bandpass { "Will" } else { "Will not" }
        )?;
        Ok(())
    }
}

impl PreprocessContext {
    /// A one line description of the tasks preprocessing will do.
    pub fn as_comment(&self) -> String {
        [
            if self.correct_delays {
                Some("delay compensation".to_string())
            } else {
                None
            },
            if self.correct_bandpass {
                Some("bandpass correction".to_string())
            } else {
                None
            },
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<String>>()
        .join(", ")
    }

    /// Correct one sample block using the delays for `block_idx` in
    /// `delay_table`.
    ///
    /// # Errors
    ///
    /// [`DwingelooError::BadArrayShape`] when the delay table does not cover
    /// `block_idx` or does not match the station count, when the configured
    /// bandpass weights do not match the channel count, or when the block's
    /// extents disagree with this context.
    pub fn preprocess(
        &self,
        delay_table: &DelayTable,
        block_idx: usize,
        block: &SampleBlock,
    ) -> Result<SampleBlock, DwingelooError> {
        trace!("start preprocess of block {block_idx}");

        if block_idx >= delay_table.num_blocks() {
            return Err(BadArrayShape {
                argument: "delay_table",
                function: "PreprocessContext::preprocess",
                expected: format!("at least {} time blocks", block_idx + 1),
                received: format!("{}", delay_table.num_blocks()),
            }
            .into());
        }

        let mut kernel = DelayBandpassKernel::new(
            self.chan_freqs_hz.clone(),
            self.num_stations,
            self.correct_delays,
            self.correct_bandpass,
        );
        let unit_bandpass;
        let bandpass = match &self.bandpass {
            Some(weights) => weights.as_slice(),
            None => {
                unit_bandpass = vec![1.0; self.chan_freqs_hz.len()];
                unit_bandpass.as_slice()
            }
        };
        kernel.configure(delay_table.block_delays(block_idx), bandpass)?;
        let corrected = kernel.apply(block, self.draw_progress)?;

        trace!("end preprocess of block {block_idx}");
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::PreprocessContextBuilder;
    use crate::corrections::DelayTable;
    use crate::types::{BlockDims, SampleBlock};
    use ndarray::array;

    fn context_builder() -> PreprocessContextBuilder {
        let mut builder = PreprocessContextBuilder::default();
        builder
            .chan_freqs_hz(vec![1.0e8, 1.1e8])
            .num_stations(2)
            .draw_progress(false);
        builder
    }

    #[test]
    fn test_display_and_comment() {
        let ctx = context_builder().build().unwrap();
        let rendered = format!("{ctx}");
        assert!(rendered.contains("Will correct delays."));
        assert!(rendered.contains("Will correct bandpass."));
        assert_eq!(ctx.as_comment(), "delay compensation, bandpass correction");

        let ctx = context_builder()
            .correct_delays(false)
            .correct_bandpass(false)
            .build()
            .unwrap();
        assert!(format!("{ctx}").contains("Will not correct delays."));
        assert_eq!(ctx.as_comment(), "");
    }

    #[test]
    fn test_preprocess_applies_corrections() {
        let ctx = context_builder()
            .bandpass(Some(vec![2.0, 2.0]))
            .build()
            .unwrap();
        let table = DelayTable::new(array![[0.0, 0.0]]);
        let block = SampleBlock::zeros(BlockDims {
            num_stations: 2,
            num_channels: 2,
            num_samples: 3,
            num_pols: 2,
        });
        let out = ctx.preprocess(&table, 0, &block).unwrap();
        assert_eq!(out.dims(), block.dims());
    }

    #[test]
    fn test_preprocess_rejects_missing_block() {
        let ctx = context_builder().build().unwrap();
        let table = DelayTable::new(array![[0.0, 0.0]]);
        let block = SampleBlock::zeros(BlockDims {
            num_stations: 2,
            num_channels: 2,
            num_samples: 1,
            num_pols: 1,
        });
        assert!(ctx.preprocess(&table, 1, &block).is_err());
    }
}
