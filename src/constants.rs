// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All constants *must* be double precision.

/// Station ADC sample clock in 200 MHz mode, in Hz.
pub const CLOCK_200MHZ_HZ: f64 = 200_000_000.0;
/// Station ADC sample clock in 160 MHz mode, in Hz.
pub const CLOCK_160MHZ_HZ: f64 = 160_000_000.0;

/// Subband width in 200 MHz clock mode (clock / 1024), in Hz.
pub const SUBBAND_WIDTH_200MHZ_HZ: f64 = CLOCK_200MHZ_HZ / 1024.0;
/// Subband width in 160 MHz clock mode (clock / 1024), in Hz.
pub const SUBBAND_WIDTH_160MHZ_HZ: f64 = CLOCK_160MHZ_HZ / 1024.0;

/// Default number of fine channels per subband produced by the station
/// polyphase filter bank.
pub const DEFAULT_CHANNELS_PER_SUBBAND: usize = 256;

/// Number of polarizations per station signal path.
pub const NUM_POLS: usize = 2;
