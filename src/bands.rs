/*
 *  bands.rs
 *
 *  snapviz - spectrum and metadata for the snapcast squeeze
 *	(c) 2020-25 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! Octave-fraction band layouts and the FFT bin table built from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{SPECTRUM_MAX_HZ, SPECTRUM_MIN_HZ};

// nominal (rounded) centres, 20 Hz .. 20 kHz
const HALF_OCTAVE_CENTERS: [f32; 21] = [
    20.0, 28.0, 40.0, 56.0, 80.0, 112.0, 160.0, 224.0, 315.0, 450.0, 630.0,
    900.0, 1250.0, 1800.0, 2500.0, 3550.0, 5000.0, 7100.0, 10000.0, 14000.0, 20000.0,
];

// ISO 266 third-octave preferred frequencies
const THIRD_OCTAVE_CENTERS: [f32; 31] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0,
    250.0, 315.0, 400.0, 500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0,
    2500.0, 3150.0, 4000.0, 5000.0, 6300.0, 8000.0, 10000.0, 12500.0, 16000.0, 20000.0,
];

/// Spacing between adjacent band centres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandMode {
    /// ratio 2^(1/2) between centres, edges at ±2^(1/4)
    #[default]
    HalfOctave,
    /// ratio 2^(1/3) between centres, edges at ±2^(1/6)
    ThirdOctave,
}

impl BandMode {
    pub fn centers(self) -> &'static [f32] {
        match self {
            BandMode::HalfOctave => &HALF_OCTAVE_CENTERS,
            BandMode::ThirdOctave => &THIRD_OCTAVE_CENTERS,
        }
    }

    /// Ratio between adjacent centres.
    pub fn step(self) -> f32 {
        match self {
            BandMode::HalfOctave => 2f32.powf(1.0 / 2.0),
            BandMode::ThirdOctave => 2f32.powf(1.0 / 3.0),
        }
    }

    /// Ratio between a centre and either of its edges.
    pub fn edge_ratio(self) -> f32 {
        match self {
            BandMode::HalfOctave => 2f32.powf(1.0 / 4.0),
            BandMode::ThirdOctave => 2f32.powf(1.0 / 6.0),
        }
    }
}

impl fmt::Display for BandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandMode::HalfOctave => write!(f, "half-octave"),
            BandMode::ThirdOctave => write!(f, "third-octave"),
        }
    }
}

impl FromStr for BandMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half-octave" | "half_octave" | "half" => Ok(BandMode::HalfOctave),
            "third-octave" | "third_octave" | "third" => Ok(BandMode::ThirdOctave),
            other => Err(format!("unknown band mode '{other}' (half-octave|third-octave)")),
        }
    }
}

/// Centre frequencies plus the edge ratio used to turn them into bin ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    pub centers: Vec<f32>,
    pub edge_ratio: f32,
}

impl BandLayout {
    /// Nominal table for `mode`, less any centre at or above Nyquist.
    pub fn from_mode(mode: BandMode, sample_rate: u32) -> Self {
        let nyq = sample_rate as f32 / 2.0;
        let centers = mode
            .centers()
            .iter()
            .copied()
            .filter(|c| *c < nyq)
            .collect();
        Self { centers, edge_ratio: mode.edge_ratio() }
    }

    /// Caller-supplied centres, edges taken from `mode`.
    pub fn explicit(centers: &[f32], mode: BandMode) -> Self {
        Self { centers: centers.to_vec(), edge_ratio: mode.edge_ratio() }
    }

    /// Layout with exactly `bands` centres.
    ///
    /// The nominal half- and third-octave tables are used when their size
    /// matches, otherwise centres are spread geometrically over the audible
    /// range with edges half a step either side.
    pub fn for_count(bands: usize, sample_rate: u32) -> Self {
        for mode in [BandMode::HalfOctave, BandMode::ThirdOctave] {
            let nominal = Self::from_mode(mode, sample_rate);
            if nominal.centers.len() == bands {
                return nominal;
            }
        }

        let nyq = sample_rate as f32 / 2.0;
        let fmin = SPECTRUM_MIN_HZ.min(nyq * 0.5).max(1.0);
        let fmax = SPECTRUM_MAX_HZ.min(nyq * 0.95).max(fmin * 2.0);

        if bands <= 1 {
            let span = fmax / fmin;
            return Self {
                centers: vec![(fmin * fmax).sqrt()],
                edge_ratio: span.sqrt(),
            };
        }

        let step = (fmax / fmin).powf(1.0 / (bands - 1) as f32);
        let centers = (0..bands).map(|i| fmin * step.powi(i as i32)).collect();
        Self { centers, edge_ratio: step.sqrt() }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// One band: its centre and the half-open FFT bin range `[lo, hi)` it owns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub center_hz: f32,
    pub lo: usize,
    pub hi: usize,
}

/// Immutable band index → bin range mapping for one sample rate / FFT size.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    bands: Vec<Band>,
    spectrum_len: usize,
}

impl BandTable {
    /// Map every centre to `[lo, hi)` where `lo` is the first bin at or above
    /// `c / edge_ratio` and `hi` the first bin at or above `c * edge_ratio`.
    /// Every band owns at least one bin, so at low frequencies adjacent
    /// bands may share one.
    pub fn build(sample_rate: u32, fft_size: usize, centers: &[f32], edge_ratio: f32) -> Self {
        let spectrum_len = fft_size / 2 + 1;
        let bin_hz = sample_rate as f64 / fft_size as f64;

        let first_bin_at = |freq: f64| -> usize {
            if freq <= 0.0 {
                return 0;
            }
            // tolerance keeps an edge sitting exactly on a bin from rounding up
            let k = (freq / bin_hz - 1e-9).ceil().max(0.0) as usize;
            k.min(spectrum_len)
        };

        let ratio = edge_ratio.max(1.0) as f64;
        let bands = centers
            .iter()
            .map(|&c| {
                let c64 = c as f64;
                let lo = first_bin_at(c64 / ratio).min(spectrum_len - 1);
                let hi = first_bin_at(c64 * ratio).max(lo + 1).min(spectrum_len);
                Band { center_hz: c, lo, hi }
            })
            .collect();

        Self { bands, spectrum_len }
    }

    pub fn from_layout(sample_rate: u32, fft_size: usize, layout: &BandLayout) -> Self {
        Self::build(sample_rate, fft_size, &layout.centers, layout.edge_ratio)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn iter(&self) -> impl Iterator<Item = &Band> {
        self.bands.iter()
    }

    /// Length of the one-sided spectrum the table was built for.
    pub fn spectrum_len(&self) -> usize {
        self.spectrum_len
    }

    pub fn centers(&self) -> Vec<f32> {
        self.bands.iter().map(|b| b.center_hz).collect()
    }

    /// Index of the band whose centre is nearest `freq`.
    pub fn closest_to(&self, freq: f32) -> Option<usize> {
        self.bands
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.center_hz - freq).abs().total_cmp(&(b.center_hz - freq).abs())
            })
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_table_sizes_and_range() {
        assert_eq!(BandMode::HalfOctave.centers().len(), 21);
        assert_eq!(BandMode::ThirdOctave.centers().len(), 31);
        for mode in [BandMode::HalfOctave, BandMode::ThirdOctave] {
            let c = mode.centers();
            assert_eq!(c[0], 20.0);
            assert_eq!(c[c.len() - 1], 20000.0);
            assert!(c.windows(2).all(|w| w[1] > w[0]), "{mode} not increasing");
        }
    }

    #[test]
    fn nominal_centres_follow_their_step() {
        for mode in [BandMode::HalfOctave, BandMode::ThirdOctave] {
            let step = mode.step();
            for w in mode.centers().windows(2) {
                let r = w[1] / w[0];
                // nominal values are rounded, so allow a few percent
                assert!((r / step - 1.0).abs() < 0.07, "{mode}: {} -> {}", w[0], w[1]);
            }
            assert!((mode.edge_ratio() * mode.edge_ratio() - step).abs() < 1e-5);
        }
    }

    #[test]
    fn bins_valid_for_48k_4096() {
        let layout = BandLayout::from_mode(BandMode::HalfOctave, 48_000);
        let table = BandTable::from_layout(48_000, 4096, &layout);
        assert_eq!(table.len(), 21);
        for b in table.iter() {
            assert!(b.lo < b.hi, "empty range at {} Hz", b.center_hz);
            assert!(b.hi <= 4096 / 2 + 1);
        }
    }

    #[test]
    fn bins_cover_audible_range() {
        let layout = BandLayout::from_mode(BandMode::HalfOctave, 44_100);
        let table = BandTable::from_layout(44_100, 2048, &layout);
        let bands = table.bands();
        assert!(bands[0].lo <= 5);
        assert!(bands[bands.len() - 1].hi as f32 >= (2048 / 2) as f32 * 0.8);
    }

    #[test]
    fn collapsed_low_bands_still_own_a_bin() {
        // 21.5 Hz bins: 20/28/40 Hz bands all fall within the first couple of bins
        let table = BandTable::build(44_100, 2048, BandMode::ThirdOctave.centers(), BandMode::ThirdOctave.edge_ratio());
        for b in table.iter() {
            assert!(b.hi >= b.lo + 1);
        }
    }

    #[test]
    fn centres_above_nyquist_dropped() {
        let layout = BandLayout::from_mode(BandMode::HalfOctave, 32_000);
        assert_eq!(layout.len(), 20);
        assert!(layout.centers.iter().all(|c| *c < 16_000.0));
    }

    #[test]
    fn for_count_is_exact() {
        assert_eq!(BandLayout::for_count(21, 44_100).centers, BandMode::HalfOctave.centers().to_vec());
        assert_eq!(BandLayout::for_count(31, 44_100).centers, BandMode::ThirdOctave.centers().to_vec());
        for n in [1usize, 5, 19, 24, 64] {
            let layout = BandLayout::for_count(n, 44_100);
            assert_eq!(layout.len(), n);
            assert!(layout.centers.windows(2).all(|w| w[1] > w[0]));
            assert!(layout.edge_ratio > 1.0);
        }
    }

    #[test]
    fn closest_band() {
        let layout = BandLayout::from_mode(BandMode::HalfOctave, 44_100);
        let table = BandTable::from_layout(44_100, 2048, &layout);
        let i = table.closest_to(1000.0).unwrap();
        assert_eq!(table.bands()[i].center_hz, 900.0);
    }

    #[test]
    fn parse_mode_names() {
        assert_eq!("half-octave".parse::<BandMode>().unwrap(), BandMode::HalfOctave);
        assert_eq!("Third_Octave".parse::<BandMode>().unwrap(), BandMode::ThirdOctave);
        assert!("octave".parse::<BandMode>().is_err());
    }
}
