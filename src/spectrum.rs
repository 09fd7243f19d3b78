/*
 *  spectrum.rs
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
//! Octave-band spectrum engine.
//!
//! Per chunk: silence gate, ring buffer update, DC removal, Hann taper, FFT,
//! one-sided power, prefix-sum band aggregation, dB conversion, attack/decay
//! smoothing, `;` frame. One engine is owned by one task; a band count change
//! builds a fresh engine rather than mutating this one.

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ballistics::Ballistics;
use crate::bands::{BandLayout, BandMode, BandTable};
use crate::config::{ConfigError, SpectrumConfig};
use crate::constants::{MAX_BANDS, PCM_FULL_SCALE, SILENCE_RMS};
use crate::frame;

/// How band power becomes a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelMode {
    /// `10·log10(band power)`, 0 dB ≈ full-scale sine in one band
    #[default]
    Absolute,
    /// band power as a fraction of total power, independent of volume
    Normalized,
}

impl fmt::Display for LevelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelMode::Absolute => write!(f, "absolute"),
            LevelMode::Normalized => write!(f, "normalized"),
        }
    }
}

impl FromStr for LevelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute" | "dbfs" => Ok(LevelMode::Absolute),
            "normalized" | "normalised" | "relative" => Ok(LevelMode::Normalized),
            other => Err(format!("unknown level mode '{other}' (absolute|normalized)")),
        }
    }
}

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("spectrum needs at least one band")]
    NoBands,
    #[error("{requested} bands requested, at most {max} supported")]
    TooManyBands { requested: usize, max: usize },
}

pub struct SpectrumEngine {
    settings: SpectrumConfig,
    fft: std::sync::Arc<dyn rustfft::Fft<f32> + Send + Sync>,
    window: Vec<f32>,
    power_correction: f32, // 1 / mean(w^2)
    ring: Vec<f32>,        // most recent fft_size mono samples, oldest first
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    power: Vec<f32>,       // one-sided, fft_size/2 + 1
    cumsum: Vec<f64>,      // prefix sums over `power`, one longer
    table: BandTable,
    raw: Vec<f32>,
    ballistics: Ballistics,
}

impl SpectrumEngine {
    pub fn new(settings: &SpectrumConfig) -> Result<Self, SpectrumError> {
        settings.validate()?;
        let layout = match settings.band_centers.as_deref() {
            Some(centers) => BandLayout::explicit(centers, settings.band_mode),
            None => BandLayout::from_mode(settings.band_mode, settings.sample_rate),
        };
        Self::with_layout(settings, &layout)
    }

    fn with_layout(settings: &SpectrumConfig, layout: &BandLayout) -> Result<Self, SpectrumError> {
        if layout.is_empty() {
            return Err(SpectrumError::NoBands);
        }
        let nfft = settings.fft_size;

        let mut planner = rustfft::FftPlanner::<f32>::new();
        let fft: std::sync::Arc<dyn rustfft::Fft<f32> + Send + Sync> = planner.plan_fft_forward(nfft);

        // Hann
        let window = (0..nfft)
            .map(|i| 0.5f32 * (1.0 - (2.0 * std::f32::consts::PI * (i as f32) / (nfft as f32)).cos()))
            .collect::<Vec<_>>();
        let mean_sq = window.iter().map(|w| w * w).sum::<f32>() / nfft as f32;
        let power_correction = 1.0 / mean_sq;

        let buf = vec![Complex::<f32>::new(0.0, 0.0); nfft];
        let scratch = vec![Complex::<f32>::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let spectrum_len = nfft / 2 + 1;

        let table = BandTable::from_layout(settings.sample_rate, nfft, layout);
        let bands = table.len();

        Ok(Self {
            settings: settings.clone(),
            fft,
            window,
            power_correction,
            ring: vec![0.0; nfft],
            buf,
            scratch,
            power: vec![0.0; spectrum_len],
            cumsum: vec![0.0; spectrum_len + 1],
            table,
            raw: vec![settings.noise_floor; bands],
            ballistics: Ballistics::new(bands, settings.attack_rate, settings.decay_rate, settings.noise_floor),
        })
    }

    /// Fresh engine with `bands` bands and otherwise identical settings.
    /// Callers swap it in whole, nothing sized by the band count is shared.
    pub fn reconfigure(&self, bands: usize) -> Result<SpectrumEngine, SpectrumError> {
        if bands == 0 {
            return Err(SpectrumError::NoBands);
        }
        let max = MAX_BANDS.min(self.power.len());
        if bands > max {
            return Err(SpectrumError::TooManyBands { requested: bands, max });
        }
        let layout = BandLayout::for_count(bands, self.settings.sample_rate);
        let mut settings = self.settings.clone();
        settings.band_centers = Some(layout.centers.clone());
        Self::with_layout(&settings, &layout)
    }

    /// Analyse one chunk of mono samples (16-bit scale) and return the frame.
    pub fn process_chunk(&mut self, chunk: &[f32]) -> String {
        if chunk.is_empty() {
            return self.current_frame();
        }
        // gate on the new samples only, the ring may still hold stale audio
        if rms(chunk) < SILENCE_RMS {
            self.reset();
            return self.silence_frame();
        }

        self.push_samples(chunk);
        self.analyze();
        self.ballistics.update(&self.raw);
        self.current_frame()
    }

    /// Zero the analysis window and drop every band to the floor.
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.raw.fill(self.settings.noise_floor);
        self.ballistics.reset();
    }

    pub fn current_frame(&self) -> String {
        frame::encode(self.ballistics.levels(), self.settings.noise_floor)
    }

    pub fn silence_frame(&self) -> String {
        frame::floor_frame(self.band_count(), self.settings.noise_floor)
    }

    pub fn band_count(&self) -> usize {
        self.table.len()
    }

    /// Smoothed levels as last emitted.
    pub fn levels(&self) -> &[f32] {
        self.ballistics.levels()
    }

    /// Pre-smoothing levels from the last analysed chunk.
    pub fn raw_levels(&self) -> &[f32] {
        &self.raw
    }

    pub fn table(&self) -> &BandTable {
        &self.table
    }

    pub fn settings(&self) -> &SpectrumConfig {
        &self.settings
    }

    pub fn band_mode(&self) -> BandMode {
        self.settings.band_mode
    }

    fn push_samples(&mut self, chunk: &[f32]) {
        let w = self.ring.len();
        let n = chunk.len();
        if n >= w {
            self.ring.copy_from_slice(&chunk[n - w..]);
        } else {
            self.ring.copy_within(n.., 0);
            self.ring[w - n..].copy_from_slice(chunk);
        }
    }

    fn analyze(&mut self) {
        let nfft = self.ring.len();
        let mean = self.ring.iter().sum::<f32>() / nfft as f32;

        // DC removed, unit scale, tapered
        for ((c, &s), &w) in self.buf.iter_mut().zip(&self.ring).zip(&self.window) {
            c.re = (s - mean) / PCM_FULL_SCALE * w;
            c.im = 0.0;
        }

        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        // One-sided power, window-corrected, Parseval scaled. Double bins except DC/Nyquist.
        let half = nfft / 2;
        let scale = self.power_correction / (nfft as f32 * nfft as f32);
        for (k, p) in self.power.iter_mut().enumerate() {
            let c = self.buf[k];
            let mut v = (c.re * c.re + c.im * c.im) * scale;
            if k != 0 && k != half {
                v *= 2.0;
            }
            *p = v.max(0.0);
        }

        self.cumsum[0] = 0.0;
        for (k, &p) in self.power.iter().enumerate() {
            self.cumsum[k + 1] = self.cumsum[k] + p as f64;
        }

        let spectrum_len = self.power.len();
        let floor = self.settings.noise_floor;
        let mut band_power = vec![0.0f64; self.table.len()];
        let mut total = 0.0f64;
        for (bp, band) in band_power.iter_mut().zip(self.table.iter()) {
            if band.lo >= spectrum_len {
                *bp = -1.0; // no bins, reads as floor
                continue;
            }
            let hi = band.hi.min(spectrum_len).max(band.lo);
            *bp = (self.cumsum[hi] - self.cumsum[band.lo]).max(0.0);
            total += *bp;
        }

        let denom = match self.settings.level_mode {
            LevelMode::Absolute => 1.0,
            LevelMode::Normalized => total + self.settings.power_epsilon as f64,
        };
        for (level, &p) in self.raw.iter_mut().zip(&band_power) {
            *level = if p <= 0.0 {
                floor
            } else {
                let db = (10.0 * (p / denom).log10()) as f32;
                if db.is_finite() { db.max(floor) } else { floor }
            };
        }
    }
}

/// Root mean square of a chunk, same scale as the samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}
