/*
 *  meter.rs
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
//! Display side of the frame stream: bar heights with auto gain and peak hold.
//!
//! Frames arrive at the analyzer rate, `tick` runs at the render rate.

use std::time::Instant;

use log::info;

use crate::ballistics::Ballistics;
use crate::constants::*;
use crate::frame;

#[derive(Debug, Clone)]
pub struct SpectrumMeter {
    floor: f32,
    raw: Vec<f32>,
    shown: Ballistics,
    fractions: Vec<f32>,
    peaks: Vec<f32>,               // 0..1, same scale as fractions
    peak_time: Vec<Option<Instant>>,
    gain_ref: f32,                 // dB level mapped to a full bar
}

impl SpectrumMeter {
    pub fn new(floor: f32) -> Self {
        Self::with_bands(METER_DEFAULT_BANDS, floor)
    }

    pub fn with_bands(bands: usize, floor: f32) -> Self {
        Self {
            floor,
            raw: vec![floor; bands],
            shown: Ballistics::new(bands, METER_ATTACK_RATE, METER_DECAY_RATE, floor),
            fractions: vec![0.0; bands],
            peaks: vec![0.0; bands],
            peak_time: vec![None; bands],
            gain_ref: floor + 30.0,
        }
    }

    /// Take a new frame. A different field count resizes every per-band
    /// array before the values are applied. Returns true on resize.
    pub fn apply_frame(&mut self, text: &str) -> bool {
        let values = frame::decode(text, self.floor);
        if values.is_empty() {
            return false;
        }
        let resized = values.len() != self.raw.len();
        if resized {
            info!("band count changed {} -> {}", self.raw.len(), values.len());
            let gain_ref = self.gain_ref;
            *self = Self::with_bands(values.len(), self.floor);
            self.gain_ref = gain_ref;
        }
        self.raw.copy_from_slice(&values);
        resized
    }

    /// Advance smoothing, auto gain and peak hold; returns bar fractions.
    pub fn tick(&mut self, now: Instant) -> &[f32] {
        let current_max = self.raw.iter().copied().fold(self.floor, f32::max);
        let rate = if current_max > self.gain_ref { METER_GAIN_ATTACK } else { METER_GAIN_DECAY };
        self.gain_ref += (current_max - self.gain_ref) * rate;
        self.gain_ref = self.gain_ref.max(self.floor + METER_MIN_RANGE_DB);
        let range = self.gain_ref - self.floor;

        let shown = self.shown.update(&self.raw);
        for (i, (&db, f)) in shown.iter().zip(self.fractions.iter_mut()).enumerate() {
            *f = ((db.max(self.floor) - self.floor) / range).clamp(0.0, 1.0);

            if *f >= self.peaks[i] {
                self.peaks[i] = *f;
                self.peak_time[i] = Some(now);
            } else if let Some(t) = self.peak_time[i] {
                if now.saturating_duration_since(t) > METER_PEAK_HOLD {
                    self.peaks[i] = 0.0;
                    self.peak_time[i] = None;
                }
            }
        }
        &self.fractions
    }

    /// Any band meaningfully above the floor.
    pub fn is_active(&self) -> bool {
        let threshold = self.floor + 3.0;
        self.raw.iter().any(|&v| v > threshold)
    }

    /// Transport lost: drop the raw levels to floor and let the bars fall.
    pub fn silence(&mut self) {
        self.raw.fill(self.floor);
    }

    pub fn band_count(&self) -> usize {
        self.raw.len()
    }

    pub fn raw(&self) -> &[f32] {
        &self.raw
    }

    pub fn displayed(&self) -> &[f32] {
        self.shown.levels()
    }

    pub fn fractions(&self) -> &[f32] {
        &self.fractions
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    pub fn gain_reference(&self) -> f32 {
        self.gain_ref
    }
}
