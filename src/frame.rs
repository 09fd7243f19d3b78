/*
 *  frame.rs
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
//! Spectrum frame text format: `-72.0;-45.3;-12.1` one decimal per band,
//! `;` between fields, no trailing delimiter.

use std::fmt::Write;

pub const FIELD_SEPARATOR: char = ';';

/// Encode levels, one decimal each. Non-finite values and anything below
/// `floor` are written as the floor so every field parses.
pub fn encode(levels: &[f32], floor: f32) -> String {
    let mut out = String::with_capacity(levels.len() * 6);
    for (i, &v) in levels.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        let v = if v.is_finite() { v.max(floor) } else { floor };
        let mut rounded = (v * 10.0).round() / 10.0;
        if rounded < floor {
            // off-grid floor, round up so no field reads below it
            rounded = (floor * 10.0).ceil() / 10.0;
        }
        // rounding can produce "-0.0", normalise it
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        let _ = write!(out, "{rounded:.1}");
    }
    out
}

/// A frame of `bands` floor values.
pub fn floor_frame(bands: usize, floor: f32) -> String {
    encode(&vec![floor; bands], floor)
}

/// Tolerant decode as done by the display side: trailing separator and
/// whitespace are ignored, unparsable or NaN fields read as `floor`.
pub fn decode(frame: &str, floor: f32) -> Vec<f32> {
    let body = frame.trim();
    let body = body.strip_suffix(FIELD_SEPARATOR).unwrap_or(body);
    if body.is_empty() {
        return Vec::new();
    }
    body.split(FIELD_SEPARATOR)
        .map(|field| match field.trim().parse::<f32>() {
            Ok(v) if !v.is_nan() => v,
            _ => floor,
        })
        .collect()
}
