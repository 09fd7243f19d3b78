//! This module contains global constants used across the analyzer and the metadata poller.

use std::time::Duration;

// PCM input
/// Default sample rate of the snapclient loopback / FIFO.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Interleaved channels in the PCM stream (1 or 2).
pub const DEFAULT_CHANNELS: u16 = 2;
/// Full-scale value of a signed 16-bit sample.
pub const PCM_FULL_SCALE: f32 = 32_768.0;
/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;
/// Default FIFO written by snapclient (`--player file` / pipe sink).
pub const DEFAULT_PCM_SOURCE: &str = "/tmp/snapfifo";

// Analysis
/// FFT (and analysis window) length.
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const FFT_SIZE_MIN: usize = 256;
pub const FFT_SIZE_MAX: usize = 16_384;
/// Analysis ticks per second; hop size defaults to sample_rate / fps.
pub const DEFAULT_TARGET_FPS: u32 = 30;
pub const TARGET_FPS_MAX: u32 = 120;

/// Meter floor in dBFS, levels never go below this.
pub const NOISE_FLOOR_DB: f32 = -72.0;
/// RMS (16-bit scale) below which a chunk is treated as digital silence (~1 LSB).
pub const SILENCE_RMS: f32 = 1.0;
/// Guard added to total power in normalized mode.
pub const DEFAULT_POWER_EPSILON: f32 = 1e-20;

/// Fraction of the gap closed per tick when a band rises.
pub const DEFAULT_ATTACK_RATE: f32 = 0.6;
/// Fraction of the gap closed per tick when a band falls.
pub const DEFAULT_DECAY_RATE: f32 = 0.2;

/// Lowest and highest nominal band centres.
pub const SPECTRUM_MIN_HZ: f32 = 20.0;
pub const SPECTRUM_MAX_HZ: f32 = 20_000.0;
/// Most bands a reconfigure request may ask for.
pub const MAX_BANDS: usize = 64;

// Display side (frame consumers)
pub const METER_ATTACK_RATE: f32 = 0.6;
pub const METER_DECAY_RATE: f32 = 0.35;
pub const METER_PEAK_HOLD: Duration = Duration::from_millis(1500);
pub const METER_GAIN_ATTACK: f32 = 0.3;
pub const METER_GAIN_DECAY: f32 = 0.005;
/// Smallest dB span the auto-gain will stretch bars over.
pub const METER_MIN_RANGE_DB: f32 = 12.0;
/// Default band count a display assumes before the first frame arrives.
pub const METER_DEFAULT_BANDS: usize = 19;

// Push channels
pub const DEFAULT_VISUALIZER_WS_PORT: u16 = 8081;
pub const DEFAULT_METADATA_WS_PORT: u16 = 8082;
/// Frames buffered per subscriber before a slow one starts skipping.
pub const BROADCAST_CAPACITY: usize = 16;

// Source supervision
pub const SOURCE_RETRY_BACKOFF: Duration = Duration::from_millis(100);
pub const SOURCE_ERROR_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;
/// PCM chunks queued between the reader thread and the analysis task.
pub const PCM_QUEUE_DEPTH: usize = 8;

// Metadata
pub const DEFAULT_SNAPSERVER_HOST: &str = "snapserver.local";
pub const DEFAULT_SNAPSERVER_PORT: u16 = 1705;
pub const DEFAULT_MPD_PORT: u16 = 6600;
pub const DEFAULT_METADATA_OUTPUT: &str = "/app/public/metadata.json";
pub const DEFAULT_METADATA_POLL: Duration = Duration::from_secs(2);
pub const MPD_TIMEOUT: Duration = Duration::from_secs(3);
pub const SNAPSERVER_TIMEOUT: Duration = Duration::from_secs(5);
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
/// MusicBrainz asks for no more than one request per second.
pub const MUSICBRAINZ_SPACING: Duration = Duration::from_millis(1100);
pub const ARTWORK_CACHE_ENTRIES: u64 = 256;
