/*
 *  pcm.rs
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
//! PCM ingestion from the snapclient FIFO (or any s16le byte stream).
//!
//! Reads are blocking so they live on their own OS thread; chunks are handed
//! to the analysis task over a bounded channel.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::thread;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc::Sender;

use crate::config::SpectrumConfig;
use crate::constants::{
    BYTES_PER_SAMPLE, MAX_CONSECUTIVE_ERRORS, SOURCE_ERROR_BACKOFF, SOURCE_RETRY_BACKOFF,
};

#[derive(Debug, Error)]
pub enum PcmError {
    #[error("PCM source {path} not present")]
    Missing { path: PathBuf },
    #[error("failed to open PCM source {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("PCM read failed: {0}")]
    Read(#[from] io::Error),
    #[error("unsupported channel count {0}")]
    Channels(u16),
}

/// What the reader thread hands to the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum PcmEvent {
    /// one hop of mono samples, 16-bit scale
    Chunk(Vec<f32>),
    /// end of stream or short read; the source is being reopened
    SourceLost,
}

/// Interleaved little-endian i16 to mono f32, stereo averaged L/R.
/// A trailing partial frame is ignored.
pub fn downmix(bytes: &[u8], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let frame_bytes = channels * BYTES_PER_SAMPLE;
    bytes
        .chunks_exact(frame_bytes)
        .map(|frame| {
            let sum: f32 = frame
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|s| i16::from_le_bytes([s[0], s[1]]) as f32)
                .sum();
            sum / channels as f32
        })
        .collect()
}

/// A reopenable byte source delivering fixed size reads.
pub struct PcmSource {
    path: PathBuf,
    channels: u16,
    buf: Vec<u8>,
    file: Option<File>,
}

impl PcmSource {
    pub fn new(path: impl AsRef<Path>, channels: u16, hop_size: usize) -> Result<Self, PcmError> {
        if !(1..=2).contains(&channels) {
            return Err(PcmError::Channels(channels));
        }
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            channels,
            buf: vec![0u8; hop_size * channels as usize * BYTES_PER_SAMPLE],
            file: None,
        })
    }

    pub fn from_config(cfg: &SpectrumConfig) -> Result<Self, PcmError> {
        Self::new(&cfg.source, cfg.channels, cfg.hop_size())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes requested per read.
    pub fn chunk_bytes(&self) -> usize {
        self.buf.len()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Open the source. A FIFO blocks here until a writer appears.
    pub fn open(&mut self) -> Result<(), PcmError> {
        match File::open(&self.path) {
            Ok(f) => {
                self.file = Some(f);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PcmError::Missing { path: self.path.clone() })
            }
            Err(source) => Err(PcmError::Open { path: self.path.clone(), source }),
        }
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Read exactly one chunk. `Ok(None)` means end of stream or a short
    /// read: the source is closed and must be reopened.
    pub fn read_chunk(&mut self) -> Result<Option<Vec<f32>>, PcmError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(None);
        };
        match file.read_exact(&mut self.buf) {
            Ok(()) => Ok(Some(downmix(&self.buf, self.channels))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.close();
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => {
                self.close();
                Err(PcmError::Read(e))
            }
        }
    }
}

/// Run the blocking read loop on a dedicated thread. The thread ends once the
/// receiving side of `tx` is gone.
pub fn spawn_reader(mut source: PcmSource, tx: Sender<PcmEvent>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("pcm-reader".into())
        .spawn(move || read_loop(&mut source, &tx))
}

fn read_loop(source: &mut PcmSource, tx: &Sender<PcmEvent>) {
    let mut consecutive_errors = 0u32;
    let mut missing_logged = false;

    info!(
        "pcm reader on {} ({} bytes per chunk)",
        source.path().display(),
        source.chunk_bytes()
    );

    loop {
        if tx.is_closed() {
            break;
        }

        if !source.is_open() {
            match source.open() {
                Ok(()) => {
                    info!("pcm source {} opened", source.path().display());
                    missing_logged = false;
                }
                Err(PcmError::Missing { path }) => {
                    if !missing_logged {
                        warn!("pcm source {} missing, waiting", path.display());
                        missing_logged = true;
                    }
                    thread::sleep(SOURCE_RETRY_BACKOFF);
                    continue;
                }
                Err(e) => {
                    note_failure(&mut consecutive_errors, &e);
                    thread::sleep(SOURCE_ERROR_BACKOFF);
                    continue;
                }
            }
        }

        match source.read_chunk() {
            Ok(Some(samples)) => {
                consecutive_errors = 0;
                if tx.blocking_send(PcmEvent::Chunk(samples)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                if !source.is_open() {
                    debug!("pcm source closed, reopening");
                    if tx.blocking_send(PcmEvent::SourceLost).is_err() {
                        break;
                    }
                    thread::sleep(SOURCE_RETRY_BACKOFF);
                }
            }
            Err(e) => {
                note_failure(&mut consecutive_errors, &e);
                if tx.blocking_send(PcmEvent::SourceLost).is_err() {
                    break;
                }
                thread::sleep(SOURCE_ERROR_BACKOFF);
            }
        }
    }
    info!("pcm reader stopped");
}

fn note_failure(count: &mut u32, e: &PcmError) {
    *count += 1;
    warn!("pcm source error ({}/{}): {e}", count, MAX_CONSECUTIVE_ERRORS);
    if *count >= MAX_CONSECUTIVE_ERRORS {
        error!(
            "pcm source failed {} times in a row, check the snapclient player \
             (--player file or pipe) and the PCM_SOURCE path",
            count
        );
        *count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn le(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let p = std::env::temp_dir().join(format!("snapviz-{}-{name}", std::process::id()));
        let mut f = File::create(&p).unwrap();
        f.write_all(bytes).unwrap();
        p
    }

    #[test]
    fn stereo_is_averaged() {
        let bytes = le(&[1000, 3000, -200, 200, i16::MIN, i16::MIN]);
        assert_eq!(downmix(&bytes, 2), vec![2000.0, 0.0, -32768.0]);
    }

    #[test]
    fn mono_passes_through_and_partial_frame_dropped() {
        let mut bytes = le(&[5, -7, 32767]);
        bytes.push(0x12);
        assert_eq!(downmix(&bytes, 1), vec![5.0, -7.0, 32767.0]);
        assert!(downmix(&le(&[1, 2, 3]), 2).len() == 1);
    }

    #[test]
    fn reads_whole_chunks_then_reports_short_read() {
        // two full stereo chunks of 4 frames, then half a chunk
        let samples: Vec<i16> = (0..20).map(|i| i * 100).collect();
        let path = temp_file("chunks", &le(&samples));
        let mut src = PcmSource::new(&path, 2, 4).unwrap();
        assert_eq!(src.chunk_bytes(), 16);
        src.open().unwrap();

        let a = src.read_chunk().unwrap().unwrap();
        assert_eq!(a, vec![50.0, 250.0, 450.0, 650.0]);
        let b = src.read_chunk().unwrap().unwrap();
        assert_eq!(b.len(), 4);
        assert!(src.read_chunk().unwrap().is_none());
        assert!(!src.is_open());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_source_is_distinguished() {
        let mut src = PcmSource::new("/nonexistent/snapviz/fifo", 2, 1470).unwrap();
        assert!(matches!(src.open(), Err(PcmError::Missing { .. })));
        assert!(src.read_chunk().unwrap().is_none());
    }

    #[test]
    fn channel_count_checked() {
        assert!(matches!(PcmSource::new("/tmp/x", 6, 10), Err(PcmError::Channels(6))));
    }

    #[tokio::test]
    async fn reader_thread_delivers_chunks_and_loss() {
        let samples: Vec<i16> = vec![1000; 2 * 8 * 2];
        let path = temp_file("thread", &le(&samples));
        let src = PcmSource::new(&path, 2, 8).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let handle = spawn_reader(src, tx).unwrap();

        assert_eq!(rx.recv().await, Some(PcmEvent::Chunk(vec![1000.0; 8])));
        assert_eq!(rx.recv().await, Some(PcmEvent::Chunk(vec![1000.0; 8])));
        assert_eq!(rx.recv().await, Some(PcmEvent::SourceLost));
        drop(rx);
        let _ = std::fs::remove_file(&path);
        tokio::task::spawn_blocking(move || handle.join()).await.unwrap().unwrap();
    }
}
