/*
 *  mpd.rs
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
//! Minimal MPD text protocol client, read only.

use std::io;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::constants::MPD_TIMEOUT;
use crate::metadata::TrackMetadata;

#[derive(Debug, Error)]
pub enum MpdError {
    #[error("cannot reach mpd at {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("mpd I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("mpd did not answer within {0:?}")]
    Timeout(Duration),
    #[error("unexpected mpd greeting '{0}'")]
    Greeting(String),
    #[error("mpd refused command: {0}")]
    Ack(String),
}

/// `key: value` pairs of one response, keys lower-cased, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MpdResponse {
    pairs: Vec<(String, String)>,
}

impl MpdResponse {
    pub fn parse(text: &str) -> Self {
        let pairs = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MpdClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl MpdClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, timeout: MPD_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// One connection per command, as cheap as it gets with MPD.
    pub async fn command(&self, cmd: &str) -> Result<MpdResponse, MpdError> {
        match timeout(self.timeout, self.exchange(cmd)).await {
            Ok(res) => res,
            Err(_) => Err(MpdError::Timeout(self.timeout)),
        }
    }

    async fn exchange(&self, cmd: &str) -> Result<MpdResponse, MpdError> {
        let addr = self.address();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| MpdError::Connect { addr: addr.clone(), source })?;
        let mut reader = BufReader::new(stream);

        let mut greeting = String::new();
        reader.read_line(&mut greeting).await?;
        if !greeting.starts_with("OK MPD") {
            return Err(MpdError::Greeting(greeting.trim().to_string()));
        }

        reader.get_mut().write_all(format!("{cmd}\n").as_bytes()).await?;
        let raw = read_response(&mut reader).await?;
        let text = String::from_utf8_lossy(&raw);
        if let Some(ack) = text.lines().find(|l| l.starts_with("ACK")) {
            return Err(MpdError::Ack(ack.to_string()));
        }
        debug!("mpd {cmd}: {} bytes", raw.len());
        Ok(MpdResponse::parse(&text))
    }

    pub async fn current_song(&self) -> Result<MpdResponse, MpdError> {
        self.command("currentsong").await
    }

    pub async fn status(&self) -> Result<MpdResponse, MpdError> {
        self.command("status").await
    }

    /// Current track and player state folded into one record.
    pub async fn now_playing(&self) -> Result<TrackMetadata, MpdError> {
        let song = self.current_song().await?;
        let status = self.status().await?;
        Ok(track_from_responses(&song, &status))
    }
}

/// Read until a final `OK` line, an `ACK` line, or the peer closes.
/// Whatever arrived before a close is returned.
pub async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut response = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..n]);
        if response_complete(&response) {
            break;
        }
    }
    Ok(response)
}

fn response_complete(buf: &[u8]) -> bool {
    if !buf.ends_with(b"\n") {
        return false;
    }
    let text = String::from_utf8_lossy(buf);
    text.lines().any(|l| l == "OK" || l.starts_with("ACK"))
}

pub fn track_from_responses(song: &MpdResponse, status: &MpdResponse) -> TrackMetadata {
    let file = song.get_or_empty("file");
    let audio = status.get_or_empty("audio");
    let (sample_rate, bit_depth) = parse_audio_format(&audio);
    let duration = status
        .get("duration")
        .or_else(|| song.get("duration"))
        .and_then(|v| v.parse::<f64>().ok());
    TrackMetadata {
        playing: status.get("state") == Some("play"),
        title: song.get_or_empty("title"),
        artist: song.get_or_empty("artist"),
        album: song.get_or_empty("album"),
        codec: detect_codec(&file, &audio),
        file,
        sample_rate,
        bit_depth,
        elapsed: status.get("elapsed").and_then(|v| v.parse::<f64>().ok()),
        duration,
        ..TrackMetadata::default()
    }
}

/// `"44100:16:2"` to `(44100, 16)`. Float samples (`f`) count as 32 bit.
/// Anything malformed is `(0, 0)`.
pub fn parse_audio_format(format: &str) -> (u32, u32) {
    let parts: Vec<&str> = format.trim().split(':').collect();
    if parts.len() < 2 {
        return (0, 0);
    }
    let Ok(rate) = parts[0].parse::<u32>() else {
        return (0, 0);
    };
    let bits = match parts[1] {
        "f" => 32,
        b => b.parse::<u32>().unwrap_or(0),
    };
    (rate, bits)
}

/// Short codec label for the display badge.
pub fn detect_codec(file: &str, format: &str) -> String {
    let lower = file.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return "RADIO".to_string();
    }
    let float_pcm = format.split(':').nth(1) == Some("f");
    // pipe://, alsa:// and friends are not files, whatever their name says
    if float_pcm && lower.contains("://") {
        return "PCM".to_string();
    }
    let name = file.rsplit('/').next().unwrap_or(file);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_uppercase(),
        _ if float_pcm => "PCM".to_string(),
        _ => String::new(),
    }
}
