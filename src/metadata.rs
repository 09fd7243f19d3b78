/*
 *  metadata.rs
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
//! Now playing document for the cover display, and the loop that keeps it fresh.

use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::time::{MissedTickBehavior, interval};

use crate::artwork::{ArtworkError, ArtworkResolver};
use crate::broadcast::PushChannel;
use crate::config::MetadataConfig;
use crate::constants::MAX_CONSECUTIVE_ERRORS;
use crate::mpd::MpdClient;
use crate::snapcast::SnapcastClient;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("artwork client: {0}")]
    Artwork(#[from] ArtworkError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

/// What the display shows. Empty strings and `None` mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub playing: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artwork: String,
    #[serde(default)]
    pub artist_image: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub sample_rate: u32,
    #[serde(default)]
    pub bit_depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stream_id: String,
}

impl TrackMetadata {
    /// Equal apart from the play position.
    pub fn same_track_state(&self, other: &TrackMetadata) -> bool {
        let mut a = self.clone();
        a.elapsed = other.elapsed;
        a == *other
    }
}

/// Write `doc` as pretty JSON via a temp file and rename, so readers never
/// see half a document. Parent directories are created.
pub async fn write_atomic(path: &Path, doc: &TrackMetadata) -> Result<(), MetadataError> {
    let io_err = |source| MetadataError::Write { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(io_err)?;
    }
    let json = serde_json::to_vec_pretty(doc)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json).await.map_err(io_err)?;
    fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

pub struct MetadataService {
    cfg: MetadataConfig,
    mpd: MpdClient,
    snapcast: SnapcastClient,
    artwork: ArtworkResolver,
    push: PushChannel,
    current: Option<TrackMetadata>,
    failures: u32,
}

impl MetadataService {
    pub fn new(cfg: MetadataConfig, push: PushChannel) -> Result<Self, MetadataError> {
        let artwork = ArtworkResolver::new()?;
        Ok(Self::with_parts(cfg, artwork, push))
    }

    pub fn with_parts(cfg: MetadataConfig, artwork: ArtworkResolver, push: PushChannel) -> Self {
        Self {
            mpd: MpdClient::new(&cfg.snapserver_host, cfg.mpd_port),
            snapcast: SnapcastClient::new(&cfg.snapserver_host, cfg.snapserver_port),
            artwork,
            push,
            current: None,
            failures: 0,
            cfg,
        }
    }

    pub fn current(&self) -> Option<&TrackMetadata> {
        self.current.as_ref()
    }

    /// Poll forever at the configured interval.
    pub async fn run(mut self) {
        info!(
            "metadata poller for client '{}' via {} every {:?}",
            self.cfg.client_id,
            self.cfg.snapserver_host,
            self.cfg.poll_interval
        );
        let mut ticker = interval(self.cfg.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// One poll: fetch, enrich, publish on change. Returns true if published.
    pub async fn poll_once(&mut self) -> bool {
        let mut doc = self.fetch().await;

        if doc.playing && !doc.artist.is_empty() {
            if doc.artwork.is_empty() && !doc.album.is_empty() {
                doc.artwork = self.artwork.album_art(&doc.artist, &doc.album).await;
            }
            doc.artist_image = self.artwork.artist_image(&doc.artist).await;
        }

        if self.current.as_ref().is_some_and(|c| c.same_track_state(&doc)) {
            self.current = Some(doc);
            return false;
        }

        match write_atomic(&self.cfg.output, &doc).await {
            Ok(()) => info!(
                "now playing: {} - {}",
                if doc.title.is_empty() { "No title" } else { doc.title.as_str() },
                if doc.artist.is_empty() { "No artist" } else { doc.artist.as_str() }
            ),
            Err(e) => error!("metadata: {e}"),
        }
        match serde_json::to_string(&doc) {
            Ok(json) => {
                self.push.publish(json);
            }
            Err(e) => error!("metadata: {e}"),
        }
        self.current = Some(doc);
        true
    }

    /// MPD first, Snapserver stream metadata when MPD is not there.
    async fn fetch(&mut self) -> TrackMetadata {
        match self.mpd.now_playing().await {
            Ok(doc) => {
                self.failures = 0;
                return doc;
            }
            Err(e) => debug!("mpd: {e}"),
        }
        match self.snapcast.metadata_for(&self.cfg.client_id).await {
            Ok(doc) => {
                self.failures = 0;
                doc
            }
            Err(e) => {
                self.failures += 1;
                warn!("no metadata source ({}/{}): {e}", self.failures, MAX_CONSECUTIVE_ERRORS);
                if self.failures >= MAX_CONSECUTIVE_ERRORS {
                    error!(
                        "neither mpd nor snapserver reachable at {}, check SNAPSERVER_HOST",
                        self.cfg.snapserver_host
                    );
                    self.failures = 0;
                }
                TrackMetadata::default()
            }
        }
    }
}
