/*
 *  artwork.rs
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
//! Album art and artist image lookup.
//!
//! Album art: iTunes search, then MusicBrainz release + Cover Art Archive.
//! Artist image: MusicBrainz artist, its Wikidata link, the `P18` image on
//! Wikimedia Commons. Every lookup ends in a URL or an empty string and the
//! answer, empty or not, is cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use mini_moka::sync::Cache;
use reqwest::{Client, Url};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::constants::{ARTWORK_CACHE_ENTRIES, HTTP_TIMEOUT, MUSICBRAINZ_SPACING};

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad URL {0}")]
    Url(String),
}

/// Service base URLs, swappable for tests or mirrors.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub itunes: String,
    pub musicbrainz: String,
    pub cover_art: String,
    pub wikidata: String,
    pub commons: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            itunes: "https://itunes.apple.com".into(),
            musicbrainz: "https://musicbrainz.org".into(),
            cover_art: "https://coverartarchive.org".into(),
            wikidata: "https://www.wikidata.org".into(),
            commons: "https://commons.wikimedia.org/wiki/".into(),
        }
    }
}

#[derive(Clone)]
pub struct ArtworkResolver {
    client: Client,
    endpoints: Endpoints,
    albums: Arc<Cache<String, String>>,
    artists: Arc<Cache<String, String>>,
    mb_last: Arc<Mutex<Option<Instant>>>,
    mb_spacing: Duration,
}

impl ArtworkResolver {
    pub fn new() -> Result<Self, ArtworkError> {
        Self::with_endpoints(Endpoints::default())
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Result<Self, ArtworkError> {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .user_agent(VERSION)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoints,
            albums: Arc::new(Cache::new(ARTWORK_CACHE_ENTRIES)),
            artists: Arc::new(Cache::new(ARTWORK_CACHE_ENTRIES)),
            mb_last: Arc::new(Mutex::new(None)),
            mb_spacing: MUSICBRAINZ_SPACING,
        })
    }

    /// MusicBrainz asks for at most one request a second.
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.mb_spacing = spacing;
        self
    }

    /// Album cover URL, empty when nothing is found.
    pub async fn album_art(&self, artist: &str, album: &str) -> String {
        if artist.is_empty() || album.is_empty() {
            return String::new();
        }
        let key = format!("{artist}|{album}");
        if let Some(hit) = self.albums.get(&key) {
            return hit;
        }

        let url = match self.itunes_art(artist, album).await {
            Ok(Some(url)) => {
                info!("iTunes artwork for {artist} - {album}");
                url
            }
            other => {
                if let Err(e) = other {
                    debug!("iTunes lookup failed: {e}");
                }
                match self.cover_art_archive(artist, album).await {
                    Ok(Some(url)) => {
                        info!("MusicBrainz artwork for {artist} - {album}");
                        url
                    }
                    Ok(None) => String::new(),
                    Err(e) => {
                        debug!("MusicBrainz artwork failed: {e}");
                        String::new()
                    }
                }
            }
        };
        self.albums.insert(key, url.clone());
        url
    }

    /// Artist photo URL, empty when nothing is found.
    pub async fn artist_image(&self, artist: &str) -> String {
        if artist.is_empty() {
            return String::new();
        }
        if let Some(hit) = self.artists.get(&artist.to_string()) {
            return hit;
        }
        let url = match self.wikidata_image(artist).await {
            Ok(Some(url)) => {
                info!("artist image for {artist}");
                url
            }
            Ok(None) => String::new(),
            Err(e) => {
                debug!("artist image lookup failed: {e}");
                String::new()
            }
        };
        self.artists.insert(artist.to_string(), url.clone());
        url
    }

    async fn itunes_art(&self, artist: &str, album: &str) -> Result<Option<String>, ArtworkError> {
        let url = format!("{}/search", self.endpoints.itunes);
        let term = format!("{artist} {album}");
        let body: Value = self
            .client
            .get(url)
            .query(&[("term", term.as_str()), ("media", "music"), ("entity", "album"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if body["resultCount"].as_u64().unwrap_or(0) == 0 {
            return Ok(None);
        }
        Ok(body["results"][0]["artworkUrl100"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(upgrade_itunes_art))
    }

    async fn cover_art_archive(&self, artist: &str, album: &str) -> Result<Option<String>, ArtworkError> {
        let url = format!("{}/ws/2/release", self.endpoints.musicbrainz);
        let query = format!("artist:\"{artist}\" AND release:\"{album}\"");
        let body = self.musicbrainz(&url, &[("query", query.as_str()), ("fmt", "json"), ("limit", "1")]).await?;
        Ok(body["releases"][0]["id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|mbid| format!("{}/release/{mbid}/front-500", self.endpoints.cover_art)))
    }

    async fn wikidata_image(&self, artist: &str) -> Result<Option<String>, ArtworkError> {
        let url = format!("{}/ws/2/artist", self.endpoints.musicbrainz);
        let query = format!("artist:\"{artist}\"");
        let found = self.musicbrainz(&url, &[("query", query.as_str()), ("fmt", "json"), ("limit", "1")]).await?;
        let Some(mbid) = found["artists"][0]["id"].as_str().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let url = format!("{}/ws/2/artist/{mbid}", self.endpoints.musicbrainz);
        let details = self.musicbrainz(&url, &[("inc", "url-rels"), ("fmt", "json")]).await?;
        let Some(qid) = wikidata_id(&details) else {
            return Ok(None);
        };

        let url = format!("{}/wiki/Special:EntityData/{qid}.json", self.endpoints.wikidata);
        let entity: Value = self.client.get(url).send().await?.error_for_status()?.json().await?;
        let image = entity["entities"][qid.as_str()]["claims"]["P18"][0]["mainsnak"]["datavalue"]["value"]
            .as_str()
            .filter(|s| !s.is_empty());
        match image {
            Some(name) => Ok(Some(commons_file_url(&self.endpoints.commons, name)?)),
            None => Ok(None),
        }
    }

    async fn musicbrainz(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ArtworkError> {
        let mut last = self.mb_last.lock().await;
        if let Some(t) = *last {
            let wait = self.mb_spacing.saturating_sub(t.elapsed());
            if !wait.is_zero() {
                sleep(wait).await;
            }
        }
        let res = self.client.get(url).query(query).send().await;
        *last = Some(Instant::now());
        Ok(res?.error_for_status()?.json().await?)
    }
}

/// iTunes serves 100px thumbnails by default; the same path yields 600px.
pub fn upgrade_itunes_art(url: &str) -> String {
    url.replace("100x100", "600x600")
}

/// Wikidata QID from a MusicBrainz `url-rels` artist document.
pub fn wikidata_id(artist: &Value) -> Option<String> {
    artist["relations"]
        .as_array()?
        .iter()
        .filter(|rel| rel["type"] == "wikidata")
        .filter_map(|rel| rel["url"]["resource"].as_str())
        .filter_map(|res| res.trim_end_matches('/').rsplit('/').next())
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// 500px rendition of a Commons file via `Special:FilePath`.
pub fn commons_file_url(base: &str, file_name: &str) -> Result<String, ArtworkError> {
    let mut url = Url::parse(base).map_err(|_| ArtworkError::Url(base.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ArtworkError::Url(base.to_string()))?
        .pop_if_empty()
        .push("Special:FilePath")
        .push(&file_name.replace(' ', "_"));
    url.query_pairs_mut().append_pair("width", "500");
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        routing::get,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Hits = Arc<AtomicUsize>;

    async fn itunes(State(hits): State<Hits>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        if q.get("term").is_some_and(|t| t.contains("Famous")) {
            Json(json!({"resultCount": 1, "results": [
                {"artworkUrl100": "https://is1.example/img/100x100bb.jpg"}]}))
        } else {
            Json(json!({"resultCount": 0, "results": []}))
        }
    }

    async fn release(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        if q.get("query").is_some_and(|t| t.contains("Obscure")) {
            Json(json!({"releases": [{"id": "rel-1"}]}))
        } else {
            Json(json!({"releases": []}))
        }
    }

    async fn artist_search(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        if q.get("query").is_some_and(|t| t.contains("Pictured")) {
            Json(json!({"artists": [{"id": "art-1"}]}))
        } else {
            Json(json!({"artists": []}))
        }
    }

    async fn artist_rels(Path(id): Path<String>) -> Json<Value> {
        assert_eq!(id, "art-1");
        Json(json!({"relations": [
            {"type": "discogs", "url": {"resource": "https://discogs.example/a/1"}},
            {"type": "wikidata", "url": {"resource": "https://www.wikidata.org/wiki/Q42"}}]}))
    }

    async fn entity(Path(file): Path<String>) -> Json<Value> {
        assert_eq!(file, "Q42.json");
        Json(json!({"entities": {"Q42": {"claims": {"P18": [
            {"mainsnak": {"datavalue": {"value": "Band on stage.jpg"}}}]}}}}))
    }

    async fn fake_services() -> (Endpoints, Hits) {
        let hits: Hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/search", get(itunes))
            .route("/ws/2/release", get(release))
            .route("/ws/2/artist", get(artist_search))
            .route("/ws/2/artist/{id}", get(artist_rels))
            .route("/wiki/Special:EntityData/{file}", get(entity))
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let endpoints = Endpoints {
            itunes: base.clone(),
            musicbrainz: base.clone(),
            cover_art: "https://caa.example".into(),
            wikidata: base.clone(),
            commons: format!("{base}/wiki/"),
        };
        (endpoints, hits)
    }

    fn resolver(endpoints: Endpoints) -> ArtworkResolver {
        ArtworkResolver::with_endpoints(endpoints)
            .unwrap()
            .with_spacing(Duration::from_millis(10))
    }

    #[test]
    fn url_helpers() {
        assert_eq!(
            upgrade_itunes_art("https://x/100x100bb.jpg"),
            "https://x/600x600bb.jpg"
        );
        assert_eq!(
            commons_file_url("https://commons.wikimedia.org/wiki/", "A B.png").unwrap(),
            "https://commons.wikimedia.org/wiki/Special:FilePath/A_B.png?width=500"
        );
        let doc = json!({"relations": [{"type": "wikidata", "url": {"resource": "https://www.wikidata.org/wiki/Q2831/"}}]});
        assert_eq!(wikidata_id(&doc).as_deref(), Some("Q2831"));
        assert_eq!(wikidata_id(&json!({})), None);
    }

    #[tokio::test]
    async fn itunes_first_and_cached() {
        let (endpoints, hits) = fake_services().await;
        let r = resolver(endpoints);
        let url = r.album_art("Famous Band", "Hits").await;
        assert_eq!(url, "https://is1.example/img/600x600bb.jpg");
        assert_eq!(r.album_art("Famous Band", "Hits").await, url);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_to_cover_art_archive() {
        let (endpoints, _) = fake_services().await;
        let r = resolver(endpoints);
        assert_eq!(
            r.album_art("Obscure Act", "Demo").await,
            "https://caa.example/release/rel-1/front-500"
        );
    }

    #[tokio::test]
    async fn misses_are_empty_and_cached() {
        let (endpoints, hits) = fake_services().await;
        let r = resolver(endpoints);
        assert_eq!(r.album_art("Nobody", "Nothing").await, "");
        assert_eq!(r.album_art("Nobody", "Nothing").await, "");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(r.album_art("", "Nothing").await, "");
        assert_eq!(r.artist_image("Unknown").await, "");
    }

    #[tokio::test]
    async fn artist_image_via_wikidata() {
        let (endpoints, _) = fake_services().await;
        let commons = endpoints.commons.clone();
        let r = resolver(endpoints);
        assert_eq!(
            r.artist_image("Pictured Band").await,
            format!("{commons}Special:FilePath/Band_on_stage.jpg?width=500")
        );
    }

    #[tokio::test]
    async fn unreachable_services_degrade_to_empty() {
        let endpoints = Endpoints {
            itunes: "http://127.0.0.1:9".into(),
            musicbrainz: "http://127.0.0.1:9".into(),
            cover_art: "http://127.0.0.1:9".into(),
            wikidata: "http://127.0.0.1:9".into(),
            commons: "http://127.0.0.1:9/wiki/".into(),
        };
        let r = resolver(endpoints);
        assert_eq!(r.album_art("A", "B").await, "");
        assert_eq!(r.artist_image("A").await, "");
    }
}
