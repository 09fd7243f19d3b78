/*
 *  snapcast.rs
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
//! Snapserver JSON-RPC over raw TCP, `\r\n` framed.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::constants::SNAPSERVER_TIMEOUT;
use crate::metadata::TrackMetadata;

#[derive(Debug, Error)]
pub enum SnapcastError {
    #[error("cannot reach snapserver at {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("snapserver I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("snapserver did not answer within {0:?}")]
    Timeout(Duration),
    #[error("snapserver closed the connection before replying")]
    NoResponse,
    #[error("bad JSON from snapserver: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapserver error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("snapserver response missing 'result'")]
    MissingResult,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u32,
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u32>,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

/// The parts of `Server.GetStatus` we look at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub server: Server,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub stream_id: String,
    #[serde(default)]
    pub clients: Vec<Client>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Client {
    #[serde(default)]
    pub host: Host,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub properties: StreamProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamProperties {
    #[serde(default)]
    pub metadata: StreamMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamMetadata {
    #[serde(default, deserialize_with = "text_or_list")]
    pub title: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub artist: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub album: String,
    #[serde(default, rename = "artUrl")]
    pub art_url: String,
}

// newer snapservers send artist (and sometimes others) as a list
fn text_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    })
}

impl ServerStatus {
    /// Accepts either the whole RPC reply or just its `result`.
    pub fn from_value(v: &Value) -> Result<Self, serde_json::Error> {
        let body = v.get("result").unwrap_or(v);
        ServerStatus::deserialize(body)
    }
}

/// Metadata for the stream feeding the group that holds `client_id`.
/// An unknown client or stream reads as not playing.
pub fn stream_metadata_for_client(status: &ServerStatus, client_id: &str) -> TrackMetadata {
    let group = status
        .server
        .groups
        .iter()
        .find(|g| g.clients.iter().any(|c| c.host.name == client_id));
    let Some(group) = group else {
        return TrackMetadata::default();
    };
    let Some(stream) = status.server.streams.iter().find(|s| s.id == group.stream_id) else {
        return TrackMetadata::default();
    };
    let md = &stream.properties.metadata;
    TrackMetadata {
        playing: stream.status == "playing",
        title: md.title.clone(),
        artist: md.artist.clone(),
        album: md.album.clone(),
        artwork: md.art_url.clone(),
        stream_id: group.stream_id.clone(),
        ..TrackMetadata::default()
    }
}

#[derive(Debug)]
pub struct SnapcastClient {
    host: String,
    port: u16,
    timeout: Duration,
    next_id: AtomicU32,
}

impl SnapcastClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout: SNAPSERVER_TIMEOUT,
            next_id: AtomicU32::new(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Send one request and return its `result`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, SnapcastError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match timeout(self.timeout, self.exchange(id, method, params)).await {
            Ok(res) => res,
            Err(_) => Err(SnapcastError::Timeout(self.timeout)),
        }
    }

    async fn exchange(&self, id: u32, method: &str, params: Value) -> Result<Value, SnapcastError> {
        let addr = self.address();
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| SnapcastError::Connect { addr: addr.clone(), source })?;

        let req = RpcRequest { id, jsonrpc: "2.0", method, params };
        let mut line = serde_json::to_vec(&req)?;
        line.extend_from_slice(b"\r\n");
        stream.write_all(&line).await?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(SnapcastError::NoResponse);
            }
            buf.extend_from_slice(&chunk[..n]);

            // complete lines only; notifications may precede the reply
            while let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
                let msg: Vec<u8> = buf.drain(..pos + 2).collect();
                let text = String::from_utf8_lossy(&msg[..pos]);
                if text.trim().is_empty() {
                    continue;
                }
                let resp: RpcResponse = serde_json::from_str(text.trim())?;
                if resp.id != Some(id) {
                    debug!("snapserver: skipping message without our id");
                    continue;
                }
                if let Some(err) = resp.error {
                    return Err(SnapcastError::Rpc { code: err.code, message: err.message });
                }
                return resp.result.ok_or(SnapcastError::MissingResult);
            }
        }
    }

    pub async fn server_status(&self) -> Result<ServerStatus, SnapcastError> {
        let result = self.request("Server.GetStatus", json!({})).await?;
        Ok(ServerStatus::from_value(&result)?)
    }

    pub async fn metadata_for(&self, client_id: &str) -> Result<TrackMetadata, SnapcastError> {
        let status = self.server_status().await?;
        Ok(stream_metadata_for_client(&status, client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn status_doc() -> Value {
        json!({
            "id": 1, "jsonrpc": "2.0",
            "result": { "server": {
                "groups": [
                    { "id": "g1", "stream_id": "radio", "clients": [ { "host": { "name": "kitchen" } } ] },
                    { "id": "g2", "stream_id": "mpd", "clients": [
                        { "host": { "name": "lounge" } }, { "host": { "name": "study" } } ] }
                ],
                "streams": [
                    { "id": "radio", "status": "idle", "properties": { "metadata": { "title": "News" } } },
                    { "id": "mpd", "status": "playing", "properties": { "metadata": {
                        "title": "Song", "artist": ["A", "B"], "album": "Record",
                        "artUrl": "http://snapserver/art.jpg" } } }
                ]
            }}
        })
    }

    #[test]
    fn finds_client_stream() {
        let status = ServerStatus::from_value(&status_doc()).unwrap();
        let t = stream_metadata_for_client(&status, "study");
        assert!(t.playing);
        assert_eq!(t.title, "Song");
        assert_eq!(t.artist, "A, B");
        assert_eq!(t.album, "Record");
        assert_eq!(t.artwork, "http://snapserver/art.jpg");
        assert_eq!(t.stream_id, "mpd");

        let idle = stream_metadata_for_client(&status, "kitchen");
        assert!(!idle.playing);
        assert_eq!(idle.title, "News");
    }

    #[test]
    fn unknown_client_not_playing() {
        let status = ServerStatus::from_value(&status_doc()).unwrap();
        let t = stream_metadata_for_client(&status, "garage");
        assert_eq!(t, TrackMetadata::default());
        let empty = ServerStatus::from_value(&json!({})).unwrap();
        assert!(!stream_metadata_for_client(&empty, "kitchen").playing);
    }

    #[tokio::test]
    async fn request_over_tcp_skips_notifications() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let req: Value = serde_json::from_str(line.trim()).unwrap();
            assert_eq!(req["method"], "Server.GetStatus");
            assert_eq!(req["jsonrpc"], "2.0");
            let note = json!({"jsonrpc": "2.0", "method": "Client.OnVolumeChanged", "params": {}});
            let mut reply = status_doc();
            reply["id"] = req["id"].clone();
            let out = format!("{note}\r\n{reply}\r\n");
            // split mid-message to exercise reassembly
            let (a, b) = out.split_at(out.len() / 2);
            reader.get_mut().write_all(a.as_bytes()).await.unwrap();
            reader.get_mut().flush().await.unwrap();
            reader.get_mut().write_all(b.as_bytes()).await.unwrap();
        });

        let client = SnapcastClient::new("127.0.0.1", port);
        let t = client.metadata_for("lounge").await.unwrap();
        assert!(t.playing);
        assert_eq!(t.stream_id, "mpd");
    }

    #[tokio::test]
    async fn rpc_error_surfaces() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let req: Value = serde_json::from_str(line.trim()).unwrap();
            let reply = json!({"id": req["id"], "jsonrpc": "2.0",
                "error": {"code": -32601, "message": "Method not found"}});
            reader.get_mut().write_all(format!("{reply}\r\n").as_bytes()).await.unwrap();
        });
        let err = SnapcastClient::new("127.0.0.1", port)
            .request("Bogus.Method", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapcastError::Rpc { code: -32601, .. }));
    }
}
