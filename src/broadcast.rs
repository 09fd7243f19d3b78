/*
 *  broadcast.rs
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
//! WebSocket push channel.
//!
//! Every published string goes to every connected subscriber. Each subscriber
//! runs in its own task with its own broadcast receiver: a slow one lags and
//! skips frames, a dead one is dropped, neither holds up the publisher.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, watch};

use crate::constants::MAX_BANDS;
use crate::visualizer::VizCommand;

/// Publisher side of the push channel. Cheap to clone.
#[derive(Clone)]
pub struct PushChannel {
    tx: broadcast::Sender<String>,
    latest: Arc<watch::Sender<String>>,
}

#[derive(Clone)]
struct WsState {
    tx: broadcast::Sender<String>,
    latest: watch::Receiver<String>,
    commands: Option<mpsc::Sender<VizCommand>>,
}

impl PushChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (latest, _) = watch::channel(String::new());
        Self { tx, latest: Arc::new(latest) }
    }

    /// Send to all current subscribers, returns how many there were.
    /// Nobody listening is not an error.
    pub fn publish(&self, message: String) -> usize {
        self.latest.send_replace(message.clone());
        self.tx.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Last published message, empty before the first publish.
    pub fn latest(&self) -> String {
        self.latest.borrow().clone()
    }

    /// Router serving the channel on `/`. When `commands` is given, inbound
    /// `bands=<n>` text is forwarded as a reconfigure request.
    pub fn router(&self, commands: Option<mpsc::Sender<VizCommand>>) -> Router {
        let state = WsState {
            tx: self.tx.clone(),
            latest: self.latest.subscribe(),
            commands,
        };
        Router::new().route("/", get(ws_handler)).with_state(state)
    }

    /// Bind `0.0.0.0:port` and serve until the process ends.
    pub async fn serve(&self, port: u16, commands: Option<mpsc::Sender<VizCommand>>) -> std::io::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("push channel on ws://{addr}/");
        axum::serve(listener, self.router(commands)).await
    }
}

/// `bands=<n>` from a subscriber, `n` in `1..=MAX_BANDS`; anything else is ignored.
pub fn parse_command(text: &str) -> Option<VizCommand> {
    let (key, value) = text.trim().split_once('=')?;
    if !key.trim().eq_ignore_ascii_case("bands") {
        return None;
    }
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 && n <= MAX_BANDS => Some(VizCommand::Reconfigure(n)),
        _ => None,
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| subscriber_loop(socket, state))
}

async fn subscriber_loop(socket: WebSocket, state: WsState) {
    let mut rx = state.tx.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();
    debug!("subscriber connected ({} total)", state.tx.receiver_count());

    // new subscribers see the current state straight away
    let current = state.latest.borrow().clone();
    if !current.is_empty() && ws_tx.send(Message::Text(current.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break; // gone
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("slow subscriber skipped {skipped} messages");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let (Some(cmd), Some(commands)) = (parse_command(text.as_str()), state.commands.as_ref()) {
                        info!("subscriber requested {cmd:?}");
                        if commands.try_send(cmd).is_err() {
                            warn!("command queue full, request dropped");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("subscriber disconnected");
}
