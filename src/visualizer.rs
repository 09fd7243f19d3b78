/*
 *  visualizer.rs
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
//! analysis worker - owns the spectrum engine and publishes one frame for
//! every PCM chunk it receives. Band count changes arrive as commands.

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use log::{debug, error, info};

use crate::broadcast::PushChannel;
use crate::pcm::PcmEvent;
use crate::spectrum::SpectrumEngine;

/// Commands sent to the background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VizCommand {
    Reconfigure(usize),        // rebuild the engine with n bands
    Shutdown,                  // stop worker
}

/// Public handle for the analysis worker.
pub struct Visualizer {
    cmd_tx: Sender<VizCommand>,
    join: Option<JoinHandle<()>>,
}

impl Visualizer {
    /// Spawn the worker. It consumes `pcm_rx` and publishes every frame on `out`.
    pub fn spawn(engine: SpectrumEngine, pcm_rx: Receiver<PcmEvent>, out: PushChannel) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<VizCommand>(16);

        // subscribers learn the band count before any audio arrives
        out.publish(engine.silence_frame());

        let join = tokio::spawn(async move {
            visualizer_worker(engine, cmd_rx, pcm_rx, out).await
        });

        Self { cmd_tx, join: Some(join) }
    }

    /// Sender for other components (the push channel) to queue commands.
    pub fn commands(&self) -> Sender<VizCommand> {
        self.cmd_tx.clone()
    }

    // Keep caller-side simple (no .await); best-effort send.
    pub fn reconfigure(&self, bands: usize) {
        let _ = self.cmd_tx.try_send(VizCommand::Reconfigure(bands));
    }

    /// Ask the worker to stop and wait for it.
    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(VizCommand::Shutdown).await;
        if let Some(handle) = self.join.take() {
            let _ = handle.await;
        }
    }

    /// Wait for the worker to finish on its own (PCM channel closed).
    pub async fn finished(&mut self) {
        if let Some(handle) = self.join.as_mut() {
            let _ = handle.await;
            self.join = None;
        }
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(VizCommand::Shutdown);
        if let Some(handle) = self.join.take() {
            handle.abort();
        }
    }
}

async fn visualizer_worker(
    mut engine: SpectrumEngine,
    mut cmd_rx: Receiver<VizCommand>,
    mut pcm_rx: Receiver<PcmEvent>,
    out: PushChannel,
) {
    info!(
        "visualizer worker started: {} bands, {} mode, fft {}",
        engine.band_count(),
        engine.band_mode(),
        engine.settings().fft_size
    );
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            // commands go first so a resize lands before the next chunk
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(VizCommand::Reconfigure(bands)) => {
                    if bands == engine.band_count() {
                        continue;
                    }
                    match engine.reconfigure(bands) {
                        Ok(next) => {
                            info!("visualizer: {} -> {} bands", engine.band_count(), next.band_count());
                            engine = next;
                            out.publish(engine.silence_frame());
                        }
                        Err(e) => error!("visualizer: reconfigure to {bands} bands refused: {e}"),
                    }
                }
                Some(VizCommand::Shutdown) | None => break,
            },

            event = pcm_rx.recv() => match event {
                Some(PcmEvent::Chunk(samples)) => {
                    let frame = engine.process_chunk(&samples);
                    out.publish(frame);
                    frames += 1;
                }
                Some(PcmEvent::SourceLost) => {
                    debug!("visualizer: source lost, holding at floor");
                    engine.reset();
                    out.publish(engine.silence_frame());
                }
                None => {
                    info!("visualizer: pcm channel closed");
                    break;
                }
            },
        }
    }
    info!("visualizer worker stopped after {frames} frames");
}
