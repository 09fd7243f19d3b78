/*
 *  main.rs
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

use anyhow::Context;
use env_logger::Env;
use log::{error, info};
use tokio::sync::mpsc;

use snapviz::broadcast::PushChannel;
use snapviz::config;
use snapviz::constants::{BROADCAST_CAPACITY, PCM_QUEUE_DEPTH};
use snapviz::pcm::{PcmSource, spawn_reader};
use snapviz::signal_handler;
use snapviz::spectrum::SpectrumEngine;
use snapviz::visualizer::Visualizer;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // configuration errors are fatal, and reported before logging exists
    let loaded = config::load_spectrum()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(loaded.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let cfg = loaded.service;
    let engine = SpectrumEngine::new(&cfg).context("spectrum engine")?;
    info!(
        "{} Hz x{} from {}, fft {} hop {} ({} fps), {} bands {} mode, {} levels",
        cfg.sample_rate,
        cfg.channels,
        cfg.source.display(),
        cfg.fft_size,
        cfg.hop_size(),
        cfg.target_fps,
        engine.band_count(),
        engine.band_mode(),
        cfg.level_mode
    );

    let push = PushChannel::new(BROADCAST_CAPACITY);
    let (pcm_tx, pcm_rx) = mpsc::channel(PCM_QUEUE_DEPTH);
    let source = PcmSource::from_config(&cfg)?;
    let _reader = spawn_reader(source, pcm_tx).context("pcm reader thread")?;

    let viz = Visualizer::spawn(engine, pcm_rx, push.clone());

    let server = {
        let push = push.clone();
        let commands = viz.commands();
        let port = cfg.ws_port;
        tokio::spawn(async move { push.serve(port, Some(commands)).await })
    };

    tokio::select! {
        res = signal_handler() => {
            res.context("signal handler")?;
        }
        res = server => {
            match res {
                Ok(Err(e)) => {
                    error!("push channel on port {} failed: {e}", cfg.ws_port);
                    viz.shutdown().await;
                    return Err(e).context("push channel");
                }
                Ok(Ok(())) => info!("push channel closed"),
                Err(e) => error!("push channel task: {e}"),
            }
        }
    }

    viz.shutdown().await;
    info!("{} stopped", env!("CARGO_PKG_NAME"));
    Ok(())
}
