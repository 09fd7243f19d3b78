/*
 *  snapviz-meta.rs
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
//! Now-playing poller: MPD or Snapserver in, metadata.json and a push channel out.

use anyhow::Context;
use env_logger::Env;
use log::{error, info};

use snapviz::broadcast::PushChannel;
use snapviz::config;
use snapviz::constants::BROADCAST_CAPACITY;
use snapviz::metadata::MetadataService;
use snapviz::signal_handler;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // CLIENT_ID missing is a startup error
    let loaded = config::load_metadata()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(loaded.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("This {} metadata poller worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let cfg = loaded.service;
    info!(
        "client '{}', snapserver {}:{}, mpd port {}, writing {}",
        cfg.client_id,
        cfg.snapserver_host,
        cfg.snapserver_port,
        cfg.mpd_port,
        cfg.output.display()
    );

    let push = PushChannel::new(BROADCAST_CAPACITY);
    let service = MetadataService::new(cfg.clone(), push.clone()).context("metadata service")?;

    let server = {
        let push = push.clone();
        let port = cfg.ws_port;
        tokio::spawn(async move { push.serve(port, None).await })
    };

    tokio::select! {
        res = signal_handler() => {
            res.context("signal handler")?;
        }
        res = server => {
            match res {
                Ok(Err(e)) => {
                    error!("metadata push channel on port {} failed: {e}", cfg.ws_port);
                    return Err(e).context("push channel");
                }
                Ok(Ok(())) => info!("metadata push channel closed"),
                Err(e) => error!("metadata push channel task: {e}"),
            }
        }
        _ = service.run() => {}
    }

    info!("{} metadata poller stopped", env!("CARGO_PKG_NAME"));
    Ok(())
}
