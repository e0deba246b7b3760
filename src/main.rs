// flowcorrelate: correlates BGP routing updates with NetFlow traffic samples
// around a route change.
// Copyright (C) 2026 NSG
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use flowcorrelate::config::Settings;
use flowcorrelate::ingress;
use flowcorrelate::sink::Sink;
use flowcorrelate::ticker::{Shared, Ticker};

/// Correlates BGP routing updates with NetFlow traffic samples around the
/// update time.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Path to the log4rs logging configuration.
    #[arg(long, default_value = "log4rs.yml")]
    log_config: String,
}

fn init_logging(path: &str) {
    if let Err(e) = log4rs::init_file(path, Default::default()) {
        eprintln!("failed to load logging config {path}, falling back to stderr: {e}");
        let _ = log4rs::init_config(
            log4rs::config::Config::builder()
                .appender(log4rs::config::Appender::builder().build(
                    "stderr",
                    Box::new(
                        log4rs::append::console::ConsoleAppender::builder().build(),
                    ),
                ))
                .build(
                    log4rs::config::Root::builder()
                        .appender("stderr")
                        .build(log::LevelFilter::Info),
                )
                .unwrap(),
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_config);

    let settings = Settings::load(&cli.config).context("loading configuration")?;

    let socket = ingress::bgp::bind(&settings.bgp_socket_path)
        .context("binding BGP ingress socket")?;
    let sink = Sink::open(&settings.sink_path).context("opening correlation sink")?;

    let shared = Shared::new(settings.queue_max_len);
    let mut ticker = Ticker::new(shared.clone(), sink, settings.time_settings.clone());

    let bgp_thread = ingress::bgp::spawn(socket, shared.clone());

    let client = reqwest::Client::builder()
        .timeout(settings.http_timeout())
        .build()
        .context("building HTTP client")?;
    let flow_task = ingress::flow::spawn(
        client,
        settings.url.clone(),
        settings.query_params.clone(),
        shared.clone(),
    );

    let mut shutdown = shutdown_signal();
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            tick = interval.tick() => {
                let utime = chrono::Utc::now().timestamp();
                let _ = tick;
                ticker.tick(utime);
            }
            _ = &mut shutdown => {
                log::info!("received shutdown signal, exiting");
                break;
            }
        }
    }

    flow_task.abort();
    drop(bgp_thread);
    Ok(())
}

/// Resolves once either SIGINT or SIGTERM is received, matching the
/// reference implementation's `signal.Notify(sigint, syscall.SIGTERM,
/// syscall.SIGINT)`.
fn shutdown_signal() -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    })
}
