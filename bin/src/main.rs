#![allow(clippy::cognitive_complexity)]
use std::sync::Arc;

use anyhow::{anyhow, Result};

use pixie_core::{
    config::{
        cli::{self, Parser},
        trace,
    },
    engine::Dhcp6Engine,
    logger::TracingLogger,
    tokio::{self, runtime::Builder, signal},
    tracing::*,
    Server, ShutdownHandle,
};

#[cfg(not(target_env = "musl"))]
use jemallocator::Jemalloc;
use tokio_util::sync::CancellationToken;

#[cfg(not(target_env = "musl"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    // parses from cli or environment var
    let config = cli::Config::parse();
    let trace_config = trace::Config::parse(&config.pixie_log, &config.log_format)?;
    debug!(?config, ?trace_config);
    if let Err(err) = dotenv::dotenv() {
        debug!(?err, ".env file not loaded");
    }

    let mut builder = Builder::new_multi_thread();
    // configure thread name & enable IO/time
    builder.thread_name(&config.thread_name).enable_all();
    // default num threads will be num logical CPUs
    if let Some(num) = config.threads {
        builder.worker_threads(num);
    }
    let rt = builder.build()?;

    rt.block_on(async move {
        match tokio::spawn(async move { start(config).await }).await {
            Err(err) => error!(?err, "failed to start server"),
            Ok(Err(err)) => error!(?err, "exited with error"),
            Ok(_) => debug!("exiting..."),
        }
    });

    Ok(())
}

async fn start(config: cli::Config) -> Result<()> {
    if !config.has_boot_url() {
        warn!("no boot url configured, clients will not be answered");
    }

    let mut server = Server::new(Dhcp6Engine);
    server
        .set_address(config.addr.clone())
        .set_port(config.port.clone())
        .set_boot_config(Arc::new(config.boot_config()))
        .set_address_range(config.pool_start, config.pool_end)
        .set_lease_times(config.lease_times())
        .set_logger(Arc::new(TracingLogger));
    info!(address = ?server.address(), port = server.port(), "starting v6 server");

    let token = CancellationToken::new();
    let signal_task = tokio::spawn(shutdown_signal(token.clone(), server.shutdown_handle()));

    let res = server.serve().await;
    // serve can also end on its own, stop waiting for ctrl-c then
    token.cancel();
    if let Err(err) = signal_task.await {
        error!(?err, "error waiting for signal task");
    }
    res
}

async fn shutdown_signal(token: CancellationToken, handle: ShutdownHandle) -> Result<()> {
    tokio::select! {
        ret = signal::ctrl_c() => {
            debug!("ctrl-c received, shutting down");
            handle.shutdown();
            ret.map_err(|err| anyhow!(err))
        }
        _ = token.cancelled() => Ok(()),
    }
}
