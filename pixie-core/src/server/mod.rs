//! # Server
//!
//! Owns the configuration, derives the server DUID and runs the engine's
//! serving loop until it fails or is asked to shut down.
use anyhow::{anyhow, Result};
use dhcp6::{BootConfiguration, StaticBootConfiguration};
use tracing::trace;

use std::{fmt, net::Ipv6Addr, sync::Arc, time::Duration};

pub mod shutdown;

pub use crate::server::shutdown::ShutdownHandle;
use crate::{
    duid,
    engine::{Connection, Engine},
    logger::{Logger, NoopLogger},
};

/// subsystem tag on every lifecycle event
pub const SUBSYSTEM: &str = "dhcp";
/// default dhcpv6 server port
pub const DEFAULT_PORT: &str = "547";
/// first address handed out by default
pub const DEFAULT_POOL_START: Ipv6Addr =
    Ipv6Addr::new(0x2001, 0xdb8, 0xf00f, 0xcafe, 0, 0, 0, 0x10);
/// last address handed out by default
pub const DEFAULT_POOL_END: Ipv6Addr =
    Ipv6Addr::new(0x2001, 0xdb8, 0xf00f, 0xcafe, 0, 0, 0, 0x100);
/// default preferred lifetime
pub const DEFAULT_PREFERRED_LIFETIME: Duration = Duration::from_secs(1800);
/// default valid lifetime, also how long the pool holds an address
pub const DEFAULT_VALID_LIFETIME: Duration = Duration::from_secs(1850);

/// Lease lifetimes handed to the packet builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTimes {
    /// preferred lifetime (min lease)
    pub preferred: Duration,
    /// valid lifetime (max lease)
    pub valid: Duration,
}

impl Default for LeaseTimes {
    fn default() -> Self {
        Self {
            preferred: DEFAULT_PREFERRED_LIFETIME,
            valid: DEFAULT_VALID_LIFETIME,
        }
    }
}

/// A DHCPv6 server bound to one [`Engine`].
///
/// ```no_run
/// # async fn run() -> anyhow::Result<()> {
/// use pixie_core::{engine::Dhcp6Engine, logger::TracingLogger, Server};
/// use std::sync::Arc;
///
/// let mut server = Server::new(Dhcp6Engine);
/// server.set_logger(Arc::new(TracingLogger));
/// let handle = server.shutdown_handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     handle.shutdown();
/// });
/// server.serve().await
/// # }
/// ```
pub struct Server<E> {
    engine: Arc<E>,
    address: Option<String>,
    port: String,
    duid: Vec<u8>,
    boot_config: Arc<dyn BootConfiguration>,
    pool_start: Ipv6Addr,
    pool_end: Ipv6Addr,
    lease: LeaseTimes,
    logger: Arc<dyn Logger>,
    shutdown: ShutdownHandle,
}

/// Disarms the shutdown handle and closes the connection when one `serve`
/// call ends, however it ends.
struct ServeGuard<C: Connection> {
    conn: Arc<C>,
    shutdown: ShutdownHandle,
}

impl<C: Connection> Drop for ServeGuard<C> {
    fn drop(&mut self) {
        self.shutdown.disarm();
        self.conn.close();
    }
}

impl<E> fmt::Debug for Server<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("duid", &self.duid)
            .field("boot_config", &self.boot_config)
            .field("pool_start", &self.pool_start)
            .field("pool_end", &self.pool_end)
            .field("lease", &self.lease)
            .finish()
    }
}

impl<E: Engine> Server<E> {
    /// New server on the default port, listening on all addresses
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            address: None,
            port: DEFAULT_PORT.to_owned(),
            duid: Vec::new(),
            boot_config: Arc::new(StaticBootConfiguration::default()),
            pool_start: DEFAULT_POOL_START,
            pool_end: DEFAULT_POOL_END,
            lease: LeaseTimes::default(),
            logger: Arc::new(NoopLogger),
            shutdown: ShutdownHandle::default(),
        }
    }

    /// address to bind, `None` for all
    pub fn set_address(&mut self, address: Option<String>) -> &mut Self {
        self.address = address;
        self
    }

    /// port to bind, parsed by the engine
    pub fn set_port(&mut self, port: impl Into<String>) -> &mut Self {
        self.port = port.into();
        self
    }

    /// Set the server DUID. `serve` recomputes it from the connection's
    /// hardware address.
    pub fn set_duid(&mut self, duid: Vec<u8>) -> &mut Self {
        self.duid = duid;
        self
    }

    /// boot parameters passed through to the engine
    pub fn set_boot_config(&mut self, boot_config: Arc<dyn BootConfiguration>) -> &mut Self {
        self.boot_config = boot_config;
        self
    }

    /// inclusive range of addresses the pool hands out
    pub fn set_address_range(&mut self, start: Ipv6Addr, end: Ipv6Addr) -> &mut Self {
        self.pool_start = start;
        self.pool_end = end;
        self
    }

    /// preferred and valid lifetimes, the valid one also bounds pool leases
    pub fn set_lease_times(&mut self, lease: LeaseTimes) -> &mut Self {
        self.lease = lease;
        self
    }

    /// sink for lifecycle events, silent by default
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) -> &mut Self {
        self.logger = logger;
        self
    }

    /// handle that can stop a running [`Server::serve`] from elsewhere
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Stop a running [`Server::serve`], see [`ShutdownHandle::shutdown`]
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// configured bind address, `None` for all
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// configured bind port
    pub fn port(&self) -> &str {
        &self.port
    }

    /// the server DUID, computed by the last `serve` call
    pub fn duid(&self) -> &[u8] {
        &self.duid
    }

    /// Bind, serve until the serving loop fails or [`Server::shutdown`] is
    /// called, then close the connection.
    ///
    /// Returns `Ok(())` after a shutdown and the loop's error otherwise, a
    /// panicking loop included. A bind failure is returned as-is, before
    /// anything is spawned. Dropping the returned future also disarms the
    /// shutdown handle and closes the connection.
    pub async fn serve(&mut self) -> Result<()> {
        self.logger.log(SUBSYSTEM, "starting...");

        let conn = self.engine.open(self.address.as_deref(), &self.port).await?;

        self.logger.debug(SUBSYSTEM, "new connection...");

        let (tx, mut rx) = shutdown::termination();
        self.shutdown.arm(tx.clone());
        let guard = ServeGuard {
            conn: Arc::clone(&conn),
            shutdown: self.shutdown.clone(),
        };

        self.duid = duid::duid_llt(&conn.source_hardware_address());

        let pool = self
            .engine
            .random_address_pool(self.pool_start, self.pool_end, self.lease.valid);
        let builder = self.engine.packet_builder(
            &self.duid,
            self.lease.preferred,
            self.lease.valid,
            Arc::clone(&self.boot_config),
            pool,
        );

        let engine = Arc::clone(&self.engine);
        let mut worker = tokio::spawn(async move {
            let res = engine.serve(conn, builder).await;
            if let Err(err) = tx.try_send(res) {
                trace!(?err, "serve already terminated, dropping result");
            }
        });

        // wait for either a fatal error or shutdown. The handle keeps a
        // sender alive until disarmed, so a dead worker is caught by its join
        let res = tokio::select! {
            res = rx.recv() => res.unwrap_or(Ok(())),
            joined = &mut worker => match joined {
                // the worker wrote before exiting, unless shutdown won
                Ok(()) => rx.try_recv().unwrap_or(Ok(())),
                Err(err) => Err(anyhow!(err)),
            },
        };
        drop(guard);

        self.logger.log(SUBSYSTEM, "stopped...");
        res
    }
}
