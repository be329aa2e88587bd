//! The protocol engine the server drives.
//!
//! [`Server`] only orchestrates: it opens a connection, builds an address pool
//! and a packet builder, and hands both to the engine's serving loop. Any type
//! implementing [`Engine`] can be plugged in; [`Dhcp6Engine`] is the default,
//! backed by the `dhcp6` crate.
//!
//! [`Server`]: crate::server::Server
use anyhow::Result;
use async_trait::async_trait;
use dhcp6::{BootConfiguration, Conn, PacketBuilder, RandomAddressPool};
use tracing::debug;

use std::{net::Ipv6Addr, sync::Arc, time::Duration};

/// A bound network connection handed out by an [`Engine`]
pub trait Connection: Send + Sync + 'static {
    /// hardware address of the interface the connection serves
    fn source_hardware_address(&self) -> Vec<u8>;
    /// stop the connection, the serving loop must return once this is called
    fn close(&self);
}

/// Supplies everything the server needs to answer DHCPv6 clients
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// listening connection
    type Conn: Connection;
    /// address allocator
    type Pool: Send + 'static;
    /// response builder consumed by the serving loop
    type Builder: Send + 'static;

    /// bind a listener on `address` (unset = wildcard) and `port`
    async fn open(&self, address: Option<&str>, port: &str) -> Result<Arc<Self::Conn>>;

    /// pool handing out random addresses in `start..=end` for `lease`
    fn random_address_pool(&self, start: Ipv6Addr, end: Ipv6Addr, lease: Duration)
        -> Self::Pool;

    /// builder answering requests with `duid` as the server identifier
    fn packet_builder(
        &self,
        duid: &[u8],
        min_lease: Duration,
        max_lease: Duration,
        boot_config: Arc<dyn BootConfiguration>,
        pool: Self::Pool,
    ) -> Self::Builder;

    /// run until the connection is closed (`Ok`) or fails (`Err`)
    async fn serve(self: Arc<Self>, conn: Arc<Self::Conn>, builder: Self::Builder) -> Result<()>;
}

/// [`Engine`] backed by the `dhcp6` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct Dhcp6Engine;

impl Connection for Conn {
    fn source_hardware_address(&self) -> Vec<u8> {
        self.hardware_addr().to_vec()
    }

    fn close(&self) {
        Conn::close(self)
    }
}

#[async_trait]
impl Engine for Dhcp6Engine {
    type Conn = Conn;
    type Pool = RandomAddressPool;
    type Builder = PacketBuilder;

    async fn open(&self, address: Option<&str>, port: &str) -> Result<Arc<Conn>> {
        // interface discovery and socket setup are blocking syscalls
        let (address, port) = (address.map(ToOwned::to_owned), port.to_owned());
        let conn = tokio::task::spawn_blocking(move || Conn::open(address.as_deref(), &port))
            .await??;
        debug!(iface = ?conn.iface(), local_addr = ?conn.local_addr().ok(), "opened v6 listener");
        Ok(Arc::new(conn))
    }

    fn random_address_pool(
        &self,
        start: Ipv6Addr,
        end: Ipv6Addr,
        lease: Duration,
    ) -> RandomAddressPool {
        RandomAddressPool::new(start, end, lease)
    }

    fn packet_builder(
        &self,
        duid: &[u8],
        min_lease: Duration,
        max_lease: Duration,
        boot_config: Arc<dyn BootConfiguration>,
        pool: RandomAddressPool,
    ) -> PacketBuilder {
        PacketBuilder::new(duid.to_vec(), min_lease, max_lease, boot_config, Arc::new(pool))
    }

    async fn serve(self: Arc<Self>, conn: Arc<Conn>, builder: PacketBuilder) -> Result<()> {
        Ok(dhcp6::serve(conn, builder).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_port_fails_open() {
        let err = Dhcp6Engine.open(None, "not-a-port").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<dhcp6::Error>(),
            Some(dhcp6::Error::InvalidPort(_))
        ));
    }

    #[test]
    fn builder_carries_duid() {
        let engine = Dhcp6Engine;
        let pool = engine.random_address_pool(
            "2001:db8::10".parse().unwrap(),
            "2001:db8::100".parse().unwrap(),
            Duration::from_secs(1850),
        );
        assert_eq!(pool.capacity(), 0xf1);
        let builder = engine.packet_builder(
            &[0, 1, 0, 1, 1, 2, 3, 4, 5, 6],
            Duration::from_secs(1800),
            Duration::from_secs(1850),
            Arc::new(dhcp6::StaticBootConfiguration::default()),
            pool,
        );
        assert_eq!(builder.server_duid(), &[0, 1, 0, 1, 1, 2, 3, 4, 5, 6]);
    }
}
