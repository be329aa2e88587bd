//! UDP connection bound to the DHCPv6 server port
use dhcproto::{v6, Encodable};
use pnet::datalink::{self, MacAddr, NetworkInterface};
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};

use crate::errors::{Error, Result};

/// default dhcpv6 multicast group
pub static ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// A listening DHCPv6 socket plus the interface it serves.
///
/// Closing is cooperative: [`Conn::close`] wakes any pending [`Conn::recv`],
/// which then reports `None`.
#[derive(Debug)]
pub struct Conn {
    soc: UdpSocket,
    hardware_addr: Vec<u8>,
    iface: Option<String>,
    closed: CancellationToken,
}

impl Conn {
    /// Bind `[::]:port` and join the all-servers multicast group on the
    /// interface owning `address`, or on the first usable interface when
    /// `address` is unset.
    pub fn open(address: Option<&str>, port: &str) -> Result<Self> {
        let address = address.filter(|addr| !addr.is_empty());
        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidPort(port.to_owned()))?;
        let interface = find_interface(address)?;
        let hardware_addr = interface
            .mac
            .map(mac_bytes)
            .ok_or_else(|| Error::NoHardwareAddress(interface.name.clone()))?;

        let addr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0));
        debug!(?addr, iface = %interface.name, "binding v6 UDP socket");
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, None)?;
        socket.set_only_v6(true)?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.join_multicast_v6(&ALL_DHCP_RELAY_AGENTS_AND_SERVERS, interface.index)?;
        if address.is_some() {
            trace!("explicit address given, use SO_BINDTODEVICE");
            socket.bind_device(Some(interface.name.as_bytes()))?;
        }

        Ok(Self {
            soc: UdpSocket::from_std(socket.into())?,
            hardware_addr,
            iface: Some(interface.name),
            closed: CancellationToken::new(),
        })
    }

    /// Wrap an already bound socket. No multicast group is joined.
    pub fn from_socket(soc: UdpSocket, hardware_addr: Vec<u8>) -> Self {
        Self {
            soc,
            hardware_addr,
            iface: None,
            closed: CancellationToken::new(),
        }
    }

    /// hardware address of the interface this connection serves
    pub fn hardware_addr(&self) -> &[u8] {
        &self.hardware_addr
    }

    /// name of the interface this connection serves, if it was resolved
    pub fn iface(&self) -> Option<&str> {
        self.iface.as_deref()
    }

    /// local address of the underlying socket
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.soc.local_addr()?)
    }

    /// Receive one datagram. Returns `None` once the connection is closed.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        tokio::select! {
            _ = self.closed.cancelled() => Ok(None),
            res = self.soc.recv_from(buf) => Ok(Some(res?)),
        }
    }

    /// encode `msg` and send it to `dst`
    pub async fn send(&self, msg: &v6::Message, dst: SocketAddr) -> Result<()> {
        let buf = msg.to_vec()?;
        self.soc.send_to(&buf, dst).await?;
        Ok(())
    }

    /// stop the connection, pending and future `recv` calls return `None`
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// has `close` been called?
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

fn mac_bytes(mac: MacAddr) -> Vec<u8> {
    let MacAddr(a, b, c, d, e, f) = mac;
    vec![a, b, c, d, e, f]
}

fn find_interface(address: Option<&str>) -> Result<NetworkInterface> {
    let ip = address
        .map(|addr| {
            addr.parse::<Ipv6Addr>()
                .map_err(|_| Error::InvalidAddress(addr.to_owned()))
        })
        .transpose()?;
    datalink::interfaces()
        .into_iter()
        .find(|int| match ip {
            Some(ip) => int.ips.iter().any(|net| net.ip() == IpAddr::V6(ip)),
            None => {
                int.is_up()
                    && !int.is_loopback()
                    && int.mac.is_some()
                    && int.ips.iter().any(|net| net.is_ipv6())
            }
        })
        .ok_or_else(|| Error::NoInterface(address.map(ToOwned::to_owned)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_port() {
        let err = Conn::open(None, "dhcp").unwrap_err();
        assert!(matches!(err, Error::InvalidPort(ref p) if p == "dhcp"));
    }

    #[test]
    fn rejects_bad_address() {
        let err = Conn::open(Some("not-an-ip"), "547").unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }

    #[test]
    fn mac_to_bytes() {
        let mac = MacAddr(0x00, 0x1b, 0x21, 0x3c, 0x4d, 0x5e);
        assert_eq!(mac_bytes(mac), vec![0x00, 0x1b, 0x21, 0x3c, 0x4d, 0x5e]);
    }

    #[tokio::test]
    async fn close_wakes_recv() {
        let Ok(soc) = UdpSocket::bind("[::1]:0").await else {
            // no ipv6 loopback in this environment
            return;
        };
        let conn = Conn::from_socket(soc, vec![1, 2, 3, 4, 5, 6]);
        conn.close();
        let mut buf = [0; 64];
        assert!(conn.recv(&mut buf).await.unwrap().is_none());
        assert!(conn.is_closed());
    }
}
