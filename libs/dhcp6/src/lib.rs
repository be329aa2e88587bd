//! # dhcp6
//!
//! A small DHCPv6 engine for network boot. [`Conn`] listens on the server
//! port, [`RandomAddressPool`] hands out addresses, [`PacketBuilder`] answers
//! requests and [`serve`] ties them together until the connection is closed.
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]

use dhcproto::{v6, Decodable};
use tracing::{debug, instrument, trace};

use std::sync::Arc;

pub mod boot;
pub mod builder;
pub mod conn;
pub mod errors;
pub mod pool;

pub use crate::{
    boot::{BootConfiguration, StaticBootConfiguration},
    builder::PacketBuilder,
    conn::Conn,
    errors::{Error, Result},
    pool::{AddressPool, IdentityAssociation, RandomAddressPool},
};
pub use dhcproto;

/// large enough for any DHCPv6 message on a standard MTU link
const RECV_BUF_SIZE: usize = 1500;

/// Answer requests arriving on `conn` until it is closed (`Ok`) or the socket
/// fails (`Err`). Messages that don't decode are dropped.
#[instrument(name = "v6", level = "debug", skip_all)]
pub async fn serve(conn: Arc<Conn>, builder: PacketBuilder) -> Result<()> {
    let mut buf = vec![0; RECV_BUF_SIZE];
    loop {
        let Some((len, src)) = conn.recv(&mut buf).await? else {
            debug!("connection closed, leaving serve loop");
            return Ok(());
        };
        let req = match v6::Message::from_bytes(&buf[..len]) {
            Ok(req) => req,
            Err(err) => {
                debug!(?err, ?src, "failed to decode message");
                continue;
            }
        };
        trace!(?src, msg_type = ?req.msg_type(), xid = ?req.xid(), "received message");

        match builder.build_response(&req) {
            Some(resp) => {
                debug!(msg_type = ?resp.msg_type(), dst_addr = ?src, "sending response");
                conn.send(&resp, src).await?;
            }
            None => trace!(?src, "no response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcproto::{
        v6::{DhcpOption, DhcpOptions, MessageType, OptionCode, IANA},
        Encodable,
    };
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tracing_test::traced_test;

    fn builder() -> PacketBuilder {
        PacketBuilder::new(
            vec![0, 1, 0, 1, 1, 2, 3, 4, 0xa, 0xb, 0xc, 0xd, 0xe, 0xf],
            Duration::from_secs(1800),
            Duration::from_secs(1850),
            Arc::new(StaticBootConfiguration {
                ipxe_url: Some("http://[::1]/boot.ipxe".into()),
                ..Default::default()
            }),
            Arc::new(RandomAddressPool::new(
                "2001:db8::10".parse().unwrap(),
                "2001:db8::100".parse().unwrap(),
                Duration::from_secs(1850),
            )),
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn answers_solicit_then_stops_on_close() -> anyhow::Result<()> {
        let (Ok(srv), Ok(cli)) = (
            UdpSocket::bind("[::1]:0").await,
            UdpSocket::bind("[::1]:0").await,
        ) else {
            // no ipv6 loopback in this environment
            return Ok(());
        };
        let conn = Arc::new(Conn::from_socket(srv, vec![0xa, 0xb, 0xc, 0xd, 0xe, 0xf]));
        let srv_addr = conn.local_addr()?;
        let task = tokio::spawn(serve(Arc::clone(&conn), builder()));

        // garbage first, the loop must survive it
        cli.send_to(&[0xff, 0x00], srv_addr).await?;

        let mut msg = v6::Message::new_with_id(MessageType::Solicit, [7, 7, 7]);
        msg.opts_mut().insert(DhcpOption::ClientId(vec![0, 3, 0, 1, 1, 2]));
        msg.opts_mut().insert(DhcpOption::IANA(IANA {
            id: 1,
            t1: 0,
            t2: 0,
            opts: DhcpOptions::new(),
        }));
        cli.send_to(&msg.to_vec()?, srv_addr).await?;

        let mut buf = [0; 1500];
        let (len, _) =
            tokio::time::timeout(Duration::from_secs(5), cli.recv_from(&mut buf)).await??;
        let resp = v6::Message::from_bytes(&buf[..len])?;
        assert_eq!(resp.msg_type(), MessageType::Advertise);
        assert_eq!(resp.xid(), [7, 7, 7]);
        assert!(resp.opts().get(OptionCode::IANA).is_some());

        conn.close();
        task.await??;
        Ok(())
    }
}
