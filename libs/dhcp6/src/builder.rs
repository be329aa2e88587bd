//! Turns client requests into server responses
use dhcproto::v6::{
    DhcpOption, DhcpOptions, IAAddr, Message, MessageType, OptionCode, UnknownOption, IANA,
};
use tracing::{debug, trace};

use std::{net::Ipv6Addr, sync::Arc, time::Duration};

use crate::{boot::BootConfiguration, pool::AddressPool};

pub const OPT_STATUS_CODE: u16 = 13;
pub const OPT_DNS_SERVERS: u16 = 23;
pub const OPT_BOOTFILE_URL: u16 = 59;
pub const OPT_CLIENT_ARCH_TYPE: u16 = 61;

/// status code sent in an IA_NA we could not fill
const STATUS_NO_ADDRS_AVAIL: u16 = 2;

/// Builds responses for network-boot clients. Holds the server DUID, the
/// lease lifetimes, the boot configuration and the address pool.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    server_duid: Vec<u8>,
    preferred_lifetime: Duration,
    valid_lifetime: Duration,
    boot: Arc<dyn BootConfiguration>,
    pool: Arc<dyn AddressPool>,
}

impl PacketBuilder {
    /// `server_duid` goes in every response, the lifetimes in every IA address
    pub fn new(
        server_duid: Vec<u8>,
        preferred_lifetime: Duration,
        valid_lifetime: Duration,
        boot: Arc<dyn BootConfiguration>,
        pool: Arc<dyn AddressPool>,
    ) -> Self {
        Self {
            server_duid,
            preferred_lifetime,
            valid_lifetime,
            boot,
            pool,
        }
    }

    /// the server identifier stamped into responses
    pub fn server_duid(&self) -> &[u8] {
        &self.server_duid
    }

    /// Response for `req`, or `None` if the request should be dropped
    pub fn build_response(&self, req: &Message) -> Option<Message> {
        use MessageType::*;

        let msg_type = req.msg_type();
        let req_sid = req.opts().get(OptionCode::ServerId);
        if matches!(req_sid, Some(DhcpOption::ServerId(id)) if *id != self.server_duid) {
            debug!(?msg_type, "server identifier in msg doesn't match");
            return None;
        }
        let client_id = match req.opts().get(OptionCode::ClientId) {
            Some(DhcpOption::ClientId(id)) => Some(id.clone()),
            _ => None,
        };
        if client_id.is_none() && msg_type != InformationRequest {
            debug!(?msg_type, "no client identifier, dropping");
            return None;
        }
        let client_id = client_id.unwrap_or_default();

        match msg_type {
            Solicit => {
                if req_sid.is_some() {
                    return None;
                }
                let boot_url = self.boot_url(req, &client_id)?;
                let rapid_commit = req.opts().get(OptionCode::RapidCommit).is_some();
                let resp_type = if rapid_commit { Reply } else { Advertise };
                let mut resp = self.new_resp(req, resp_type, &client_id);
                if rapid_commit {
                    resp.opts_mut().insert(DhcpOption::RapidCommit);
                }
                self.add_addresses(req, &client_id, resp.opts_mut());
                self.add_boot_opts(boot_url, resp.opts_mut());
                Some(resp)
            }
            Request | Renew | Rebind => {
                if msg_type != Rebind && req_sid.is_none() {
                    return None;
                }
                let boot_url = self.boot_url(req, &client_id)?;
                let mut resp = self.new_resp(req, Reply, &client_id);
                self.add_addresses(req, &client_id, resp.opts_mut());
                self.add_boot_opts(boot_url, resp.opts_mut());
                Some(resp)
            }
            InformationRequest => {
                let boot_url = self.boot_url(req, &client_id)?;
                let mut resp = self.new_resp(req, Reply, &client_id);
                self.add_boot_opts(boot_url, resp.opts_mut());
                Some(resp)
            }
            Release | Decline => {
                if req_sid.is_none() {
                    return None;
                }
                let iaids = iaids(req);
                self.pool.release_addresses(&client_id, &iaids);
                debug!(?msg_type, ?iaids, "released addresses");
                Some(self.new_resp(req, Reply, &client_id))
            }
            _ => {
                debug!(?msg_type, "unsupported message type");
                None
            }
        }
    }

    fn boot_url(&self, req: &Message, client_id: &[u8]) -> Option<Vec<u8>> {
        let arch = client_arch_type(req);
        let url = self.boot.boot_url(client_id, arch);
        if url.is_none() {
            debug!(arch, "no boot url for client, ignoring");
        }
        url
    }

    fn new_resp(&self, req: &Message, msg_type: MessageType, client_id: &[u8]) -> Message {
        let mut resp = Message::new_with_id(msg_type, req.xid());
        resp.opts_mut()
            .insert(DhcpOption::ServerId(self.server_duid.clone()));
        // information-request may come without a client id
        if !client_id.is_empty() {
            resp.opts_mut()
                .insert(DhcpOption::ClientId(client_id.to_vec()));
        }
        resp
    }

    fn add_addresses(&self, req: &Message, client_id: &[u8], opts: &mut DhcpOptions) {
        let iaids = iaids(req);
        let reserved = self.pool.reserve_addresses(client_id, &iaids);
        let preferred = secs(self.preferred_lifetime);
        let valid = secs(self.valid_lifetime);
        for iaid in iaids {
            let mut ia_opts = DhcpOptions::new();
            match reserved.iter().find(|ia| ia.iaid == iaid) {
                Some(ia) => {
                    trace!(ip = %ia.ip, iaid, "assigning address");
                    ia_opts.insert(DhcpOption::IAAddr(IAAddr {
                        addr: ia.ip,
                        preferred_life: preferred,
                        valid_life: valid,
                        opts: DhcpOptions::new(),
                    }));
                }
                None => {
                    let mut data = STATUS_NO_ADDRS_AVAIL.to_be_bytes().to_vec();
                    data.extend_from_slice(b"no addresses available");
                    ia_opts.insert(unknown(OPT_STATUS_CODE, data));
                }
            }
            opts.insert(DhcpOption::IANA(IANA {
                id: iaid,
                t1: preferred / 2,
                t2: preferred / 5 * 4,
                opts: ia_opts,
            }));
        }
    }

    fn add_boot_opts(&self, boot_url: Vec<u8>, opts: &mut DhcpOptions) {
        opts.insert(unknown(OPT_BOOTFILE_URL, boot_url));
        if let Some(pref) = self.boot.preference() {
            opts.insert(DhcpOption::Preference(pref));
        }
        let dns = self.boot.recursive_dns();
        if !dns.is_empty() {
            opts.insert(unknown(
                OPT_DNS_SERVERS,
                dns.iter().flat_map(Ipv6Addr::octets).collect(),
            ));
        }
    }
}

fn unknown(code: u16, data: Vec<u8>) -> DhcpOption {
    DhcpOption::Unknown(UnknownOption::new(OptionCode::from(code), data))
}

fn secs(d: Duration) -> u32 {
    u32::try_from(d.as_secs()).unwrap_or(u32::MAX)
}

/// the IAIDs of every IA_NA in the request
fn iaids(req: &Message) -> Vec<u32> {
    req.opts()
        .iter()
        .filter_map(|opt| match opt {
            DhcpOption::IANA(ia) => Some(ia.id),
            _ => None,
        })
        .collect()
}

/// first architecture listed in the client arch type option, 0 if absent
fn client_arch_type(req: &Message) -> u16 {
    req.opts()
        .iter()
        .find_map(|opt| match opt {
            DhcpOption::Unknown(opt) if u16::from(opt.code()) == OPT_CLIENT_ARCH_TYPE => {
                match opt.data() {
                    [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
                    _ => None,
                }
            }
            _ => None,
        })
        .unwrap_or(0)
}
