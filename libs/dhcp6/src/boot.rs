//! What to tell network-booting clients
use std::{fmt, net::Ipv6Addr};

/// client architecture type for UEFI HTTP boot (RFC 5970 / IANA registry)
pub const ARCH_EFI_X64_HTTP: u16 = 0x0010;

/// Source of boot parameters handed to clients
pub trait BootConfiguration: Send + Sync + fmt::Debug {
    /// Boot file URL for a client, `None` if this client should not be served
    fn boot_url(&self, client_id: &[u8], client_arch_type: u16) -> Option<Vec<u8>>;
    /// server preference advertised to clients
    fn preference(&self) -> Option<u8>;
    /// recursive DNS servers advertised to clients
    fn recursive_dns(&self) -> &[Ipv6Addr];
}

/// Fixed boot parameters: HTTP-boot clients get `http_boot_url`, everyone
/// else gets `ipxe_url`. The user class is not looked at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticBootConfiguration {
    pub http_boot_url: Option<String>,
    pub ipxe_url: Option<String>,
    pub preference: Option<u8>,
    pub recursive_dns: Vec<Ipv6Addr>,
}

impl BootConfiguration for StaticBootConfiguration {
    fn boot_url(&self, _client_id: &[u8], client_arch_type: u16) -> Option<Vec<u8>> {
        let url = if client_arch_type == ARCH_EFI_X64_HTTP {
            self.http_boot_url.as_ref()
        } else {
            self.ipxe_url.as_ref()
        };
        url.map(|url| url.as_bytes().to_vec())
    }

    fn preference(&self) -> Option<u8> {
        self.preference
    }

    fn recursive_dns(&self) -> &[Ipv6Addr] {
        &self.recursive_dns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_url_by_arch() {
        let cfg = StaticBootConfiguration {
            http_boot_url: Some("http://[2001:db8::1]/boot.efi".into()),
            ipxe_url: Some("http://[2001:db8::1]/boot.ipxe".into()),
            ..Default::default()
        };
        assert_eq!(
            cfg.boot_url(b"id", ARCH_EFI_X64_HTTP).unwrap(),
            b"http://[2001:db8::1]/boot.efi".to_vec()
        );
        assert_eq!(
            cfg.boot_url(b"id", 0x0007).unwrap(),
            b"http://[2001:db8::1]/boot.ipxe".to_vec()
        );
    }

    #[test]
    fn http_client_without_http_url_gets_nothing() {
        let cfg = StaticBootConfiguration {
            ipxe_url: Some("http://[2001:db8::1]/boot.ipxe".into()),
            ..Default::default()
        };
        assert!(cfg.boot_url(b"id", ARCH_EFI_X64_HTTP).is_none());
        assert!(cfg.boot_url(b"id", 0x0000).is_some());
    }

    #[test]
    fn empty_config_serves_nobody() {
        let cfg = StaticBootConfiguration::default();
        assert!(cfg.boot_url(b"id", 0).is_none());
        assert!(cfg.preference().is_none());
        assert!(cfg.recursive_dns().is_empty());
    }
}
