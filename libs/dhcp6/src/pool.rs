//! Address allocation for IA_NA requests
use rand::Rng;
use tracing::{debug, trace};

use std::{
    collections::HashMap,
    fmt,
    net::Ipv6Addr,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// An address bound to a client's identity association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssociation {
    pub ip: Ipv6Addr,
    pub client_id: Vec<u8>,
    pub iaid: u32,
    pub created_at: Instant,
}

/// Hands out addresses to (client id, IAID) pairs
pub trait AddressPool: Send + Sync + fmt::Debug {
    /// Reserve one address per IAID. IAIDs that can't be satisfied are left
    /// out of the returned list.
    fn reserve_addresses(&self, client_id: &[u8], iaids: &[u32]) -> Vec<IdentityAssociation>;
    /// Return the addresses held by `client_id` for `iaids` to the pool
    fn release_addresses(&self, client_id: &[u8], iaids: &[u32]);
}

type Key = (Vec<u8>, u32);

#[derive(Debug, Default)]
struct Leases {
    by_client: HashMap<Key, IdentityAssociation>,
    // offset from the start of the range -> holder
    used: HashMap<u128, Key>,
}

/// Picks a random free address in an inclusive range. Leases expire
/// `lease` after they were handed out.
#[derive(Debug)]
pub struct RandomAddressPool {
    start: u128,
    size: u128,
    lease: Duration,
    leases: Mutex<Leases>,
}

impl RandomAddressPool {
    pub fn new(start: Ipv6Addr, end: Ipv6Addr, lease: Duration) -> Self {
        let (start, end) = (u128::from(start), u128::from(end));
        let size = end
            .checked_sub(start)
            .map(|span| span.saturating_add(1))
            .unwrap_or(0);
        Self {
            start,
            size,
            lease,
            leases: Mutex::new(Leases::default()),
        }
    }

    /// number of addresses in the range
    pub fn capacity(&self) -> u128 {
        self.size
    }

    /// number of addresses currently handed out
    pub fn in_use(&self) -> usize {
        let mut leases = self.lock();
        self.expire(&mut leases, Instant::now());
        leases.used.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Leases> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expire(&self, leases: &mut Leases, now: Instant) {
        let lease = self.lease;
        let start = self.start;
        let mut expired = Vec::new();
        leases.by_client.retain(|_, ia| {
            let live = now.duration_since(ia.created_at) < lease;
            if !live {
                expired.push(u128::from(ia.ip) - start);
            }
            live
        });
        for offset in expired {
            leases.used.remove(&offset);
        }
    }

    fn pick_free(&self, leases: &Leases) -> Option<u128> {
        if leases.used.len() as u128 >= self.size {
            return None;
        }
        let mut offset = rand::thread_rng().gen_range(0..self.size);
        // walk forward until we find a hole, there is at least one
        while leases.used.contains_key(&offset) {
            offset = (offset + 1) % self.size;
        }
        Some(offset)
    }
}

impl AddressPool for RandomAddressPool {
    fn reserve_addresses(&self, client_id: &[u8], iaids: &[u32]) -> Vec<IdentityAssociation> {
        let now = Instant::now();
        let mut leases = self.lock();
        self.expire(&mut leases, now);

        let mut ret = Vec::with_capacity(iaids.len());
        for &iaid in iaids {
            let key = (client_id.to_vec(), iaid);
            if let Some(ia) = leases.by_client.get(&key) {
                trace!(ip = %ia.ip, iaid, "client already holds address");
                ret.push(ia.clone());
                continue;
            }
            let Some(offset) = self.pick_free(&leases) else {
                debug!(iaid, "address pool exhausted");
                continue;
            };
            let ia = IdentityAssociation {
                ip: Ipv6Addr::from(self.start + offset),
                client_id: client_id.to_vec(),
                iaid,
                created_at: now,
            };
            leases.used.insert(offset, key.clone());
            leases.by_client.insert(key, ia.clone());
            ret.push(ia);
        }
        ret
    }

    fn release_addresses(&self, client_id: &[u8], iaids: &[u32]) {
        let mut leases = self.lock();
        for &iaid in iaids {
            if let Some(ia) = leases.by_client.remove(&(client_id.to_vec(), iaid)) {
                trace!(ip = %ia.ip, iaid, "released address");
                leases.used.remove(&(u128::from(ia.ip) - self.start));
            }
        }
    }
}
