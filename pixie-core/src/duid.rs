//! DUID-LT (link-layer address plus time), see rfc3315 section 9.2
use std::time::{Duration, SystemTime};

/// DUID type: link-layer address plus time
pub const DUID_TYPE_LLT: u16 = 1;
/// hardware type: ethernet
pub const HTYPE_ETHERNET: u16 = 1;
/// 2000-01-01T00:00:00 UTC as seconds since the unix epoch
pub const DUID_EPOCH_UNIX_SECS: u64 = 946_684_800;

/// Build a DUID-LT for `hw_addr` stamped with the current time
pub fn duid_llt(hw_addr: &[u8]) -> Vec<u8> {
    duid_llt_at(hw_addr, SystemTime::now())
}

/// Build a DUID-LT for `hw_addr` stamped with `now`.
///
/// Layout: type (2 bytes), hardware type (2 bytes), seconds since
/// 2000-01-01 UTC truncated to u32 (4 bytes, big endian), then the hardware
/// address. A clock before 2000 stamps 0.
pub fn duid_llt_at(hw_addr: &[u8], now: SystemTime) -> Vec<u8> {
    let mut duid = Vec::with_capacity(8 + hw_addr.len());
    duid.extend_from_slice(&DUID_TYPE_LLT.to_be_bytes());
    duid.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
    duid.extend_from_slice(&(secs_since_epoch(now) as u32).to_be_bytes());
    duid.extend_from_slice(hw_addr);
    duid
}

/// the time stamped into `duid`, if it is long enough to hold one
pub fn duid_time(duid: &[u8]) -> Option<SystemTime> {
    let secs: [u8; 4] = duid.get(4..8)?.try_into().ok()?;
    Some(duid_epoch() + Duration::from_secs(u64::from(u32::from_be_bytes(secs))))
}

fn duid_epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(DUID_EPOCH_UNIX_SECS)
}

fn secs_since_epoch(now: SystemTime) -> u64 {
    now.duration_since(duid_epoch())
        .map(|since| since.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 6] = [0x00, 0x1b, 0x21, 0x3c, 0x4d, 0x5e];

    #[test]
    fn layout() {
        for len in [0, 6, 8, 20] {
            let hw: Vec<u8> = (0..len as u8).collect();
            let duid = duid_llt(&hw);
            assert_eq!(duid.len(), 8 + len);
            assert_eq!(&duid[0..2], &[0x00, 0x01]);
            assert_eq!(&duid[2..4], &[0x00, 0x01]);
            assert_eq!(&duid[8..], &hw[..]);
        }
    }

    #[test]
    fn timestamp_is_now() {
        let before = SystemTime::now();
        let duid = duid_llt(&MAC);
        let stamped = duid_time(&duid).unwrap();
        let drift = before
            .duration_since(stamped)
            .unwrap_or_else(|err| err.duration());
        assert!(drift <= Duration::from_secs(2), "drift was {drift:?}");
    }

    #[test]
    fn known_time() {
        // 2000-01-02T00:00:01Z
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(DUID_EPOCH_UNIX_SECS + 86_401);
        let duid = duid_llt_at(&MAC, now);
        assert_eq!(&duid[4..8], &86_401u32.to_be_bytes());
        assert_eq!(duid_time(&duid), Some(now));
    }

    #[test]
    fn truncates_subsecond() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_millis(DUID_EPOCH_UNIX_SECS * 1000 + 1999);
        let duid = duid_llt_at(&MAC, now);
        assert_eq!(&duid[4..8], &1u32.to_be_bytes());
    }

    #[test]
    fn before_epoch_stamps_zero() {
        let duid = duid_llt_at(&MAC, SystemTime::UNIX_EPOCH);
        assert_eq!(&duid[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn short_duid_has_no_time() {
        assert!(duid_time(&[0, 1, 0, 1, 0]).is_none());
    }
}
