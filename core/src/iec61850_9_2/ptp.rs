//! PTP timestamp with the 8-byte TAI on-wire representation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Seconds since the epoch plus nanoseconds in `[0, 1e9)`. The validity
/// flag is cleared when the nanoseconds field would overflow a second.
///
/// On the wire (TAI form) the timestamp is 4 bytes of seconds (low 32
/// bits, big-endian) followed by a 32-bit binary fraction of a second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PtpTimestamp {
    seconds: u64,
    nanoseconds: u32,
    valid: bool,
}

impl PtpTimestamp {
    pub const fn new(seconds: u64, nanoseconds: u32) -> Self {
        PtpTimestamp {
            seconds,
            nanoseconds,
            valid: nanoseconds < NANOS_PER_SEC as u32,
        }
    }

    pub const fn zero() -> Self {
        PtpTimestamp {
            seconds: 0,
            nanoseconds: 0,
            valid: false,
        }
    }

    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => PtpTimestamp::new(elapsed.as_secs(), elapsed.subsec_nanos()),
            Err(_) => PtpTimestamp::zero(),
        }
    }

    /// Reconstructs a timestamp from its TAI byte form. Returns `None` when
    /// the fractional part does not map into a whole second.
    pub fn from_tai(data: &[u8; 8]) -> Option<Self> {
        let seconds = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as u64;
        let fraction = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as u64;

        let nanoseconds = ((fraction * NANOS_PER_SEC) >> 32) as u32;
        if nanoseconds >= NANOS_PER_SEC as u32 {
            return None;
        }

        Some(PtpTimestamp::new(seconds, nanoseconds))
    }

    /// The TAI byte form: only the low 32 bits of the seconds survive.
    pub fn to_tai(&self) -> [u8; 8] {
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&(self.seconds as u32).to_be_bytes());

        let fraction = ((self.nanoseconds as u64) << 32) / NANOS_PER_SEC;
        data[4..].copy_from_slice(&(fraction as u32).to_be_bytes());
        data
    }

    pub fn from_nanos(nanos: u64) -> Self {
        PtpTimestamp::new(nanos / NANOS_PER_SEC, (nanos % NANOS_PER_SEC) as u32)
    }

    /// Nanoseconds since the epoch, as carried in the SV frame trailer.
    pub fn as_nanos(&self) -> u64 {
        self.seconds
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(self.nanoseconds as u64)
    }

    pub const fn seconds(&self) -> u64 {
        self.seconds
    }

    pub const fn nanoseconds(&self) -> u32 {
        self.nanoseconds
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::new(self.seconds, self.nanoseconds)
    }
}

impl Default for PtpTimestamp {
    fn default() -> Self {
        PtpTimestamp::zero()
    }
}

impl PartialEq for PtpTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.seconds == other.seconds && self.nanoseconds == other.nanoseconds
    }
}

impl Eq for PtpTimestamp {}

impl PartialOrd for PtpTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PtpTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then(self.nanoseconds.cmp(&other.nanoseconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_zero_is_invalid() {
        let ts = PtpTimestamp::zero();
        assert!(!ts.is_valid());
        assert_eq!(ts.seconds(), 0);
        assert_eq!(ts.nanoseconds(), 0);
    }

    #[test]
    fn test_constructor_validity() {
        assert!(PtpTimestamp::new(1_234_567_890, 123_456_789).is_valid());
        assert!(PtpTimestamp::new(1_000, 0).is_valid());
        assert!(PtpTimestamp::new(1_000, 999_999_999).is_valid());
        assert!(!PtpTimestamp::new(1_000, 1_000_000_000).is_valid());
        assert!(!PtpTimestamp::new(1_000, 1_500_000_000).is_valid());
    }

    #[test]
    fn test_now_is_plausible() {
        let ts = PtpTimestamp::now();
        assert!(ts.is_valid());
        assert!(ts.seconds() > 1_000_000_000);
        assert!(ts.nanoseconds() < 1_000_000_000);
    }

    #[test]
    fn test_now_increases() {
        let first = PtpTimestamp::now();
        thread::sleep(Duration::from_millis(10));
        let second = PtpTimestamp::now();
        assert!(second > first);
    }

    #[test]
    fn test_tai_seconds_layout() {
        let ts = PtpTimestamp::new(0x1234_5678, 500_000_000);
        let tai = ts.to_tai();
        assert_eq!(&tai[..4], &[0x12, 0x34, 0x56, 0x78]);
        // Half a second is the top fraction bit.
        assert_eq!(tai[4], 0x80);
    }

    #[test]
    fn test_from_tai() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x80, 0x00, 0x00, 0x00];
        let ts = PtpTimestamp::from_tai(&data).unwrap();
        assert!(ts.is_valid());
        assert_eq!(ts.seconds(), 0x1234_5678);
        assert_eq!(ts.nanoseconds(), 500_000_000);
    }

    #[test]
    fn test_tai_round_trip_within_one_ulp() {
        for &ns in &[0u32, 1, 499, 123_456_789, 500_000_000, 999_999_999] {
            let original = PtpTimestamp::new(1_234_567_890, ns);
            let restored = PtpTimestamp::from_tai(&original.to_tai()).unwrap();
            assert_eq!(restored.seconds(), original.seconds() & 0xFFFF_FFFF);
            let diff = (restored.nanoseconds() as i64 - ns as i64).abs();
            assert!(diff <= 1, "nanoseconds off by {diff} for {ns}");
        }
    }

    #[test]
    fn test_nanos_round_trip() {
        let ts = PtpTimestamp::from_nanos(1_700_000_000_000_000_000);
        assert_eq!(ts.seconds(), 1_700_000_000);
        assert_eq!(ts.nanoseconds(), 0);
        assert_eq!(ts.as_nanos(), 1_700_000_000_000_000_000);

        let ts = PtpTimestamp::new(1_700_000_000, 123);
        assert_eq!(PtpTimestamp::from_nanos(ts.as_nanos()), ts);
    }

    #[test]
    fn test_ordering() {
        let a = PtpTimestamp::new(1000, 500);
        let b = PtpTimestamp::new(1000, 600);
        let c = PtpTimestamp::new(1001, 400);

        assert!(a < b);
        assert!(b < c);
        assert!(c > a);
        assert!(a <= PtpTimestamp::new(1000, 500));
        assert!(a >= PtpTimestamp::new(1000, 500));
        assert_eq!(a, PtpTimestamp::new(1000, 500));
        assert_ne!(a, b);
    }
}
