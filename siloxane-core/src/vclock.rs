use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An opaque causality token issued by the store.
///
/// The client never interprets the bytes. It only echoes back the last value
/// it observed for a key on the next write to that key.
///
/// Serialized as a CBOR byte string (major type 2).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct VClock(Vec<u8>);

impl VClock {
    /// Wraps raw clock bytes as returned by the store.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        VClock(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True for an entity that has never been synced.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `None` for an empty clock, the form a write request expects.
    pub(crate) fn to_request(&self) -> Option<VClock> {
        (!self.is_empty()).then(|| self.clone())
    }
}

impl Serialize for VClock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for VClock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        crate::serde_helpers::bytes::deserialize(deserializer).map(VClock)
    }
}

impl fmt::Debug for VClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VClock({})", self)
    }
}

impl fmt::Display for VClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        let clock = VClock::default();
        assert!(clock.is_empty());
        assert!(clock.to_request().is_none());
    }

    #[test]
    fn display_is_hex() {
        let clock = VClock::from_bytes(vec![0xab, 0x01]);
        assert_eq!(clock.to_string(), "ab01");
        assert_eq!(format!("{:?}", clock), "VClock(ab01)");
    }

    #[test]
    fn encodes_as_cbor_byte_string() {
        let clock = VClock::from_bytes(vec![1, 2, 3]);
        let mut buf = Vec::new();
        ciborium::into_writer(&clock, &mut buf).unwrap();
        // major type 2, length 3
        assert_eq!(buf, vec![0x43, 1, 2, 3]);

        let recovered: VClock = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(recovered, clock);
    }
}
