//! Protocol version marker.
//!
//! [`Version<N>`] serializes as the bare integer `N` and refuses any other
//! number, so a payload carrying `"x402Version": 2` fails to parse as a
//! version 1 payload instead of being silently accepted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A protocol version marker parameterized by its numeric value.
///
/// Use the [`X402Version1`](super::X402Version1) alias rather than naming this directly.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version<const N: u8>;

impl<const N: u8> Version<N> {
    /// The numeric value of this protocol version.
    pub const VALUE: u8 = N;
}

impl<const N: u8> PartialEq<u8> for Version<N> {
    fn eq(&self, other: &u8) -> bool {
        *other == N
    }
}

impl<const N: u8> From<Version<N>> for u8 {
    fn from(_: Version<N>) -> Self {
        N
    }
}

impl<const N: u8> std::fmt::Display for Version<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{N}")
    }
}

impl<const N: u8> Serialize for Version<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(N)
    }
}

impl<'de, const N: u8> Deserialize<'de> for Version<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        if v == N {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported x402Version {v}, expected {N}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&Version::<1>).unwrap();
        assert_eq!(json, "1");
    }

    #[test]
    fn rejects_other_versions() {
        assert!(serde_json::from_str::<Version<1>>("1").is_ok());
        let err = serde_json::from_str::<Version<1>>("2").unwrap_err();
        assert!(err.to_string().contains("unsupported x402Version 2"));
    }
}
