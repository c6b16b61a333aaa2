//! The `"exact"` payment scheme marker.

/// A unit struct representing the string literal `"exact"`.
///
/// Used as the scheme type of a typed [`PaymentRequirements`](crate::proto::PaymentRequirements)
/// view so that parsing fails for any other scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// The string literal value: `"exact"`.
    pub const VALUE: &'static str = "exact";
}

impl std::fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VALUE)
    }
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::VALUE
    }
}

impl PartialEq<str> for ExactScheme {
    fn eq(&self, other: &str) -> bool {
        other == Self::VALUE
    }
}

impl std::str::FromStr for ExactScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::VALUE {
            Ok(Self)
        } else {
            Err(format!("expected '{}', got '{s}'", Self::VALUE))
        }
    }
}

impl serde::Serialize for ExactScheme {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::VALUE)
    }
}

impl<'de> serde::Deserialize<'de> for ExactScheme {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_exact() {
        assert_eq!("exact".parse::<ExactScheme>(), Ok(ExactScheme));
        assert!("upto".parse::<ExactScheme>().is_err());
        assert!(serde_json::from_str::<ExactScheme>("\"Exact\"").is_err());
        assert!(ExactScheme == *"exact");
    }
}
