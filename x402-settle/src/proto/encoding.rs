//! Base64 envelope used by the payment headers.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;

/// Base64 text held as bytes, as it travels in a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the Base64 text into raw bytes.
    ///
    /// Surrounding ASCII whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid standard Base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(self.0.trim_ascii())
    }

    /// Encodes raw bytes into Base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }

    /// Returns the Base64 text as a string.
    #[must_use]
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Base64Bytes {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_tolerates_padding_whitespace() {
        let encoded = Base64Bytes::encode(b"{\"a\":1}");
        let padded = Base64Bytes::from(format!("  {encoded}\n").as_str());
        assert_eq!(padded.decode().unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Base64Bytes::from("not base64!!").decode().is_err());
    }
}
