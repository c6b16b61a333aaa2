//! Payment header codec.
//!
//! The client sends its signed authorization as standard Base64 of the UTF-8
//! JSON [`PaymentPayload`] in `X-PAYMENT` (some clients use `X-402-Payment`).
//! After settlement the server may echo the [`SettleOutcome`] back in
//! `X-PAYMENT-RESPONSE`, encoded the same way.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::proto::{Base64Bytes, PaymentPayload, SettleOutcome};

/// Header carrying the client's payment payload.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Alternate spelling of [`PAYMENT_HEADER`] accepted from clients.
pub const PAYMENT_HEADER_ALIAS: &str = "X-402-Payment";

/// Header carrying the settlement outcome back to the client.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Errors from encoding or decoding a payment header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The header value is not standard Base64.
    #[error("payment header is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not valid JSON of the expected shape.
    #[error("payment header is not a valid payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns `true` when `name` is one of the accepted payment header names.
///
/// HTTP header names are case-insensitive.
#[must_use]
pub fn is_payment_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(PAYMENT_HEADER) || name.eq_ignore_ascii_case(PAYMENT_HEADER_ALIAS)
}

/// Decodes an `X-PAYMENT` header value into a typed payment payload.
///
/// # Errors
///
/// Returns [`HeaderError`] on Base64 or JSON decode failure, including an
/// `x402Version` other than 1.
pub fn decode_payment_header<P: DeserializeOwned>(
    header_value: &str,
) -> Result<PaymentPayload<P>, HeaderError> {
    let bytes = Base64Bytes::from(header_value).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encodes a payment payload as an `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`HeaderError::Json`] if the payload fails to serialize.
pub fn encode_payment_header<P: Serialize>(
    payload: &PaymentPayload<P>,
) -> Result<String, HeaderError> {
    let json = serde_json::to_vec(payload)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Encodes a settlement outcome as an `X-PAYMENT-RESPONSE` header value.
///
/// # Errors
///
/// Returns [`HeaderError::Json`] if the outcome fails to serialize.
pub fn encode_payment_response(outcome: &SettleOutcome) -> Result<String, HeaderError> {
    let json = serde_json::to_vec(outcome)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
///
/// # Errors
///
/// Returns [`HeaderError`] on Base64 or JSON decode failure.
pub fn decode_payment_response(header_value: &str) -> Result<SettleOutcome, HeaderError> {
    let bytes = Base64Bytes::from(header_value).decode()?;
    Ok(serde_json::from_slice(&bytes)?)
}
