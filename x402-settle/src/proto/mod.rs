//! Wire format types for x402 version 1.
//!
//! Everything here serializes to camelCase JSON and is shared by every chain
//! family. Chain crates plug their own payload type into [`PaymentPayload`]
//! and interpret [`PaymentRequirements`] through
//! [`PaymentRequirements::as_concrete`].
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - Payment terms set by the resource server
//! - [`PaymentRequired`] - HTTP 402 response body
//! - [`PaymentPayload`] - Signed authorization sent by the client
//! - [`VerifyOutcome`] / [`SettleOutcome`] - Facilitator results
//! - [`ErrorReason`] - Closed set of failure codes

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

mod encoding;
mod error;
mod timestamp;
mod version;

pub use encoding::*;
pub use error::*;
pub use timestamp::*;
pub use version::*;

/// Version marker for x402 protocol version 1.
///
/// Serializes as the integer `1` and rejects other values on deserialization.
pub type X402Version1 = Version<1>;

/// Convenience constant for constructing version 1 messages.
pub const V1: X402Version1 = Version;

/// Payment terms set by the resource server.
///
/// The untyped form (all defaults) is what travels on the wire. Chain crates
/// obtain a typed view with [`as_concrete`](Self::as_concrete).
///
/// # Type Parameters
///
/// - `TScheme` - The scheme identifier type (default: `String`)
/// - `TAmount` - The amount type (default: `String`)
/// - `TAddress` - The address type (default: `String`)
/// - `TExtra` - Scheme-specific extra data type (default: `serde_json::Value`)
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<
    TScheme = String,
    TAmount = String,
    TAddress = String,
    TExtra = serde_json::Value,
> {
    /// The payment scheme (always `"exact"`).
    pub scheme: TScheme,
    /// Network name (e.g. `"base-sepolia"`) or CAIP-2 id (e.g. `"eip155:84532"`).
    pub network: String,
    /// Amount required, in the token's base units.
    pub max_amount_required: TAmount,
    /// The resource URL being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// Optional JSON schema for the resource output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient of the payment.
    pub pay_to: TAddress,
    /// Upper bound on how long the server waits for settlement.
    pub max_timeout_seconds: u64,
    /// The token contract.
    pub asset: TAddress,
    /// Authorization type the server accepts (`permit`, `eip3009`,
    /// `permit2`, `permit2-witness`, or `auto`). Absent means any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<TExtra>,
}

impl PaymentRequirements {
    /// Converts the requirements to a typed view.
    ///
    /// Returns `None` if the scheme, amount, either address, or a present
    /// `extra` object fails to parse.
    #[must_use]
    pub fn as_concrete<
        TScheme: FromStr,
        TAmount: FromStr,
        TAddress: FromStr,
        TExtra: DeserializeOwned,
    >(
        &self,
    ) -> Option<PaymentRequirements<TScheme, TAmount, TAddress, TExtra>> {
        let scheme = self.scheme.parse::<TScheme>().ok()?;
        let max_amount_required = self.max_amount_required.parse::<TAmount>().ok()?;
        let pay_to = self.pay_to.parse::<TAddress>().ok()?;
        let asset = self.asset.parse::<TAddress>().ok()?;
        let extra = match &self.extra {
            Some(v) => Some(serde_json::from_value(v.clone()).ok()?),
            None => None,
        };
        Some(PaymentRequirements {
            scheme,
            network: self.network.clone(),
            max_amount_required,
            resource: self.resource.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            output_schema: self.output_schema.clone(),
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            asset,
            payment_type: self.payment_type.clone(),
            extra,
        })
    }
}

/// HTTP 402 Payment Required response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// List of acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Why the previous attempt was rejected, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Builds a 402 body offering the given requirements.
    #[must_use]
    pub const fn new(accepts: Vec<PaymentRequirements>, error: Option<String>) -> Self {
        Self {
            x402_version: V1,
            accepts,
            error,
        }
    }
}

/// A signed payment authorization from the client.
///
/// `scheme` and `network` stay strings so that a payload for an unknown
/// scheme still parses and can be rejected with a proper reason code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = serde_json::Value> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// The network the authorization was signed for.
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

/// Result of verifying a payment payload against its requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The payload satisfies the requirements.
    Valid {
        /// The address of the payer.
        payer: String,
    },
    /// The payload was rejected.
    Invalid {
        /// Machine-readable reason verification failed.
        reason: ErrorReason,
        /// Optional human-readable description of the failure.
        message: Option<String>,
        /// The payer address, if identifiable.
        payer: Option<String>,
    },
}

impl VerifyOutcome {
    /// Constructs a successful verification outcome.
    #[must_use]
    pub const fn valid(payer: String) -> Self {
        Self::Valid { payer }
    }

    /// Constructs a failed verification outcome from a payment problem.
    #[must_use]
    pub fn invalid(payer: Option<String>, problem: &PaymentProblem) -> Self {
        Self::Invalid {
            reason: problem.reason(),
            message: Some(problem.details().to_owned()),
            payer,
        }
    }

    /// Returns `true` if the verification succeeded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Returns the payer, when known.
    #[must_use]
    pub fn payer(&self) -> Option<&str> {
        match self {
            Self::Valid { payer } => Some(payer),
            Self::Invalid { payer, .. } => payer.as_deref(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOutcomeWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_message: Option<String>,
}

impl Serialize for VerifyOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Valid { payer } => VerifyOutcomeWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
                invalid_message: None,
            },
            Self::Invalid {
                reason,
                message,
                payer,
            } => VerifyOutcomeWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(*reason),
                invalid_message: message.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = VerifyOutcomeWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                message: wire.invalid_message,
                payer: wire.payer,
            })
        }
    }
}

/// Result of settling a payment on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The transfer landed and was confirmed.
    Settled {
        /// The address that paid.
        payer: String,
        /// The on-chain transaction hash.
        transaction: String,
        /// The network where settlement occurred.
        network: String,
    },
    /// Settlement did not happen or reverted.
    Failed {
        /// Machine-readable reason for failure.
        reason: ErrorReason,
        /// Optional human-readable description of the failure.
        message: Option<String>,
        /// The payer address, if identifiable.
        payer: Option<String>,
        /// The network where settlement was attempted.
        network: String,
    },
}

impl SettleOutcome {
    /// Constructs a failed settlement outcome from a payment problem.
    #[must_use]
    pub fn failed(payer: Option<String>, network: String, problem: &PaymentProblem) -> Self {
        Self::Failed {
            reason: problem.reason(),
            message: Some(problem.details().to_owned()),
            payer,
            network,
        }
    }

    /// Returns `true` if the settlement succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleOutcomeWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    network: String,
}

impl Serialize for SettleOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Settled {
                payer,
                transaction,
                network,
            } => SettleOutcomeWire {
                success: true,
                error_reason: None,
                error_message: None,
                payer: Some(payer.clone()),
                transaction: Some(transaction.clone()),
                network: network.clone(),
            },
            Self::Failed {
                reason,
                message,
                payer,
                network,
            } => SettleOutcomeWire {
                success: false,
                error_reason: Some(*reason),
                error_message: message.clone(),
                payer: payer.clone(),
                transaction: None,
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleOutcomeWire::deserialize(deserializer)?;
        if wire.success {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            let transaction = wire
                .transaction
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            Ok(Self::Settled {
                payer,
                transaction,
                network: wire.network,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(Self::Failed {
                reason,
                message: wire.error_message,
                payer: wire.payer,
                network: wire.network,
            })
        }
    }
}
