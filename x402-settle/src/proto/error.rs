//! Reason codes for payment failures.
//!
//! Every failure the pipeline reports, whether it happens while decoding the
//! header, verifying the authorization, or settling it on-chain, is labelled
//! with exactly one [`ErrorReason`]. The set is closed: chain crates map their
//! own error types onto it through [`AsPaymentProblem`].

use serde::{Deserialize, Serialize};

/// Machine-readable error reason codes for payment failures.
///
/// Serialized in `snake_case`, matching the `invalidReason` / `errorReason`
/// fields of the facilitator wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The payment header is not valid Base64, JSON, or payload shape.
    InvalidPaymentHeader,
    /// No payment header was supplied.
    MissingPaymentHeader,
    /// The scheme or authorization type is not accepted by the requirement.
    UnsupportedScheme,
    /// The network is unknown, not served here, or chain reads failed.
    InvalidNetwork,
    /// The payload targets a different network than the requirement.
    SchemeNetworkMismatch,
    /// The requirement itself could not be interpreted.
    InvalidPaymentRequirements,
    /// The EIP-2612 permit signature does not recover to the owner.
    InvalidPermitSignature,
    /// The EIP-3009 signature does not recover to the sender.
    InvalidEip3009Signature,
    /// The Permit2 signature does not recover to the owner.
    InvalidPermit2Signature,
    /// The Permit2 witness signature does not recover to the owner.
    InvalidPermit2WitnessSignature,
    /// The permit deadline has passed.
    PermitExpired,
    /// The EIP-3009 `validBefore` has passed.
    Eip3009Expired,
    /// The Permit2 deadline has passed.
    Permit2Expired,
    /// The Permit2 witness deadline has passed.
    Permit2WitnessExpired,
    /// The authorization's `validAfter` lies in the future.
    AuthorizationNotYetValid,
    /// The signed spender or recipient is not the requirement's `payTo`.
    InvalidSpenderAddress,
    /// The witness recipient is not the requirement's `payTo`.
    WitnessRecipientMismatch,
    /// The signed value or token does not cover the requirement.
    InvalidExactPayloadValue,
    /// The payer's token balance is below the required amount.
    InsufficientFunds,
    /// The payer has not approved enough tokens to Permit2.
    Permit2AllowanceInsufficient,
    /// The settlement transaction could not be submitted or confirmed.
    BroadcastFailed,
    /// The settlement transaction reverted.
    TransactionFailed,
}

impl ErrorReason {
    /// Returns the `snake_case` string representation matching the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPaymentHeader => "invalid_payment_header",
            Self::MissingPaymentHeader => "missing_payment_header",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::InvalidNetwork => "invalid_network",
            Self::SchemeNetworkMismatch => "scheme_network_mismatch",
            Self::InvalidPaymentRequirements => "invalid_payment_requirements",
            Self::InvalidPermitSignature => "invalid_permit_signature",
            Self::InvalidEip3009Signature => "invalid_eip3009_signature",
            Self::InvalidPermit2Signature => "invalid_permit2_signature",
            Self::InvalidPermit2WitnessSignature => "invalid_permit2_witness_signature",
            Self::PermitExpired => "permit_expired",
            Self::Eip3009Expired => "eip3009_expired",
            Self::Permit2Expired => "permit2_expired",
            Self::Permit2WitnessExpired => "permit2_witness_expired",
            Self::AuthorizationNotYetValid => "authorization_not_yet_valid",
            Self::InvalidSpenderAddress => "invalid_spender_address",
            Self::WitnessRecipientMismatch => "witness_recipient_mismatch",
            Self::InvalidExactPayloadValue => "invalid_exact_payload_value",
            Self::InsufficientFunds => "insufficient_funds",
            Self::Permit2AllowanceInsufficient => "permit2_allowance_insufficient",
            Self::BroadcastFailed => "broadcast_failed",
            Self::TransactionFailed => "transaction_failed",
        }
    }

    /// Returns `true` for reasons raised after a valid authorization was
    /// handed to the chain.
    #[must_use]
    pub const fn is_settlement_failure(&self) -> bool {
        matches!(self, Self::BroadcastFailed | Self::TransactionFailed)
    }
}

impl core::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for converting errors into structured payment problems.
pub trait AsPaymentProblem {
    /// Converts this error into a [`PaymentProblem`].
    fn as_payment_problem(&self) -> PaymentProblem;
}

/// A reason code paired with human-readable details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProblem {
    reason: ErrorReason,
    details: String,
}

impl PaymentProblem {
    /// Creates a new payment problem with the given reason and details.
    #[must_use]
    pub const fn new(reason: ErrorReason, details: String) -> Self {
        Self { reason, details }
    }

    /// Returns the error reason code.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        self.reason
    }

    /// Returns the human-readable error details.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }
}
