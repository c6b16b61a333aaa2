//! Error types for the EIP-155 exact scheme facilitator.

use alloy_primitives::{Address, TxHash, U256};
use x402_settle::proto::{AsPaymentProblem, ErrorReason, PaymentProblem};

use super::signature::SignatureFormatError;
use crate::chain::{ChainReadError, MetaTransactionSendError};
use crate::exact::types::SchemeId;

/// Why a payload does not satisfy its requirements.
#[derive(Debug, thiserror::Error)]
pub enum PaymentVerificationError {
    /// The scheme or authorization type is not accepted.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    /// Payload and requirement name different networks.
    #[error("payload network {payload} does not match requirement network {requirement}")]
    NetworkMismatch {
        /// Network named by the payload.
        payload: String,
        /// Network named by the requirement.
        requirement: String,
    },
    /// The network is unknown or not served by this facilitator.
    #[error("network {0} is not served here")]
    InvalidNetwork(String),
    /// The requirement itself is malformed.
    #[error("invalid payment requirements: {0}")]
    InvalidRequirements(String),
    /// The signature is malformed or recovers to someone other than the payer.
    #[error("invalid {scheme} signature: {reason}")]
    InvalidSignature {
        /// Authorization kind.
        scheme: SchemeId,
        /// What went wrong.
        reason: String,
    },
    /// The deadline has passed or falls within the skew tolerance.
    #[error("{scheme} authorization expired at {deadline} (now {now})")]
    Expired {
        /// Authorization kind.
        scheme: SchemeId,
        /// Signed deadline.
        deadline: U256,
        /// Facilitator clock.
        now: u64,
    },
    /// `validAfter` lies in the future.
    #[error("authorization not valid before {valid_after} (now {now})")]
    NotYetValid {
        /// Signed lower bound.
        valid_after: U256,
        /// Facilitator clock.
        now: u64,
    },
    /// The signed spender is not the requirement's `payTo`.
    #[error("signed spender {actual} is not payTo {expected}")]
    SpenderMismatch {
        /// `payTo`.
        expected: Address,
        /// Signed spender.
        actual: Address,
    },
    /// The EIP-3009 recipient is not the requirement's `payTo`.
    #[error("signed recipient {actual} is not payTo {expected}")]
    RecipientMismatch {
        /// `payTo`.
        expected: Address,
        /// Signed recipient.
        actual: Address,
    },
    /// The witness recipient is not the requirement's `payTo`.
    #[error("witness recipient {actual} is not payTo {expected}")]
    WitnessRecipientMismatch {
        /// `payTo`.
        expected: Address,
        /// Witness `to`.
        actual: Address,
    },
    /// The signed token is not the requirement's asset.
    #[error("signed token {actual} is not the required asset {expected}")]
    TokenMismatch {
        /// Required asset.
        expected: Address,
        /// Signed token.
        actual: Address,
    },
    /// The signed amount is below the required amount.
    #[error("signed value {signed} is below the required {required}")]
    InsufficientValue {
        /// Signed amount.
        signed: U256,
        /// `maxAmountRequired`.
        required: U256,
    },
    /// The payer does not hold enough tokens.
    #[error("balance {balance} is below the required {required}")]
    InsufficientFunds {
        /// Payer balance.
        balance: U256,
        /// `maxAmountRequired`.
        required: U256,
    },
    /// The payer has not approved enough tokens to Permit2.
    #[error("Permit2 allowance {allowance} is below the required {required}")]
    Permit2AllowanceInsufficient {
        /// Current allowance to Permit2.
        allowance: U256,
        /// `maxAmountRequired`.
        required: U256,
    },
}

impl PaymentVerificationError {
    /// The wire reason code for this failure.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::UnsupportedScheme(_) => ErrorReason::UnsupportedScheme,
            Self::NetworkMismatch { .. } => ErrorReason::SchemeNetworkMismatch,
            Self::InvalidNetwork(_) => ErrorReason::InvalidNetwork,
            Self::InvalidRequirements(_) => ErrorReason::InvalidPaymentRequirements,
            Self::InvalidSignature { scheme, .. } => scheme.invalid_signature_reason(),
            Self::Expired { scheme, .. } => scheme.expired_reason(),
            Self::NotYetValid { .. } => ErrorReason::AuthorizationNotYetValid,
            Self::SpenderMismatch { .. } | Self::RecipientMismatch { .. } => {
                ErrorReason::InvalidSpenderAddress
            }
            Self::WitnessRecipientMismatch { .. } => ErrorReason::WitnessRecipientMismatch,
            Self::TokenMismatch { .. } | Self::InsufficientValue { .. } => {
                ErrorReason::InvalidExactPayloadValue
            }
            Self::InsufficientFunds { .. } => ErrorReason::InsufficientFunds,
            Self::Permit2AllowanceInsufficient { .. } => ErrorReason::Permit2AllowanceInsufficient,
        }
    }
}

/// Errors specific to EIP-155 exact scheme operations.
#[derive(Debug, thiserror::Error)]
pub enum Eip155ExactError {
    /// Payment verification failed.
    #[error(transparent)]
    PaymentVerification(#[from] PaymentVerificationError),
    /// A chain read needed for verification failed.
    #[error("chain read failed: {0}")]
    ChainRead(#[from] ChainReadError),
    /// The settlement transaction was mined and reverted.
    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),
    /// The settlement transaction could not be sent or confirmed.
    #[error(transparent)]
    Send(#[from] MetaTransactionSendError),
}

impl Eip155ExactError {
    /// Builds a signature error for `scheme`.
    pub(super) fn invalid_signature(scheme: SchemeId, reason: impl ToString) -> Self {
        PaymentVerificationError::InvalidSignature {
            scheme,
            reason: reason.to_string(),
        }
        .into()
    }
}

impl From<(SchemeId, SignatureFormatError)> for Eip155ExactError {
    fn from((scheme, e): (SchemeId, SignatureFormatError)) -> Self {
        Self::invalid_signature(scheme, e)
    }
}

impl AsPaymentProblem for Eip155ExactError {
    fn as_payment_problem(&self) -> PaymentProblem {
        let reason = match self {
            Self::PaymentVerification(e) => e.reason(),
            Self::ChainRead(_) => ErrorReason::InvalidNetwork,
            Self::TransactionReverted(_) | Self::Send(MetaTransactionSendError::Reverted(_)) => {
                ErrorReason::TransactionFailed
            }
            Self::Send(_) => ErrorReason::BroadcastFailed,
        };
        PaymentProblem::new(reason, self.to_string())
    }
}
