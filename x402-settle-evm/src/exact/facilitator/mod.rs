//! Facilitator-side payment verification and settlement for the EIP-155
//! exact scheme.
//!
//! [`Eip155ExactFacilitator`] routes on the payload's `authorizationType`
//! and plugs into [`x402_settle::orchestrator::PaymentOrchestrator`] through
//! the [`Facilitator`] trait.
//!
//! Key capabilities:
//! - EIP-712 domain construction with on-chain fallbacks
//! - ECDSA signature recovery (65-byte and ERC-2098 compact)
//! - Balance, amount and Permit2 allowance validation
//! - Single-transaction settlement through the chain provider

mod config;
mod domain;
mod error;
mod settle;
mod signature;
mod verify;

pub use config::Eip155ExactConfig;
pub use domain::DEFAULT_DOMAIN_VERSION;
pub use error::{Eip155ExactError, PaymentVerificationError};
pub use settle::SettledAuthorization;
pub use signature::SignatureFormatError;
pub use verify::VerifiedAuthorization;
use x402_settle::facilitator::{BoxFuture, Facilitator};
use x402_settle::proto::{
    AsPaymentProblem, PaymentPayload, PaymentRequirements, SettleOutcome, VerifyOutcome,
};

use crate::chain::{Eip155ChainReader, Eip155MetaTransactionProvider};
use crate::exact::types::ExactEvmPayload;

/// Verifies and settles EVM exact payments on one chain.
#[derive(Debug, Clone)]
pub struct Eip155ExactFacilitator<P> {
    provider: P,
    config: Eip155ExactConfig,
}

impl<P> Eip155ExactFacilitator<P> {
    /// Creates a facilitator over `provider`.
    pub const fn new(provider: P, config: Eip155ExactConfig) -> Self {
        Self { provider, config }
    }

    /// The underlying chain provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The facilitator settings.
    pub const fn config(&self) -> &Eip155ExactConfig {
        &self.config
    }
}

impl<P> Eip155ExactFacilitator<P>
where
    P: Eip155ChainReader + Eip155MetaTransactionProvider,
{
    /// Verifies a payload, returning the typed result.
    ///
    /// # Errors
    ///
    /// Returns [`Eip155ExactError`] describing the first failed check.
    pub async fn verify_payment(
        &self,
        payload: &PaymentPayload<ExactEvmPayload>,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedAuthorization, Eip155ExactError> {
        verify::verify_payment(&self.provider, &self.config, payload, requirements).await
    }

    /// Re-verifies and settles a payload, returning the typed result.
    ///
    /// # Errors
    ///
    /// Returns [`Eip155ExactError`] if verification fails or the settlement
    /// transaction cannot be sent, confirmed, or reverts.
    pub async fn settle_payment(
        &self,
        payload: &PaymentPayload<ExactEvmPayload>,
        requirements: &PaymentRequirements,
    ) -> Result<SettledAuthorization, Eip155ExactError> {
        settle::settle_payment(&self.provider, &self.config, payload, requirements).await
    }
}

impl<P> Facilitator for Eip155ExactFacilitator<P>
where
    P: Eip155ChainReader + Eip155MetaTransactionProvider,
{
    type Payload = ExactEvmPayload;

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload<ExactEvmPayload>,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyOutcome> {
        Box::pin(async move {
            match self.verify_payment(payload, requirements).await {
                Ok(verified) => VerifyOutcome::valid(verified.payer.to_string()),
                Err(e) => VerifyOutcome::invalid(
                    Some(payload.payload.payer().to_string()),
                    &e.as_payment_problem(),
                ),
            }
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload<ExactEvmPayload>,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleOutcome> {
        Box::pin(async move {
            match self.settle_payment(payload, requirements).await {
                Ok(settled) => SettleOutcome::Settled {
                    payer: settled.payer.to_string(),
                    transaction: settled.transaction_hash.to_string(),
                    network: requirements.network.clone(),
                },
                Err(e) => SettleOutcome::failed(
                    Some(payload.payload.payer().to_string()),
                    requirements.network.clone(),
                    &e.as_payment_problem(),
                ),
            }
        })
    }
}
