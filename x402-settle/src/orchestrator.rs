//! Per-request payment pipeline.
//!
//! A request moves through `Received → Parsed → Verified → Settled`, or stops
//! in `Failed` at the first problem. [`PaymentOrchestrator::parse`] handles the
//! header, the [`Facilitator`] handles verification and settlement, and
//! [`PaymentOrchestrator::process`] drives the whole sequence.
//!
//! A [`PaymentFailure`] always carries the original requirements so the
//! caller can answer with the same 402 body and let the client retry.

use std::fmt;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::facilitator::Facilitator;
use crate::headers::decode_payment_header;
use crate::proto::{
    ErrorReason, PaymentPayload, PaymentRequired, PaymentRequirements, SettleOutcome,
    VerifyOutcome,
};

/// Where in the pipeline a payment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStage {
    /// Decoding the payment header.
    Parse,
    /// Verifying the authorization.
    Verify,
    /// Settling the authorization on-chain.
    Settle,
}

impl fmt::Display for PaymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse",
            Self::Verify => "verify",
            Self::Settle => "settle",
        })
    }
}

/// Terminal failure of a payment attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("payment failed during {stage}: {reason}")]
pub struct PaymentFailure {
    /// Stage that produced the failure.
    pub stage: PaymentStage,
    /// Reason code forwarded from the failing component.
    pub reason: ErrorReason,
    /// Human-readable details, when the component supplied them.
    pub message: Option<String>,
    /// The payer, when it was identified before the failure.
    pub payer: Option<String>,
    /// The requirements the payment was attempted against.
    pub requirements: PaymentRequirements,
}

impl PaymentFailure {
    const fn at_parse(
        reason: ErrorReason,
        message: Option<String>,
        requirements: PaymentRequirements,
    ) -> Self {
        Self {
            stage: PaymentStage::Parse,
            reason,
            message,
            payer: None,
            requirements,
        }
    }

    /// Renders the 402 body to send back to the client.
    ///
    /// The body offers the unchanged requirements and names the reason code
    /// in `error`.
    #[must_use]
    pub fn payment_required(&self) -> PaymentRequired {
        PaymentRequired::new(
            vec![self.requirements.clone()],
            Some(self.reason.as_str().to_owned()),
        )
    }

    /// Returns `true` when the authorization itself was rejected, as opposed
    /// to a valid authorization whose transaction did not land.
    ///
    /// Settlement re-verifies, so a payment can still be rejected at
    /// [`PaymentStage::Settle`].
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !self.reason.is_settlement_failure()
    }
}

/// A decoded payment awaiting verification.
#[derive(Debug, Clone)]
pub struct ParsedPayment<P> {
    payload: PaymentPayload<P>,
    requirements: PaymentRequirements,
}

impl<P> ParsedPayment<P> {
    /// The decoded payment payload.
    pub const fn payload(&self) -> &PaymentPayload<P> {
        &self.payload
    }

    /// The requirements the payload will be checked against.
    pub const fn requirements(&self) -> &PaymentRequirements {
        &self.requirements
    }
}

/// A payment that passed verification.
#[derive(Debug, Clone)]
pub struct VerifiedPayment<P> {
    parsed: ParsedPayment<P>,
    payer: String,
}

impl<P> VerifiedPayment<P> {
    /// The verified payer address.
    pub fn payer(&self) -> &str {
        &self.payer
    }

    /// The underlying parsed payment.
    pub const fn parsed(&self) -> &ParsedPayment<P> {
        &self.parsed
    }
}

/// A payment that landed on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledPayment {
    /// The address that paid.
    pub payer: String,
    /// Transaction hash of the settlement.
    pub transaction: String,
    /// Network the transaction landed on.
    pub network: String,
}

/// Drives payments through parse, verify and settle.
#[derive(Debug, Clone)]
pub struct PaymentOrchestrator<F> {
    facilitator: F,
}

impl<F> PaymentOrchestrator<F> {
    /// Creates an orchestrator around a chain facilitator.
    pub const fn new(facilitator: F) -> Self {
        Self { facilitator }
    }

    /// Returns the wrapped facilitator.
    pub const fn facilitator(&self) -> &F {
        &self.facilitator
    }
}

impl<F: Facilitator> PaymentOrchestrator<F> {
    /// Decodes the payment header for the given requirements.
    ///
    /// No verifier is consulted here.
    ///
    /// # Errors
    ///
    /// `missing_payment_header` when `header` is `None` or blank,
    /// `invalid_payment_header` when it fails to decode.
    pub fn parse(
        &self,
        header: Option<&str>,
        requirements: PaymentRequirements,
    ) -> Result<ParsedPayment<F::Payload>, PaymentFailure> {
        let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
            return Err(PaymentFailure::at_parse(
                ErrorReason::MissingPaymentHeader,
                None,
                requirements,
            ));
        };
        match decode_payment_header::<F::Payload>(header) {
            Ok(payload) => Ok(ParsedPayment {
                payload,
                requirements,
            }),
            Err(e) => Err(PaymentFailure::at_parse(
                ErrorReason::InvalidPaymentHeader,
                Some(e.to_string()),
                requirements,
            )),
        }
    }

    /// Verifies a parsed payment.
    pub async fn verify(&self, parsed: &ParsedPayment<F::Payload>) -> VerifyOutcome {
        self.facilitator
            .verify(&parsed.payload, &parsed.requirements)
            .await
    }

    /// Settles a parsed payment. The facilitator re-verifies before sending.
    pub async fn settle(&self, parsed: &ParsedPayment<F::Payload>) -> SettleOutcome {
        self.facilitator
            .settle(&parsed.payload, &parsed.requirements)
            .await
    }

    /// Moves a parsed payment to the verified state.
    ///
    /// # Errors
    ///
    /// Forwards the verifier's reason code with [`PaymentStage::Verify`].
    pub async fn verify_payment(
        &self,
        parsed: ParsedPayment<F::Payload>,
    ) -> Result<VerifiedPayment<F::Payload>, PaymentFailure> {
        match self.verify(&parsed).await {
            VerifyOutcome::Valid { payer } => Ok(VerifiedPayment { parsed, payer }),
            VerifyOutcome::Invalid {
                reason,
                message,
                payer,
            } => Err(PaymentFailure {
                stage: PaymentStage::Verify,
                reason,
                message,
                payer,
                requirements: parsed.requirements,
            }),
        }
    }

    /// Moves a verified payment to the settled state.
    ///
    /// # Errors
    ///
    /// Forwards the dispatcher's reason code with [`PaymentStage::Settle`].
    pub async fn settle_payment(
        &self,
        verified: VerifiedPayment<F::Payload>,
    ) -> Result<SettledPayment, PaymentFailure> {
        match self.settle(&verified.parsed).await {
            SettleOutcome::Settled {
                payer,
                transaction,
                network,
            } => Ok(SettledPayment {
                payer,
                transaction,
                network,
            }),
            SettleOutcome::Failed {
                reason,
                message,
                payer,
                network: _,
            } => Err(PaymentFailure {
                stage: PaymentStage::Settle,
                reason,
                message,
                payer: payer.or(Some(verified.payer)),
                requirements: verified.parsed.requirements,
            }),
        }
    }

    /// Runs the whole pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns the first [`PaymentFailure`] encountered.
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        network = %requirements.network,
        pay_to = %requirements.pay_to,
    )))]
    pub async fn process(
        &self,
        header: Option<&str>,
        requirements: PaymentRequirements,
    ) -> Result<SettledPayment, PaymentFailure> {
        let parsed = self.parse(header, requirements)?;
        let verified = self.verify_payment(parsed).await?;
        let settled = self.settle_payment(verified).await?;
        #[cfg(feature = "telemetry")]
        tracing::info!(payer = %settled.payer, tx = %settled.transaction, "payment settled");
        Ok(settled)
    }
}
