//! Payment verification logic for the EIP-155 exact scheme.
//!
//! Every authorization kind runs the same sequence, stopping at the first
//! failure: scheme and network, EIP-712 domain, time bounds, signature,
//! counterparty, signed value, payer balance and, for Permit2, the payer's
//! allowance to the Permit2 contract. All checks are read-only.

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_sol_types::SolStruct;
#[cfg(feature = "telemetry")]
use tracing::instrument;
use x402_settle::proto::{PaymentPayload, PaymentRequirements, UnixTimestamp};

use super::config::Eip155ExactConfig;
use super::domain::{permit2_domain, token_domain};
use super::error::{Eip155ExactError, PaymentVerificationError};
use super::signature::recover_signer;
use crate::chain::{ChainId, Eip155ChainReader, call_sol};
use crate::exact::contract::IERC20;
use crate::exact::types::{
    Eip3009Payload, ExactEvmPayload, ExactEvmRequirements, ExactScheme, Permit, Permit2Payload,
    Permit2WitnessPayload, PermitPayload, PermitTransferFrom, PermitWitnessTransferFrom, SchemeId,
    TransferWithAuthorization,
};
use crate::networks::chain_id_by_network;

/// A payload that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAuthorization {
    /// Address whose tokens move.
    pub payer: Address,
    /// Authorization kind.
    pub scheme: SchemeId,
    /// The parsed signature, `s` normalized.
    pub signature: Signature,
    /// Typed view of the requirement the payload was checked against.
    pub requirements: ExactEvmRequirements,
}

/// Verifies `payload` against `requirements` on the chain behind `reader`.
///
/// # Errors
///
/// Returns [`Eip155ExactError::PaymentVerification`] naming the first check
/// that failed, or [`Eip155ExactError::ChainRead`] if a required read failed
/// at the transport level.
#[cfg_attr(
    feature = "telemetry",
    instrument(
        skip_all,
        err,
        fields(
            authorization_type = %payload.payload.scheme_id(),
            network = %requirements.network,
        )
    )
)]
pub(super) async fn verify_payment<R: Eip155ChainReader>(
    reader: &R,
    config: &Eip155ExactConfig,
    payload: &PaymentPayload<ExactEvmPayload>,
    requirements: &PaymentRequirements,
) -> Result<VerifiedAuthorization, Eip155ExactError> {
    for scheme in [&payload.scheme, &requirements.scheme] {
        if scheme != ExactScheme::VALUE {
            return Err(PaymentVerificationError::UnsupportedScheme(scheme.clone()).into());
        }
    }
    let typed = ExactEvmRequirements::parse(requirements).ok_or_else(|| {
        PaymentVerificationError::InvalidRequirements(
            "requirement does not describe an EVM exact payment".into(),
        )
    })?;
    let scheme = payload.payload.scheme_id();
    if !typed.payment_type.allows(scheme) {
        return Err(PaymentVerificationError::UnsupportedScheme(format!(
            "authorization type {scheme} is not accepted by this requirement"
        ))
        .into());
    }
    let chain_id = assert_network(reader, &payload.network, &typed)?;
    let ctx = VerifyContext {
        reader,
        config,
        chain_id,
        requirements: &typed,
        now: UnixTimestamp::now().as_secs(),
    };

    let (payer, signature) = match &payload.payload {
        ExactEvmPayload::Permit(p) => ctx.verify_permit(p).await?,
        ExactEvmPayload::Eip3009(p) => ctx.verify_eip3009(p).await?,
        ExactEvmPayload::Permit2(p) => ctx.verify_permit2(p).await?,
        ExactEvmPayload::Permit2Witness(p) => ctx.verify_permit2_witness(p).await?,
    };

    #[cfg(feature = "telemetry")]
    tracing::debug!(%payer, %scheme, "payment verified");

    Ok(VerifiedAuthorization {
        payer,
        scheme,
        signature,
        requirements: typed,
    })
}

/// Checks that payload and requirement agree on the network and that it is
/// the chain `reader` serves.
///
/// Networks are compared by resolved chain ID, so `"base"` and
/// `"eip155:8453"` match; unknown names are compared as written.
fn assert_network<R: Eip155ChainReader>(
    reader: &R,
    payload_network: &str,
    requirements: &ExactEvmRequirements,
) -> Result<ChainId, PaymentVerificationError> {
    let payload_chain = chain_id_by_network(payload_network);
    let same = payload_network == requirements.network
        || (payload_chain.is_some() && payload_chain == requirements.chain_id);
    if !same {
        return Err(PaymentVerificationError::NetworkMismatch {
            payload: payload_network.to_owned(),
            requirement: requirements.network.clone(),
        });
    }
    match requirements.chain_id {
        Some(chain_id) if chain_id == reader.chain_id() => Ok(chain_id),
        _ => Err(PaymentVerificationError::InvalidNetwork(
            requirements.network.clone(),
        )),
    }
}

/// Rejects a deadline that has passed or falls within `skew` seconds.
fn assert_not_expired(
    scheme: SchemeId,
    deadline: U256,
    now: u64,
    skew: u64,
) -> Result<(), PaymentVerificationError> {
    if deadline < U256::from(now.saturating_add(skew)) {
        return Err(PaymentVerificationError::Expired {
            scheme,
            deadline,
            now,
        });
    }
    Ok(())
}

/// Rejects an authorization whose `validAfter` is still in the future.
fn assert_started(valid_after: U256, now: u64) -> Result<(), PaymentVerificationError> {
    if valid_after > U256::from(now) {
        return Err(PaymentVerificationError::NotYetValid { valid_after, now });
    }
    Ok(())
}

/// Recovers the signer of `digest` and checks it is `expected`.
fn assert_signed_by(
    scheme: SchemeId,
    signature: &[u8],
    digest: &B256,
    expected: Address,
) -> Result<Signature, Eip155ExactError> {
    let (signature, signer) =
        recover_signer(signature, digest).map_err(|e| Eip155ExactError::from((scheme, e)))?;
    if signer != expected {
        return Err(Eip155ExactError::invalid_signature(
            scheme,
            format!("recovered {signer}, expected {expected}"),
        ));
    }
    Ok(signature)
}

fn assert_enough_value(signed: U256, required: U256) -> Result<(), PaymentVerificationError> {
    if signed < required {
        return Err(PaymentVerificationError::InsufficientValue { signed, required });
    }
    Ok(())
}

struct VerifyContext<'a, R> {
    reader: &'a R,
    config: &'a Eip155ExactConfig,
    chain_id: ChainId,
    requirements: &'a ExactEvmRequirements,
    now: u64,
}

impl<R: Eip155ChainReader> VerifyContext<'_, R> {
    const fn skew(&self) -> u64 {
        self.config.clock_skew_tolerance_secs
    }

    fn assert_pay_to_spender(&self, spender: Address) -> Result<(), PaymentVerificationError> {
        if spender != self.requirements.pay_to {
            return Err(PaymentVerificationError::SpenderMismatch {
                expected: self.requirements.pay_to,
                actual: spender,
            });
        }
        Ok(())
    }

    fn assert_asset(&self, token: Address) -> Result<(), PaymentVerificationError> {
        if token != self.requirements.asset {
            return Err(PaymentVerificationError::TokenMismatch {
                expected: self.requirements.asset,
                actual: token,
            });
        }
        Ok(())
    }

    async fn assert_enough_balance(&self, owner: Address) -> Result<(), Eip155ExactError> {
        let required = self.requirements.max_amount_required;
        let balance = call_sol(
            self.reader,
            self.requirements.asset,
            IERC20::balanceOfCall { account: owner },
        )
        .await?;
        if balance < required {
            return Err(PaymentVerificationError::InsufficientFunds { balance, required }.into());
        }
        Ok(())
    }

    async fn assert_permit2_allowance(&self, owner: Address) -> Result<(), Eip155ExactError> {
        let required = self.requirements.max_amount_required;
        let allowance = call_sol(
            self.reader,
            self.requirements.asset,
            IERC20::allowanceCall {
                owner,
                spender: self.config.permit2_address,
            },
        )
        .await?;
        if allowance < required {
            return Err(
                PaymentVerificationError::Permit2AllowanceInsufficient { allowance, required }
                    .into(),
            );
        }
        Ok(())
    }

    async fn verify_permit(
        &self,
        payload: &PermitPayload,
    ) -> Result<(Address, Signature), Eip155ExactError> {
        let auth = &payload.authorization;
        let domain = token_domain(
            self.reader,
            self.chain_id,
            self.requirements.asset,
            &self.requirements.extra,
        )
        .await?;
        assert_not_expired(SchemeId::Permit, auth.deadline.into(), self.now, self.skew())?;
        let digest = Permit::from(auth).eip712_signing_hash(&domain);
        let signature =
            assert_signed_by(SchemeId::Permit, &payload.signature, &digest, auth.owner)?;
        self.assert_pay_to_spender(auth.spender)?;
        assert_enough_value(auth.value.into(), self.requirements.max_amount_required)?;
        self.assert_enough_balance(auth.owner).await?;
        Ok((auth.owner, signature))
    }

    async fn verify_eip3009(
        &self,
        payload: &Eip3009Payload,
    ) -> Result<(Address, Signature), Eip155ExactError> {
        let auth = &payload.authorization;
        let domain = token_domain(
            self.reader,
            self.chain_id,
            self.requirements.asset,
            &self.requirements.extra,
        )
        .await?;
        assert_not_expired(
            SchemeId::Eip3009,
            U256::from(auth.valid_before.as_secs()),
            self.now,
            self.skew(),
        )?;
        assert_started(U256::from(auth.valid_after.as_secs()), self.now)?;
        let digest = TransferWithAuthorization::from(auth).eip712_signing_hash(&domain);
        let signature =
            assert_signed_by(SchemeId::Eip3009, &payload.signature, &digest, auth.from)?;
        if auth.to != self.requirements.pay_to {
            return Err(PaymentVerificationError::RecipientMismatch {
                expected: self.requirements.pay_to,
                actual: auth.to,
            }
            .into());
        }
        assert_enough_value(auth.value.into(), self.requirements.max_amount_required)?;
        self.assert_enough_balance(auth.from).await?;
        Ok((auth.from, signature))
    }

    async fn verify_permit2(
        &self,
        payload: &Permit2Payload,
    ) -> Result<(Address, Signature), Eip155ExactError> {
        let auth = &payload.authorization;
        let domain = permit2_domain(self.chain_id, self.config.permit2_address);
        assert_not_expired(SchemeId::Permit2, auth.deadline.into(), self.now, self.skew())?;
        let digest = PermitTransferFrom::from(auth).eip712_signing_hash(&domain);
        let signature =
            assert_signed_by(SchemeId::Permit2, &payload.signature, &digest, auth.owner)?;
        self.assert_pay_to_spender(auth.spender)?;
        self.assert_asset(auth.token)?;
        assert_enough_value(auth.amount.into(), self.requirements.max_amount_required)?;
        self.assert_enough_balance(auth.owner).await?;
        self.assert_permit2_allowance(auth.owner).await?;
        Ok((auth.owner, signature))
    }

    async fn verify_permit2_witness(
        &self,
        payload: &Permit2WitnessPayload,
    ) -> Result<(Address, Signature), Eip155ExactError> {
        let auth = &payload.authorization;
        let domain = permit2_domain(self.chain_id, self.config.permit2_address);
        assert_not_expired(
            SchemeId::Permit2Witness,
            auth.deadline.into(),
            self.now,
            self.skew(),
        )?;
        assert_started(auth.witness.valid_after.into(), self.now)?;
        let digest = PermitWitnessTransferFrom::from(auth).eip712_signing_hash(&domain);
        let signature = assert_signed_by(
            SchemeId::Permit2Witness,
            &payload.signature,
            &digest,
            auth.owner,
        )?;
        self.assert_pay_to_spender(auth.spender)?;
        if auth.witness.to != self.requirements.pay_to {
            return Err(PaymentVerificationError::WitnessRecipientMismatch {
                expected: self.requirements.pay_to,
                actual: auth.witness.to,
            }
            .into());
        }
        self.assert_asset(auth.token)?;
        assert_enough_value(auth.amount.into(), self.requirements.max_amount_required)?;
        self.assert_enough_balance(auth.owner).await?;
        self.assert_permit2_allowance(auth.owner).await?;
        Ok((auth.owner, signature))
    }
}
