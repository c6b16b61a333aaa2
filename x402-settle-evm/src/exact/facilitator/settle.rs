//! On-chain settlement logic for the EIP-155 exact scheme.
//!
//! A verified payload becomes exactly one transaction:
//!
//! | Authorization     | Target        | Call                          |
//! |-------------------|---------------|-------------------------------|
//! | `permit`          | `payTo`       | `settleWithPermit`            |
//! | `eip3009`         | token         | `transferWithAuthorization`   |
//! | `permit2`         | Permit2       | `permitTransferFrom`          |
//! | `permit2-witness` | Permit2       | `permitWitnessTransferFrom`   |

use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::{SolCall, SolStruct};
use x402_settle::proto::{PaymentPayload, PaymentRequirements};
#[cfg(feature = "telemetry")]
use tracing_core::Level;

use super::config::Eip155ExactConfig;
use super::error::Eip155ExactError;
use super::signature::{pack_signature, split_signature};
use super::verify::{VerifiedAuthorization, verify_payment};
use crate::chain::{Eip155ChainReader, Eip155MetaTransactionProvider, MetaTransaction};
use crate::exact::contract::{IEIP3009, IPermitSettlement, ISignatureTransfer};
use crate::exact::types::{ExactEvmPayload, SchemeId, WITNESS_TYPE_STRING, Witness};

/// A payment whose settlement transaction was mined successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledAuthorization {
    /// Address whose tokens moved.
    pub payer: Address,
    /// Authorization kind.
    pub scheme: SchemeId,
    /// Hash of the settlement transaction.
    pub transaction_hash: TxHash,
}

/// Re-verifies `payload` and submits its settlement transaction.
///
/// # Errors
///
/// Returns the verification error if the payload no longer verifies,
/// [`Eip155ExactError::Send`] if the transaction could not be submitted or
/// confirmed, and [`Eip155ExactError::TransactionReverted`] if it was mined
/// and reverted.
pub(super) async fn settle_payment<P>(
    provider: &P,
    config: &Eip155ExactConfig,
    payload: &PaymentPayload<ExactEvmPayload>,
    requirements: &PaymentRequirements,
) -> Result<SettledAuthorization, Eip155ExactError>
where
    P: Eip155ChainReader + Eip155MetaTransactionProvider,
{
    let verified = verify_payment(provider, config, payload, requirements).await?;
    let tx = settlement_transaction(config, &payload.payload, &verified);

    let tx_fut = provider.send_transaction(tx);
    let receipt = traced!(
        tx_fut,
        tracing::info_span!(
            "send_settlement",
            authorization_type = %verified.scheme,
            payer = %verified.payer,
            token = %verified.requirements.asset,
            otel.kind = "client",
        )
    )?;

    if receipt.status {
        #[cfg(feature = "telemetry")]
        tracing::event!(Level::INFO,
            status = "ok",
            tx = %receipt.transaction_hash,
            authorization_type = %verified.scheme,
            "settlement succeeded"
        );
        Ok(SettledAuthorization {
            payer: verified.payer,
            scheme: verified.scheme,
            transaction_hash: receipt.transaction_hash,
        })
    } else {
        #[cfg(feature = "telemetry")]
        tracing::event!(
            Level::WARN,
            status = "failed",
            tx = %receipt.transaction_hash,
            authorization_type = %verified.scheme,
            "settlement reverted"
        );
        Err(Eip155ExactError::TransactionReverted(
            receipt.transaction_hash,
        ))
    }
}

/// Builds the single settlement transaction for a verified payload.
///
/// Permit2 transfers are sent from the signed spender when the provider
/// holds that key, since Permit2 checks `msg.sender` against it.
pub(super) fn settlement_transaction(
    config: &Eip155ExactConfig,
    payload: &ExactEvmPayload,
    verified: &VerifiedAuthorization,
) -> MetaTransaction {
    let requirements = &verified.requirements;
    let (to, calldata, from) = match payload {
        ExactEvmPayload::Permit(p) => {
            let auth = &p.authorization;
            let (v, r, s) = split_signature(&verified.signature);
            let call = IPermitSettlement::settleWithPermitCall {
                token: requirements.asset,
                owner: auth.owner,
                value: auth.value.into(),
                deadline: auth.deadline.into(),
                v,
                r,
                s,
            };
            (requirements.pay_to, call.abi_encode(), None)
        }
        ExactEvmPayload::Eip3009(p) => {
            let auth = &p.authorization;
            let (v, r, s) = split_signature(&verified.signature);
            let call = IEIP3009::transferWithAuthorization_1Call {
                from: auth.from,
                to: auth.to,
                value: auth.value.into(),
                validAfter: U256::from(auth.valid_after.as_secs()),
                validBefore: U256::from(auth.valid_before.as_secs()),
                nonce: auth.nonce,
                v,
                r,
                s,
            };
            (requirements.asset, call.abi_encode(), None)
        }
        ExactEvmPayload::Permit2(p) => {
            let auth = &p.authorization;
            let call = ISignatureTransfer::permitTransferFromCall {
                permit: ISignatureTransfer::PermitTransferFrom {
                    permitted: ISignatureTransfer::TokenPermissions {
                        token: auth.token,
                        amount: auth.amount.into(),
                    },
                    nonce: auth.nonce.into(),
                    deadline: auth.deadline.into(),
                },
                transferDetails: ISignatureTransfer::SignatureTransferDetails {
                    to: requirements.pay_to,
                    requestedAmount: requirements.max_amount_required,
                },
                owner: auth.owner,
                signature: pack_signature(&verified.signature),
            };
            (config.permit2_address, call.abi_encode(), Some(auth.spender))
        }
        ExactEvmPayload::Permit2Witness(p) => {
            let auth = &p.authorization;
            let call = ISignatureTransfer::permitWitnessTransferFromCall {
                permit: ISignatureTransfer::PermitTransferFrom {
                    permitted: ISignatureTransfer::TokenPermissions {
                        token: auth.token,
                        amount: auth.amount.into(),
                    },
                    nonce: auth.nonce.into(),
                    deadline: auth.deadline.into(),
                },
                transferDetails: ISignatureTransfer::SignatureTransferDetails {
                    to: auth.witness.to,
                    requestedAmount: requirements.max_amount_required,
                },
                owner: auth.owner,
                witness: Witness::from(&auth.witness).eip712_hash_struct(),
                witnessTypeString: WITNESS_TYPE_STRING.to_owned(),
                signature: pack_signature(&verified.signature),
            };
            (config.permit2_address, call.abi_encode(), Some(auth.spender))
        }
    };
    MetaTransaction {
        to,
        calldata: calldata.into(),
        confirmations: 1,
        from,
    }
}
