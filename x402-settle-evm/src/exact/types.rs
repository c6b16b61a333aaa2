//! Type definitions for the EIP-155 "exact" payment scheme.
//!
//! The client's `payload` object is discriminated by `authorizationType`
//! into one of four authorization kinds, each carrying the signed fields
//! and a 65-byte (or 64-byte ERC-2098) ECDSA signature over the matching
//! EIP-712 struct defined at the bottom of this module.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, Bytes, U256, address};
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};
use x402_settle::proto::{ErrorReason, PaymentRequirements, UnixTimestamp};
pub use x402_settle::scheme::ExactScheme;

use crate::chain::{ChainId, TokenAmount};
use crate::networks::chain_id_by_network;

/// Canonical Uniswap Permit2 contract address (same on all EVM chains via CREATE2).
pub const PERMIT2_ADDRESS: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// EIP-712 domain name of the Permit2 contract.
pub const PERMIT2_DOMAIN_NAME: &str = "Permit2";

/// The `witnessTypeString` passed to `permitWitnessTransferFrom`.
///
/// Permit2 prepends its own `PermitWitnessTransferFrom(...,` stub, so this is
/// the tail of [`PermitWitnessTransferFrom`]'s EIP-712 type starting at the
/// witness member.
pub const WITNESS_TYPE_STRING: &str = "Witness witness)TokenPermissions(address token,uint256 amount)Witness(address to,uint256 validAfter,bytes extra)";

/// The four authorization kinds of the exact scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeId {
    /// EIP-2612 `permit`.
    #[serde(rename = "permit")]
    Permit,
    /// EIP-3009 `transferWithAuthorization`.
    #[serde(rename = "eip3009")]
    Eip3009,
    /// Permit2 signature transfer.
    #[serde(rename = "permit2")]
    Permit2,
    /// Permit2 signature transfer with an x402 witness binding the recipient.
    #[serde(rename = "permit2-witness")]
    Permit2Witness,
}

impl SchemeId {
    /// All authorization kinds, in recommendation priority order.
    pub const ALL: [Self; 4] = [Self::Eip3009, Self::Permit, Self::Permit2, Self::Permit2Witness];

    /// Returns the wire name used in `authorizationType` and `paymentType`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Eip3009 => "eip3009",
            Self::Permit2 => "permit2",
            Self::Permit2Witness => "permit2-witness",
        }
    }

    /// The reason reported when the authorization's deadline has passed.
    #[must_use]
    pub const fn expired_reason(self) -> ErrorReason {
        match self {
            Self::Permit => ErrorReason::PermitExpired,
            Self::Eip3009 => ErrorReason::Eip3009Expired,
            Self::Permit2 => ErrorReason::Permit2Expired,
            Self::Permit2Witness => ErrorReason::Permit2WitnessExpired,
        }
    }

    /// The reason reported when the signature does not recover to the payer.
    #[must_use]
    pub const fn invalid_signature_reason(self) -> ErrorReason {
        match self {
            Self::Permit => ErrorReason::InvalidPermitSignature,
            Self::Eip3009 => ErrorReason::InvalidEip3009Signature,
            Self::Permit2 => ErrorReason::InvalidPermit2Signature,
            Self::Permit2Witness => ErrorReason::InvalidPermit2WitnessSignature,
        }
    }
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown authorization type '{s}'"))
    }
}

/// Which authorization kinds a requirement accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentTypeFilter {
    /// `paymentType` absent or `"auto"`.
    Any,
    /// Exactly one kind.
    Only(SchemeId),
}

impl PaymentTypeFilter {
    /// Returns `true` if `scheme` is accepted.
    #[must_use]
    pub fn allows(self, scheme: SchemeId) -> bool {
        match self {
            Self::Any => true,
            Self::Only(only) => only == scheme,
        }
    }

    /// Parses the optional `paymentType` field of a requirement.
    ///
    /// # Errors
    ///
    /// Returns an error for any value other than a [`SchemeId`] or `"auto"`.
    pub fn parse(payment_type: Option<&str>) -> Result<Self, String> {
        match payment_type {
            None | Some("auto") => Ok(Self::Any),
            Some(other) => other.parse().map(Self::Only),
        }
    }
}

/// EIP-712 domain overrides carried in a requirement's `extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirementsExtra {
    /// The token's EIP-712 domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The token's EIP-712 domain version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Typed view of a [`PaymentRequirements`] for EVM exact payments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactEvmRequirements {
    /// The requirement's network as written.
    pub network: String,
    /// The resolved chain, `None` if the network is unknown.
    pub chain_id: Option<ChainId>,
    /// Token contract.
    pub asset: Address,
    /// Payment recipient.
    pub pay_to: Address,
    /// Required amount in base units.
    pub max_amount_required: U256,
    /// Accepted authorization kinds.
    pub payment_type: PaymentTypeFilter,
    /// EIP-712 domain overrides.
    pub extra: PaymentRequirementsExtra,
}

impl ExactEvmRequirements {
    /// Builds the typed view.
    ///
    /// Returns `None` if the scheme is not `"exact"`, an address or the
    /// amount fails to parse, `extra` has the wrong shape, or `paymentType`
    /// is not recognised.
    #[must_use]
    pub fn parse(requirements: &PaymentRequirements) -> Option<Self> {
        let concrete = requirements
            .as_concrete::<ExactScheme, TokenAmount, Address, PaymentRequirementsExtra>()?;
        let payment_type = PaymentTypeFilter::parse(concrete.payment_type.as_deref()).ok()?;
        Some(Self {
            chain_id: chain_id_by_network(&concrete.network),
            network: concrete.network,
            asset: concrete.asset,
            pay_to: concrete.pay_to,
            max_amount_required: concrete.max_amount_required.into(),
            payment_type,
            extra: concrete.extra.unwrap_or_default(),
        })
    }
}

/// The EVM exact-scheme `payload`, tagged by `authorizationType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "authorizationType")]
pub enum ExactEvmPayload {
    /// EIP-2612 permit.
    #[serde(rename = "permit")]
    Permit(PermitPayload),
    /// EIP-3009 transfer authorization.
    #[serde(rename = "eip3009")]
    Eip3009(Eip3009Payload),
    /// Permit2 signature transfer.
    #[serde(rename = "permit2")]
    Permit2(Permit2Payload),
    /// Permit2 signature transfer with witness.
    #[serde(rename = "permit2-witness")]
    Permit2Witness(Permit2WitnessPayload),
}

impl ExactEvmPayload {
    /// Returns the authorization kind.
    #[must_use]
    pub const fn scheme_id(&self) -> SchemeId {
        match self {
            Self::Permit(_) => SchemeId::Permit,
            Self::Eip3009(_) => SchemeId::Eip3009,
            Self::Permit2(_) => SchemeId::Permit2,
            Self::Permit2Witness(_) => SchemeId::Permit2Witness,
        }
    }

    /// Returns the address whose tokens move.
    #[must_use]
    pub const fn payer(&self) -> Address {
        match self {
            Self::Permit(p) => p.authorization.owner,
            Self::Eip3009(p) => p.authorization.from,
            Self::Permit2(p) => p.authorization.owner,
            Self::Permit2Witness(p) => p.authorization.owner,
        }
    }
}

/// EIP-2612 permit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitPayload {
    /// Signature over [`Permit`].
    pub signature: Bytes,
    /// The signed fields.
    pub authorization: PermitAuthorization,
}

/// Fields of an EIP-2612 permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitAuthorization {
    /// Token holder granting the allowance.
    pub owner: Address,
    /// Address allowed to spend.
    pub spender: Address,
    /// Allowance granted.
    pub value: TokenAmount,
    /// The owner's current permit nonce on the token.
    pub nonce: TokenAmount,
    /// Unix time after which the permit is void.
    pub deadline: TokenAmount,
}

/// EIP-3009 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip3009Payload {
    /// Signature over [`TransferWithAuthorization`].
    pub signature: Bytes,
    /// The signed fields.
    pub authorization: Eip3009Authorization,
}

/// Fields of an EIP-3009 `transferWithAuthorization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Payer.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Amount transferred.
    pub value: TokenAmount,
    /// Not valid before this time.
    pub valid_after: UnixTimestamp,
    /// Not valid at or after this time.
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce chosen by the payer.
    pub nonce: B256,
}

/// Permit2 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit2Payload {
    /// Signature over [`PermitTransferFrom`].
    pub signature: Bytes,
    /// The signed fields.
    pub authorization: Permit2Authorization,
}

/// Fields of a Permit2 `PermitTransferFrom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2Authorization {
    /// Token holder.
    pub owner: Address,
    /// Address allowed to call Permit2 with this signature.
    pub spender: Address,
    /// Token permitted.
    pub token: Address,
    /// Maximum amount permitted.
    pub amount: TokenAmount,
    /// Unordered Permit2 nonce.
    pub nonce: TokenAmount,
    /// Unix time after which the signature is void.
    pub deadline: TokenAmount,
}

/// Permit2 payload with witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit2WitnessPayload {
    /// Signature over [`PermitWitnessTransferFrom`].
    pub signature: Bytes,
    /// The signed fields.
    pub authorization: Permit2WitnessAuthorization,
}

/// Fields of a Permit2 `PermitWitnessTransferFrom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2WitnessAuthorization {
    /// Token holder.
    pub owner: Address,
    /// Address allowed to call Permit2 with this signature.
    pub spender: Address,
    /// Token permitted.
    pub token: Address,
    /// Maximum amount permitted.
    pub amount: TokenAmount,
    /// Unordered Permit2 nonce.
    pub nonce: TokenAmount,
    /// Unix time after which the signature is void.
    pub deadline: TokenAmount,
    /// Extra data bound into the signature.
    pub witness: Permit2WitnessData,
}

/// The x402 witness: who receives the funds and from when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2WitnessData {
    /// Destination address for funds.
    pub to: Address,
    /// Not valid before this time.
    pub valid_after: TokenAmount,
    /// Opaque extra data (`0x` when unused).
    #[serde(default)]
    pub extra: Bytes,
}

sol! {
    /// EIP-2612 `Permit` typed-data struct.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }

    /// EIP-3009 `TransferWithAuthorization` typed-data struct.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }

    /// Permit2 token permissions.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct TokenPermissions {
        address token;
        uint256 amount;
    }

    /// Permit2 `PermitTransferFrom` typed-data struct.
    ///
    /// `spender` is signed but not passed on-chain: Permit2 substitutes
    /// `msg.sender`.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct PermitTransferFrom {
        TokenPermissions permitted;
        address spender;
        uint256 nonce;
        uint256 deadline;
    }

    /// The x402 witness struct.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct Witness {
        address to;
        uint256 validAfter;
        bytes extra;
    }

    /// Permit2 `PermitWitnessTransferFrom` typed-data struct with the x402 witness.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    struct PermitWitnessTransferFrom {
        TokenPermissions permitted;
        address spender;
        uint256 nonce;
        uint256 deadline;
        Witness witness;
    }
}

impl From<&PermitAuthorization> for Permit {
    fn from(auth: &PermitAuthorization) -> Self {
        Self {
            owner: auth.owner,
            spender: auth.spender,
            value: auth.value.into(),
            nonce: auth.nonce.into(),
            deadline: auth.deadline.into(),
        }
    }
}

impl From<&Eip3009Authorization> for TransferWithAuthorization {
    fn from(auth: &Eip3009Authorization) -> Self {
        Self {
            from: auth.from,
            to: auth.to,
            value: auth.value.into(),
            validAfter: U256::from(auth.valid_after.as_secs()),
            validBefore: U256::from(auth.valid_before.as_secs()),
            nonce: auth.nonce,
        }
    }
}

impl From<&Permit2Authorization> for PermitTransferFrom {
    fn from(auth: &Permit2Authorization) -> Self {
        Self {
            permitted: TokenPermissions {
                token: auth.token,
                amount: auth.amount.into(),
            },
            spender: auth.spender,
            nonce: auth.nonce.into(),
            deadline: auth.deadline.into(),
        }
    }
}

impl From<&Permit2WitnessData> for Witness {
    fn from(witness: &Permit2WitnessData) -> Self {
        Self {
            to: witness.to,
            validAfter: witness.valid_after.into(),
            extra: witness.extra.clone(),
        }
    }
}

impl From<&Permit2WitnessAuthorization> for PermitWitnessTransferFrom {
    fn from(auth: &Permit2WitnessAuthorization) -> Self {
        Self {
            permitted: TokenPermissions {
                token: auth.token,
                amount: auth.amount.into(),
            },
            spender: auth.spender,
            nonce: auth.nonce.into(),
            deadline: auth.deadline.into(),
            witness: Witness::from(&auth.witness),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn requirements(payment_type: Option<&str>) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "1000".into(),
            resource: "https://api.example.com/weather".into(),
            description: "weather".into(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            max_timeout_seconds: 60,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            payment_type: payment_type.map(str::to_owned),
            extra: Some(json!({ "name": "USDC", "version": "2" })),
        }
    }

    #[test]
    fn payload_is_tagged_by_authorization_type() {
        let payload: ExactEvmPayload = serde_json::from_value(json!({
            "authorizationType": "permit2-witness",
            "signature": "0x1234",
            "authorization": {
                "owner": "0x857b06519E91e3A54538791bDbb0E22373e36b66",
                "spender": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                "token": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                "amount": "1000",
                "nonce": "7",
                "deadline": "1900000000",
                "witness": {
                    "to": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                    "validAfter": "0"
                }
            }
        }))
        .unwrap();
        assert_eq!(payload.scheme_id(), SchemeId::Permit2Witness);
        let ExactEvmPayload::Permit2Witness(p) = &payload else {
            panic!("wrong variant");
        };
        assert!(p.authorization.witness.extra.is_empty());

        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["authorizationType"], "permit2-witness");
    }

    #[test]
    fn unknown_authorization_type_is_rejected() {
        let result = serde_json::from_value::<ExactEvmPayload>(json!({
            "authorizationType": "upto",
            "signature": "0x",
            "authorization": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn payment_type_filter() {
        assert_eq!(PaymentTypeFilter::parse(None), Ok(PaymentTypeFilter::Any));
        assert_eq!(PaymentTypeFilter::parse(Some("auto")), Ok(PaymentTypeFilter::Any));
        let only = PaymentTypeFilter::parse(Some("permit2")).unwrap();
        assert!(only.allows(SchemeId::Permit2));
        assert!(!only.allows(SchemeId::Permit2Witness));
        assert!(PaymentTypeFilter::parse(Some("Permit")).is_err());
    }

    #[test]
    fn typed_requirements_view() {
        let typed = ExactEvmRequirements::parse(&requirements(Some("eip3009"))).unwrap();
        assert_eq!(typed.chain_id, Some(84532));
        assert_eq!(typed.max_amount_required, U256::from(1000));
        assert_eq!(typed.payment_type, PaymentTypeFilter::Only(SchemeId::Eip3009));
        assert_eq!(typed.extra.name.as_deref(), Some("USDC"));

        assert!(ExactEvmRequirements::parse(&requirements(Some("bogus"))).is_none());
        let mut bad_amount = requirements(None);
        bad_amount.max_amount_required = "1.5".into();
        assert!(ExactEvmRequirements::parse(&bad_amount).is_none());
    }

    #[test]
    fn witness_type_string_matches_permit2_layout() {
        use alloy_sol_types::SolStruct;
        let stub = "PermitWitnessTransferFrom(TokenPermissions permitted,address spender,uint256 nonce,uint256 deadline,";
        assert_eq!(
            PermitWitnessTransferFrom::eip712_encode_type(),
            format!("{stub}{WITNESS_TYPE_STRING}")
        );
    }
}
