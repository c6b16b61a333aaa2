//! Server-side requirement generation for the EIP-155 exact scheme.
//!
//! A resource server describes its price with [`ExactEvmRequirementsBuilder`]
//! and sends the result in a `402 Payment Required` body. When the builder is
//! given a [`TokenCapabilityDetector`], the accepted authorization kind is
//! chosen from what the token actually supports.

use alloy_primitives::{Address, U256};
use x402_settle::proto::PaymentRequirements;

use crate::chain::{ChainId, Eip155ChainReader, caip2};
use crate::detector::TokenCapabilityDetector;
use crate::exact::types::{ExactScheme, PaymentRequirementsExtra, SchemeId};
use crate::networks::{known_asset, network_name};

/// Default upper bound on how long the server waits for settlement.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Builds [`PaymentRequirements`] for an EVM token.
#[derive(Debug, Clone)]
pub struct ExactEvmRequirementsBuilder {
    chain_id: ChainId,
    asset: Address,
    pay_to: Address,
    amount: U256,
    resource: String,
    description: String,
    mime_type: String,
    max_timeout_seconds: u64,
    payment_type: Option<SchemeId>,
    extra: PaymentRequirementsExtra,
    output_schema: Option<serde_json::Value>,
}

impl ExactEvmRequirementsBuilder {
    /// Starts a requirement for `amount` base units of `asset`, paid to `pay_to`.
    ///
    /// For well-known tokens the EIP-712 name and version are filled in.
    pub fn new(chain_id: ChainId, asset: Address, pay_to: Address, amount: U256) -> Self {
        let extra = known_asset(chain_id, asset)
            .map(|info| PaymentRequirementsExtra {
                name: Some(info.name),
                version: Some(info.version),
            })
            .unwrap_or_default();
        Self {
            chain_id,
            asset,
            pay_to,
            amount,
            resource: String::new(),
            description: String::new(),
            mime_type: "application/json".to_owned(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            payment_type: None,
            extra,
            output_schema: None,
        }
    }

    /// Sets the resource URL.
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the MIME type of the resource.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Sets the settlement timeout.
    #[must_use]
    pub const fn max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Sets the output schema.
    #[must_use]
    pub fn output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Accepts only `scheme`; detection will not override it.
    #[must_use]
    pub const fn payment_type(mut self, scheme: SchemeId) -> Self {
        self.payment_type = Some(scheme);
        self
    }

    /// Overrides the token's EIP-712 domain name and version.
    #[must_use]
    pub fn token_domain(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.extra = PaymentRequirementsExtra {
            name: Some(name.into()),
            version: Some(version.into()),
        };
        self
    }

    /// Fills `paymentType` from the token's detected capabilities, unless it
    /// was pinned with [`payment_type`](Self::payment_type).
    ///
    /// A token whose capabilities cannot be determined is left unpinned.
    pub async fn detect_payment_type<R: Eip155ChainReader>(
        mut self,
        detector: &TokenCapabilityDetector<R>,
    ) -> Self {
        if self.payment_type.is_none() {
            self.payment_type = detector.detect(self.asset).await.recommended();
        }
        self
    }

    /// Produces the wire requirement.
    #[must_use]
    pub fn build(self) -> PaymentRequirements {
        let network = network_name(self.chain_id)
            .map_or_else(|| caip2(self.chain_id), str::to_owned);
        let extra = (self.extra != PaymentRequirementsExtra::default())
            .then(|| serde_json::to_value(&self.extra).ok())
            .flatten();
        PaymentRequirements {
            scheme: ExactScheme.to_string(),
            network,
            max_amount_required: self.amount.to_string(),
            resource: self.resource,
            description: self.description,
            mime_type: self.mime_type,
            output_schema: self.output_schema,
            pay_to: self.pay_to.to_string(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.to_string(),
            payment_type: self.payment_type.map(|scheme| scheme.as_str().to_owned()),
            extra,
        }
    }
}
