//! EIP-712 domain construction for tokens and Permit2.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{Eip712Domain, SolCall};

use super::error::{Eip155ExactError, PaymentVerificationError};
use crate::chain::{ChainId, ChainReadError, Eip155ChainReader, call_sol};
use crate::exact::contract::IERC20;
use crate::exact::types::{PERMIT2_DOMAIN_NAME, PaymentRequirementsExtra};

/// Version assumed when neither the requirement nor the token provides one.
pub const DEFAULT_DOMAIN_VERSION: &str = "1";

/// Runs an optional metadata call. A revert or an undecodable answer means
/// the token does not implement it.
async fn optional_call<R, C>(
    reader: &R,
    token: Address,
    call: C,
) -> Result<Option<C::Return>, ChainReadError>
where
    R: Eip155ChainReader,
    C: SolCall + Send,
{
    match call_sol(reader, token, call).await {
        Ok(value) => Ok(Some(value)),
        Err(ChainReadError::Reverted(_) | ChainReadError::Decode(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Builds the EIP-712 domain of `token`.
///
/// Name and version come from the requirement's `extra` when present,
/// then from the token's EIP-5267 `eip712Domain()`, then from `name()` and
/// `version()`. A missing version falls back to `"1"`; a missing name
/// rejects the requirement.
pub(super) async fn token_domain<R: Eip155ChainReader>(
    reader: &R,
    chain_id: ChainId,
    token: Address,
    extra: &PaymentRequirementsExtra,
) -> Result<Eip712Domain, Eip155ExactError> {
    let mut name = extra.name.clone();
    let mut version = extra.version.clone();

    if name.is_none() || version.is_none() {
        if let Some(domain) = optional_call(reader, token, IERC20::eip712DomainCall {}).await? {
            name = name.or_else(|| non_empty(domain.name));
            version = version.or_else(|| non_empty(domain.version));
        }
    }
    if name.is_none() {
        name = optional_call(reader, token, IERC20::nameCall {})
            .await?
            .and_then(non_empty);
    }
    let name = name.ok_or_else(|| {
        PaymentVerificationError::InvalidRequirements(format!(
            "cannot determine the EIP-712 domain name of token {token}"
        ))
    })?;
    if version.is_none() {
        version = optional_call(reader, token, IERC20::versionCall {})
            .await?
            .and_then(non_empty);
    }
    let version = version.unwrap_or_else(|| DEFAULT_DOMAIN_VERSION.to_owned());

    Ok(Eip712Domain::new(
        Some(name.into()),
        Some(version.into()),
        Some(U256::from(chain_id)),
        Some(token),
        None,
    ))
}

/// The Permit2 domain: name `"Permit2"`, no version.
pub(super) fn permit2_domain(chain_id: ChainId, permit2: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(PERMIT2_DOMAIN_NAME.into()),
        None,
        Some(U256::from(chain_id)),
        Some(permit2),
        None,
    )
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::testing::MockChain;

    const TOKEN: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

    fn extra(name: Option<&str>, version: Option<&str>) -> PaymentRequirementsExtra {
        PaymentRequirementsExtra {
            name: name.map(str::to_owned),
            version: version.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn extra_wins_without_reads() {
        let chain = MockChain::new(84532);
        let domain = token_domain(&chain, 84532, TOKEN, &extra(Some("USDC"), Some("2")))
            .await
            .unwrap();
        assert_eq!(domain.name.as_deref(), Some("USDC"));
        assert_eq!(domain.version.as_deref(), Some("2"));
        assert_eq!(domain.chain_id, Some(U256::from(84532)));
        assert_eq!(domain.verifying_contract, Some(TOKEN));
        assert_eq!(chain.reads(), 0);
    }

    #[tokio::test]
    async fn eip5267_domain_fills_the_gaps() {
        let chain = MockChain::new(84532);
        chain.set_eip712_domain(TOKEN, "USD Coin", "2");
        chain.set_name(TOKEN, "ignored");

        let domain = token_domain(&chain, 84532, TOKEN, &extra(None, None)).await.unwrap();
        assert_eq!(domain.name.as_deref(), Some("USD Coin"));
        assert_eq!(domain.version.as_deref(), Some("2"));

        let domain = token_domain(&chain, 84532, TOKEN, &extra(Some("USDC"), None))
            .await
            .unwrap();
        assert_eq!(domain.name.as_deref(), Some("USDC"));
        assert_eq!(domain.version.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn name_getter_and_default_version() {
        let chain = MockChain::new(1);
        chain.set_name(TOKEN, "Dai Stablecoin");
        let domain = token_domain(&chain, 1, TOKEN, &extra(None, None)).await.unwrap();
        assert_eq!(domain.name.as_deref(), Some("Dai Stablecoin"));
        assert_eq!(domain.version.as_deref(), Some(DEFAULT_DOMAIN_VERSION));

        chain.set_version(TOKEN, "3");
        let domain = token_domain(&chain, 1, TOKEN, &extra(None, None)).await.unwrap();
        assert_eq!(domain.version.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn missing_name_rejects_the_requirement() {
        let chain = MockChain::new(1);
        let err = token_domain(&chain, 1, TOKEN, &extra(None, Some("1")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Eip155ExactError::PaymentVerification(PaymentVerificationError::InvalidRequirements(_))
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_not_treated_as_absence() {
        let chain = MockChain::new(1);
        chain.set_offline(true);
        let err = token_domain(&chain, 1, TOKEN, &extra(None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Eip155ExactError::ChainRead(ChainReadError::Transport(_))));
    }

    #[test]
    fn permit2_domain_has_no_version() {
        let domain = permit2_domain(8453, crate::exact::types::PERMIT2_ADDRESS);
        assert_eq!(domain.name.as_deref(), Some("Permit2"));
        assert_eq!(domain.version, None);
        assert_eq!(domain.chain_id, Some(U256::from(8453)));
    }
}
