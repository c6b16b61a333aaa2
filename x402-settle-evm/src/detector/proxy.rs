//! Upgradeable proxy resolution.

use alloy_primitives::{Address, B256, b256};

use crate::chain::{ChainReadError, Eip155ChainReader, call_sol};
use crate::exact::contract::IProxy;

/// EIP-1967 implementation slot: `keccak256("eip1967.proxy.implementation") - 1`.
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// EIP-1822 (UUPS) slot: `keccak256("PROXIABLE")`.
pub const EIP1822_PROXIABLE_SLOT: B256 =
    b256!("0xc5f16f0fcc639fa48a6947836d9850f504798523bf8c9a3a87d5876cf622bcf7");

/// Finds the implementation behind `proxy`, if it is one.
///
/// Reads the EIP-1967 slot, the EIP-1822 slot and `implementation()`
/// concurrently and returns the first non-zero address in that order.
/// A reverting or undecodable `implementation()` means "not a proxy".
///
/// # Errors
///
/// Returns [`ChainReadError::Transport`] if any read fails at the RPC level.
pub async fn resolve_implementation<R: Eip155ChainReader>(
    reader: &R,
    proxy: Address,
) -> Result<Option<Address>, ChainReadError> {
    let (eip1967, proxiable, getter) = tokio::join!(
        reader.get_storage_at(proxy, EIP1967_IMPLEMENTATION_SLOT),
        reader.get_storage_at(proxy, EIP1822_PROXIABLE_SLOT),
        call_sol(reader, proxy, IProxy::implementationCall {}),
    );
    let getter = match getter {
        Ok(address) => Some(address),
        Err(ChainReadError::Reverted(_) | ChainReadError::Decode(_)) => None,
        Err(e) => return Err(e),
    };
    let candidates = [
        Some(Address::from_word(eip1967?)),
        Some(Address::from_word(proxiable?)),
        getter,
    ];
    Ok(candidates
        .into_iter()
        .flatten()
        .find(|address| !address.is_zero() && *address != proxy))
}
