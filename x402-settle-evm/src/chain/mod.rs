//! EVM chain primitives and capabilities.
//!
//! Verification only ever needs read access to a chain; settlement needs to
//! submit transactions. The two are separate traits so that tests and
//! alternative backends can provide either:
//!
//! - [`Eip155ChainReader`] - `eth_getCode`, `eth_getStorageAt`, `eth_call`
//! - [`Eip155MetaTransactionProvider`] - signed transaction submission
//!
//! [`Eip155ChainProvider`] implements both on top of alloy.
//!
//! # Submodules
//!
//! - [`types`] - Wire format types like [`TokenAmount`]
//! - [`reader`] - The read capability and typed `eth_call` helper
//! - [`nonce`] - Nonce management for concurrent transaction submission
//! - [`provider`] - The alloy-backed provider

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

pub mod nonce;
pub mod provider;
pub mod reader;
pub mod types;

pub use nonce::*;
pub use provider::*;
pub use reader::*;
pub use types::*;

/// An EIP-155 chain ID (e.g., 8453 for Base, 137 for Polygon).
pub type ChainId = u64;

/// Formats a chain ID as a CAIP-2 identifier.
///
/// Example: `caip2(8453)` returns `"eip155:8453"`.
#[must_use]
pub fn caip2(chain_id: ChainId) -> String {
    format!("eip155:{chain_id}")
}

/// Parses a CAIP-2 identifier into an EIP-155 chain ID.
///
/// Returns `None` if the input is not a valid `eip155:` prefixed string.
#[must_use]
pub fn parse_caip2(caip: &str) -> Option<ChainId> {
    caip.strip_prefix("eip155:").and_then(|s| s.parse().ok())
}

/// Token metadata for a known deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Contract address.
    pub address: Address,
    /// Number of decimals.
    pub decimals: u8,
    /// EIP-712 domain name for the token contract.
    pub name: String,
    /// EIP-712 domain version for the token contract.
    pub version: String,
}

/// A known EVM network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Human-readable network name (e.g., `"base-sepolia"`).
    pub name: &'static str,
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// Well-known token deployments.
    pub assets: Vec<AssetInfo>,
}

impl NetworkConfig {
    /// Returns the CAIP-2 identifier of this network.
    #[must_use]
    pub fn caip2(&self) -> String {
        caip2(self.chain_id)
    }

    /// Finds an asset by its contract address.
    #[must_use]
    pub fn find_asset(&self, address: Address) -> Option<&AssetInfo> {
        self.assets.iter().find(|a| a.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caip2_round_trip() {
        assert_eq!(caip2(8453), "eip155:8453");
        assert_eq!(parse_caip2("eip155:84532"), Some(84532));
        assert_eq!(parse_caip2("solana:mainnet"), None);
        assert_eq!(parse_caip2("eip155:"), None);
    }
}
