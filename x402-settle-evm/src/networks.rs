//! Known EVM networks and their USDC deployments.

use alloy_primitives::{Address, address};

use crate::chain::{AssetInfo, ChainId, NetworkConfig, parse_caip2};

/// Base Mainnet chain ID.
pub const BASE_MAINNET: ChainId = 8453;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: ChainId = 84532;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = 137;

/// Polygon Amoy (testnet) chain ID.
pub const POLYGON_AMOY: ChainId = 80002;

/// Avalanche C-Chain chain ID.
pub const AVALANCHE_MAINNET: ChainId = 43114;

/// Avalanche Fuji (testnet) chain ID.
pub const AVALANCHE_FUJI: ChainId = 43113;

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: ChainId = 1;

/// Celo Mainnet chain ID.
pub const CELO_MAINNET: ChainId = 42220;

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// USDC contract address on Polygon Mainnet.
pub const USDC_POLYGON: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// USDC contract address on Polygon Amoy.
pub const USDC_POLYGON_AMOY: Address = address!("41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF");

/// USDC contract address on Avalanche C-Chain.
pub const USDC_AVALANCHE: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");

/// USDC contract address on Avalanche Fuji.
pub const USDC_AVALANCHE_FUJI: Address = address!("5425890298aed601595a70AB815c96711a31Bc65");

/// USDC contract address on Celo.
pub const USDC_CELO: Address = address!("cebA9300f2b948710d2653dD7B07f33A8B32118C");

/// Default EIP-712 domain name for USDC.
pub const DEFAULT_USDC_NAME: &str = "USD Coin";

/// Default EIP-712 domain version for USDC.
pub const DEFAULT_USDC_VERSION: &str = "2";

/// Default token decimals for USDC.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

const NETWORKS: [(&str, ChainId, Address); 8] = [
    ("base", BASE_MAINNET, USDC_BASE),
    ("base-sepolia", BASE_SEPOLIA, USDC_BASE_SEPOLIA),
    ("ethereum", ETHEREUM_MAINNET, USDC_ETHEREUM),
    ("polygon", POLYGON_MAINNET, USDC_POLYGON),
    ("polygon-amoy", POLYGON_AMOY, USDC_POLYGON_AMOY),
    ("avalanche", AVALANCHE_MAINNET, USDC_AVALANCHE),
    ("avalanche-fuji", AVALANCHE_FUJI, USDC_AVALANCHE_FUJI),
    ("celo", CELO_MAINNET, USDC_CELO),
];

/// Returns configurations for all known EVM networks.
#[must_use]
pub fn known_networks() -> Vec<NetworkConfig> {
    NETWORKS
        .iter()
        .map(|&(name, chain_id, usdc)| NetworkConfig {
            name,
            chain_id,
            assets: vec![AssetInfo {
                address: usdc,
                decimals: DEFAULT_TOKEN_DECIMALS,
                name: DEFAULT_USDC_NAME.to_owned(),
                version: DEFAULT_USDC_VERSION.to_owned(),
            }],
        })
        .collect()
}

/// Resolves a network name (`"base-sepolia"`) or CAIP-2 id
/// (`"eip155:84532"`) to its chain id.
///
/// CAIP-2 ids resolve even for chains not listed here.
#[must_use]
pub fn chain_id_by_network(network: &str) -> Option<ChainId> {
    if let Some(chain_id) = parse_caip2(network) {
        return Some(chain_id);
    }
    NETWORKS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(network))
        .map(|&(_, chain_id, _)| chain_id)
}

/// Returns the network name for a known chain id.
#[must_use]
pub fn network_name(chain_id: ChainId) -> Option<&'static str> {
    NETWORKS
        .iter()
        .find(|&&(_, id, _)| id == chain_id)
        .map(|&(name, _, _)| name)
}

/// Finds metadata for a well-known token on `chain_id`.
#[must_use]
pub fn known_asset(chain_id: ChainId, address: Address) -> Option<AssetInfo> {
    known_networks()
        .into_iter()
        .find(|n| n.chain_id == chain_id)
        .and_then(|n| n.find_asset(address).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_caip2_resolve_to_the_same_chain() {
        assert_eq!(chain_id_by_network("base-sepolia"), Some(BASE_SEPOLIA));
        assert_eq!(chain_id_by_network("eip155:84532"), Some(BASE_SEPOLIA));
        assert_eq!(chain_id_by_network("Base"), Some(BASE_MAINNET));
        assert_eq!(chain_id_by_network("eip155:31337"), Some(31337));
        assert_eq!(chain_id_by_network("solana"), None);
    }

    #[test]
    fn network_names_round_trip() {
        for network in known_networks() {
            assert_eq!(chain_id_by_network(network.name), Some(network.chain_id));
            assert_eq!(network_name(network.chain_id), Some(network.name));
        }
        assert_eq!(network_name(31337), None);
    }

    #[test]
    fn usdc_metadata_is_known() {
        let usdc = known_asset(BASE_SEPOLIA, USDC_BASE_SEPOLIA).unwrap();
        assert_eq!(usdc.name, DEFAULT_USDC_NAME);
        assert_eq!(usdc.version, DEFAULT_USDC_VERSION);
        assert!(known_asset(BASE_MAINNET, USDC_BASE_SEPOLIA).is_none());
    }
}
