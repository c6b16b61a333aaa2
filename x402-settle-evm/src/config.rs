//! Settlement configuration.
//!
//! Loaded from TOML with `$VAR` / `${VAR}` environment variable expansion
//! applied to the raw file before parsing, so signer keys never need to be
//! written to disk.
//!
//! # Example Configuration
//!
//! ```toml
//! [exact]
//! clock_skew_tolerance_secs = 6
//!
//! [[chains]]
//! network = "base-sepolia"
//! eip1559 = true
//! receipt_timeout_secs = 30
//! signer_private_keys = ["$SIGNER_KEY_BASE_SEPOLIA"]
//!
//! [[chains.rpc]]
//! url = "https://sepolia.base.org"
//! rate_limit = 25
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chain::ChainId;
use crate::exact::facilitator::Eip155ExactConfig;

/// Errors from loading configuration or building providers from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid TOML of the expected shape.
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    /// A signer private key could not be parsed.
    #[error("invalid signer #{index} for {network}: {reason}")]
    InvalidSigner {
        /// Network the signer belongs to.
        network: String,
        /// Position of the key in `signer_private_keys`.
        index: usize,
        /// Parser message.
        reason: String,
    },
    /// The network name or CAIP-2 id is not known.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    /// No usable HTTP RPC endpoint was configured.
    #[error("no HTTP RPC endpoint configured for chain {0}")]
    NoRpc(ChainId),
    /// No signer was configured.
    #[error("no signer configured for chain {0}")]
    NoSigners(ChainId),
}

/// One RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP(S) endpoint URL.
    pub url: Url,
    /// Maximum requests per second, unlimited if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// Per-chain configuration for an EVM network.
#[derive(Clone, Serialize, Deserialize)]
pub struct Eip155ChainConfig {
    /// Network name (`"base"`) or CAIP-2 id (`"eip155:8453"`).
    pub network: String,
    /// RPC endpoints, used with fallback in order.
    pub rpc: Vec<RpcConfig>,
    /// Whether the chain supports EIP-1559 gas pricing.
    #[serde(default = "default_eip1559")]
    pub eip1559: bool,
    /// Whether the chain uses flashblocks.
    #[serde(default)]
    pub flashblocks: bool,
    /// Seconds to wait for a settlement receipt.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Hex private keys of the settlement signers (with or without `0x`).
    #[serde(default)]
    pub signer_private_keys: Vec<String>,
}

impl fmt::Debug for Eip155ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eip155ChainConfig")
            .field("network", &self.network)
            .field("rpc", &self.rpc)
            .field("eip1559", &self.eip1559)
            .field("flashblocks", &self.flashblocks)
            .field("receipt_timeout_secs", &self.receipt_timeout_secs)
            .field(
                "signer_private_keys",
                &format_args!("[{} redacted]", self.signer_private_keys.len()),
            )
            .finish()
    }
}

const fn default_eip1559() -> bool {
    true
}

const fn default_receipt_timeout_secs() -> u64 {
    30
}

/// Top-level settlement configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Exact-scheme facilitator settings.
    #[serde(default)]
    pub exact: Eip155ExactConfig,
    /// Chains served by this process.
    #[serde(default)]
    pub chains: Vec<Eip155ChainConfig>,
}

impl SettlementConfig {
    /// Loads configuration from a file path, expanding environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string, expanding environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the expanded text is not valid.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        Ok(toml::from_str(&expanded)?)
    }

    /// Returns the configuration for `network`, matching by chain id so that
    /// names and CAIP-2 ids are interchangeable.
    #[must_use]
    pub fn chain(&self, network: &str) -> Option<&Eip155ChainConfig> {
        let wanted = crate::networks::chain_id_by_network(network)?;
        self.chains
            .iter()
            .find(|c| crate::networks::chain_id_by_network(&c.network) == Some(wanted))
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        if var_name.is_empty() {
            result.push('$');
            if braced {
                result.push('{');
            }
        } else if let Ok(val) = std::env::var(&var_name) {
            result.push_str(&val);
        } else {
            result.push('$');
            if braced {
                result.push('{');
            }
            result.push_str(&var_name);
            if braced {
                result.push('}');
            }
        }
    }

    result
}
