//! Alloy-backed EVM chain provider.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, TxHash, U256};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{Identity, PendingTransactionError, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{BlockId, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use tower::ServiceBuilder;
use url::Url;

use super::nonce::PendingNonceManager;
use super::reader::{ChainReadError, Eip155ChainReader};
use super::ChainId;
use crate::config::{ConfigError, Eip155ChainConfig};
use crate::networks::chain_id_by_network;

/// Combined filler type for gas, blob gas, nonce, and chain ID.
pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// The fully composed Ethereum provider type used in this crate.
///
/// Combines filler layers for gas, nonce, chain ID, blob gas, and wallet
/// signing around a [`RootProvider`] doing the JSON-RPC communication.
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Transaction submission behaviour of an [`Eip155ChainProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProviderOptions {
    /// Whether the chain supports EIP-1559 gas pricing (default: `true`).
    pub eip1559: bool,
    /// Whether the chain uses flashblocks, estimating gas against `latest`
    /// instead of `pending` (default: `false`).
    pub flashblocks: bool,
    /// Seconds to wait for a transaction receipt (default: 30).
    pub receipt_timeout_secs: u64,
}

impl Default for ChainProviderOptions {
    fn default() -> Self {
        Self {
            eip1559: true,
            flashblocks: false,
            receipt_timeout_secs: 30,
        }
    }
}

/// Provider for interacting with EVM-compatible blockchains.
///
/// Implements both [`Eip155ChainReader`] and
/// [`Eip155MetaTransactionProvider`]. Transaction submission handles:
/// - Signing with multiple signers (round-robin selection)
/// - Nonce management with automatic reset on failures
/// - Gas estimation and pricing (EIP-1559 and legacy)
/// - Receipt fetching with a configurable timeout
///
/// # Nonce Management
///
/// Uses [`PendingNonceManager`] to track nonces locally and query pending
/// transactions on initialization. If a transaction fails, the nonce is
/// reset to force a fresh query on the next transaction.
#[derive(Debug)]
pub struct Eip155ChainProvider {
    chain_id: ChainId,
    options: ChainProviderOptions,
    inner: InnerProvider,
    /// Available signer addresses for round-robin selection.
    signer_addresses: Arc<Vec<Address>>,
    /// Current position in round-robin signer rotation.
    signer_cursor: Arc<AtomicUsize>,
    /// Nonce manager for resetting nonces on transaction failures.
    nonce_manager: PendingNonceManager,
}

impl Eip155ChainProvider {
    /// Creates an RPC client over HTTP endpoints with optional per-endpoint
    /// rate limits, falling back between them.
    ///
    /// Non-HTTP(S) URLs are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoRpc`] if no HTTP endpoint remains.
    #[allow(unused_variables)] // chain_id is needed for tracing only
    pub fn rpc_client(
        chain_id: ChainId,
        endpoints: &[(Url, Option<u32>)],
    ) -> Result<RpcClient, ConfigError> {
        let transports = endpoints
            .iter()
            .filter_map(|(url, rate_limit)| {
                let scheme = url.scheme();
                if scheme != "http" && scheme != "https" {
                    return None;
                }
                #[cfg(feature = "telemetry")]
                tracing::info!(
                    chain = chain_id,
                    rpc_url = %url,
                    rate_limit = ?rate_limit,
                    "Using HTTP transport"
                );
                let limit = rate_limit.unwrap_or(u32::MAX);
                let service = ServiceBuilder::new()
                    .layer(ThrottleLayer::new(limit))
                    .service(Http::new(url.clone()));
                Some(service)
            })
            .collect::<Vec<_>>();
        let count = NonZeroUsize::new(transports.len()).ok_or(ConfigError::NoRpc(chain_id))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(count))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    /// Creates a new EVM chain provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the wallet has no signers or no usable
    /// RPC endpoint is given.
    pub fn new(
        chain_id: ChainId,
        wallet: EthereumWallet,
        rpc_endpoints: &[(Url, Option<u32>)],
        options: ChainProviderOptions,
    ) -> Result<Self, ConfigError> {
        let signer_addresses =
            NetworkWallet::<Ethereum>::signer_addresses(&wallet).collect::<Vec<_>>();
        if signer_addresses.is_empty() {
            return Err(ConfigError::NoSigners(chain_id));
        }
        let client = Self::rpc_client(chain_id, rpc_endpoints)?;

        let nonce_manager = PendingNonceManager::default();
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        let inner: InnerProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client);

        #[cfg(feature = "telemetry")]
        tracing::info!(chain = chain_id, signers = ?signer_addresses, "Using EVM provider");

        Ok(Self {
            chain_id,
            options,
            inner,
            signer_addresses: Arc::new(signer_addresses),
            signer_cursor: Arc::new(AtomicUsize::new(0)),
            nonce_manager,
        })
    }

    /// Builds a provider from its TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown network, a malformed signer
    /// key, or a chain without signers or RPC endpoints.
    pub fn from_config(config: &Eip155ChainConfig) -> Result<Self, ConfigError> {
        let chain_id = chain_id_by_network(&config.network)
            .ok_or_else(|| ConfigError::UnknownNetwork(config.network.clone()))?;

        let mut signers = config
            .signer_private_keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                key.trim()
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| ConfigError::InvalidSigner {
                        network: config.network.clone(),
                        index,
                        reason: e.to_string(),
                    })
            });
        let first = signers
            .next()
            .transpose()?
            .ok_or(ConfigError::NoSigners(chain_id))?;
        let mut wallet = EthereumWallet::new(first);
        for signer in signers {
            wallet.register_signer(signer?);
        }

        let endpoints = config
            .rpc
            .iter()
            .map(|rpc| (rpc.url.clone(), rpc.rate_limit))
            .collect::<Vec<_>>();
        let options = ChainProviderOptions {
            eip1559: config.eip1559,
            flashblocks: config.flashblocks,
            receipt_timeout_secs: config.receipt_timeout_secs,
        };
        Self::new(chain_id, wallet, &endpoints, options)
    }

    /// Round-robin selection of next signer from wallet.
    fn next_signer_address(&self) -> Address {
        if self.signer_addresses.len() == 1 {
            self.signer_addresses[0]
        } else {
            let next =
                self.signer_cursor.fetch_add(1, Ordering::Relaxed) % self.signer_addresses.len();
            self.signer_addresses[next]
        }
    }

    /// Returns the underlying alloy provider.
    #[must_use]
    pub const fn inner(&self) -> &InnerProvider {
        &self.inner
    }
}

/// Returns `true` when a JSON-RPC error reports an execution revert.
///
/// Geth-style nodes use code `3` for reverts with data; others only say so
/// in the message.
fn is_execution_revert(err: &TransportError) -> bool {
    err.as_error_resp().is_some_and(|payload| {
        payload.code == 3 || payload.message.to_ascii_lowercase().contains("revert")
    })
}

fn classify_read_error(err: TransportError) -> ChainReadError {
    if is_execution_revert(&err) {
        let message = err
            .as_error_resp()
            .map_or_else(|| err.to_string(), |payload| payload.message.to_string());
        ChainReadError::Reverted(message)
    } else {
        ChainReadError::Transport(err)
    }
}

impl Eip155ChainReader for Eip155ChainProvider {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainReadError> {
        let code_fut = self.inner.get_code_at(address).into_future();
        traced!(
            code_fut,
            tracing::info_span!("eth_getCode", %address, otel.kind = "client")
        )
        .map_err(classify_read_error)
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256, ChainReadError> {
        let storage_fut = self
            .inner
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .into_future();
        let word = traced!(
            storage_fut,
            tracing::info_span!("eth_getStorageAt", %address, %slot, otel.kind = "client")
        )
        .map_err(classify_read_error)?;
        Ok(B256::from(word.to_be_bytes::<32>()))
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainReadError> {
        let request = TransactionRequest::default().with_to(to).with_input(calldata);
        let call_fut = self.inner.call(request).into_future();
        traced!(
            call_fut,
            tracing::info_span!("eth_call", %to, otel.kind = "client")
        )
        .map_err(classify_read_error)
    }
}

/// Errors that can occur when sending a meta-transaction.
#[derive(Debug, thiserror::Error)]
pub enum MetaTransactionSendError {
    /// The node rejected the transaction because it would revert.
    #[error("transaction would revert: {0}")]
    Reverted(String),
    /// RPC transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Pending transaction error (receipt timeout and the like).
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),
}

/// Meta-transaction parameters: target address, calldata, and required confirmations.
#[derive(Debug, Clone)]
pub struct MetaTransaction {
    /// Target contract address.
    pub to: Address,
    /// Transaction calldata (encoded function call).
    pub calldata: Bytes,
    /// Number of block confirmations to wait for.
    pub confirmations: u64,
    /// Preferred sender. Honoured only when the provider holds that signer.
    pub from: Option<Address>,
}

/// The part of a mined transaction's receipt settlement cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementReceipt {
    /// Hash of the mined transaction.
    pub transaction_hash: TxHash,
    /// `true` if execution succeeded, `false` if it reverted.
    pub status: bool,
}

/// Sends signed transactions with custom target and calldata.
pub trait Eip155MetaTransactionProvider: Send + Sync {
    /// Addresses of every signer the provider can send from.
    fn signer_addresses(&self) -> Vec<Address>;

    /// Sends a meta-transaction and waits for its receipt.
    fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<SettlementReceipt, MetaTransactionSendError>> + Send;
}

impl<T: Eip155MetaTransactionProvider> Eip155MetaTransactionProvider for Arc<T> {
    fn signer_addresses(&self) -> Vec<Address> {
        (**self).signer_addresses()
    }

    fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> impl Future<Output = Result<SettlementReceipt, MetaTransactionSendError>> + Send {
        (**self).send_transaction(tx)
    }
}

impl Eip155MetaTransactionProvider for Eip155ChainProvider {
    fn signer_addresses(&self) -> Vec<Address> {
        self.signer_addresses.as_ref().clone()
    }

    /// Sends a meta-transaction from the requested or next round-robin signer.
    ///
    /// Gas pricing follows the chain: EIP-1559 chains rely on the fillers,
    /// legacy chains get an explicit `eth_gasPrice`. A revert during gas
    /// estimation is reported as [`MetaTransactionSendError::Reverted`]
    /// without consuming a nonce.
    ///
    /// If submission or receipt fetching fails, the nonce for the sending
    /// address is reset. The transaction may still have reached the mempool.
    async fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<SettlementReceipt, MetaTransactionSendError> {
        let from_address = tx
            .from
            .filter(|from| self.signer_addresses.contains(from))
            .unwrap_or_else(|| self.next_signer_address());
        let mut txr = TransactionRequest::default()
            .with_to(tx.to)
            .with_from(from_address)
            .with_input(tx.calldata);

        if !self.options.eip1559 {
            let gas_fut = self.inner.get_gas_price();
            let gas: u128 = traced!(
                gas_fut,
                tracing::info_span!("get_gas_price", otel.kind = "client")
            )?;
            txr.set_gas_price(gas);
        }

        let block_id = if self.options.flashblocks {
            BlockId::latest()
        } else {
            BlockId::pending()
        };
        let estimate_fut = self
            .inner
            .estimate_gas(txr.clone())
            .block(block_id)
            .into_future();
        let gas_limit = traced!(
            estimate_fut,
            tracing::info_span!("estimate_gas", to = %tx.to, otel.kind = "client")
        )
        .map_err(|e| {
            if is_execution_revert(&e) {
                MetaTransactionSendError::Reverted(
                    e.as_error_resp()
                        .map_or_else(|| e.to_string(), |p| p.message.to_string()),
                )
            } else {
                MetaTransactionSendError::Transport(e)
            }
        })?;
        txr.set_gas_limit(gas_limit);

        let pending_tx = match self.inner.send_transaction(txr).await {
            Ok(pending) => pending,
            Err(e) => {
                self.nonce_manager.reset_nonce(from_address).await;
                return Err(MetaTransactionSendError::Transport(e));
            }
        };

        let timeout = std::time::Duration::from_secs(self.options.receipt_timeout_secs);
        let watcher = pending_tx
            .with_required_confirmations(tx.confirmations)
            .with_timeout(Some(timeout));

        match watcher.get_receipt().await {
            Ok(receipt) => Ok(SettlementReceipt {
                transaction_hash: receipt.transaction_hash,
                status: receipt.status(),
            }),
            Err(e) => {
                self.nonce_manager.reset_nonce(from_address).await;
                Err(MetaTransactionSendError::PendingTransaction(e))
            }
        }
    }
}
